//! Runtime adapters and the diagnostics API surface.

pub mod api;
#[cfg(feature = "tokio-runtime")]
pub mod tokio_spawner;

pub use api::{health, Health, PoolSnapshot, SchedulerSnapshot};
#[cfg(feature = "tokio-runtime")]
pub use tokio_spawner::TokioSpawner;
