//! Configuration models for pools, the scheduler and the render loop.

pub mod pool;
pub mod render;

pub use pool::{PoolConfig, SchedulerConfig};
pub use render::RenderLoopConfig;
