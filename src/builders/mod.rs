//! Builders that assemble pools and schedulers from configuration.

pub mod pool_builder;
pub mod scheduler_builder;

pub use pool_builder::build_pools;
pub use scheduler_builder::SchedulerBuilder;
