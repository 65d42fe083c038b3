//! Core scheduling abstractions: tasks, handles, pools and the scheduler.

pub mod audit;
pub mod error;
pub mod executor;
pub mod graphics;
pub mod handle;
pub mod scheduler;
pub mod task;
pub mod worker_pool;

pub use audit::{build_audit_event, AuditAction, AuditEvent, AuditSink, InMemoryAuditSink};
pub use error::{AppResult, GpuError, RenderError, SchedulerError, TaskExecutionError};
pub use executor::{GraphicsTaskSink, Spawn, WorkerThreadHooks};
pub use graphics::GraphicsQueue;
pub use handle::TaskHandle;
pub use scheduler::Scheduler;
pub use task::{ExecutionEnvironment, Task, TaskConfig, TaskId, TaskPriority};
pub use worker_pool::{
    EnvironmentPool, EnvironmentPools, JobOutcome, PoolError, PoolJob, PoolStats,
};
