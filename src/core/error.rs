//! Error types for scheduler and render-loop operations.

use thiserror::Error;

use crate::core::task::{ExecutionEnvironment, TaskId};
use crate::render::SurfaceState;

/// Errors produced while building or operating the scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A worker pool could not be created or used.
    #[error("pool error: {0}")]
    Pool(#[from] crate::core::worker_pool::PoolError),
    /// A scheduler-owned thread could not be spawned.
    #[error("failed to spawn {name} thread: {message}")]
    ThreadSpawn {
        /// Thread name.
        name: String,
        /// OS error text.
        message: String,
    },
}

/// A panic or failure inside a task body.
///
/// Isolated to the task that raised it: it is logged and reported to the
/// audit sink, never returned to the producer.
#[derive(Debug, Clone, Error)]
#[error("task `{task_id}` failed on {environment}: {message}")]
pub struct TaskExecutionError {
    /// Id of the failed task.
    pub task_id: TaskId,
    /// Environment the task ran on.
    pub environment: ExecutionEnvironment,
    /// Panic message, if one could be extracted.
    pub message: String,
}

/// Failure reported by a [`GpuContext`](crate::render::GpuContext) call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation} failed: {message}")]
pub struct GpuError {
    /// GPU operation that failed, e.g. `present`.
    pub operation: String,
    /// Backend-specific detail.
    pub message: String,
}

impl GpuError {
    /// Build an error for a named operation.
    pub fn new(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// Terminal errors of the render loop.
///
/// Every variant ends the loop; the host is expected to recreate the surface
/// and spawn a fresh loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// No renderer or GPU context was bound, or the loop config is invalid.
    #[error("render loop misconfigured: {0}")]
    Configuration(String),
    /// The GPU context could not be initialized, made current or resized.
    #[error("gpu context error: {0}")]
    Context(GpuError),
    /// Presenting a frame failed.
    #[error("gpu submission failed: {0}")]
    GpuSubmission(GpuError),
    /// The surface lifecycle was driven through an illegal transition.
    #[error("illegal surface transition from {from:?} to {to:?}")]
    SurfaceTransition {
        /// State before the transition.
        from: SurfaceState,
        /// Requested state.
        to: SurfaceState,
    },
    /// The render thread panicked outside an isolated graphics task.
    #[error("render thread panicked: {0}")]
    ThreadPanicked(String),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;

/// Extract a readable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
