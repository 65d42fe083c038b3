//! Tests for error types

use mapcore_scheduler::core::{
    ExecutionEnvironment, GpuError, PoolError, RenderError, SchedulerError, TaskExecutionError,
};
use mapcore_scheduler::render::SurfaceState;

#[test]
fn test_pool_error_display() {
    assert_eq!(PoolError::PoolShutdown.to_string(), "pool has been shut down");
    assert_eq!(
        PoolError::InvalidConfig("worker_count must be greater than 0".into()).to_string(),
        "invalid configuration: worker_count must be greater than 0"
    );
}

#[test]
fn test_pool_error_converts_into_scheduler_error() {
    let err: SchedulerError = PoolError::PoolShutdown.into();
    assert!(matches!(err, SchedulerError::Pool(PoolError::PoolShutdown)));
    assert_eq!(err.to_string(), "pool error: pool has been shut down");
}

#[test]
fn test_thread_spawn_error() {
    let err = SchedulerError::ThreadSpawn {
        name: "mapcore-timer".into(),
        message: "Resource temporarily unavailable".into(),
    };
    assert_eq!(
        err.to_string(),
        "failed to spawn mapcore-timer thread: Resource temporarily unavailable"
    );
}

#[test]
fn test_task_execution_error() {
    let err = TaskExecutionError {
        task_id: "tile-3-4-2".into(),
        environment: ExecutionEnvironment::Computation,
        message: "index out of bounds".into(),
    };
    assert_eq!(
        err.to_string(),
        "task `tile-3-4-2` failed on computation: index out of bounds"
    );
}

#[test]
fn test_render_errors() {
    let gpu = GpuError::new("present", "EGL_CONTEXT_LOST");
    assert_eq!(gpu.to_string(), "present failed: EGL_CONTEXT_LOST");
    assert_eq!(
        RenderError::GpuSubmission(gpu.clone()).to_string(),
        "gpu submission failed: present failed: EGL_CONTEXT_LOST"
    );
    assert_eq!(
        RenderError::Context(gpu).to_string(),
        "gpu context error: present failed: EGL_CONTEXT_LOST"
    );

    let transition = RenderError::SurfaceTransition {
        from: SurfaceState::Destroyed,
        to: SurfaceState::Sized,
    };
    assert_eq!(
        transition.to_string(),
        "illegal surface transition from Destroyed to Sized"
    );
}
