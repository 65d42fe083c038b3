//! Execution seams: the graphics channel and async runtimes.

use std::future::Future;

use super::task::Task;

/// Destination for GRAPHICS tasks.
///
/// The scheduler forwards each routed graphics task here, outside of its own
/// lock and in routing order. A sink queues the task on the thread owning the
/// GPU context and requests a render; it must never run the task on a pool or
/// producer thread.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use mapcore_scheduler::render::RenderLoopBuilder;
///
/// let render_loop = RenderLoopBuilder::new(config)
///     .with_context(context)
///     .with_renderer(renderer)
///     .spawn()?;
/// scheduler.set_graphics_sink(Some(Arc::new(render_loop.handle())));
/// ```
pub trait GraphicsTaskSink: Send + Sync {
    /// Queue a task on the render thread.
    fn schedule_graphics(&self, task: Task);
}

/// Abstraction for spawning async jobs on a runtime.
pub trait Spawn {
    /// Spawn an async task that returns a future.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

/// Hooks run on every pool worker thread as it starts and stops.
///
/// Hosts use these to attach worker threads to a foreign runtime (a JVM, a
/// profiler) and detach them again. Both methods run on the worker thread.
pub trait WorkerThreadHooks: Send + Sync {
    /// Called once, before the worker takes its first job.
    fn on_thread_start(&self, _thread_name: &str) {}

    /// Called once, after the worker leaves its loop.
    fn on_thread_stop(&self, _thread_name: &str) {}
}
