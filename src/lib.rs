//! # mapcore scheduler
//!
//! Task scheduling and render-loop coordination for a map engine.
//!
//! Every engine subsystem (tile loading, vector-tile decoding, symbol layout,
//! camera animation) hands its asynchronous work to one [`Scheduler`]. The
//! scheduler routes each task to the execution context it declares: a pool of
//! dedicated threads for blocking I/O, one for CPU-bound computation, one for
//! everything else, or the single render thread that owns the GPU context.
//!
//! ## Core Problem Solved
//!
//! - **Lifecycle-driven pausing**: while the host app is backgrounded nothing
//!   runs; admitted work is parked per priority and flushed High → Normal →
//!   Low on resume
//! - **One GPU thread**: graphics work is drained in bounded batches before
//!   each draw so a burst of uploads cannot stall a frame indefinitely
//! - **Cancelable work**: tasks carry caller-chosen ids; the latest submission
//!   under an id can be canceled while delayed or queued
//!
//! ## Scheduler
//!
//! ```rust,ignore
//! use mapcore_scheduler::config::SchedulerConfig;
//! use mapcore_scheduler::core::{ExecutionEnvironment, Scheduler, Task, TaskConfig, TaskPriority};
//!
//! let scheduler = Scheduler::new(SchedulerConfig::from_env()?)?;
//! scheduler.add_task(Task::new(
//!     TaskConfig::new("tile-12-2048-1361", ExecutionEnvironment::Io)
//!         .with_priority(TaskPriority::High),
//!     move || fetch_tile(),
//! ));
//! scheduler.resume();
//! ```
//!
//! ## Render Loop
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mapcore_scheduler::config::RenderLoopConfig;
//! use mapcore_scheduler::render::{RenderCallbacks, RenderLoopBuilder};
//!
//! let render_loop = RenderLoopBuilder::new(RenderLoopConfig::default())
//!     .with_context(egl_context)
//!     .with_renderer(map_renderer)
//!     .with_callbacks(RenderCallbacks::new().on_draw(|| frame_stats.tick()))
//!     .spawn()?;
//! scheduler.set_graphics_sink(Some(Arc::new(render_loop.handle())));
//! render_loop.handle().do_resume();
//! ```
//!
//! For complete examples, see:
//! - `tests/scheduler_test.rs` - pause/resume, priorities, cancellation
//! - `tests/render_loop_test.rs` - frame draining, resize, teardown order

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions: tasks, handles, pools and the scheduler.
pub mod core;
/// Configuration models for pools, the scheduler and the render loop.
pub mod config;
/// Builders to construct scheduler components from configuration.
pub mod builders;
/// Infrastructure: priority buffers and the delay timer.
pub mod infra;
/// Graphics channel: the render loop and its host-facing seams.
pub mod render;
/// Runtime adapters and diagnostics API surface.
pub mod runtime;
/// Shared utilities.
pub mod util;

pub use crate::core::{
    ExecutionEnvironment, GraphicsTaskSink, Scheduler, SchedulerError, Task, TaskConfig,
    TaskPriority,
};
pub use crate::render::{RenderLoop, RenderLoopBuilder, RenderLoopHandle};
