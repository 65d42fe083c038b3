//! Graphics channel: the render loop and its host-facing seams.
//!
//! The host supplies a [`GpuContext`] and a [`Renderer`], spawns a
//! [`RenderLoop`] with [`RenderLoopBuilder`], and binds the resulting
//! [`RenderLoopHandle`] to the scheduler as its graphics sink.

pub mod context;
pub mod latch;
pub mod surface;
pub mod thread;

pub use context::{GpuContext, LoopEvent, RenderCallbacks, Renderer};
pub use latch::{LifecycleLatch, LifecyclePhase};
pub use surface::SurfaceState;
pub use thread::{RenderLoop, RenderLoopBuilder, RenderLoopHandle};
