//! Infrastructure used by the scheduler: paused-admission buffers and the
//! delay timer thread.

pub mod queue;
pub mod timer;

pub use queue::TieredQueue;
pub use timer::DelayTimer;
