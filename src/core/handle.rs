//! Advisory cancellation handles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cancelable handle for a delayed or running task.
///
/// Cancellation is best effort: it prevents a delayed task from firing and a
/// queued pool job from starting, but cannot interrupt a task that is already
/// executing. The generation distinguishes successive submissions that share
/// an id.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    generation: u64,
    canceled: Arc<AtomicBool>,
}

impl TaskHandle {
    /// Create a fresh, uncanceled handle.
    #[must_use]
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            canceled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Generation assigned at submission.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested on this handle or any clone of it.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }
}
