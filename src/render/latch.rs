//! Edge detection for pause/resume callbacks.

/// Phase last reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecyclePhase {
    /// `on_resume` was the last callback fired.
    Resumed,
    /// `on_pause` was the last callback fired.
    Paused,
}

/// Fires each pause/resume callback once per observed edge.
///
/// The render loop observes its paused flag every time it wakes. A pause
/// followed by a resume that the loop never observed collapses into nothing.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleLatch {
    reported: Option<LifecyclePhase>,
}

impl LifecycleLatch {
    /// A latch that has reported nothing yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { reported: None }
    }

    /// Record an observation. Returns `true` if it is a new edge whose
    /// callback should fire.
    pub fn observe(&mut self, phase: LifecyclePhase) -> bool {
        if self.reported == Some(phase) {
            return false;
        }
        self.reported = Some(phase);
        true
    }

    /// Last phase reported, if any.
    #[must_use]
    pub const fn reported(&self) -> Option<LifecyclePhase> {
        self.reported
    }
}
