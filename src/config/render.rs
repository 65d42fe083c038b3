//! Render loop configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::util::clock::frame_interval;

/// Graphics tasks drained before each draw call when nothing else is configured.
pub const DEFAULT_MAX_TASKS_PER_FRAME: usize = 16;

/// Render loop configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderLoopConfig {
    /// Drain cap: graphics tasks run before one draw call.
    pub max_tasks_per_frame: usize,
    /// Upper bound of one idle wait, in milliseconds.
    pub idle_wait_ms: u64,
    /// Frame-rate cap; `None` renders as fast as work arrives.
    pub target_frame_rate: Option<u32>,
    /// Whether the loop starts paused and waits for `do_resume`.
    pub start_paused: bool,
    /// Query GPU diagnostics after every draw and log them.
    pub debug_gpu_checks: bool,
    /// Name of the render thread.
    pub thread_name: String,
}

impl Default for RenderLoopConfig {
    fn default() -> Self {
        Self {
            max_tasks_per_frame: DEFAULT_MAX_TASKS_PER_FRAME,
            idle_wait_ms: 1_000,
            target_frame_rate: None,
            start_paused: true,
            debug_gpu_checks: cfg!(debug_assertions),
            thread_name: "render-loop".into(),
        }
    }
}

impl RenderLoopConfig {
    /// Create a config with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the drain cap.
    #[must_use]
    pub fn with_max_tasks_per_frame(mut self, max: usize) -> Self {
        self.max_tasks_per_frame = max;
        self
    }

    /// Set the frame-rate cap.
    #[must_use]
    pub fn with_target_frame_rate(mut self, fps: Option<u32>) -> Self {
        self.target_frame_rate = fps;
        self
    }

    /// Set whether the loop starts paused.
    #[must_use]
    pub fn with_start_paused(mut self, paused: bool) -> Self {
        self.start_paused = paused;
        self
    }

    /// Set the idle wait bound.
    #[must_use]
    pub fn with_idle_wait_ms(mut self, ms: u64) -> Self {
        self.idle_wait_ms = ms;
        self
    }

    /// Enable or disable debug GPU diagnostics.
    #[must_use]
    pub fn with_debug_gpu_checks(mut self, enabled: bool) -> Self {
        self.debug_gpu_checks = enabled;
        self
    }

    /// Idle wait bound as a duration.
    #[must_use]
    pub const fn idle_wait(&self) -> Duration {
        Duration::from_millis(self.idle_wait_ms)
    }

    /// Frame interval derived from the frame-rate cap.
    #[must_use]
    pub fn frame_interval(&self) -> Option<Duration> {
        self.target_frame_rate.and_then(frame_interval)
    }

    /// Validate render loop configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_tasks_per_frame == 0 {
            return Err("max_tasks_per_frame must be greater than 0".into());
        }
        if self.idle_wait_ms == 0 {
            return Err("idle_wait_ms must be greater than 0".into());
        }
        if self.target_frame_rate == Some(0) {
            return Err("target_frame_rate must be greater than 0 when set".into());
        }
        if self.thread_name.is_empty() {
            return Err("thread_name must not be empty".into());
        }
        Ok(())
    }
}
