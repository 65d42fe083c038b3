//! Serializable diagnostics models.

use serde::{Deserialize, Serialize};

use crate::core::{ExecutionEnvironment, PoolStats, Scheduler};

/// Pool snapshot data for listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    /// Environment the pool serves.
    pub environment: ExecutionEnvironment,
    /// Counters at snapshot time.
    pub stats: PoolStats,
}

/// Point-in-time view of a scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerSnapshot {
    /// Whether tasks are dispatched rather than buffered.
    pub resumed: bool,
    /// Whether the scheduler has been destroyed.
    pub destroyed: bool,
    /// Buffered HIGH tasks.
    pub buffered_high: usize,
    /// Buffered NORMAL tasks.
    pub buffered_normal: usize,
    /// Buffered LOW tasks.
    pub buffered_low: usize,
    /// Cancelable delayed tasks.
    pub delayed: usize,
    /// Cancelable tasks dispatched to a pool and not yet finished.
    pub running: usize,
    /// Graphics tasks waiting in the fallback queue.
    pub graphics_queued: usize,
    /// Whether a graphics sink is bound.
    pub separate_graphics_invocation: bool,
    /// One entry per pooled environment.
    pub pools: Vec<PoolSnapshot>,
    /// Snapshot time (ms since epoch).
    pub taken_at_ms: u128,
}

impl SchedulerSnapshot {
    /// Tasks buffered across all tiers.
    #[must_use]
    pub const fn buffered(&self) -> usize {
        self.buffered_high + self.buffered_normal + self.buffered_low
    }
}

/// Health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    /// Healthy flag.
    pub ok: bool,
    /// Whether the scheduler is dispatching.
    pub resumed: bool,
}

/// Report scheduler health: healthy until destroyed.
#[must_use]
pub fn health(scheduler: &Scheduler) -> Health {
    Health {
        ok: !scheduler.is_destroyed(),
        resumed: scheduler.is_resumed(),
    }
}
