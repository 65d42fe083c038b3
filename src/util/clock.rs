//! Wall-clock helpers.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
///
/// Returns 0 if the system clock is set before the epoch.
#[must_use]
pub fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

/// Frame interval for a target frame rate, clamped to at most 1000 fps.
///
/// Returns `None` for a zero rate, which means "unthrottled".
#[must_use]
pub fn frame_interval(target_fps: u32) -> Option<Duration> {
    if target_fps == 0 {
        return None;
    }
    Some(Duration::from_millis(1000 / u64::from(target_fps.min(1000))))
}
