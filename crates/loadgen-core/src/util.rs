use std::time::{SystemTime, UNIX_EPOCH};

#[inline]
pub fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Seconds (as recorded in traces) to whole microseconds, clamped at zero.
#[inline]
pub fn secs_to_us(secs: f64) -> u64 {
    if secs.is_finite() && secs > 0.0 {
        (secs * 1_000_000.0).round() as u64
    } else {
        0
    }
}
