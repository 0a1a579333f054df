use tokio::time::Instant;

/// Monotonic clock shared by the scheduler and every dispatcher it drives.
///
/// Readings are seconds (f64) since the clock was created, so traces from one
/// run share a single origin. Built on `tokio::time::Instant` which makes it
/// follow the paused clock in tests.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    origin: Instant,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    #[inline]
    pub fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
