use std::time::Instant;

use super::note_age::Millis;

/// Millisecond clock shared by everything that timestamps note events.
#[derive(Debug, Clone, Copy)]
pub struct HostClock {
    start: Instant,
}

impl HostClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Milliseconds since the clock was created.
    pub fn now_ms(&self) -> Millis {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Default for HostClock {
    fn default() -> Self {
        Self::new()
    }
}
