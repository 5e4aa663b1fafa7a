//! Fixed-cadence gate for the marker scan loop.

use std::time::{Duration, Instant};

/// Lets at most one scan through per `interval`.
#[derive(Debug, Clone)]
pub struct ScanThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl ScanThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// True (and records `now`) if a scan may run at `now`.
    pub fn ready(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}
