//! Standard library implementations of platform traits.

use std::time::Instant;

use super::HostClock;

/// Clock backed by `std::time::Instant`.
pub struct StdClock {
    /// Reference instant; `now_millis` counts from here
    epoch: Instant,
}

impl StdClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl HostClock for StdClock {
    fn now_millis(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}
