//! Hosted implementations of the system traits.

extern crate std;

use super::{Clock, Watchdog};
use std::time::{Duration, Instant};

/// A [`Clock`] backed by [`std::time::Instant`].
///
/// The origin is the moment the clock was created.
#[derive(Debug, Clone, Copy)]
pub struct StdClock {
    origin: Instant,
}

impl StdClock {
    /// Create a clock whose origin is now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for StdClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    fn sleep_ms(&mut self, ms: u32) {
        std::thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}

// Hosted targets have no hardware watchdog.
impl Watchdog for StdClock {}
