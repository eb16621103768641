//! System utilities for embedded devices.
//!
//! The protocol engine never reads a hardware timer or touches a watchdog
//! peripheral itself; it goes through the two small traits defined here so the
//! same loop runs on a microcontroller, on a hosted Linux board, or against a
//! simulated clock in tests.
//!
//! # Available Utilities
//!
//! - **[`Clock`]**: monotonic milliseconds and bounded sleeping
//! - **[`Watchdog`]**: an external liveness timer that must be fed
//! - **[`StdClock`]**: a [`Clock`] backed by `std::time` (feature `std`)
//!
//! # Usage
//!
//! ```rust
//! use blynk_device::system::{Clock, Watchdog};
//!
//! struct Ticks(u64);
//!
//! impl Clock for Ticks {
//!     fn now_ms(&self) -> u64 {
//!         self.0
//!     }
//!     fn sleep_ms(&mut self, ms: u32) {
//!         self.0 += u64::from(ms);
//!     }
//! }
//!
//! // A board without a watchdog keeps the default no-op methods.
//! impl Watchdog for Ticks {}
//!
//! let mut clock = Ticks(0);
//! clock.sleep_ms(50);
//! assert_eq!(clock.now_secs(), 0);
//! clock.sleep_ms(950);
//! assert_eq!(clock.now_secs(), 1);
//! ```

/// A monotonic time source that can also suspend the caller.
pub trait Clock {
    /// Milliseconds since an arbitrary, fixed origin.
    fn now_ms(&self) -> u64;

    /// Suspend the caller for `ms` milliseconds.
    fn sleep_ms(&mut self, ms: u32);

    /// Whole seconds since the origin.
    fn now_secs(&self) -> u64 {
        self.now_ms() / 1000
    }
}

/// An external liveness timer.
///
/// Once started, the watchdog restarts the device unless it is fed at least
/// once per `timeout_ms`.
pub trait Watchdog {
    /// Arm the watchdog.
    fn start_watchdog(&mut self, _timeout_ms: u32) {}

    /// Reset the watchdog countdown.
    fn feed_watchdog(&mut self) {}
}

#[cfg(feature = "std")]
mod host;

#[cfg(feature = "std")]
pub use host::StdClock;
