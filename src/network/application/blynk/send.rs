//! Rate-limited send pipeline.
//!
//! Regular frames share a per-second budget; priority frames (login,
//! heartbeat, ping responses) always go out. Writes that hit transient
//! backpressure are retried a few times with a short sleep in between.

use super::link::Transport;
use super::{MAX_TX_RETRIES, RETX_DELAY_MS};
use crate::network::error::Error;
use crate::system::Clock;

/// How a frame is treated by the rate window.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Priority {
    /// Application traffic, subject to the per-second budget.
    Regular,
    /// Protocol housekeeping, never rate limited.
    Urgent,
}

/// What happened to a frame handed to the send pipeline.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Sent {
    /// The whole frame was written.
    Transmitted,
    /// Dropped: the per-second budget is spent.
    RateLimited,
    /// Dropped: the transport kept refusing the write.
    Backpressure,
    /// Dropped: not logged in.
    Offline,
}

impl Sent {
    /// Whether the frame reached the transport.
    pub fn is_transmitted(&self) -> bool {
        matches!(self, Sent::Transmitted)
    }
}

/// One-second send budget.
///
/// [`RateWindow::roll`] is the single "has a new second started" check of
/// the scheduler loop; the caller piggybacks the watchdog feed and heartbeat
/// check on its result.
#[derive(Debug, Clone, Copy)]
pub struct RateWindow {
    second: Option<u64>,
    count: u16,
    budget: u16,
}

impl RateWindow {
    /// Creates a window allowing `budget` regular frames per second.
    pub fn new(budget: u16) -> Self {
        Self {
            second: None,
            count: 0,
            budget,
        }
    }

    /// Moves the window to `now_secs`.
    ///
    /// Returns `true` and clears the count when a new second has started.
    pub fn roll(&mut self, now_secs: u64) -> bool {
        if self.second == Some(now_secs) {
            return false;
        }
        self.second = Some(now_secs);
        self.count = 0;
        true
    }

    /// Whether a frame of `priority` may be sent now.
    pub fn admits(&self, priority: Priority) -> bool {
        priority == Priority::Urgent || self.count < self.budget
    }

    /// Accounts for one transmitted frame.
    pub fn record(&mut self) {
        self.count = self.count.saturating_add(1);
    }

    /// Clears the count without moving the window.
    pub fn reset(&mut self) {
        self.count = 0;
    }

    /// Frames transmitted in the current second.
    pub fn count(&self) -> u16 {
        self.count
    }
}

/// Writes a whole frame, retrying transient backpressure.
///
/// Returns `Ok(false)` when the retries ran out before any byte was written;
/// the frame is then dropped and the stream is still in sync.
///
/// # Errors
///
/// Any non-transient transport error, or [`Error::WriteError`] when the
/// retries ran out in the middle of a frame (the stream can no longer be
/// framed correctly).
pub fn write_frame<T, K>(conn: &mut T, clock: &mut K, frame: &[u8]) -> Result<bool, Error>
where
    T: Transport,
    K: Clock + ?Sized,
{
    let mut written = 0;
    let mut retries = 0;

    while written < frame.len() {
        match conn.write(&frame[written..]) {
            Ok(0) => return Err(Error::WriteError),
            Ok(n) => written += n,
            Err(e) if e.is_transient() => {
                if retries == MAX_TX_RETRIES {
                    return if written == 0 {
                        Ok(false)
                    } else {
                        Err(Error::WriteError)
                    };
                }
                retries += 1;
                clock.sleep_ms(RETX_DELAY_MS);
            }
            Err(e) => return Err(e),
        }
    }

    match conn.flush() {
        Err(e) if !e.is_transient() => Err(e),
        _ => Ok(true),
    }
}
