//! Heartbeat liveness tracking.
//!
//! At most one heartbeat is in flight. A new one is due `period` seconds
//! after the previous one was sent; an unanswered one kills the connection
//! `timeout` seconds after it was sent.

/// What the tracker wants done this second.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Liveness {
    /// Nothing to do.
    Alive,
    /// Send a ping now.
    PingDue,
    /// The outstanding ping was not answered in time.
    Dead,
}

/// Heartbeat state of one connection.
#[derive(Debug, Default, Clone, Copy)]
pub struct Heartbeat {
    last_sent: u64,
    outstanding: u16,
}

impl Heartbeat {
    /// A tracker for a connection established at `now_secs`.
    pub fn new(now_secs: u64) -> Self {
        Self {
            last_sent: now_secs,
            outstanding: 0,
        }
    }

    /// Id of the unanswered ping, `0` if none.
    pub fn outstanding(&self) -> u16 {
        self.outstanding
    }

    /// Decides what to do at `now_secs`.
    pub fn check(&self, now_secs: u64, period_secs: u16, timeout_secs: u16) -> Liveness {
        let elapsed = now_secs.saturating_sub(self.last_sent);
        if self.outstanding != 0 {
            if elapsed >= u64::from(timeout_secs) {
                Liveness::Dead
            } else {
                Liveness::Alive
            }
        } else if elapsed >= u64::from(period_secs) {
            Liveness::PingDue
        } else {
            Liveness::Alive
        }
    }

    /// Records a ping with `id` sent at `now_secs`.
    pub fn sent(&mut self, id: u16, now_secs: u64) {
        self.last_sent = now_secs;
        self.outstanding = id;
    }

    /// Handles a response; returns whether it answered the outstanding ping.
    pub fn answered(&mut self, id: u16) -> bool {
        if self.outstanding != 0 && self.outstanding == id {
            self.outstanding = 0;
            true
        } else {
            false
        }
    }
}
