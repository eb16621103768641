//! A network abstraction layer for embedded systems
//!
//! This module provides the small set of traits the protocol clients are
//! written against. A platform supplies a [`Connect`] implementation that
//! opens [`Connection`]s; the clients never touch sockets directly.
//!
//! # Transport contract
//!
//! The protocol engine runs in a single cooperative loop and must never block
//! for longer than it asks to. Implementations therefore follow these rules:
//!
//! - [`Timeout::set_timeout`] with `0` puts the connection into non-blocking
//!   mode; any other value bounds every subsequent [`Read::read`] to that many
//!   milliseconds.
//! - A read that finds no data within the bound returns
//!   [`Error::WouldBlock`](error::Error::WouldBlock) or
//!   [`Error::Timeout`](error::Error::Timeout). Both are transient.
//! - `Ok(0)` from [`Read::read`] with a non-empty buffer means the peer closed
//!   the stream.
//! - A write that cannot make progress right now returns
//!   [`Error::WouldBlock`](error::Error::WouldBlock); the caller retries.
//! - [`Connect::connect`] returns, with a connection or an error, within a
//!   bound of its own. Clients feed their watchdog around the call, so that
//!   bound must stay below the watchdog timeout.

#![deny(unsafe_code)]

/// Common error types for network operations
pub mod error;

/// Concrete transports for hosted targets
pub mod client;

/// Application layer protocol implementations
pub mod application;

/// Re-exports of common traits
pub mod prelude {
    pub use super::{Close, Connect, Connection, Read, Timeout, Write};
}

/// Read half of a connection.
pub trait Read {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Read data from the connection
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
}

/// Write half of a connection.
pub trait Write {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Write data to the connection
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error>;
    /// Flush the write buffer
    fn flush(&mut self) -> Result<(), Self::Error>;
}

/// Closing a connection releases it.
pub trait Close {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Close the connection
    fn close(self) -> Result<(), Self::Error>;
}

/// Bounded waiting on the read side of a connection.
pub trait Timeout {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Bound subsequent reads to `timeout_ms`; `0` means non-blocking.
    fn set_timeout(&mut self, timeout_ms: u32) -> Result<(), Self::Error>;
}

/// A synchronous connection
pub trait Connection: Read + Write + Close {}

/// A synchronous connector (client)
pub trait Connect {
    /// Associated connection type
    type Connection: Connection;
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Open a connection to `remote`, given as `host:port`
    fn connect(&mut self, remote: &str) -> Result<Self::Connection, Self::Error>;
}
