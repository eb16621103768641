//! Blynk device protocol client for embedded systems.
//!
//! This module implements the device side of the Blynk cloud protocol: a
//! single authenticated connection to the server carrying small binary frames,
//! a heartbeat that detects dead links, a per-second send budget, and a
//! command dispatcher that maps server requests onto *virtual pins*
//! (application callbacks) and *hardware pins* (platform GPIO/ADC/PWM).
//!
//! # Protocol Overview
//!
//! Every message is a frame: a 5-byte header followed by `length` bytes of
//! ASCII payload.
//!
//! ```text
//! +---------+-----------+---------------+-------------------------------+
//! | type u8 | id u16 BE | length u16 BE | payload, fields joined by NUL |
//! +---------+-----------+---------------+-------------------------------+
//! ```
//!
//! Responses (`RSP`) reuse the `length` field as a status code; `200` is
//! success. Hardware commands (`HW`) carry a command token followed by its
//! arguments, e.g. `vw\x003\x0042` writes `42` to virtual pin 3.
//!
//! # Architecture
//!
//! ```text
//!               ┌──────────────────────── Client::poll ───────────────────────┐
//!               │                                                             │
//! Connect ──▶ Link ──▶ frame::Header ──▶ command::Command ──▶ VirtualPins     │
//!               ▲                                          └─▶ HardwarePins   │
//!               │                                                             │
//!      Publisher (rate window) ◀── callbacks / user task / Client API         │
//!               └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use blynk_device::network::application::blynk::{Client, Options, Publisher};
//! # use blynk_device::network::application::blynk::{HardwarePin, PinError, PinMode, Platform};
//! # use blynk_device::network::{error::Error, Close, Connect, Connection, Read, Timeout, Write};
//! # use blynk_device::system::{Clock, Watchdog};
//! # struct Net;
//! # struct Sock;
//! # impl Read for Sock { type Error = Error; fn read(&mut self, _: &mut [u8]) -> Result<usize, Error> { Err(Error::WouldBlock) } }
//! # impl Write for Sock { type Error = Error; fn write(&mut self, b: &[u8]) -> Result<usize, Error> { Ok(b.len()) } fn flush(&mut self) -> Result<(), Error> { Ok(()) } }
//! # impl Close for Sock { type Error = Error; fn close(self) -> Result<(), Error> { Ok(()) } }
//! # impl Timeout for Sock { type Error = Error; fn set_timeout(&mut self, _: u32) -> Result<(), Error> { Ok(()) } }
//! # impl Connection for Sock {}
//! # impl Connect for Net { type Connection = Sock; type Error = Error; fn connect(&mut self, _: &str) -> Result<Sock, Error> { Ok(Sock) } }
//! # struct Board;
//! # struct Gpio;
//! # impl HardwarePin for Gpio {
//! #     fn digital_read(&mut self) -> Result<bool, PinError> { Ok(false) }
//! #     fn digital_write(&mut self, _: bool) -> Result<(), PinError> { Ok(()) }
//! #     fn analog_read(&mut self) -> Result<i32, PinError> { Ok(0) }
//! #     fn analog_write(&mut self, _: i32) -> Result<(), PinError> { Ok(()) }
//! # }
//! # impl Clock for Board { fn now_ms(&self) -> u64 { 0 } fn sleep_ms(&mut self, _: u32) {} }
//! # impl Watchdog for Board {}
//! # impl Platform for Board { type Pin = Gpio; fn configure_pin(&mut self, _: u8, _: PinMode) -> Result<Gpio, PinError> { Ok(Gpio) } }
//!
//! fn report_uptime(publisher: &mut dyn Publisher) {
//!     let _ = publisher.virtual_write(5, &"alive");
//! }
//!
//! fn on_slider(publisher: &mut dyn Publisher, value: &str) {
//!     let _ = publisher.virtual_write(6, &value);
//! }
//!
//! let options = Options::new("my-auth-token");
//! let mut client = Client::new(Net, Board, options);
//! client.register_virtual_pin(4, None, Some(on_slider)).unwrap();
//! client.set_user_task(report_uptime, 1000).unwrap();
//! client.run().unwrap();
//! ```

#![deny(unsafe_code)]

pub mod client;
pub mod command;
pub mod frame;
pub mod heartbeat;
pub mod link;
pub mod options;
pub mod pins;
pub mod send;

pub use client::{Client, Publisher, TaskFn};
pub use command::{Command, CommandError, DispatchError};
pub use frame::{Header, MessageIds, MessageType};
pub use heartbeat::{Heartbeat, Liveness};
pub use link::{ConnectionState, Link, Transport};
pub use options::{Options, Timing};
pub use pins::{
    HardwarePin, HardwarePins, PinError, PinMode, Platform, VirtualPin, VirtualPins, VirtualReadFn,
    VirtualWriteFn,
};
pub use send::{Priority, RateWindow, Sent};

/// Size of the fixed frame header in bytes.
pub const HEADER_LEN: usize = 5;

/// Status code the server uses for a successful response.
pub const STATUS_SUCCESS: u16 = 200;

/// Number of addressable virtual pins.
pub const MAX_VIRTUAL_PINS: usize = 32;

/// Number of hardware pins that can be configured at once.
pub const MAX_HARDWARE_PINS: usize = 32;

/// Largest inbound payload the receive buffer holds.
pub const MAX_RX_PAYLOAD: usize = 1024;

/// Largest outbound frame, header included.
pub const MAX_TX_FRAME: usize = 512;

/// Granularity of the scheduler; user task periods are multiples of it.
pub const TASK_PERIOD_RES_MS: u32 = 50;

/// Idle sleep when an authenticated iteration received nothing.
pub const IDLE_TIME_MS: u32 = 5;

/// Delay between retries of a write that hit backpressure.
pub const RETX_DELAY_MS: u32 = 2;

/// Retries of a write that hit backpressure before the frame is dropped.
pub const MAX_TX_RETRIES: u8 = 3;

/// Errors raised while setting up the client.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SetupError {
    /// Virtual pin index outside `0..MAX_VIRTUAL_PINS`.
    InvalidVirtualPin,
    /// User task period is zero or not a multiple of [`TASK_PERIOD_RES_MS`].
    InvalidTaskPeriod,
    /// A bounded wait is not shorter than the heartbeat period or the watchdog.
    InvalidTiming,
}

#[cfg(feature = "defmt")]
impl defmt::Format for SetupError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            SetupError::InvalidVirtualPin => defmt::write!(f, "InvalidVirtualPin"),
            SetupError::InvalidTaskPeriod => defmt::write!(f, "InvalidTaskPeriod"),
            SetupError::InvalidTiming => defmt::write!(f, "InvalidTiming"),
        }
    }
}
