//! # blynk-device - Blynk IoT device client
//!
//! A Rust implementation of the device side of the Blynk cloud protocol.
//! A device keeps one authenticated connection to the Blynk server, answers
//! its heartbeats, and exposes *virtual pins* (application callbacks) and
//! *hardware pins* (GPIO, ADC, PWM) that the server reads and writes. The
//! library is designed for embedded systems and supports `no_std`
//! environments without a heap.
//!
//! ## Features
//!
//! ### Protocol Client
//! - Framed binary protocol with login, heartbeat and server pings
//! - Automatic reconnect with a fixed back-off
//! - Per-second send budget for application messages
//! - Virtual pin callbacks and server-configured hardware pins
//! - Periodic user task driven by the same cooperative loop
//!
//! ### Platform Abstraction
//! - Transport traits with an explicit timeout contract
//! - Clock and watchdog traits for bare-metal and hosted targets
//! - TCP and TLS transports for Linux-class devices
//!
//! ## Usage
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! blynk-device = "0.1.0"
//! ```
//!
//! ### Hosted Example
//!
//! ```rust,ignore
//! use blynk_device::network::application::blynk::{Client, Options, Publisher};
//! use blynk_device::network::client::tcp::TcpConnector;
//!
//! fn on_slider(publisher: &mut dyn Publisher, value: &str) {
//!     let _ = publisher.virtual_write(1, &value);
//! }
//!
//! let mut client = Client::new(TcpConnector::new(), MyBoard::new(), Options::new("auth-token"));
//! client.register_virtual_pin(0, None, Some(on_slider)).unwrap();
//! client.run().unwrap();
//! ```
//!
//! ## Platform Support
//!
//! This library is designed to work on:
//! - Embedded microcontrollers (ARM Cortex-M, RISC-V, etc.)
//! - Linux-based IoT devices (Raspberry Pi, etc.)
//! - Any platform supporting Rust's `core` library
//!
//! ## Optional Features
//!
//! - `std`: Enable standard library support: [`system::StdClock`] and the TCP transport
//! - `tls`: TLS transport built on `rustls` (implies `std`)
//! - `defmt`: Enable defmt logging support for embedded debugging
//! - `log`: Log through the `log` facade on hosted targets

#![cfg_attr(not(any(feature = "std", test)), no_std)]
#![deny(missing_docs)]
#![warn(missing_debug_implementations)]

#[macro_use]
mod fmt;

/// Network abstraction layer providing the transport traits, hosted
/// transports and the Blynk protocol client.
pub mod network;

/// System utilities for embedded devices.
///
/// Contains the clock and watchdog abstractions the protocol loop is driven
/// by.
pub mod system;
