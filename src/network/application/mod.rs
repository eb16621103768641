//! # Application Layer Network Protocols
//!
//! Protocol clients built on the core network traits. They never open
//! sockets themselves: a [`Connect`](crate::network::Connect) implementation
//! supplied by the platform does that.
//!
//! ## Available Protocols
//!
//! - **[`blynk`]**: device side of the Blynk IoT cloud protocol
//!
//! ## Design Principles
//!
//! - **Connection Agnostic**: Work with any type implementing [`Connection`](crate::network::Connection)
//! - **No-std Compatible**: Designed for embedded systems without heap allocation
//! - **Resource Conscious**: Use fixed-size buffers and minimal memory

/// Blynk device client.
///
/// Keeps an authenticated connection to a Blynk server and maps server
/// commands onto virtual and hardware pins.
pub mod blynk;
