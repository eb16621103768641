//! Transports for hosted targets.
//!
//! Embedded boards bring their own [`Connect`](super::Connect) implementation
//! on top of their network stack. On Linux-class devices the blocking socket
//! API of `std` is enough:
//!
//! - **[`tcp`]**: plain TCP (feature `std`)
//! - **[`tls`]**: TCP wrapped in TLS with `rustls` (feature `tls`)

#[cfg(feature = "std")]
pub mod tcp;

#[cfg(feature = "tls")]
pub mod tls;
