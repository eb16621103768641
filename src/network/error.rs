//! Common error types for network operations

/// A common error type for network operations.
///
/// This enum defines the errors a transport or a protocol client can report.
/// It is designed to be simple and portable for `no_std` environments.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// An operation was attempted on a connection that is not open.
    NotOpen,
    /// An error occurred during a write operation.
    WriteError,
    /// An error occurred during a read operation.
    ReadError,
    /// A connection attempt was refused, or the server rejected the login.
    ConnectionRefused,
    /// A timeout occurred.
    Timeout,
    /// The operation would block; try again later.
    WouldBlock,
    /// The connection was closed.
    ConnectionClosed,
    /// An invalid address was provided.
    InvalidAddress,
    /// A protocol-specific error occurred.
    ProtocolError,
    /// A frame did not fit into its fixed-size buffer.
    BufferOverflow,
}

impl Error {
    /// Whether the error is transient backpressure that a retry may clear.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::WouldBlock | Error::Timeout)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::NotOpen => defmt::write!(f, "NotOpen"),
            Error::WriteError => defmt::write!(f, "WriteError"),
            Error::ReadError => defmt::write!(f, "ReadError"),
            Error::ConnectionRefused => defmt::write!(f, "ConnectionRefused"),
            Error::Timeout => defmt::write!(f, "Timeout"),
            Error::WouldBlock => defmt::write!(f, "WouldBlock"),
            Error::ConnectionClosed => defmt::write!(f, "ConnectionClosed"),
            Error::InvalidAddress => defmt::write!(f, "InvalidAddress"),
            Error::ProtocolError => defmt::write!(f, "ProtocolError"),
            Error::BufferOverflow => defmt::write!(f, "BufferOverflow"),
        }
    }
}
