//! Plain TCP transport on `std::net`.

use crate::network::error::Error;
use crate::network::{Close, Connect, Connection, Read, Timeout, Write};
use std::io::{self, Read as _, Write as _};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

/// Default bound on opening a connection.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u32 = 5000;

/// Maps an I/O error onto the transport error set. `fallback` is used for
/// errors that say nothing more specific than "the operation failed".
pub(crate) fn io_error(e: &io::Error, fallback: Error) -> Error {
    match e.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => Error::WouldBlock,
        io::ErrorKind::TimedOut => Error::Timeout,
        io::ErrorKind::ConnectionRefused => Error::ConnectionRefused,
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::UnexpectedEof => Error::ConnectionClosed,
        io::ErrorKind::NotConnected => Error::NotOpen,
        io::ErrorKind::InvalidInput | io::ErrorKind::AddrNotAvailable => Error::InvalidAddress,
        _ => fallback,
    }
}

/// An open TCP connection.
#[derive(Debug)]
pub struct TcpConnection {
    stream: TcpStream,
}

impl TcpConnection {
    /// Wraps a connected stream.
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }

    /// The underlying stream.
    pub fn into_inner(self) -> TcpStream {
        self.stream
    }
}

impl Read for TcpConnection {
    type Error = Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.stream
            .read(buf)
            .map_err(|e| io_error(&e, Error::ReadError))
    }
}

impl Write for TcpConnection {
    type Error = Error;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.stream
            .write(buf)
            .map_err(|e| io_error(&e, Error::WriteError))
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.stream
            .flush()
            .map_err(|e| io_error(&e, Error::WriteError))
    }
}

impl Close for TcpConnection {
    type Error = Error;

    fn close(self) -> Result<(), Self::Error> {
        match self.stream.shutdown(Shutdown::Both) {
            Err(e) if e.kind() != io::ErrorKind::NotConnected => {
                Err(io_error(&e, Error::ConnectionClosed))
            }
            _ => Ok(()),
        }
    }
}

impl Timeout for TcpConnection {
    type Error = Error;

    fn set_timeout(&mut self, timeout_ms: u32) -> Result<(), Self::Error> {
        let result = if timeout_ms == 0 {
            self.stream.set_nonblocking(true)
        } else {
            self.stream.set_nonblocking(false).and_then(|()| {
                self.stream
                    .set_read_timeout(Some(Duration::from_millis(u64::from(timeout_ms))))
            })
        };
        result.map_err(|e| io_error(&e, Error::ProtocolError))
    }
}

impl Connection for TcpConnection {}

/// Opens [`TcpConnection`]s to `host:port` addresses.
#[derive(Debug, Clone, Copy)]
pub struct TcpConnector {
    connect_timeout_ms: u32,
}

impl TcpConnector {
    /// A connector with the default connect timeout.
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_CONNECT_TIMEOUT_MS)
    }

    /// A connector giving up after `timeout_ms`, however many addresses the
    /// host resolves to.
    pub fn with_timeout(timeout_ms: u32) -> Self {
        Self {
            connect_timeout_ms: timeout_ms.max(1),
        }
    }

    pub(crate) fn open(&self, remote: &str, deadline: Instant) -> Result<TcpStream, Error> {
        let addrs = remote
            .to_socket_addrs()
            .map_err(|_| Error::InvalidAddress)?;

        let mut last = Error::InvalidAddress;
        for addr in addrs {
            let Some(left) = remaining(deadline) else {
                last = Error::Timeout;
                break;
            };
            match TcpStream::connect_timeout(&addr, left) {
                Ok(stream) => {
                    let _ = stream.set_nodelay(true);
                    return Ok(stream);
                }
                Err(e) => last = io_error(&e, Error::ConnectionRefused),
            }
        }
        Err(last)
    }
}

/// Time left until `deadline`, `None` once it has passed.
pub(crate) fn remaining(deadline: Instant) -> Option<Duration> {
    deadline
        .checked_duration_since(Instant::now())
        .filter(|left| !left.is_zero())
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connect for TcpConnector {
    type Connection = TcpConnection;
    type Error = Error;

    fn connect(&mut self, remote: &str) -> Result<Self::Connection, Self::Error> {
        let deadline = Instant::now() + Duration::from_millis(u64::from(self.connect_timeout_ms));
        self.open(remote, deadline).map(TcpConnection::new)
    }
}
