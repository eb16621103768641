//! TLS transport on `rustls`.
//!
//! The server certificate is checked against the bundled Mozilla roots, or
//! against a private CA loaded from a PEM file for self-hosted servers.

use super::tcp::{io_error, remaining, TcpConnector, DEFAULT_CONNECT_TIMEOUT_MS};
use crate::network::error::Error;
use crate::network::{Close, Connect, Connection, Read, Timeout, Write};
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read as _, Write as _};
use std::net::{Shutdown, TcpStream};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Failure while building a [`TlsConnector`].
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TlsSetupError {
    /// The CA file could not be read.
    CaFile(io::ErrorKind),
    /// A certificate in the CA file was rejected.
    InvalidCertificate,
    /// The CA file holds no certificate.
    NoCertificates,
}

/// An open TLS connection.
pub struct TlsConnection {
    stream: StreamOwned<ClientConnection, TcpStream>,
}

impl fmt::Debug for TlsConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsConnection")
            .field("peer", &self.stream.sock.peer_addr().ok())
            .finish_non_exhaustive()
    }
}

impl Read for TlsConnection {
    type Error = Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.stream
            .read(buf)
            .map_err(|e| io_error(&e, Error::ReadError))
    }
}

impl Write for TlsConnection {
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

impl Close for TlsConnection {
    type Error = Error;

    fn close(mut self) -> Result<(), Self::Error> {
        self.stream.conn.send_close_notify();
        let _ = self.stream.conn.complete_io(&mut self.stream.sock);
        match self.stream.sock.shutdown(Shutdown::Both) {
            Err(e) if e.kind() != io::ErrorKind::NotConnected => {
                Err(io_error(&e, Error::ConnectionClosed))
            }
            _ => Ok(()),
        }
    }
}

impl Timeout for TlsConnection {
    type Error = Error;

    fn set_timeout(&mut self, timeout_ms: u32) -> Result<(), Self::Error> {
        let sock = &self.stream.sock;
        let result = if timeout_ms == 0 {
            sock.set_nonblocking(true)
        } else {
            sock.set_nonblocking(false).and_then(|()| {
                sock.set_read_timeout(Some(Duration::from_millis(u64::from(timeout_ms))))
            })
        };
        result.map_err(|e| io_error(&e, Error::ProtocolError))
    }
}

impl Connection for TlsConnection {}

/// Opens [`TlsConnection`]s to `host:port` addresses. The host part is also
/// the name the certificate must match.
#[derive(Debug, Clone)]
pub struct TlsConnector {
    config: Arc<ClientConfig>,
    tcp: TcpConnector,
    timeout_ms: u32,
}

impl TlsConnector {
    /// A connector trusting the bundled web PKI roots.
    pub fn new() -> Self {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        Self::with_roots(roots)
    }

    /// A connector trusting only the certificates in the PEM file at `path`.
    pub fn with_ca_file(path: impl AsRef<Path>) -> Result<Self, TlsSetupError> {
        let file = File::open(path).map_err(|e| TlsSetupError::CaFile(e.kind()))?;
        let mut reader = BufReader::new(file);

        let mut roots = RootCertStore::empty();
        for cert in rustls_pemfile::certs(&mut reader) {
            let cert = cert.map_err(|e| TlsSetupError::CaFile(e.kind()))?;
            roots
                .add(cert)
                .map_err(|_| TlsSetupError::InvalidCertificate)?;
        }
        if roots.is_empty() {
            return Err(TlsSetupError::NoCertificates);
        }
        Ok(Self::with_roots(roots))
    }

    fn with_roots(roots: RootCertStore) -> Self {
        let config = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        Self {
            config: Arc::new(config),
            tcp: TcpConnector::new(),
            timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
        }
    }

    /// Bounds the TCP connect and the handshake together to `timeout_ms`.
    pub fn timeout(mut self, timeout_ms: u32) -> Self {
        self.timeout_ms = timeout_ms.max(1);
        self
    }
}

impl Default for TlsConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connect for TlsConnector {
    type Connection = TlsConnection;
    type Error = Error;

    fn connect(&mut self, remote: &str) -> Result<Self::Connection, Self::Error> {
        let (host, _) = remote.rsplit_once(':').ok_or(Error::InvalidAddress)?;
        let name = ServerName::try_from(host.to_string()).map_err(|_| Error::InvalidAddress)?;

        let deadline = Instant::now() + Duration::from_millis(u64::from(self.timeout_ms));
        let sock = self.tcp.open(remote, deadline)?;

        let conn = ClientConnection::new(Arc::clone(&self.config), name)
            .map_err(|_| Error::ProtocolError)?;
        let mut stream = StreamOwned::new(conn, sock);
        while stream.conn.is_handshaking() {
            let step = match remaining(deadline) {
                Some(left) => stream
                    .sock
                    .set_read_timeout(Some(left))
                    .and_then(|()| stream.sock.set_write_timeout(Some(left)))
                    .and_then(|()| stream.conn.complete_io(&mut stream.sock).map(|_| ()))
                    .map_err(|e| io_error(&e, Error::ConnectionRefused)),
                None => Err(Error::Timeout),
            };
            if let Err(e) = step {
                warn!("tls: handshake with {} failed: {:?}", host, e);
                return Err(e);
            }
        }
        Ok(TlsConnection { stream })
    }
}
