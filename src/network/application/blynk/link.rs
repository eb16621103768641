//! Transport lifecycle, receive buffer and send path of one connection.

use super::frame::MessageIds;
use super::send::{self, Priority, RateWindow, Sent};
use super::MAX_RX_PAYLOAD;
use crate::network::error::Error;
use crate::network::{Close, Read, Timeout, Write};
use crate::system::Clock;
use heapless::Vec;

/// A connection the client can drive.
///
/// Blanket-implemented for every transport reporting
/// [`network::error::Error`](crate::network::error::Error).
pub trait Transport:
    Read<Error = Error> + Write<Error = Error> + Close<Error = Error> + Timeout<Error = Error>
{
}

impl<T> Transport for T where
    T: Read<Error = Error> + Write<Error = Error> + Close<Error = Error> + Timeout<Error = Error>
{
}

/// Received bytes handed out by [`Link::recv`].
pub type RxBuf = Vec<u8, MAX_RX_PAYLOAD>;

/// Where the client is in the connection lifecycle.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ConnectionState {
    /// No transport.
    Disconnected,
    /// Opening the transport.
    Connecting,
    /// Transport open, login sent.
    Authenticating,
    /// Logged in; application traffic flows.
    Authenticated,
}

#[cfg(feature = "defmt")]
impl defmt::Format for ConnectionState {
    fn format(&self, f: defmt::Formatter) {
        match self {
            ConnectionState::Disconnected => defmt::write!(f, "Disconnected"),
            ConnectionState::Connecting => defmt::write!(f, "Connecting"),
            ConnectionState::Authenticating => defmt::write!(f, "Authenticating"),
            ConnectionState::Authenticated => defmt::write!(f, "Authenticated"),
        }
    }
}

/// The live side of the client: transport, ids, send budget and the partial
/// receive buffer.
///
/// Any non-transient transport error seen here closes the transport and drops
/// the state to [`ConnectionState::Disconnected`]; the scheduler notices on
/// its next check and reconnects.
#[derive(Debug)]
pub struct Link<T> {
    conn: Option<T>,
    state: ConnectionState,
    ids: MessageIds,
    rate: RateWindow,
    rx: RxBuf,
    timeout_ms: Option<u32>,
}

impl<T: Transport> Link<T> {
    /// Creates a link with no transport attached.
    pub fn new(budget: u16) -> Self {
        Self {
            conn: None,
            state: ConnectionState::Disconnected,
            ids: MessageIds::new(),
            rate: RateWindow::new(budget),
            rx: Vec::new(),
            timeout_ms: None,
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            debug!("blynk: {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }

    /// Whether application traffic may be sent.
    pub fn is_authenticated(&self) -> bool {
        self.state == ConnectionState::Authenticated
    }

    /// Takes ownership of a freshly opened transport.
    pub fn attach(&mut self, conn: T) {
        self.close();
        self.conn = Some(conn);
    }

    /// Closes the transport, if any, and forgets buffered input.
    pub fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err(e) = conn.close() {
                trace!("blynk: close failed: {:?}", e);
            }
        }
        self.rx.clear();
        self.timeout_ms = None;
        self.set_state(ConnectionState::Disconnected);
    }

    /// Consumes the next message id.
    pub fn next_id(&mut self) -> u16 {
        self.ids.next_id()
    }

    /// The rate window, rolled by the scheduler once per iteration.
    pub fn rate_mut(&mut self) -> &mut RateWindow {
        &mut self.rate
    }

    /// Sends an encoded frame through the rate window.
    ///
    /// # Errors
    ///
    /// [`Error::NotOpen`] without a transport; any fatal transport error, in
    /// which case the link has already been closed.
    pub fn send<K: Clock + ?Sized>(
        &mut self,
        clock: &mut K,
        frame: &[u8],
        priority: Priority,
    ) -> Result<Sent, Error> {
        if !self.rate.admits(priority) {
            trace!("blynk: frame dropped, send budget spent");
            return Ok(Sent::RateLimited);
        }
        let conn = self.conn.as_mut().ok_or(Error::NotOpen)?;
        match send::write_frame(conn, clock, frame) {
            Ok(true) => {
                self.rate.record();
                Ok(Sent::Transmitted)
            }
            Ok(false) => {
                warn!("blynk: frame dropped after {} retries", super::MAX_TX_RETRIES);
                Ok(Sent::Backpressure)
            }
            Err(e) => {
                warn!("blynk: write failed: {:?}", e);
                self.close();
                Err(e)
            }
        }
    }

    /// Tries to complete `length` bytes of input, waiting at most
    /// `timeout_ms` (`0` = do not wait) for more data.
    ///
    /// Bytes that arrive short of `length` stay buffered for the next call.
    ///
    /// # Errors
    ///
    /// [`Error::ProtocolError`] if `length` exceeds the receive buffer,
    /// [`Error::ConnectionClosed`] on end of stream, or any fatal transport
    /// error. The link is closed in every case.
    pub fn recv(&mut self, length: usize, timeout_ms: u32) -> Result<Option<RxBuf>, Error> {
        match self.fill(length, timeout_ms) {
            Ok(()) => {}
            Err(e) => {
                warn!("blynk: read failed: {:?}", e);
                self.close();
                return Err(e);
            }
        }

        if self.rx.len() < length {
            return Ok(None);
        }
        let mut out = RxBuf::new();
        // `length` is bounded by the buffer capacity, checked in `fill`.
        let _ = out.extend_from_slice(&self.rx[..length]);
        let rest = self.rx.len() - length;
        self.rx.rotate_left(length);
        self.rx.truncate(rest);
        Ok(Some(out))
    }

    fn fill(&mut self, length: usize, timeout_ms: u32) -> Result<(), Error> {
        if length > self.rx.capacity() {
            return Err(Error::ProtocolError);
        }
        let start = self.rx.len();
        if start >= length {
            return Ok(());
        }
        let conn = self.conn.as_mut().ok_or(Error::NotOpen)?;
        if self.timeout_ms != Some(timeout_ms) {
            conn.set_timeout(timeout_ms)?;
            self.timeout_ms = Some(timeout_ms);
        }

        self.rx
            .resize(length, 0)
            .map_err(|_| Error::BufferOverflow)?;
        let result = conn.read(&mut self.rx[start..length]);
        let got = match result {
            Ok(0) => Err(Error::ConnectionClosed),
            Ok(n) => Ok(n),
            Err(e) if e.is_transient() => Ok(0),
            Err(e) => Err(e),
        };
        self.rx.truncate(start + *got.as_ref().unwrap_or(&0));
        got.map(|_| ())
    }
}
