//! Simulated server, transport and board for driving the client loop.
//!
//! Everything shares one [`World`]. Time only moves when the client sleeps or
//! waits on a read, so every test is deterministic.

use blynk_device::network::error::Error;
use blynk_device::network::{Close, Connect, Connection, Read, Timeout, Write};
use blynk_device::network::application::blynk::{
    Client, HardwarePin, Options, PinError, PinMode, Platform,
};
use blynk_device::system::{Clock, Watchdog};
use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

pub type Shared = Rc<RefCell<World>>;

pub type TestClient = Client<'static, Net, Board>;

/// A frame written by the device, as seen by the fake server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentFrame {
    pub at: u64,
    pub msg_type: u8,
    pub id: u16,
    pub length: u16,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinOp {
    Digital(bool),
    Analog(i32),
}

#[derive(Debug, Default)]
pub struct World {
    pub now_ms: u64,

    // server behaviour
    pub connect_failures: u32,
    pub connect_delay_ms: u64,
    pub login_status: Option<u16>,
    pub answer_pings: bool,
    pub peer_closed: bool,
    pub write_stalls: u32,

    // connection
    pub open: bool,
    pub timeout_ms: u32,
    pub inbound: VecDeque<u8>,
    pub scheduled: Vec<(u64, Vec<u8>)>,
    pub outbound: Vec<u8>,
    parsed: usize,

    // observations
    pub connects: u32,
    pub remotes: Vec<String>,
    pub closes: u32,
    pub closed_at: Vec<u64>,
    pub sent: Vec<SentFrame>,
    pub watchdog: Option<u32>,
    pub feeds: u32,
    pub fed_at: Vec<u64>,
    pub configured: Vec<(u8, PinMode)>,
    pub levels: BTreeMap<u8, i32>,
    pub pin_log: Vec<(u8, PinOp)>,
}

/// Header-only frame, or a frame carrying `payload`.
pub fn frame(msg_type: u8, id: u16, payload: &[u8]) -> Vec<u8> {
    let len = payload.len() as u16;
    let mut out = vec![msg_type];
    out.extend_from_slice(&id.to_be_bytes());
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// A response frame; the length field carries `status`.
pub fn response(id: u16, status: u16) -> Vec<u8> {
    let mut out = vec![0];
    out.extend_from_slice(&id.to_be_bytes());
    out.extend_from_slice(&status.to_be_bytes());
    out
}

impl World {
    /// Queues bytes readable right away.
    pub fn push(&mut self, bytes: &[u8]) {
        self.inbound.extend(bytes.iter().copied());
    }

    /// Queues bytes that become readable at `at` ms.
    pub fn schedule(&mut self, at: u64, bytes: &[u8]) {
        self.scheduled.push((at, bytes.to_vec()));
    }

    /// First frame of `msg_type` the device sent.
    pub fn first_sent(&self, msg_type: u8) -> Option<SentFrame> {
        self.sent.iter().find(|f| f.msg_type == msg_type).cloned()
    }

    /// Every frame of `msg_type` the device sent.
    pub fn sent_of(&self, msg_type: u8) -> Vec<SentFrame> {
        self.sent
            .iter()
            .filter(|f| f.msg_type == msg_type)
            .cloned()
            .collect()
    }

    /// Payloads of the hardware frames the device sent.
    pub fn hardware_payloads(&self) -> Vec<Vec<u8>> {
        self.sent_of(20).into_iter().map(|f| f.payload).collect()
    }

    fn release(&mut self) {
        let now = self.now_ms;
        let mut i = 0;
        while i < self.scheduled.len() {
            if self.scheduled[i].0 <= now {
                let (_, bytes) = self.scheduled.remove(i);
                self.inbound.extend(bytes);
            } else {
                i += 1;
            }
        }
    }

    fn next_arrival(&self) -> Option<u64> {
        self.scheduled.iter().map(|(at, _)| *at).min()
    }

    /// Decodes complete frames the device wrote and plays the server side.
    fn on_write(&mut self) {
        loop {
            let rest = &self.outbound[self.parsed..];
            if rest.len() < 5 {
                break;
            }
            let msg_type = rest[0];
            let id = u16::from_be_bytes([rest[1], rest[2]]);
            let length = u16::from_be_bytes([rest[3], rest[4]]);
            let payload_len = if msg_type == 0 { 0 } else { usize::from(length) };
            if rest.len() < 5 + payload_len {
                break;
            }
            let payload = rest[5..5 + payload_len].to_vec();
            self.parsed += 5 + payload_len;
            self.sent.push(SentFrame {
                at: self.now_ms,
                msg_type,
                id,
                length,
                payload,
            });

            match msg_type {
                2 => {
                    if let Some(status) = self.login_status {
                        self.push(&response(id, status));
                    }
                }
                6 => {
                    if self.answer_pings {
                        self.push(&response(id, 200));
                    }
                }
                _ => {}
            }
        }
    }
}

/// A world with a server that accepts the login and answers heartbeats.
pub fn world() -> Shared {
    Rc::new(RefCell::new(World {
        login_status: Some(200),
        answer_pings: true,
        ..World::default()
    }))
}

pub fn client(world: &Shared, options: Options<'static>) -> TestClient {
    Client::new(Net(world.clone()), Board(world.clone()), options)
}

/// A started client that has completed its login.
pub fn logged_in(world: &Shared) -> TestClient {
    let mut client = client(world, Options::new("abc"));
    client.start().unwrap();
    for _ in 0..10 {
        client.poll();
        if client.state() == blynk_device::network::application::blynk::ConnectionState::Authenticated {
            return client;
        }
    }
    panic!("client did not log in");
}

pub struct Net(pub Shared);

impl Connect for Net {
    type Connection = Socket;
    type Error = Error;

    fn connect(&mut self, remote: &str) -> Result<Self::Connection, Self::Error> {
        let mut w = self.0.borrow_mut();
        w.connects += 1;
        w.remotes.push(remote.to_string());
        w.now_ms += w.connect_delay_ms;
        if w.connect_failures > 0 {
            w.connect_failures -= 1;
            return Err(Error::ConnectionRefused);
        }
        w.open = true;
        w.peer_closed = false;
        w.inbound.clear();
        w.timeout_ms = 0;
        Ok(Socket(self.0.clone()))
    }
}

pub struct Socket(Shared);

impl Read for Socket {
    type Error = Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut w = self.0.borrow_mut();
        if !w.open {
            return Err(Error::NotOpen);
        }
        w.release();
        if w.inbound.is_empty() {
            if w.peer_closed {
                return Ok(0);
            }
            if w.timeout_ms == 0 {
                return Err(Error::WouldBlock);
            }
            let deadline = w.now_ms + u64::from(w.timeout_ms);
            match w.next_arrival() {
                Some(at) if at <= deadline => {
                    w.now_ms = w.now_ms.max(at);
                    w.release();
                }
                _ => {
                    w.now_ms = deadline;
                    return Err(Error::Timeout);
                }
            }
        }
        let n = buf.len().min(w.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(w.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for Socket {
    type Error = Error;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let mut w = self.0.borrow_mut();
        if !w.open {
            return Err(Error::NotOpen);
        }
        if w.write_stalls > 0 {
            w.write_stalls -= 1;
            return Err(Error::WouldBlock);
        }
        w.outbound.extend_from_slice(buf);
        w.on_write();
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Close for Socket {
    type Error = Error;

    fn close(self) -> Result<(), Self::Error> {
        let mut w = self.0.borrow_mut();
        w.open = false;
        w.closes += 1;
        let now = w.now_ms;
        w.closed_at.push(now);
        w.inbound.clear();
        Ok(())
    }
}

impl Timeout for Socket {
    type Error = Error;

    fn set_timeout(&mut self, timeout_ms: u32) -> Result<(), Self::Error> {
        self.0.borrow_mut().timeout_ms = timeout_ms;
        Ok(())
    }
}

impl Connection for Socket {}

pub struct Board(pub Shared);

impl Clock for Board {
    fn now_ms(&self) -> u64 {
        self.0.borrow().now_ms
    }

    fn sleep_ms(&mut self, ms: u32) {
        self.0.borrow_mut().now_ms += u64::from(ms);
    }
}

impl Watchdog for Board {
    fn start_watchdog(&mut self, timeout_ms: u32) {
        self.0.borrow_mut().watchdog = Some(timeout_ms);
    }

    fn feed_watchdog(&mut self) {
        let mut w = self.0.borrow_mut();
        w.feeds += 1;
        let now = w.now_ms;
        w.fed_at.push(now);
    }
}

impl Platform for Board {
    type Pin = MockPin;

    fn configure_pin(&mut self, pin: u8, mode: PinMode) -> Result<MockPin, PinError> {
        let mut w = self.0.borrow_mut();
        w.configured.push((pin, mode));
        if pin >= 40 {
            return Err(PinError::Unsupported);
        }
        Ok(MockPin {
            pin,
            world: self.0.clone(),
        })
    }
}

pub struct MockPin {
    pin: u8,
    world: Shared,
}

impl std::fmt::Debug for MockPin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MockPin({})", self.pin)
    }
}

impl HardwarePin for MockPin {
    fn digital_read(&mut self) -> Result<bool, PinError> {
        Ok(self.world.borrow().levels.get(&self.pin).copied().unwrap_or(0) != 0)
    }

    fn digital_write(&mut self, value: bool) -> Result<(), PinError> {
        let mut w = self.world.borrow_mut();
        w.levels.insert(self.pin, i32::from(value));
        w.pin_log.push((self.pin, PinOp::Digital(value)));
        Ok(())
    }

    fn analog_read(&mut self) -> Result<i32, PinError> {
        Ok(self.world.borrow().levels.get(&self.pin).copied().unwrap_or(0))
    }

    fn analog_write(&mut self, value: i32) -> Result<(), PinError> {
        let mut w = self.world.borrow_mut();
        w.levels.insert(self.pin, value);
        w.pin_log.push((self.pin, PinOp::Analog(value)));
        Ok(())
    }
}
