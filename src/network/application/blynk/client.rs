//! The Blynk client: connection state machine, scheduler loop and command
//! dispatcher.
//!
//! One [`Client::poll`] is one iteration of the cooperative loop. While not
//! logged in an iteration runs the user task, feeds the watchdog and, if a
//! connection is wanted, makes one connect + login attempt. While logged in
//! it reads at most one inbound frame, rolls the one-second tick (watchdog,
//! heartbeat) and runs the user task.
//!
//! Every wait inside an iteration is bounded: the connector by its own
//! connect timeout, the rest by [`Timing`](super::Timing). The watchdog is
//! fed between consecutive waits, so each one only has to stay below the
//! watchdog timeout on its own.

use super::command::{self, Command, CommandError, DispatchError};
use super::frame::{self, Header, MessageType};
use super::heartbeat::{Heartbeat, Liveness};
use super::link::{ConnectionState, Link, Transport};
use super::options::Options;
use super::pins::{HardwarePin, HardwarePins, Platform, VirtualPins, VirtualReadFn, VirtualWriteFn};
use super::send::{Priority, Sent};
use super::{SetupError, HEADER_LEN, IDLE_TIME_MS, STATUS_SUCCESS, TASK_PERIOD_RES_MS};
use crate::network::error::Error;
use crate::network::Connect;
use crate::system::Clock;
use core::convert::Infallible;
use core::fmt::{self, Write as _};
use heapless::String;

/// Periodic application callback, see [`Client::set_user_task`].
pub type TaskFn = fn(&mut dyn Publisher);

/// Outbound application messages.
///
/// Handed to every callback so it can answer the server while the client is
/// in the middle of an iteration. All messages use the regular priority:
/// they count against the per-second budget and are dropped
/// ([`Sent::RateLimited`]) once it is spent. While not logged in nothing is
/// sent and [`Sent::Offline`] is returned.
///
/// # Errors
///
/// A fatal transport error closes the connection and is returned; the loop
/// reconnects on its own.
pub trait Publisher {
    /// Whether the client is logged in.
    fn is_connected(&self) -> bool;

    /// Publishes `value` on virtual pin `pin` (`vw pin value`).
    fn virtual_write(&mut self, pin: u8, value: &dyn fmt::Display) -> Result<Sent, Error>;

    /// Sends a push notification to the device owner.
    fn notify(&mut self, message: &str) -> Result<Sent, Error>;

    /// Sends an email.
    fn email(&mut self, to: &str, subject: &str, body: &str) -> Result<Sent, Error>;

    /// Posts a tweet.
    fn tweet(&mut self, message: &str) -> Result<Sent, Error>;
}

/// Borrowed send side of the client given to callbacks.
struct Outbox<'s, T, K: ?Sized> {
    link: &'s mut Link<T>,
    clock: &'s mut K,
}

impl<T: Transport, K: Clock + ?Sized> Outbox<'_, T, K> {
    fn publish(&mut self, msg_type: MessageType, fields: &[&dyn fmt::Display]) -> Result<Sent, Error> {
        if !self.link.is_authenticated() {
            return Ok(Sent::Offline);
        }
        let id = self.link.next_id();
        let frame = frame::encode(msg_type, id, fields)?;
        self.link.send(&mut *self.clock, &frame, Priority::Regular)
    }
}

impl<T: Transport, K: Clock + ?Sized> Publisher for Outbox<'_, T, K> {
    fn is_connected(&self) -> bool {
        self.link.is_authenticated()
    }

    fn virtual_write(&mut self, pin: u8, value: &dyn fmt::Display) -> Result<Sent, Error> {
        self.publish(MessageType::Hardware, &[&"vw", &pin, value])
    }

    fn notify(&mut self, message: &str) -> Result<Sent, Error> {
        self.publish(MessageType::Notify, &[&message])
    }

    fn email(&mut self, to: &str, subject: &str, body: &str) -> Result<Sent, Error> {
        self.publish(MessageType::Email, &[&to, &subject, &body])
    }

    fn tweet(&mut self, message: &str) -> Result<Sent, Error> {
        self.publish(MessageType::Tweet, &[&message])
    }
}

#[derive(Debug, Clone, Copy)]
struct UserTask {
    callback: TaskFn,
    period_ms: u32,
    next_due: u64,
}

/// A Blynk device client.
///
/// The client owns the connector `N`, which opens transports to the server,
/// and the platform `P`, which provides time, the watchdog and hardware pins.
pub struct Client<'a, N, P>
where
    N: Connect,
    P: Platform,
{
    options: Options<'a>,
    connector: N,
    platform: P,
    link: Link<N::Connection>,
    heartbeat: Heartbeat,
    virtual_pins: VirtualPins,
    hardware_pins: HardwarePins<P::Pin>,
    task: Option<UserTask>,
    desired: bool,
    pending: Option<Header>,
    idle_mark: u64,
    started: bool,
}

impl<N, P> fmt::Debug for Client<'_, N, P>
where
    N: Connect,
    N::Connection: Transport,
    P: Platform,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("server", &self.options.server)
            .field("port", &self.options.port())
            .field("state", &self.link.state())
            .field("desired", &self.desired)
            .finish_non_exhaustive()
    }
}

impl<'a, N, P> Client<'a, N, P>
where
    N: Connect,
    N::Connection: Transport,
    P: Platform,
{
    /// Creates a client. Nothing happens on the network until the loop runs.
    pub fn new(connector: N, platform: P, options: Options<'a>) -> Self {
        let desired = options.connect;
        let budget = options.timing.max_msg_per_sec;
        Self {
            options,
            connector,
            platform,
            link: Link::new(budget),
            heartbeat: Heartbeat::default(),
            virtual_pins: VirtualPins::new(),
            hardware_pins: HardwarePins::new(),
            task: None,
            desired,
            pending: None,
            idle_mark: 0,
            started: false,
        }
    }

    /// The options the client was created with.
    pub fn options(&self) -> &Options<'a> {
        &self.options
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.link.state()
    }

    /// Whether the client wants to be connected.
    pub fn is_connect_desired(&self) -> bool {
        self.desired
    }

    /// The platform.
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// The platform, mutably.
    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    /// The connector.
    pub fn connector(&self) -> &N {
        &self.connector
    }

    /// The connector, mutably.
    pub fn connector_mut(&mut self) -> &mut N {
        &mut self.connector
    }

    /// Hardware pins configured by the server so far.
    pub fn hardware_pins(&self) -> &HardwarePins<P::Pin> {
        &self.hardware_pins
    }

    /// Asks the loop to (re)connect.
    pub fn connect(&mut self) {
        self.desired = true;
    }

    /// Asks the loop to drop the connection and stay offline. Takes effect
    /// on the next iteration.
    pub fn disconnect(&mut self) {
        self.desired = false;
    }

    /// Installs the handlers of virtual pin `pin`.
    ///
    /// # Errors
    ///
    /// [`SetupError::InvalidVirtualPin`] if `pin` is out of range.
    pub fn register_virtual_pin(
        &mut self,
        pin: u8,
        read: Option<VirtualReadFn>,
        write: Option<VirtualWriteFn>,
    ) -> Result<(), SetupError> {
        self.virtual_pins.register(pin, read, write)
    }

    /// Runs `callback` every `period_ms` milliseconds, connected or not.
    ///
    /// # Errors
    ///
    /// [`SetupError::InvalidTaskPeriod`] unless `period_ms` is a non-zero
    /// multiple of [`TASK_PERIOD_RES_MS`].
    pub fn set_user_task(&mut self, callback: TaskFn, period_ms: u32) -> Result<(), SetupError> {
        if period_ms == 0 || period_ms % TASK_PERIOD_RES_MS != 0 {
            return Err(SetupError::InvalidTaskPeriod);
        }
        self.task = Some(UserTask {
            callback,
            period_ms,
            next_due: self.platform.now_ms() + u64::from(period_ms),
        });
        Ok(())
    }

    /// See [`Publisher::virtual_write`].
    pub fn virtual_write(&mut self, pin: u8, value: &dyn fmt::Display) -> Result<Sent, Error> {
        self.outbox().virtual_write(pin, value)
    }

    /// See [`Publisher::notify`].
    pub fn notify(&mut self, message: &str) -> Result<Sent, Error> {
        self.outbox().notify(message)
    }

    /// See [`Publisher::email`].
    pub fn email(&mut self, to: &str, subject: &str, body: &str) -> Result<Sent, Error> {
        self.outbox().email(to, subject, body)
    }

    /// See [`Publisher::tweet`].
    pub fn tweet(&mut self, message: &str) -> Result<Sent, Error> {
        self.outbox().tweet(message)
    }

    fn outbox(&mut self) -> Outbox<'_, N::Connection, P> {
        Outbox {
            link: &mut self.link,
            clock: &mut self.platform,
        }
    }

    /// Validates the options and arms the watchdog.
    ///
    /// Called by [`Client::run`]; call it once yourself before driving the
    /// loop with [`Client::poll`].
    ///
    /// # Errors
    ///
    /// [`SetupError::InvalidTiming`] if the timing constants are inconsistent.
    pub fn start(&mut self) -> Result<(), SetupError> {
        self.options.validate()?;
        self.begin();
        Ok(())
    }

    fn begin(&mut self) {
        let now = self.platform.now_ms();
        self.idle_mark = now;
        if let Some(task) = self.task.as_mut() {
            task.next_due = now + u64::from(task.period_ms);
        }
        if self.options.watchdog {
            self.platform
                .start_watchdog(self.options.timing.watchdog_timeout_ms);
        }
        self.started = true;
        info!(
            "blynk: loop started, server {}:{}",
            self.options.server,
            self.options.port()
        );
    }

    /// Runs the loop forever.
    ///
    /// # Errors
    ///
    /// Returns only if [`Client::start`] fails.
    pub fn run(&mut self) -> Result<Infallible, SetupError> {
        self.start()?;
        loop {
            self.poll();
        }
    }

    /// Runs one iteration of the loop.
    pub fn poll(&mut self) {
        if !self.started {
            self.begin();
        }
        if self.link.is_authenticated() {
            self.poll_session();
        } else {
            self.poll_offline();
        }
    }

    fn poll_offline(&mut self) {
        self.run_task();
        self.platform.feed_watchdog();

        if self.desired {
            self.establish();
        } else {
            if self.link.state() != ConnectionState::Disconnected {
                self.link.close();
            }
            self.idle(TASK_PERIOD_RES_MS);
        }
    }

    fn establish(&mut self) {
        self.link.set_state(ConnectionState::Connecting);

        let mut remote: String<256> = String::new();
        if write!(remote, "{}:{}", self.options.server, self.options.port()).is_err() {
            warn!("blynk: server name too long");
            self.fail_attempt();
            return;
        }
        let opened = self.connector.connect(&remote);
        self.platform.feed_watchdog();
        match opened {
            Ok(conn) => self.link.attach(conn),
            Err(_) => {
                warn!("blynk: connect to {} failed", remote.as_str());
                self.fail_attempt();
                return;
            }
        }

        self.link.set_state(ConnectionState::Authenticating);
        let logged_in = self.login();
        self.platform.feed_watchdog();
        match logged_in {
            Ok(()) => {
                self.link.set_state(ConnectionState::Authenticated);
                self.heartbeat = Heartbeat::new(self.platform.now_secs());
                self.link.rate_mut().reset();
                self.pending = None;
                info!("blynk: logged in to {}", remote.as_str());
            }
            Err(e) => {
                warn!("blynk: login failed: {:?}", e);
                self.fail_attempt();
            }
        }
    }

    fn login(&mut self) -> Result<(), Error> {
        let id = self.link.next_id();
        let frame = frame::encode(MessageType::Login, id, &[&self.options.token])?;
        let sent = self.link.send(&mut self.platform, &frame, Priority::Urgent)?;
        if !sent.is_transmitted() {
            return Err(Error::WriteError);
        }

        let timeout_ms = u32::from(self.options.timing.max_socket_timeout_secs) * 1000;
        let data = self
            .link
            .recv(HEADER_LEN, timeout_ms)?
            .ok_or(Error::Timeout)?;
        let header = Header::parse(&data)?;
        if header.id == 0 || header.status() != STATUS_SUCCESS {
            return Err(Error::ConnectionRefused);
        }
        Ok(())
    }

    fn fail_attempt(&mut self) {
        self.link.close();
        self.link.set_state(ConnectionState::Connecting);
        self.platform
            .sleep_ms(self.options.timing.reconnect_delay_ms);
    }

    fn poll_session(&mut self) {
        if !self.desired {
            info!("blynk: disconnecting");
            self.teardown();
            return;
        }

        let received = match self.receive() {
            Ok(received) => received,
            Err(DispatchError::Session(e)) => {
                warn!("blynk: session lost: {:?}", e);
                self.teardown();
                return;
            }
            Err(DispatchError::Command(e)) => {
                warn!("blynk: command dropped: {:?}", e);
                true
            }
        };
        if !self.link.is_authenticated() {
            self.teardown();
            return;
        }
        if !received {
            self.idle(IDLE_TIME_MS);
        }

        if !self.tick() {
            self.teardown();
            return;
        }

        self.run_task();
        if !self.link.is_authenticated() {
            self.teardown();
        }
    }

    fn teardown(&mut self) {
        self.link.close();
        self.pending = None;
        self.heartbeat = Heartbeat::default();
        self.link.rate_mut().reset();
        self.platform.feed_watchdog();
        self.platform
            .sleep_ms(self.options.timing.reconnect_delay_ms);
    }

    /// Reads and handles at most one inbound frame. Returns whether anything
    /// arrived.
    fn receive(&mut self) -> Result<bool, DispatchError> {
        let header = match self.pending.take() {
            Some(header) => header,
            None => {
                let Some(data) = self.link.recv(HEADER_LEN, 0)? else {
                    return Ok(false);
                };
                let header = Header::parse(&data)?;
                if header.id == 0 {
                    warn!("blynk: frame with id 0");
                    return Err(Error::ProtocolError.into());
                }
                match header.message_type() {
                    Some(MessageType::Rsp) => {
                        if self.heartbeat.answered(header.id) {
                            trace!("blynk: heartbeat {} answered", header.id);
                        }
                        return Ok(true);
                    }
                    Some(MessageType::Ping) => {
                        let reply = frame::encode_response(header.id, STATUS_SUCCESS);
                        self.link
                            .send(&mut self.platform, &reply, Priority::Urgent)?;
                        return Ok(true);
                    }
                    Some(MessageType::Hardware | MessageType::Bridge) => header,
                    _ => {
                        warn!("blynk: unexpected message type {}", header.msg_type);
                        return Err(Error::ProtocolError.into());
                    }
                }
            }
        };

        if header.length == 0 {
            return Ok(true);
        }
        let timeout_ms = u32::from(self.options.timing.min_socket_timeout_secs) * 1000;
        let Some(payload) = self.link.recv(usize::from(header.length), timeout_ms)? else {
            // Keep the header; the rest of the payload is read next time.
            self.pending = Some(header);
            return Ok(true);
        };
        self.dispatch(&payload)?;
        Ok(true)
    }

    fn dispatch(&mut self, payload: &[u8]) -> Result<(), DispatchError> {
        let Ok(text) = core::str::from_utf8(payload) else {
            return Err(CommandError::Encoding.into());
        };
        if !self.hardware_pins.is_configured() && command::is_hardware_token(command::token(text)) {
            trace!("blynk: hardware command before pm ignored");
            return Ok(());
        }

        match Command::from_bytes(payload)? {
            Command::Info | Command::Other(_) => {}
            Command::PinMode(modes) => {
                for (pin, mode) in modes {
                    let handle = self.platform.configure_pin(pin, mode)?;
                    self.hardware_pins.insert(pin, handle)?;
                }
                self.hardware_pins.mark_configured();
                debug!("blynk: {} hardware pins configured", self.hardware_pins.len());
            }
            Command::VirtualWrite { pin, values } => {
                if let Some(write) = self.virtual_pins.get(pin).write {
                    let mut outbox = self.outbox();
                    for value in values.iter() {
                        write(&mut outbox, value);
                    }
                }
            }
            Command::VirtualRead { pin } => {
                if let Some(read) = self.virtual_pins.get(pin).read {
                    read(&mut self.outbox());
                }
            }
            Command::DigitalWrite { pin, value } => {
                if let Some(handle) = self.hardware_pins.get_mut(pin) {
                    handle.digital_write(value)?;
                }
            }
            Command::AnalogWrite { pin, value } => {
                if let Some(handle) = self.hardware_pins.get_mut(pin) {
                    handle.analog_write(value)?;
                }
            }
            Command::DigitalRead { pin } => {
                if let Some(handle) = self.hardware_pins.get_mut(pin) {
                    let level = u8::from(handle.digital_read()?);
                    self.outbox()
                        .publish(MessageType::Hardware, &[&"dw", &pin, &level])?;
                }
            }
            Command::AnalogRead { pin } => {
                if let Some(handle) = self.hardware_pins.get_mut(pin) {
                    let value = handle.analog_read()?;
                    self.outbox()
                        .publish(MessageType::Hardware, &[&"aw", &pin, &value])?;
                }
            }
        }
        Ok(())
    }

    /// Once per second: feed the watchdog and keep the heartbeat going.
    /// Returns `false` when the connection is dead.
    fn tick(&mut self) -> bool {
        let now = self.platform.now_secs();
        if !self.link.rate_mut().roll(now) {
            return true;
        }
        self.platform.feed_watchdog();

        let timing = self.options.timing;
        match self
            .heartbeat
            .check(now, timing.heartbeat_secs, timing.max_socket_timeout_secs)
        {
            Liveness::Alive => true,
            Liveness::Dead => {
                warn!("blynk: heartbeat {} not answered", self.heartbeat.outstanding());
                false
            }
            Liveness::PingDue => {
                let id = self.link.next_id();
                let ping = Header::new(MessageType::Ping, id, 0).encode();
                match self.link.send(&mut self.platform, &ping, Priority::Urgent) {
                    Ok(_) => {
                        self.heartbeat.sent(id, now);
                        true
                    }
                    Err(_) => false,
                }
            }
        }
    }

    fn run_task(&mut self) {
        let Some(task) = self.task.as_mut() else {
            return;
        };
        if self.platform.now_ms() < task.next_due {
            return;
        }
        task.next_due += u64::from(task.period_ms);
        let callback = task.callback;
        callback(&mut self.outbox());
    }

    /// Sleeps until `quantum` ms after the previous idle mark.
    fn idle(&mut self, quantum: u32) {
        let now = self.platform.now_ms();
        let target = self.idle_mark + u64::from(quantum);
        if target > now {
            self.platform.sleep_ms((target - now) as u32);
            self.idle_mark = target;
        } else {
            self.idle_mark = now;
        }
    }
}
