//! Client configuration.

use super::SetupError;
use serde::Deserialize;

/// Default Blynk cloud host.
pub const DEFAULT_SERVER: &str = "cloud.blynk.cc";
/// Default plaintext port.
pub const DEFAULT_PORT: u16 = 8442;
/// Default TLS port.
pub const DEFAULT_TLS_PORT: u16 = 8441;

/// Protocol timing.
///
/// Every bounded wait inside the loop must stay below the watchdog timeout,
/// and a heartbeat must time out before the next one is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Seconds between heartbeats.
    pub heartbeat_secs: u16,
    /// Seconds to wait for a login response or a heartbeat answer.
    pub max_socket_timeout_secs: u16,
    /// Seconds to wait for the rest of a command payload.
    pub min_socket_timeout_secs: u16,
    /// Pause after a failed or closed connection.
    pub reconnect_delay_ms: u32,
    /// Watchdog timeout.
    pub watchdog_timeout_ms: u32,
    /// Regular frames allowed per second.
    pub max_msg_per_sec: u16,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            heartbeat_secs: 10,
            max_socket_timeout_secs: 5,
            min_socket_timeout_secs: 1,
            reconnect_delay_ms: 1000,
            watchdog_timeout_ms: 10_000,
            max_msg_per_sec: 20,
        }
    }
}

impl Timing {
    /// Checks the ordering constraints between the timeouts.
    pub fn validate(&self) -> Result<(), SetupError> {
        let max_wait_ms = u32::from(self.max_socket_timeout_secs) * 1000;
        let ok = self.max_socket_timeout_secs < self.heartbeat_secs
            && self.min_socket_timeout_secs <= self.max_socket_timeout_secs
            && max_wait_ms < self.watchdog_timeout_ms
            && self.reconnect_delay_ms < self.watchdog_timeout_ms;
        if ok { Ok(()) } else { Err(SetupError::InvalidTiming) }
    }
}

/// Connection options.
///
/// Options can be built in code or read from a JSON document, which lets a
/// device keep its token in a configuration blob:
///
/// ```rust
/// use blynk_device::network::application::blynk::Options;
///
/// let options = Options::from_json(r#"{"token":"abc","ssl":true}"#).unwrap();
/// assert_eq!(options.token, "abc");
/// assert_eq!(options.server, "cloud.blynk.cc");
/// assert_eq!(options.port(), 8441);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Options<'a> {
    /// Device auth token.
    #[serde(borrow)]
    pub token: &'a str,

    /// Server host name.
    #[serde(borrow, default = "default_server")]
    pub server: &'a str,

    /// Server port; defaults depend on [`Options::ssl`].
    #[serde(default)]
    pub port: Option<u16>,

    /// Whether the server expects TLS. Only selects the default port: the
    /// connector type decides what is spoken on the wire, so pair `true`
    /// with a TLS connector.
    #[serde(default)]
    pub ssl: bool,

    /// Connect as soon as the loop starts.
    #[serde(default = "enabled")]
    pub connect: bool,

    /// Arm the watchdog when the loop starts.
    #[serde(default = "enabled")]
    pub watchdog: bool,

    /// Protocol timing.
    #[serde(default)]
    pub timing: Timing,
}

fn default_server() -> &'static str {
    DEFAULT_SERVER
}

fn enabled() -> bool {
    true
}

impl<'a> Options<'a> {
    /// Default options for `token`.
    pub fn new(token: &'a str) -> Self {
        Self {
            token,
            server: DEFAULT_SERVER,
            port: None,
            ssl: false,
            connect: true,
            watchdog: true,
            timing: Timing::default(),
        }
    }

    /// Reads options from JSON.
    pub fn from_json(json: &'a str) -> Result<Self, serde_json_core::de::Error> {
        serde_json_core::from_str(json).map(|(options, _)| options)
    }

    /// The port to connect to.
    pub fn port(&self) -> u16 {
        match (self.port, self.ssl) {
            (Some(port), _) => port,
            (None, true) => DEFAULT_TLS_PORT,
            (None, false) => DEFAULT_PORT,
        }
    }

    /// Checks the options.
    pub fn validate(&self) -> Result<(), SetupError> {
        self.timing.validate()
    }
}
