//! Login against a real server. Needs `BLYNK_TOKEN` (and optionally
//! `BLYNK_SERVER`, `BLYNK_PORT`) in the environment or a `.env` file.

use blynk_device::network::application::blynk::{
    Client, ConnectionState, HardwarePin, Options, PinError, PinMode, Platform,
};
use blynk_device::network::client::tcp::TcpConnector;
use blynk_device::system::{Clock, StdClock, Watchdog};

struct Host(StdClock);

struct NoPin;

impl HardwarePin for NoPin {
    fn digital_read(&mut self) -> Result<bool, PinError> {
        Err(PinError::Unsupported)
    }
    fn digital_write(&mut self, _: bool) -> Result<(), PinError> {
        Err(PinError::Unsupported)
    }
    fn analog_read(&mut self) -> Result<i32, PinError> {
        Err(PinError::Unsupported)
    }
    fn analog_write(&mut self, _: i32) -> Result<(), PinError> {
        Err(PinError::Unsupported)
    }
}

impl Clock for Host {
    fn now_ms(&self) -> u64 {
        self.0.now_ms()
    }
    fn sleep_ms(&mut self, ms: u32) {
        self.0.sleep_ms(ms)
    }
}

impl Watchdog for Host {}

impl Platform for Host {
    type Pin = NoPin;

    fn configure_pin(&mut self, _: u8, _: PinMode) -> Result<NoPin, PinError> {
        Err(PinError::Unsupported)
    }
}

#[test]
#[ignore = "needs a Blynk server and BLYNK_TOKEN"]
fn logs_in_to_a_live_server() {
    dotenvy::dotenv().ok();
    let token = std::env::var("BLYNK_TOKEN").expect("BLYNK_TOKEN not set");
    let server = std::env::var("BLYNK_SERVER").ok();
    let port = std::env::var("BLYNK_PORT").ok().and_then(|p| p.parse().ok());

    let token: &'static str = Box::leak(token.into_boxed_str());
    let mut options = Options::new(token);
    if let Some(server) = server {
        options.server = Box::leak(server.into_boxed_str());
    }
    options.port = port;

    let mut client = Client::new(TcpConnector::new(), Host(StdClock::new()), options);
    client.start().unwrap();
    for _ in 0..5 {
        client.poll();
        if client.state() == ConnectionState::Authenticated {
            break;
        }
    }
    assert_eq!(client.state(), ConnectionState::Authenticated);
    assert!(client.notify("blynk-device live test").is_ok());
    client.disconnect();
    client.poll();
    assert_eq!(client.state(), ConnectionState::Disconnected);
}
