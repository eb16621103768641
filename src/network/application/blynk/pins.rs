//! Virtual and hardware pin registries.
//!
//! Virtual pins are logical I/O points backed by application callbacks.
//! Hardware pins are physical pins handed out by the [`Platform`] once the
//! server has configured them with a `pm` command.

use super::client::Publisher;
use super::command::CommandError;
use super::{SetupError, MAX_HARDWARE_PINS, MAX_VIRTUAL_PINS};
use crate::system::{Clock, Watchdog};
use heapless::FnvIndexMap;

/// Called when the server reads a virtual pin. Expected to answer with
/// [`Publisher::virtual_write`].
pub type VirtualReadFn = fn(&mut dyn Publisher);

/// Called once per value when the server writes a virtual pin.
pub type VirtualWriteFn = fn(&mut dyn Publisher, &str);

/// One virtual pin slot.
#[derive(Debug, Default, Clone, Copy)]
pub struct VirtualPin {
    /// Read handler.
    pub read: Option<VirtualReadFn>,
    /// Write handler.
    pub write: Option<VirtualWriteFn>,
}

impl VirtualPin {
    const EMPTY: VirtualPin = VirtualPin {
        read: None,
        write: None,
    };
}

/// Fixed table of [`MAX_VIRTUAL_PINS`] virtual pins.
#[derive(Debug, Clone)]
pub struct VirtualPins {
    slots: [VirtualPin; MAX_VIRTUAL_PINS],
}

impl VirtualPins {
    /// An empty table.
    pub fn new() -> Self {
        Self {
            slots: [VirtualPin::EMPTY; MAX_VIRTUAL_PINS],
        }
    }

    /// Installs the handlers of `pin`, replacing any previous ones.
    ///
    /// # Errors
    ///
    /// [`SetupError::InvalidVirtualPin`] if `pin` is out of range.
    pub fn register(
        &mut self,
        pin: u8,
        read: Option<VirtualReadFn>,
        write: Option<VirtualWriteFn>,
    ) -> Result<(), SetupError> {
        let slot = self
            .slots
            .get_mut(usize::from(pin))
            .ok_or(SetupError::InvalidVirtualPin)?;
        *slot = VirtualPin { read, write };
        Ok(())
    }

    /// The handlers of `pin`; empty for unknown pins.
    pub fn get(&self, pin: u8) -> VirtualPin {
        self.slots
            .get(usize::from(pin))
            .copied()
            .unwrap_or(VirtualPin::EMPTY)
    }
}

impl Default for VirtualPins {
    fn default() -> Self {
        Self::new()
    }
}

/// Electrical configuration requested by a `pm` command.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PinMode {
    /// Floating input.
    Input,
    /// Push-pull output.
    Output,
    /// Input with pull-up.
    PullUp,
    /// Input with pull-down.
    PullDown,
}

impl PinMode {
    /// Parses the wire token (`in`, `out`, `pu`, `pd`).
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "in" => Some(PinMode::Input),
            "out" => Some(PinMode::Output),
            "pu" => Some(PinMode::PullUp),
            "pd" => Some(PinMode::PullDown),
            _ => None,
        }
    }
}

/// Failure reported by a hardware pin driver.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PinError {
    /// The pin cannot do what was asked (e.g. no ADC or PWM on it).
    Unsupported,
    /// The driver failed.
    Fault,
}

#[cfg(feature = "defmt")]
impl defmt::Format for PinError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            PinError::Unsupported => defmt::write!(f, "Unsupported"),
            PinError::Fault => defmt::write!(f, "Fault"),
        }
    }
}

/// A physical pin. Implementations switch the pin function (digital, ADC,
/// PWM) on demand.
pub trait HardwarePin {
    /// Read the digital level.
    fn digital_read(&mut self) -> Result<bool, PinError>;
    /// Drive the digital level.
    fn digital_write(&mut self, value: bool) -> Result<(), PinError>;
    /// Sample the analog input.
    fn analog_read(&mut self) -> Result<i32, PinError>;
    /// Set the analog (PWM duty) output.
    fn analog_write(&mut self, value: i32) -> Result<(), PinError>;
}

/// Board services the client needs: time, watchdog and pins.
///
/// This trait must be implemented by the target platform.
pub trait Platform: Clock + Watchdog {
    /// Pin handle type.
    type Pin: HardwarePin;

    /// Configures `pin` for `mode` and returns its handle.
    fn configure_pin(&mut self, pin: u8, mode: PinMode) -> Result<Self::Pin, PinError>;
}

/// Hardware pins configured by the server.
#[derive(Debug)]
pub struct HardwarePins<P> {
    pins: FnvIndexMap<u8, P, MAX_HARDWARE_PINS>,
    configured: bool,
}

impl<P: HardwarePin> HardwarePins<P> {
    /// No pins, gate closed.
    pub fn new() -> Self {
        Self {
            pins: FnvIndexMap::new(),
            configured: false,
        }
    }

    /// Whether a `pm` command has been received.
    pub fn is_configured(&self) -> bool {
        self.configured
    }

    /// Opens the gate for hardware commands.
    pub fn mark_configured(&mut self) {
        self.configured = true;
    }

    /// Stores the handle of `pin`, replacing an earlier one.
    ///
    /// # Errors
    ///
    /// [`CommandError::TooManyPins`] when the table is full.
    pub fn insert(&mut self, pin: u8, handle: P) -> Result<(), CommandError> {
        self.pins
            .insert(pin, handle)
            .map(|_| ())
            .map_err(|_| CommandError::TooManyPins)
    }

    /// The handle of `pin`, if configured and the gate is open.
    pub fn get_mut(&mut self, pin: u8) -> Option<&mut P> {
        if !self.configured {
            return None;
        }
        self.pins.get_mut(&pin)
    }

    /// Number of configured pins.
    pub fn len(&self) -> usize {
        self.pins.len()
    }

    /// Whether no pin is configured.
    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }
}

impl<P: HardwarePin> Default for HardwarePins<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_write(_: &mut dyn Publisher, _: &str) {}

    #[test]
    fn register_rejects_out_of_range() {
        let mut pins = VirtualPins::new();
        assert_eq!(pins.register(31, None, Some(noop_write)), Ok(()));
        assert_eq!(
            pins.register(32, None, Some(noop_write)),
            Err(SetupError::InvalidVirtualPin)
        );
        assert!(pins.get(31).write.is_some());
        assert!(pins.get(31).read.is_none());
        assert!(pins.get(200).write.is_none());
    }

    #[test]
    fn pin_mode_tokens() {
        assert_eq!(PinMode::from_token("in"), Some(PinMode::Input));
        assert_eq!(PinMode::from_token("out"), Some(PinMode::Output));
        assert_eq!(PinMode::from_token("pu"), Some(PinMode::PullUp));
        assert_eq!(PinMode::from_token("pd"), Some(PinMode::PullDown));
        assert_eq!(PinMode::from_token("x"), None);
    }

    struct Level(bool);

    impl HardwarePin for Level {
        fn digital_read(&mut self) -> Result<bool, PinError> {
            Ok(self.0)
        }
        fn digital_write(&mut self, value: bool) -> Result<(), PinError> {
            self.0 = value;
            Ok(())
        }
        fn analog_read(&mut self) -> Result<i32, PinError> {
            Err(PinError::Unsupported)
        }
        fn analog_write(&mut self, _: i32) -> Result<(), PinError> {
            Err(PinError::Unsupported)
        }
    }

    #[test]
    fn hardware_pins_hidden_until_configured() {
        let mut pins = HardwarePins::new();
        pins.insert(4, Level(true)).unwrap();
        assert!(pins.get_mut(4).is_none());
        pins.mark_configured();
        assert_eq!(pins.get_mut(4).unwrap().digital_read(), Ok(true));
        assert!(pins.get_mut(5).is_none());
        assert_eq!(pins.len(), 1);
    }
}
