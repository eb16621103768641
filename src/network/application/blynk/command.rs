//! Hardware command decoding.
//!
//! The payload of an `HW` or `BRIDGE` frame is a command token followed by
//! its arguments, all NUL separated:
//!
//! | token  | arguments              | meaning                          |
//! |--------|------------------------|----------------------------------|
//! | `info` | anything               | device info request, ignored     |
//! | `pm`   | `pin mode`, repeated   | configure hardware pins          |
//! | `vw`   | `pin value...`         | write virtual pin, once per value|
//! | `vr`   | `pin`                  | read virtual pin                 |
//! | `dw`   | `pin value`            | digital write                    |
//! | `aw`   | `pin value`            | analog write                     |
//! | `dr`   | `pin`                  | digital read, reported as `dw`   |
//! | `ar`   | `pin`                  | analog read, reported as `aw`    |

use super::frame;
use super::pins::{PinError, PinMode};
use super::MAX_HARDWARE_PINS;
use crate::network::error::Error;
use heapless::Vec;

/// A command that could not be carried out. Only that command is dropped;
/// the connection stays up.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CommandError {
    /// Payload is not ASCII.
    Encoding,
    /// A required argument is missing.
    MissingArgument,
    /// A pin argument is not a pin number.
    InvalidPin,
    /// A value argument is not a number.
    InvalidValue,
    /// A `pm` mode is not one of `in`, `out`, `pu`, `pd`.
    InvalidMode,
    /// The hardware pin table is full.
    TooManyPins,
    /// The pin driver failed.
    Hardware(PinError),
}

/// Outcome of handling one inbound frame that went wrong.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DispatchError {
    /// The session is unusable; close and reconnect.
    Session(Error),
    /// Only this command failed.
    Command(CommandError),
}

impl From<Error> for DispatchError {
    fn from(e: Error) -> Self {
        DispatchError::Session(e)
    }
}

impl From<CommandError> for DispatchError {
    fn from(e: CommandError) -> Self {
        DispatchError::Command(e)
    }
}

impl From<PinError> for DispatchError {
    fn from(e: PinError) -> Self {
        DispatchError::Command(CommandError::Hardware(e))
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for CommandError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            CommandError::Encoding => defmt::write!(f, "Encoding"),
            CommandError::MissingArgument => defmt::write!(f, "MissingArgument"),
            CommandError::InvalidPin => defmt::write!(f, "InvalidPin"),
            CommandError::InvalidValue => defmt::write!(f, "InvalidValue"),
            CommandError::InvalidMode => defmt::write!(f, "InvalidMode"),
            CommandError::TooManyPins => defmt::write!(f, "TooManyPins"),
            CommandError::Hardware(e) => defmt::write!(f, "Hardware({})", e),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for DispatchError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            DispatchError::Session(e) => defmt::write!(f, "Session({})", e),
            DispatchError::Command(e) => defmt::write!(f, "Command({})", e),
        }
    }
}

/// The trailing NUL-separated values of a command.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Values<'a>(Option<&'a str>);

impl<'a> Values<'a> {
    /// The values in order.
    pub fn iter(&self) -> impl Iterator<Item = &'a str> + use<'a> {
        self.0.into_iter().flat_map(frame::fields)
    }
}

/// A decoded hardware command.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Command<'a> {
    /// `info`
    Info,
    /// `pm`
    PinMode(Vec<(u8, PinMode), MAX_HARDWARE_PINS>),
    /// `vw`
    VirtualWrite {
        /// Virtual pin.
        pin: u8,
        /// Values to write, one callback call each.
        values: Values<'a>,
    },
    /// `vr`
    VirtualRead {
        /// Virtual pin.
        pin: u8,
    },
    /// `dw`
    DigitalWrite {
        /// Hardware pin.
        pin: u8,
        /// Level.
        value: bool,
    },
    /// `aw`
    AnalogWrite {
        /// Hardware pin.
        pin: u8,
        /// Duty / level.
        value: i32,
    },
    /// `dr`
    DigitalRead {
        /// Hardware pin.
        pin: u8,
    },
    /// `ar`
    AnalogRead {
        /// Hardware pin.
        pin: u8,
    },
    /// Any other token; ignored.
    Other(&'a str),
}

/// Whether `token` names a command that needs configured hardware pins.
pub fn is_hardware_token(token: &str) -> bool {
    matches!(token, "dw" | "aw" | "dr" | "ar")
}

/// The command token of a payload.
pub fn token(payload: &str) -> &str {
    payload.split('\0').next().unwrap_or("")
}

impl<'a> Command<'a> {
    /// Decodes a raw payload.
    pub fn from_bytes(payload: &'a [u8]) -> Result<Self, CommandError> {
        if !payload.is_ascii() {
            return Err(CommandError::Encoding);
        }
        let payload = core::str::from_utf8(payload).map_err(|_| CommandError::Encoding)?;
        Self::parse(payload)
    }

    /// Decodes a payload.
    pub fn parse(payload: &'a str) -> Result<Self, CommandError> {
        let (name, rest) = match payload.split_once('\0') {
            Some((name, rest)) => (name, Some(rest)),
            None => (payload, None),
        };
        let mut args = rest.into_iter().flat_map(frame::fields);

        let command = match name {
            "info" => Command::Info,
            "pm" => {
                let mut modes = Vec::new();
                while let Some(pin) = args.next() {
                    let pin = parse_pin(pin)?;
                    let mode = args.next().ok_or(CommandError::MissingArgument)?;
                    let mode = PinMode::from_token(mode).ok_or(CommandError::InvalidMode)?;
                    modes
                        .push((pin, mode))
                        .map_err(|_| CommandError::TooManyPins)?;
                }
                Command::PinMode(modes)
            }
            "vw" => {
                let (pin, values) = match rest.map(|r| r.split_once('\0')) {
                    Some(Some((pin, values))) => (pin, Some(values)),
                    Some(None) => (rest.unwrap_or(""), None),
                    None => return Err(CommandError::MissingArgument),
                };
                Command::VirtualWrite {
                    pin: parse_pin(pin)?,
                    values: Values(values),
                }
            }
            "vr" => Command::VirtualRead {
                pin: parse_pin(next(&mut args)?)?,
            },
            "dw" => Command::DigitalWrite {
                pin: parse_pin(next(&mut args)?)?,
                value: parse_value(next(&mut args)?)? != 0,
            },
            "aw" => Command::AnalogWrite {
                pin: parse_pin(next(&mut args)?)?,
                value: parse_value(next(&mut args)?)?,
            },
            "dr" => Command::DigitalRead {
                pin: parse_pin(next(&mut args)?)?,
            },
            "ar" => Command::AnalogRead {
                pin: parse_pin(next(&mut args)?)?,
            },
            other => Command::Other(other),
        };
        Ok(command)
    }
}

fn next<'a>(args: &mut impl Iterator<Item = &'a str>) -> Result<&'a str, CommandError> {
    args.next().ok_or(CommandError::MissingArgument)
}

fn parse_pin(token: &str) -> Result<u8, CommandError> {
    token.parse().map_err(|_| CommandError::InvalidPin)
}

fn parse_value(token: &str) -> Result<i32, CommandError> {
    token.parse().map_err(|_| CommandError::InvalidValue)
}
