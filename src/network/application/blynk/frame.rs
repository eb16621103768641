//! Frame codec.
//!
//! Frame layout (5 bytes header + payload):
//!
//! ```text
//! +---------+---------+---------+---------------------+
//! |  type   |   id    | length  | payload             |
//! | 1 byte  | 2 bytes | 2 bytes | `length` bytes      |
//! +---------+---------+---------+---------------------+
//! ```
//!
//! All integers are big-endian. Payload fields are ASCII tokens joined by a
//! NUL byte. In a response frame the `length` field carries a status code
//! and no payload follows.

use super::{HEADER_LEN, MAX_TX_FRAME};
use crate::network::error::Error;
use core::fmt::{self, Write as _};
use heapless::Vec;

/// An encoded outbound frame.
pub type FrameBuf = Vec<u8, MAX_TX_FRAME>;

/// Message types understood by the client.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
pub enum MessageType {
    /// Response to a request; `length` is a status code.
    Rsp = 0,
    /// Login with the auth token.
    Login = 2,
    /// Heartbeat, sent by either side.
    Ping = 6,
    /// Post a tweet from the device.
    Tweet = 12,
    /// Send an email from the device.
    Email = 13,
    /// Push notification to the owner's phone.
    Notify = 14,
    /// Command relayed from another device.
    Bridge = 15,
    /// Hardware / virtual pin command.
    Hardware = 20,
}

impl MessageType {
    /// Look up a wire value.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(MessageType::Rsp),
            2 => Some(MessageType::Login),
            6 => Some(MessageType::Ping),
            12 => Some(MessageType::Tweet),
            13 => Some(MessageType::Email),
            14 => Some(MessageType::Notify),
            15 => Some(MessageType::Bridge),
            20 => Some(MessageType::Hardware),
            _ => None,
        }
    }
}

/// A decoded frame header.
///
/// The type is kept as the raw wire byte so that a header can always be
/// decoded; [`Header::message_type`] tells whether it is one we understand.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Header {
    /// Raw message type.
    pub msg_type: u8,
    /// Message id; `0` is never valid.
    pub id: u16,
    /// Payload length, or the status code of a response.
    pub length: u16,
}

impl Header {
    /// Creates a header for a known message type.
    pub fn new(msg_type: MessageType, id: u16, length: u16) -> Self {
        Self {
            msg_type: msg_type as u8,
            id,
            length,
        }
    }

    /// Encodes the header into its 5 wire bytes.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let id = self.id.to_be_bytes();
        let length = self.length.to_be_bytes();
        [self.msg_type, id[0], id[1], length[0], length[1]]
    }

    /// Decodes a header from its 5 wire bytes.
    pub fn decode(bytes: &[u8; HEADER_LEN]) -> Self {
        Self {
            msg_type: bytes[0],
            id: u16::from_be_bytes([bytes[1], bytes[2]]),
            length: u16::from_be_bytes([bytes[3], bytes[4]]),
        }
    }

    /// Decodes a header from the start of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self, Error> {
        let head: &[u8; HEADER_LEN] = bytes
            .get(..HEADER_LEN)
            .and_then(|b| b.try_into().ok())
            .ok_or(Error::ProtocolError)?;
        Ok(Self::decode(head))
    }

    /// The message type, if it is one the client understands.
    pub fn message_type(&self) -> Option<MessageType> {
        MessageType::from_u8(self.msg_type)
    }

    /// Status code of a response frame.
    pub fn status(&self) -> u16 {
        self.length
    }
}

/// Generator of outbound message ids.
///
/// Ids start at 1, wrap from `0xFFFF` back to 1 and are never 0.
#[derive(Debug, Default, Clone, Copy)]
pub struct MessageIds {
    last: u16,
}

impl MessageIds {
    /// A generator whose first id is 1.
    pub fn new() -> Self {
        Self { last: 0 }
    }

    /// A generator whose next id follows `last`.
    pub fn starting_after(last: u16) -> Self {
        Self { last }
    }

    /// Consumes and returns the next id.
    pub fn next_id(&mut self) -> u16 {
        self.last = match self.last.wrapping_add(1) {
            0 => 1,
            id => id,
        };
        self.last
    }
}

struct FieldWriter<'a>(&'a mut FrameBuf);

impl fmt::Write for FieldWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.extend_from_slice(s.as_bytes()).map_err(|_| fmt::Error)
    }
}

/// Encodes a frame whose payload is `fields` joined by NUL bytes.
///
/// # Errors
///
/// [`Error::BufferOverflow`] if the frame does not fit in [`MAX_TX_FRAME`].
pub fn encode(msg_type: MessageType, id: u16, fields: &[&dyn fmt::Display]) -> Result<FrameBuf, Error> {
    let mut buf = FrameBuf::new();
    buf.extend_from_slice(&[0; HEADER_LEN])
        .map_err(|_| Error::BufferOverflow)?;

    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            buf.push(0).map_err(|_| Error::BufferOverflow)?;
        }
        write!(FieldWriter(&mut buf), "{}", field).map_err(|_| Error::BufferOverflow)?;
    }

    let length = u16::try_from(buf.len() - HEADER_LEN).map_err(|_| Error::BufferOverflow)?;
    buf[..HEADER_LEN].copy_from_slice(&Header::new(msg_type, id, length).encode());
    Ok(buf)
}

/// Encodes a header-only response frame carrying `status`.
pub fn encode_response(id: u16, status: u16) -> [u8; HEADER_LEN] {
    Header::new(MessageType::Rsp, id, status).encode()
}

/// Splits a payload into its NUL-separated fields.
pub fn fields(payload: &str) -> core::str::Split<'_, char> {
    payload.split('\0')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_big_endian() {
        let header = Header::new(MessageType::Hardware, 0x1234, 0x0102);
        assert_eq!(header.encode(), [20, 0x12, 0x34, 0x01, 0x02]);
    }

    #[test]
    fn header_round_trip_edges() {
        for &(t, id, len) in &[(0u8, 1u16, 0u16), (255, 0xFFFF, 0xFFFF), (20, 0x8000, 200)] {
            let header = Header {
                msg_type: t,
                id,
                length: len,
            };
            assert_eq!(Header::decode(&header.encode()), header);
        }
    }

    #[test]
    fn parse_rejects_short_input() {
        assert_eq!(Header::parse(&[0, 0, 1]), Err(Error::ProtocolError));
        let header = Header::parse(&[6, 0, 9, 0, 0, 0xAA]).unwrap();
        assert_eq!(header.message_type(), Some(MessageType::Ping));
        assert_eq!(header.id, 9);
    }

    #[test]
    fn unknown_type_is_not_mapped() {
        assert_eq!(MessageType::from_u8(1), None);
        assert_eq!(MessageType::from_u8(20), Some(MessageType::Hardware));
    }

    #[test]
    fn ids_skip_zero_on_wrap() {
        let mut ids = MessageIds::new();
        assert_eq!(ids.next_id(), 1);
        assert_eq!(ids.next_id(), 2);

        let mut ids = MessageIds::starting_after(0xFFFE);
        assert_eq!(ids.next_id(), 0xFFFF);
        assert_eq!(ids.next_id(), 1);
    }

    #[test]
    fn ids_never_zero_over_a_full_cycle() {
        let mut ids = MessageIds::new();
        for _ in 0..(u32::from(u16::MAX) * 2 + 3) {
            assert_ne!(ids.next_id(), 0);
        }
    }

    #[test]
    fn encode_joins_fields_with_nul() {
        let frame = encode(MessageType::Hardware, 7, &[&"vw", &3u8, &42]).unwrap();
        assert_eq!(&frame[..HEADER_LEN], &[20, 0, 7, 0, 7]);
        assert_eq!(&frame[HEADER_LEN..], b"vw\x003\x0042");
    }

    #[test]
    fn encode_without_fields_has_empty_payload() {
        let frame = encode(MessageType::Ping, 3, &[]).unwrap();
        assert_eq!(&frame[..], &[6, 0, 3, 0, 0]);
    }

    #[test]
    fn encode_overflow_is_reported() {
        let big = [b'x'; MAX_TX_FRAME];
        let big = core::str::from_utf8(&big).unwrap();
        assert_eq!(
            encode(MessageType::Notify, 1, &[&big]).unwrap_err(),
            Error::BufferOverflow
        );
    }

    #[test]
    fn response_carries_status_in_length() {
        assert_eq!(encode_response(0x0102, 200), [0, 0x01, 0x02, 0, 200]);
    }

    #[test]
    fn fields_split_on_nul() {
        let mut it = fields("vw\x003\x009");
        assert_eq!(it.next(), Some("vw"));
        assert_eq!(it.next(), Some("3"));
        assert_eq!(it.next(), Some("9"));
        assert_eq!(it.next(), None);
    }
}
