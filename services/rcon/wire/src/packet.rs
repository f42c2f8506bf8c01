//! Packet layout for the Source RCON protocol.

use crate::WireError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;

/// Bytes taken by id + type + the two trailing NULs
pub const MIN_PACKET_SIZE: usize = 4 + 4 + 2;

/// Bytes before the body, including the size prefix
pub const PACKET_HEADER_SIZE: usize = 4 + 4 + 4;

/// Default cap on a whole frame (size prefix included)
pub const DEFAULT_MAX_PACKET_SIZE: usize = 64 * 1024;

/// Id the server puts in an auth response when the secret was rejected
pub const AUTH_FAILED_ID: i32 = -1;

/// Packet type field.
///
/// The protocol reuses the value `2` for both `EXEC_COMMAND` (client to
/// server) and `AUTH_RESPONSE` (server to client), so this is a plain
/// newtype instead of an enum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PacketType(pub i32);

impl PacketType {
    /// Authentication request carrying the shared secret
    pub const AUTH: PacketType = PacketType(3);
    /// Server reply to an authentication request
    pub const AUTH_RESPONSE: PacketType = PacketType(2);
    /// Console command
    pub const EXEC_COMMAND: PacketType = PacketType(2);
    /// Command output (possibly one of several)
    pub const RESPONSE_VALUE: PacketType = PacketType(0);
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single RCON packet
#[derive(Clone, PartialEq, Eq)]
pub struct Packet {
    /// Request id chosen by the client and echoed by the server
    pub id: i32,
    /// Packet type
    pub kind: PacketType,
    /// Body without terminators
    pub body: Bytes,
}

impl Packet {
    /// Create a packet
    pub fn new(id: i32, kind: PacketType, body: impl Into<Bytes>) -> Self {
        Self {
            id,
            kind,
            body: body.into(),
        }
    }

    /// Authentication request
    pub fn auth(id: i32, secret: &str) -> Self {
        Self::new(id, PacketType::AUTH, Bytes::copy_from_slice(secret.as_bytes()))
    }

    /// Console command request
    pub fn exec(id: i32, command: &str) -> Self {
        Self::new(
            id,
            PacketType::EXEC_COMMAND,
            Bytes::copy_from_slice(command.as_bytes()),
        )
    }

    /// Body decoded as text, replacing invalid UTF-8
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Value of the size field for this packet
    pub fn wire_size(&self) -> usize {
        MIN_PACKET_SIZE + self.body.len()
    }

    /// Encode including the size prefix
    pub fn encode(&self, buf: &mut BytesMut, max_packet_size: usize) -> Result<(), WireError> {
        if let Some(pos) = self.body.iter().position(|b| *b == 0) {
            return Err(WireError::Nul(pos));
        }

        let total = 4 + self.wire_size();
        if total > max_packet_size {
            return Err(WireError::Size {
                size: total,
                max: max_packet_size,
            });
        }

        buf.reserve(total);
        buf.put_i32_le(self.wire_size() as i32);
        buf.put_i32_le(self.id);
        buf.put_i32_le(self.kind.0);
        buf.put_slice(&self.body);
        buf.put_u8(0);
        buf.put_u8(0);
        Ok(())
    }

    /// Decode from the bytes that follow the size prefix
    pub fn decode(mut frame: Bytes) -> Result<Self, WireError> {
        if frame.len() < MIN_PACKET_SIZE {
            return Err(WireError::Undersized(frame.len() as i32));
        }

        let id = frame.get_i32_le();
        let kind = PacketType(frame.get_i32_le());

        // Some servers only send the body terminator
        let body_len = match frame.as_ref() {
            [.., 0, 0] => frame.len() - 2,
            [.., 0] => frame.len() - 1,
            _ => return Err(WireError::Terminator),
        };
        let body = frame.split_to(body_len);

        Ok(Self { id, kind, body })
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Auth bodies carry the secret
        let body: &dyn fmt::Debug = if self.kind == PacketType::AUTH {
            &"<redacted>"
        } else {
            &self.body
        };
        f.debug_struct("Packet")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("body", body)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let mut buf = BytesMut::new();
        Packet::exec(7, "status")
            .encode(&mut buf, DEFAULT_MAX_PACKET_SIZE)
            .unwrap();

        assert_eq!(buf.len(), 4 + 10 + 6);
        assert_eq!(&buf[0..4], &16i32.to_le_bytes());
        assert_eq!(&buf[4..8], &7i32.to_le_bytes());
        assert_eq!(&buf[8..12], &2i32.to_le_bytes());
        assert_eq!(&buf[12..18], b"status");
        assert_eq!(&buf[18..], &[0, 0]);
    }

    #[test]
    fn test_encode_rejects_nul() {
        let mut buf = BytesMut::new();
        let err = Packet::exec(1, "say\0hi")
            .encode(&mut buf, DEFAULT_MAX_PACKET_SIZE)
            .unwrap_err();
        assert!(matches!(err, WireError::Nul(3)));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_single_terminator() {
        let mut raw = BytesMut::new();
        raw.put_i32_le(5);
        raw.put_i32_le(PacketType::RESPONSE_VALUE.0);
        raw.put_slice(b"ok");
        raw.put_u8(0);

        let packet = Packet::decode(raw.freeze()).unwrap();
        assert_eq!(packet.id, 5);
        assert_eq!(packet.body_text(), "ok");
    }

    #[test]
    fn test_decode_missing_terminator() {
        let mut raw = BytesMut::new();
        raw.put_i32_le(5);
        raw.put_i32_le(0);
        raw.put_slice(b"ok!");

        assert!(matches!(
            Packet::decode(raw.freeze()),
            Err(WireError::Terminator)
        ));
    }

    #[test]
    fn test_debug_redacts_auth_secret() {
        let packet = Packet::auth(1, "hunter2");
        let printed = format!("{:?}", packet);
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("redacted"));
    }
}
