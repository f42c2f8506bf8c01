//! Framed codec for RCON packets.
//!
//! `RconCodec` plugs into `tokio_util::codec::Framed` so a TCP stream can be
//! used as a `Stream` of decoded packets and a `Sink` of outgoing ones.

use crate::packet::{Packet, DEFAULT_MAX_PACKET_SIZE, MIN_PACKET_SIZE};
use crate::WireError;
use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

/// Length-prefixed RCON packet codec
#[derive(Debug, Clone)]
pub struct RconCodec {
    max_packet_size: usize,
}

impl RconCodec {
    /// Create a codec with the default size limit
    pub fn new() -> Self {
        Self {
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
        }
    }

    /// Create a codec with a custom size limit (size prefix included)
    pub fn with_max_packet_size(max_packet_size: usize) -> Self {
        Self { max_packet_size }
    }

    /// Configured size limit
    pub fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }
}

impl Default for RconCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for RconCodec {
    type Item = Packet;
    type Error = WireError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>, WireError> {
        if src.len() < 4 {
            return Ok(None);
        }

        let declared = i32::from_le_bytes([src[0], src[1], src[2], src[3]]);
        if declared < MIN_PACKET_SIZE as i32 {
            return Err(WireError::Undersized(declared));
        }

        let size = declared as usize;
        if size + 4 > self.max_packet_size {
            return Err(WireError::Size {
                size: size + 4,
                max: self.max_packet_size,
            });
        }

        if src.len() < 4 + size {
            src.reserve(4 + size - src.len());
            return Ok(None);
        }

        src.advance(4);
        let frame = src.split_to(size).freeze();
        let packet = Packet::decode(frame)?;
        trace!(
            "Decoded packet id={} type={} body_len={}",
            packet.id,
            packet.kind,
            packet.body.len()
        );
        Ok(Some(packet))
    }
}

impl Encoder<Packet> for RconCodec {
    type Error = WireError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), WireError> {
        item.encode(dst, self.max_packet_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::PacketType;
    use bytes::BufMut;

    fn frame(id: i32, kind: PacketType, body: &[u8]) -> BytesMut {
        let mut buf = BytesMut::new();
        Packet::new(id, kind, body.to_vec())
            .encode(&mut buf, DEFAULT_MAX_PACKET_SIZE)
            .unwrap();
        buf
    }

    #[test]
    fn test_decode_waits_for_complete_frame() {
        let mut codec = RconCodec::new();
        let full = frame(3, PacketType::RESPONSE_VALUE, b"hostname = test");

        let mut partial = BytesMut::from(&full[..full.len() - 3]);
        assert!(codec.decode(&mut partial).unwrap().is_none());

        partial.extend_from_slice(&full[full.len() - 3..]);
        let packet = codec.decode(&mut partial).unwrap().unwrap();
        assert_eq!(packet.id, 3);
        assert_eq!(packet.body_text(), "hostname = test");
        assert!(partial.is_empty());
    }

    #[test]
    fn test_decode_back_to_back_frames() {
        let mut codec = RconCodec::new();
        let mut buf = frame(10, PacketType::RESPONSE_VALUE, b"");
        buf.extend_from_slice(&frame(10, PacketType::AUTH_RESPONSE, b""));

        let first = codec.decode(&mut buf).unwrap().unwrap();
        let second = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(first.kind, PacketType::RESPONSE_VALUE);
        assert_eq!(second.kind, PacketType::AUTH_RESPONSE);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_decode_rejects_oversized() {
        let mut codec = RconCodec::with_max_packet_size(64);
        let mut buf = BytesMut::new();
        buf.put_i32_le(100);
        buf.put_slice(&[0u8; 8]);

        assert!(matches!(
            codec.decode(&mut buf),
            Err(WireError::Size { size: 104, max: 64 })
        ));
    }

    #[test]
    fn test_decode_rejects_undersized() {
        let mut codec = RconCodec::new();
        let mut buf = BytesMut::new();
        buf.put_i32_le(4);
        buf.put_slice(&[0u8; 4]);

        assert!(matches!(codec.decode(&mut buf), Err(WireError::Undersized(4))));
    }

    #[test]
    fn test_encoder_enforces_limit() {
        let mut codec = RconCodec::with_max_packet_size(32);
        let mut dst = BytesMut::new();
        let long = "x".repeat(64);

        assert!(codec.encode(Packet::exec(1, &long), &mut dst).is_err());
        assert!(codec.encode(Packet::exec(1, "status"), &mut dst).is_ok());
    }
}
