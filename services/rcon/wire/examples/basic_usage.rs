//! Basic usage example for rcon-wire
//!
//! Frames an authentication and a command packet, then decodes a server
//! reply the way a client reading from a socket would.

use bytes::{Bytes, BytesMut};
use rcon_wire::{Packet, PacketType, RconCodec, AUTH_FAILED_ID};
use tokio_util::codec::{Decoder, Encoder};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("rcon-wire Basic Usage Example");
    println!("=============================");

    let mut codec = RconCodec::new();
    let mut outgoing = BytesMut::new();

    // Client side: authenticate, then run a command
    codec.encode(Packet::auth(1, "changeme"), &mut outgoing)?;
    codec.encode(Packet::exec(2, "status"), &mut outgoing)?;
    println!("Encoded {} bytes for AUTH + EXEC", outgoing.len());

    // Server side: what a rejected login looks like on the wire
    let mut incoming = BytesMut::new();
    codec.encode(
        Packet::new(1, PacketType::RESPONSE_VALUE, Bytes::new()),
        &mut incoming,
    )?;
    codec.encode(
        Packet::new(AUTH_FAILED_ID, PacketType::AUTH_RESPONSE, Bytes::new()),
        &mut incoming,
    )?;

    while let Some(packet) = codec.decode(&mut incoming)? {
        let verdict = if packet.kind == PacketType::AUTH_RESPONSE && packet.id == AUTH_FAILED_ID {
            "auth rejected"
        } else {
            "ignored"
        };
        println!("Received {:?} -> {}", packet, verdict);
    }

    Ok(())
}
