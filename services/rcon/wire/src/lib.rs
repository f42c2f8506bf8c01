//! Source RCON packet framing and a `tokio_util` codec.
//!
//! This crate provides the low-level wire protocol used to talk to game
//! servers over remote console: packet layout, packet types, and a framed
//! codec that can be plugged into `tokio_util::codec::Framed`.
//!
//! ## Wire Format
//!
//! ```text
//! +----------------------+----------------------------+
//! | i32 size (LE)        | length of bytes that follow|
//! +----------------------+----------------------------+
//! | i32 id (LE)          | request id, echoed back    |
//! +----------------------+----------------------------+
//! | i32 type (LE)        | AUTH / EXEC / RESPONSE ... |
//! +----------------------+----------------------------+
//! | body                 | ASCII text, no NUL         |
//! +----------------------+----------------------------+
//! | 0x00 0x00            | body + packet terminator   |
//! +----------------------+----------------------------+
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod error;
pub mod packet;

// Re-export main types
pub use codec::RconCodec;
pub use error::WireError;
pub use packet::{
    Packet, PacketType, AUTH_FAILED_ID, DEFAULT_MAX_PACKET_SIZE, MIN_PACKET_SIZE,
    PACKET_HEADER_SIZE,
};
