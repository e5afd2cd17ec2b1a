//! Bedrock packet codec: wire primitives, packet types and dispatch.

pub mod codec;
pub mod dispatch;
pub mod error;
pub mod packets;
pub mod resources;
pub mod wire;

pub use dispatch::{dispatch, PacketHeader};
pub use error::{DecodeError, EncodeError, ProtocolError, WireError};
pub use packets::{Packet, PacketPayload, Session};
pub use wire::{ByteCursor, Wire};
