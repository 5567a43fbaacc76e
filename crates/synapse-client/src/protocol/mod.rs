//! Wire protocol for the training event stream.

pub mod engine;
pub mod socket;

pub use engine::{EnginePacket, Handshake};
pub use socket::{SocketPacket, SocketPacketType};
