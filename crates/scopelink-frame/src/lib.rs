//! Packet type and wire codec for scopelink.
//!
//! Every packet crossing the bridge is framed with a fixed 6-byte header of
//! three little-endian `u16` fields (command, packet id, payload length)
//! followed by the raw payload. One frame carries exactly one packet, and a
//! frame never exceeds the bridge buffer capacity.
//!
//! A frame whose declared payload length exceeds the capacity does not tear
//! the channel down: it degrades to a fixed single-byte sentinel packet and
//! a distinct warning event. See [`Packet::sentinel`].

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{decode_packet, encode_packet, Packet, BUFFER_SIZE, HEADER_SIZE, MAX_DATA_SIZE};
pub use error::{FrameError, Result};
pub use reader::PacketReader;
pub use writer::PacketWriter;
