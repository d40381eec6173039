use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::warn;

/// Frame header: command (2) + packet id (2) + payload length (2) = 6 bytes.
pub const HEADER_SIZE: usize = 6;

/// Fixed receive buffer capacity; bounds one complete frame.
pub const BUFFER_SIZE: usize = 4096 * 16;

/// Maximum payload length a frame may declare.
pub const MAX_DATA_SIZE: usize = BUFFER_SIZE - HEADER_SIZE;

/// One application packet as relayed by the bridge.
///
/// A packet is a value: it moves from producer to queue to consumer by
/// transfer of ownership and is never shared between threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Command identifier interpreted by the host application.
    pub command: u16,
    /// Sequence id correlating requests with responses.
    pub packet_id: u16,
    /// Raw payload; its length is the frame's declared data size.
    pub data: Bytes,
}

impl Packet {
    /// Create a new packet.
    pub fn new(command: u16, packet_id: u16, data: impl Into<Bytes>) -> Self {
        Self {
            command,
            packet_id,
            data: data.into(),
        }
    }

    /// The sentinel packet substituted for a frame whose declared payload
    /// length is invalid: one zero byte, header fields preserved.
    pub fn sentinel(command: u16, packet_id: u16) -> Self {
        Self {
            command,
            packet_id,
            data: Bytes::from_static(&[0]),
        }
    }

    /// Payload length in bytes.
    pub fn data_size(&self) -> usize {
        self.data.len()
    }

    /// The total wire size of this packet (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.data.len()
    }
}

/// Encode a packet into the wire format.
///
/// Wire format, little-endian:
/// ```text
/// ┌─────────────┬─────────────┬─────────────┬──────────────────┐
/// │ Command     │ Packet ID   │ Data size   │ Payload          │
/// │ (2B LE)     │ (2B LE)     │ (2B LE)     │ (data size bytes)│
/// └─────────────┴─────────────┴─────────────┴──────────────────┘
/// ```
///
/// A payload longer than [`MAX_DATA_SIZE`] violates the packet invariant;
/// the sentinel packet is encoded in its place rather than aborting the
/// channel, with a distinct warning event.
pub fn encode_packet(packet: &Packet, dst: &mut BytesMut) {
    if packet.data.len() > MAX_DATA_SIZE {
        warn!(
            command = packet.command,
            packet_id = packet.packet_id,
            size = packet.data.len(),
            max = MAX_DATA_SIZE,
            "payload exceeds frame capacity; encoding sentinel packet"
        );
        return encode_packet(&Packet::sentinel(packet.command, packet.packet_id), dst);
    }

    dst.reserve(HEADER_SIZE + packet.data.len());
    dst.put_u16_le(packet.command);
    dst.put_u16_le(packet.packet_id);
    dst.put_u16_le(packet.data.len() as u16);
    dst.put_slice(&packet.data);
}

/// Decode one packet from a buffer.
///
/// Returns `None` if the buffer does not yet contain a complete frame; on
/// success, consumes the frame bytes.
///
/// A declared payload length beyond [`MAX_DATA_SIZE`] consumes the header
/// only and yields the sentinel packet, with a distinct warning event. The
/// channel stays up; genuine protocol corruption is visible in the logs.
pub fn decode_packet(src: &mut BytesMut) -> Option<Packet> {
    if src.len() < HEADER_SIZE {
        return None; // Need more data
    }

    let command = u16::from_le_bytes([src[0], src[1]]);
    let packet_id = u16::from_le_bytes([src[2], src[3]]);
    let data_size = u16::from_le_bytes([src[4], src[5]]) as usize;

    if data_size > MAX_DATA_SIZE {
        src.advance(HEADER_SIZE);
        warn!(
            command,
            packet_id,
            declared = data_size,
            max = MAX_DATA_SIZE,
            "frame declares oversized payload; substituting sentinel packet"
        );
        return Some(Packet::sentinel(command, packet_id));
    }

    let total = HEADER_SIZE + data_size;
    if src.len() < total {
        return None; // Need more data
    }

    src.advance(HEADER_SIZE);
    let data = src.split_to(data_size).freeze();

    Some(Packet {
        command,
        packet_id,
        data,
    })
}
