use scopelink_frame::Packet;
use tracing::info;

/// Consumer interface for packets arriving from the host application.
///
/// The Rx worker invokes [`deliver`](PacketSink::deliver) once per decoded
/// frame, transferring ownership of the packet. Implementations run on the
/// worker thread and should hand heavy work off rather than stall the read
/// loop.
pub trait PacketSink: Send + Sync {
    fn deliver(&self, packet: Packet);
}

/// Observe-and-discard sink.
///
/// Placeholder for real packet routing: logs each delivery and drops the
/// packet. Integrations replace this with their own dispatch.
#[derive(Debug, Default)]
pub struct LogSink;

impl PacketSink for LogSink {
    fn deliver(&self, packet: Packet) {
        info!(
            command = packet.command,
            packet_id = packet.packet_id,
            data_size = packet.data_size(),
            "received packet"
        );
    }
}
