//! Minimal bridge demo: hosts a bridge, connects a peer to both channels,
//! and moves one packet in each direction.
//!
//! Run with:
//!   cargo run --example loopback -p scopelink-bridge

use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use scopelink_bridge::{Bridge, BridgeConfig, LogSink, Packet};
use scopelink_frame::{PacketWriter, HEADER_SIZE};
use scopelink_transport::Endpoint;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let base = std::env::temp_dir().join(format!("scopelink-demo-{}", std::process::id()));
    std::fs::create_dir_all(&base)?;

    let config = BridgeConfig {
        base_path: base.clone(),
        ..BridgeConfig::default()
    };
    let mut bridge = Bridge::with_config("demo", Arc::new(LogSink), config);

    // The original manual test: queue a packet before any peer exists.
    bridge.enqueue(Packet::new(1, 0x0808, vec![1, 2, 3, 4, 5]));
    bridge.start()?;
    eprintln!(
        "bridge up: tx={} rx={}",
        bridge.tx_path().display(),
        bridge.rx_path().display()
    );

    // Peer side: read the queued packet off the TX channel.
    let mut tx_peer = Endpoint::connect(bridge.tx_path())?;
    let mut frame = [0u8; HEADER_SIZE + 5];
    tx_peer.read_exact(&mut frame)?;
    eprintln!("peer received frame: {frame:02X?}");

    // Peer side: send a packet back on the RX channel; LogSink prints it.
    let rx_peer = Endpoint::connect(bridge.rx_path())?;
    let mut writer = PacketWriter::new(rx_peer);
    writer.write_packet(&Packet::new(2, 0x0001, &b"hello scope"[..]))?;

    std::thread::sleep(Duration::from_millis(200));
    bridge.stop();

    let _ = std::fs::remove_dir_all(&base);
    Ok(())
}
