//! End-to-end bridge tests over real endpoints.
//!
//! Each test derives its channel identities under a unique temp directory
//! so parallel tests never collide on a socket path.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use scopelink_bridge::{Bridge, BridgeConfig, BridgeError, Packet, PacketSink, WorkerState};
use scopelink_frame::{encode_packet, PacketReader, PacketWriter};
use scopelink_transport::Endpoint;

use bytes::BytesMut;

fn test_config(tag: &str) -> BridgeConfig {
    let dir = PathBuf::from(format!(
        "/tmp/scopelink-{}-{}-{}",
        tag,
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    BridgeConfig {
        base_path: dir,
        ..BridgeConfig::default()
    }
}

fn cleanup(config: &BridgeConfig) {
    let _ = std::fs::remove_dir_all(&config.base_path);
}

/// Sink that collects delivered packets and wakes waiting asserts.
#[derive(Default)]
struct CollectSink {
    packets: Mutex<Vec<Packet>>,
    delivered: Condvar,
}

impl PacketSink for CollectSink {
    fn deliver(&self, packet: Packet) {
        self.packets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(packet);
        self.delivered.notify_all();
    }
}

impl CollectSink {
    fn wait_for(&self, count: usize, timeout: Duration) -> Vec<Packet> {
        let deadline = Instant::now() + timeout;
        let mut packets = self
            .packets
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while packets.len() < count {
            let remaining = deadline.saturating_duration_since(Instant::now());
            assert!(
                !remaining.is_zero(),
                "timed out waiting for {count} packets (got {})",
                packets.len()
            );
            let (guard, _) = self
                .delivered
                .wait_timeout(packets, remaining)
                .unwrap_or_else(PoisonError::into_inner);
            packets = guard;
        }
        packets.clone()
    }
}

fn wait_until(mut cond: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    cond()
}

#[test]
fn tx_peer_observes_exact_wire_bytes() {
    let config = test_config("wire");
    let mut bridge = Bridge::with_config("scope", Arc::new(CollectSink::default()), config.clone());

    bridge.enqueue(Packet::new(1, 0x0808, vec![1, 2, 3, 4, 5]));
    bridge.start_tx().expect("tx should start");

    let mut peer = Endpoint::connect(bridge.tx_path()).expect("peer should connect");
    let mut buf = [0u8; 11];
    peer.read_exact(&mut buf).expect("peer should read frame");

    assert_eq!(
        buf,
        [0x01, 0x00, 0x08, 0x08, 0x05, 0x00, 0x01, 0x02, 0x03, 0x04, 0x05]
    );

    bridge.stop();
    cleanup(&config);
}

#[test]
fn packets_enqueued_before_connect_arrive_in_order() {
    let config = test_config("preconnect");
    let mut bridge = Bridge::with_config("scope", Arc::new(CollectSink::default()), config.clone());

    let first = Packet::new(1, 1, &b"first"[..]);
    let second = Packet::new(2, 2, &b"second"[..]);
    bridge.enqueue(first.clone());
    bridge.enqueue(second.clone());
    bridge.start_tx().expect("tx should start");

    // The peer must observe the concatenation of both encodings.
    let mut expected = BytesMut::new();
    encode_packet(&first, &mut expected);
    encode_packet(&second, &mut expected);

    let mut peer = Endpoint::connect(bridge.tx_path()).expect("peer should connect");
    let mut buf = vec![0u8; expected.len()];
    peer.read_exact(&mut buf).expect("peer should read frames");
    assert_eq!(buf, expected.to_vec());

    bridge.stop();
    cleanup(&config);
}

#[test]
fn tx_preserves_fifo_over_many_packets() {
    let config = test_config("fifo");
    let mut bridge = Bridge::with_config("scope", Arc::new(CollectSink::default()), config.clone());
    bridge.start_tx().expect("tx should start");

    let peer = Endpoint::connect(bridge.tx_path()).expect("peer should connect");
    let mut reader = PacketReader::new(peer);

    for i in 0..64u16 {
        bridge.enqueue(Packet::new(i, i, i.to_le_bytes().to_vec()));
    }

    for i in 0..64u16 {
        let packet = reader.read_packet().expect("peer should decode frame");
        assert_eq!(packet.command, i);
        assert_eq!(packet.packet_id, i);
        assert_eq!(packet.data.as_ref(), &i.to_le_bytes());
    }

    bridge.stop();
    cleanup(&config);
}

#[test]
fn rx_delivers_decoded_packets_to_sink() {
    let config = test_config("rx");
    let sink = Arc::new(CollectSink::default());
    let mut bridge = Bridge::with_config("scope", Arc::clone(&sink) as Arc<dyn PacketSink>, config.clone());
    bridge.start_rx().expect("rx should start");

    let peer = Endpoint::connect(bridge.rx_path()).expect("peer should connect");
    let mut writer = PacketWriter::new(peer);
    writer
        .write_packet(&Packet::new(3, 7, &b"inbound"[..]))
        .expect("peer should write frame");

    let packets = sink.wait_for(1, Duration::from_secs(5));
    assert_eq!(packets[0], Packet::new(3, 7, &b"inbound"[..]));

    bridge.stop();
    cleanup(&config);
}

#[test]
fn rx_substitutes_sentinel_for_oversized_frame_and_keeps_running() {
    let config = test_config("sentinel");
    let sink = Arc::new(CollectSink::default());
    let mut bridge = Bridge::with_config("scope", Arc::clone(&sink) as Arc<dyn PacketSink>, config.clone());
    bridge.start_rx().expect("rx should start");

    let mut peer = Endpoint::connect(bridge.rx_path()).expect("peer should connect");

    // Header declaring a payload far beyond capacity, then a good frame.
    let mut wire = BytesMut::new();
    wire.extend_from_slice(&9u16.to_le_bytes());
    wire.extend_from_slice(&1u16.to_le_bytes());
    wire.extend_from_slice(&u16::MAX.to_le_bytes());
    encode_packet(&Packet::new(4, 2, &b"after"[..]), &mut wire);
    peer.write_all(&wire).expect("peer should write");

    let packets = sink.wait_for(2, Duration::from_secs(5));
    assert_eq!(packets[0], Packet::sentinel(9, 1));
    assert_eq!(packets[1], Packet::new(4, 2, &b"after"[..]));
    assert_eq!(bridge.rx_state(), WorkerState::Running);

    bridge.stop();
    cleanup(&config);
}

#[test]
fn stop_without_peer_terminates_promptly() {
    let config = test_config("stop");
    let mut bridge = Bridge::with_config("scope", Arc::new(CollectSink::default()), config.clone());
    bridge.start().expect("bridge should start");

    // No peer ever connects; both workers are parked in accept.
    std::thread::sleep(Duration::from_millis(50));

    let begin = Instant::now();
    bridge.stop();
    let elapsed = begin.elapsed();

    assert!(
        elapsed < Duration::from_secs(2),
        "stop took {elapsed:?} with no peer connected"
    );
    assert_eq!(bridge.tx_state(), WorkerState::Stopped);
    assert_eq!(bridge.rx_state(), WorkerState::Stopped);

    cleanup(&config);
}

#[test]
fn start_while_running_restarts_cleanly() {
    let config = test_config("restart");
    let mut bridge = Bridge::with_config("scope", Arc::new(CollectSink::default()), config.clone());

    bridge.start_tx().expect("first start should succeed");
    // Starting again must stop the prior run first; if it leaked its
    // endpoint this create would fail with an identity collision.
    bridge.start_tx().expect("second start should succeed");

    bridge.enqueue(Packet::new(1, 1, &b"alive"[..]));
    let peer = Endpoint::connect(bridge.tx_path()).expect("peer should connect");
    let mut reader = PacketReader::new(peer);
    let packet = reader.read_packet().expect("restarted tx should deliver");
    assert_eq!(packet.data.as_ref(), b"alive");

    bridge.stop();
    cleanup(&config);
}

#[test]
fn rx_is_restartable_after_peer_disconnect() {
    let config = test_config("redisconnect");
    let sink = Arc::new(CollectSink::default());
    let mut bridge = Bridge::with_config("scope", Arc::clone(&sink) as Arc<dyn PacketSink>, config.clone());
    bridge.start_rx().expect("rx should start");

    {
        let peer = Endpoint::connect(bridge.rx_path()).expect("peer should connect");
        let mut writer = PacketWriter::new(peer);
        writer
            .write_packet(&Packet::new(1, 1, &b"one"[..]))
            .expect("peer should write");
        sink.wait_for(1, Duration::from_secs(5));
        // Peer drops here; the worker observes EOF and stops cleanly.
    }

    assert!(
        wait_until(
            || bridge.rx_state() == WorkerState::Stopped,
            Duration::from_secs(5)
        ),
        "rx worker should stop after disconnect"
    );

    bridge.start_rx().expect("rx should restart after disconnect");
    let peer = Endpoint::connect(bridge.rx_path()).expect("second peer should connect");
    let mut writer = PacketWriter::new(peer);
    writer
        .write_packet(&Packet::new(2, 2, &b"two"[..]))
        .expect("second peer should write");

    let packets = sink.wait_for(2, Duration::from_secs(5));
    assert_eq!(packets[1].data.as_ref(), b"two");

    bridge.stop();
    cleanup(&config);
}

#[test]
fn second_bridge_with_same_name_fails_to_start() {
    let config = test_config("collision");
    let mut first = Bridge::with_config("scope", Arc::new(CollectSink::default()), config.clone());
    let mut second = Bridge::with_config("scope", Arc::new(CollectSink::default()), config.clone());

    first.start_tx().expect("first bridge should start");
    let err = second
        .start_tx()
        .expect_err("second bridge must not share the channel");
    assert!(matches!(err, BridgeError::EndpointCreate(_)));

    first.stop();
    cleanup(&config);
}

#[test]
fn failed_rx_start_stops_tx_again() {
    let config = test_config("halfstart");
    let sink = Arc::new(CollectSink::default());
    let mut occupant = Bridge::with_config("scope", Arc::clone(&sink) as Arc<dyn PacketSink>, config.clone());
    occupant.start_rx().expect("occupant rx should start");

    let mut bridge = Bridge::with_config("scope", Arc::new(CollectSink::default()), config.clone());
    bridge
        .start()
        .expect_err("start must fail while the rx identity is taken");

    // The tx endpoint must have been torn down again.
    assert_eq!(bridge.tx_state(), WorkerState::Stopped);
    assert!(
        !bridge.tx_path().exists(),
        "failed start must not leak the tx endpoint"
    );

    occupant.stop();
    cleanup(&config);
}
