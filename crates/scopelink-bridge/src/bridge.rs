use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use scopelink_frame::Packet;

use crate::error::Result;
use crate::queue::PacketQueue;
use crate::sink::PacketSink;
use crate::worker::{Direction, RxWorker, TxWorker, WorkerState};

/// Default location for endpoint identities.
#[cfg(unix)]
pub const DEFAULT_BASE_PATH: &str = "/tmp/";
#[cfg(windows)]
pub const DEFAULT_BASE_PATH: &str = r"\\.\pipe\";

/// Configuration for a bridge instance.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Directory (Unix) or pipe namespace (Windows) the channel identities
    /// are derived under.
    pub base_path: PathBuf,
    /// Bounded read timeout the Rx worker uses between run-flag checks.
    pub read_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from(DEFAULT_BASE_PATH),
            read_timeout: Duration::from_millis(100),
        }
    }
}

/// Local packet bridge between a device-control process and a host
/// application.
///
/// Owns one transmit and one receive direction, each with its own IPC
/// endpoint and worker thread. Channel identities are derived from the
/// instance name: `base_path + name + "TX"` and `base_path + name + "RX"`.
///
/// Producers hand packets to [`Bridge::enqueue`]; decoded inbound packets
/// are delivered to the [`PacketSink`] supplied at construction. Dropping
/// the bridge stops both directions.
pub struct Bridge {
    name: String,
    queue: Arc<PacketQueue>,
    tx: TxWorker,
    rx: RxWorker,
}

impl Bridge {
    /// Create a bridge with the default configuration.
    pub fn new(name: impl Into<String>, sink: Arc<dyn PacketSink>) -> Self {
        Self::with_config(name, sink, BridgeConfig::default())
    }

    /// Create a bridge with an explicit configuration.
    pub fn with_config(
        name: impl Into<String>,
        sink: Arc<dyn PacketSink>,
        config: BridgeConfig,
    ) -> Self {
        let name = name.into();
        let queue = Arc::new(PacketQueue::new());
        let tx_path = endpoint_path(&config.base_path, &name, Direction::Tx);
        let rx_path = endpoint_path(&config.base_path, &name, Direction::Rx);
        debug!(%name, ?tx_path, ?rx_path, "derived bridge channel identities");

        Self {
            tx: TxWorker::new(tx_path, Arc::clone(&queue)),
            rx: RxWorker::new(rx_path, sink, config.read_timeout),
            name,
            queue,
        }
    }

    /// Start both directions.
    ///
    /// If the Rx endpoint cannot be created the already-started Tx
    /// direction is stopped again, so a failed start leaves no endpoint
    /// behind.
    pub fn start(&mut self) -> Result<()> {
        self.start_tx()?;
        if let Err(err) = self.start_rx() {
            self.stop_tx();
            return Err(err);
        }
        Ok(())
    }

    /// Stop both directions. Safe to call at any time, repeatedly.
    pub fn stop(&mut self) {
        self.stop_rx();
        self.stop_tx();
    }

    /// Start the transmit direction only.
    pub fn start_tx(&mut self) -> Result<()> {
        self.tx.start()
    }

    /// Start the receive direction only.
    pub fn start_rx(&mut self) -> Result<()> {
        self.rx.start()
    }

    /// Stop the transmit direction only.
    pub fn stop_tx(&mut self) {
        self.tx.stop()
    }

    /// Stop the receive direction only.
    pub fn stop_rx(&mut self) {
        self.rx.stop()
    }

    /// Queue a packet for transmission to the host application.
    ///
    /// Ownership of the packet moves into the queue; delivery order is
    /// enqueue order. Packets enqueued before a peer connects are delivered
    /// once one does.
    pub fn enqueue(&self, packet: Packet) {
        self.queue.push(packet);
    }

    /// Number of packets waiting in the transmit queue.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Bridge instance name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identity of the transmit endpoint.
    pub fn tx_path(&self) -> &PathBuf {
        self.tx.path()
    }

    /// Identity of the receive endpoint.
    pub fn rx_path(&self) -> &PathBuf {
        self.rx.path()
    }

    /// Lifecycle state of the transmit worker.
    pub fn tx_state(&self) -> WorkerState {
        self.tx.state()
    }

    /// Lifecycle state of the receive worker.
    pub fn rx_state(&self) -> WorkerState {
        self.rx.state()
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Derive an endpoint identity: `base_path + name + direction suffix`.
pub fn endpoint_path(base_path: &Path, name: &str, direction: Direction) -> PathBuf {
    base_path.join(format!("{name}{}", direction.suffix()))
}
