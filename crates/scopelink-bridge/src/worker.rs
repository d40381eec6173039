use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use scopelink_frame::{FrameError, PacketReader, PacketWriter};
use scopelink_transport::{Endpoint, EndpointStream};

use crate::error::Result;
use crate::queue::PacketQueue;
use crate::sink::PacketSink;

/// Direction of a bridge worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Tx,
    Rx,
}

impl Direction {
    /// Suffix appended to the bridge name when deriving the endpoint
    /// identity.
    pub fn suffix(self) -> &'static str {
        match self {
            Direction::Tx => "TX",
            Direction::Rx => "RX",
        }
    }
}

/// Lifecycle states of a direction worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    /// Never started, or fully torn down after a previous run.
    Idle = 0,
    /// Endpoint created, blocked waiting for the peer to connect.
    Connecting = 1,
    /// Peer connected, moving packets.
    Running = 2,
    /// Shutting down after a disconnect, error, or stop request.
    Stopping = 3,
    /// Worker thread exited; the direction can be started again.
    Stopped = 4,
}

/// Lock-free state cell shared between a worker thread and its owner.
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(WorkerState::Idle as u8))
    }

    pub(crate) fn set(&self, state: WorkerState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }

    pub(crate) fn get(&self) -> WorkerState {
        match self.0.load(Ordering::SeqCst) {
            0 => WorkerState::Idle,
            1 => WorkerState::Connecting,
            2 => WorkerState::Running,
            3 => WorkerState::Stopping,
            _ => WorkerState::Stopped,
        }
    }
}

/// Classification of worker-loop I/O failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IoClass {
    /// Retry after re-checking the run flag.
    Transient,
    /// Peer is gone; stop cleanly, direction stays restartable.
    Disconnect,
    /// Unexpected failure; log and stop.
    Fatal,
}

fn classify(err: &FrameError) -> IoClass {
    match err {
        FrameError::ConnectionClosed => IoClass::Disconnect,
        FrameError::Io(io) => match io.kind() {
            std::io::ErrorKind::TimedOut
            | std::io::ErrorKind::WouldBlock
            | std::io::ErrorKind::Interrupted => IoClass::Transient,
            std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::ConnectionReset => {
                IoClass::Disconnect
            }
            _ => IoClass::Fatal,
        },
    }
}

/// Transmit-direction worker.
///
/// Owns the TX endpoint for its lifetime and drains the shared
/// [`PacketQueue`] to the connected host application in strict FIFO order.
pub struct TxWorker {
    path: PathBuf,
    queue: Arc<PacketQueue>,
    run: Arc<AtomicBool>,
    state: Arc<StateCell>,
    handle: Option<JoinHandle<()>>,
}

impl TxWorker {
    pub(crate) fn new(path: PathBuf, queue: Arc<PacketQueue>) -> Self {
        Self {
            path,
            queue,
            run: Arc::new(AtomicBool::new(false)),
            state: Arc::new(StateCell::new()),
            handle: None,
        }
    }

    /// Create the endpoint and spawn the worker thread.
    ///
    /// Idempotent: a running worker is stopped first. Endpoint creation
    /// failure is returned synchronously and no thread is spawned. Returns
    /// before a peer necessarily connects.
    pub fn start(&mut self) -> Result<()> {
        if self.handle.is_some() {
            self.stop();
        }

        let endpoint = Endpoint::create(&self.path)?;
        info!(path = ?self.path, "tx worker starting");

        self.queue.reopen();
        self.run.store(true, Ordering::SeqCst);
        self.state.set(WorkerState::Connecting);

        let queue = Arc::clone(&self.queue);
        let run = Arc::clone(&self.run);
        let state = Arc::clone(&self.state);
        self.handle = Some(std::thread::spawn(move || {
            tx_loop(endpoint, &queue, &run, &state);
        }));

        Ok(())
    }

    /// Request a cooperative stop and join the worker thread.
    ///
    /// Wakes a thread parked on the empty queue (queue close) or in the
    /// blocking accept (self-connect), so the join completes in bounded
    /// time even if no peer ever connected.
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        self.run.store(false, Ordering::SeqCst);
        self.state.set(WorkerState::Stopping);
        self.queue.close();
        Endpoint::wake(&self.path);

        if handle.join().is_err() {
            warn!(path = ?self.path, "tx worker thread panicked");
        }
        self.state.set(WorkerState::Stopped);
        info!(path = ?self.path, "tx worker stopped");
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WorkerState {
        self.state.get()
    }

    /// Whether a worker thread has been spawned and not yet joined.
    pub fn is_started(&self) -> bool {
        self.handle.is_some()
    }

    /// The endpoint identity this direction binds.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl Drop for TxWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn tx_loop(endpoint: Endpoint, queue: &PacketQueue, run: &AtomicBool, state: &StateCell) {
    let Some(stream) = await_peer(&endpoint, run, state) else {
        return;
    };

    let mut writer = PacketWriter::new(stream);
    while run.load(Ordering::SeqCst) {
        // Blocks until a packet arrives or the queue is closed by stop().
        let Some(packet) = queue.pop() else {
            break;
        };

        if let Err(err) = writer.write_packet(&packet) {
            match classify(&err) {
                IoClass::Transient => continue,
                IoClass::Disconnect => {
                    info!(path = ?endpoint.path(), "tx peer disconnected");
                    break;
                }
                IoClass::Fatal => {
                    error!(path = ?endpoint.path(), %err, "tx worker I/O failure");
                    break;
                }
            }
        }
    }

    state.set(WorkerState::Stopped);
}

/// Receive-direction worker.
///
/// Owns the RX endpoint for its lifetime, decodes arriving frames, and
/// delivers each packet to the external sink.
pub struct RxWorker {
    path: PathBuf,
    sink: Arc<dyn PacketSink>,
    read_timeout: Duration,
    run: Arc<AtomicBool>,
    state: Arc<StateCell>,
    handle: Option<JoinHandle<()>>,
}

impl RxWorker {
    pub(crate) fn new(path: PathBuf, sink: Arc<dyn PacketSink>, read_timeout: Duration) -> Self {
        Self {
            path,
            sink,
            read_timeout,
            run: Arc::new(AtomicBool::new(false)),
            state: Arc::new(StateCell::new()),
            handle: None,
        }
    }

    /// Create the endpoint and spawn the worker thread.
    ///
    /// Same contract as [`TxWorker::start`].
    pub fn start(&mut self) -> Result<()> {
        if self.handle.is_some() {
            self.stop();
        }

        let endpoint = Endpoint::create(&self.path)?;
        info!(path = ?self.path, "rx worker starting");

        self.run.store(true, Ordering::SeqCst);
        self.state.set(WorkerState::Connecting);

        let sink = Arc::clone(&self.sink);
        let run = Arc::clone(&self.run);
        let state = Arc::clone(&self.state);
        let read_timeout = self.read_timeout;
        self.handle = Some(std::thread::spawn(move || {
            rx_loop(endpoint, sink.as_ref(), read_timeout, &run, &state);
        }));

        Ok(())
    }

    /// Request a cooperative stop and join the worker thread.
    ///
    /// A thread parked in accept is woken by a self-connect; a thread
    /// blocked in a read observes the bounded read timeout and re-checks
    /// the run flag.
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        self.run.store(false, Ordering::SeqCst);
        self.state.set(WorkerState::Stopping);
        Endpoint::wake(&self.path);

        if handle.join().is_err() {
            warn!(path = ?self.path, "rx worker thread panicked");
        }
        self.state.set(WorkerState::Stopped);
        info!(path = ?self.path, "rx worker stopped");
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WorkerState {
        self.state.get()
    }

    /// Whether a worker thread has been spawned and not yet joined.
    pub fn is_started(&self) -> bool {
        self.handle.is_some()
    }

    /// The endpoint identity this direction binds.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl Drop for RxWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn rx_loop(
    endpoint: Endpoint,
    sink: &dyn PacketSink,
    read_timeout: Duration,
    run: &AtomicBool,
    state: &StateCell,
) {
    let Some(mut stream) = await_peer(&endpoint, run, state) else {
        return;
    };

    if let Err(err) = stream.set_read_timeout(Some(read_timeout)) {
        error!(path = ?endpoint.path(), %err, "failed to set rx read timeout");
        state.set(WorkerState::Stopped);
        return;
    }

    let mut reader = PacketReader::new(stream);
    while run.load(Ordering::SeqCst) {
        match reader.read_packet() {
            Ok(packet) => sink.deliver(packet),
            Err(err) => match classify(&err) {
                IoClass::Transient => continue,
                IoClass::Disconnect => {
                    info!(path = ?endpoint.path(), "rx peer disconnected");
                    break;
                }
                IoClass::Fatal => {
                    error!(path = ?endpoint.path(), %err, "rx worker I/O failure");
                    break;
                }
            },
        }
    }

    state.set(WorkerState::Stopped);
}

/// Block in accept until a peer connects; `None` if the worker was stopped
/// while waiting (the wake self-connect also lands here).
fn await_peer(endpoint: &Endpoint, run: &AtomicBool, state: &StateCell) -> Option<EndpointStream> {
    let stream = match endpoint.accept() {
        Ok(stream) => stream,
        Err(err) => {
            if run.load(Ordering::SeqCst) {
                error!(path = ?endpoint.path(), %err, "endpoint accept failed");
            }
            state.set(WorkerState::Stopped);
            return None;
        }
    };

    if !run.load(Ordering::SeqCst) {
        // Stop was requested while parked in accept; the connection that
        // woke us is the throwaway wake client.
        state.set(WorkerState::Stopped);
        return None;
    }

    match stream.peer_credentials() {
        Some((uid, _gid, pid)) => {
            info!(path = ?endpoint.path(), uid, pid, "peer connected")
        }
        None => info!(path = ?endpoint.path(), "peer connected"),
    }
    debug!(path = ?endpoint.path(), "direction entering running state");
    state.set(WorkerState::Running);
    Some(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_suffixes() {
        assert_eq!(Direction::Tx.suffix(), "TX");
        assert_eq!(Direction::Rx.suffix(), "RX");
    }

    #[test]
    fn state_cell_roundtrips_all_states() {
        let cell = StateCell::new();
        assert_eq!(cell.get(), WorkerState::Idle);

        for state in [
            WorkerState::Connecting,
            WorkerState::Running,
            WorkerState::Stopping,
            WorkerState::Stopped,
        ] {
            cell.set(state);
            assert_eq!(cell.get(), state);
        }
    }

    #[test]
    fn classify_timeouts_as_transient() {
        for kind in [
            std::io::ErrorKind::TimedOut,
            std::io::ErrorKind::WouldBlock,
            std::io::ErrorKind::Interrupted,
        ] {
            let err = FrameError::Io(std::io::Error::from(kind));
            assert_eq!(classify(&err), IoClass::Transient);
        }
    }

    #[test]
    fn classify_closure_as_disconnect() {
        assert_eq!(classify(&FrameError::ConnectionClosed), IoClass::Disconnect);
        let broken = FrameError::Io(std::io::Error::from(std::io::ErrorKind::BrokenPipe));
        assert_eq!(classify(&broken), IoClass::Disconnect);
    }

    #[test]
    fn classify_unknown_as_fatal() {
        let err = FrameError::Io(std::io::Error::other("disk on fire"));
        assert_eq!(classify(&err), IoClass::Fatal);
    }
}
