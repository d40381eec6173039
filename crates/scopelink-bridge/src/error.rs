/// Errors surfaced by bridge lifecycle operations.
///
/// Worker-loop failures (peer disconnects, transient I/O, malformed frames)
/// never appear here; they are classified and handled inside the loops.
/// Only starting a direction can fail synchronously.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Creating the direction's IPC endpoint failed; no worker thread was
    /// spawned.
    #[error("endpoint creation failed: {0}")]
    EndpointCreate(#[from] scopelink_transport::TransportError),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
