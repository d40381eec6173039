use std::path::PathBuf;

/// Errors that can occur in IPC endpoint operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to create the endpoint resource at the given identity.
    ///
    /// Raised when the resource already exists and is live, when permission
    /// is denied, or on any other OS failure while binding.
    #[error("failed to create endpoint at {path}: {source}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to connect to the endpoint at the given identity.
    #[error("failed to connect to {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to accept an incoming peer connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on a connected stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The endpoint path is too long for the platform.
    #[error("endpoint path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },
}

pub type Result<T> = std::result::Result<T, TransportError>;
