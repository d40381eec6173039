/// Errors that can occur while reading or writing packet frames.
///
/// Malformed frames are deliberately absent: an oversized declared payload
/// degrades to the sentinel packet at the codec layer instead of failing.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// An I/O error occurred on the underlying stream.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
