//! Platform IPC endpoint layer for scopelink.
//!
//! Provides a single [`Endpoint`] abstraction over the two local transport
//! mechanisms the bridge runs on:
//! - Unix domain stream sockets (Linux/macOS)
//! - Named pipes (Windows)
//!
//! An endpoint is created (bound), accepts exactly one peer for its
//! lifetime, and hands back an [`EndpointStream`] implementing
//! `Read` + `Write`. This is the lowest layer of scopelink; the frame codec
//! and the bridge workers build on top of it.

pub mod endpoint;
pub mod error;
pub mod stream;

#[cfg(windows)]
pub mod pipe;
#[cfg(unix)]
pub mod uds;

pub use endpoint::Endpoint;
pub use error::{Result, TransportError};
pub use stream::EndpointStream;

#[cfg(unix)]
pub use uds::UnixSocketEndpoint;

#[cfg(windows)]
pub use pipe::NamedPipeEndpoint;
