use std::path::Path;

use tracing::debug;

use crate::error::Result;
use crate::stream::EndpointStream;

/// Platform-selected IPC endpoint.
///
/// One abstraction, two concrete transports chosen at build time: a Unix
/// domain stream socket on Unix, a named pipe on Windows. The bridge
/// workers only ever see this type, so none of the directional logic forks
/// on platform.
///
/// Lifecycle: `create` binds the resource, `accept` blocks until exactly
/// one peer connects, dropping the endpoint releases the resource (and
/// unlinks the socket path on Unix).
pub struct Endpoint {
    inner: EndpointInner,
}

enum EndpointInner {
    #[cfg(unix)]
    Unix(crate::uds::UnixSocketEndpoint),
    #[cfg(windows)]
    Pipe(crate::pipe::NamedPipeEndpoint),
}

impl Endpoint {
    /// Create the endpoint resource at `path`.
    ///
    /// Fails if a live resource with that identity already exists.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        #[cfg(unix)]
        {
            Ok(Self {
                inner: EndpointInner::Unix(crate::uds::UnixSocketEndpoint::create(path)?),
            })
        }
        #[cfg(windows)]
        {
            Ok(Self {
                inner: EndpointInner::Pipe(crate::pipe::NamedPipeEndpoint::create(path)?),
            })
        }
    }

    /// Block until one peer connects; returns the connected stream.
    pub fn accept(&self) -> Result<EndpointStream> {
        match &self.inner {
            #[cfg(unix)]
            EndpointInner::Unix(endpoint) => endpoint.accept(),
            #[cfg(windows)]
            EndpointInner::Pipe(endpoint) => endpoint.accept(),
        }
    }

    /// Connect to a listening endpoint as a peer.
    pub fn connect(path: impl AsRef<Path>) -> Result<EndpointStream> {
        #[cfg(unix)]
        {
            crate::uds::UnixSocketEndpoint::connect(path)
        }
        #[cfg(windows)]
        {
            crate::pipe::NamedPipeEndpoint::connect(path)
        }
    }

    /// Unblock a thread parked in [`Endpoint::accept`] on `path`.
    ///
    /// Performs a throwaway self-connect; the woken accept returns a stream
    /// whose caller is expected to consult its run flag and bail out. Errors
    /// are ignored: if nothing is listening there is nothing to wake.
    pub fn wake(path: impl AsRef<Path>) {
        let path = path.as_ref();
        debug!(?path, "waking endpoint accept");
        let _ = Self::connect(path);
    }

    /// The identity this endpoint was created with.
    pub fn path(&self) -> &Path {
        match &self.inner {
            #[cfg(unix)]
            EndpointInner::Unix(endpoint) => endpoint.path(),
            #[cfg(windows)]
            EndpointInner::Pipe(endpoint) => endpoint.path(),
        }
    }
}
