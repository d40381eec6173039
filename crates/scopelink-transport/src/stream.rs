use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;

/// A connected IPC stream implementing `Read` + `Write`.
///
/// This is the fundamental I/O type returned by endpoint operations.
/// On Unix it wraps a Unix domain socket stream; on Windows it wraps a
/// named pipe handle.
pub struct EndpointStream {
    inner: StreamInner,
}

enum StreamInner {
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
    #[cfg(windows)]
    Pipe(crate::pipe::PipeStream),
}

impl Read for EndpointStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            StreamInner::Unix(stream) => stream.read(buf),
            #[cfg(windows)]
            StreamInner::Pipe(pipe) => pipe.read(buf),
        }
    }
}

impl Write for EndpointStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            StreamInner::Unix(stream) => stream.write(buf),
            #[cfg(windows)]
            StreamInner::Pipe(pipe) => pipe.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            StreamInner::Unix(stream) => stream.flush(),
            #[cfg(windows)]
            StreamInner::Pipe(pipe) => pipe.flush(),
        }
    }
}

impl EndpointStream {
    #[cfg(unix)]
    pub(crate) fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: StreamInner::Unix(stream),
        }
    }

    #[cfg(windows)]
    pub(crate) fn from_pipe(pipe: crate::pipe::PipeStream) -> Self {
        Self {
            inner: StreamInner::Pipe(pipe),
        }
    }

    /// Set a read timeout on the stream.
    ///
    /// With a timeout set, a blocked `read` returns `ErrorKind::TimedOut` /
    /// `ErrorKind::WouldBlock` once the interval elapses, so a worker loop
    /// can re-check its run flag between attempts.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            StreamInner::Unix(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            #[cfg(windows)]
            StreamInner::Pipe(pipe) => {
                pipe.set_read_timeout(timeout);
                Ok(())
            }
        }
    }

    /// Set a write timeout on the stream.
    pub fn set_write_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            StreamInner::Unix(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
            #[cfg(windows)]
            StreamInner::Pipe(_) => Ok(()),
        }
    }

    /// Get the credentials of the connected peer (Linux only).
    ///
    /// Returns `(uid, gid, pid)` via `SO_PEERCRED`, or `None` if unavailable.
    #[cfg(target_os = "linux")]
    pub fn peer_credentials(&self) -> Option<(u32, u32, u32)> {
        use std::os::fd::AsRawFd;

        let fd = match &self.inner {
            StreamInner::Unix(stream) => stream.as_raw_fd(),
        };

        let mut cred = libc::ucred {
            pid: 0,
            uid: 0,
            gid: 0,
        };
        let mut len = std::mem::size_of::<libc::ucred>() as libc::socklen_t;

        // SAFETY: `cred` and `len` are valid writable pointers for the
        // provided sizes, and `fd` is an open Unix socket descriptor owned
        // by this process.
        let rc = unsafe {
            libc::getsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_PEERCRED,
                (&mut cred as *mut libc::ucred).cast::<libc::c_void>(),
                &mut len,
            )
        };

        if rc == 0 && len as usize == std::mem::size_of::<libc::ucred>() {
            Some((cred.uid, cred.gid, cred.pid as u32))
        } else {
            None
        }
    }

    /// Get the credentials of the connected peer.
    ///
    /// Returns `None` on platforms that do not expose peer credentials.
    #[cfg(not(target_os = "linux"))]
    pub fn peer_credentials(&self) -> Option<(u32, u32, u32)> {
        None
    }
}

impl std::fmt::Debug for EndpointStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            #[cfg(unix)]
            StreamInner::Unix(_) => f
                .debug_struct("EndpointStream")
                .field("type", &"unix")
                .finish(),
            #[cfg(windows)]
            StreamInner::Pipe(_) => f
                .debug_struct("EndpointStream")
                .field("type", &"pipe")
                .finish(),
        }
    }
}
