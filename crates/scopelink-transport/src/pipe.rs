use std::ffi::c_void;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use windows_sys::Win32::Foundation::{
    CloseHandle, GetLastError, ERROR_BROKEN_PIPE, ERROR_MORE_DATA, ERROR_PIPE_CONNECTED,
    GENERIC_READ, GENERIC_WRITE, HANDLE, INVALID_HANDLE_VALUE,
};
use windows_sys::Win32::Storage::FileSystem::{
    CreateFileW, ReadFile, WriteFile, FILE_FLAG_FIRST_PIPE_INSTANCE, OPEN_EXISTING,
};
use windows_sys::Win32::System::Pipes::{
    ConnectNamedPipe, CreateNamedPipeW, DisconnectNamedPipe, PeekNamedPipe,
    SetNamedPipeHandleState, PIPE_ACCESS_DUPLEX, PIPE_READMODE_MESSAGE, PIPE_REJECT_REMOTE_CLIENTS,
    PIPE_TYPE_MESSAGE, PIPE_WAIT,
};

use crate::error::{Result, TransportError};
use crate::stream::EndpointStream;

/// In/out buffer size for created pipe instances.
const PIPE_BUFFER_SIZE: u32 = 4096 * 16;

/// Interval between readability polls when a read timeout is set.
const READ_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Named pipe endpoint.
///
/// Creates a single-instance, message-mode duplex pipe that rejects remote
/// clients. `FILE_FLAG_FIRST_PIPE_INSTANCE` forces creation to fail if a
/// pipe with the same name already exists, so two bridge instances can
/// never share a channel undetected.
pub struct NamedPipeEndpoint {
    handle: HANDLE,
    path: PathBuf,
}

// SAFETY: the pipe handle is only ever driven from one thread at a time;
// the bridge moves the endpoint into its worker thread wholesale.
unsafe impl Send for NamedPipeEndpoint {}

impl NamedPipeEndpoint {
    /// Create the endpoint: create the named pipe at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let wide = wide_path(&path);

        // SAFETY: `wide` is a NUL-terminated UTF-16 pipe name that outlives
        // the call; all other arguments are plain flags and sizes.
        let handle = unsafe {
            CreateNamedPipeW(
                wide.as_ptr(),
                PIPE_ACCESS_DUPLEX | FILE_FLAG_FIRST_PIPE_INSTANCE,
                PIPE_TYPE_MESSAGE | PIPE_READMODE_MESSAGE | PIPE_WAIT | PIPE_REJECT_REMOTE_CLIENTS,
                1,
                PIPE_BUFFER_SIZE,
                PIPE_BUFFER_SIZE,
                0,
                std::ptr::null(),
            )
        };

        if handle == INVALID_HANDLE_VALUE {
            return Err(TransportError::Create {
                path,
                source: std::io::Error::last_os_error(),
            });
        }

        info!(?path, "endpoint created named pipe");

        Ok(Self { handle, path })
    }

    /// Accept one incoming peer connection (blocking).
    pub fn accept(&self) -> Result<EndpointStream> {
        // SAFETY: `handle` is a valid pipe server handle owned by `self`.
        let ok = unsafe { ConnectNamedPipe(self.handle, std::ptr::null_mut()) };
        if ok == 0 {
            // The client can win the race and connect between CreateNamedPipe
            // and ConnectNamedPipe; that surfaces as ERROR_PIPE_CONNECTED.
            let err = unsafe { GetLastError() };
            if err != ERROR_PIPE_CONNECTED {
                return Err(TransportError::Accept(std::io::Error::last_os_error()));
            }
        }
        debug!(path = ?self.path, "accepted peer connection");
        Ok(EndpointStream::from_pipe(PipeStream {
            handle: self.handle,
            owned: false,
            read_timeout: None,
        }))
    }

    /// Connect to a listening endpoint (blocking).
    pub fn connect(path: impl AsRef<Path>) -> Result<EndpointStream> {
        let path = path.as_ref();
        let wide = wide_path(path);

        // SAFETY: `wide` is a NUL-terminated UTF-16 pipe name valid for the
        // duration of the call.
        let handle = unsafe {
            CreateFileW(
                wide.as_ptr(),
                GENERIC_READ | GENERIC_WRITE,
                0,
                std::ptr::null(),
                OPEN_EXISTING,
                0,
                std::ptr::null_mut(),
            )
        };

        if handle == INVALID_HANDLE_VALUE {
            return Err(TransportError::Connect {
                path: path.to_path_buf(),
                source: std::io::Error::last_os_error(),
            });
        }

        let mode = PIPE_READMODE_MESSAGE;
        // SAFETY: `handle` was just opened by this function; `mode` is a
        // valid pointer for the call.
        let ok =
            unsafe { SetNamedPipeHandleState(handle, &mode, std::ptr::null(), std::ptr::null()) };
        if ok == 0 {
            let source = std::io::Error::last_os_error();
            unsafe { CloseHandle(handle) };
            return Err(TransportError::Connect {
                path: path.to_path_buf(),
                source,
            });
        }

        debug!(?path, "connected to named pipe");
        Ok(EndpointStream::from_pipe(PipeStream {
            handle,
            owned: true,
            read_timeout: None,
        }))
    }

    /// The pipe name this endpoint was created with.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for NamedPipeEndpoint {
    fn drop(&mut self) {
        if self.handle != INVALID_HANDLE_VALUE {
            // SAFETY: `handle` is owned by `self` and closed exactly once.
            unsafe {
                DisconnectNamedPipe(self.handle);
                CloseHandle(self.handle);
            }
            self.handle = INVALID_HANDLE_VALUE;
        }
    }
}

/// A connected pipe stream.
///
/// The server side borrows the endpoint's handle (the pipe instance *is*
/// the stream once a client connects); the client side owns its handle.
pub struct PipeStream {
    handle: HANDLE,
    owned: bool,
    read_timeout: Option<Duration>,
}

// SAFETY: see `NamedPipeEndpoint`; one driving thread at a time.
unsafe impl Send for PipeStream {}

impl PipeStream {
    pub(crate) fn set_read_timeout(&mut self, timeout: Option<Duration>) {
        self.read_timeout = timeout;
    }

    /// Wait until the pipe has readable bytes or the timeout elapses.
    fn wait_readable(&self) -> std::io::Result<()> {
        let Some(timeout) = self.read_timeout else {
            return Ok(());
        };
        let deadline = Instant::now() + timeout;
        loop {
            let mut available: u32 = 0;
            // SAFETY: `available` is a valid writable pointer; the data and
            // message arguments are allowed to be null.
            let ok = unsafe {
                PeekNamedPipe(
                    self.handle,
                    std::ptr::null_mut(),
                    0,
                    std::ptr::null_mut(),
                    &mut available,
                    std::ptr::null_mut(),
                )
            };
            if ok == 0 {
                return Err(std::io::Error::last_os_error());
            }
            if available > 0 {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(std::io::Error::from(ErrorKind::TimedOut));
            }
            std::thread::sleep(READ_POLL_INTERVAL);
        }
    }
}

impl Read for PipeStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.wait_readable()?;

        let mut bytes_read: u32 = 0;
        // SAFETY: `buf` is a valid writable buffer of the given length and
        // `bytes_read` a valid writable pointer.
        let ok = unsafe {
            ReadFile(
                self.handle,
                buf.as_mut_ptr().cast::<c_void>(),
                buf.len() as u32,
                &mut bytes_read,
                std::ptr::null_mut(),
            )
        };
        if ok == 0 {
            let err = unsafe { GetLastError() };
            return match err {
                // A message larger than `buf` was truncated; the remainder
                // stays readable on the next call.
                ERROR_MORE_DATA => Ok(bytes_read as usize),
                // Orderly disconnect maps to EOF, like a socket.
                ERROR_BROKEN_PIPE => Ok(0),
                _ => Err(std::io::Error::last_os_error()),
            };
        }
        Ok(bytes_read as usize)
    }
}

impl Write for PipeStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut bytes_written: u32 = 0;
        // SAFETY: `buf` is a valid readable buffer of the given length and
        // `bytes_written` a valid writable pointer.
        let ok = unsafe {
            WriteFile(
                self.handle,
                buf.as_ptr().cast::<c_void>(),
                buf.len() as u32,
                &mut bytes_written,
                std::ptr::null_mut(),
            )
        };
        if ok == 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(bytes_written as usize)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Drop for PipeStream {
    fn drop(&mut self) {
        if self.owned && self.handle != INVALID_HANDLE_VALUE {
            // SAFETY: client-side handle owned by `self`, closed once.
            unsafe { CloseHandle(self.handle) };
            self.handle = INVALID_HANDLE_VALUE;
        }
    }
}

fn wide_path(path: &Path) -> Vec<u16> {
    use std::os::windows::ffi::OsStrExt;
    path.as_os_str().encode_wide().chain(Some(0)).collect()
}
