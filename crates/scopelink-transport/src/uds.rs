use std::io::ErrorKind;
use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::EndpointStream;

/// Unix domain socket endpoint.
///
/// Binds a filesystem-path stream socket and accepts a single peer. A stale
/// socket file left over from an unclean shutdown is unlinked before binding;
/// a path with a *live* listener behind it is a creation error so that two
/// bridge instances can never share a channel undetected.
pub struct UnixSocketEndpoint {
    listener: UnixListener,
    path: PathBuf,
    created_inode: Option<(u64, u64)>,
}

impl UnixSocketEndpoint {
    /// Permission mode for created socket paths.
    const SOCKET_MODE: u32 = 0o600;
    /// Maximum socket path length.
    /// `sockaddr_un.sun_path` is 108 bytes on Linux, 104 on macOS.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    /// Create the endpoint: bind and listen on `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let path_bytes = path.as_os_str().len();
        if path_bytes >= Self::MAX_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path,
                len: path_bytes,
                max: Self::MAX_PATH_LEN,
            });
        }

        if path.exists() {
            Self::clear_stale_path(&path)?;
        }

        let listener = UnixListener::bind(&path).map_err(|e| TransportError::Create {
            path: path.clone(),
            source: e,
        })?;

        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(Self::SOCKET_MODE))
            .map_err(|e| TransportError::Create {
                path: path.clone(),
                source: e,
            })?;
        let created_metadata =
            std::fs::symlink_metadata(&path).map_err(|e| TransportError::Create {
                path: path.clone(),
                source: e,
            })?;
        let created_inode = Some((created_metadata.dev(), created_metadata.ino()));

        info!(?path, "endpoint listening on unix domain socket");

        Ok(Self {
            listener,
            path,
            created_inode,
        })
    }

    /// Unlink a leftover socket file, but refuse to touch a path that is
    /// still served by a live listener or that is not a socket at all.
    fn clear_stale_path(path: &Path) -> Result<()> {
        let metadata = std::fs::symlink_metadata(path).map_err(|e| TransportError::Create {
            path: path.to_path_buf(),
            source: e,
        })?;
        if !metadata.file_type().is_socket() {
            return Err(TransportError::Create {
                path: path.to_path_buf(),
                source: std::io::Error::new(
                    ErrorKind::AlreadyExists,
                    "existing path is not a unix socket",
                ),
            });
        }

        // Probe the socket: a successful connect means another endpoint is
        // live on this identity; connection refused means the file is stale.
        match UnixStream::connect(path) {
            Ok(_) => Err(TransportError::Create {
                path: path.to_path_buf(),
                source: std::io::Error::new(
                    ErrorKind::AddrInUse,
                    "endpoint identity already served by a live listener",
                ),
            }),
            Err(e) if e.kind() == ErrorKind::ConnectionRefused => {
                debug!(?path, "removing stale socket");
                std::fs::remove_file(path).map_err(|e| TransportError::Create {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
            Err(e) => Err(TransportError::Create {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    /// Accept one incoming peer connection (blocking).
    pub fn accept(&self) -> Result<EndpointStream> {
        let (stream, _addr) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(path = ?self.path, "accepted peer connection");
        Ok(EndpointStream::from_unix(stream))
    }

    /// Connect to a listening endpoint (blocking).
    pub fn connect(path: impl AsRef<Path>) -> Result<EndpointStream> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path).map_err(|e| TransportError::Connect {
            path: path.to_path_buf(),
            source: e,
        })?;
        debug!(?path, "connected to unix domain socket");
        Ok(EndpointStream::from_unix(stream))
    }

    /// The path this endpoint is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for UnixSocketEndpoint {
    fn drop(&mut self) {
        if let Some((expected_dev, expected_ino)) = self.created_inode {
            if let Ok(metadata) = std::fs::symlink_metadata(&self.path) {
                if metadata.file_type().is_socket()
                    && metadata.dev() == expected_dev
                    && metadata.ino() == expected_ino
                {
                    debug!(path = ?self.path, "unlinking socket file");
                    let _ = std::fs::remove_file(&self.path);
                } else {
                    debug!(
                        path = ?self.path,
                        "socket path identity changed; skipping unlink"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    fn temp_sock(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("scopelink-uds-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join("test.sock")
    }

    #[test]
    fn create_accept_connect() {
        let sock_path = temp_sock("basic");

        let endpoint = UnixSocketEndpoint::create(&sock_path).unwrap();
        assert!(sock_path.exists());

        let path_clone = sock_path.clone();
        let handle = std::thread::spawn(move || {
            let mut client = UnixSocketEndpoint::connect(&path_clone).unwrap();
            client.write_all(b"hello").unwrap();
        });

        let mut server = endpoint.accept().unwrap();
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");

        handle.join().unwrap();

        drop(endpoint);
        assert!(
            !sock_path.exists(),
            "socket file should be unlinked on drop"
        );
        let _ = std::fs::remove_dir_all(sock_path.parent().unwrap());
    }

    #[test]
    fn create_fails_when_identity_is_live() {
        let sock_path = temp_sock("live");

        let _first = UnixSocketEndpoint::create(&sock_path).unwrap();
        let second = UnixSocketEndpoint::create(&sock_path);
        assert!(matches!(second, Err(TransportError::Create { .. })));

        let _ = std::fs::remove_dir_all(sock_path.parent().unwrap());
    }

    #[test]
    fn create_unlinks_stale_socket() {
        let sock_path = temp_sock("stale");

        // Bind and drop without cleanup: fake an unclean shutdown by
        // disabling the inode guard through a rename dance.
        {
            let endpoint = UnixSocketEndpoint::create(&sock_path).unwrap();
            let keep = sock_path.with_extension("keep");
            std::fs::rename(&sock_path, &keep).unwrap();
            drop(endpoint);
            std::fs::rename(&keep, &sock_path).unwrap();
        }
        assert!(sock_path.exists(), "stale socket file should remain");

        let endpoint = UnixSocketEndpoint::create(&sock_path).unwrap();
        assert!(sock_path.exists());

        drop(endpoint);
        let _ = std::fs::remove_dir_all(sock_path.parent().unwrap());
    }

    #[test]
    fn create_rejects_existing_non_socket_file() {
        let sock_path = temp_sock("file");
        std::fs::write(&sock_path, b"regular-file").unwrap();

        let result = UnixSocketEndpoint::create(&sock_path);
        assert!(matches!(result, Err(TransportError::Create { .. })));

        let _ = std::fs::remove_dir_all(sock_path.parent().unwrap());
    }

    #[test]
    fn create_rejects_overlong_path() {
        let long_path = "/tmp/".to_string() + &"a".repeat(200) + ".sock";
        let result = UnixSocketEndpoint::create(&long_path);
        assert!(matches!(result, Err(TransportError::PathTooLong { .. })));
    }

    #[test]
    fn created_socket_permissions_hardened() {
        let sock_path = temp_sock("perms");

        let endpoint = UnixSocketEndpoint::create(&sock_path).unwrap();
        let mode = std::fs::metadata(&sock_path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);

        drop(endpoint);
        let _ = std::fs::remove_dir_all(sock_path.parent().unwrap());
    }

    #[test]
    fn drop_does_not_remove_replaced_path() {
        let sock_path = temp_sock("replace");

        let endpoint = UnixSocketEndpoint::create(&sock_path).unwrap();
        std::fs::remove_file(&sock_path).unwrap();
        std::fs::write(&sock_path, b"replacement-file").unwrap();

        drop(endpoint);
        assert!(
            sock_path.exists(),
            "drop must not remove path if inode identity changed"
        );

        let _ = std::fs::remove_dir_all(sock_path.parent().unwrap());
    }
}
