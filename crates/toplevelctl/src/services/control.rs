//! Control socket for client → server commands.
//!
//! Uses a Unix stream socket, by default `$XDG_RUNTIME_DIR/toplevelctl.sock`.
//! A client connects, writes one short message (see
//! [`toplevelctl_core::command`]) and disconnects. The server never replies.
//!
//! The listener is non-blocking and polled by the
//! [`Multiplexer`](super::multiplexer::Multiplexer); accepting and reading
//! happen there.

use std::io::{self, Write};
use std::net::Shutdown;
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use toplevelctl_core::Config;
use tracing::{debug, warn};

/// Resolve the control socket path.
///
/// `socket_path` from the config wins; otherwise
/// `$XDG_RUNTIME_DIR/toplevelctl.sock`, falling back to `/tmp/toplevelctl.sock`.
pub fn socket_path(config: &Config) -> PathBuf {
    if let Some(path) = &config.socket_path {
        return path.clone();
    }
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        PathBuf::from(runtime_dir).join("toplevelctl.sock")
    } else {
        warn!("XDG_RUNTIME_DIR not set, falling back to /tmp/toplevelctl.sock");
        PathBuf::from("/tmp/toplevelctl.sock")
    }
}

/// Bound listening socket. Removes its file when dropped.
pub struct ControlSocket {
    listener: UnixListener,
    path: PathBuf,
}

impl ControlSocket {
    pub fn bind(path: &Path) -> io::Result<Self> {
        // Remove stale socket if it exists.
        if path.exists() {
            std::fs::remove_file(path)?;
        }

        let listener = UnixListener::bind(path)?;
        let socket = Self {
            listener,
            path: path.to_path_buf(),
        };
        socket.listener.set_nonblocking(true)?;

        debug!("Control: listening on {:?}", path);
        Ok(socket)
    }

    /// Accept one pending connection, if any.
    ///
    /// Accepted streams are switched to non-blocking so a client that
    /// connects without writing never stalls the loop.
    pub fn accept(&self) -> io::Result<Option<UnixStream>> {
        match self.listener.accept() {
            Ok((stream, _)) => {
                stream.set_nonblocking(true)?;
                Ok(Some(stream))
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AsFd for ControlSocket {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.listener.as_fd()
    }
}

impl Drop for ControlSocket {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
        debug!("Control: listener stopped");
    }
}

/// Send one message to a running server (fire-and-forget).
pub fn send_message(path: &Path, message: &str) -> io::Result<()> {
    let mut stream = UnixStream::connect(path)?;
    stream.write_all(message.as_bytes())?;
    stream.shutdown(Shutdown::Write)?;
    Ok(())
}
