//! SIGINT/SIGTERM handling through a self-pipe.
//!
//! The handler writes one byte into a non-blocking pipe whose read end is
//! part of the poll set, so a signal wakes the event loop and shutdown
//! proceeds through ordinary `Drop`s.

use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd};
use std::sync::atomic::{AtomicI32, Ordering};

use tracing::debug;

/// Write end of the active self-pipe, or -1.
static WAKE_FD: AtomicI32 = AtomicI32::new(-1);

extern "C" fn on_signal(_signal: libc::c_int) {
    let fd = WAKE_FD.load(Ordering::Relaxed);
    if fd >= 0 {
        wake(fd);
    }
}

/// Async-signal-safe: a single write(2).
fn wake(fd: libc::c_int) {
    let byte = 1u8;
    // SAFETY: fd is the open write end of a self-pipe; it stays open while
    // WAKE_FD or a live `Shutdown` holds it.
    unsafe {
        libc::write(fd, (&byte as *const u8).cast(), 1);
    }
}

/// Self-pipe signalled on SIGINT/SIGTERM.
pub struct Shutdown {
    read: OwnedFd,
    write: OwnedFd,
}

impl Shutdown {
    pub fn new() -> io::Result<Self> {
        let mut fds = [0 as libc::c_int; 2];
        // SAFETY: fds points at two writable c_ints.
        let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_NONBLOCK | libc::O_CLOEXEC) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: pipe2 succeeded, so both fds are open and owned by us.
        let (read, write) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };
        Ok(Self { read, write })
    }

    /// Route SIGINT and SIGTERM to this pipe.
    pub fn install(&self) -> io::Result<()> {
        WAKE_FD.store(self.write.as_raw_fd(), Ordering::Relaxed);

        for signal in [libc::SIGINT, libc::SIGTERM] {
            // SAFETY: a zeroed sigaction is valid; the handler only calls
            // async-signal-safe functions.
            let rc = unsafe {
                let mut action: libc::sigaction = std::mem::zeroed();
                action.sa_sigaction = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
                action.sa_flags = libc::SA_RESTART;
                libc::sigemptyset(&mut action.sa_mask);
                libc::sigaction(signal, &action, std::ptr::null_mut())
            };
            if rc != 0 {
                return Err(io::Error::last_os_error());
            }
        }

        debug!("Signal handlers installed");
        Ok(())
    }

    /// Request shutdown as if a signal had arrived.
    #[cfg(test)]
    pub fn trigger(&self) {
        wake(self.write.as_raw_fd());
    }
}

impl AsFd for Shutdown {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.read.as_fd()
    }
}

impl Drop for Shutdown {
    fn drop(&mut self) {
        let _ = WAKE_FD.compare_exchange(
            self.write.as_raw_fd(),
            -1,
            Ordering::Relaxed,
            Ordering::Relaxed,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn readable(fd: BorrowedFd<'_>) -> bool {
        let mut pfd = libc::pollfd {
            fd: fd.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        // SAFETY: pfd is a single valid pollfd.
        let n = unsafe { libc::poll(&mut pfd, 1, 0) };
        n == 1 && pfd.revents & libc::POLLIN != 0
    }

    #[test]
    fn test_trigger_makes_pipe_readable() {
        let shutdown = Shutdown::new().expect("pipe");
        assert!(!readable(shutdown.as_fd()));
        shutdown.trigger();
        assert!(readable(shutdown.as_fd()));
    }
}
