//! Single-threaded readiness loop.
//!
//! One `poll(2)` covers the shutdown pipe, the compositor connection, the
//! control listener and every occupied client slot. Each wake handles, in
//! order: shutdown, a compositor drain (plus snapshot), at most one accept,
//! then every client that was readable when the wait returned.
//!
//! Clients get a fixed number of slots. A connection arriving while all slots
//! are taken is closed right away without being read. Each client is served
//! by one bounded read, after which its connection is closed.

use std::io::{self, Read, Write};
use std::ops::ControlFlow;
use std::os::fd::{AsFd, AsRawFd};
use std::os::unix::net::UnixStream;

use anyhow::{Context, Result, bail};
use toplevelctl_core::{Config, Request};
use tracing::{debug, info, warn};

use super::compositor::{CompositorPeer, Performed};
use super::control::ControlSocket;
use super::output::Output;
use super::signal::Shutdown;

const ERROR_EVENTS: libc::c_short = libc::POLLERR | libc::POLLHUP | libc::POLLNVAL;

/// What a `pollfd` entry stands for.
#[derive(Debug, Clone, Copy)]
enum Source {
    Shutdown,
    Compositor,
    Listener,
    Client(usize),
}

/// The server event loop.
pub struct Multiplexer<P: CompositorPeer, W: Write> {
    peer: P,
    control: Option<ControlSocket>,
    slots: Vec<Option<UnixStream>>,
    read_buffer_size: usize,
    output: Output<W>,
}

impl<P: CompositorPeer, W: Write> Multiplexer<P, W> {
    pub fn new(peer: P, control: ControlSocket, config: &Config, output: Output<W>) -> Self {
        Self {
            peer,
            control: Some(control),
            slots: (0..config.max_clients).map(|_| None).collect(),
            read_buffer_size: config.read_buffer_size,
            output,
        }
    }

    /// Serve until shutdown is requested or the compositor goes away.
    pub fn run(&mut self, shutdown: &Shutdown) -> Result<()> {
        info!("Serving {} control slot(s)", self.slots.len());
        while self.wake(shutdown)?.is_continue() {}
        info!("Shutting down");
        Ok(())
    }

    /// Wait once and handle everything that became ready.
    fn wake(&mut self, shutdown: &Shutdown) -> Result<ControlFlow<()>> {
        self.peer.prepare_wait()?;

        let mut sources = Vec::with_capacity(3 + self.slots.len());
        let mut fds = Vec::with_capacity(3 + self.slots.len());
        let mut watch = |source: Source, fd: i32| {
            sources.push(source);
            fds.push(libc::pollfd {
                fd,
                events: libc::POLLIN,
                revents: 0,
            });
        };

        watch(Source::Shutdown, shutdown.as_fd().as_raw_fd());
        watch(Source::Compositor, self.peer.as_fd().as_raw_fd());
        if let Some(control) = &self.control {
            watch(Source::Listener, control.as_fd().as_raw_fd());
        }
        for (index, slot) in self.slots.iter().enumerate() {
            if let Some(stream) = slot {
                watch(Source::Client(index), stream.as_raw_fd());
            }
        }

        // SAFETY: fds is a valid array of pollfd for its whole length, and
        // every descriptor in it is owned by self or shutdown for the call.
        let n = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, -1) };
        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(ControlFlow::Continue(()));
            }
            return Err(err).context("Failed to wait for events");
        }

        let ready: Vec<(Source, libc::c_short)> = sources
            .into_iter()
            .zip(fds)
            .filter(|(_, pfd)| pfd.revents != 0)
            .map(|(source, pfd)| (source, pfd.revents))
            .collect();

        for (source, revents) in ready {
            match source {
                Source::Shutdown => {
                    info!("Shutdown requested");
                    return Ok(ControlFlow::Break(()));
                }
                Source::Compositor => self.handle_compositor(revents)?,
                Source::Listener => self.handle_listener(revents),
                Source::Client(index) => self.handle_client(index, revents),
            }
        }

        Ok(ControlFlow::Continue(()))
    }

    fn handle_compositor(&mut self, revents: libc::c_short) -> Result<()> {
        if revents & libc::POLLIN != 0 {
            let changed = self.peer.drain()?;
            self.output.after_drain(self.peer.windows(), changed)?;
        }
        if revents & ERROR_EVENTS != 0 {
            bail!("Compositor connection closed");
        }
        Ok(())
    }

    fn handle_listener(&mut self, revents: libc::c_short) {
        if revents & ERROR_EVENTS != 0 {
            warn!("Control socket failed, no longer accepting commands");
            self.control = None;
            return;
        }

        let Some(control) = &self.control else {
            return;
        };
        let stream = match control.accept() {
            Ok(Some(stream)) => stream,
            Ok(None) => return,
            Err(e) => {
                warn!("Failed to accept control connection: {}", e);
                return;
            }
        };

        match self.slots.iter_mut().position(|slot| slot.is_none()) {
            Some(index) => {
                debug!("Control client connected in slot {}", index);
                self.slots[index] = Some(stream);
            }
            None => {
                warn!(
                    "Rejecting control connection: all {} slot(s) busy",
                    self.slots.len()
                );
                drop(stream);
            }
        }
    }

    fn handle_client(&mut self, index: usize, revents: libc::c_short) {
        let Some(stream) = self.slots[index].as_mut() else {
            return;
        };

        if revents & libc::POLLIN == 0 {
            if revents & ERROR_EVENTS != 0 {
                debug!("Control client in slot {} hung up", index);
                self.slots[index] = None;
            }
            return;
        }

        let mut buf = vec![0u8; self.read_buffer_size];
        match stream.read(&mut buf) {
            Ok(0) => {
                debug!("Control client in slot {} disconnected", index);
                self.slots[index] = None;
            }
            Ok(n) => {
                // One message per connection.
                self.slots[index] = None;
                let message = String::from_utf8_lossy(&buf[..n]);
                self.dispatch(&message);
            }
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock
                    || e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                warn!("Failed to read from control client: {}", e);
                self.slots[index] = None;
            }
        }
    }

    fn dispatch(&mut self, message: &str) {
        match Request::parse(message) {
            Ok(Request::ToggleSort) => {
                self.output.toggle_sort();
                debug!("Sorted output: {}", self.output.sorted);
            }
            Ok(request @ Request::Window { action, id }) => match self.peer.perform(action, id) {
                Performed::Sent => debug!("Handled '{}'", request),
                Performed::UnknownWindow => {
                    debug!("No live window {}, ignoring '{}'", id, request);
                }
                Performed::Skipped => debug!("Could not handle '{}'", request),
            },
            Err(e) => warn!("Invalid control message {:?}: {}", message, e),
        }
    }
}
