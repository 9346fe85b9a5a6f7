//! Compositor peer abstraction.
//!
//! The event loop only needs a pollable fd, a way to drain incoming events
//! into the window store, and a way to send window requests back. The real
//! implementation speaks `wlr-foreign-toplevel-management` over Wayland;
//! tests plug in a fake built on a socket pair.

mod wayland;

use std::os::fd::BorrowedFd;

use toplevelctl_core::{Action, WindowId, WindowStore};

pub use wayland::WaylandPeer;

/// Outcome of [`CompositorPeer::perform`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Performed {
    /// The request was queued for the compositor.
    Sent,
    /// `id` names no live window.
    UnknownWindow,
    /// The window exists but the request cannot be expressed in this session.
    Skipped,
}

/// Connection to the compositor as seen by the multiplexer.
pub trait CompositorPeer {
    /// Per-window protocol object stored in the window records.
    type Handle;

    /// Descriptor to wait on for incoming events.
    fn as_fd(&self) -> BorrowedFd<'_>;

    /// Dispatch already-queued events and flush outgoing requests.
    ///
    /// Called before every wait so nothing sits in a buffer while we sleep.
    fn prepare_wait(&mut self) -> anyhow::Result<()>;

    /// Read the socket and dispatch every queued event, then drop closed
    /// windows.
    ///
    /// Returns whether any window was created, committed or closed. An error
    /// means the session is over.
    fn drain(&mut self) -> anyhow::Result<bool>;

    /// Send the request matching `action` for a live window.
    fn perform(&mut self, action: Action, id: WindowId) -> Performed;

    /// Committed view of all tracked windows.
    fn windows(&self) -> &WindowStore<Self::Handle>;
}
