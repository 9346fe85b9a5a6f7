//! Wayland peer speaking `wlr-foreign-toplevel-management-unstable-v1`.
//!
//! Every handle event is forwarded to the [`Reconciler`]: property events
//! stage, `done` commits, `closed` retires the window and destroys the handle.
//! Handles carry their [`WindowId`] as user data, assigned when the manager
//! announces them.

use std::cell::Cell;
use std::os::fd::{AsFd, BorrowedFd};
use std::rc::Rc;
use std::sync::OnceLock;

use anyhow::{Context, Result, bail};
use toplevelctl_core::{Action, CallbackId, Reconciler, WindowId, WindowState, WindowStore};
use tracing::{debug, trace, warn};
use wayland_client::backend::WaylandError;
use wayland_client::protocol::wl_output::{self, WlOutput};
use wayland_client::protocol::wl_registry::{self, WlRegistry};
use wayland_client::protocol::wl_seat::{self, WlSeat};
use wayland_client::{Connection, Dispatch, EventQueue, Proxy, QueueHandle, event_created_child};
use wayland_protocols_wlr::foreign_toplevel::v1::client::zwlr_foreign_toplevel_handle_v1::{
    self, ZwlrForeignToplevelHandleV1,
};
use wayland_protocols_wlr::foreign_toplevel::v1::client::zwlr_foreign_toplevel_manager_v1::{
    self, ZwlrForeignToplevelManagerV1,
};

use super::{CompositorPeer, Performed};

/// Highest manager version we understand.
const MANAGER_VERSION: u32 = 3;

/// First handle version with `set_fullscreen`.
const FULLSCREEN_SINCE: u32 = 2;

/// User data attached to each toplevel handle.
#[derive(Debug, Default)]
struct ToplevelData(OnceLock<WindowId>);

/// Session state passed by `&mut` into every dispatch.
struct WaylandState {
    reconciler: Reconciler<ZwlrForeignToplevelHandleV1>,
    manager: Option<ZwlrForeignToplevelManagerV1>,
    seat: Option<WlSeat>,
    /// Registry name of the output requested for fullscreen.
    preferred_output: Option<u32>,
    output: Option<WlOutput>,
    /// Set when the compositor sends `finished` on the manager.
    finished: bool,
}

impl WaylandState {
    fn new(preferred_output: Option<u32>) -> Self {
        Self {
            reconciler: Reconciler::new(),
            manager: None,
            seat: None,
            preferred_output,
            output: None,
            finished: false,
        }
    }
}

/// Decode the `state` array: native-endian u32 values, one per active flag.
fn decode_state(raw: &[u8]) -> WindowState {
    let mut flags = WindowState::default();
    for chunk in raw.chunks_exact(4) {
        let value = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        match zwlr_foreign_toplevel_handle_v1::State::try_from(value) {
            Ok(zwlr_foreign_toplevel_handle_v1::State::Maximized) => flags.maximized = true,
            Ok(zwlr_foreign_toplevel_handle_v1::State::Minimized) => flags.minimized = true,
            Ok(zwlr_foreign_toplevel_handle_v1::State::Activated) => flags.activated = true,
            Ok(zwlr_foreign_toplevel_handle_v1::State::Fullscreen) => flags.fullscreen = true,
            _ => trace!("Ignoring unknown toplevel state {}", value),
        }
    }
    flags
}

/// Handle event reduced to what the reconciler consumes.
#[derive(Debug)]
enum HandleEvent<H> {
    Title(String),
    AppId(String),
    State(WindowState),
    Done,
    Closed,
    Parent(Option<H>),
}

/// Feed one handle event to the reconciler.
///
/// Returns `true` when the handle must be destroyed.
fn apply_event<H: PartialEq>(
    reconciler: &mut Reconciler<H>,
    id: WindowId,
    event: HandleEvent<H>,
) -> bool {
    match event {
        HandleEvent::Title(title) => reconciler.stage_title(id, title),
        HandleEvent::AppId(app_id) => reconciler.stage_app_id(id, app_id),
        HandleEvent::State(state) => reconciler.stage_state(id, state),
        HandleEvent::Done => {
            reconciler.commit(id);
        }
        HandleEvent::Closed => {
            debug!("Window {} closed", id);
            reconciler.close(id);
            return true;
        }
        HandleEvent::Parent(parent) => {
            let parent = reconciler.resolve_parent(parent.as_ref());
            reconciler.stage_parent(id, parent);
        }
    }
    false
}

/// Why `action` cannot be sent to a handle of `version`, if it cannot.
fn blocked_reason(action: Action, has_seat: bool, version: u32) -> Option<&'static str> {
    match action {
        Action::Focus if !has_seat => Some("no seat is available"),
        Action::Fullscreen | Action::Unfullscreen if version < FULLSCREEN_SINCE => {
            Some("the compositor does not support fullscreen requests")
        }
        _ => None,
    }
}

impl Dispatch<WlRegistry, ()> for WaylandState {
    fn event(
        state: &mut Self,
        registry: &WlRegistry,
        event: wl_registry::Event,
        _data: &(),
        _conn: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        let wl_registry::Event::Global {
            name,
            interface,
            version,
        } = event
        else {
            return;
        };
        trace!("Global: {} v{} (name={})", interface, version, name);

        match interface.as_str() {
            "zwlr_foreign_toplevel_manager_v1" if state.manager.is_none() => {
                debug!("Found foreign toplevel manager v{}", version);
                let manager: ZwlrForeignToplevelManagerV1 =
                    registry.bind(name, version.min(MANAGER_VERSION), qh, ());
                state.manager = Some(manager);
            }
            "wl_seat" if state.seat.is_none() => {
                let seat: WlSeat = registry.bind(name, version.min(1), qh, ());
                state.seat = Some(seat);
            }
            "wl_output" if state.preferred_output == Some(name) => {
                debug!("Binding preferred output {}", name);
                let output: WlOutput = registry.bind(name, version.min(1), qh, ());
                state.output = Some(output);
            }
            _ => {}
        }
    }
}

impl Dispatch<ZwlrForeignToplevelManagerV1, ()> for WaylandState {
    fn event(
        state: &mut Self,
        _manager: &ZwlrForeignToplevelManagerV1,
        event: zwlr_foreign_toplevel_manager_v1::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            zwlr_foreign_toplevel_manager_v1::Event::Toplevel { toplevel } => {
                let id = state.reconciler.create(toplevel.clone());
                if let Some(data) = toplevel.data::<ToplevelData>() {
                    let _ = data.0.set(id);
                }
            }
            zwlr_foreign_toplevel_manager_v1::Event::Finished => {
                warn!("Compositor finished the foreign toplevel manager");
                state.finished = true;
            }
            _ => {}
        }
    }

    event_created_child!(WaylandState, ZwlrForeignToplevelManagerV1, [
        zwlr_foreign_toplevel_manager_v1::EVT_TOPLEVEL_OPCODE => (ZwlrForeignToplevelHandleV1, ToplevelData::default()),
    ]);
}

impl Dispatch<ZwlrForeignToplevelHandleV1, ToplevelData> for WaylandState {
    fn event(
        state: &mut Self,
        handle: &ZwlrForeignToplevelHandleV1,
        event: zwlr_foreign_toplevel_handle_v1::Event,
        data: &ToplevelData,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        let Some(&id) = data.0.get() else {
            trace!("Event for unannounced toplevel {:?}", handle.id());
            return;
        };

        let event = match event {
            zwlr_foreign_toplevel_handle_v1::Event::Title { title } => HandleEvent::Title(title),
            zwlr_foreign_toplevel_handle_v1::Event::AppId { app_id } => HandleEvent::AppId(app_id),
            zwlr_foreign_toplevel_handle_v1::Event::State { state: raw } => {
                HandleEvent::State(decode_state(&raw))
            }
            zwlr_foreign_toplevel_handle_v1::Event::Done => HandleEvent::Done,
            zwlr_foreign_toplevel_handle_v1::Event::Closed => HandleEvent::Closed,
            zwlr_foreign_toplevel_handle_v1::Event::Parent { parent } => {
                HandleEvent::Parent(parent)
            }
            zwlr_foreign_toplevel_handle_v1::Event::OutputEnter { output } => {
                trace!("Window {} entered output {:?}", id, output.id());
                return;
            }
            zwlr_foreign_toplevel_handle_v1::Event::OutputLeave { output } => {
                trace!("Window {} left output {:?}", id, output.id());
                return;
            }
            _ => return,
        };

        if apply_event(&mut state.reconciler, id, event) {
            handle.destroy();
        }
    }
}

impl Dispatch<WlSeat, ()> for WaylandState {
    fn event(
        _state: &mut Self,
        _seat: &WlSeat,
        _event: wl_seat::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<WlOutput, ()> for WaylandState {
    fn event(
        _state: &mut Self,
        _output: &WlOutput,
        _event: wl_output::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
    }
}

/// Live connection to a wlroots-style compositor.
pub struct WaylandPeer {
    _conn: Connection,
    queue: EventQueue<WaylandState>,
    state: WaylandState,
    /// Set by the reconciler whenever a window is created, committed or closed.
    changed: Rc<Cell<bool>>,
    listener: CallbackId,
}

impl WaylandPeer {
    /// Connect and synchronize with the compositor.
    ///
    /// Three roundtrips: globals, then the toplevel announcements, then
    /// their initial properties. `preferred_output` is the registry name of
    /// the output used for fullscreen requests.
    pub fn connect(preferred_output: Option<u32>) -> Result<Self> {
        let conn = Connection::connect_to_env().context("Failed to connect to Wayland display")?;
        let mut queue = conn.new_event_queue();
        let qh = queue.handle();
        conn.display().get_registry(&qh, ());

        let mut state = WaylandState::new(preferred_output);
        let changed = Rc::new(Cell::new(false));
        let flag = changed.clone();
        let listener = state.reconciler.connect(move |_| flag.set(true));

        queue
            .roundtrip(&mut state)
            .context("Failed to roundtrip registry")?;
        if state.manager.is_none() {
            bail!("Compositor does not support zwlr_foreign_toplevel_manager_v1");
        }
        if let Some(name) = preferred_output
            && state.output.is_none()
        {
            warn!(
                "Output {} not found, fullscreen will use the compositor's choice",
                name
            );
        }

        queue
            .roundtrip(&mut state)
            .context("Failed to enumerate toplevels")?;
        queue
            .roundtrip(&mut state)
            .context("Failed to read toplevel properties")?;
        if state.finished {
            bail!("Compositor finished the foreign toplevel manager during startup");
        }

        state.reconciler.sweep();
        changed.set(false);
        debug!(
            "Synchronized with compositor: {} windows",
            state.reconciler.store().len()
        );

        Ok(Self {
            _conn: conn,
            queue,
            state,
            changed,
            listener,
        })
    }
}

impl CompositorPeer for WaylandPeer {
    type Handle = ZwlrForeignToplevelHandleV1;

    fn as_fd(&self) -> BorrowedFd<'_> {
        self.queue.as_fd()
    }

    fn prepare_wait(&mut self) -> Result<()> {
        self.queue
            .dispatch_pending(&mut self.state)
            .context("Failed to dispatch Wayland events")?;
        match self.queue.flush() {
            Ok(()) => Ok(()),
            Err(WaylandError::Io(e)) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(()),
            Err(e) => Err(e).context("Failed to flush Wayland requests"),
        }
    }

    fn drain(&mut self) -> Result<bool> {
        self.queue
            .dispatch_pending(&mut self.state)
            .context("Failed to dispatch Wayland events")?;

        if let Some(guard) = self.queue.prepare_read() {
            match guard.read() {
                Ok(_) => {}
                Err(WaylandError::Io(e)) if e.kind() == std::io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(e).context("Failed to read Wayland events"),
            }
        }

        self.queue
            .dispatch_pending(&mut self.state)
            .context("Failed to dispatch Wayland events")?;

        if self.state.finished {
            bail!("Compositor finished the foreign toplevel manager");
        }

        let removed = self.state.reconciler.sweep();
        if removed > 0 {
            trace!("Swept {} closed windows", removed);
        }
        Ok(self.changed.replace(false))
    }

    fn perform(&mut self, action: Action, id: WindowId) -> Performed {
        let Some(record) = self.state.reconciler.store().find_live(id) else {
            return Performed::UnknownWindow;
        };
        let handle = &record.handle;
        let seat = self.state.seat.as_ref();

        if let Some(reason) = blocked_reason(action, seat.is_some(), handle.version()) {
            warn!("Cannot send {:?} for window {}: {}", action, id, reason);
            return Performed::Skipped;
        }

        match action {
            Action::Focus => {
                if let Some(seat) = seat {
                    handle.activate(seat);
                }
            }
            Action::Maximize => handle.set_maximized(),
            Action::Unmaximize => handle.unset_maximized(),
            Action::Minimize => handle.set_minimized(),
            Action::Restore => handle.unset_minimized(),
            Action::Fullscreen => {
                if self.state.preferred_output.is_some() && self.state.output.is_none() {
                    warn!("Preferred output is not available for window {}", id);
                }
                handle.set_fullscreen(self.state.output.as_ref());
            }
            Action::Unfullscreen => handle.unset_fullscreen(),
            Action::Close => handle.close(),
        }

        debug!("Sent {:?} for window {}", action, id);
        Performed::Sent
    }

    fn windows(&self) -> &WindowStore<Self::Handle> {
        self.state.reconciler.store()
    }
}

impl Drop for WaylandPeer {
    fn drop(&mut self) {
        self.state.reconciler.disconnect(self.listener);
        for record in self.state.reconciler.store().iter(false) {
            if !record.is_closed() {
                record.handle.destroy();
            }
        }
        if let Some(manager) = self.state.manager.take() {
            manager.stop();
        }
        let _ = self.queue.flush();
        debug!("Wayland peer closed");
    }
}
