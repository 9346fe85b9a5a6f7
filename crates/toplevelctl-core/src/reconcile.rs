//! Reconciler - applies staged toplevel updates atomically on `done`.
//!
//! The foreign-toplevel protocol delivers a window's properties as a batch of
//! independent events terminated by `done`. Until `done` arrives, updates are
//! kept in the record's [`Staging`](crate::store::Staging) buffer; `commit`
//! then copies only the fields that were actually sent. A field that was not
//! part of the batch keeps its committed value.

use tracing::{trace, warn};

use crate::callbacks::{CallbackId, Callbacks};
use crate::store::{Parent, Phase, WindowId, WindowRecord, WindowState, WindowStore};

/// Notification published after an effective mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent {
    Created(WindowId),
    Committed(WindowId),
    Closed(WindowId),
}

/// Owns the window store and enforces the staging/commit rules.
pub struct Reconciler<H> {
    store: WindowStore<H>,
    callbacks: Callbacks<ChangeEvent>,
}

impl<H> Reconciler<H> {
    pub fn new() -> Self {
        Self {
            store: WindowStore::new(),
            callbacks: Callbacks::new(),
        }
    }

    pub fn store(&self) -> &WindowStore<H> {
        &self.store
    }

    /// Register a listener for [`ChangeEvent`]s.
    pub fn connect<F>(&self, callback: F) -> CallbackId
    where
        F: Fn(&ChangeEvent) + 'static,
    {
        self.callbacks.register(callback)
    }

    pub fn disconnect(&self, id: CallbackId) -> bool {
        self.callbacks.unregister(id)
    }

    /// Start tracking a window announced by the compositor.
    pub fn create(&mut self, handle: H) -> WindowId {
        let id = self.store.insert(handle);
        trace!("Tracking window {}", id);
        self.callbacks.notify(&ChangeEvent::Created(id));
        id
    }

    pub fn stage_title(&mut self, id: WindowId, title: String) {
        if let Some(record) = self.stageable(id) {
            record.pending.title = Some(title);
        }
    }

    pub fn stage_app_id(&mut self, id: WindowId, app_id: String) {
        if let Some(record) = self.stageable(id) {
            record.pending.app_id = Some(app_id);
        }
    }

    pub fn stage_parent(&mut self, id: WindowId, parent: Parent) {
        if let Some(record) = self.stageable(id) {
            record.pending.parent = Some(parent);
        }
    }

    /// Stage a full replacement of the state flags.
    ///
    /// An all-false `state` is meaningful: it clears every flag on commit.
    pub fn stage_state(&mut self, id: WindowId, state: WindowState) {
        if let Some(record) = self.stageable(id) {
            record.pending.state = Some(state);
        }
    }

    /// Apply everything staged for `id`.
    ///
    /// Returns `false` without touching the record or notifying when nothing
    /// was staged, or when the window is unknown or closed.
    pub fn commit(&mut self, id: WindowId) -> bool {
        let Some(record) = self.stageable(id) else {
            return false;
        };
        if record.pending.is_empty() {
            trace!("Empty commit for window {}", id);
            return false;
        }

        let pending = std::mem::take(&mut record.pending);
        if let Some(title) = pending.title {
            record.title = Some(title);
        }
        if let Some(app_id) = pending.app_id {
            record.app_id = Some(app_id);
        }
        if let Some(parent) = pending.parent {
            record.parent = parent;
        }
        if let Some(state) = pending.state {
            record.state = state;
        }

        self.callbacks.notify(&ChangeEvent::Committed(id));
        true
    }

    /// Mark a window closed. Its record stays visible to `find` until the
    /// next [`sweep`](Self::sweep) but accepts no further updates.
    pub fn close(&mut self, id: WindowId) -> bool {
        let Some(record) = self.stageable(id) else {
            return false;
        };
        record.phase = Phase::Closed;
        record.pending = Default::default();
        self.callbacks.notify(&ChangeEvent::Closed(id));
        true
    }

    /// Remove all closed records from the store.
    pub fn sweep(&mut self) -> usize {
        self.store.remove_where(WindowRecord::is_closed)
    }

    fn stageable(&mut self, id: WindowId) -> Option<&mut WindowRecord<H>> {
        match self.store.find_mut(id) {
            Some(record) if !record.is_closed() => Some(record),
            Some(_) => {
                trace!("Ignoring update for closed window {}", id);
                None
            }
            None => {
                trace!("Ignoring update for unknown window {}", id);
                None
            }
        }
    }
}

impl<H: PartialEq> Reconciler<H> {
    /// Resolve the parent handle reported by the compositor.
    ///
    /// A handle that does not belong to any live window yields
    /// [`Parent::Unresolved`]; this happens when the parent has not been
    /// announced yet or is already gone.
    pub fn resolve_parent(&self, handle: Option<&H>) -> Parent {
        match handle {
            None => Parent::None,
            Some(handle) => match self.store.find_by_handle(handle) {
                Some(id) => Parent::Window(id),
                None => {
                    warn!("Cannot find parent toplevel");
                    Parent::Unresolved
                }
            },
        }
    }
}

impl<H> Default for Reconciler<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recording(reconciler: &Reconciler<u32>) -> Rc<RefCell<Vec<ChangeEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        reconciler.connect(move |event| sink.borrow_mut().push(*event));
        events
    }

    fn flags(maximized: bool, minimized: bool, activated: bool, fullscreen: bool) -> WindowState {
        WindowState {
            maximized,
            minimized,
            activated,
            fullscreen,
        }
    }

    #[test]
    fn test_staged_fields_are_invisible_until_commit() {
        let mut r = Reconciler::new();
        let id = r.create(1);
        r.stage_title(id, "Alpha".into());
        assert_eq!(r.store().find(id).and_then(|w| w.title.clone()), None);

        assert!(r.commit(id));
        let record = r.store().find(id).expect("window tracked");
        assert_eq!(record.title.as_deref(), Some("Alpha"));
        assert!(record.pending().is_empty());
    }

    #[test]
    fn test_empty_commit_is_a_no_op() {
        let mut r = Reconciler::new();
        let id = r.create(1);
        r.stage_title(id, "Alpha".into());
        r.stage_state(id, flags(true, false, true, false));
        r.commit(id);
        let before = r.store().find(id).cloned().expect("window tracked");
        let events = recording(&r);

        assert!(!r.commit(id));

        let after = r.store().find(id).expect("window tracked");
        assert_eq!(after.title, before.title);
        assert_eq!(after.app_id, before.app_id);
        assert_eq!(after.parent, before.parent);
        assert_eq!(after.state, before.state);
        assert!(events.borrow().is_empty());
    }

    #[test]
    fn test_zero_flags_clear_state() {
        let mut r = Reconciler::new();
        let id = r.create(1);
        r.stage_state(id, flags(true, true, true, true));
        r.commit(id);

        r.stage_state(id, WindowState::default());
        r.commit(id);
        assert_eq!(
            r.store().find(id).map(|w| w.state),
            Some(WindowState::default())
        );
    }

    #[test]
    fn test_absent_state_keeps_flags() {
        let mut r = Reconciler::new();
        let id = r.create(1);
        let maximized = flags(true, false, false, false);
        r.stage_state(id, maximized);
        r.commit(id);

        r.stage_title(id, "renamed".into());
        r.commit(id);
        assert_eq!(r.store().find(id).map(|w| w.state), Some(maximized));
    }

    #[test]
    fn test_partial_update_keeps_other_fields() {
        let mut r = Reconciler::new();
        let id = r.create(1);
        r.stage_title(id, "Editor".into());
        r.stage_app_id(id, "org.Editor".into());
        r.commit(id);

        r.stage_title(id, "Editor - file.txt".into());
        r.commit(id);

        let record = r.store().find(id).expect("window tracked");
        assert_eq!(record.title.as_deref(), Some("Editor - file.txt"));
        assert_eq!(record.app_id.as_deref(), Some("org.Editor"));
    }

    #[test]
    fn test_closed_window_rejects_updates() {
        let mut r = Reconciler::new();
        let id = r.create(1);
        r.stage_title(id, "before".into());
        assert!(r.close(id));

        r.stage_title(id, "after".into());
        assert!(!r.commit(id));
        assert!(!r.close(id));

        let record = r.store().find(id).expect("closed window kept until sweep");
        assert_eq!(record.title, None);
        assert!(record.is_closed());

        assert_eq!(r.sweep(), 1);
        assert!(r.store().find(id).is_none());
    }

    #[test]
    fn test_unknown_window_is_ignored() {
        let mut r: Reconciler<u32> = Reconciler::new();
        r.stage_title(WindowId(42), "ghost".into());
        assert!(!r.commit(WindowId(42)));
        assert!(r.store().is_empty());
    }

    #[test]
    fn test_parent_resolution() {
        let mut r = Reconciler::new();
        let parent = r.create(100);
        let child = r.create(200);

        let resolved = r.resolve_parent(Some(&100));
        assert_eq!(resolved, Parent::Window(parent));
        assert_eq!(r.resolve_parent(Some(&999)), Parent::Unresolved);
        assert_eq!(r.resolve_parent(None), Parent::None);

        r.stage_parent(child, resolved);
        r.commit(child);
        assert_eq!(
            r.store().find(child).map(|w| w.parent),
            Some(Parent::Window(parent))
        );

        // A later batch without a parent event keeps the link.
        r.stage_title(child, "dialog".into());
        r.commit(child);
        assert_eq!(
            r.store().find(child).map(|w| w.parent),
            Some(Parent::Window(parent))
        );
    }

    #[test]
    fn test_notifications() {
        let mut r = Reconciler::new();
        let events = recording(&r);
        let id = r.create(1);
        r.stage_app_id(id, "foot".into());
        r.commit(id);
        r.close(id);

        assert_eq!(
            *events.borrow(),
            vec![
                ChangeEvent::Created(id),
                ChangeEvent::Committed(id),
                ChangeEvent::Closed(id),
            ]
        );
    }

    #[test]
    fn test_disconnected_listener_is_not_notified() {
        let mut r = Reconciler::new();
        let hits = Rc::new(RefCell::new(0));
        let counter = hits.clone();
        let listener = r.connect(move |_| *counter.borrow_mut() += 1);

        r.create(1);
        assert!(r.disconnect(listener));
        r.create(2);

        assert_eq!(*hits.borrow(), 1);
        assert!(!r.disconnect(listener));
    }
}
