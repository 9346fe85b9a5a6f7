//! Listener registry used to publish window changes.
//!
//! The reconciler owns one `Callbacks<ChangeEvent>` and calls `notify` after
//! every effective mutation. Listeners live on the same thread as the event
//! loop, so plain `Rc` closures are enough.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Handle returned by [`Callbacks::register`], used to unregister later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

static NEXT_CALLBACK_ID: AtomicU64 = AtomicU64::new(1);

impl CallbackId {
    fn next() -> Self {
        Self(NEXT_CALLBACK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

type Listener<T> = Rc<dyn Fn(&T)>;

/// Ordered set of listeners receiving `&T` notifications.
pub struct Callbacks<T> {
    listeners: RefCell<Vec<(CallbackId, Listener<T>)>>,
}

impl<T> Callbacks<T> {
    pub fn new() -> Self {
        Self {
            listeners: RefCell::new(Vec::new()),
        }
    }

    /// Add a listener. Listeners are invoked in registration order.
    pub fn register<F>(&self, callback: F) -> CallbackId
    where
        F: Fn(&T) + 'static,
    {
        let id = CallbackId::next();
        self.listeners.borrow_mut().push((id, Rc::new(callback)));
        id
    }

    /// Remove a listener. Returns `false` if the id was not registered.
    pub fn unregister(&self, id: CallbackId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(entry, _)| *entry != id);
        listeners.len() != before
    }

    /// Invoke every listener with `event`.
    ///
    /// The list is cloned first so a listener may register or unregister
    /// without tripping the `RefCell` borrow.
    pub fn notify(&self, event: &T) {
        if self.is_empty() {
            return;
        }
        let listeners: Vec<Listener<T>> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        for cb in listeners {
            cb(event);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.borrow().is_empty()
    }
}

impl<T> Default for Callbacks<T> {
    fn default() -> Self {
        Self::new()
    }
}
