//! WindowStore - the id-keyed collection of tracked toplevels.
//!
//! Records live in a flat `Vec`. Removal uses `swap_remove`, so storage order
//! changes whenever a window goes away; identity is always the `WindowId`,
//! never the position. Callers that need a stable order ask for the sorted
//! iterator.

use std::fmt;
use std::slice;
use std::vec;

/// Initial backing capacity; `Vec` doubles from here.
const INITIAL_CAPACITY: usize = 4;

/// Process-local window identifier.
///
/// Assigned from a monotonically increasing counter and never reused, even
/// after the window it named has been removed. 64 bits so the counter cannot
/// wrap within the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WindowId(pub u64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State flags reported by the compositor. Each flag is independent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowState {
    pub maximized: bool,
    pub minimized: bool,
    pub activated: bool,
    pub fullscreen: bool,
}

/// Parent link of a window, stored as an id rather than an owning reference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Parent {
    /// The window has no parent.
    #[default]
    None,
    /// Parent resolved to a tracked window. It may have been removed since.
    Window(WindowId),
    /// The compositor named a parent handle we were not tracking.
    Unresolved,
}

/// Lifecycle phase. `Closed` is terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Tracked,
    Closed,
}

/// Updates received since the last `done`, not yet visible.
///
/// `state: None` means no state event arrived in this batch, which is
/// different from `Some(WindowState::default())` (all flags cleared).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Staging {
    pub title: Option<String>,
    pub app_id: Option<String>,
    pub parent: Option<Parent>,
    pub state: Option<WindowState>,
}

impl Staging {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.app_id.is_none()
            && self.parent.is_none()
            && self.state.is_none()
    }
}

/// A tracked toplevel: the committed view plus its staging buffer.
#[derive(Debug, Clone)]
pub struct WindowRecord<H> {
    pub handle: H,
    pub id: WindowId,
    pub title: Option<String>,
    pub app_id: Option<String>,
    pub parent: Parent,
    pub state: WindowState,
    pub phase: Phase,
    pub(crate) pending: Staging,
}

impl<H> WindowRecord<H> {
    fn new(handle: H, id: WindowId) -> Self {
        Self {
            handle,
            id,
            title: None,
            app_id: None,
            parent: Parent::None,
            state: WindowState::default(),
            phase: Phase::Tracked,
            pending: Staging::default(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.phase == Phase::Closed
    }

    /// Updates staged since the last commit.
    pub fn pending(&self) -> &Staging {
        &self.pending
    }
}

/// Unordered collection of window records keyed by [`WindowId`].
#[derive(Debug)]
pub struct WindowStore<H> {
    records: Vec<WindowRecord<H>>,
    next_id: u64,
}

impl<H> WindowStore<H> {
    pub fn new() -> Self {
        Self {
            records: Vec::with_capacity(INITIAL_CAPACITY),
            next_id: 0,
        }
    }

    /// Track a new window and return its freshly assigned id.
    pub fn insert(&mut self, handle: H) -> WindowId {
        let id = WindowId(self.next_id);
        self.next_id += 1;
        self.records.push(WindowRecord::new(handle, id));
        id
    }

    pub fn find(&self, id: WindowId) -> Option<&WindowRecord<H>> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn find_mut(&mut self, id: WindowId) -> Option<&mut WindowRecord<H>> {
        self.records.iter_mut().find(|r| r.id == id)
    }

    /// Like [`find`](Self::find) but skips windows that have been closed.
    pub fn find_live(&self, id: WindowId) -> Option<&WindowRecord<H>> {
        self.find(id).filter(|r| !r.is_closed())
    }

    /// Remove a record in O(1) after lookup. The last record takes its slot.
    pub fn remove(&mut self, id: WindowId) -> Option<WindowRecord<H>> {
        let index = self.records.iter().position(|r| r.id == id)?;
        Some(self.records.swap_remove(index))
    }

    /// Drop every record matching `pred`, returning how many went away.
    pub fn remove_where<F>(&mut self, mut pred: F) -> usize
    where
        F: FnMut(&WindowRecord<H>) -> bool,
    {
        let mut removed = 0;
        let mut index = 0;
        while index < self.records.len() {
            if pred(&self.records[index]) {
                self.records.swap_remove(index);
                removed += 1;
            } else {
                index += 1;
            }
        }
        removed
    }

    /// Iterate records, ascending by id when `sorted`, else in storage order.
    ///
    /// Storage order is unspecified and changes after removals.
    pub fn iter(&self, sorted: bool) -> Windows<'_, H> {
        if sorted {
            let mut refs: Vec<&WindowRecord<H>> = self.records.iter().collect();
            refs.sort_unstable_by_key(|r| r.id);
            Windows::Sorted(refs.into_iter())
        } else {
            Windows::Storage(self.records.iter())
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<H: PartialEq> WindowStore<H> {
    /// Resolve a compositor handle to the id of the live window owning it.
    pub fn find_by_handle(&self, handle: &H) -> Option<WindowId> {
        self.records
            .iter()
            .find(|r| !r.is_closed() && r.handle == *handle)
            .map(|r| r.id)
    }
}

impl<H> Default for WindowStore<H> {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator returned by [`WindowStore::iter`]. Cloning restarts it.
pub enum Windows<'a, H> {
    Storage(slice::Iter<'a, WindowRecord<H>>),
    Sorted(vec::IntoIter<&'a WindowRecord<H>>),
}

impl<H> Clone for Windows<'_, H> {
    fn clone(&self) -> Self {
        match self {
            Windows::Storage(it) => Windows::Storage(it.clone()),
            Windows::Sorted(it) => Windows::Sorted(it.clone()),
        }
    }
}

impl<'a, H> Iterator for Windows<'a, H> {
    type Item = &'a WindowRecord<H>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Windows::Storage(it) => it.next(),
            Windows::Sorted(it) => it.next(),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            Windows::Storage(it) => it.size_hint(),
            Windows::Sorted(it) => it.size_hint(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids<H>(store: &WindowStore<H>, sorted: bool) -> Vec<u64> {
        store.iter(sorted).map(|r| r.id.0).collect()
    }

    #[test]
    fn test_ids_increase_and_are_never_reused() {
        let mut store = WindowStore::new();
        let a = store.insert("a");
        let b = store.insert("b");
        assert!(a < b);

        store.remove(a);
        store.remove(b);
        let c = store.insert("c");
        assert_eq!(c, WindowId(2));

        let mut last = c;
        for n in 0..20 {
            let id = store.insert("x");
            assert!(id > last);
            last = id;
            if n % 3 == 0 {
                store.remove(id);
            }
        }
    }

    #[test]
    fn test_ids_continue_past_u32_range() {
        let mut store = WindowStore::new();
        store.next_id = u64::from(u32::MAX);
        let a = store.insert(());
        let b = store.insert(());
        assert_eq!(a, WindowId(u64::from(u32::MAX)));
        assert_eq!(b, WindowId(u64::from(u32::MAX) + 1));
        assert!(store.find(a).is_some());
    }

    #[test]
    fn test_remove_makes_id_unfindable_and_keeps_others() {
        let mut store = WindowStore::new();
        let a = store.insert(10);
        let b = store.insert(20);
        let c = store.insert(30);

        let removed = store.remove(a).map(|r| r.handle);
        assert_eq!(removed, Some(10));
        assert!(store.find(a).is_none());
        assert_eq!(store.find(b).map(|r| r.handle), Some(20));
        assert_eq!(store.find(c).map(|r| r.handle), Some(30));
        assert!(store.remove(a).is_none());
    }

    #[test]
    fn test_swap_remove_reorders_storage_but_not_sorted_view() {
        let mut store = WindowStore::new();
        for h in 0..4 {
            store.insert(h);
        }
        store.remove(WindowId(0));

        // Last entry moved into the freed slot.
        assert_eq!(ids(&store, false), vec![3, 1, 2]);
        assert_eq!(ids(&store, true), vec![1, 2, 3]);

        store.insert(9);
        assert_eq!(ids(&store, true), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_iterator_is_restartable() {
        let mut store = WindowStore::new();
        store.insert(());
        store.insert(());

        let iter = store.iter(true);
        let first: Vec<_> = iter.clone().map(|r| r.id).collect();
        let second: Vec<_> = iter.map(|r| r.id).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_find_by_handle_ignores_closed() {
        let mut store = WindowStore::new();
        let a = store.insert("parent");
        assert_eq!(store.find_by_handle(&"parent"), Some(a));

        if let Some(record) = store.find_mut(a) {
            record.phase = Phase::Closed;
        }
        assert_eq!(store.find_by_handle(&"parent"), None);
        assert!(store.find_live(a).is_none());
        assert!(store.find(a).is_some());
    }

    #[test]
    fn test_remove_where_counts_removed() {
        let mut store = WindowStore::new();
        for h in 0..6 {
            store.insert(h);
        }
        let removed = store.remove_where(|r| r.handle % 2 == 0);
        assert_eq!(removed, 3);
        assert_eq!(ids(&store, true), vec![1, 3, 5]);
    }

    #[test]
    fn test_staging_is_empty() {
        let mut staging = Staging::default();
        assert!(staging.is_empty());
        staging.state = Some(WindowState::default());
        assert!(!staging.is_empty());
    }
}
