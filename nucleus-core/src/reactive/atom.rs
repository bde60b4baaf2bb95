//! Atom Implementation
//!
//! An atom is the fundamental reactive primitive: one named mutable value
//! plus its subscriber list.
//!
//! # How Atoms Work
//!
//! 1. Writing an atom replaces its value and marks it dirty.
//!
//! 2. The write path then either notifies immediately (no batch active) or
//!    queues the cell with the batch scheduler, which flushes when the
//!    outermost batch ends.
//!
//! 3. `notify` invokes every registered callback in subscription order, and
//!    the write path clears the dirty flag afterwards via `mark_clean`.
//!
//! # Thread Safety
//!
//! All interior state sits behind a single mutex. Callbacks are never
//! invoked with that mutex held: `notify` snapshots the callback list under
//! the lock, releases it, then invokes. A callback may therefore re-enter
//! the cell (subscribe, unsubscribe, even write) without deadlocking;
//! registrations changed during a pass take effect for subsequent passes.

use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::subscriber::{Callback, SubscriberId};
use crate::value::Value;

/// Counter for process-unique cell ids.
static CELL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new unique cell id.
fn next_cell_id() -> u64 {
    CELL_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// A single mutable reactive value with its own subscriber list.
pub struct AtomCell {
    /// Process-unique identity, used by the batch scheduler to deduplicate
    /// pending notifications.
    id: u64,

    inner: Mutex<AtomInner>,
}

struct AtomInner {
    value: Value,

    /// Registered callbacks in subscription order. `shift_remove` keeps the
    /// order of the remaining entries intact.
    subscribers: IndexMap<SubscriberId, Callback>,

    /// Next subscriber id; monotonic for the cell's lifetime.
    next_subscriber: u64,

    dirty: bool,
}

impl AtomCell {
    /// Create a cell holding the given initial value.
    pub fn new(initial: Value) -> Self {
        Self {
            id: next_cell_id(),
            inner: Mutex::new(AtomInner {
                value: initial,
                subscribers: IndexMap::new(),
                next_subscriber: 0,
                dirty: false,
            }),
        }
    }

    /// The cell's process-unique id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Current value. Scalars are returned by copy, structured payloads by
    /// shared reference (see [`Value`]).
    pub fn get(&self) -> Value {
        self.inner.lock().value.clone()
    }

    /// Replace the value and mark the cell dirty.
    ///
    /// Notification delivery is the write path's responsibility: the store
    /// queues the cell with the batch scheduler or, outside a batch, calls
    /// [`notify`](Self::notify) followed by [`mark_clean`](Self::mark_clean).
    pub fn set(&self, value: Value) {
        let mut inner = self.inner.lock();
        inner.value = value;
        inner.dirty = true;
    }

    /// Register a callback, returning a fresh monotonic id.
    pub fn subscribe(&self, callback: Callback) -> SubscriberId {
        let mut inner = self.inner.lock();
        let id = SubscriberId::from_raw(inner.next_subscriber);
        inner.next_subscriber += 1;
        inner.subscribers.insert(id, callback);
        id
    }

    /// Remove a registration. Removing an unknown id is a no-op.
    pub fn unsubscribe(&self, id: SubscriberId) {
        self.inner.lock().subscribers.shift_remove(&id);
    }

    /// If dirty, invoke every currently-registered callback in subscription
    /// order. Does not clear the dirty flag; the caller does that via
    /// [`mark_clean`](Self::mark_clean) once delivery is done.
    pub fn notify(&self) {
        let snapshot: Vec<Callback> = {
            let inner = self.inner.lock();
            if !inner.dirty {
                return;
            }
            inner.subscribers.values().cloned().collect()
        };

        // Invoked without the lock held; callbacks may re-enter the cell.
        for callback in snapshot {
            callback();
        }
    }

    /// True if the value changed since the last `mark_clean`.
    pub fn is_dirty(&self) -> bool {
        self.inner.lock().dirty
    }

    /// Clear the dirty flag after a notification pass.
    pub fn mark_clean(&self) {
        self.inner.lock().dirty = false;
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }
}

impl std::fmt::Debug for AtomCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("AtomCell")
            .field("id", &self.id)
            .field("value", &inner.value)
            .field("dirty", &inner.dirty)
            .field("subscriber_count", &inner.subscribers.len())
            .finish()
    }
}
