//! Subscriber types for the reactive engine.
//!
//! A subscriber is a zero-argument callback registered on a cell. Cells mint
//! their own [`SubscriberId`]s from a per-cell counter, so ids are unique and
//! monotonically increasing for the cell's lifetime.

use std::sync::{Arc, Weak};

use super::atom::AtomCell;

/// Callback invoked when a cell's value changes (subject to batching).
pub type Callback = Arc<dyn Fn() + Send + Sync>;

/// Registration token for a subscriber on a single cell.
///
/// Ids are scoped to the cell that issued them; a cell never reuses an id,
/// and removing an unknown id is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw id value.
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Handle returned by [`Store::subscribe_atom`](crate::store::Store::subscribe_atom).
///
/// Holds a non-owning reference to the cell, so the handle neither keeps a
/// deleted atom alive nor dangles: unsubscribing after the atom was removed
/// from the store is a silent no-op.
pub struct Subscription {
    cell: Weak<AtomCell>,
    id: SubscriberId,
}

impl Subscription {
    pub(crate) fn new(cell: &Arc<AtomCell>, id: SubscriberId) -> Self {
        Self {
            cell: Arc::downgrade(cell),
            id,
        }
    }

    /// The id this subscription was registered under.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Remove the registration. Idempotent at the cell level; calling this
    /// after the atom was deleted does nothing.
    pub fn unsubscribe(self) {
        if let Some(cell) = self.cell.upgrade() {
            cell.unsubscribe(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("live", &(self.cell.strong_count() > 0))
            .finish()
    }
}
