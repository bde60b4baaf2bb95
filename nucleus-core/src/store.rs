//! Store Registry
//!
//! The store is the addressable namespace the caller operates on: string
//! keys mapped to atoms and computed cells, plus the batching entry points.
//!
//! # Locking
//!
//! The registry maps are concurrent; lookups clone the cell's `Arc` and
//! release the map guard before touching the cell, so no map lock is ever
//! held while a subscriber callback runs. Combined with the cells' own
//! snapshot-then-invoke discipline, a callback is free to re-enter the store
//! (write another atom, subscribe, unsubscribe) from inside a notification.
//!
//! # Batching
//!
//! The scheduler is an explicit handle passed at construction. Writes during
//! an open batch queue their cell instead of notifying; the outermost
//! `end_batch` flushes each distinct touched cell once.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, trace, warn};

use crate::error::{ComputeError, StoreError, StoreResult};
use crate::reactive::{AtomCell, BatchScheduler, BatchScope, ComputedCell, Subscription};
use crate::value::Value;

/// A registry of named atoms and computed cells.
pub struct Store {
    atoms: DashMap<String, Arc<AtomCell>>,
    computed: DashMap<String, Arc<ComputedCell>>,
    scheduler: Arc<BatchScheduler>,
}

impl Store {
    /// Create a store with its own batch scheduler.
    pub fn new() -> Self {
        Self::with_scheduler(Arc::new(BatchScheduler::new()))
    }

    /// Create a store using the given scheduler handle. Stores sharing a
    /// handle batch together.
    pub fn with_scheduler(scheduler: Arc<BatchScheduler>) -> Self {
        Self {
            atoms: DashMap::new(),
            computed: DashMap::new(),
            scheduler,
        }
    }

    /// The store's batch scheduler handle.
    pub fn scheduler(&self) -> &Arc<BatchScheduler> {
        &self.scheduler
    }

    // ----- Atom Operations -----

    /// Register a new atom under `key`.
    pub fn create_atom(&self, key: &str, initial: Value) -> StoreResult<()> {
        match self.atoms.entry(key.to_owned()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(StoreError::AlreadyExists(key.to_owned()))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Arc::new(AtomCell::new(initial)));
                debug!(key, "created atom");
                Ok(())
            }
        }
    }

    /// Current value of the atom under `key`.
    pub fn atom_value(&self, key: &str) -> StoreResult<Value> {
        Ok(self.atom(key)?.get())
    }

    /// Write the atom under `key` and deliver (or queue) notifications.
    pub fn set_atom_value(&self, key: &str, value: Value) -> StoreResult<()> {
        let cell = self.atom(key)?;
        cell.set(value);
        trace!(key, "atom written");

        if !self.scheduler.try_queue(&cell) {
            // No batch open: deliver immediately, then clean.
            cell.notify();
            cell.mark_clean();
        }
        Ok(())
    }

    /// Register a change callback on the atom under `key`.
    pub fn subscribe_atom<F>(&self, key: &str, callback: F) -> StoreResult<Subscription>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let cell = self.atom(key)?;
        let id = cell.subscribe(Arc::new(callback));
        Ok(Subscription::new(&cell, id))
    }

    /// Remove the atom under `key`. Deleting an absent key is a no-op.
    ///
    /// Computed cells subscribed to the atom keep only weak references, so
    /// their later teardown degrades to a silent no-op; a deletion while the
    /// atom sits in an open batch is also safe, the pending flush holds its
    /// own `Arc`.
    pub fn delete_atom(&self, key: &str) {
        if self.atoms.remove(key).is_some() {
            debug!(key, "deleted atom");
        }
    }

    /// True if an atom is registered under `key`.
    pub fn has_atom(&self, key: &str) -> bool {
        self.atoms.contains_key(key)
    }

    /// Keys of all registered atoms. Order is unspecified.
    pub fn atom_keys(&self) -> Vec<String> {
        self.atoms.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Number of registered atoms.
    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    // ----- Computed Operations -----

    /// Register a derived cell under `key`, depending on the atoms named in
    /// `dependencies`.
    ///
    /// Dependency keys that do not resolve to an existing atom contribute no
    /// subscription and are skipped with a warning; the computed cell is
    /// still created.
    pub fn create_computed<F>(&self, key: &str, dependencies: &[&str], compute: F) -> StoreResult<()>
    where
        F: Fn() -> Result<Value, ComputeError> + Send + Sync + 'static,
    {
        let cell = Arc::new(ComputedCell::new(Arc::new(compute)));

        for dep in dependencies {
            match self.atoms.get(*dep).map(|entry| Arc::clone(&entry)) {
                Some(atom) => cell.attach(&atom),
                None => warn!(key, dependency = *dep, "skipping unknown dependency"),
            }
        }

        match self.computed.entry(key.to_owned()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                // The losing cell unsubscribes from its dependencies on drop.
                Err(StoreError::AlreadyExists(key.to_owned()))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(cell);
                debug!(key, "created computed");
                Ok(())
            }
        }
    }

    /// Value of the computed cell under `key`, recomputing if stale.
    ///
    /// A compute failure surfaces as [`StoreError::ComputeFailure`] and
    /// leaves the cell's cached state untouched; calling again retries.
    pub fn computed_value(&self, key: &str) -> StoreResult<Value> {
        let cell = self
            .computed
            .get(key)
            .map(|entry| Arc::clone(&entry))
            .ok_or_else(|| StoreError::NotFound(key.to_owned()))?;

        cell.get().map_err(|source| StoreError::ComputeFailure {
            key: key.to_owned(),
            source,
        })
    }

    /// Remove the computed cell under `key`. Deleting an absent key is a
    /// no-op. Dropping the cell unsubscribes it from its dependencies.
    pub fn delete_computed(&self, key: &str) {
        if self.computed.remove(key).is_some() {
            debug!(key, "deleted computed");
        }
    }

    /// Number of registered computed cells.
    pub fn computed_count(&self) -> usize {
        self.computed.len()
    }

    // ----- Batch Operations -----

    /// Open a batch. Nested calls are counted; notifications queue until the
    /// matching outermost [`end_batch`](Self::end_batch).
    pub fn start_batch(&self) {
        self.scheduler.start();
    }

    /// Close a batch, flushing queued notifications when it is the
    /// outermost one.
    pub fn end_batch(&self) {
        self.scheduler.end();
    }

    /// Open a batch scoped to the returned guard.
    pub fn batch_scope(&self) -> BatchScope<'_> {
        self.scheduler.scope()
    }

    fn atom(&self, key: &str) -> StoreResult<Arc<AtomCell>> {
        self.atoms
            .get(key)
            .map(|entry| Arc::clone(&entry))
            .ok_or_else(|| StoreError::NotFound(key.to_owned()))
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("atoms", &self.atoms.len())
            .field("computed", &self.computed.len())
            .field("batching", &self.scheduler.is_batching())
            .finish()
    }
}
