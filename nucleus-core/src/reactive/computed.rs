//! Computed Implementation
//!
//! A computed cell is a derived value: a compute function over one or more
//! atoms, cached until a dependency changes.
//!
//! # How Computed Cells Work
//!
//! 1. The compute function does not run at creation. On first access the
//!    cell computes, caches the result, and clears its dirty flag.
//!
//! 2. Each attached dependency carries a subscription whose callback marks
//!    this cell dirty. The next access after an invalidation recomputes.
//!
//! 3. A failed compute propagates the error to the caller and leaves the
//!    cached value and dirty flag untouched, so calling `get` again retries.
//!
//! # Concurrency
//!
//! Recomputation is at-most-one-concurrent per cell. A recompute gate
//! serializes slow-path callers: the first caller runs the compute function,
//! later callers block on the gate and then observe the freshly cached
//! result instead of starting their own computation. The compute function
//! runs with no cell lock held, so it may re-enter the store to read its
//! dependencies.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use smallvec::SmallVec;

use super::atom::AtomCell;
use super::subscriber::SubscriberId;
use crate::error::ComputeError;
use crate::value::Value;

/// Counter for process-unique cell ids, shared shape with atoms but a
/// separate namespace (computed cells never enter the batch pending set).
static CELL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_cell_id() -> u64 {
    CELL_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// The compute function of a derived cell.
///
/// Assumed pure over the current state of its dependencies at call time;
/// this is a caller contract, not enforced.
pub type ComputeFn = Arc<dyn Fn() -> Result<Value, ComputeError> + Send + Sync>;

/// A subscription held on one dependency atom.
struct DepSubscription {
    /// Non-owning back-reference; a dependency deleted from the store is
    /// skipped at teardown.
    atom: Weak<AtomCell>,
    token: SubscriberId,
}

/// A lazily recomputed value derived from atom dependencies.
pub struct ComputedCell {
    id: u64,

    compute: ComputeFn,

    state: Mutex<ComputedState>,

    /// Serializes recomputation; held across the compute call, never
    /// together with `state`.
    recompute_gate: Mutex<()>,

    subscriptions: Mutex<SmallVec<[DepSubscription; 4]>>,
}

struct ComputedState {
    cached: Option<Value>,
    dirty: bool,
}

impl ComputedCell {
    /// Create a cell with the given compute function. Starts dirty; the
    /// first `get` computes.
    pub fn new(compute: ComputeFn) -> Self {
        Self {
            id: next_cell_id(),
            compute,
            state: Mutex::new(ComputedState {
                cached: None,
                dirty: true,
            }),
            recompute_gate: Mutex::new(()),
            subscriptions: Mutex::new(SmallVec::new()),
        }
    }

    /// The cell's process-unique id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Current value, recomputing if stale.
    pub fn get(&self) -> Result<Value, ComputeError> {
        if let Some(cached) = self.fresh_cache() {
            return Ok(cached);
        }

        let _gate = self.recompute_gate.lock();

        // A caller that held the gate before us may have refreshed the
        // cache while we waited; observe its result instead of recomputing.
        if let Some(cached) = self.fresh_cache() {
            return Ok(cached);
        }

        // No lock held across the compute call: it may re-enter the store.
        let fresh = (self.compute)()?;

        let mut state = self.state.lock();
        state.cached = Some(fresh.clone());
        state.dirty = false;
        Ok(fresh)
    }

    /// The cached value when it is current, `None` when a recompute is due.
    fn fresh_cache(&self) -> Option<Value> {
        let state = self.state.lock();
        if state.dirty {
            return None;
        }
        state.cached.clone()
    }

    /// Register `atom` as a dependency: changes to it mark this cell dirty.
    ///
    /// Dependencies attached after a value has been cached are tracked going
    /// forward; they do not retroactively invalidate the cache.
    pub fn attach(self: &Arc<Self>, atom: &Arc<AtomCell>) {
        let weak = Arc::downgrade(self);
        let token = atom.subscribe(Arc::new(move || {
            if let Some(cell) = weak.upgrade() {
                cell.mark_dirty();
            }
        }));
        self.subscriptions.lock().push(DepSubscription {
            atom: Arc::downgrade(atom),
            token,
        });
    }

    /// Mark the cached value stale. Idempotent.
    pub fn mark_dirty(&self) {
        self.state.lock().dirty = true;
    }

    /// True if the next `get` will recompute.
    pub fn is_dirty(&self) -> bool {
        self.state.lock().dirty
    }

    /// True once a value has been cached (even if currently stale).
    pub fn has_cached_value(&self) -> bool {
        self.state.lock().cached.is_some()
    }

    /// Number of live dependency subscriptions.
    pub fn dependency_count(&self) -> usize {
        self.subscriptions.lock().len()
    }
}

impl Drop for ComputedCell {
    /// Unsubscribe from every dependency so no dependency cell is left
    /// holding a callback into a dropped computed cell.
    fn drop(&mut self) {
        let subscriptions = std::mem::take(&mut *self.subscriptions.lock());
        for sub in subscriptions {
            if let Some(atom) = sub.atom.upgrade() {
                atom.unsubscribe(sub.token);
            }
        }
    }
}

impl std::fmt::Debug for ComputedCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ComputedCell")
            .field("id", &self.id)
            .field("dirty", &state.dirty)
            .field("has_cached_value", &state.cached.is_some())
            .field("dependency_count", &self.subscriptions.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;

    fn counting_compute(counter: &Arc<AtomicI32>, result: f64) -> ComputeFn {
        let counter = counter.clone();
        Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Value::from(result))
        })
    }

    #[test]
    fn computes_lazily_and_caches() {
        let calls = Arc::new(AtomicI32::new(0));
        let cell = ComputedCell::new(counting_compute(&calls, 42.0));

        assert!(cell.is_dirty());
        assert!(!cell.has_cached_value());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert_eq!(cell.get().unwrap(), Value::from(42.0));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!cell.is_dirty());

        assert_eq!(cell.get().unwrap(), Value::from(42.0));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn mark_dirty_forces_recompute() {
        let calls = Arc::new(AtomicI32::new(0));
        let cell = ComputedCell::new(counting_compute(&calls, 7.0));

        cell.get().unwrap();
        cell.mark_dirty();
        cell.mark_dirty(); // idempotent
        cell.get().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dependency_change_invalidates_cache() {
        let atom = Arc::new(AtomCell::new(Value::from(1.0)));
        let calls = Arc::new(AtomicI32::new(0));

        let atom_for_compute = atom.clone();
        let calls_clone = calls.clone();
        let cell = Arc::new(ComputedCell::new(Arc::new(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            let base = atom_for_compute.get().as_number().unwrap_or(0.0);
            Ok(Value::from(base * 2.0))
        })));
        cell.attach(&atom);

        assert_eq!(cell.get().unwrap(), Value::from(2.0));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        atom.set(Value::from(5.0));
        atom.notify();
        atom.mark_clean();

        assert!(cell.is_dirty());
        assert_eq!(cell.get().unwrap(), Value::from(10.0));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failed_compute_leaves_state_for_retry() {
        let fail = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let calls = Arc::new(AtomicI32::new(0));

        let fail_clone = fail.clone();
        let calls_clone = calls.clone();
        let cell = ComputedCell::new(Arc::new(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            if fail_clone.load(Ordering::SeqCst) {
                Err(ComputeError::new("dependency unavailable"))
            } else {
                Ok(Value::from(1.0))
            }
        }));

        // Cache a good value, then invalidate and fail the recompute.
        cell.get().unwrap();
        cell.mark_dirty();
        fail.store(true, Ordering::SeqCst);

        let err = cell.get().unwrap_err();
        assert_eq!(err.message(), "dependency unavailable");

        // Failure left the prior cache and the dirty flag in place.
        assert!(cell.is_dirty());
        assert!(cell.has_cached_value());

        // Retry succeeds once the compute recovers.
        fail.store(false, Ordering::SeqCst);
        assert_eq!(cell.get().unwrap(), Value::from(1.0));
        assert!(!cell.is_dirty());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn late_attach_does_not_invalidate_cache() {
        let atom = Arc::new(AtomCell::new(Value::from(1.0)));
        let calls = Arc::new(AtomicI32::new(0));
        let cell = Arc::new(ComputedCell::new(counting_compute(&calls, 9.0)));

        cell.get().unwrap();
        cell.attach(&atom);
        assert!(!cell.is_dirty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // The late dependency is tracked going forward.
        atom.set(Value::from(2.0));
        atom.notify();
        atom.mark_clean();
        assert!(cell.is_dirty());
    }

    #[test]
    fn drop_unsubscribes_from_dependencies() {
        let atom = Arc::new(AtomCell::new(Value::Null));
        let cell = Arc::new(ComputedCell::new(Arc::new(|| Ok(Value::Null))));
        cell.attach(&atom);

        assert_eq!(atom.subscriber_count(), 1);
        drop(cell);
        assert_eq!(atom.subscriber_count(), 0);
    }

    #[test]
    fn drop_tolerates_deleted_dependencies() {
        let atom = Arc::new(AtomCell::new(Value::Null));
        let cell = Arc::new(ComputedCell::new(Arc::new(|| Ok(Value::Null))));
        cell.attach(&atom);

        drop(atom);
        drop(cell);
    }

    #[test]
    fn concurrent_gets_recompute_once() {
        use std::time::Duration;

        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();
        let cell = Arc::new(ComputedCell::new(Arc::new(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(50));
            Ok(Value::from(3.0))
        })));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cell = cell.clone();
                std::thread::spawn(move || cell.get().unwrap())
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), Value::from(3.0));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
