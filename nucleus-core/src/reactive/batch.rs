//! Batch Scheduler
//!
//! Batches coalesce notifications: while a batch is active, writes queue
//! their cells here instead of notifying immediately, and repeated writes to
//! one cell collapse to a single pending entry. When the outermost batch
//! ends, each distinct pending cell is notified exactly once.
//!
//! # Coordinator Handle
//!
//! The scheduler is not a hidden process-wide singleton: each store receives
//! an explicit `Arc<BatchScheduler>` at construction, so independent stores
//! (for example, in tests) never share batching state unintentionally.
//! Stores that should batch together can share one handle.
//!
//! # Ordering
//!
//! The pending set is insertion-ordered, so a flush notifies cells in
//! first-queued order: set semantics for deduplication, deterministic order
//! per run. Cells are held as `Arc`s, so a cell deleted from its store
//! mid-batch still flushes safely.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{trace, warn};

use super::atom::AtomCell;

/// Reentrant, depth-counted notification coalescer.
pub struct BatchScheduler {
    inner: Mutex<BatchInner>,
}

struct BatchInner {
    depth: usize,

    /// Pending cells keyed by cell id; insertion order is flush order.
    /// Invariant: non-empty only while `depth > 0`.
    pending: IndexMap<u64, Arc<AtomCell>>,
}

impl BatchScheduler {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(BatchInner {
                depth: 0,
                pending: IndexMap::new(),
            }),
        }
    }

    /// Begin a batch. Batches nest; only the matching outermost
    /// [`end`](Self::end) flushes.
    pub fn start(&self) {
        self.inner.lock().depth += 1;
    }

    /// End a batch. When this closes the outermost batch, takes ownership of
    /// the pending set and, with no lock held, calls `notify` then
    /// `mark_clean` on each distinct pending cell in first-queued order.
    ///
    /// An `end` without a matching `start` is tolerated: depth stays at
    /// zero and nothing flushes.
    pub fn end(&self) {
        let drained = {
            let mut inner = self.inner.lock();
            if inner.depth == 0 {
                warn!("end_batch without matching start_batch");
                return;
            }
            inner.depth -= 1;
            if inner.depth == 0 {
                Some(std::mem::take(&mut inner.pending))
            } else {
                None
            }
        };

        if let Some(cells) = drained {
            trace!(cells = cells.len(), "flushing batch");
            for (_, cell) in cells {
                cell.notify();
                cell.mark_clean();
            }
        }
    }

    /// Queue `cell` for notification if a batch is active. Returns whether
    /// the cell was queued; when it was not, the caller notifies
    /// immediately. Repeated queues of one cell collapse to one entry.
    pub fn try_queue(&self, cell: &Arc<AtomCell>) -> bool {
        let mut inner = self.inner.lock();
        if inner.depth == 0 {
            return false;
        }
        inner.pending.entry(cell.id()).or_insert_with(|| cell.clone());
        true
    }

    /// True while any batch is open.
    pub fn is_batching(&self) -> bool {
        self.inner.lock().depth > 0
    }

    /// Current nesting depth.
    pub fn depth(&self) -> usize {
        self.inner.lock().depth
    }

    /// Open a batch scoped to the returned guard; dropping the guard ends
    /// it, including on unwind.
    pub fn scope(&self) -> BatchScope<'_> {
        self.start();
        BatchScope { scheduler: self }
    }
}

impl Default for BatchScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BatchScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("BatchScheduler")
            .field("depth", &inner.depth)
            .field("pending", &inner.pending.len())
            .finish()
    }
}

/// Guard that ends its batch when dropped.
pub struct BatchScope<'a> {
    scheduler: &'a BatchScheduler,
}

impl Drop for BatchScope<'_> {
    fn drop(&mut self) {
        self.scheduler.end();
    }
}
