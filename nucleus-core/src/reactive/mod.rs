//! Reactive Primitives
//!
//! This module implements the core reactive engine: atoms, computed cells,
//! and the batch scheduler.
//!
//! # Concepts
//!
//! ## Atoms
//!
//! An [`AtomCell`] is a container for one mutable value plus its subscriber
//! list. Writing an atom marks it dirty; subscribers are notified either
//! immediately or, inside a batch, once at the outermost batch end.
//!
//! ## Computed Cells
//!
//! A [`ComputedCell`] is a derived value that caches its result. Its
//! dependencies are attached explicitly; each dependency carries a
//! subscription that marks the computed cell dirty when the atom changes,
//! and the cell recomputes lazily on the next read.
//!
//! ## Batching
//!
//! The [`BatchScheduler`] defers and deduplicates notifications while any
//! batch is open, so N writes inside a batch produce at most one
//! notification pass per cell.
//!
//! # Implementation Notes
//!
//! The uniform locking discipline across all three primitives: snapshot the
//! callbacks to invoke under the lock, release the lock, then invoke. A
//! callback may re-enter the engine (write another atom, unsubscribe itself)
//! without deadlocking.

mod atom;
mod batch;
mod computed;
mod subscriber;

pub use atom::AtomCell;
pub use batch::{BatchScheduler, BatchScope};
pub use computed::{ComputeFn, ComputedCell};
pub use subscriber::{Callback, SubscriberId, Subscription};
