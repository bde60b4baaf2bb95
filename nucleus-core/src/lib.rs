//! Nucleus Core
//!
//! This crate provides the core engine for the Nucleus reactive state store.
//! It implements:
//!
//! - Named mutable cells (atoms) with subscriber lists
//! - Derived lazily-recomputed cells (computed)
//! - Batched, deduplicated change notification
//! - A string-keyed registry tying the pieces together
//!
//! The engine is designed to be embedded: a host binding layer calls the
//! [`Store`] operations and receives callbacks, while the engine itself
//! exposes no network, file, or process boundary.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: atoms, computed cells, and the batch scheduler
//! - `store`: the registry mapping string keys to cells
//! - `value`: the dynamically typed payload type
//! - `error`: the operation error taxonomy
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use nucleus_core::{Store, Value};
//!
//! let store = Arc::new(Store::new());
//! store.create_atom("count", Value::from(0.0)).unwrap();
//!
//! // Derive a value; it recomputes only after "count" changes.
//! let reader = Arc::clone(&store);
//! store
//!     .create_computed("doubled", &["count"], move || {
//!         let base = reader.atom_value("count")?.as_number().unwrap_or(0.0);
//!         Ok(Value::from(base * 2.0))
//!     })
//!     .unwrap();
//!
//! assert_eq!(store.computed_value("doubled").unwrap(), Value::from(0.0));
//!
//! // Batch several writes into a single notification pass.
//! store.start_batch();
//! store.set_atom_value("count", Value::from(1.0)).unwrap();
//! store.set_atom_value("count", Value::from(2.0)).unwrap();
//! store.end_batch();
//!
//! assert_eq!(store.computed_value("doubled").unwrap(), Value::from(4.0));
//! ```

pub mod error;
pub mod reactive;
pub mod store;
pub mod value;

pub use error::{ComputeError, StoreError, StoreResult};
pub use reactive::{AtomCell, BatchScheduler, BatchScope, ComputedCell, SubscriberId, Subscription};
pub use store::Store;
pub use value::Value;
