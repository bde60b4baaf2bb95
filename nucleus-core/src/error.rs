//! Error taxonomy for store operations.
//!
//! Every failure is local to the operation that raised it: a failed create,
//! lookup, or recompute never corrupts other entries in the store. Delete
//! operations on missing keys are successful no-ops rather than errors.

use thiserror::Error;

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by [`Store`](crate::store::Store) operations.
///
/// All errors propagate synchronously to the immediate caller; nothing is
/// retried internally.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A create operation targeted a key that is already registered.
    #[error("key `{0}` already exists")]
    AlreadyExists(String),

    /// A read/write/subscribe operation targeted an unregistered key.
    #[error("key `{0}` not found")]
    NotFound(String),

    /// A computed cell's compute function failed.
    ///
    /// The cell's cached value and dirty flag are left untouched, so calling
    /// `computed_value` again retries the computation.
    #[error("compute for `{key}` failed")]
    ComputeFailure {
        key: String,
        #[source]
        source: ComputeError,
    },
}

impl StoreError {
    /// The key the failing operation targeted.
    pub fn key(&self) -> &str {
        match self {
            StoreError::AlreadyExists(key) => key,
            StoreError::NotFound(key) => key,
            StoreError::ComputeFailure { key, .. } => key,
        }
    }
}

/// Error raised by a computed cell's compute function.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ComputeError {
    message: String,
}

impl ComputeError {
    /// Create a compute error carrying the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The failure message supplied by the compute function.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<StoreError> for ComputeError {
    /// Compute functions commonly read their dependencies back through the
    /// store; `?` on those reads turns the store error into a compute error.
    fn from(err: StoreError) -> Self {
        ComputeError::new(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_carry_their_key() {
        let err = StoreError::AlreadyExists("count".into());
        assert_eq!(err.key(), "count");

        let err = StoreError::NotFound("missing".into());
        assert_eq!(err.key(), "missing");

        let err = StoreError::ComputeFailure {
            key: "total".into(),
            source: ComputeError::new("division by zero"),
        };
        assert_eq!(err.key(), "total");
    }

    #[test]
    fn compute_failure_exposes_source() {
        use std::error::Error as _;

        let err = StoreError::ComputeFailure {
            key: "total".into(),
            source: ComputeError::new("division by zero"),
        };
        let source = err.source().expect("compute failure has a source");
        assert_eq!(source.to_string(), "division by zero");
    }
}
