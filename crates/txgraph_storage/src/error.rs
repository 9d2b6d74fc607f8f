//! Storage error types.

use thiserror::Error;
use txgraph_model::{ModelError, ObjectId};

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// One or more requested objects do not exist.
    #[error("object(s) could not be found: {}", join_ids(.ids))]
    ObjectsNotFound {
        /// Every ID that was missing.
        ids: Vec<ObjectId>,
    },

    /// Stored data changed since it was loaded, or a new object already exists.
    #[error("concurrency violation for object(s): {}", join_ids(.ids))]
    ConcurrencyViolation {
        /// Every ID that conflicted.
        ids: Vec<ObjectId>,
    },

    /// A query or relation load was malformed.
    #[error("invalid query: {message}")]
    InvalidQuery {
        /// Description of the problem.
        message: String,
    },

    /// Stored data contradicts the mapping.
    #[error("inconsistent stored data: {message}")]
    Inconsistent {
        /// Description of the problem.
        message: String,
    },

    /// Mapping lookup failed.
    #[error("mapping error: {0}")]
    Model(#[from] ModelError),

    /// JSON snapshot could not be read or written.
    #[error("snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

impl StorageError {
    /// Creates an invalid query error.
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            message: message.into(),
        }
    }

    /// Creates an inconsistent data error.
    pub fn inconsistent(message: impl Into<String>) -> Self {
        Self::Inconsistent {
            message: message.into(),
        }
    }
}

pub(crate) fn join_ids(ids: &[ObjectId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
