//! Error types for the transaction engine.

use crate::types::TransactionId;
use std::fmt;
use thiserror::Error;
use txgraph_model::{ModelError, ObjectId, Value};
use txgraph_storage::StorageError;

/// Result type for engine operations.
pub type TxResult<T> = Result<T, TxError>;

/// Which side of an operation violated transaction membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrossTransactionViolation {
    /// The object was loaded or created in another hierarchy and never enlisted.
    NotEnlisted {
        /// The offending object.
        id: ObjectId,
        /// Transaction the operation ran in.
        transaction: TransactionId,
    },
    /// The object belongs to a binding transaction other than the current one.
    Bound {
        /// The offending object.
        id: ObjectId,
        /// Transaction the operation ran in.
        transaction: TransactionId,
    },
    /// A binding transaction was asked to enlist a foreign object.
    BindingEnlist {
        /// The offending object.
        id: ObjectId,
        /// The binding transaction.
        transaction: TransactionId,
    },
    /// The object to be related is bound to a binding transaction.
    ObjectBound {
        /// The object to be related.
        id: ObjectId,
        /// The object owning the relation.
        owner: ObjectId,
    },
    /// The owning object is bound to a binding transaction.
    OwnerBound {
        /// The object to be related.
        id: ObjectId,
        /// The object owning the relation.
        owner: ObjectId,
    },
    /// Both objects are bound, to different binding transactions.
    BoundToDifferent {
        /// The object to be related.
        id: ObjectId,
        /// The object owning the relation.
        owner: ObjectId,
    },
}

impl fmt::Display for CrossTransactionViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotEnlisted { id, transaction } => write!(
                f,
                "object '{id}' cannot be used in {transaction}: it was loaded or created in another transaction"
            ),
            Self::Bound { id, transaction } => write!(
                f,
                "object '{id}' cannot be used in {transaction}: it is bound to a BindingClientTransaction"
            ),
            Self::BindingEnlist { id, transaction } => write!(
                f,
                "cannot enlist object '{id}' in binding transaction {transaction}: it was loaded or created in another transaction"
            ),
            Self::ObjectBound { id, owner } => write!(
                f,
                "cannot relate '{id}' to '{owner}': the objects do not belong to the same transaction; the object '{id}' is bound to a BindingClientTransaction"
            ),
            Self::OwnerBound { id, owner } => write!(
                f,
                "cannot relate '{id}' to '{owner}': the objects do not belong to the same transaction; the owning object '{owner}' is bound to a BindingClientTransaction"
            ),
            Self::BoundToDifferent { id, owner } => write!(
                f,
                "cannot relate '{id}' to '{owner}': the objects are bound to different BindingClientTransactions"
            ),
        }
    }
}

/// Errors raised by the transaction engine.
///
/// None of these are retried internally. The caller recovers by fixing the
/// condition, or by rolling back or discarding the transaction.
#[derive(Debug, Error)]
pub enum TxError {
    /// Mutation attempted on a transaction that currently may not change.
    #[error("{transaction} is read-only: {reason}")]
    ReadOnly {
        /// The read-only transaction.
        transaction: TransactionId,
        /// Why it is read-only.
        reason: String,
    },

    /// The transaction was discarded.
    #[error("{transaction} has been discarded")]
    Discarded {
        /// The discarded transaction.
        transaction: TransactionId,
    },

    /// No transaction with this ID exists.
    #[error("{transaction} does not exist")]
    UnknownTransaction {
        /// The missing transaction.
        transaction: TransactionId,
    },

    /// The object is invalid in this transaction; terminal for its ID.
    #[error("object '{id}' is invalid in this transaction")]
    ObjectInvalid {
        /// The invalid object.
        id: ObjectId,
    },

    /// The object is deleted and the operation needs a live object.
    #[error("object '{id}' is already deleted")]
    ObjectDeleted {
        /// The deleted object.
        id: ObjectId,
    },

    /// One or more objects are missing from storage.
    #[error("object(s) could not be loaded: {}", join_ids(.ids))]
    ObjectsNotFound {
        /// Every missing ID.
        ids: Vec<ObjectId>,
    },

    /// Objects from different transactions were mixed.
    #[error("{violation}")]
    CrossTransaction {
        /// Which side violated membership.
        violation: CrossTransactionViolation,
    },

    /// A mandatory relation was not set when committing.
    #[error("mandatory relation property '{property}' of object '{id}' is not set")]
    MandatoryRelationNotSet {
        /// The offending object.
        id: ObjectId,
        /// The relation property.
        property: String,
    },

    /// The value does not fit the property definition.
    #[error("value {value} is not valid for property '{property}' of object '{id}'")]
    TypeMismatch {
        /// The object.
        id: ObjectId,
        /// The property.
        property: String,
        /// The rejected value.
        value: Value,
    },

    /// An observer rejected the operation.
    #[error("operation vetoed by '{observer}': {reason}")]
    Vetoed {
        /// Key or name of the observer.
        observer: String,
        /// Reason given by the observer.
        reason: String,
    },

    /// Committing observers kept dirtying new objects.
    #[error("commit did not reach a fixed point after {passes} passes")]
    CommitLoopLimit {
        /// Number of committing passes run.
        passes: usize,
    },

    /// The class has no property or relation with this name.
    #[error("class '{class}' has no property '{property}'")]
    UnknownProperty {
        /// Name of the class.
        class: String,
        /// Name of the property.
        property: String,
    },

    /// Storage changed since the committed objects were loaded.
    #[error("concurrency violation for object(s): {}", join_ids(.ids))]
    ConcurrencyViolation {
        /// Every ID that conflicted.
        ids: Vec<ObjectId>,
    },

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// Mapping lookup failed.
    #[error("mapping error: {0}")]
    Model(#[source] ModelError),

    /// Storage provider failed.
    #[error("storage error: {0}")]
    Storage(#[source] StorageError),
}

impl From<ModelError> for TxError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::UnknownProperty { class, property } => {
                Self::UnknownProperty { class, property }
            }
            other => Self::Model(other),
        }
    }
}

impl From<StorageError> for TxError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ObjectsNotFound { ids } => Self::ObjectsNotFound { ids },
            StorageError::ConcurrencyViolation { ids } => Self::ConcurrencyViolation { ids },
            StorageError::Model(err) => err.into(),
            other => Self::Storage(other),
        }
    }
}

impl TxError {
    /// Creates a read-only error.
    pub fn read_only(transaction: TransactionId, reason: impl Into<String>) -> Self {
        Self::ReadOnly {
            transaction,
            reason: reason.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates the error an observer returns to veto an operation.
    pub fn vetoed(observer: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Vetoed {
            observer: observer.into(),
            reason: reason.into(),
        }
    }

    /// Creates a cross-transaction error.
    pub fn cross_transaction(violation: CrossTransactionViolation) -> Self {
        Self::CrossTransaction { violation }
    }
}

fn join_ids(ids: &[ObjectId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
