//! Core type definitions for the transaction engine.

use std::fmt;

/// Unique identifier for a transaction.
///
/// Transaction IDs are monotonically increasing and never reused within an
/// engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Creates a new transaction ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn:{}", self.0)
    }
}

/// Identity of one in-memory object reference.
///
/// Two references are the same object exactly when their handles are equal.
/// A transaction hierarchy shares handles; independent roots mint their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectHandle(pub u64);

impl ObjectHandle {
    /// Returns the raw handle value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj:{}", self.0)
    }
}

/// The flavor of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    /// Top-level transaction backed by storage.
    Root,
    /// Nested transaction backed by its parent.
    Sub,
    /// Root variant whose objects are bound to it.
    Binding,
}

impl TransactionKind {
    /// Returns whether this transaction talks to storage directly.
    #[must_use]
    pub const fn is_root(self) -> bool {
        matches!(self, Self::Root | Self::Binding)
    }
}

/// Lifecycle state of an object as seen by one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectState {
    /// The transaction knows the ID but holds no data for it yet.
    NotLoadedYet,
    /// Created in this transaction and not yet committed.
    New,
    /// Loaded and identical to its committed values.
    Unchanged,
    /// A property or relation differs from its committed value, or the
    /// object was explicitly marked as changed.
    Changed,
    /// Deleted in this transaction.
    Deleted,
    /// Unusable in this transaction.
    Invalid,
}

impl ObjectState {
    /// Returns whether a commit has work to do for this state.
    #[must_use]
    pub const fn is_dirty(self) -> bool {
        matches!(self, Self::New | Self::Changed | Self::Deleted)
    }
}

impl fmt::Display for ObjectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotLoadedYet => "NotLoadedYet",
            Self::New => "New",
            Self::Unchanged => "Unchanged",
            Self::Changed => "Changed",
            Self::Deleted => "Deleted",
            Self::Invalid => "Invalid",
        };
        f.write_str(name)
    }
}

/// Which value of a property or relation is being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueAccess {
    /// The value as modified in this transaction.
    Current,
    /// The value as last committed into this transaction.
    Original,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_id_ordering() {
        assert!(TransactionId::new(1) < TransactionId::new(2));
        assert_eq!(format!("{}", TransactionId::new(7)), "txn:7");
    }

    #[test]
    fn dirty_states() {
        assert!(ObjectState::New.is_dirty());
        assert!(ObjectState::Changed.is_dirty());
        assert!(ObjectState::Deleted.is_dirty());
        assert!(!ObjectState::Unchanged.is_dirty());
        assert!(!ObjectState::Invalid.is_dirty());
    }

    #[test]
    fn binding_counts_as_root() {
        assert!(TransactionKind::Binding.is_root());
        assert!(!TransactionKind::Sub.is_root());
    }
}
