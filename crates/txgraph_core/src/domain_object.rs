//! Object references handed out by transactions.

use crate::types::{ObjectHandle, TransactionId};
use std::fmt;
use std::hash::{Hash, Hasher};
use txgraph_model::{ClassId, ObjectId};

/// A reference to one in-memory object.
///
/// The reference carries no data; every read and write goes through a
/// transaction. Equality and hashing use the handle, so two references with
/// the same [`ObjectId`] obtained from independent root transactions are
/// different objects.
#[derive(Clone)]
pub struct DomainObject {
    id: ObjectId,
    handle: ObjectHandle,
    binding: Option<TransactionId>,
}

impl DomainObject {
    pub(crate) fn new(id: ObjectId, handle: ObjectHandle, binding: Option<TransactionId>) -> Self {
        Self {
            id,
            handle,
            binding,
        }
    }

    /// Returns the object ID.
    #[must_use]
    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    /// Returns the class of the object.
    #[must_use]
    pub fn class_id(&self) -> &ClassId {
        self.id.class_id()
    }

    /// Returns the in-memory identity.
    #[must_use]
    pub fn handle(&self) -> ObjectHandle {
        self.handle
    }

    /// Returns the binding transaction this object is bound to, if any.
    #[must_use]
    pub fn binding_transaction(&self) -> Option<TransactionId> {
        self.binding
    }

    /// Returns whether this object is bound to a binding transaction.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }
}

impl PartialEq for DomainObject {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl Eq for DomainObject {}

impl Hash for DomainObject {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.handle.hash(state);
    }
}

impl fmt::Debug for DomainObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DomainObject({}, {})", self.id, self.handle)
    }
}

impl fmt::Display for DomainObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.id, f)
    }
}
