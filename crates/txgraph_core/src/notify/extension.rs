//! User-visible transaction extensions.

use crate::domain_object::DomainObject;
use crate::error::{TxError, TxResult};
use crate::transaction::ClientTransaction;
use crate::types::{TransactionId, ValueAccess};
use crate::validation::PersistableData;
use std::fmt;
use std::sync::Arc;
use txgraph_model::{ClassId, ObjectId, Value};

/// An observer attached to one transaction under a unique key.
///
/// Every callback has a no-op default. Callbacks whose name ends in `-ing`
/// run before the operation and may veto it by returning an error; the
/// operation then does not happen. Callbacks whose name ends in `-ed` run
/// afterwards and cannot fail.
///
/// Callbacks receive the transaction the event happens in and may use it.
/// Extensions are never inherited by sub-transactions.
#[allow(unused_variables)]
pub trait TransactionExtension: Send + Sync {
    /// Returns the unique key of this extension.
    fn key(&self) -> &str;

    /// The transaction is being discarded.
    fn transaction_discard(&self, tx: &mut ClientTransaction<'_>) {}

    /// A sub-transaction is about to be created.
    fn sub_transaction_creating(&self, tx: &mut ClientTransaction<'_>) -> TxResult<()> {
        Ok(())
    }

    /// A sub-transaction was created.
    fn sub_transaction_created(&self, tx: &mut ClientTransaction<'_>, sub: TransactionId) {}

    /// An object of `class` is about to be created.
    fn new_object_creating(&self, tx: &mut ClientTransaction<'_>, class: &ClassId) -> TxResult<()> {
        Ok(())
    }

    /// Objects are about to be loaded.
    fn objects_loading(&self, tx: &mut ClientTransaction<'_>, ids: &[ObjectId]) {}

    /// Objects were loaded.
    fn objects_loaded(&self, tx: &mut ClientTransaction<'_>, objects: &[DomainObject]) {}

    /// Objects were requested but do not exist.
    fn objects_not_found(&self, tx: &mut ClientTransaction<'_>, ids: &[ObjectId]) {}

    /// Objects are about to be unloaded.
    fn objects_unloading(
        &self,
        tx: &mut ClientTransaction<'_>,
        objects: &[DomainObject],
    ) -> TxResult<()> {
        Ok(())
    }

    /// Objects were unloaded.
    fn objects_unloaded(&self, tx: &mut ClientTransaction<'_>, objects: &[DomainObject]) {}

    /// An object is about to be deleted.
    fn object_deleting(
        &self,
        tx: &mut ClientTransaction<'_>,
        object: &DomainObject,
    ) -> TxResult<()> {
        Ok(())
    }

    /// An object was deleted.
    fn object_deleted(&self, tx: &mut ClientTransaction<'_>, object: &DomainObject) {}

    /// A property value is about to be read.
    fn property_value_reading(
        &self,
        tx: &mut ClientTransaction<'_>,
        object: &DomainObject,
        property: &str,
        access: ValueAccess,
    ) {
    }

    /// A property value was read.
    fn property_value_read(
        &self,
        tx: &mut ClientTransaction<'_>,
        object: &DomainObject,
        property: &str,
        value: &Value,
        access: ValueAccess,
    ) {
    }

    /// A property value is about to change.
    fn property_value_changing(
        &self,
        tx: &mut ClientTransaction<'_>,
        object: &DomainObject,
        property: &str,
        old: &Value,
        new: &Value,
    ) -> TxResult<()> {
        Ok(())
    }

    /// A property value changed.
    fn property_value_changed(
        &self,
        tx: &mut ClientTransaction<'_>,
        object: &DomainObject,
        property: &str,
        old: &Value,
        new: &Value,
    ) {
    }

    /// A relation is about to be read.
    fn relation_reading(
        &self,
        tx: &mut ClientTransaction<'_>,
        object: &DomainObject,
        property: &str,
        access: ValueAccess,
    ) {
    }

    /// A relation was read. Scalar relations report at most one object.
    fn relation_read(
        &self,
        tx: &mut ClientTransaction<'_>,
        object: &DomainObject,
        property: &str,
        related: &[DomainObject],
        access: ValueAccess,
    ) {
    }

    /// A relation end point is about to change.
    fn relation_changing(
        &self,
        tx: &mut ClientTransaction<'_>,
        object: &DomainObject,
        property: &str,
        old: Option<&DomainObject>,
        new: Option<&DomainObject>,
    ) -> TxResult<()> {
        Ok(())
    }

    /// A relation end point changed.
    fn relation_changed(
        &self,
        tx: &mut ClientTransaction<'_>,
        object: &DomainObject,
        property: &str,
        old: Option<&DomainObject>,
        new: Option<&DomainObject>,
    ) {
    }

    /// Objects are about to be committed. May run more than once per commit.
    fn committing(&self, tx: &mut ClientTransaction<'_>, objects: &[DomainObject]) -> TxResult<()> {
        Ok(())
    }

    /// The final set of changes is about to be committed.
    fn commit_validate(
        &self,
        tx: &mut ClientTransaction<'_>,
        data: &[PersistableData],
    ) -> TxResult<()> {
        Ok(())
    }

    /// Objects were committed.
    fn committed(&self, tx: &mut ClientTransaction<'_>, objects: &[DomainObject]) {}

    /// Objects are about to be rolled back.
    fn rolling_back(
        &self,
        tx: &mut ClientTransaction<'_>,
        objects: &[DomainObject],
    ) -> TxResult<()> {
        Ok(())
    }

    /// Objects were rolled back.
    fn rolled_back(&self, tx: &mut ClientTransaction<'_>, objects: &[DomainObject]) {}
}

/// The keyed extensions of one transaction, in insertion order.
#[derive(Default, Clone)]
pub struct ExtensionCollection {
    entries: Vec<Arc<dyn TransactionExtension>>,
}

impl ExtensionCollection {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an extension.
    ///
    /// # Errors
    ///
    /// Fails if an extension with the same key is present.
    pub fn add(&mut self, extension: Arc<dyn TransactionExtension>) -> TxResult<()> {
        if self.get(extension.key()).is_some() {
            return Err(TxError::invalid_operation(format!(
                "an extension with key '{}' is already registered",
                extension.key()
            )));
        }
        self.entries.push(extension);
        Ok(())
    }

    /// Removes the extension with `key`; returns whether one was removed.
    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.key() != key);
        before != self.entries.len()
    }

    /// Returns the extension with `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Arc<dyn TransactionExtension>> {
        self.entries.iter().find(|e| e.key() == key)
    }

    /// Returns the keys in insertion order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.key().to_string()).collect()
    }

    /// Returns the number of extensions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether no extension is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the extensions in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn TransactionExtension>> {
        self.entries.iter()
    }
}

impl fmt::Debug for ExtensionCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionCollection")
            .field("keys", &self.keys())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    impl TransactionExtension for Named {
        fn key(&self) -> &str {
            self.0
        }
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let mut extensions = ExtensionCollection::new();
        extensions.add(Arc::new(Named("audit"))).unwrap();
        let err = extensions.add(Arc::new(Named("audit"))).unwrap_err();
        assert!(matches!(err, TxError::InvalidOperation { .. }));
        assert_eq!(extensions.len(), 1);
    }

    #[test]
    fn removal_is_idempotent() {
        let mut extensions = ExtensionCollection::new();
        extensions.add(Arc::new(Named("a"))).unwrap();
        extensions.add(Arc::new(Named("b"))).unwrap();
        assert!(extensions.remove("a"));
        assert!(!extensions.remove("a"));
        assert_eq!(extensions.keys(), vec!["b".to_string()]);
    }
}
