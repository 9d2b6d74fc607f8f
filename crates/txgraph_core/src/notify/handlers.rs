//! Per-object and per-collection event handlers.

use crate::domain_object::DomainObject;
use crate::error::TxResult;
use crate::transaction::ClientTransaction;
use txgraph_model::Value;

/// Receives events about one object.
///
/// Handlers are registered per object reference and fire in whichever
/// transaction of the hierarchy the event happens. Pre-events may veto.
#[allow(unused_variables)]
pub trait DomainObjectEventHandler: Send + Sync {
    /// A property is about to change.
    fn property_changing(
        &self,
        tx: &mut ClientTransaction<'_>,
        object: &DomainObject,
        property: &str,
        old: &Value,
        new: &Value,
    ) -> TxResult<()> {
        Ok(())
    }

    /// A property changed.
    fn property_changed(
        &self,
        tx: &mut ClientTransaction<'_>,
        object: &DomainObject,
        property: &str,
        old: &Value,
        new: &Value,
    ) {
    }

    /// A relation end point of the object is about to change.
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

    /// A relation end point of the object changed.
    fn relation_changed(
        &self,
        tx: &mut ClientTransaction<'_>,
        object: &DomainObject,
        property: &str,
        old: Option<&DomainObject>,
        new: Option<&DomainObject>,
    ) {
    }

    /// The object is about to be deleted.
    fn deleting(&self, tx: &mut ClientTransaction<'_>, object: &DomainObject) -> TxResult<()> {
        Ok(())
    }

    /// The object was deleted.
    fn deleted(&self, tx: &mut ClientTransaction<'_>, object: &DomainObject) {}

    /// The object is about to be committed.
    fn committing(&self, tx: &mut ClientTransaction<'_>, object: &DomainObject) -> TxResult<()> {
        Ok(())
    }

    /// The object was committed.
    fn committed(&self, tx: &mut ClientTransaction<'_>, object: &DomainObject) {}

    /// The object is about to be rolled back.
    fn rolling_back(&self, tx: &mut ClientTransaction<'_>, object: &DomainObject) -> TxResult<()> {
        Ok(())
    }

    /// The object was rolled back.
    fn rolled_back(&self, tx: &mut ClientTransaction<'_>, object: &DomainObject) {}
}

/// Receives membership events of one collection end point.
#[allow(unused_variables)]
pub trait CollectionEventHandler: Send + Sync {
    /// `item` is about to join the collection.
    fn adding(
        &self,
        tx: &mut ClientTransaction<'_>,
        owner: &DomainObject,
        property: &str,
        item: &DomainObject,
    ) -> TxResult<()> {
        Ok(())
    }

    /// `item` joined the collection.
    fn added(
        &self,
        tx: &mut ClientTransaction<'_>,
        owner: &DomainObject,
        property: &str,
        item: &DomainObject,
    ) {
    }

    /// `item` is about to leave the collection.
    fn removing(
        &self,
        tx: &mut ClientTransaction<'_>,
        owner: &DomainObject,
        property: &str,
        item: &DomainObject,
    ) -> TxResult<()> {
        Ok(())
    }

    /// `item` left the collection.
    fn removed(
        &self,
        tx: &mut ClientTransaction<'_>,
        owner: &DomainObject,
        property: &str,
        item: &DomainObject,
    ) {
    }
}
