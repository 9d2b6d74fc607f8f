//! Internal transaction listeners.

use super::extension::TransactionExtension;
use crate::data::DataContainer;
use crate::domain_object::DomainObject;
use crate::endpoint::RelationEndPoint;
use crate::error::TxResult;
use crate::transaction::ClientTransaction;
use crate::types::{ObjectState, TransactionId, ValueAccess};
use crate::validation::PersistableData;
use std::sync::Arc;
use tracing::trace;
use txgraph_model::{ClassId, ObjectId, RelationEndPointId, Value};

/// An observer of everything that happens inside one transaction.
///
/// Listeners see the extension events plus registration in the data
/// container and end point maps and state updates. They run before the
/// extensions of the same transaction, in the order they were added.
#[allow(unused_variables)]
pub trait TransactionListener: Send + Sync {
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

    /// A relation was read.
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

    /// Objects are about to be committed.
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

    /// A data container is about to enter the map.
    fn data_container_map_registering(
        &self,
        tx: &mut ClientTransaction<'_>,
        container: &DataContainer,
    ) {
    }

    /// A data container entered the map.
    fn data_container_map_registered(&self, tx: &mut ClientTransaction<'_>, id: &ObjectId) {}

    /// A data container is leaving the map.
    fn data_container_map_unregistering(&self, tx: &mut ClientTransaction<'_>, id: &ObjectId) {}

    /// A data container left the map.
    fn data_container_map_unregistered(&self, tx: &mut ClientTransaction<'_>, id: &ObjectId) {}

    /// An end point is about to enter the map.
    fn relation_end_point_map_registering(
        &self,
        tx: &mut ClientTransaction<'_>,
        end_point: &RelationEndPoint,
    ) {
    }

    /// An end point is leaving the map.
    fn relation_end_point_map_unregistering(
        &self,
        tx: &mut ClientTransaction<'_>,
        id: &RelationEndPointId,
    ) {
    }

    /// The state of an object changed.
    fn data_container_state_updated(
        &self,
        tx: &mut ClientTransaction<'_>,
        id: &ObjectId,
        state: ObjectState,
    ) {
    }

    /// A virtual end point became changed or unchanged.
    fn virtual_relation_end_point_state_updated(
        &self,
        tx: &mut ClientTransaction<'_>,
        id: &RelationEndPointId,
        changed: bool,
    ) {
    }
}

/// Forwards the public events to a [`TransactionExtension`].
pub(crate) struct ExtensionListener(pub(crate) Arc<dyn TransactionExtension>);

impl TransactionListener for ExtensionListener {
    fn transaction_discard(&self, tx: &mut ClientTransaction<'_>) {
        self.0.transaction_discard(tx);
    }

    fn sub_transaction_creating(&self, tx: &mut ClientTransaction<'_>) -> TxResult<()> {
        self.0.sub_transaction_creating(tx)
    }

    fn sub_transaction_created(&self, tx: &mut ClientTransaction<'_>, sub: TransactionId) {
        self.0.sub_transaction_created(tx, sub);
    }

    fn new_object_creating(&self, tx: &mut ClientTransaction<'_>, class: &ClassId) -> TxResult<()> {
        self.0.new_object_creating(tx, class)
    }

    fn objects_loading(&self, tx: &mut ClientTransaction<'_>, ids: &[ObjectId]) {
        self.0.objects_loading(tx, ids);
    }

    fn objects_loaded(&self, tx: &mut ClientTransaction<'_>, objects: &[DomainObject]) {
        self.0.objects_loaded(tx, objects);
    }

    fn objects_not_found(&self, tx: &mut ClientTransaction<'_>, ids: &[ObjectId]) {
        self.0.objects_not_found(tx, ids);
    }

    fn objects_unloading(
        &self,
        tx: &mut ClientTransaction<'_>,
        objects: &[DomainObject],
    ) -> TxResult<()> {
        self.0.objects_unloading(tx, objects)
    }

    fn objects_unloaded(&self, tx: &mut ClientTransaction<'_>, objects: &[DomainObject]) {
        self.0.objects_unloaded(tx, objects);
    }

    fn object_deleting(
        &self,
        tx: &mut ClientTransaction<'_>,
        object: &DomainObject,
    ) -> TxResult<()> {
        self.0.object_deleting(tx, object)
    }

    fn object_deleted(&self, tx: &mut ClientTransaction<'_>, object: &DomainObject) {
        self.0.object_deleted(tx, object);
    }

    fn property_value_reading(
        &self,
        tx: &mut ClientTransaction<'_>,
        object: &DomainObject,
        property: &str,
        access: ValueAccess,
    ) {
        self.0.property_value_reading(tx, object, property, access);
    }

    fn property_value_read(
        &self,
        tx: &mut ClientTransaction<'_>,
        object: &DomainObject,
        property: &str,
        value: &Value,
        access: ValueAccess,
    ) {
        self.0
            .property_value_read(tx, object, property, value, access);
    }

    fn property_value_changing(
        &self,
        tx: &mut ClientTransaction<'_>,
        object: &DomainObject,
        property: &str,
        old: &Value,
        new: &Value,
    ) -> TxResult<()> {
        self.0
            .property_value_changing(tx, object, property, old, new)
    }

    fn property_value_changed(
        &self,
        tx: &mut ClientTransaction<'_>,
        object: &DomainObject,
        property: &str,
        old: &Value,
        new: &Value,
    ) {
        self.0
            .property_value_changed(tx, object, property, old, new);
    }

    fn relation_reading(
        &self,
        tx: &mut ClientTransaction<'_>,
        object: &DomainObject,
        property: &str,
        access: ValueAccess,
    ) {
        self.0.relation_reading(tx, object, property, access);
    }

    fn relation_read(
        &self,
        tx: &mut ClientTransaction<'_>,
        object: &DomainObject,
        property: &str,
        related: &[DomainObject],
        access: ValueAccess,
    ) {
        self.0.relation_read(tx, object, property, related, access);
    }

    fn relation_changing(
        &self,
        tx: &mut ClientTransaction<'_>,
        object: &DomainObject,
        property: &str,
        old: Option<&DomainObject>,
        new: Option<&DomainObject>,
    ) -> TxResult<()> {
        self.0.relation_changing(tx, object, property, old, new)
    }

    fn relation_changed(
        &self,
        tx: &mut ClientTransaction<'_>,
        object: &DomainObject,
        property: &str,
        old: Option<&DomainObject>,
        new: Option<&DomainObject>,
    ) {
        self.0.relation_changed(tx, object, property, old, new);
    }

    fn committing(&self, tx: &mut ClientTransaction<'_>, objects: &[DomainObject]) -> TxResult<()> {
        self.0.committing(tx, objects)
    }

    fn commit_validate(
        &self,
        tx: &mut ClientTransaction<'_>,
        data: &[PersistableData],
    ) -> TxResult<()> {
        self.0.commit_validate(tx, data)
    }

    fn committed(&self, tx: &mut ClientTransaction<'_>, objects: &[DomainObject]) {
        self.0.committed(tx, objects);
    }

    fn rolling_back(
        &self,
        tx: &mut ClientTransaction<'_>,
        objects: &[DomainObject],
    ) -> TxResult<()> {
        self.0.rolling_back(tx, objects)
    }

    fn rolled_back(&self, tx: &mut ClientTransaction<'_>, objects: &[DomainObject]) {
        self.0.rolled_back(tx, objects);
    }
}

/// Traces every event of a transaction at `TRACE` level.
#[derive(Debug, Default)]
pub struct LoggingListener;

impl TransactionListener for LoggingListener {
    fn transaction_discard(&self, tx: &mut ClientTransaction<'_>) {
        trace!(tx = %tx.id(), "transaction discard");
    }

    fn sub_transaction_created(&self, tx: &mut ClientTransaction<'_>, sub: TransactionId) {
        trace!(tx = %tx.id(), sub = %sub, "sub-transaction created");
    }

    fn new_object_creating(&self, tx: &mut ClientTransaction<'_>, class: &ClassId) -> TxResult<()> {
        trace!(tx = %tx.id(), class = %class, "new object creating");
        Ok(())
    }

    fn objects_loading(&self, tx: &mut ClientTransaction<'_>, ids: &[ObjectId]) {
        trace!(tx = %tx.id(), count = ids.len(), "objects loading");
    }

    fn objects_not_found(&self, tx: &mut ClientTransaction<'_>, ids: &[ObjectId]) {
        trace!(tx = %tx.id(), ids = ?ids, "objects not found");
    }

    fn objects_unloaded(&self, tx: &mut ClientTransaction<'_>, objects: &[DomainObject]) {
        trace!(tx = %tx.id(), objects = ?objects, "objects unloaded");
    }

    fn object_deleting(
        &self,
        tx: &mut ClientTransaction<'_>,
        object: &DomainObject,
    ) -> TxResult<()> {
        trace!(tx = %tx.id(), object = %object, "object deleting");
        Ok(())
    }

    fn property_value_changing(
        &self,
        tx: &mut ClientTransaction<'_>,
        object: &DomainObject,
        property: &str,
        old: &Value,
        new: &Value,
    ) -> TxResult<()> {
        trace!(tx = %tx.id(), object = %object, property, %old, %new, "property value changing");
        Ok(())
    }

    fn relation_changing(
        &self,
        tx: &mut ClientTransaction<'_>,
        object: &DomainObject,
        property: &str,
        old: Option<&DomainObject>,
        new: Option<&DomainObject>,
    ) -> TxResult<()> {
        trace!(tx = %tx.id(), object = %object, property, ?old, ?new, "relation changing");
        Ok(())
    }

    fn committing(&self, tx: &mut ClientTransaction<'_>, objects: &[DomainObject]) -> TxResult<()> {
        trace!(tx = %tx.id(), count = objects.len(), "committing");
        Ok(())
    }

    fn committed(&self, tx: &mut ClientTransaction<'_>, objects: &[DomainObject]) {
        trace!(tx = %tx.id(), count = objects.len(), "committed");
    }

    fn rolling_back(
        &self,
        tx: &mut ClientTransaction<'_>,
        objects: &[DomainObject],
    ) -> TxResult<()> {
        trace!(tx = %tx.id(), count = objects.len(), "rolling back");
        Ok(())
    }

    fn rolled_back(&self, tx: &mut ClientTransaction<'_>, objects: &[DomainObject]) {
        trace!(tx = %tx.id(), count = objects.len(), "rolled back");
    }

    fn data_container_map_registering(
        &self,
        tx: &mut ClientTransaction<'_>,
        container: &DataContainer,
    ) {
        trace!(tx = %tx.id(), object = %container.id(), "data container registering");
    }

    fn data_container_map_unregistering(&self, tx: &mut ClientTransaction<'_>, id: &ObjectId) {
        trace!(tx = %tx.id(), object = %id, "data container unregistering");
    }

    fn relation_end_point_map_registering(
        &self,
        tx: &mut ClientTransaction<'_>,
        end_point: &RelationEndPoint,
    ) {
        trace!(tx = %tx.id(), end_point = %end_point.id(), "end point registering");
    }

    fn relation_end_point_map_unregistering(
        &self,
        tx: &mut ClientTransaction<'_>,
        id: &RelationEndPointId,
    ) {
        trace!(tx = %tx.id(), end_point = %id, "end point unregistering");
    }

    fn data_container_state_updated(
        &self,
        tx: &mut ClientTransaction<'_>,
        id: &ObjectId,
        state: ObjectState,
    ) {
        trace!(tx = %tx.id(), object = %id, %state, "state updated");
    }
}
