//! The `ClientTransaction` scope.

use crate::domain_object::DomainObject;
use crate::engine::Engine;
use crate::error::TxResult;
use crate::notify::{TransactionExtension, TransactionListener};
use crate::types::{ObjectState, TransactionId, TransactionKind};
use crate::validation::CommitValidator;
use std::sync::Arc;
use txgraph_model::{ClassId, ObjectId, RelationEndPointId, Value};
use txgraph_storage::{CollectionQuery, Timestamp};

/// An engine borrowed for one transaction.
///
/// Every method forwards to the [`Engine`] method of the same name with this
/// scope's transaction. Observers receive a scope for the transaction an
/// event happened in, so they can read and modify objects while it runs.
///
/// # Example
///
/// ```
/// # use std::sync::Arc;
/// # use txgraph_core::Engine;
/// # use txgraph_model::{
/// #     ClassDefinition, MappingConfiguration, ObjectId, PropertyDefinition, PropertyType, Value,
/// # };
/// # use txgraph_storage::InMemoryStore;
/// # let mapping = Arc::new(MappingConfiguration::builder()
/// #     .class(ClassDefinition::new("Order")
/// #         .with_property(PropertyDefinition::new("OrderNumber", PropertyType::Integer)))
/// #     .build().unwrap());
/// # let store = InMemoryStore::new(Arc::clone(&mapping));
/// # store.insert(&ObjectId::integer("Order", 1), [("OrderNumber", Value::Integer(1))]).unwrap();
/// let mut engine = Engine::new(Arc::new(store), mapping);
/// let root = engine.create_root_transaction();
///
/// let mut tx = engine.transaction(root);
/// let order = tx.get_object(&ObjectId::integer("Order", 1), false).unwrap();
/// tx.set_value(&order, "OrderNumber", 2).unwrap();
/// tx.commit().unwrap();
/// ```
pub struct ClientTransaction<'e> {
    engine: &'e mut Engine,
    id: TransactionId,
}

impl<'e> ClientTransaction<'e> {
    pub(crate) fn new(engine: &'e mut Engine, id: TransactionId) -> Self {
        Self { engine, id }
    }

    /// Returns the transaction this scope runs in.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the underlying engine.
    pub fn engine(&mut self) -> &mut Engine {
        self.engine
    }

    // =========================================================================
    // Hierarchy
    // =========================================================================

    /// See [`Engine::create_sub_transaction`].
    pub fn create_sub_transaction(&mut self) -> TxResult<TransactionId> {
        self.engine.create_sub_transaction(self.id)
    }

    /// See [`Engine::discard`].
    pub fn discard(&mut self) -> TxResult<()> {
        self.engine.discard(self.id)
    }

    /// See [`Engine::parent_transaction`].
    pub fn parent_transaction(&self) -> TxResult<Option<TransactionId>> {
        self.engine.parent_transaction(self.id)
    }

    /// See [`Engine::sub_transaction`].
    pub fn sub_transaction(&self) -> TxResult<Option<TransactionId>> {
        self.engine.sub_transaction(self.id)
    }

    /// See [`Engine::root_transaction`].
    pub fn root_transaction(&self) -> TxResult<TransactionId> {
        self.engine.root_transaction(self.id)
    }

    /// See [`Engine::leaf_transaction`].
    pub fn leaf_transaction(&self) -> TxResult<TransactionId> {
        self.engine.leaf_transaction(self.id)
    }

    /// See [`Engine::transaction_kind`].
    pub fn kind(&self) -> TxResult<TransactionKind> {
        self.engine.transaction_kind(self.id)
    }

    /// See [`Engine::is_read_only`].
    pub fn is_read_only(&self) -> TxResult<bool> {
        self.engine.is_read_only(self.id)
    }

    /// See [`Engine::is_discarded`].
    #[must_use]
    pub fn is_discarded(&self) -> bool {
        self.engine.is_discarded(self.id)
    }

    /// See [`Engine::is_active`].
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.engine.is_active(self.id)
    }

    // =========================================================================
    // Observers
    // =========================================================================

    /// See [`Engine::add_extension`].
    pub fn add_extension(&mut self, extension: Arc<dyn TransactionExtension>) -> TxResult<()> {
        self.engine.add_extension(self.id, extension)
    }

    /// See [`Engine::remove_extension`].
    pub fn remove_extension(&mut self, key: &str) -> TxResult<bool> {
        self.engine.remove_extension(self.id, key)
    }

    /// See [`Engine::extensions`].
    pub fn extensions(&self) -> TxResult<Vec<String>> {
        self.engine.extensions(self.id)
    }

    /// See [`Engine::add_listener`].
    pub fn add_listener(&mut self, listener: Arc<dyn TransactionListener>) -> TxResult<()> {
        self.engine.add_listener(self.id, listener)
    }

    /// See [`Engine::add_commit_validator`].
    pub fn add_commit_validator(&mut self, validator: Arc<dyn CommitValidator>) -> TxResult<()> {
        self.engine.add_commit_validator(self.id, validator)
    }

    // =========================================================================
    // Objects
    // =========================================================================

    /// See [`Engine::new_object`].
    pub fn new_object(&mut self, class: &ClassId) -> TxResult<DomainObject> {
        self.engine.new_object(self.id, class)
    }

    /// See [`Engine::get_object`].
    pub fn get_object(&mut self, id: &ObjectId, include_deleted: bool) -> TxResult<DomainObject> {
        self.engine.get_object(self.id, id, include_deleted)
    }

    /// See [`Engine::try_get_object`].
    pub fn try_get_object(&mut self, id: &ObjectId) -> TxResult<Option<DomainObject>> {
        self.engine.try_get_object(self.id, id)
    }

    /// See [`Engine::get_objects`].
    pub fn get_objects(&mut self, ids: &[ObjectId]) -> TxResult<Vec<DomainObject>> {
        self.engine.get_objects(self.id, ids)
    }

    /// See [`Engine::try_get_objects`].
    pub fn try_get_objects(&mut self, ids: &[ObjectId]) -> TxResult<Vec<Option<DomainObject>>> {
        self.engine.try_get_objects(self.id, ids)
    }

    /// See [`Engine::get_object_reference`].
    pub fn get_object_reference(&mut self, id: &ObjectId) -> TxResult<DomainObject> {
        self.engine.get_object_reference(self.id, id)
    }

    /// See [`Engine::query_collection`].
    pub fn query_collection(&mut self, query: &CollectionQuery) -> TxResult<Vec<DomainObject>> {
        self.engine.query_collection(self.id, query)
    }

    /// See [`Engine::enlist_domain_object`].
    pub fn enlist_domain_object(&mut self, object: &DomainObject) -> TxResult<bool> {
        self.engine.enlist_domain_object(self.id, object)
    }

    /// See [`Engine::is_enlisted`].
    pub fn is_enlisted(&self, object: &DomainObject) -> TxResult<bool> {
        self.engine.is_enlisted(self.id, object)
    }

    /// See [`Engine::enlisted_objects`].
    pub fn enlisted_objects(&self) -> TxResult<Vec<DomainObject>> {
        self.engine.enlisted_objects(self.id)
    }

    /// See [`Engine::delete`].
    pub fn delete(&mut self, object: &DomainObject) -> TxResult<()> {
        self.engine.delete(self.id, object)
    }

    /// See [`Engine::unload_data`].
    pub fn unload_data(&mut self, id: &ObjectId) -> TxResult<bool> {
        self.engine.unload_data(self.id, id)
    }

    /// See [`Engine::unload_virtual_end_point`].
    pub fn unload_virtual_end_point(&mut self, end_point: &RelationEndPointId) -> TxResult<bool> {
        self.engine.unload_virtual_end_point(self.id, end_point)
    }

    /// See [`Engine::object_state`].
    pub fn object_state(&self, object: &DomainObject) -> TxResult<ObjectState> {
        self.engine.object_state(self.id, object)
    }

    /// See [`Engine::is_invalid`].
    pub fn is_invalid(&self, object: &DomainObject) -> TxResult<bool> {
        self.engine.is_invalid(self.id, object)
    }

    // =========================================================================
    // Properties
    // =========================================================================

    /// See [`Engine::get_value`].
    pub fn get_value(&mut self, object: &DomainObject, property: &str) -> TxResult<Value> {
        self.engine.get_value(self.id, object, property)
    }

    /// See [`Engine::get_original_value`].
    pub fn get_original_value(&mut self, object: &DomainObject, property: &str) -> TxResult<Value> {
        self.engine.get_original_value(self.id, object, property)
    }

    /// See [`Engine::set_value`].
    pub fn set_value(
        &mut self,
        object: &DomainObject,
        property: &str,
        value: impl Into<Value>,
    ) -> TxResult<()> {
        self.engine.set_value(self.id, object, property, value)
    }

    /// See [`Engine::touch_value`].
    pub fn touch_value(&mut self, object: &DomainObject, property: &str) -> TxResult<()> {
        self.engine.touch_value(self.id, object, property)
    }

    /// See [`Engine::is_touched`].
    pub fn is_touched(&mut self, object: &DomainObject, property: &str) -> TxResult<bool> {
        self.engine.is_touched(self.id, object, property)
    }

    /// See [`Engine::has_changed`].
    pub fn has_changed(&mut self, object: &DomainObject, property: &str) -> TxResult<bool> {
        self.engine.has_changed(self.id, object, property)
    }

    /// See [`Engine::mark_as_changed`].
    pub fn mark_as_changed(&mut self, object: &DomainObject) -> TxResult<()> {
        self.engine.mark_as_changed(self.id, object)
    }

    /// See [`Engine::timestamp`].
    pub fn timestamp(&mut self, object: &DomainObject) -> TxResult<Option<Timestamp>> {
        self.engine.timestamp(self.id, object)
    }

    // =========================================================================
    // Relations
    // =========================================================================

    /// See [`Engine::get_related_object`].
    pub fn get_related_object(
        &mut self,
        object: &DomainObject,
        property: &str,
    ) -> TxResult<Option<DomainObject>> {
        self.engine.get_related_object(self.id, object, property)
    }

    /// See [`Engine::get_original_related_object`].
    pub fn get_original_related_object(
        &mut self,
        object: &DomainObject,
        property: &str,
    ) -> TxResult<Option<DomainObject>> {
        self.engine
            .get_original_related_object(self.id, object, property)
    }

    /// See [`Engine::set_related_object`].
    pub fn set_related_object(
        &mut self,
        object: &DomainObject,
        property: &str,
        new: Option<&DomainObject>,
    ) -> TxResult<()> {
        self.engine
            .set_related_object(self.id, object, property, new)
    }

    /// See [`Engine::get_related_objects`].
    pub fn get_related_objects(
        &mut self,
        object: &DomainObject,
        property: &str,
    ) -> TxResult<Vec<DomainObject>> {
        self.engine.get_related_objects(self.id, object, property)
    }

    /// See [`Engine::get_original_related_objects`].
    pub fn get_original_related_objects(
        &mut self,
        object: &DomainObject,
        property: &str,
    ) -> TxResult<Vec<DomainObject>> {
        self.engine
            .get_original_related_objects(self.id, object, property)
    }

    /// See [`Engine::add_related_object`].
    pub fn add_related_object(
        &mut self,
        owner: &DomainObject,
        property: &str,
        item: &DomainObject,
    ) -> TxResult<()> {
        self.engine
            .add_related_object(self.id, owner, property, item)
    }

    /// See [`Engine::insert_related_object`].
    pub fn insert_related_object(
        &mut self,
        owner: &DomainObject,
        property: &str,
        index: usize,
        item: &DomainObject,
    ) -> TxResult<()> {
        self.engine
            .insert_related_object(self.id, owner, property, index, item)
    }

    /// See [`Engine::remove_related_object`].
    pub fn remove_related_object(
        &mut self,
        owner: &DomainObject,
        property: &str,
        item: &DomainObject,
    ) -> TxResult<bool> {
        self.engine
            .remove_related_object(self.id, owner, property, item)
    }

    /// See [`Engine::replace_related_object`].
    pub fn replace_related_object(
        &mut self,
        owner: &DomainObject,
        property: &str,
        index: usize,
        item: &DomainObject,
    ) -> TxResult<()> {
        self.engine
            .replace_related_object(self.id, owner, property, index, item)
    }

    /// See [`Engine::set_related_objects`].
    pub fn set_related_objects(
        &mut self,
        owner: &DomainObject,
        property: &str,
        items: &[DomainObject],
    ) -> TxResult<()> {
        self.engine
            .set_related_objects(self.id, owner, property, items)
    }

    // =========================================================================
    // Commit and rollback
    // =========================================================================

    /// See [`Engine::commit`].
    pub fn commit(&mut self) -> TxResult<Vec<DomainObject>> {
        self.engine.commit(self.id)
    }

    /// See [`Engine::rollback`].
    pub fn rollback(&mut self) -> TxResult<Vec<DomainObject>> {
        self.engine.rollback(self.id)
    }
}

impl std::fmt::Debug for ClientTransaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientTransaction")
            .field("id", &self.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::{engine, order};
    use crate::types::ObjectState;
    use txgraph_model::Value;

    #[test]
    fn scope_forwards_to_its_transaction() {
        let mut engine = engine();
        let root = engine.create_root_transaction();
        let mut tx = engine.transaction(root);
        assert_eq!(tx.id(), root);

        let order1 = tx.get_object(&order(1), false).unwrap();
        tx.set_value(&order1, "OrderNumber", 8).unwrap();
        assert_eq!(tx.object_state(&order1).unwrap(), ObjectState::Changed);

        let sub = tx.create_sub_transaction().unwrap();
        assert!(tx.is_read_only().unwrap());
        let mut sub_tx = engine.transaction(sub);
        assert_eq!(
            sub_tx.get_value(&order1, "OrderNumber").unwrap(),
            Value::Integer(8)
        );
        assert_eq!(sub_tx.root_transaction().unwrap(), root);
    }
}
