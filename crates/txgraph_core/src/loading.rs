//! Loading and unloading object data.
//!
//! Root and binding transactions load from the storage provider. A
//! sub-transaction asks its parent, which may in turn ask its own parent; the
//! answer is copied so the sub-transaction's original values are the parent's
//! current values.

use crate::data::DataContainer;
use crate::domain_object::DomainObject;
use crate::endpoint::{CollectionEndPoint, RelationEndPoint, VirtualObjectEndPoint};
use crate::engine::Engine;
use crate::error::{TxError, TxResult};
use crate::types::{ObjectState, TransactionId};
use std::sync::Arc;
use tracing::debug;
use txgraph_model::{ObjectId, RelationEndPointId, Value};
use txgraph_storage::{CollectionQuery, StoredRecord};

impl Engine {
    /// Returns the object with `id`, loading it if necessary.
    ///
    /// # Errors
    ///
    /// - `ObjectsNotFound` if storage has no such object; the ID becomes invalid
    /// - `ObjectInvalid` if the ID is invalid in `tx`
    /// - `ObjectDeleted` if the object is deleted and `include_deleted` is off
    pub fn get_object(
        &mut self,
        tx: TransactionId,
        id: &ObjectId,
        include_deleted: bool,
    ) -> TxResult<DomainObject> {
        self.node(tx)?;
        self.ensure_loaded(tx, id)?;
        if !include_deleted && self.container(tx, id)?.is_deleted() {
            return Err(TxError::ObjectDeleted { id: id.clone() });
        }
        self.enlist(tx, id)
    }

    /// Returns the object with `id`, or `None` if it is missing or invalid.
    ///
    /// Deleted objects are returned.
    pub fn try_get_object(
        &mut self,
        tx: TransactionId,
        id: &ObjectId,
    ) -> TxResult<Option<DomainObject>> {
        let mut found = self.try_get_objects(tx, std::slice::from_ref(id))?;
        Ok(found.pop().flatten())
    }

    /// Returns the objects with `ids`, in order and with duplicates.
    ///
    /// Everything missing is loaded in one bulk request.
    ///
    /// # Errors
    ///
    /// - `ObjectInvalid` for the first ID invalid in `tx`
    /// - `ObjectsNotFound` listing every missing ID; the objects that were found
    ///   stay loaded
    /// - `ObjectDeleted` for the first deleted object, as
    ///   [`Engine::get_object`] without `include_deleted`
    pub fn get_objects(
        &mut self,
        tx: TransactionId,
        ids: &[ObjectId],
    ) -> TxResult<Vec<DomainObject>> {
        let node = self.node(tx)?;
        if let Some(id) = ids.iter().find(|id| node.data.is_invalid(id)) {
            return Err(TxError::ObjectInvalid { id: id.clone() });
        }
        self.load_containers(tx, ids, true)?;
        let data = &self.node(tx)?.data;
        if let Some(id) = ids.iter().find(|id| data.is_deleted(id)) {
            return Err(TxError::ObjectDeleted { id: id.clone() });
        }
        ids.iter().map(|id| self.enlist(tx, id)).collect()
    }

    /// Like [`Engine::get_objects`], with `None` for missing or invalid IDs.
    pub fn try_get_objects(
        &mut self,
        tx: TransactionId,
        ids: &[ObjectId],
    ) -> TxResult<Vec<Option<DomainObject>>> {
        self.node(tx)?;
        self.load_containers(tx, ids, false)?;
        ids.iter()
            .map(|id| {
                if self.node(tx)?.data.container(id).is_some() {
                    self.enlist(tx, id).map(Some)
                } else {
                    Ok(None)
                }
            })
            .collect()
    }

    /// Returns a reference to `id` without loading it.
    ///
    /// The reference reports `NotLoadedYet` until something reads it.
    pub fn get_object_reference(
        &mut self,
        tx: TransactionId,
        id: &ObjectId,
    ) -> TxResult<DomainObject> {
        self.node(tx)?;
        self.mapping.class(id.class_id())?;
        self.enlist(tx, id)
    }

    /// Runs a query against storage.
    ///
    /// Objects already loaded keep their in-memory state. Objects deleted or
    /// invalid in `tx` are left out.
    pub fn query_collection(
        &mut self,
        tx: TransactionId,
        query: &CollectionQuery,
    ) -> TxResult<Vec<DomainObject>> {
        self.node(tx)?;
        let root = self.root_transaction(tx)?;
        let records = self.storage.execute_collection_query(query)?;
        debug!(tx = %tx, class = %query.class(), count = records.len(), "collection query");

        let ids = self.register_records(root, records)?;
        if root != tx {
            self.load_containers(tx, &ids, false)?;
        }

        let mut result = Vec::with_capacity(ids.len());
        for id in &ids {
            let live = self
                .node(tx)?
                .data
                .container(id)
                .is_some_and(|c| !c.is_deleted());
            if live {
                result.push(self.enlist(tx, id)?);
            }
        }
        Ok(result)
    }

    /// Returns the container of a loaded object.
    pub(crate) fn container(&self, tx: TransactionId, id: &ObjectId) -> TxResult<&DataContainer> {
        self.node(tx)?
            .data
            .container(id)
            .ok_or_else(|| TxError::ObjectInvalid { id: id.clone() })
    }

    pub(crate) fn container_mut(
        &mut self,
        tx: TransactionId,
        id: &ObjectId,
    ) -> TxResult<&mut DataContainer> {
        self.node_mut(tx)?
            .data
            .container_mut(id)
            .ok_or_else(|| TxError::ObjectInvalid { id: id.clone() })
    }

    /// Loads `id` into `tx` unless it is there already.
    pub(crate) fn ensure_loaded(&mut self, tx: TransactionId, id: &ObjectId) -> TxResult<()> {
        let node = self.node(tx)?;
        if node.data.is_invalid(id) {
            return Err(TxError::ObjectInvalid { id: id.clone() });
        }
        if node.data.container(id).is_some() {
            return Ok(());
        }
        self.load_containers(tx, std::slice::from_ref(id), true)?;
        Ok(())
    }

    /// Loads `id` and fails if it is deleted.
    pub(crate) fn ensure_live(&mut self, tx: TransactionId, id: &ObjectId) -> TxResult<()> {
        self.ensure_loaded(tx, id)?;
        if self.container(tx, id)?.is_deleted() {
            return Err(TxError::ObjectDeleted { id: id.clone() });
        }
        Ok(())
    }

    /// Loads every ID of `ids` that `tx` does not hold yet.
    ///
    /// Missing IDs become invalid in `tx` and are returned, or reported as
    /// `ObjectsNotFound` if `throw_on_not_found` is set.
    pub(crate) fn load_containers(
        &mut self,
        tx: TransactionId,
        ids: &[ObjectId],
        throw_on_not_found: bool,
    ) -> TxResult<Vec<ObjectId>> {
        let node = self.node(tx)?;
        let mut pending: Vec<ObjectId> = Vec::new();
        for id in ids {
            if !node.data.is_invalid(id)
                && node.data.container(id).is_none()
                && !pending.contains(id)
            {
                pending.push(id.clone());
            }
        }
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        self.notify_after(tx, |l, s| l.objects_loading(s, &pending));
        let (found, missing) = self.fetch_containers(tx, &pending)?;

        let mut loaded = Vec::with_capacity(found.len());
        for container in found {
            let id = container.id().clone();
            self.register_container(tx, container)?;
            loaded.push(self.enlist(tx, &id)?);
        }

        if !missing.is_empty() {
            for id in &missing {
                self.node_mut(tx)?.data.mark_invalid(id.clone());
            }
            debug!(tx = %tx, ids = ?missing, "objects not found");
            self.notify_after(tx, |l, s| l.objects_not_found(s, &missing));
        }
        if !loaded.is_empty() {
            self.notify_after(tx, |l, s| l.objects_loaded(s, &loaded));
        }

        if throw_on_not_found && !missing.is_empty() {
            return Err(TxError::ObjectsNotFound { ids: missing });
        }
        Ok(missing)
    }

    /// Fetches containers from storage or from the parent transaction.
    fn fetch_containers(
        &mut self,
        tx: TransactionId,
        ids: &[ObjectId],
    ) -> TxResult<(Vec<DataContainer>, Vec<ObjectId>)> {
        let mut found = Vec::with_capacity(ids.len());
        let mut missing = Vec::new();

        let parent = self.node(tx)?.parent;
        match parent {
            None => {
                let mapping = Arc::clone(&self.mapping);
                let records = self.storage.load_objects(ids, false)?;
                for record in records {
                    let class = mapping.class(record.id.class_id())?;
                    found.push(DataContainer::from_record(record, class));
                }
                for id in ids {
                    if !found.iter().any(|c| c.id() == id) {
                        missing.push(id.clone());
                    }
                }
            }
            Some(parent) => {
                self.load_containers(parent, ids, false)?;
                let parent_node = self.node(parent)?;
                for id in ids {
                    match parent_node.data.container(id) {
                        Some(container) if !container.is_deleted() => {
                            found.push(container.clone_for_sub());
                        }
                        _ => missing.push(id.clone()),
                    }
                }
            }
        }
        Ok((found, missing))
    }

    /// Registers storage records in a top-level transaction.
    ///
    /// Records of objects already loaded are ignored; records of invalid
    /// objects are dropped. Returns the IDs in record order.
    pub(crate) fn register_records(
        &mut self,
        tx: TransactionId,
        records: Vec<StoredRecord>,
    ) -> TxResult<Vec<ObjectId>> {
        let mapping = Arc::clone(&self.mapping);
        let mut ids = Vec::with_capacity(records.len());
        let mut fresh = Vec::new();
        {
            let node = self.node(tx)?;
            for record in records {
                if node.data.is_invalid(&record.id) {
                    continue;
                }
                ids.push(record.id.clone());
                if node.data.container(&record.id).is_none()
                    && !fresh.iter().any(|c: &DataContainer| c.id() == &record.id)
                {
                    let class = mapping.class(record.id.class_id())?;
                    fresh.push(DataContainer::from_record(record, class));
                }
            }
        }
        if fresh.is_empty() {
            return Ok(ids);
        }

        let pending: Vec<ObjectId> = fresh.iter().map(|c| c.id().clone()).collect();
        self.notify_after(tx, |l, s| l.objects_loading(s, &pending));
        let mut loaded = Vec::with_capacity(fresh.len());
        for container in fresh {
            let id = container.id().clone();
            self.register_container(tx, container)?;
            loaded.push(self.enlist(tx, &id)?);
        }
        self.notify_after(tx, |l, s| l.objects_loaded(s, &loaded));
        Ok(ids)
    }

    /// Loads a virtual end point unless it is registered and complete.
    ///
    /// Real end points need no loading; their value is the foreign key.
    pub(crate) fn ensure_end_point_loaded(
        &mut self,
        tx: TransactionId,
        ep_id: &RelationEndPointId,
    ) -> TxResult<()> {
        let mapping = Arc::clone(&self.mapping);
        let def = mapping.end_point_for(ep_id)?;
        if !def.is_virtual() {
            return Ok(());
        }
        let node = self.node(tx)?;
        if node
            .data
            .end_point(ep_id)
            .is_some_and(RelationEndPoint::is_complete)
        {
            return Ok(());
        }
        let parent = node.parent;

        let loaded = match parent {
            None => {
                if def.is_collection() {
                    let records = self.storage.load_related_objects(ep_id)?;
                    let items = self.register_records(tx, records)?;
                    RelationEndPoint::Collection(CollectionEndPoint::complete(ep_id.clone(), items))
                } else {
                    let related = match self.storage.load_related_object(ep_id)? {
                        Some(record) => self.register_records(tx, vec![record])?.pop(),
                        None => None,
                    };
                    RelationEndPoint::VirtualObject(VirtualObjectEndPoint::new(
                        ep_id.clone(),
                        related,
                    ))
                }
            }
            Some(parent) => {
                self.ensure_end_point_loaded(parent, ep_id)?;
                self.node(parent)?
                    .data
                    .end_point(ep_id)
                    .map(RelationEndPoint::clone_for_sub)
                    .ok_or_else(|| {
                        TxError::invalid_operation(format!(
                            "end point '{ep_id}' is not available in the parent transaction"
                        ))
                    })?
            }
        };
        debug!(tx = %tx, end_point = %ep_id, "end point loaded");

        if let (Some(RelationEndPoint::Collection(existing)), RelationEndPoint::Collection(fresh)) =
            (self.node_mut(tx)?.data.end_point_mut(ep_id), &loaded)
        {
            existing.set_data(fresh.items().to_vec());
            return Ok(());
        }
        self.register_end_point(tx, loaded)
    }

    /// Returns the collection end point `ep_id`, loading it first.
    pub(crate) fn loaded_collection(
        &mut self,
        tx: TransactionId,
        ep_id: &RelationEndPointId,
    ) -> TxResult<&CollectionEndPoint> {
        self.ensure_end_point_loaded(tx, ep_id)?;
        match self.node(tx)?.data.end_point(ep_id) {
            Some(RelationEndPoint::Collection(ep)) => Ok(ep),
            _ => Err(TxError::invalid_operation(format!(
                "'{ep_id}' is not a collection end point"
            ))),
        }
    }

    // =========================================================================
    // Unload
    // =========================================================================

    /// Drops the data of an unchanged object from `tx` and its ancestors.
    ///
    /// Complete collections holding the object become incomplete and virtual
    /// one-to-one end points pointing at it are unregistered. The next access
    /// reloads it. Returns whether anything was unloaded.
    ///
    /// # Errors
    ///
    /// - `ReadOnly` unless `tx` is the leaf of its hierarchy
    /// - `InvalidOperation` if the object or a relation pointing at it changed
    ///   at any level
    pub fn unload_data(&mut self, tx: TransactionId, id: &ObjectId) -> TxResult<bool> {
        if self.node(tx)?.sub.is_some() {
            return Err(TxError::read_only(tx, "a sub-transaction is active"));
        }
        let mapping = Arc::clone(&self.mapping);
        let class = mapping.class(id.class_id())?;
        let levels = self.levels(tx)?;

        let mut loaded_anywhere = false;
        for level in &levels {
            let node = self.node(*level)?;
            let Some(container) = node.data.container(id) else {
                continue;
            };
            loaded_anywhere = true;
            let state = node.data.object_state(id, class);
            if state != ObjectState::Unchanged {
                return Err(TxError::invalid_operation(format!(
                    "object '{id}' cannot be unloaded because it is {state} in {level}"
                )));
            }
            for def in class.real_end_points() {
                if let Some(Value::Object(target)) = container.value(def.property_name()) {
                    let opposite =
                        RelationEndPointId::new(target.clone(), def.opposite_property_name());
                    if node
                        .data
                        .end_point(&opposite)
                        .is_some_and(RelationEndPoint::has_changed)
                    {
                        return Err(TxError::invalid_operation(format!(
                            "object '{id}' cannot be unloaded because end point '{opposite}' changed in {level}"
                        )));
                    }
                }
            }
        }
        if !loaded_anywhere {
            return Ok(false);
        }

        let object = self.enlist(tx, id)?;
        let objects = [object];
        self.notify(tx, |l, s| l.objects_unloading(s, &objects))?;

        for level in &levels {
            let Some(container) = self.node(*level)?.data.container(id).cloned() else {
                continue;
            };
            for def in class.real_end_points() {
                let Some(Value::Object(target)) = container.value(def.property_name()) else {
                    continue;
                };
                let opposite =
                    RelationEndPointId::new(target.clone(), def.opposite_property_name());
                let one_to_one = match self.node_mut(*level)?.data.end_point_mut(&opposite) {
                    Some(RelationEndPoint::Collection(ep)) => {
                        ep.mark_incomplete();
                        false
                    }
                    Some(RelationEndPoint::VirtualObject(_)) => true,
                    _ => false,
                };
                if one_to_one {
                    self.unregister_end_point(*level, &opposite)?;
                }
            }
            self.unregister_container(*level, id, false)?;
        }
        debug!(tx = %tx, object = %id, "object unloaded");

        self.notify_after(tx, |l, s| l.objects_unloaded(s, &objects));
        Ok(true)
    }

    /// Drops the data of an unchanged virtual end point from `tx` and its
    /// ancestors. Returns whether anything was unloaded.
    pub fn unload_virtual_end_point(
        &mut self,
        tx: TransactionId,
        ep_id: &RelationEndPointId,
    ) -> TxResult<bool> {
        if self.node(tx)?.sub.is_some() {
            return Err(TxError::read_only(tx, "a sub-transaction is active"));
        }
        if !self.mapping.end_point_for(ep_id)?.is_virtual() {
            return Err(TxError::invalid_operation(format!(
                "'{ep_id}' is not a virtual end point"
            )));
        }
        let levels = self.levels(tx)?;
        for level in &levels {
            if self
                .node(*level)?
                .data
                .end_point(ep_id)
                .is_some_and(RelationEndPoint::has_changed)
            {
                return Err(TxError::invalid_operation(format!(
                    "end point '{ep_id}' cannot be unloaded because it changed in {level}"
                )));
            }
        }

        let mut unloaded = false;
        for level in &levels {
            let one_to_one = match self.node_mut(*level)?.data.end_point_mut(ep_id) {
                Some(RelationEndPoint::Collection(ep)) if ep.is_complete() => {
                    ep.mark_incomplete();
                    unloaded = true;
                    false
                }
                Some(RelationEndPoint::VirtualObject(_)) => true,
                _ => false,
            };
            if one_to_one {
                self.unregister_end_point(*level, ep_id)?;
                unloaded = true;
            }
        }
        Ok(unloaded)
    }
}
