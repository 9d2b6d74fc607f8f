//! Commit and rollback.
//!
//! # Commit protocol
//!
//! 1. `committing` goes out for every dirty object. Observers may dirty more
//!    objects; those are announced in another pass, until a pass finds
//!    nothing new or [`crate::EngineConfig::max_commit_passes`] is exceeded.
//! 2. `commit_validate` and the commit validators see a snapshot of the final
//!    change set. Any error aborts with nothing written.
//! 3. A root or binding transaction persists through the storage provider; a
//!    sub-transaction copies its changes into its parent.
//! 4. The transaction's own state becomes its committed state. A committed
//!    sub-transaction releases its parent.
//! 5. `committed` goes out for every object that still exists.

use crate::data::DataContainer;
use crate::domain_object::DomainObject;
use crate::endpoint::RelationEndPoint;
use crate::engine::{Engine, TransactionStatus};
use crate::error::{TxError, TxResult};
use crate::types::{ObjectState, TransactionId};
use crate::validation::{
    CommitValidator, MandatoryRelationValidator, PersistableData, RelatedSnapshot,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info};
use txgraph_model::{ObjectId, RelationEndPointId, Value};
use txgraph_storage::{PersistState, PersistableRecord, Timestamp};

impl Engine {
    /// Commits `tx`.
    ///
    /// Returns the committed objects, without the deleted ones.
    ///
    /// # Errors
    ///
    /// - `ReadOnly` if `tx` has an active sub-transaction or was released
    /// - `CommitLoopLimit` if committing observers never stop dirtying objects
    /// - `MandatoryRelationNotSet` or any other validator error
    /// - `ConcurrencyViolation` from storage
    /// - any veto from an observer
    pub fn commit(&mut self, tx: TransactionId) -> TxResult<Vec<DomainObject>> {
        self.ensure_writable(tx)?;

        self.run_committing_passes(tx)?;

        let dirty = self.dirty_objects(tx)?;
        let data = self.persistable_data(tx, &dirty)?;
        self.notify(tx, |l, s| l.commit_validate(s, &data))?;
        self.run_validators(tx, &data)?;

        let parent = self.node(tx)?.parent;
        let timestamps = match parent {
            None => self.persist(tx, &data)?,
            Some(parent) => {
                self.push_to_parent(tx, parent, &dirty)?;
                Vec::new()
            }
        };
        self.commit_locally(tx, timestamps)?;

        if let Some(parent) = parent {
            self.node_mut(tx)?.status = TransactionStatus::Released;
            let parent = self.node_mut(parent)?;
            parent.sub = None;
            parent.released = Some(tx);
        }
        info!(tx = %tx, objects = data.len(), "transaction committed");

        let committed: Vec<DomainObject> = data
            .into_iter()
            .filter(|d| d.state != ObjectState::Deleted)
            .map(|d| d.object)
            .collect();
        for object in &committed {
            self.notify_object_after(tx, object, |h, s| h.committed(s, object));
        }
        self.notify_after(tx, |l, s| l.committed(s, &committed));
        Ok(committed)
    }

    /// Announces dirty objects until no pass finds a new one.
    fn run_committing_passes(&mut self, tx: TransactionId) -> TxResult<()> {
        let max_passes = self.config.max_commit_passes;
        let mut announced: BTreeSet<ObjectId> = BTreeSet::new();
        let mut passes = 0;
        loop {
            let fresh: Vec<ObjectId> = self
                .dirty_objects(tx)?
                .into_iter()
                .filter(|id| !announced.contains(id))
                .collect();
            if fresh.is_empty() {
                return Ok(());
            }
            if passes == max_passes {
                return Err(TxError::CommitLoopLimit { passes });
            }
            passes += 1;
            debug!(tx = %tx, pass = passes, objects = fresh.len(), "committing pass");

            let objects = fresh
                .iter()
                .map(|id| self.enlist(tx, id))
                .collect::<TxResult<Vec<_>>>()?;
            announced.extend(fresh);

            self.notify(tx, |l, s| l.committing(s, &objects))?;
            for object in &objects {
                self.notify_object(tx, object, |h, s| h.committing(s, object))?;
            }
        }
    }

    fn run_validators(&self, tx: TransactionId, data: &[PersistableData]) -> TxResult<()> {
        let mut validators: Vec<Arc<dyn CommitValidator>> = Vec::new();
        if self.config.validate_mandatory_relations {
            validators.push(Arc::new(MandatoryRelationValidator));
        }
        validators.extend(self.node(tx)?.validators.iter().cloned());
        for validator in validators {
            validator.validate(tx, &self.mapping, data)?;
        }
        Ok(())
    }

    /// Captures the change set of `ids` for validation and persistence.
    pub(crate) fn persistable_data(
        &mut self,
        tx: TransactionId,
        ids: &[ObjectId],
    ) -> TxResult<Vec<PersistableData>> {
        let objects = ids
            .iter()
            .map(|id| self.enlist(tx, id))
            .collect::<TxResult<Vec<_>>>()?;
        let node = self.node(tx)?;
        let mut result = Vec::with_capacity(ids.len());
        for object in objects {
            let id = object.id();
            let class = self.mapping.class(id.class_id())?;
            let container = self.container(tx, id)?;
            let related = class
                .end_points()
                .iter()
                .map(|def| {
                    let snapshot = if def.is_virtual() {
                        let ep_id = RelationEndPointId::new(id.clone(), def.property_name());
                        match node.data.end_point(&ep_id) {
                            Some(RelationEndPoint::VirtualObject(ep)) => {
                                RelatedSnapshot::Object(ep.related().cloned())
                            }
                            Some(RelationEndPoint::Collection(ep)) if ep.is_complete() => {
                                RelatedSnapshot::Collection(ep.items().to_vec())
                            }
                            _ => RelatedSnapshot::NotLoaded,
                        }
                    } else {
                        RelatedSnapshot::Object(
                            container
                                .value(def.property_name())
                                .and_then(Value::as_object_id)
                                .cloned(),
                        )
                    };
                    (def.property_name().to_string(), snapshot)
                })
                .collect();
            result.push(PersistableData {
                state: node.data.object_state(id, class),
                timestamp: container.timestamp(),
                values: container.current_values(),
                original_values: container.original_values(),
                related,
                object,
            });
        }
        Ok(result)
    }

    fn persist(
        &self,
        tx: TransactionId,
        data: &[PersistableData],
    ) -> TxResult<Vec<(ObjectId, Timestamp)>> {
        let records: Vec<PersistableRecord> = data
            .iter()
            .filter_map(|d| {
                let state = match d.state {
                    ObjectState::New => PersistState::New,
                    ObjectState::Changed => PersistState::Changed,
                    ObjectState::Deleted => PersistState::Deleted,
                    _ => return None,
                };
                Some(PersistableRecord {
                    id: d.id().clone(),
                    state,
                    timestamp: d.timestamp,
                    values: d.values.clone(),
                })
            })
            .collect();
        if records.is_empty() {
            return Ok(Vec::new());
        }
        debug!(tx = %tx, records = records.len(), "persisting");
        Ok(self.storage.persist(&records)?)
    }

    /// Copies the committed state of a sub-transaction into its parent.
    fn push_to_parent(
        &mut self,
        tx: TransactionId,
        parent: TransactionId,
        ids: &[ObjectId],
    ) -> TxResult<()> {
        let sub = self.node(tx)?;
        let parent_data = &self.node(parent)?.data;
        let touched = sub.data.containers().filter(|c| {
            c.has_touched_values()
                && !ids.contains(c.id())
                && parent_data.container(c.id()).is_some()
        });
        let containers: Vec<DataContainer> = ids
            .iter()
            .filter_map(|id| sub.data.container(id))
            .chain(touched)
            .cloned()
            .collect();
        let end_points: Vec<RelationEndPoint> = sub
            .data
            .end_points()
            .filter(|ep| ep.has_changed() || ep.is_touched())
            .cloned()
            .collect();
        let new_objects: BTreeSet<ObjectId> = containers
            .iter()
            .filter(|c| c.is_new())
            .map(|c| c.id().clone())
            .collect();
        let new_end_points: Vec<RelationEndPoint> = sub
            .data
            .end_points()
            .filter(|ep| ep.is_virtual() && new_objects.contains(ep.id().object_id()))
            .cloned()
            .collect();

        let before = self.capture_states(parent, ids);
        let mut vanished: BTreeSet<ObjectId> = BTreeSet::new();
        for container in &containers {
            let id = container.id();
            if container.is_new() {
                self.node_mut(parent)?.data.mark_valid(id);
                self.register_container(parent, DataContainer::new_from_sub(container))?;
            } else if container.is_deleted() {
                if self.container(parent, id)?.is_new() {
                    self.unregister_container(parent, id, true)?;
                    self.node_mut(parent)?.data.mark_invalid(id.clone());
                    vanished.insert(id.clone());
                } else {
                    let target = self.container_mut(parent, id)?;
                    target.apply_from_sub(container);
                    target.delete();
                }
            } else {
                self.container_mut(parent, id)?.apply_from_sub(container);
            }
        }

        for end_point in new_end_points {
            self.register_end_point(parent, end_point.clone_for_sub())?;
        }
        for end_point in end_points {
            let owner = end_point.id().object_id();
            if new_objects.contains(owner) || vanished.contains(owner) {
                continue;
            }
            if self.node(parent)?.data.end_point(end_point.id()).is_none() {
                self.register_end_point(parent, end_point)?;
                continue;
            }
            match (self.node_mut(parent)?.data.end_point_mut(end_point.id()), &end_point) {
                (
                    Some(RelationEndPoint::Collection(target)),
                    RelationEndPoint::Collection(source),
                ) => target.set_from_sub(source),
                (
                    Some(RelationEndPoint::VirtualObject(target)),
                    RelationEndPoint::VirtualObject(source),
                ) => target.set_from_sub(source),
                _ => {}
            }
        }
        self.publish_state_changes(parent, before);
        debug!(
            sub = %tx,
            parent = %parent,
            objects = ids.len(),
            "sub-transaction pushed to parent"
        );
        Ok(())
    }

    /// Makes the current state of `tx` its committed state.
    fn commit_locally(
        &mut self,
        tx: TransactionId,
        timestamps: Vec<(ObjectId, Timestamp)>,
    ) -> TxResult<()> {
        let timestamps: BTreeMap<ObjectId, Timestamp> = timestamps.into_iter().collect();
        let (deleted, existing): (Vec<ObjectId>, Vec<ObjectId>) = {
            let node = self.node(tx)?;
            node.data
                .containers()
                .map(|c| c.id().clone())
                .partition(|id| node.data.is_deleted(id))
        };

        for id in &deleted {
            self.unregister_container(tx, id, true)?;
            self.node_mut(tx)?.data.mark_invalid(id.clone());
            self.notify_after(tx, |l, s| {
                l.data_container_state_updated(s, id, ObjectState::Invalid);
            });
        }
        let node = self.node_mut(tx)?;
        for id in &existing {
            if let Some(container) = node.data.container_mut(id) {
                container.commit(timestamps.get(id).copied());
            }
        }
        for end_point in node.data.end_points_mut() {
            end_point.commit();
        }
        Ok(())
    }

    /// Rolls back `tx` to its last committed state.
    ///
    /// New objects become invalid. Returns the objects that were dirty. A
    /// released sub-transaction has nothing to roll back.
    ///
    /// # Errors
    ///
    /// - `ReadOnly` if `tx` has an active sub-transaction
    /// - any veto from an observer
    pub fn rollback(&mut self, tx: TransactionId) -> TxResult<Vec<DomainObject>> {
        let node = self.node(tx)?;
        if node.status == TransactionStatus::Released {
            return Ok(Vec::new());
        }
        if node.sub.is_some() {
            return Err(TxError::read_only(tx, "a sub-transaction is active"));
        }

        let dirty = self.dirty_objects(tx)?;
        let objects = dirty
            .iter()
            .map(|id| self.enlist(tx, id))
            .collect::<TxResult<Vec<_>>>()?;
        self.notify(tx, |l, s| l.rolling_back(s, &objects))?;
        for object in &objects {
            self.notify_object(tx, object, |h, s| h.rolling_back(s, object))?;
        }

        let before = self.capture_states(tx, &dirty);
        let new_objects: Vec<ObjectId> = self
            .node(tx)?
            .data
            .containers()
            .filter(|c| c.is_new())
            .map(|c| c.id().clone())
            .collect();
        for id in &new_objects {
            self.unregister_container(tx, id, true)?;
            self.node_mut(tx)?.data.mark_invalid(id.clone());
        }
        let node = self.node_mut(tx)?;
        let ids: Vec<ObjectId> = node.data.containers().map(|c| c.id().clone()).collect();
        for id in &ids {
            if let Some(container) = node.data.container_mut(id) {
                container.rollback();
            }
        }
        for end_point in node.data.end_points_mut() {
            end_point.rollback();
        }
        self.publish_state_changes(tx, before);
        info!(tx = %tx, objects = objects.len(), "transaction rolled back");

        for object in &objects {
            self.notify_object_after(tx, object, |h, s| h.rolled_back(s, object));
        }
        self.notify_after(tx, |l, s| l.rolled_back(s, &objects));
        Ok(objects)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::TxError;
    use crate::testing::{customer, engine, item, order};
    use crate::types::ObjectState;
    use txgraph_model::Value;

    #[test]
    fn root_commit_persists_and_refreshes_timestamps() {
        let mut engine = engine();
        let tx = engine.create_root_transaction();
        let order1 = engine.get_object(tx, &order(1), false).unwrap();
        let loaded_at = engine.timestamp(tx, &order1).unwrap();

        engine.set_value(tx, &order1, "OrderNumber", 11).unwrap();
        let committed = engine.commit(tx).unwrap();
        assert_eq!(committed, vec![order1.clone()]);
        assert_eq!(
            engine.object_state(tx, &order1).unwrap(),
            ObjectState::Unchanged
        );
        assert_ne!(engine.timestamp(tx, &order1).unwrap(), loaded_at);

        let other = engine.create_root_transaction();
        let fresh = engine.get_object(other, &order(1), false).unwrap();
        assert_eq!(
            engine.get_value(other, &fresh, "OrderNumber").unwrap(),
            Value::Integer(11)
        );
    }

    #[test]
    fn sub_commit_updates_parent_and_releases_it() {
        let mut engine = engine();
        let root = engine.create_root_transaction();
        let order1 = engine.get_object(root, &order(1), false).unwrap();
        let sub = engine.create_sub_transaction(root).unwrap();

        engine.set_value(sub, &order1, "OrderNumber", 5).unwrap();
        assert_eq!(
            engine.get_value(root, &order1, "OrderNumber").unwrap(),
            Value::Integer(1)
        );
        engine.commit(sub).unwrap();

        assert!(!engine.is_read_only(root).unwrap());
        assert_eq!(
            engine.get_value(root, &order1, "OrderNumber").unwrap(),
            Value::Integer(5)
        );
        assert_eq!(
            engine.object_state(root, &order1).unwrap(),
            ObjectState::Changed
        );
        assert!(engine.rollback(sub).unwrap().is_empty());
        let err = engine
            .set_value(sub, &order1, "OrderNumber", 6)
            .unwrap_err();
        assert!(matches!(err, TxError::ReadOnly { .. }));
    }

    #[test]
    fn sub_commit_back_to_parent_value_is_unchanged() {
        let mut engine = engine();
        let root = engine.create_root_transaction();
        let order1 = engine.get_object(root, &order(1), false).unwrap();
        engine.set_value(root, &order1, "OrderNumber", 3).unwrap();

        let sub = engine.create_sub_transaction(root).unwrap();
        engine.set_value(sub, &order1, "OrderNumber", 1).unwrap();
        engine.commit(sub).unwrap();
        assert_eq!(
            engine.object_state(root, &order1).unwrap(),
            ObjectState::Unchanged
        );
    }

    #[test]
    fn new_object_reaches_parent_as_new() {
        let mut engine = engine();
        let root = engine.create_root_transaction();
        let customer1 = engine.get_object(root, &customer(1), false).unwrap();
        let sub = engine.create_sub_transaction(root).unwrap();
        let fresh = engine.new_object(sub, &"Order".into()).unwrap();
        engine
            .set_related_object(sub, &fresh, "Customer", Some(&customer1))
            .unwrap();
        engine.commit(sub).unwrap();

        assert_eq!(engine.object_state(root, &fresh).unwrap(), ObjectState::New);
        assert!(engine
            .get_related_objects(root, &customer1, "Orders")
            .unwrap()
            .contains(&fresh));
    }

    #[test]
    fn rollback_restores_values_and_invalidates_new_objects() {
        let mut engine = engine();
        let tx = engine.create_root_transaction();
        let order1 = engine.get_object(tx, &order(1), false).unwrap();
        let item1 = engine.get_object(tx, &item(1), false).unwrap();
        let fresh = engine.new_object(tx, &"Order".into()).unwrap();
        engine.set_value(tx, &order1, "OrderNumber", 42).unwrap();
        engine
            .remove_related_object(tx, &order1, "OrderItems", &item1)
            .unwrap();

        engine.rollback(tx).unwrap();
        assert_eq!(
            engine.get_value(tx, &order1, "OrderNumber").unwrap(),
            Value::Integer(1)
        );
        assert_eq!(
            engine.get_related_object(tx, &item1, "Order").unwrap(),
            Some(order1.clone())
        );
        assert_eq!(
            engine.object_state(tx, &fresh).unwrap(),
            ObjectState::Invalid
        );
        assert!(engine.rollback(tx).unwrap().is_empty());
    }

    #[test]
    fn mandatory_relation_is_checked_at_commit_only() {
        let mut engine = engine();
        let tx = engine.create_root_transaction();
        let order1 = engine.get_object(tx, &order(1), false).unwrap();
        let item1 = engine.get_object(tx, &item(1), false).unwrap();

        engine
            .remove_related_object(tx, &order1, "OrderItems", &item1)
            .unwrap();
        let err = engine.commit(tx).unwrap_err();
        assert!(matches!(
            err,
            TxError::MandatoryRelationNotSet { ref property, .. } if property == "Order"
        ));

        engine
            .add_related_object(tx, &order1, "OrderItems", &item1)
            .unwrap();
        engine.commit(tx).unwrap();
    }
}
