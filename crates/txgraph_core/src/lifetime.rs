//! Object creation and deletion.

use crate::data::DataContainer;
use crate::domain_object::DomainObject;
use crate::endpoint::{
    ChangeKind, CollectionEndPoint, EndPointChange, RelationEndPoint, VirtualObjectEndPoint,
};
use crate::engine::Engine;
use crate::error::TxResult;
use crate::types::{ObjectState, TransactionId, ValueAccess};
use std::sync::Arc;
use tracing::debug;
use txgraph_model::{ClassId, ObjectId, RelationEndPointId};

impl Engine {
    /// Creates a new object of `class` in `tx`.
    ///
    /// The object is `New`, holds default values and empty relations. Until a
    /// commit carries it upwards it is invalid in every ancestor of `tx`.
    pub fn new_object(&mut self, tx: TransactionId, class: &ClassId) -> TxResult<DomainObject> {
        self.ensure_writable(tx)?;
        let mapping = Arc::clone(&self.mapping);
        let class_def = mapping.class(class)?;

        self.notify(tx, |l, s| l.new_object_creating(s, class))?;

        let id = self.storage.create_new_object_id(class)?;
        self.register_container(tx, DataContainer::new_object(id.clone(), class_def))?;
        for def in class_def.virtual_end_points() {
            let ep_id = RelationEndPointId::new(id.clone(), def.property_name());
            let end_point = if def.is_collection() {
                RelationEndPoint::Collection(CollectionEndPoint::complete(ep_id, Vec::new()))
            } else {
                RelationEndPoint::VirtualObject(VirtualObjectEndPoint::new(ep_id, None))
            };
            self.register_end_point(tx, end_point)?;
        }
        let object = self.enlist(tx, &id)?;
        for ancestor in self.ancestors(tx) {
            self.node_mut(ancestor)?.data.mark_invalid(id.clone());
        }
        debug!(tx = %tx, object = %id, "new object");

        self.notify_after(tx, |l, s| {
            l.data_container_state_updated(s, &id, ObjectState::New)
        });
        Ok(object)
    }

    /// Deletes an object.
    ///
    /// Every relation of the object is torn down first, as ordinary relation
    /// changes on the opposite end points. A `New` object disappears
    /// immediately and becomes invalid. Deleting a deleted object is a no-op.
    ///
    /// # Errors
    ///
    /// - `ReadOnly` if `tx` has an active sub-transaction
    /// - `ObjectInvalid` if the object is invalid
    /// - any veto from an observer
    pub fn delete(&mut self, tx: TransactionId, object: &DomainObject) -> TxResult<()> {
        self.ensure_writable(tx)?;
        self.check_usable(tx, object)?;
        let id = object.id();
        self.ensure_loaded(tx, id)?;
        if self.container(tx, id)?.is_deleted() {
            return Ok(());
        }

        self.notify(tx, |l, s| l.object_deleting(s, object))?;
        self.notify_object(tx, object, |h, s| h.deleting(s, object))?;
        if self.container(tx, id)?.is_deleted() {
            return Ok(());
        }

        let changes = self.plan_delete(tx, id)?;
        self.execute_changes(tx, changes)?;

        let before = self.capture_states(tx, std::slice::from_ref(id));
        if self.container(tx, id)?.is_new() {
            self.unregister_container(tx, id, true)?;
            self.node_mut(tx)?.data.mark_invalid(id.clone());
        } else {
            self.container_mut(tx, id)?.delete();
        }
        debug!(tx = %tx, object = %id, "object deleted");

        self.notify_object_after(tx, object, |h, s| h.deleted(s, object));
        self.notify_after(tx, |l, s| l.object_deleted(s, object));
        self.publish_state_changes(tx, before);
        Ok(())
    }

    /// Plans the removal of `id` from every relation it takes part in.
    ///
    /// Opposite end points change with notification; the deleted object's own
    /// end points are cleared silently.
    fn plan_delete(&mut self, tx: TransactionId, id: &ObjectId) -> TxResult<Vec<EndPointChange>> {
        let mapping = Arc::clone(&self.mapping);
        let class = mapping.class(id.class_id())?;
        let mut opposite_changes = Vec::new();
        let mut own_changes = Vec::new();

        for def in class.end_points() {
            let opposite = mapping.opposite(def)?;
            let ep_id = RelationEndPointId::new(id.clone(), def.property_name());

            if def.is_collection() {
                let items = self.loaded_collection(tx, &ep_id)?.items().to_vec();
                if items.is_empty() {
                    continue;
                }
                self.load_containers(tx, &items, true)?;
                for item in items {
                    let item_ep = RelationEndPointId::new(item, opposite.property_name());
                    opposite_changes.push(EndPointChange::set(item_ep, Some(id.clone()), None));
                }
                own_changes.push(EndPointChange::silent(ep_id, ChangeKind::Clear));
                continue;
            }

            let Some(related) = self.related_id(tx, id, def, ValueAccess::Current)? else {
                continue;
            };
            let related_ep = RelationEndPointId::new(related.clone(), opposite.property_name());
            self.ensure_loaded(tx, &related)?;
            if opposite.is_virtual() {
                self.ensure_end_point_loaded(tx, &related_ep)?;
            }
            if opposite.is_collection() {
                opposite_changes.push(EndPointChange::new(
                    related_ep,
                    ChangeKind::Remove { item: id.clone() },
                ));
            } else {
                opposite_changes.push(EndPointChange::set(related_ep, Some(id.clone()), None));
            }
            own_changes.push(EndPointChange::silent(
                ep_id,
                ChangeKind::Set {
                    old: Some(related),
                    new: None,
                },
            ));
        }

        opposite_changes.extend(own_changes);
        Ok(opposite_changes)
    }

    /// Returns whether `object` is invalid in `tx`.
    pub fn is_invalid(&self, tx: TransactionId, object: &DomainObject) -> TxResult<bool> {
        Ok(self.object_state(tx, object)? == ObjectState::Invalid)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::TxError;
    use crate::testing::{customer, engine, item, order};
    use crate::types::ObjectState;

    #[test]
    fn new_object_is_invalid_in_parent() {
        let mut engine = engine();
        let root = engine.create_root_transaction();
        let sub = engine.create_sub_transaction(root).unwrap();
        let fresh = engine.new_object(sub, &"Order".into()).unwrap();

        assert_eq!(engine.object_state(sub, &fresh).unwrap(), ObjectState::New);
        assert_eq!(
            engine.object_state(root, &fresh).unwrap(),
            ObjectState::Invalid
        );
        assert!(engine
            .get_related_objects(sub, &fresh, "OrderItems")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn delete_tears_down_relations() {
        let mut engine = engine();
        let tx = engine.create_root_transaction();
        let order1 = engine.get_object(tx, &order(1), false).unwrap();
        let customer1 = engine.get_object(tx, &customer(1), false).unwrap();
        let item1 = engine.get_object(tx, &item(1), false).unwrap();

        engine.delete(tx, &order1).unwrap();
        engine.delete(tx, &order1).unwrap();

        assert_eq!(
            engine.object_state(tx, &order1).unwrap(),
            ObjectState::Deleted
        );
        assert!(!engine
            .get_related_objects(tx, &customer1, "Orders")
            .unwrap()
            .contains(&order1));
        assert_eq!(
            engine.get_related_object(tx, &item1, "Order").unwrap(),
            None
        );

        let err = engine.get_object(tx, &order(1), false).unwrap_err();
        assert!(matches!(err, TxError::ObjectDeleted { .. }));
        assert!(engine.get_object(tx, &order(1), true).is_ok());
        let err = engine.set_value(tx, &order1, "OrderNumber", 9).unwrap_err();
        assert!(matches!(err, TxError::ObjectDeleted { .. }));
    }

    #[test]
    fn deleting_new_object_discards_it() {
        let mut engine = engine();
        let tx = engine.create_root_transaction();
        let customer1 = engine.get_object(tx, &customer(1), false).unwrap();
        let fresh = engine.new_object(tx, &"Order".into()).unwrap();
        engine
            .set_related_object(tx, &fresh, "Customer", Some(&customer1))
            .unwrap();

        engine.delete(tx, &fresh).unwrap();
        assert_eq!(
            engine.object_state(tx, &fresh).unwrap(),
            ObjectState::Invalid
        );
        assert!(engine.is_invalid(tx, &fresh).unwrap());
        assert!(!engine
            .get_related_objects(tx, &customer1, "Orders")
            .unwrap()
            .contains(&fresh));
        let err = engine.get_value(tx, &fresh, "OrderNumber").unwrap_err();
        assert!(matches!(err, TxError::ObjectInvalid { .. }));
    }
}
