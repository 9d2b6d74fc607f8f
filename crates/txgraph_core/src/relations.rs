//! Bidirectional relation access and modification.
//!
//! A modification is planned as a list of [`EndPointChange`]s covering both
//! sides of every affected edge. All affected end points are loaded before
//! anything is announced. Then every "changing" event fires, every end point
//! is updated, and every "changed" event fires in reverse order. An observer
//! veto therefore leaves all end points untouched.
//!
//! Within one step, events nest as pipeline, object handlers and collection
//! handlers on the way in, and the other way round on the way out.

use crate::domain_object::DomainObject;
use crate::endpoint::{ChangeKind, EndPointChange, RelationEndPoint};
use crate::engine::Engine;
use crate::error::{TxError, TxResult};
use crate::types::{TransactionId, ValueAccess};
use std::collections::BTreeSet;
use std::sync::Arc;
use txgraph_model::{ObjectId, RelationEndPointDefinition, RelationEndPointId, Value};

/// An [`EndPointChange`] with its objects resolved to references.
struct ResolvedChange {
    change: EndPointChange,
    object: DomainObject,
    old: Option<DomainObject>,
    new: Option<DomainObject>,
}

impl Engine {
    // =========================================================================
    // Reading
    // =========================================================================

    /// Returns the object a scalar relation points to.
    pub fn get_related_object(
        &mut self,
        tx: TransactionId,
        object: &DomainObject,
        property: &str,
    ) -> TxResult<Option<DomainObject>> {
        self.read_related_object(tx, object, property, ValueAccess::Current)
    }

    /// Returns the object a scalar relation pointed to when it was loaded or
    /// last committed.
    pub fn get_original_related_object(
        &mut self,
        tx: TransactionId,
        object: &DomainObject,
        property: &str,
    ) -> TxResult<Option<DomainObject>> {
        self.read_related_object(tx, object, property, ValueAccess::Original)
    }

    /// Returns the objects of a collection relation, in collection order.
    ///
    /// Every member is loaded in one bulk request.
    pub fn get_related_objects(
        &mut self,
        tx: TransactionId,
        object: &DomainObject,
        property: &str,
    ) -> TxResult<Vec<DomainObject>> {
        self.read_related_objects(tx, object, property, ValueAccess::Current)
    }

    /// Returns the members of a collection relation as loaded or last
    /// committed.
    pub fn get_original_related_objects(
        &mut self,
        tx: TransactionId,
        object: &DomainObject,
        property: &str,
    ) -> TxResult<Vec<DomainObject>> {
        self.read_related_objects(tx, object, property, ValueAccess::Original)
    }

    fn read_related_object(
        &mut self,
        tx: TransactionId,
        object: &DomainObject,
        property: &str,
        access: ValueAccess,
    ) -> TxResult<Option<DomainObject>> {
        self.check_usable(tx, object)?;
        let mapping = Arc::clone(&self.mapping);
        let def = mapping.end_point(object.class_id(), property)?;
        if def.is_collection() {
            return Err(TxError::invalid_operation(format!(
                "'{property}' of '{}' is a collection relation",
                object.id()
            )));
        }
        self.ensure_loaded(tx, object.id())?;

        self.notify_after(tx, |l, s| l.relation_reading(s, object, property, access));
        let related = match self.related_id(tx, object.id(), def, access)? {
            Some(id) => Some(self.enlist(tx, &id)?),
            None => None,
        };
        let read: Vec<DomainObject> = related.iter().cloned().collect();
        self.notify_after(tx, |l, s| {
            l.relation_read(s, object, property, &read, access)
        });
        Ok(related)
    }

    fn read_related_objects(
        &mut self,
        tx: TransactionId,
        object: &DomainObject,
        property: &str,
        access: ValueAccess,
    ) -> TxResult<Vec<DomainObject>> {
        self.check_usable(tx, object)?;
        let mapping = Arc::clone(&self.mapping);
        let def = mapping.end_point(object.class_id(), property)?;
        if !def.is_collection() {
            return Err(TxError::invalid_operation(format!(
                "'{property}' of '{}' is not a collection relation",
                object.id()
            )));
        }
        self.ensure_loaded(tx, object.id())?;

        self.notify_after(tx, |l, s| l.relation_reading(s, object, property, access));
        let ep_id = RelationEndPointId::new(object.id().clone(), property);
        let collection = self.loaded_collection(tx, &ep_id)?;
        let ids = match access {
            ValueAccess::Current => collection.items().to_vec(),
            ValueAccess::Original => collection.original_items().to_vec(),
        };
        if access == ValueAccess::Current {
            self.load_containers(tx, &ids, false)?;
        }
        let related = ids
            .iter()
            .map(|id| self.enlist(tx, id))
            .collect::<TxResult<Vec<_>>>()?;
        self.notify_after(tx, |l, s| {
            l.relation_read(s, object, property, &related, access)
        });
        Ok(related)
    }

    /// Returns the ID a scalar end point points to.
    ///
    /// Real end points read the foreign key of the loaded container.
    pub(crate) fn related_id(
        &mut self,
        tx: TransactionId,
        id: &ObjectId,
        def: &RelationEndPointDefinition,
        access: ValueAccess,
    ) -> TxResult<Option<ObjectId>> {
        if !def.is_virtual() {
            let container = self.container(tx, id)?;
            let value = match access {
                ValueAccess::Current => container.value(def.property_name()),
                ValueAccess::Original => container.original_value(def.property_name()),
            };
            return Ok(value.and_then(Value::as_object_id).cloned());
        }
        let ep_id = RelationEndPointId::new(id.clone(), def.property_name());
        self.ensure_end_point_loaded(tx, &ep_id)?;
        match self.node(tx)?.data.end_point(&ep_id) {
            Some(RelationEndPoint::VirtualObject(ep)) => Ok(match access {
                ValueAccess::Current => ep.related().cloned(),
                ValueAccess::Original => ep.original_related().cloned(),
            }),
            _ => Err(TxError::invalid_operation(format!(
                "'{ep_id}' is not a scalar end point"
            ))),
        }
    }

    /// Loads whatever an end point needs before it can be modified.
    fn prepare_end_point(
        &mut self,
        tx: TransactionId,
        ep_id: &RelationEndPointId,
        def: &RelationEndPointDefinition,
    ) -> TxResult<()> {
        self.ensure_loaded(tx, ep_id.object_id())?;
        if def.is_virtual() {
            self.ensure_end_point_loaded(tx, ep_id)?;
        }
        Ok(())
    }

    // =========================================================================
    // Scalar modification
    // =========================================================================

    /// Points a scalar relation at `new`, updating every opposite end point.
    ///
    /// For a one-to-one relation, the previous partner of `new` loses it.
    /// Setting the current value again only touches the end point.
    ///
    /// # Errors
    ///
    /// - `ReadOnly` if `tx` has an active sub-transaction
    /// - `CrossTransaction` if the objects belong to different transactions
    /// - `TypeMismatch` if `new` is not of the related class
    /// - `ObjectDeleted` if either object is deleted
    /// - any veto from an observer
    pub fn set_related_object(
        &mut self,
        tx: TransactionId,
        object: &DomainObject,
        property: &str,
        new: Option<&DomainObject>,
    ) -> TxResult<()> {
        self.ensure_writable(tx)?;
        self.check_usable(tx, object)?;
        if let Some(new) = new {
            self.check_relation_participants(tx, object, new)?;
        }
        let mapping = Arc::clone(&self.mapping);
        let def = mapping.end_point(object.class_id(), property)?;
        if def.is_collection() {
            return Err(TxError::invalid_operation(format!(
                "'{property}' of '{}' is a collection relation",
                object.id()
            )));
        }
        if let Some(new) = new {
            self.check_related_class(object, def, new)?;
        }
        self.ensure_live(tx, object.id())?;
        if let Some(new) = new {
            self.ensure_live(tx, new.id())?;
        }

        let changes = self.plan_set(tx, object.id(), def, new.map(DomainObject::id))?;
        self.execute_changes(tx, changes)
    }

    fn plan_set(
        &mut self,
        tx: TransactionId,
        this: &ObjectId,
        def: &RelationEndPointDefinition,
        new: Option<&ObjectId>,
    ) -> TxResult<Vec<EndPointChange>> {
        let mapping = Arc::clone(&self.mapping);
        let opposite = mapping.opposite(def)?;
        let this_ep = RelationEndPointId::new(this.clone(), def.property_name());
        self.prepare_end_point(tx, &this_ep, def)?;

        let old = self.related_id(tx, this, def, ValueAccess::Current)?;
        if old.as_ref() == new {
            self.touch_end_point(tx, &this_ep, def)?;
            return Ok(Vec::new());
        }

        let mut changes = vec![EndPointChange::set(this_ep, old.clone(), new.cloned())];

        if let Some(new) = new {
            let new_ep = RelationEndPointId::new(new.clone(), opposite.property_name());
            self.prepare_end_point(tx, &new_ep, opposite)?;
            if opposite.is_collection() {
                let index = self.loaded_collection(tx, &new_ep)?.items().len();
                changes.push(EndPointChange::new(
                    new_ep,
                    ChangeKind::Insert {
                        index,
                        item: this.clone(),
                    },
                ));
            } else {
                let partner = self.related_id(tx, new, opposite, ValueAccess::Current)?;
                let change = EndPointChange::set(new_ep, partner.clone(), Some(this.clone()));
                changes.push(change);
                if let Some(partner) = partner {
                    let partner_ep = RelationEndPointId::new(partner, def.property_name());
                    self.prepare_end_point(tx, &partner_ep, def)?;
                    changes.push(EndPointChange::set(partner_ep, Some(new.clone()), None));
                }
            }
        }

        if let Some(old) = old {
            let old_ep = RelationEndPointId::new(old, opposite.property_name());
            self.prepare_end_point(tx, &old_ep, opposite)?;
            if opposite.is_collection() {
                changes.push(EndPointChange::new(
                    old_ep,
                    ChangeKind::Remove { item: this.clone() },
                ));
            } else {
                changes.push(EndPointChange::set(old_ep, Some(this.clone()), None));
            }
        }
        Ok(changes)
    }

    fn touch_end_point(
        &mut self,
        tx: TransactionId,
        ep_id: &RelationEndPointId,
        def: &RelationEndPointDefinition,
    ) -> TxResult<()> {
        if def.is_virtual() {
            if let Some(ep) = self.node_mut(tx)?.data.end_point_mut(ep_id) {
                ep.touch();
            }
        } else {
            self.container_mut(tx, ep_id.object_id())?
                .touch(def.property_name());
        }
        Ok(())
    }

    fn check_related_class(
        &self,
        object: &DomainObject,
        def: &RelationEndPointDefinition,
        related: &DomainObject,
    ) -> TxResult<()> {
        if related.class_id() == def.opposite_class_id() {
            return Ok(());
        }
        Err(TxError::TypeMismatch {
            id: object.id().clone(),
            property: def.property_name().to_string(),
            value: Value::Object(related.id().clone()),
        })
    }

    // =========================================================================
    // Collection modification
    // =========================================================================

    /// Appends `item` to a collection relation.
    ///
    /// `item` leaves the collection it belonged to before.
    pub fn add_related_object(
        &mut self,
        tx: TransactionId,
        owner: &DomainObject,
        property: &str,
        item: &DomainObject,
    ) -> TxResult<()> {
        let ep_id = self.prepare_collection_change(tx, owner, property, item)?;
        let index = self.loaded_collection(tx, &ep_id)?.items().len();
        self.insert_prepared(tx, owner, property, index, item)
    }

    /// Inserts `item` into a collection relation at `index`.
    ///
    /// # Errors
    ///
    /// - `InvalidOperation` if the collection already contains `item` or
    ///   `index` is past its end
    /// - the errors of [`Engine::set_related_object`]
    pub fn insert_related_object(
        &mut self,
        tx: TransactionId,
        owner: &DomainObject,
        property: &str,
        index: usize,
        item: &DomainObject,
    ) -> TxResult<()> {
        self.prepare_collection_change(tx, owner, property, item)?;
        self.insert_prepared(tx, owner, property, index, item)
    }

    fn insert_prepared(
        &mut self,
        tx: TransactionId,
        owner: &DomainObject,
        property: &str,
        index: usize,
        item: &DomainObject,
    ) -> TxResult<()> {
        let ep_id = RelationEndPointId::new(owner.id().clone(), property);
        let collection = self.loaded_collection(tx, &ep_id)?;
        if collection.contains(item.id()) {
            return Err(TxError::invalid_operation(format!(
                "'{ep_id}' already contains '{}'",
                item.id()
            )));
        }
        if index > collection.items().len() {
            return Err(TxError::invalid_operation(format!(
                "index {index} is out of range for '{ep_id}' with {} items",
                collection.items().len()
            )));
        }

        let mapping = Arc::clone(&self.mapping);
        let def = mapping.end_point_for(&ep_id)?;
        let opposite = mapping.opposite(def)?;
        let item_ep = RelationEndPointId::new(item.id().clone(), opposite.property_name());
        self.prepare_end_point(tx, &item_ep, opposite)?;
        let previous = self.related_id(tx, item.id(), opposite, ValueAccess::Current)?;

        let mut changes = vec![
            EndPointChange::new(
                ep_id,
                ChangeKind::Insert {
                    index,
                    item: item.id().clone(),
                },
            ),
            EndPointChange::set(item_ep, previous.clone(), Some(owner.id().clone())),
        ];
        if let Some(previous) = previous {
            let previous_ep = RelationEndPointId::new(previous, property);
            self.prepare_end_point(tx, &previous_ep, def)?;
            changes.push(EndPointChange::new(
                previous_ep,
                ChangeKind::Remove {
                    item: item.id().clone(),
                },
            ));
        }
        self.execute_changes(tx, changes)
    }

    /// Removes `item` from a collection relation; its foreign key is cleared.
    ///
    /// Returns `false` if the collection does not contain `item`.
    pub fn remove_related_object(
        &mut self,
        tx: TransactionId,
        owner: &DomainObject,
        property: &str,
        item: &DomainObject,
    ) -> TxResult<bool> {
        let ep_id = self.prepare_collection_change(tx, owner, property, item)?;
        if !self.loaded_collection(tx, &ep_id)?.contains(item.id()) {
            return Ok(false);
        }

        let mapping = Arc::clone(&self.mapping);
        let opposite = mapping.opposite(mapping.end_point_for(&ep_id)?)?;
        let item_ep = RelationEndPointId::new(item.id().clone(), opposite.property_name());
        self.prepare_end_point(tx, &item_ep, opposite)?;

        let changes = vec![
            EndPointChange::new(
                ep_id,
                ChangeKind::Remove {
                    item: item.id().clone(),
                },
            ),
            EndPointChange::set(item_ep, Some(owner.id().clone()), None),
        ];
        self.execute_changes(tx, changes)?;
        Ok(true)
    }

    /// Replaces the member at `index` with `item`.
    ///
    /// The replaced member's foreign key is cleared.
    pub fn replace_related_object(
        &mut self,
        tx: TransactionId,
        owner: &DomainObject,
        property: &str,
        index: usize,
        item: &DomainObject,
    ) -> TxResult<()> {
        let ep_id = self.prepare_collection_change(tx, owner, property, item)?;
        let collection = self.loaded_collection(tx, &ep_id)?;
        let Some(replaced) = collection.items().get(index).cloned() else {
            return Err(TxError::invalid_operation(format!(
                "index {index} is out of range for '{ep_id}' with {} items",
                collection.items().len()
            )));
        };
        if &replaced == item.id() {
            if let Some(ep) = self.node_mut(tx)?.data.end_point_mut(&ep_id) {
                ep.touch();
            }
            return Ok(());
        }
        if collection.contains(item.id()) {
            return Err(TxError::invalid_operation(format!(
                "'{ep_id}' already contains '{}'",
                item.id()
            )));
        }

        let mapping = Arc::clone(&self.mapping);
        let def = mapping.end_point_for(&ep_id)?;
        let opposite = mapping.opposite(def)?;
        let item_ep = RelationEndPointId::new(item.id().clone(), opposite.property_name());
        let replaced_ep = RelationEndPointId::new(replaced.clone(), opposite.property_name());
        self.prepare_end_point(tx, &item_ep, opposite)?;
        self.prepare_end_point(tx, &replaced_ep, opposite)?;
        let previous = self.related_id(tx, item.id(), opposite, ValueAccess::Current)?;

        let mut changes = vec![
            EndPointChange::new(
                ep_id,
                ChangeKind::Replace {
                    index,
                    old: replaced,
                    new: item.id().clone(),
                },
            ),
            EndPointChange::set(item_ep, previous.clone(), Some(owner.id().clone())),
            EndPointChange::set(replaced_ep, Some(owner.id().clone()), None),
        ];
        if let Some(previous) = previous {
            let previous_ep = RelationEndPointId::new(previous, property);
            self.prepare_end_point(tx, &previous_ep, def)?;
            changes.push(EndPointChange::new(
                previous_ep,
                ChangeKind::Remove {
                    item: item.id().clone(),
                },
            ));
        }
        self.execute_changes(tx, changes)
    }

    /// Replaces the whole contents of a collection relation.
    ///
    /// Runs one removal per dropped member and one insertion per new member,
    /// then brings the collection into the order of `items` without further
    /// events.
    ///
    /// # Errors
    ///
    /// - `InvalidOperation` if `items` contains duplicates
    /// - the errors of [`Engine::add_related_object`]
    pub fn set_related_objects(
        &mut self,
        tx: TransactionId,
        owner: &DomainObject,
        property: &str,
        items: &[DomainObject],
    ) -> TxResult<()> {
        let mut seen = BTreeSet::new();
        if let Some(duplicate) = items.iter().find(|item| !seen.insert(item.id())) {
            return Err(TxError::invalid_operation(format!(
                "'{}' appears more than once in the new contents of '{property}'",
                duplicate.id()
            )));
        }
        let ep_id = RelationEndPointId::new(owner.id().clone(), property);
        for item in items {
            self.prepare_collection_change(tx, owner, property, item)?;
        }
        if items.is_empty() {
            self.ensure_writable(tx)?;
            self.check_usable(tx, owner)?;
            self.mapping.end_point(owner.class_id(), property)?;
            self.ensure_live(tx, owner.id())?;
        }

        let current = self.loaded_collection(tx, &ep_id)?.items().to_vec();
        for id in current.iter().filter(|id| !seen.contains(id)) {
            let item = self.enlist(tx, id)?;
            self.remove_related_object(tx, owner, property, &item)?;
        }
        for item in items {
            if !current.contains(item.id()) {
                self.add_related_object(tx, owner, property, item)?;
            }
        }

        let target: Vec<ObjectId> = items.iter().map(|item| item.id().clone()).collect();
        if self.loaded_collection(tx, &ep_id)?.items() != target.as_slice() {
            let before = self.capture_states(tx, std::slice::from_ref(owner.id()));
            if let Some(RelationEndPoint::Collection(ep)) =
                self.node_mut(tx)?.data.end_point_mut(&ep_id)
            {
                ep.reorder(target);
            }
            self.publish_state_changes(tx, before);
        }
        Ok(())
    }

    /// Runs the checks shared by every collection modification.
    fn prepare_collection_change(
        &mut self,
        tx: TransactionId,
        owner: &DomainObject,
        property: &str,
        item: &DomainObject,
    ) -> TxResult<RelationEndPointId> {
        self.ensure_writable(tx)?;
        self.check_relation_participants(tx, owner, item)?;
        let mapping = Arc::clone(&self.mapping);
        let def = mapping.end_point(owner.class_id(), property)?;
        if !def.is_collection() {
            return Err(TxError::invalid_operation(format!(
                "'{property}' of '{}' is not a collection relation",
                owner.id()
            )));
        }
        self.check_related_class(owner, def, item)?;
        self.ensure_live(tx, owner.id())?;
        self.ensure_live(tx, item.id())?;
        let ep_id = RelationEndPointId::new(owner.id().clone(), property);
        self.ensure_end_point_loaded(tx, &ep_id)?;
        Ok(ep_id)
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Announces, performs and reports a planned modification.
    pub(crate) fn execute_changes(
        &mut self,
        tx: TransactionId,
        changes: Vec<EndPointChange>,
    ) -> TxResult<()> {
        if changes.is_empty() {
            return Ok(());
        }
        let mut resolved = Vec::with_capacity(changes.len());
        for change in changes {
            let object = self.enlist(tx, change.end_point.object_id())?;
            let old = match change.old_related() {
                Some(id) => Some(self.enlist(tx, id)?),
                None => None,
            };
            let new = match change.new_related() {
                Some(id) => Some(self.enlist(tx, id)?),
                None => None,
            };
            resolved.push(ResolvedChange {
                change,
                object,
                old,
                new,
            });
        }

        let mut affected: Vec<ObjectId> = Vec::new();
        for r in &resolved {
            let id = r.change.end_point.object_id();
            if !affected.contains(id) {
                affected.push(id.clone());
            }
        }
        let states_before = self.capture_states(tx, &affected);
        let end_points_before = self.capture_end_point_states(tx, &resolved)?;

        for r in resolved.iter().filter(|r| r.change.notify) {
            self.begin_change(tx, r)?;
        }
        for r in &resolved {
            self.perform_change(tx, &r.change)?;
        }
        for r in resolved.iter().rev().filter(|r| r.change.notify) {
            self.end_change(tx, r);
        }

        self.publish_state_changes(tx, states_before);
        for (ep_id, was_changed) in end_points_before {
            let changed = self
                .node(tx)?
                .data
                .end_point(&ep_id)
                .is_some_and(RelationEndPoint::has_changed);
            if changed != was_changed {
                self.notify_after(tx, |l, s| {
                    l.virtual_relation_end_point_state_updated(s, &ep_id, changed);
                });
            }
        }
        Ok(())
    }

    fn capture_end_point_states(
        &self,
        tx: TransactionId,
        resolved: &[ResolvedChange],
    ) -> TxResult<Vec<(RelationEndPointId, bool)>> {
        let node = self.node(tx)?;
        Ok(resolved
            .iter()
            .filter_map(|r| {
                let ep = node.data.end_point(&r.change.end_point)?;
                ep.is_virtual().then(|| (ep.id().clone(), ep.has_changed()))
            })
            .collect())
    }

    fn begin_change(&mut self, tx: TransactionId, r: &ResolvedChange) -> TxResult<()> {
        let property = r.change.end_point.property();
        let (object, old, new) = (&r.object, r.old.as_ref(), r.new.as_ref());

        self.notify(tx, |l, s| {
            l.relation_changing(s, object, property, old, new)
        })?;
        self.notify_object(tx, object, |h, s| {
            h.relation_changing(s, object, property, old, new)
        })?;
        if let Some(old) = old.filter(|_| r.change.kind.removes_item()) {
            self.notify_collection(tx, object, property, |h, s| {
                h.removing(s, object, property, old)
            })?;
        }
        if let Some(new) = new.filter(|_| r.change.kind.adds_item()) {
            self.notify_collection(tx, object, property, |h, s| {
                h.adding(s, object, property, new)
            })?;
        }
        Ok(())
    }

    fn end_change(&mut self, tx: TransactionId, r: &ResolvedChange) {
        let property = r.change.end_point.property();
        let (object, old, new) = (&r.object, r.old.as_ref(), r.new.as_ref());

        if let Some(old) = old.filter(|_| r.change.kind.removes_item()) {
            self.notify_collection_after(tx, object, property, |h, s| {
                h.removed(s, object, property, old);
            });
        }
        if let Some(new) = new.filter(|_| r.change.kind.adds_item()) {
            self.notify_collection_after(tx, object, property, |h, s| {
                h.added(s, object, property, new);
            });
        }
        self.notify_object_after(tx, object, |h, s| {
            h.relation_changed(s, object, property, old, new);
        });
        self.notify_after(tx, |l, s| l.relation_changed(s, object, property, old, new));
    }

    fn perform_change(&mut self, tx: TransactionId, change: &EndPointChange) -> TxResult<()> {
        let ep_id = &change.end_point;
        let is_virtual = self.mapping.end_point_for(ep_id)?.is_virtual();
        if !is_virtual {
            let ChangeKind::Set { new, .. } = &change.kind else {
                return Err(TxError::invalid_operation(format!(
                    "'{ep_id}' is a foreign key and holds a single object"
                )));
            };
            self.container_mut(tx, ep_id.object_id())?
                .set_value(ep_id.property(), Value::from_reference(new.as_ref()));
            return Ok(());
        }

        let data = &mut self.node_mut(tx)?.data;
        match (data.end_point_mut(ep_id), &change.kind) {
            (Some(RelationEndPoint::VirtualObject(ep)), ChangeKind::Set { new, .. }) => {
                ep.set(new.clone());
            }
            (Some(RelationEndPoint::Collection(ep)), ChangeKind::Insert { index, item }) => {
                ep.insert(*index, item.clone());
            }
            (Some(RelationEndPoint::Collection(ep)), ChangeKind::Remove { item }) => {
                ep.remove(item);
            }
            (Some(RelationEndPoint::Collection(ep)), ChangeKind::Replace { index, new, .. }) => {
                ep.replace(*index, new.clone());
            }
            (Some(RelationEndPoint::Collection(ep)), ChangeKind::Clear) => ep.clear(),
            _ => {
                return Err(TxError::invalid_operation(format!(
                    "end point '{ep_id}' is not loaded for this modification"
                )))
            }
        }
        Ok(())
    }
}
