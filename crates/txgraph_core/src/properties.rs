//! Property value access.

use crate::domain_object::DomainObject;
use crate::engine::Engine;
use crate::error::{TxError, TxResult};
use crate::types::{TransactionId, ValueAccess};
use std::sync::Arc;
use txgraph_model::{RelationEndPointId, Value};
use txgraph_storage::Timestamp;

impl Engine {
    /// Returns the current value of a property, loading the object if needed.
    pub fn get_value(
        &mut self,
        tx: TransactionId,
        object: &DomainObject,
        property: &str,
    ) -> TxResult<Value> {
        self.read_value(tx, object, property, ValueAccess::Current)
    }

    /// Returns the value a property had when it was loaded or last committed.
    pub fn get_original_value(
        &mut self,
        tx: TransactionId,
        object: &DomainObject,
        property: &str,
    ) -> TxResult<Value> {
        self.read_value(tx, object, property, ValueAccess::Original)
    }

    fn read_value(
        &mut self,
        tx: TransactionId,
        object: &DomainObject,
        property: &str,
        access: ValueAccess,
    ) -> TxResult<Value> {
        self.check_usable(tx, object)?;
        self.mapping.property(object.class_id(), property)?;
        self.ensure_loaded(tx, object.id())?;

        self.notify_after(tx, |l, s| {
            l.property_value_reading(s, object, property, access)
        });
        let container = self.container(tx, object.id())?;
        let value = match access {
            ValueAccess::Current => container.value(property),
            ValueAccess::Original => container.original_value(property),
        }
        .cloned()
        .unwrap_or_default();
        self.notify_after(tx, |l, s| {
            l.property_value_read(s, object, property, &value, access);
        });
        Ok(value)
    }

    /// Sets a property value.
    ///
    /// Setting the current value again only touches the property.
    ///
    /// # Errors
    ///
    /// - `ReadOnly` if `tx` has an active sub-transaction
    /// - `UnknownProperty` if the class has no such property
    /// - `InvalidOperation` for foreign keys; use [`Engine::set_related_object`]
    /// - `TypeMismatch` if the value does not fit the property definition
    /// - `ObjectDeleted` if the object is deleted
    /// - any veto from an observer
    pub fn set_value(
        &mut self,
        tx: TransactionId,
        object: &DomainObject,
        property: &str,
        value: impl Into<Value>,
    ) -> TxResult<()> {
        let value = value.into();
        self.ensure_writable(tx)?;
        self.check_usable(tx, object)?;

        let mapping = Arc::clone(&self.mapping);
        let def = mapping.property(object.class_id(), property)?;
        if def.is_foreign_key() {
            return Err(TxError::invalid_operation(format!(
                "property '{property}' of '{}' is a relation and cannot be set as a value",
                object.id()
            )));
        }
        if !def.accepts(&value) {
            return Err(TxError::TypeMismatch {
                id: object.id().clone(),
                property: property.to_string(),
                value,
            });
        }
        self.ensure_live(tx, object.id())?;

        let id = object.id();
        let old = self
            .container(tx, id)?
            .value(property)
            .cloned()
            .unwrap_or_default();
        if old == value {
            self.container_mut(tx, id)?.touch(property);
            return Ok(());
        }

        let before = self.capture_states(tx, std::slice::from_ref(id));
        self.notify(tx, |l, s| {
            l.property_value_changing(s, object, property, &old, &value)
        })?;
        self.notify_object(tx, object, |h, s| {
            h.property_changing(s, object, property, &old, &value)
        })?;

        self.container_mut(tx, id)?
            .set_value(property, value.clone());

        self.notify_object_after(tx, object, |h, s| {
            h.property_changed(s, object, property, &old, &value);
        });
        self.notify_after(tx, |l, s| {
            l.property_value_changed(s, object, property, &old, &value);
        });
        self.publish_state_changes(tx, before);
        Ok(())
    }

    /// Marks a property or virtual relation as touched without changing it.
    pub fn touch_value(
        &mut self,
        tx: TransactionId,
        object: &DomainObject,
        property: &str,
    ) -> TxResult<()> {
        self.ensure_writable(tx)?;
        self.check_usable(tx, object)?;
        self.ensure_live(tx, object.id())?;

        let mapping = Arc::clone(&self.mapping);
        let class = mapping.class(object.class_id())?;
        if class.property(property).is_some() {
            self.container_mut(tx, object.id())?.touch(property);
            return Ok(());
        }
        mapping.end_point(object.class_id(), property)?;
        let ep_id = RelationEndPointId::new(object.id().clone(), property);
        self.ensure_end_point_loaded(tx, &ep_id)?;
        if let Some(ep) = self.node_mut(tx)?.data.end_point_mut(&ep_id) {
            ep.touch();
        }
        Ok(())
    }

    /// Returns whether a property or virtual relation was touched.
    pub fn is_touched(
        &mut self,
        tx: TransactionId,
        object: &DomainObject,
        property: &str,
    ) -> TxResult<bool> {
        self.check_usable(tx, object)?;
        self.ensure_loaded(tx, object.id())?;

        let class = self.mapping.class(object.class_id())?;
        if class.property(property).is_some() {
            return Ok(self
                .container(tx, object.id())?
                .property(property)
                .is_some_and(|p| p.is_touched()));
        }
        self.mapping.end_point(object.class_id(), property)?;
        let ep_id = RelationEndPointId::new(object.id().clone(), property);
        Ok(self
            .node(tx)?
            .data
            .end_point(&ep_id)
            .is_some_and(|ep| ep.is_touched()))
    }

    /// Returns whether a property or virtual relation differs from its
    /// original value.
    pub fn has_changed(
        &mut self,
        tx: TransactionId,
        object: &DomainObject,
        property: &str,
    ) -> TxResult<bool> {
        self.check_usable(tx, object)?;
        self.ensure_loaded(tx, object.id())?;

        let class = self.mapping.class(object.class_id())?;
        if class.property(property).is_some() {
            return Ok(self
                .container(tx, object.id())?
                .property(property)
                .is_some_and(|p| p.has_changed()));
        }
        self.mapping.end_point(object.class_id(), property)?;
        let ep_id = RelationEndPointId::new(object.id().clone(), property);
        Ok(self
            .node(tx)?
            .data
            .end_point(&ep_id)
            .is_some_and(|ep| ep.has_changed()))
    }

    /// Forces an unchanged object into the `Changed` state.
    ///
    /// # Errors
    ///
    /// - `InvalidOperation` for new objects
    /// - `ObjectDeleted` for deleted objects
    pub fn mark_as_changed(&mut self, tx: TransactionId, object: &DomainObject) -> TxResult<()> {
        self.ensure_writable(tx)?;
        self.check_usable(tx, object)?;
        self.ensure_live(tx, object.id())?;
        if self.container(tx, object.id())?.is_new() {
            return Err(TxError::invalid_operation(format!(
                "new object '{}' cannot be marked as changed",
                object.id()
            )));
        }
        let before = self.capture_states(tx, std::slice::from_ref(object.id()));
        self.container_mut(tx, object.id())?.mark_changed();
        self.publish_state_changes(tx, before);
        Ok(())
    }

    /// Returns the timestamp the object was loaded with; `None` for new
    /// objects.
    pub fn timestamp(
        &mut self,
        tx: TransactionId,
        object: &DomainObject,
    ) -> TxResult<Option<Timestamp>> {
        self.check_usable(tx, object)?;
        self.ensure_loaded(tx, object.id())?;
        Ok(self.container(tx, object.id())?.timestamp())
    }
}
