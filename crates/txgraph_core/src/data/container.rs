//! Per-transaction data of one object.

use super::property_value::PropertyValue;
use std::collections::BTreeMap;
use txgraph_model::{ClassDefinition, ObjectId, Value};
use txgraph_storage::{StoredRecord, Timestamp};

/// Lifecycle of the data held by a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerLifecycle {
    /// Created in the owning transaction.
    New,
    /// Loaded from storage or from a parent transaction.
    Existing,
    /// Deleted in the owning transaction.
    Deleted,
}

/// The property values of one object in one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataContainer {
    id: ObjectId,
    timestamp: Option<Timestamp>,
    values: BTreeMap<String, PropertyValue>,
    lifecycle: ContainerLifecycle,
    marked_changed: bool,
}

impl DataContainer {
    /// Creates the container of a freshly created object.
    ///
    /// Every mapped property starts at its default.
    #[must_use]
    pub fn new_object(id: ObjectId, class: &ClassDefinition) -> Self {
        let values = class
            .properties()
            .iter()
            .map(|p| {
                let value = PropertyValue::new(p.default_value());
                (p.name().to_string(), value)
            })
            .collect();
        Self {
            id,
            timestamp: None,
            values,
            lifecycle: ContainerLifecycle::New,
            marked_changed: false,
        }
    }

    /// Creates the container of an object loaded from storage.
    ///
    /// Properties the record lacks start at their default.
    #[must_use]
    pub fn from_record(record: StoredRecord, class: &ClassDefinition) -> Self {
        let StoredRecord {
            id,
            timestamp,
            mut values,
        } = record;
        let values = class
            .properties()
            .iter()
            .map(|p| {
                let value = values
                    .remove(p.name())
                    .unwrap_or_else(|| p.default_value());
                (p.name().to_string(), PropertyValue::new(value))
            })
            .collect();
        Self {
            id,
            timestamp: Some(timestamp),
            values,
            lifecycle: ContainerLifecycle::Existing,
            marked_changed: false,
        }
    }

    /// Creates the container a sub-transaction sees for this object.
    ///
    /// The parent's current values become the sub's original values.
    #[must_use]
    pub fn clone_for_sub(&self) -> Self {
        let values = self
            .values
            .iter()
            .map(|(name, v)| {
                let value = PropertyValue::new(v.value().clone());
                (name.clone(), value)
            })
            .collect();
        Self {
            id: self.id.clone(),
            timestamp: self.timestamp,
            values,
            lifecycle: ContainerLifecycle::Existing,
            marked_changed: false,
        }
    }

    /// Creates the parent's container for an object a sub-transaction created.
    #[must_use]
    pub(crate) fn new_from_sub(sub: &DataContainer) -> Self {
        let values = sub
            .values
            .iter()
            .map(|(name, v)| {
                let value = PropertyValue::new(v.value().clone());
                (name.clone(), value)
            })
            .collect();
        Self {
            id: sub.id.clone(),
            timestamp: None,
            values,
            lifecycle: ContainerLifecycle::New,
            marked_changed: false,
        }
    }

    /// Returns the object ID.
    #[must_use]
    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    /// Returns the storage timestamp; `None` for new objects.
    #[must_use]
    pub fn timestamp(&self) -> Option<Timestamp> {
        self.timestamp
    }

    /// Returns the lifecycle.
    #[must_use]
    pub fn lifecycle(&self) -> ContainerLifecycle {
        self.lifecycle
    }

    /// Returns whether the object was created in this transaction.
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.lifecycle == ContainerLifecycle::New
    }

    /// Returns whether the object was deleted in this transaction.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.lifecycle == ContainerLifecycle::Deleted
    }

    /// Returns whether the object was explicitly marked as changed.
    #[must_use]
    pub fn is_marked_changed(&self) -> bool {
        self.marked_changed
    }

    /// Returns whether any property differs from its original value.
    #[must_use]
    pub fn has_changed_values(&self) -> bool {
        self.values.values().any(PropertyValue::has_changed)
    }

    /// Returns whether any property was written, even with an equal value.
    #[must_use]
    pub fn has_touched_values(&self) -> bool {
        self.values.values().any(PropertyValue::is_touched)
    }

    /// Returns the tracked value of a property.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.values.get(name)
    }

    /// Returns the current value of a property.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name).map(PropertyValue::value)
    }

    /// Returns the original value of a property.
    #[must_use]
    pub fn original_value(&self, name: &str) -> Option<&Value> {
        self.values.get(name).map(PropertyValue::original_value)
    }

    /// Returns all current values.
    #[must_use]
    pub fn current_values(&self) -> BTreeMap<String, Value> {
        self.values
            .iter()
            .map(|(name, v)| (name.clone(), v.value().clone()))
            .collect()
    }

    /// Returns all original values.
    #[must_use]
    pub fn original_values(&self) -> BTreeMap<String, Value> {
        self.values
            .iter()
            .map(|(name, v)| (name.clone(), v.original_value().clone()))
            .collect()
    }

    pub(crate) fn set_value(&mut self, name: &str, value: Value) {
        if let Some(property) = self.values.get_mut(name) {
            property.set(value);
        }
    }

    pub(crate) fn touch(&mut self, name: &str) {
        if let Some(property) = self.values.get_mut(name) {
            property.touch();
        }
    }

    pub(crate) fn mark_changed(&mut self) {
        self.marked_changed = true;
    }

    pub(crate) fn delete(&mut self) {
        self.lifecycle = ContainerLifecycle::Deleted;
    }

    /// Makes the current state the committed state.
    pub(crate) fn commit(&mut self, timestamp: Option<Timestamp>) {
        for value in self.values.values_mut() {
            value.commit();
        }
        if timestamp.is_some() {
            self.timestamp = timestamp;
        }
        self.lifecycle = ContainerLifecycle::Existing;
        self.marked_changed = false;
    }

    /// Restores the committed state of an existing object.
    pub(crate) fn rollback(&mut self) {
        for value in self.values.values_mut() {
            value.rollback();
        }
        self.lifecycle = ContainerLifecycle::Existing;
        self.marked_changed = false;
    }

    /// Takes over the state a sub-transaction committed for this object.
    pub(crate) fn apply_from_sub(&mut self, sub: &DataContainer) {
        for (name, value) in &sub.values {
            if let Some(own) = self.values.get_mut(name) {
                own.set_from_sub(value);
            }
        }
        self.marked_changed |= sub.marked_changed;
    }
}
