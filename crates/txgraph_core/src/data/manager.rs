//! Per-transaction maps of data containers and relation end points.

use super::container::DataContainer;
use crate::endpoint::RelationEndPoint;
use crate::types::ObjectState;
use std::collections::{BTreeMap, BTreeSet};
use txgraph_model::{ClassDefinition, ObjectId, RelationEndPointId};

/// Everything one transaction knows about object data.
///
/// The manager only stores; the engine decides when to register and
/// unregister and tells observers about it.
#[derive(Debug, Default, Clone)]
pub struct DataManager {
    containers: BTreeMap<ObjectId, DataContainer>,
    end_points: BTreeMap<RelationEndPointId, RelationEndPoint>,
    invalid: BTreeSet<ObjectId>,
}

impl DataManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the container of an object.
    #[must_use]
    pub fn container(&self, id: &ObjectId) -> Option<&DataContainer> {
        self.containers.get(id)
    }

    pub(crate) fn container_mut(&mut self, id: &ObjectId) -> Option<&mut DataContainer> {
        self.containers.get_mut(id)
    }

    /// Returns all registered containers.
    pub fn containers(&self) -> impl Iterator<Item = &DataContainer> {
        self.containers.values()
    }

    /// Returns the number of registered containers.
    #[must_use]
    pub fn container_count(&self) -> usize {
        self.containers.len()
    }

    pub(crate) fn insert_container(&mut self, container: DataContainer) {
        self.containers.insert(container.id().clone(), container);
    }

    pub(crate) fn remove_container(&mut self, id: &ObjectId) -> Option<DataContainer> {
        self.containers.remove(id)
    }

    /// Returns a registered end point.
    #[must_use]
    pub fn end_point(&self, id: &RelationEndPointId) -> Option<&RelationEndPoint> {
        self.end_points.get(id)
    }

    pub(crate) fn end_point_mut(
        &mut self,
        id: &RelationEndPointId,
    ) -> Option<&mut RelationEndPoint> {
        self.end_points.get_mut(id)
    }

    /// Returns all registered end points.
    pub fn end_points(&self) -> impl Iterator<Item = &RelationEndPoint> {
        self.end_points.values()
    }

    pub(crate) fn end_points_mut(&mut self) -> impl Iterator<Item = &mut RelationEndPoint> {
        self.end_points.values_mut()
    }

    /// Returns the IDs of all end points owned by `object`.
    #[must_use]
    pub fn end_points_of(&self, object: &ObjectId) -> Vec<RelationEndPointId> {
        self.end_points
            .keys()
            .filter(|id| id.object_id() == object)
            .cloned()
            .collect()
    }

    pub(crate) fn insert_end_point(&mut self, end_point: RelationEndPoint) {
        self.end_points.insert(end_point.id().clone(), end_point);
    }

    pub(crate) fn remove_end_point(&mut self, id: &RelationEndPointId) -> Option<RelationEndPoint> {
        self.end_points.remove(id)
    }

    /// Returns whether `id` is invalid in this transaction.
    #[must_use]
    pub fn is_invalid(&self, id: &ObjectId) -> bool {
        self.invalid.contains(id)
    }

    /// Returns whether `id` is held here as a deleted object.
    #[must_use]
    pub fn is_deleted(&self, id: &ObjectId) -> bool {
        self.container(id).is_some_and(DataContainer::is_deleted)
    }

    /// Returns all invalid IDs.
    pub fn invalid_objects(&self) -> impl Iterator<Item = &ObjectId> {
        self.invalid.iter()
    }

    pub(crate) fn mark_invalid(&mut self, id: ObjectId) {
        self.invalid.insert(id);
    }

    pub(crate) fn mark_valid(&mut self, id: &ObjectId) {
        self.invalid.remove(id);
    }

    /// Returns whether any virtual end point of the object changed.
    #[must_use]
    pub fn has_relation_changes(&self, id: &ObjectId, class: &ClassDefinition) -> bool {
        class.virtual_end_points().any(|def| {
            let ep_id = RelationEndPointId::new(id.clone(), def.property_name());
            self.end_points
                .get(&ep_id)
                .is_some_and(RelationEndPoint::has_changed)
        })
    }

    /// Computes the state of an object.
    #[must_use]
    pub fn object_state(&self, id: &ObjectId, class: &ClassDefinition) -> ObjectState {
        if self.invalid.contains(id) {
            return ObjectState::Invalid;
        }
        let Some(container) = self.containers.get(id) else {
            return ObjectState::NotLoadedYet;
        };
        if container.is_new() {
            ObjectState::New
        } else if container.is_deleted() {
            ObjectState::Deleted
        } else if container.has_changed_values()
            || container.is_marked_changed()
            || self.has_relation_changes(id, class)
        {
            ObjectState::Changed
        } else {
            ObjectState::Unchanged
        }
    }

    /// Returns the IDs of all containers in a state a commit has to handle.
    pub fn dirty_objects<'a, F>(&self, class_of: F) -> Vec<ObjectId>
    where
        F: Fn(&ObjectId) -> Option<&'a ClassDefinition>,
    {
        self.containers
            .keys()
            .filter(|id| {
                class_of(id).is_some_and(|class| self.object_state(id, class).is_dirty())
            })
            .cloned()
            .collect()
    }
}
