//! Storage provider trait definition.

use crate::error::StorageResult;
use crate::record::{CollectionQuery, PersistableRecord, StoredRecord, Timestamp};
use txgraph_model::{ClassId, ObjectId, RelationEndPointId};

/// The persistence and load strategy used by root transactions.
///
/// Providers are treated as expensive: the engine caches every record it
/// receives and never asks twice for the same identity at the same
/// transaction level.
///
/// # Invariants
///
/// - `load_objects` with `throw_on_not_found = false` silently skips missing
///   IDs; with `true` it fails with `ObjectsNotFound` listing all of them
/// - relation loads only accept virtual end points; real end points are
///   answered by the foreign key in the owning record
/// - `persist` is all-or-nothing
/// - Providers must be `Send + Sync`
///
/// # Implementors
///
/// - [`crate::InMemoryStore`] - For testing and ephemeral use
pub trait StorageProvider: Send + Sync {
    /// Loads one object; `Ok(None)` if it does not exist.
    fn load_object(&self, id: &ObjectId) -> StorageResult<Option<StoredRecord>>;

    /// Loads several objects.
    ///
    /// Results follow the order of `ids`; duplicates are returned once.
    ///
    /// # Errors
    ///
    /// Fails with `ObjectsNotFound` naming every missing ID when
    /// `throw_on_not_found` is set.
    fn load_objects(
        &self,
        ids: &[ObjectId],
        throw_on_not_found: bool,
    ) -> StorageResult<Vec<StoredRecord>>;

    /// Loads the object referenced by a virtual one-to-one end point.
    fn load_related_object(
        &self,
        end_point: &RelationEndPointId,
    ) -> StorageResult<Option<StoredRecord>>;

    /// Loads the objects of a virtual collection end point.
    ///
    /// The sort expression of the end point, if any, is applied here.
    fn load_related_objects(&self, end_point: &RelationEndPointId)
        -> StorageResult<Vec<StoredRecord>>;

    /// Executes a collection query.
    fn execute_collection_query(&self, query: &CollectionQuery)
        -> StorageResult<Vec<StoredRecord>>;

    /// Creates the ID for a new object of `class`.
    fn create_new_object_id(&self, class: &ClassId) -> StorageResult<ObjectId>;

    /// Writes the given changes atomically.
    ///
    /// Returns the new timestamp of every inserted or updated object.
    ///
    /// # Errors
    ///
    /// Fails with `ConcurrencyViolation` if a new object already exists or a
    /// changed/deleted object's timestamp no longer matches.
    fn persist(&self, records: &[PersistableRecord]) -> StorageResult<Vec<(ObjectId, Timestamp)>>;
}
