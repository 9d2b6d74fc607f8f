//! In-memory storage provider.

use crate::error::{StorageError, StorageResult};
use crate::provider::StorageProvider;
use crate::record::{
    CollectionQuery, PersistState, PersistableRecord, StoredRecord, Timestamp,
};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use txgraph_model::{
    ClassId, MappingConfiguration, ModelError, ObjectId, RelationEndPointId, SortExpression,
    Value,
};

/// Configuration of an [`InMemoryStore`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Timestamp given to the first written record.
    pub initial_timestamp: u64,

    /// Whether relation loads apply the end point's sort expression.
    pub sort_related_objects: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            initial_timestamp: 1,
            sort_related_objects: true,
        }
    }
}

impl StoreConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the first timestamp.
    #[must_use]
    pub const fn initial_timestamp(mut self, value: u64) -> Self {
        self.initial_timestamp = value;
        self
    }

    /// Sets whether relation loads are sorted.
    #[must_use]
    pub const fn sort_related_objects(mut self, value: bool) -> Self {
        self.sort_related_objects = value;
        self
    }
}

/// Number of calls per provider operation.
///
/// Tests use this to check that the engine caches what it loads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStatistics {
    /// `load_object` calls.
    pub load_object: u64,
    /// `load_objects` calls.
    pub load_objects: u64,
    /// `load_related_object` calls.
    pub load_related_object: u64,
    /// `load_related_objects` calls.
    pub load_related_objects: u64,
    /// `execute_collection_query` calls.
    pub queries: u64,
    /// `persist` calls.
    pub persists: u64,
}

#[derive(Debug, Default)]
struct Counters {
    load_object: AtomicU64,
    load_objects: AtomicU64,
    load_related_object: AtomicU64,
    load_related_objects: AtomicU64,
    queries: AtomicU64,
    persists: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// An in-memory storage provider.
///
/// Records live in an ordered map behind a lock, so the store can be shared
/// across threads and by several independent root transactions.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use txgraph_model::{ClassDefinition, MappingConfiguration};
/// use txgraph_storage::{InMemoryStore, StorageProvider};
///
/// let mapping = Arc::new(MappingConfiguration::builder()
///     .class(ClassDefinition::new("Order"))
///     .build()
///     .unwrap());
/// let store = InMemoryStore::new(mapping);
/// let id = store.create_new_object_id(&"Order".into()).unwrap();
/// assert!(store.load_object(&id).unwrap().is_none());
/// ```
#[derive(Debug)]
pub struct InMemoryStore {
    mapping: Arc<MappingConfiguration>,
    config: StoreConfig,
    records: RwLock<BTreeMap<ObjectId, StoredRecord>>,
    next_timestamp: AtomicU64,
    counters: Counters,
}

impl InMemoryStore {
    /// Creates an empty store with the default configuration.
    #[must_use]
    pub fn new(mapping: Arc<MappingConfiguration>) -> Self {
        Self::with_config(mapping, StoreConfig::default())
    }

    /// Creates an empty store.
    #[must_use]
    pub fn with_config(mapping: Arc<MappingConfiguration>, config: StoreConfig) -> Self {
        Self {
            next_timestamp: AtomicU64::new(config.initial_timestamp),
            mapping,
            config,
            records: RwLock::new(BTreeMap::new()),
            counters: Counters::default(),
        }
    }

    /// Restores a store from a JSON snapshot written by [`Self::to_json`].
    pub fn from_json(mapping: Arc<MappingConfiguration>, json: &str) -> StorageResult<Self> {
        let records: Vec<StoredRecord> = serde_json::from_str(json)?;
        let store = Self::new(mapping);
        let mut max_timestamp = 0;
        {
            let mut map = store.records.write();
            for record in records {
                store.validate(&record.id, &record.values)?;
                max_timestamp = max_timestamp.max(record.timestamp.as_u64());
                map.insert(record.id.clone(), record);
            }
        }
        store
            .next_timestamp
            .fetch_max(max_timestamp + 1, Ordering::SeqCst);
        Ok(store)
    }

    /// Writes all records as a JSON array.
    pub fn to_json(&self) -> StorageResult<String> {
        let records: Vec<StoredRecord> = self.records.read().values().cloned().collect();
        Ok(serde_json::to_string_pretty(&records)?)
    }

    /// Returns the mapping the store validates against.
    #[must_use]
    pub fn mapping(&self) -> &Arc<MappingConfiguration> {
        &self.mapping
    }

    /// Inserts or replaces a record directly, bypassing transactions.
    ///
    /// Properties that are not given get their default value.
    pub fn insert<'a, I>(&self, id: &ObjectId, values: I) -> StorageResult<Timestamp>
    where
        I: IntoIterator<Item = (&'a str, Value)>,
    {
        let class = self.mapping.class(id.class_id())?;
        let mut full: BTreeMap<String, Value> = class
            .properties()
            .iter()
            .map(|p| (p.name().to_string(), p.default_value()))
            .collect();
        for (name, value) in values {
            full.insert(name.to_string(), value);
        }
        self.validate(id, &full)?;

        let timestamp = self.next_timestamp();
        self.records.write().insert(
            id.clone(),
            StoredRecord {
                id: id.clone(),
                timestamp,
                values: full,
            },
        );
        Ok(timestamp)
    }

    /// Removes a record directly, bypassing transactions.
    pub fn remove(&self, id: &ObjectId) -> Option<StoredRecord> {
        self.records.write().remove(id)
    }

    /// Returns a copy of a stored record without counting a load.
    #[must_use]
    pub fn record(&self, id: &ObjectId) -> Option<StoredRecord> {
        self.records.read().get(id).cloned()
    }

    /// Returns the number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Returns call counts per operation.
    #[must_use]
    pub fn statistics(&self) -> LoadStatistics {
        let c = &self.counters;
        LoadStatistics {
            load_object: c.load_object.load(Ordering::Relaxed),
            load_objects: c.load_objects.load(Ordering::Relaxed),
            load_related_object: c.load_related_object.load(Ordering::Relaxed),
            load_related_objects: c.load_related_objects.load(Ordering::Relaxed),
            queries: c.queries.load(Ordering::Relaxed),
            persists: c.persists.load(Ordering::Relaxed),
        }
    }

    fn next_timestamp(&self) -> Timestamp {
        Timestamp::new(self.next_timestamp.fetch_add(1, Ordering::SeqCst))
    }

    fn validate(&self, id: &ObjectId, values: &BTreeMap<String, Value>) -> StorageResult<()> {
        let class = self.mapping.class(id.class_id())?;
        for (name, value) in values {
            let property = class
                .property(name)
                .ok_or_else(|| ModelError::unknown_property(class.id().as_str(), name.as_str()))?;
            if !property.accepts(value) {
                return Err(StorageError::inconsistent(format!(
                    "{id}: value {value} is not valid for property '{name}'"
                )));
            }
        }
        Ok(())
    }

    /// Returns the records whose foreign key points at the end point's object.
    fn related_records(
        &self,
        end_point: &RelationEndPointId,
    ) -> StorageResult<(Vec<StoredRecord>, Option<SortExpression>)> {
        let definition = self.mapping.end_point_for(end_point)?;
        if !definition.is_virtual() {
            return Err(StorageError::invalid_query(format!(
                "{end_point} is a foreign-key end point; read the owning record instead"
            )));
        }
        let opposite = self.mapping.opposite(definition)?;
        let key = Value::Object(end_point.object_id().clone());

        let records = self
            .records
            .read()
            .values()
            .filter(|r| r.id.class_id() == opposite.class_id())
            .filter(|r| r.value(opposite.property_name()) == &key)
            .cloned()
            .collect();
        Ok((records, definition.sort_expression().cloned()))
    }

    fn sort(&self, records: &mut [StoredRecord], sort: Option<&SortExpression>) {
        if let Some(sort) = sort {
            // Stable sort keeps ID order for ties.
            records.sort_by(|a, b| sort.compare(&a.values, &b.values));
        }
    }
}

impl StorageProvider for InMemoryStore {
    fn load_object(&self, id: &ObjectId) -> StorageResult<Option<StoredRecord>> {
        bump(&self.counters.load_object);
        Ok(self.records.read().get(id).cloned())
    }

    fn load_objects(
        &self,
        ids: &[ObjectId],
        throw_on_not_found: bool,
    ) -> StorageResult<Vec<StoredRecord>> {
        bump(&self.counters.load_objects);
        let records = self.records.read();
        let mut found = Vec::with_capacity(ids.len());
        let mut missing = Vec::new();
        let mut seen = std::collections::BTreeSet::new();
        for id in ids {
            if !seen.insert(id) {
                continue;
            }
            match records.get(id) {
                Some(record) => found.push(record.clone()),
                None => missing.push(id.clone()),
            }
        }
        if throw_on_not_found && !missing.is_empty() {
            return Err(StorageError::ObjectsNotFound { ids: missing });
        }
        Ok(found)
    }

    fn load_related_object(
        &self,
        end_point: &RelationEndPointId,
    ) -> StorageResult<Option<StoredRecord>> {
        bump(&self.counters.load_related_object);
        let definition = self.mapping.end_point_for(end_point)?;
        if definition.is_collection() {
            return Err(StorageError::invalid_query(format!(
                "{end_point} is a collection end point"
            )));
        }
        let (mut records, _) = self.related_records(end_point)?;
        if records.len() > 1 {
            return Err(StorageError::inconsistent(format!(
                "{end_point} is referenced by {} objects",
                records.len()
            )));
        }
        Ok(records.pop())
    }

    fn load_related_objects(
        &self,
        end_point: &RelationEndPointId,
    ) -> StorageResult<Vec<StoredRecord>> {
        bump(&self.counters.load_related_objects);
        let definition = self.mapping.end_point_for(end_point)?;
        if !definition.is_collection() {
            return Err(StorageError::invalid_query(format!(
                "{end_point} is not a collection end point"
            )));
        }
        let (mut records, sort) = self.related_records(end_point)?;
        if self.config.sort_related_objects {
            self.sort(&mut records, sort.as_ref());
        }
        Ok(records)
    }

    fn execute_collection_query(
        &self,
        query: &CollectionQuery,
    ) -> StorageResult<Vec<StoredRecord>> {
        bump(&self.counters.queries);
        let class = self.mapping.class(query.class())?;
        for (name, _) in query.filters() {
            if class.property(name).is_none() {
                return Err(StorageError::invalid_query(format!(
                    "class '{}' has no property '{name}'",
                    class.id()
                )));
            }
        }
        let mut records: Vec<StoredRecord> = self
            .records
            .read()
            .values()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        self.sort(&mut records, query.sort());
        Ok(records)
    }

    fn create_new_object_id(&self, class: &ClassId) -> StorageResult<ObjectId> {
        self.mapping.class(class)?;
        Ok(ObjectId::new_guid(class.clone()))
    }

    fn persist(&self, changes: &[PersistableRecord]) -> StorageResult<Vec<(ObjectId, Timestamp)>> {
        bump(&self.counters.persists);
        let mut records = self.records.write();

        let mut conflicts = Vec::new();
        for change in changes {
            let stored = records.get(&change.id);
            let ok = match change.state {
                PersistState::New => stored.is_none(),
                PersistState::Changed | PersistState::Deleted => {
                    stored.map(|r| Some(r.timestamp)) == Some(change.timestamp)
                }
            };
            if !ok {
                conflicts.push(change.id.clone());
            }
            if change.state != PersistState::Deleted {
                self.validate(&change.id, &change.values)?;
            }
        }
        if !conflicts.is_empty() {
            tracing::warn!(
                count = conflicts.len(),
                "persist rejected by concurrency check"
            );
            return Err(StorageError::ConcurrencyViolation { ids: conflicts });
        }

        let mut timestamps = Vec::new();
        for change in changes {
            match change.state {
                PersistState::Deleted => {
                    records.remove(&change.id);
                }
                PersistState::New | PersistState::Changed => {
                    let timestamp = self.next_timestamp();
                    records.insert(
                        change.id.clone(),
                        StoredRecord {
                            id: change.id.clone(),
                            timestamp,
                            values: change.values.clone(),
                        },
                    );
                    timestamps.push((change.id.clone(), timestamp));
                }
            }
        }
        tracing::debug!(written = changes.len(), "persisted changes");
        Ok(timestamps)
    }
}
