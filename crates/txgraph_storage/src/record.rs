//! Records exchanged between the engine and a storage provider.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use txgraph_model::{ClassId, ObjectId, SortExpression, Value};

/// Version stamp of a stored object, used for optimistic concurrency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Creates a timestamp.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ts:{}", self.0)
    }
}

/// The persisted state of one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Object identity.
    pub id: ObjectId,
    /// Version of the stored data.
    pub timestamp: Timestamp,
    /// Property values by name, foreign keys included.
    pub values: BTreeMap<String, Value>,
}

impl StoredRecord {
    /// Returns a property value, or null if the record does not carry it.
    #[must_use]
    pub fn value(&self, property: &str) -> &Value {
        self.values.get(property).unwrap_or(&Value::Null)
    }
}

/// What a commit does to one stored object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PersistState {
    /// Insert; the ID must not exist yet.
    New,
    /// Update; the stored timestamp must still match.
    Changed,
    /// Delete; the stored timestamp must still match.
    Deleted,
}

/// One object handed to [`crate::StorageProvider::persist`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistableRecord {
    /// Object identity.
    pub id: ObjectId,
    /// Kind of change.
    pub state: PersistState,
    /// Timestamp the object was loaded with; `None` for new objects.
    pub timestamp: Option<Timestamp>,
    /// Values to store; ignored for deletions.
    pub values: BTreeMap<String, Value>,
}

/// A query returning objects of one class.
///
/// Filters are equality comparisons combined with AND.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionQuery {
    class: ClassId,
    filters: Vec<(String, Value)>,
    sort: Option<SortExpression>,
}

impl CollectionQuery {
    /// Creates a query for all objects of a class.
    #[must_use]
    pub fn new(class: impl Into<ClassId>) -> Self {
        Self {
            class: class.into(),
            filters: Vec::new(),
            sort: None,
        }
    }

    /// Adds an equality filter.
    #[must_use]
    pub fn filter(mut self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((property.into(), value.into()));
        self
    }

    /// Sets the result order.
    #[must_use]
    pub fn sorted_by(mut self, sort: SortExpression) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Returns the queried class.
    #[must_use]
    pub fn class(&self) -> &ClassId {
        &self.class
    }

    /// Returns the equality filters.
    #[must_use]
    pub fn filters(&self) -> &[(String, Value)] {
        &self.filters
    }

    /// Returns the result order.
    #[must_use]
    pub fn sort(&self) -> Option<&SortExpression> {
        self.sort.as_ref()
    }

    /// Returns whether a record satisfies every filter.
    #[must_use]
    pub fn matches(&self, record: &StoredRecord) -> bool {
        record.id.class_id() == &self.class
            && self
                .filters
                .iter()
                .all(|(property, value)| record.value(property) == value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_matches_class_and_filters() {
        let record = StoredRecord {
            id: ObjectId::integer("Order", 1),
            timestamp: Timestamp::new(1),
            values: [("OrderNumber".to_string(), Value::Integer(1))]
                .into_iter()
                .collect(),
        };
        assert!(CollectionQuery::new("Order").matches(&record));
        assert!(CollectionQuery::new("Order")
            .filter("OrderNumber", 1)
            .matches(&record));
        assert!(!CollectionQuery::new("Order")
            .filter("OrderNumber", 2)
            .matches(&record));
        assert!(!CollectionQuery::new("Customer").matches(&record));
    }

    #[test]
    fn missing_value_reads_as_null() {
        let record = StoredRecord {
            id: ObjectId::integer("Order", 1),
            timestamp: Timestamp::new(1),
            values: BTreeMap::new(),
        };
        assert_eq!(record.value("Anything"), &Value::Null);
    }
}
