//! Object and end point identifiers.

use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Name of a mapped class.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassId(String);

impl ClassId {
    /// Creates a class ID.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the class name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassId({})", self.0)
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClassId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ClassId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// The class-local part of an object ID.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ObjectKey {
    /// Integer key.
    Integer(i64),
    /// GUID key, used for objects created in memory.
    Guid(Uuid),
    /// Free-form text key.
    Text(String),
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(value) => write!(f, "{value}"),
            Self::Guid(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

/// Identity of a domain object: its class plus a key.
///
/// Object IDs are immutable values and are used as map keys throughout the
/// engine. Ordering is by class name first, then by key.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId {
    class_id: ClassId,
    key: ObjectKey,
}

impl ObjectId {
    /// Creates an object ID.
    #[must_use]
    pub fn new(class_id: impl Into<ClassId>, key: ObjectKey) -> Self {
        Self {
            class_id: class_id.into(),
            key,
        }
    }

    /// Creates an object ID with an integer key.
    #[must_use]
    pub fn integer(class_id: impl Into<ClassId>, key: i64) -> Self {
        Self::new(class_id, ObjectKey::Integer(key))
    }

    /// Creates an object ID with a GUID key.
    #[must_use]
    pub fn guid(class_id: impl Into<ClassId>, key: Uuid) -> Self {
        Self::new(class_id, ObjectKey::Guid(key))
    }

    /// Creates an object ID with a fresh random GUID key.
    #[must_use]
    pub fn new_guid(class_id: impl Into<ClassId>) -> Self {
        Self::guid(class_id, Uuid::new_v4())
    }

    /// Returns the class of the object.
    #[must_use]
    pub fn class_id(&self) -> &ClassId {
        &self.class_id
    }

    /// Returns the key of the object.
    #[must_use]
    pub fn key(&self) -> &ObjectKey {
        &self.key
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({self})")
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.class_id, self.key)
    }
}

impl FromStr for ObjectId {
    type Err = ModelError;

    /// Parses `Class|key`. Keys that parse as integers or GUIDs become those
    /// key kinds, anything else is a text key.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = || ModelError::InvalidObjectId {
            input: input.to_string(),
        };
        let (class, key) = input.split_once('|').ok_or_else(invalid)?;
        if class.is_empty() || key.is_empty() {
            return Err(invalid());
        }

        let key = if let Ok(value) = key.parse::<i64>() {
            ObjectKey::Integer(value)
        } else if let Ok(value) = Uuid::parse_str(key) {
            ObjectKey::Guid(value)
        } else {
            ObjectKey::Text(key.to_string())
        };
        Ok(Self::new(class, key))
    }
}

/// Identifies one side of a relation for one object.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RelationEndPointId {
    object_id: ObjectId,
    property: String,
}

impl RelationEndPointId {
    /// Creates an end point ID.
    #[must_use]
    pub fn new(object_id: ObjectId, property: impl Into<String>) -> Self {
        Self {
            object_id,
            property: property.into(),
        }
    }

    /// Returns the object owning the end point.
    #[must_use]
    pub fn object_id(&self) -> &ObjectId {
        &self.object_id
    }

    /// Returns the relation property name on the owning class.
    #[must_use]
    pub fn property(&self) -> &str {
        &self.property
    }
}

impl fmt::Debug for RelationEndPointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RelationEndPointId({self})")
    }
}

impl fmt::Display for RelationEndPointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.object_id, self.property)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_class_and_key() {
        let id = ObjectId::integer("Order", 1);
        assert_eq!(id.to_string(), "Order|1");
        assert_eq!(id.class_id().as_str(), "Order");
    }

    #[test]
    fn ordering_is_class_then_key() {
        let a = ObjectId::integer("Customer", 9);
        let b = ObjectId::integer("Order", 1);
        let c = ObjectId::integer("Order", 2);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn parse_integer_guid_and_text_keys() {
        let int: ObjectId = "Order|42".parse().unwrap();
        assert_eq!(int.key(), &ObjectKey::Integer(42));

        let uuid = Uuid::new_v4();
        let guid: ObjectId = format!("Order|{uuid}").parse().unwrap();
        assert_eq!(guid.key(), &ObjectKey::Guid(uuid));

        let text: ObjectId = "Customer|acme".parse().unwrap();
        assert_eq!(text.key(), &ObjectKey::Text("acme".into()));
    }

    #[test]
    fn parse_rejects_missing_separator() {
        assert!("Order".parse::<ObjectId>().is_err());
        assert!("|1".parse::<ObjectId>().is_err());
        assert!("Order|".parse::<ObjectId>().is_err());
    }

    #[test]
    fn new_guid_is_unique() {
        assert_ne!(ObjectId::new_guid("Order"), ObjectId::new_guid("Order"));
    }

    #[test]
    fn end_point_id_display() {
        let id = RelationEndPointId::new(ObjectId::integer("Customer", 1), "Orders");
        assert_eq!(id.to_string(), "Customer|1/Orders");
    }
}
