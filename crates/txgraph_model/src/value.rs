//! Dynamic property value type.

use crate::id::ObjectId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A dynamic property value.
///
/// Floats are intentionally not supported so that values stay `Eq` and
/// `Ord`; equality is what change tracking compares against.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer.
    Integer(i64),
    /// Text string (UTF-8).
    Text(String),
    /// Byte string.
    Bytes(Vec<u8>),
    /// Reference to another object (foreign key).
    Object(ObjectId),
}

impl Value {
    /// Returns true for [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the boolean, if this is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the integer, if this is one.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the text, if this is one.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the referenced object ID, if this is a reference.
    #[must_use]
    pub fn as_object_id(&self) -> Option<&ObjectId> {
        match self {
            Value::Object(value) => Some(value),
            _ => None,
        }
    }

    /// Converts an optional reference into a value.
    #[must_use]
    pub fn from_reference(id: Option<&ObjectId>) -> Self {
        id.map_or(Value::Null, |id| Value::Object(id.clone()))
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Integer(value) => write!(f, "{value}"),
            Value::Text(value) => write!(f, "{value:?}"),
            Value::Bytes(value) => write!(f, "<{} bytes>", value.len()),
            Value::Object(value) => write!(f, "{value}"),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}

impl From<ObjectId> for Value {
    fn from(value: ObjectId) -> Self {
        Value::Object(value)
    }
}

impl From<Option<ObjectId>> for Value {
    fn from(value: Option<ObjectId>) -> Self {
        value.map_or(Value::Null, Value::Object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions() {
        assert_eq!(Value::from(5), Value::Integer(5));
        assert_eq!(Value::from("a"), Value::Text("a".into()));
        assert_eq!(Value::from(None::<ObjectId>), Value::Null);
        let id = ObjectId::integer("Order", 1);
        assert_eq!(Value::from(id.clone()).as_object_id(), Some(&id));
    }

    #[test]
    fn null_sorts_first() {
        let mut values = vec![Value::Integer(3), Value::Null, Value::Integer(1)];
        values.sort();
        assert_eq!(
            values,
            vec![Value::Null, Value::Integer(1), Value::Integer(3)]
        );
    }

    #[test]
    fn serde_json_shape() {
        let value = Value::Integer(7);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"{"Integer":7}"#);
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }
}
