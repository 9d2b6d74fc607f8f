//! Class and property definitions.

use super::relation::RelationEndPointDefinition;
use crate::id::ClassId;
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Storage type of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    /// Boolean.
    Bool,
    /// 64-bit signed integer.
    Integer,
    /// UTF-8 text.
    Text,
    /// Raw bytes.
    Bytes,
    /// Object reference; the foreign key of a real relation end point.
    Reference,
}

impl PropertyType {
    /// Returns whether a non-null value has this type.
    #[must_use]
    pub fn matches(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (PropertyType::Bool, Value::Bool(_))
                | (PropertyType::Integer, Value::Integer(_))
                | (PropertyType::Text, Value::Text(_))
                | (PropertyType::Bytes, Value::Bytes(_))
                | (PropertyType::Reference, Value::Object(_))
        )
    }
}

/// Definition of a persistent property of a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDefinition {
    name: String,
    property_type: PropertyType,
    nullable: bool,
    default: Option<Value>,
    related_class: Option<ClassId>,
}

impl PropertyDefinition {
    /// Creates a property definition.
    ///
    /// Booleans and integers are not nullable by default, everything else is.
    #[must_use]
    pub fn new(name: impl Into<String>, property_type: PropertyType) -> Self {
        Self {
            name: name.into(),
            property_type,
            nullable: !matches!(property_type, PropertyType::Bool | PropertyType::Integer),
            default: None,
            related_class: None,
        }
    }

    /// Creates the foreign-key property backing a real relation end point.
    #[must_use]
    pub(crate) fn reference(name: impl Into<String>, related_class: ClassId) -> Self {
        Self {
            related_class: Some(related_class),
            ..Self::new(name, PropertyType::Reference)
        }
    }

    /// Sets whether null is accepted.
    #[must_use]
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Sets the value new objects start with.
    #[must_use]
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Returns the property name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the property type.
    #[must_use]
    pub fn property_type(&self) -> PropertyType {
        self.property_type
    }

    /// Returns whether null is accepted.
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Returns whether this property is a relation foreign key.
    #[must_use]
    pub fn is_foreign_key(&self) -> bool {
        self.property_type == PropertyType::Reference
    }

    /// Returns the class a foreign key points to.
    #[must_use]
    pub fn related_class(&self) -> Option<&ClassId> {
        self.related_class.as_ref()
    }

    /// Returns the value a new object starts with.
    #[must_use]
    pub fn default_value(&self) -> Value {
        if let Some(value) = &self.default {
            return value.clone();
        }
        if self.nullable {
            return Value::Null;
        }
        match self.property_type {
            PropertyType::Bool => Value::Bool(false),
            PropertyType::Integer => Value::Integer(0),
            PropertyType::Text => Value::Text(String::new()),
            PropertyType::Bytes => Value::Bytes(Vec::new()),
            PropertyType::Reference => Value::Null,
        }
    }

    /// Returns whether `value` may be stored in this property.
    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        if value.is_null() {
            return self.nullable;
        }
        if !self.property_type.matches(value) {
            return false;
        }
        match (&self.related_class, value) {
            (Some(class), Value::Object(id)) => id.class_id() == class,
            _ => true,
        }
    }
}

/// Definition of a mapped class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDefinition {
    id: ClassId,
    properties: Vec<PropertyDefinition>,
    end_points: Vec<RelationEndPointDefinition>,
}

impl ClassDefinition {
    /// Creates an empty class definition.
    #[must_use]
    pub fn new(id: impl Into<ClassId>) -> Self {
        Self {
            id: id.into(),
            properties: Vec::new(),
            end_points: Vec::new(),
        }
    }

    /// Adds a property.
    #[must_use]
    pub fn with_property(mut self, property: PropertyDefinition) -> Self {
        self.properties.push(property);
        self
    }

    pub(crate) fn push_property(&mut self, property: PropertyDefinition) {
        self.properties.push(property);
    }

    pub(crate) fn push_end_point(&mut self, end_point: RelationEndPointDefinition) {
        self.end_points.push(end_point);
    }

    /// Returns the class ID.
    #[must_use]
    pub fn id(&self) -> &ClassId {
        &self.id
    }

    /// Returns all persistent properties, foreign keys included.
    #[must_use]
    pub fn properties(&self) -> &[PropertyDefinition] {
        &self.properties
    }

    /// Looks up a property by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyDefinition> {
        self.properties.iter().find(|p| p.name() == name)
    }

    /// Returns all relation end point definitions of the class.
    #[must_use]
    pub fn end_points(&self) -> &[RelationEndPointDefinition] {
        &self.end_points
    }

    /// Looks up a relation end point by property name.
    #[must_use]
    pub fn end_point(&self, name: &str) -> Option<&RelationEndPointDefinition> {
        self.end_points.iter().find(|e| e.property_name() == name)
    }

    /// Returns the end points that have no foreign key of their own.
    pub fn virtual_end_points(&self) -> impl Iterator<Item = &RelationEndPointDefinition> {
        self.end_points.iter().filter(|e| e.is_virtual())
    }

    /// Returns the foreign-key bearing end points.
    pub fn real_end_points(&self) -> impl Iterator<Item = &RelationEndPointDefinition> {
        self.end_points.iter().filter(|e| !e.is_virtual())
    }

    pub(crate) fn defines(&self, name: &str) -> bool {
        self.property(name).is_some() || self.end_point(name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::ObjectId;

    #[test]
    fn value_types_are_not_nullable_by_default() {
        let text = PropertyDefinition::new("T", PropertyType::Text);
        assert!(!PropertyDefinition::new("N", PropertyType::Integer).is_nullable());
        assert!(!PropertyDefinition::new("B", PropertyType::Bool).is_nullable());
        assert!(text.is_nullable());
    }

    #[test]
    fn default_values() {
        assert_eq!(
            PropertyDefinition::new("N", PropertyType::Integer).default_value(),
            Value::Integer(0)
        );
        assert_eq!(
            PropertyDefinition::new("T", PropertyType::Text).default_value(),
            Value::Null
        );
        assert_eq!(
            PropertyDefinition::new("N", PropertyType::Integer)
                .with_default(7)
                .default_value(),
            Value::Integer(7)
        );
    }

    #[test]
    fn accepts_checks_type_nullability_and_reference_class() {
        let number = PropertyDefinition::new("N", PropertyType::Integer);
        assert!(number.accepts(&Value::Integer(1)));
        assert!(!number.accepts(&Value::Null));
        assert!(!number.accepts(&Value::from("1")));

        let customer = PropertyDefinition::reference("Customer", "Customer".into());
        assert!(customer.accepts(&Value::Null));
        let own_class = Value::Object(ObjectId::integer("Customer", 1));
        let other_class = Value::Object(ObjectId::integer("Order", 1));
        assert!(customer.accepts(&own_class));
        assert!(!customer.accepts(&other_class));
    }
}
