//! Relation and relation end point definitions.

use crate::error::ModelError;
use crate::id::ClassId;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// How many objects an end point refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinality {
    /// At most one object.
    One,
    /// An ordered collection of objects.
    Many,
}

/// Direction of one sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortDirection {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

/// One key of a sort expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortSpec {
    /// Property to sort by.
    pub property: String,
    /// Sort direction.
    pub direction: SortDirection,
}

/// Ordering applied to a collection when it is loaded from storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortExpression {
    specs: Vec<SortSpec>,
}

impl SortExpression {
    /// Sorts ascending by one property.
    #[must_use]
    pub fn ascending(property: impl Into<String>) -> Self {
        Self::default().then_ascending(property)
    }

    /// Sorts descending by one property.
    #[must_use]
    pub fn descending(property: impl Into<String>) -> Self {
        Self::default().then_descending(property)
    }

    /// Adds an ascending tie-breaker.
    #[must_use]
    pub fn then_ascending(mut self, property: impl Into<String>) -> Self {
        self.specs.push(SortSpec {
            property: property.into(),
            direction: SortDirection::Ascending,
        });
        self
    }

    /// Adds a descending tie-breaker.
    #[must_use]
    pub fn then_descending(mut self, property: impl Into<String>) -> Self {
        self.specs.push(SortSpec {
            property: property.into(),
            direction: SortDirection::Descending,
        });
        self
    }

    /// Returns the sort keys.
    #[must_use]
    pub fn specs(&self) -> &[SortSpec] {
        &self.specs
    }

    /// Compares two property maps. Missing properties sort as null.
    #[must_use]
    pub fn compare(
        &self,
        left: &BTreeMap<String, Value>,
        right: &BTreeMap<String, Value>,
    ) -> Ordering {
        for spec in &self.specs {
            let a = left.get(&spec.property).unwrap_or(&Value::Null);
            let b = right.get(&spec.property).unwrap_or(&Value::Null);
            let ord = match spec.direction {
                SortDirection::Ascending => a.cmp(b),
                SortDirection::Descending => b.cmp(a),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

impl fmt::Display for SortExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, spec) in self.specs.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            let dir = match spec.direction {
                SortDirection::Ascending => "asc",
                SortDirection::Descending => "desc",
            };
            write!(f, "{} {dir}", spec.property)?;
        }
        Ok(())
    }
}

impl FromStr for SortExpression {
    type Err = ModelError;

    /// Parses `Prop [asc|desc], Other [asc|desc]`.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = |message: &str| ModelError::invalid_relation("<sort>", message);
        let mut expression = SortExpression::default();
        for part in input.split(',') {
            let mut words = part.split_whitespace();
            let property = words.next().ok_or_else(|| invalid("empty sort key"))?;
            expression = match words.next().map(str::to_ascii_lowercase).as_deref() {
                None | Some("asc") => expression.then_ascending(property),
                Some("desc") => expression.then_descending(property),
                Some(other) => return Err(invalid(&format!("unknown direction '{other}'"))),
            };
            if words.next().is_some() {
                return Err(invalid("trailing tokens in sort key"));
            }
        }
        Ok(expression)
    }
}

/// Definition of one side of a bidirectional relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationEndPointDefinition {
    relation_id: String,
    class_id: ClassId,
    property_name: String,
    cardinality: Cardinality,
    is_virtual: bool,
    mandatory: bool,
    sort_expression: Option<SortExpression>,
    opposite_class_id: ClassId,
    opposite_property_name: String,
}

impl RelationEndPointDefinition {
    /// Returns the relation this end point belongs to.
    #[must_use]
    pub fn relation_id(&self) -> &str {
        &self.relation_id
    }

    /// Returns the class owning the end point.
    #[must_use]
    pub fn class_id(&self) -> &ClassId {
        &self.class_id
    }

    /// Returns the relation property name.
    #[must_use]
    pub fn property_name(&self) -> &str {
        &self.property_name
    }

    /// Returns the cardinality.
    #[must_use]
    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    /// Returns true for collection end points.
    #[must_use]
    pub fn is_collection(&self) -> bool {
        self.cardinality == Cardinality::Many
    }

    /// Returns true if the end point has no foreign key of its own.
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        self.is_virtual
    }

    /// Returns true if the relation must be set when committing.
    #[must_use]
    pub fn is_mandatory(&self) -> bool {
        self.mandatory
    }

    /// Returns the sort applied when the collection is loaded from storage.
    #[must_use]
    pub fn sort_expression(&self) -> Option<&SortExpression> {
        self.sort_expression.as_ref()
    }

    /// Returns the class on the other side.
    #[must_use]
    pub fn opposite_class_id(&self) -> &ClassId {
        &self.opposite_class_id
    }

    /// Returns the property name on the other side.
    #[must_use]
    pub fn opposite_property_name(&self) -> &str {
        &self.opposite_property_name
    }
}

/// A bidirectional relation between two classes.
///
/// The foreign-key side is always the real end point and always has
/// cardinality one. The other side is virtual and is either a single object
/// (one-to-one) or an ordered collection (one-to-many).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDefinition {
    id: String,
    virtual_end: RelationEndPointDefinition,
    real_end: RelationEndPointDefinition,
}

impl RelationDefinition {
    /// Creates a one-to-many relation.
    ///
    /// `collection_side` is `(class, property)` of the virtual collection,
    /// `foreign_key_side` is `(class, property)` of the foreign key.
    pub fn one_to_many<A, B, C, D>(
        id: impl Into<String>,
        collection_side: (A, B),
        foreign_key_side: (C, D),
    ) -> Self
    where
        A: Into<ClassId>,
        B: Into<String>,
        C: Into<ClassId>,
        D: Into<String>,
    {
        Self::build(
            id.into(),
            Cardinality::Many,
            collection_side,
            foreign_key_side,
        )
    }

    /// Creates a one-to-one relation.
    ///
    /// `virtual_side` holds no foreign key, `foreign_key_side` does.
    pub fn one_to_one<A, B, C, D>(
        id: impl Into<String>,
        virtual_side: (A, B),
        foreign_key_side: (C, D),
    ) -> Self
    where
        A: Into<ClassId>,
        B: Into<String>,
        C: Into<ClassId>,
        D: Into<String>,
    {
        Self::build(id.into(), Cardinality::One, virtual_side, foreign_key_side)
    }

    fn build<A, B, C, D>(
        id: String,
        virtual_cardinality: Cardinality,
        virtual_side: (A, B),
        real_side: (C, D),
    ) -> Self
    where
        A: Into<ClassId>,
        B: Into<String>,
        C: Into<ClassId>,
        D: Into<String>,
    {
        let (virtual_class, virtual_property) = (virtual_side.0.into(), virtual_side.1.into());
        let (real_class, real_property) = (real_side.0.into(), real_side.1.into());
        Self {
            virtual_end: RelationEndPointDefinition {
                relation_id: id.clone(),
                class_id: virtual_class.clone(),
                property_name: virtual_property.clone(),
                cardinality: virtual_cardinality,
                is_virtual: true,
                mandatory: false,
                sort_expression: None,
                opposite_class_id: real_class.clone(),
                opposite_property_name: real_property.clone(),
            },
            real_end: RelationEndPointDefinition {
                relation_id: id.clone(),
                class_id: real_class,
                property_name: real_property,
                cardinality: Cardinality::One,
                is_virtual: false,
                mandatory: false,
                sort_expression: None,
                opposite_class_id: virtual_class,
                opposite_property_name: virtual_property,
            },
            id,
        }
    }

    /// Marks the virtual side mandatory.
    #[must_use]
    pub fn virtual_mandatory(mut self) -> Self {
        self.virtual_end.mandatory = true;
        self
    }

    /// Marks the foreign-key side mandatory.
    #[must_use]
    pub fn foreign_key_mandatory(mut self) -> Self {
        self.real_end.mandatory = true;
        self
    }

    /// Sets the sort applied when the collection side is loaded.
    #[must_use]
    pub fn sorted_by(mut self, sort: SortExpression) -> Self {
        self.virtual_end.sort_expression = Some(sort);
        self
    }

    /// Returns the relation ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the virtual end point definition.
    #[must_use]
    pub fn virtual_end(&self) -> &RelationEndPointDefinition {
        &self.virtual_end
    }

    /// Returns the foreign-key end point definition.
    #[must_use]
    pub fn real_end(&self) -> &RelationEndPointDefinition {
        &self.real_end
    }

    /// Returns the end point opposite to `end_point`.
    #[must_use]
    pub fn opposite_of(
        &self,
        end_point: &RelationEndPointDefinition,
    ) -> &RelationEndPointDefinition {
        if end_point.is_virtual {
            &self.real_end
        } else {
            &self.virtual_end
        }
    }
}
