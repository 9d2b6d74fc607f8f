//! Mapping configuration: the read-only schema the engine works against.
//!
//! A mapping is built once with [`MappingBuilder`] and then shared
//! (typically behind an `Arc`) by the storage provider and every
//! transaction. Building validates that relations refer to mapped classes and
//! that no class defines a name twice; the foreign-key property of every real
//! end point is added to its class automatically.

mod class;
mod relation;

pub use class::{ClassDefinition, PropertyDefinition, PropertyType};
pub use relation::{
    Cardinality, RelationDefinition, RelationEndPointDefinition, SortDirection, SortExpression,
    SortSpec,
};

use crate::error::{ModelError, ModelResult};
use crate::id::{ClassId, RelationEndPointId};
use std::collections::BTreeMap;

/// The complete, validated schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingConfiguration {
    classes: BTreeMap<ClassId, ClassDefinition>,
    relations: BTreeMap<String, RelationDefinition>,
}

impl MappingConfiguration {
    /// Starts building a mapping.
    #[must_use]
    pub fn builder() -> MappingBuilder {
        MappingBuilder::default()
    }

    /// Looks up a class.
    pub fn class(&self, id: &ClassId) -> ModelResult<&ClassDefinition> {
        self.classes
            .get(id)
            .ok_or_else(|| ModelError::unknown_class(id.as_str()))
    }

    /// Returns all classes ordered by name.
    pub fn classes(&self) -> impl Iterator<Item = &ClassDefinition> {
        self.classes.values()
    }

    /// Returns all relations ordered by ID.
    pub fn relations(&self) -> impl Iterator<Item = &RelationDefinition> {
        self.relations.values()
    }

    /// Looks up a relation by ID.
    #[must_use]
    pub fn relation(&self, id: &str) -> Option<&RelationDefinition> {
        self.relations.get(id)
    }

    /// Looks up a persistent property.
    pub fn property(&self, class: &ClassId, name: &str) -> ModelResult<&PropertyDefinition> {
        self.class(class)?
            .property(name)
            .ok_or_else(|| ModelError::unknown_property(class.as_str(), name))
    }

    /// Looks up a relation end point by class and property.
    pub fn end_point(
        &self,
        class: &ClassId,
        name: &str,
    ) -> ModelResult<&RelationEndPointDefinition> {
        self.class(class)?
            .end_point(name)
            .ok_or_else(|| ModelError::unknown_property(class.as_str(), name))
    }

    /// Looks up the definition of an end point ID.
    pub fn end_point_for(
        &self,
        id: &RelationEndPointId,
    ) -> ModelResult<&RelationEndPointDefinition> {
        self.end_point(id.object_id().class_id(), id.property())
    }

    /// Returns the definition on the other side of a relation.
    pub fn opposite(
        &self,
        end_point: &RelationEndPointDefinition,
    ) -> ModelResult<&RelationEndPointDefinition> {
        let relation = self.relations.get(end_point.relation_id()).ok_or_else(|| {
            ModelError::invalid_relation(end_point.relation_id(), "relation is not mapped")
        })?;
        Ok(relation.opposite_of(end_point))
    }
}

/// Builder for [`MappingConfiguration`].
#[derive(Debug, Default)]
pub struct MappingBuilder {
    classes: Vec<ClassDefinition>,
    relations: Vec<RelationDefinition>,
}

impl MappingBuilder {
    /// Adds a class.
    #[must_use]
    pub fn class(mut self, class: ClassDefinition) -> Self {
        self.classes.push(class);
        self
    }

    /// Adds a relation.
    #[must_use]
    pub fn relation(mut self, relation: RelationDefinition) -> Self {
        self.relations.push(relation);
        self
    }

    /// Validates and builds the mapping.
    pub fn build(self) -> ModelResult<MappingConfiguration> {
        let mut classes = BTreeMap::new();
        for class in self.classes {
            let mut seen = std::collections::BTreeSet::new();
            for property in class.properties() {
                if !seen.insert(property.name().to_string()) {
                    return Err(ModelError::DuplicateProperty {
                        class: class.id().to_string(),
                        property: property.name().to_string(),
                    });
                }
            }
            let id = class.id().clone();
            if classes.insert(id.clone(), class).is_some() {
                return Err(ModelError::DuplicateClass {
                    class: id.to_string(),
                });
            }
        }

        let mut relations = BTreeMap::new();
        for relation in self.relations {
            let virtual_end = relation.virtual_end().clone();
            let real_end = relation.real_end().clone();

            if !virtual_end.is_collection() && virtual_end.sort_expression().is_some() {
                return Err(ModelError::invalid_relation(
                    relation.id(),
                    "only collection end points can be sorted",
                ));
            }

            for end_point in [&virtual_end, &real_end] {
                let class = classes.get(end_point.class_id()).ok_or_else(|| {
                    ModelError::invalid_relation(
                        relation.id(),
                        format!("class '{}' is not mapped", end_point.class_id()),
                    )
                })?;
                if class.defines(end_point.property_name()) {
                    return Err(ModelError::DuplicateProperty {
                        class: end_point.class_id().to_string(),
                        property: end_point.property_name().to_string(),
                    });
                }
            }

            if let Some(class) = classes.get_mut(real_end.class_id()) {
                class.push_property(PropertyDefinition::reference(
                    real_end.property_name(),
                    virtual_end.class_id().clone(),
                ));
                class.push_end_point(real_end.clone());
            }
            if let Some(class) = classes.get_mut(virtual_end.class_id()) {
                class.push_end_point(virtual_end);
            }

            let id = relation.id().to_string();
            if relations.insert(id.clone(), relation).is_some() {
                return Err(ModelError::invalid_relation(
                    id,
                    "relation is mapped more than once",
                ));
            }
        }

        Ok(MappingConfiguration { classes, relations })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::ObjectId;

    fn order_mapping() -> MappingConfiguration {
        MappingConfiguration::builder()
            .class(
                ClassDefinition::new("Customer")
                    .with_property(PropertyDefinition::new("Name", PropertyType::Text)),
            )
            .class(
                ClassDefinition::new("Order")
                    .with_property(PropertyDefinition::new(
                        "OrderNumber",
                        PropertyType::Integer,
                    )),
            )
            .relation(
                RelationDefinition::one_to_many(
                    "Customer:Orders",
                    ("Customer", "Orders"),
                    ("Order", "Customer"),
                )
                .sorted_by(SortExpression::ascending("OrderNumber")),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn foreign_key_property_is_added() {
        let mapping = order_mapping();
        let fk = mapping.property(&"Order".into(), "Customer").unwrap();
        assert!(fk.is_foreign_key());
        assert_eq!(fk.related_class(), Some(&ClassId::new("Customer")));
    }

    #[test]
    fn end_point_lookup_and_opposite() {
        let mapping = order_mapping();
        let id = RelationEndPointId::new(ObjectId::integer("Customer", 1), "Orders");
        let orders = mapping.end_point_for(&id).unwrap();
        assert!(orders.is_collection());
        let opposite = mapping.opposite(orders).unwrap();
        assert_eq!(opposite.class_id().as_str(), "Order");
        assert_eq!(opposite.property_name(), "Customer");
    }

    #[test]
    fn unknown_class_in_relation_is_rejected() {
        let err = MappingConfiguration::builder()
            .class(ClassDefinition::new("Order"))
            .relation(RelationDefinition::one_to_many(
                "Customer:Orders",
                ("Customer", "Orders"),
                ("Order", "Customer"),
            ))
            .build()
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidRelation { .. }));
    }

    #[test]
    fn sorted_one_to_one_is_rejected() {
        let err = MappingConfiguration::builder()
            .class(ClassDefinition::new("Order"))
            .class(ClassDefinition::new("OrderTicket"))
            .relation(
                RelationDefinition::one_to_one(
                    "Order:OrderTicket",
                    ("Order", "OrderTicket"),
                    ("OrderTicket", "Order"),
                )
                .sorted_by(SortExpression::ascending("X")),
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidRelation { .. }));
    }

    #[test]
    fn clashing_names_are_rejected() {
        let err = MappingConfiguration::builder()
            .class(
                ClassDefinition::new("Order")
                    .with_property(PropertyDefinition::new("Customer", PropertyType::Text)),
            )
            .class(ClassDefinition::new("Customer"))
            .relation(RelationDefinition::one_to_many(
                "Customer:Orders",
                ("Customer", "Orders"),
                ("Order", "Customer"),
            ))
            .build()
            .unwrap_err();
        assert!(matches!(err, ModelError::DuplicateProperty { .. }));
    }

    #[test]
    fn duplicate_class_is_rejected() {
        let err = MappingConfiguration::builder()
            .class(ClassDefinition::new("Order"))
            .class(ClassDefinition::new("Order"))
            .build()
            .unwrap_err();
        assert!(matches!(err, ModelError::DuplicateClass { .. }));
    }
}
