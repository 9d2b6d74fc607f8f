//! Commit-time validation.

use crate::domain_object::DomainObject;
use crate::error::{TxError, TxResult};
use crate::types::{ObjectState, TransactionId};
use std::collections::BTreeMap;
use txgraph_model::{MappingConfiguration, ObjectId, Value};
use txgraph_storage::Timestamp;

/// A relation end point as captured for validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelatedSnapshot {
    /// A scalar end point.
    Object(Option<ObjectId>),
    /// A loaded collection end point.
    Collection(Vec<ObjectId>),
    /// A virtual end point the transaction never loaded.
    NotLoaded,
}

/// Read-only view of one object a commit is about to write.
#[derive(Debug, Clone)]
pub struct PersistableData {
    /// The object.
    pub object: DomainObject,
    /// Its state in the committing transaction.
    pub state: ObjectState,
    /// Timestamp the object was loaded with.
    pub timestamp: Option<Timestamp>,
    /// Current property values.
    pub values: BTreeMap<String, Value>,
    /// Original property values.
    pub original_values: BTreeMap<String, Value>,
    /// Every relation end point of the object, by property.
    pub related: BTreeMap<String, RelatedSnapshot>,
}

impl PersistableData {
    /// Returns the ID of the object.
    #[must_use]
    pub fn id(&self) -> &ObjectId {
        self.object.id()
    }
}

/// Checks the final change set of a commit.
pub trait CommitValidator: Send + Sync {
    /// Returns an error to abort the commit.
    fn validate(
        &self,
        tx: TransactionId,
        mapping: &MappingConfiguration,
        data: &[PersistableData],
    ) -> TxResult<()>;
}

/// Rejects commits that leave a mandatory relation unset.
///
/// Scalar end points must reference an object and collections must not be
/// empty. Virtual end points the transaction never loaded are skipped.
#[derive(Debug, Default)]
pub struct MandatoryRelationValidator;

impl CommitValidator for MandatoryRelationValidator {
    fn validate(
        &self,
        _tx: TransactionId,
        mapping: &MappingConfiguration,
        data: &[PersistableData],
    ) -> TxResult<()> {
        for item in data.iter().filter(|d| d.state != ObjectState::Deleted) {
            let class = mapping.class(item.id().class_id())?;
            for def in class.end_points().iter().filter(|d| d.is_mandatory()) {
                let unset = match item.related.get(def.property_name()) {
                    Some(RelatedSnapshot::Object(related)) => related.is_none(),
                    Some(RelatedSnapshot::Collection(items)) => items.is_empty(),
                    Some(RelatedSnapshot::NotLoaded) | None => false,
                };
                if unset {
                    return Err(TxError::MandatoryRelationNotSet {
                        id: item.id().clone(),
                        property: def.property_name().to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ObjectHandle;
    use txgraph_model::{ClassDefinition, PropertyDefinition, PropertyType, RelationDefinition};

    fn mapping() -> MappingConfiguration {
        MappingConfiguration::builder()
            .class(
                ClassDefinition::new("Order")
                    .with_property(PropertyDefinition::new(
                        "OrderNumber",
                        PropertyType::Integer,
                    )),
            )
            .class(ClassDefinition::new("OrderItem"))
            .relation(
                RelationDefinition::one_to_many(
                    "OrderItem.Order",
                    ("Order", "OrderItems"),
                    ("OrderItem", "Order"),
                )
                .foreign_key_mandatory(),
            )
            .build()
            .unwrap()
    }

    fn item(state: ObjectState, order: Option<ObjectId>) -> PersistableData {
        let id = ObjectId::integer("OrderItem", 1);
        PersistableData {
            object: DomainObject::new(id, ObjectHandle(1), None),
            state,
            timestamp: None,
            values: BTreeMap::new(),
            original_values: BTreeMap::new(),
            related: [("Order".to_string(), RelatedSnapshot::Object(order))]
                .into_iter()
                .collect(),
        }
    }

    #[test]
    fn unset_mandatory_relation_fails() {
        let tx = TransactionId::new(1);
        let err = MandatoryRelationValidator
            .validate(tx, &mapping(), &[item(ObjectState::New, None)])
            .unwrap_err();
        assert!(matches!(
            err,
            TxError::MandatoryRelationNotSet { property, .. } if property == "Order"
        ));
    }

    #[test]
    fn set_or_deleted_objects_pass() {
        let validator = MandatoryRelationValidator;
        let mapping = mapping();
        let order = Some(ObjectId::integer("Order", 1));
        let tx = TransactionId::new(1);
        let changed = [item(ObjectState::Changed, order)];
        let deleted = [item(ObjectState::Deleted, None)];
        assert!(validator.validate(tx, &mapping, &changed).is_ok());
        assert!(validator.validate(tx, &mapping, &deleted).is_ok());
    }
}
