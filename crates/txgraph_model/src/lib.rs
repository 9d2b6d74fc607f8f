//! # txgraph Model
//!
//! Identities, values and mapping definitions shared by every txgraph crate.
//!
//! This crate provides:
//! - [`ObjectId`] - the stable, comparable identity of a domain object
//! - [`Value`] - the dynamic value stored in a property
//! - [`RelationEndPointId`] - the key of one side of a relation for one object
//! - [`MappingConfiguration`] - the read-only schema: classes, properties and
//!   bidirectional relations with cardinality, mandatory-ness and sort order
//!
//! ## Usage
//!
//! ```
//! use txgraph_model::{MappingConfiguration, ClassDefinition, PropertyDefinition,
//!     PropertyType, RelationDefinition, ObjectId, Value};
//!
//! let mapping = MappingConfiguration::builder()
//!     .class(ClassDefinition::new("Customer")
//!         .with_property(PropertyDefinition::new("Name", PropertyType::Text)))
//!     .class(ClassDefinition::new("Order")
//!         .with_property(PropertyDefinition::new("OrderNumber", PropertyType::Integer)))
//!     .relation(RelationDefinition::one_to_many(
//!         "Customer:Orders",
//!         ("Customer", "Orders"),
//!         ("Order", "Customer"),
//!     ))
//!     .build()
//!     .unwrap();
//!
//! let order = mapping.class(&"Order".into()).unwrap();
//! assert!(order.property("Customer").is_some());
//! assert_eq!(ObjectId::integer("Order", 1).to_string(), "Order|1");
//! assert!(Value::Null.is_null());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod id;
pub mod mapping;
mod value;

pub use error::{ModelError, ModelResult};
pub use id::{ClassId, ObjectId, ObjectKey, RelationEndPointId};
pub use mapping::{
    Cardinality, ClassDefinition, MappingBuilder, MappingConfiguration, PropertyDefinition,
    PropertyType, RelationDefinition, RelationEndPointDefinition, SortDirection,
    SortExpression, SortSpec,
};
pub use value::Value;
