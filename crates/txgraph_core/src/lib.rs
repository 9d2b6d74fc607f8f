//! # txgraph Core
//!
//! Hierarchical unit-of-work transactions for object graphs.
//!
//! This crate provides:
//! - Change tracking of property values and bidirectional relations
//! - Root, sub- and binding transactions with read-only propagation
//! - Lazy loading through a [`txgraph_storage::StorageProvider`]
//! - A two-phase commit/rollback protocol with fixed-point committing passes
//! - An ordered notification pipeline for extensions, listeners and
//!   per-object handlers
//!
//! ## Transactions
//!
//! The [`Engine`] is an arena of transactions addressed by [`TransactionId`].
//! Every operation names its transaction explicitly; [`ClientTransaction`]
//! borrows the engine for one transaction so the ID need not be repeated.
//!
//! A sub-transaction sees its parent's current state as its own original
//! state. While it is active the parent is read-only. Committing it copies
//! its changes into the parent without touching storage.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use txgraph_core::{Engine, ObjectState};
//! use txgraph_model::{ClassDefinition, MappingConfiguration, ObjectId,
//!     PropertyDefinition, PropertyType, Value};
//! use txgraph_storage::InMemoryStore;
//!
//! let mapping = Arc::new(
//!     MappingConfiguration::builder()
//!         .class(ClassDefinition::new("Order")
//!             .with_property(PropertyDefinition::new("OrderNumber", PropertyType::Integer)))
//!         .build()
//!         .unwrap(),
//! );
//! let store = InMemoryStore::new(Arc::clone(&mapping));
//! let id = ObjectId::integer("Order", 1);
//! store.insert(&id, [("OrderNumber", Value::Integer(1))]).unwrap();
//!
//! let mut engine = Engine::new(Arc::new(store), mapping);
//! let root = engine.create_root_transaction();
//! let order = engine.get_object(root, &id, false).unwrap();
//!
//! let sub = engine.create_sub_transaction(root).unwrap();
//! engine.set_value(sub, &order, "OrderNumber", 5).unwrap();
//! assert_eq!(engine.get_value(root, &order, "OrderNumber").unwrap(), Value::Integer(1));
//!
//! engine.commit(sub).unwrap();
//! assert_eq!(engine.get_value(root, &order, "OrderNumber").unwrap(), Value::Integer(5));
//! assert_eq!(engine.object_state(root, &order).unwrap(), ObjectState::Changed);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod commit;
mod config;
mod data;
mod domain_object;
mod endpoint;
mod engine;
mod error;
mod lifetime;
mod loading;
pub mod notify;
mod properties;
mod relations;
mod transaction;
mod types;
mod validation;

#[cfg(test)]
mod testing;

pub use config::EngineConfig;
pub use data::{ContainerLifecycle, DataContainer, DataManager, PropertyValue};
pub use domain_object::DomainObject;
pub use endpoint::{CollectionEndPoint, RealObjectEndPoint, RelationEndPoint, VirtualObjectEndPoint};
pub use engine::Engine;
pub use error::{CrossTransactionViolation, TxError, TxResult};
pub use notify::{
    CollectionEventHandler, DomainObjectEventHandler, ExtensionCollection, LoggingListener,
    TransactionExtension, TransactionListener,
};
pub use transaction::ClientTransaction;
pub use types::{ObjectHandle, ObjectState, TransactionId, TransactionKind, ValueAccess};
pub use validation::{CommitValidator, MandatoryRelationValidator, PersistableData, RelatedSnapshot};
