//! # txgraph Storage
//!
//! The persistence and load strategy consumed by the txgraph engine.
//!
//! Root transactions read from and commit to a [`StorageProvider`].
//! Sub-transactions never talk to storage directly; they load from their
//! parent transaction instead. The engine caches everything it loads, so each
//! provider call happens at most once per transaction level and identity.
//!
//! ## Available Providers
//!
//! - [`InMemoryStore`] - a record map guarded by a lock, for tests and
//!   ephemeral use, with JSON snapshot import/export
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use txgraph_model::{ClassDefinition, MappingConfiguration, ObjectId,
//!     PropertyDefinition, PropertyType, Value};
//! use txgraph_storage::{InMemoryStore, StorageProvider};
//!
//! let mapping = Arc::new(
//!     MappingConfiguration::builder()
//!         .class(ClassDefinition::new("Order")
//!             .with_property(PropertyDefinition::new("OrderNumber", PropertyType::Integer)))
//!         .build()
//!         .unwrap(),
//! );
//! let store = InMemoryStore::new(mapping);
//! let id = ObjectId::integer("Order", 1);
//! store.insert(&id, [("OrderNumber", Value::Integer(1))]).unwrap();
//!
//! let record = store.load_object(&id).unwrap().unwrap();
//! assert_eq!(record.value("OrderNumber"), &Value::Integer(1));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod memory;
mod provider;
mod record;

pub use error::{StorageError, StorageResult};
pub use memory::{InMemoryStore, LoadStatistics, StoreConfig};
pub use provider::StorageProvider;
pub use record::{CollectionQuery, PersistState, PersistableRecord, StoredRecord, Timestamp};
