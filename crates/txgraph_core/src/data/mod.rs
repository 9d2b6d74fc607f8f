//! Object data tracked by a transaction.

mod container;
mod manager;
mod property_value;

pub use container::{ContainerLifecycle, DataContainer};
pub use manager::DataManager;
pub use property_value::PropertyValue;
