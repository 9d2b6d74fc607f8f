//! # txgraph Testkit
//!
//! Test utilities for txgraph.
//!
//! This crate provides:
//! - The order-system fixture mapping, a seeded store and engine helpers
//! - Recording extensions, listeners, handlers and validators
//! - Property-based test generators using proptest
//! - Tracing output for tests, controlled by `RUST_LOG`
//!
//! The cross-crate scenarios live in this crate's `tests/` directory.
//!
//! ## Usage
//!
//! ```
//! use txgraph_testkit::prelude::*;
//!
//! with_engine(|engine| {
//!     let tx = engine.create_root_transaction();
//!     let order = engine.get_object(tx, &order_id(1), false).unwrap();
//!     let items = engine.get_related_objects(tx, &order, "OrderItems").unwrap();
//!     assert_eq!(items.len(), 2);
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod recorders;

use tracing_subscriber::EnvFilter;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::init_tracing;
    pub use crate::recorders::*;
}

pub use fixtures::*;
pub use generators::*;
pub use recorders::*;

/// Installs a test-friendly tracing subscriber once per process.
///
/// The filter comes from `RUST_LOG` and defaults to `warn`. Later calls are
/// no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
