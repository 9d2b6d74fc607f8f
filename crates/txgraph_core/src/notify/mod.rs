//! Event notification.
//!
//! Three kinds of observers exist:
//! - [`TransactionExtension`]s, keyed and attached to one transaction
//! - [`TransactionListener`]s, which additionally see map registration and
//!   state updates
//! - per-object [`DomainObjectEventHandler`]s and per-collection
//!   [`CollectionEventHandler`]s
//!
//! For every mutation, all pre-events fire before any change happens, and
//! all post-events fire after every change is complete. Post-events fire in
//! the reverse order of their pre-events.

mod extension;
mod handlers;
mod listener;
mod pipeline;

pub use extension::{ExtensionCollection, TransactionExtension};
pub use handlers::{CollectionEventHandler, DomainObjectEventHandler};
pub use listener::{LoggingListener, TransactionListener};

pub(crate) use pipeline::NotificationPipeline;
