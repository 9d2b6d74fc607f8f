//! Fan-out of transaction events.

use super::extension::{ExtensionCollection, TransactionExtension};
use super::listener::{ExtensionListener, LoggingListener, TransactionListener};
use crate::error::TxResult;
use std::sync::Arc;

/// The observers of one transaction.
///
/// Events go to the listeners in the order they were added, then to the
/// extensions in the order they were added.
#[derive(Clone, Default)]
pub(crate) struct NotificationPipeline {
    listeners: Vec<Arc<dyn TransactionListener>>,
    extensions: ExtensionCollection,
}

impl NotificationPipeline {
    /// Creates the pipeline a new transaction starts with.
    pub(crate) fn new(logging: bool) -> Self {
        let mut pipeline = Self::default();
        if logging {
            pipeline.listeners.push(Arc::new(LoggingListener));
        }
        pipeline
    }

    pub(crate) fn add_listener(&mut self, listener: Arc<dyn TransactionListener>) {
        self.listeners.push(listener);
    }

    pub(crate) fn add_extension(
        &mut self,
        extension: Arc<dyn TransactionExtension>,
    ) -> TxResult<()> {
        self.extensions.add(extension)
    }

    pub(crate) fn remove_extension(&mut self, key: &str) -> bool {
        self.extensions.remove(key)
    }

    pub(crate) fn extensions(&self) -> &ExtensionCollection {
        &self.extensions
    }

    /// Snapshots the observers so callbacks can use the transaction freely.
    pub(crate) fn observers(&self) -> Vec<Arc<dyn TransactionListener>> {
        self.listeners
            .iter()
            .cloned()
            .chain(self.extensions.iter().map(|e| {
                Arc::new(ExtensionListener(Arc::clone(e))) as Arc<dyn TransactionListener>
            }))
            .collect()
    }
}
