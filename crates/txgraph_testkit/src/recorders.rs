//! Observers that record what they are told.
//!
//! Every recorder appends to a shared [`EventLog`], so one log shows the
//! interleaving of extensions, listeners and handlers. Entries read
//! `label.event(detail)`, for example
//! `ext.relation_changing(Order|1.Customer: Customer|1 -> Customer|2)`.
//!
//! A recorder can be told to veto one pre-event; it records the event first
//! and then fails it with `Vetoed`.

use parking_lot::Mutex;
use std::fmt::Display;
use std::sync::Arc;
use tracing::trace;
use txgraph_core::{
    ClientTransaction, CollectionEventHandler, CommitValidator, DomainObject,
    DomainObjectEventHandler, ObjectState, PersistableData, TransactionExtension, TransactionId,
    TransactionListener, TxError, TxResult, ValueAccess,
};
use txgraph_model::{ClassId, MappingConfiguration, ObjectId, RelationEndPointId, Value};

/// A shared, ordered list of recorded events.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl EventLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    pub fn push(&self, entry: String) {
        trace!(event = %entry, "recorded");
        self.entries.lock().push(entry);
    }

    /// Returns a copy of all entries.
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    /// Returns the entries containing `needle`.
    pub fn matching(&self, needle: &str) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.contains(needle))
            .cloned()
            .collect()
    }

    /// Returns how many entries contain `needle`.
    pub fn count(&self, needle: &str) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.contains(needle))
            .count()
    }

    /// Returns the index of the first entry containing `needle`.
    pub fn position(&self, needle: &str) -> Option<usize> {
        self.entries.lock().iter().position(|e| e.contains(needle))
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drops all entries.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

fn join<T: Display>(items: impl IntoIterator<Item = T>) -> String {
    items
        .into_iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn objects(objects: &[DomainObject]) -> String {
    join(objects.iter().map(DomainObject::id))
}

fn optional(object: Option<&DomainObject>) -> String {
    object.map_or_else(|| "-".to_string(), |o| o.id().to_string())
}

fn access(access: ValueAccess) -> &'static str {
    match access {
        ValueAccess::Current => "current",
        ValueAccess::Original => "original",
    }
}

/// What a recorder writes to its log, and which pre-event it refuses.
#[derive(Debug, Clone)]
struct Recorder {
    label: String,
    log: EventLog,
    veto: Option<String>,
}

impl Recorder {
    fn new(label: impl Into<String>, log: &EventLog) -> Self {
        Self {
            label: label.into(),
            log: log.clone(),
            veto: None,
        }
    }

    fn record(&self, event: &str, detail: impl Display) {
        self.log.push(format!("{}.{event}({detail})", self.label));
    }

    fn check(&self, event: &str, detail: impl Display) -> TxResult<()> {
        self.record(event, detail);
        match &self.veto {
            Some(vetoed) if vetoed == event => {
                let reason = format!("{event} refused");
                Err(TxError::vetoed(self.label.clone(), reason))
            }
            _ => Ok(()),
        }
    }
}

/// An extension recording every event it receives.
#[derive(Debug, Clone)]
pub struct RecordingExtension {
    recorder: Recorder,
}

impl RecordingExtension {
    /// Creates an extension keyed and labelled `key`.
    pub fn new(key: impl Into<String>, log: &EventLog) -> Self {
        Self {
            recorder: Recorder::new(key, log),
        }
    }

    /// Makes the extension veto `event`.
    #[must_use]
    pub fn vetoing(mut self, event: impl Into<String>) -> Self {
        self.recorder.veto = Some(event.into());
        self
    }
}

impl TransactionExtension for RecordingExtension {
    fn key(&self) -> &str {
        &self.recorder.label
    }

    fn transaction_discard(&self, tx: &mut ClientTransaction<'_>) {
        self.recorder.record("transaction_discard", tx.id());
    }

    fn sub_transaction_creating(&self, tx: &mut ClientTransaction<'_>) -> TxResult<()> {
        self.recorder.check("sub_transaction_creating", tx.id())
    }

    fn sub_transaction_created(&self, tx: &mut ClientTransaction<'_>, sub: TransactionId) {
        self.recorder
            .record("sub_transaction_created", format!("{} -> {sub}", tx.id()));
    }

    fn new_object_creating(
        &self,
        _tx: &mut ClientTransaction<'_>,
        class: &ClassId,
    ) -> TxResult<()> {
        self.recorder.check("new_object_creating", class)
    }

    fn objects_loading(&self, _tx: &mut ClientTransaction<'_>, ids: &[ObjectId]) {
        self.recorder.record("objects_loading", join(ids));
    }

    fn objects_loaded(&self, _tx: &mut ClientTransaction<'_>, loaded: &[DomainObject]) {
        self.recorder.record("objects_loaded", objects(loaded));
    }

    fn objects_not_found(&self, _tx: &mut ClientTransaction<'_>, ids: &[ObjectId]) {
        self.recorder.record("objects_not_found", join(ids));
    }

    fn objects_unloading(
        &self,
        _tx: &mut ClientTransaction<'_>,
        unloading: &[DomainObject],
    ) -> TxResult<()> {
        self.recorder.check("objects_unloading", objects(unloading))
    }

    fn objects_unloaded(&self, _tx: &mut ClientTransaction<'_>, unloaded: &[DomainObject]) {
        self.recorder.record("objects_unloaded", objects(unloaded));
    }

    fn object_deleting(
        &self,
        _tx: &mut ClientTransaction<'_>,
        object: &DomainObject,
    ) -> TxResult<()> {
        self.recorder.check("object_deleting", object.id())
    }

    fn object_deleted(&self, _tx: &mut ClientTransaction<'_>, object: &DomainObject) {
        self.recorder.record("object_deleted", object.id());
    }

    fn property_value_reading(
        &self,
        _tx: &mut ClientTransaction<'_>,
        object: &DomainObject,
        property: &str,
        value_access: ValueAccess,
    ) {
        self.recorder.record(
            "property_value_reading",
            format!("{}.{property} {}", object.id(), access(value_access)),
        );
    }

    fn property_value_read(
        &self,
        _tx: &mut ClientTransaction<'_>,
        object: &DomainObject,
        property: &str,
        value: &Value,
        value_access: ValueAccess,
    ) {
        self.recorder.record(
            "property_value_read",
            format!(
                "{}.{property} {} = {value}",
                object.id(),
                access(value_access)
            ),
        );
    }

    fn property_value_changing(
        &self,
        _tx: &mut ClientTransaction<'_>,
        object: &DomainObject,
        property: &str,
        old: &Value,
        new: &Value,
    ) -> TxResult<()> {
        self.recorder.check(
            "property_value_changing",
            format!("{}.{property}: {old} -> {new}", object.id()),
        )
    }

    fn property_value_changed(
        &self,
        _tx: &mut ClientTransaction<'_>,
        object: &DomainObject,
        property: &str,
        old: &Value,
        new: &Value,
    ) {
        self.recorder.record(
            "property_value_changed",
            format!("{}.{property}: {old} -> {new}", object.id()),
        );
    }

    fn relation_reading(
        &self,
        _tx: &mut ClientTransaction<'_>,
        object: &DomainObject,
        property: &str,
        value_access: ValueAccess,
    ) {
        self.recorder.record(
            "relation_reading",
            format!("{}.{property} {}", object.id(), access(value_access)),
        );
    }

    fn relation_read(
        &self,
        _tx: &mut ClientTransaction<'_>,
        object: &DomainObject,
        property: &str,
        related: &[DomainObject],
        value_access: ValueAccess,
    ) {
        self.recorder.record(
            "relation_read",
            format!(
                "{}.{property} {} = [{}]",
                object.id(),
                access(value_access),
                objects(related)
            ),
        );
    }

    fn relation_changing(
        &self,
        _tx: &mut ClientTransaction<'_>,
        object: &DomainObject,
        property: &str,
        old: Option<&DomainObject>,
        new: Option<&DomainObject>,
    ) -> TxResult<()> {
        self.recorder.check(
            "relation_changing",
            format!(
                "{}.{property}: {} -> {}",
                object.id(),
                optional(old),
                optional(new)
            ),
        )
    }

    fn relation_changed(
        &self,
        _tx: &mut ClientTransaction<'_>,
        object: &DomainObject,
        property: &str,
        old: Option<&DomainObject>,
        new: Option<&DomainObject>,
    ) {
        self.recorder.record(
            "relation_changed",
            format!(
                "{}.{property}: {} -> {}",
                object.id(),
                optional(old),
                optional(new)
            ),
        );
    }

    fn committing(
        &self,
        _tx: &mut ClientTransaction<'_>,
        committing: &[DomainObject],
    ) -> TxResult<()> {
        self.recorder.check("committing", objects(committing))
    }

    fn commit_validate(
        &self,
        _tx: &mut ClientTransaction<'_>,
        data: &[PersistableData],
    ) -> TxResult<()> {
        self.recorder.check(
            "commit_validate",
            join(data.iter().map(PersistableData::id)),
        )
    }

    fn committed(&self, _tx: &mut ClientTransaction<'_>, committed: &[DomainObject]) {
        self.recorder.record("committed", objects(committed));
    }

    fn rolling_back(
        &self,
        _tx: &mut ClientTransaction<'_>,
        rolling_back: &[DomainObject],
    ) -> TxResult<()> {
        self.recorder.check("rolling_back", objects(rolling_back))
    }

    fn rolled_back(&self, _tx: &mut ClientTransaction<'_>, rolled_back: &[DomainObject]) {
        self.recorder.record("rolled_back", objects(rolled_back));
    }
}

/// A listener recording the coarse transaction events and state updates.
///
/// Reads are not recorded; use a [`RecordingExtension`] for those.
#[derive(Debug, Clone)]
pub struct RecordingListener {
    recorder: Recorder,
}

impl RecordingListener {
    /// Creates a listener writing entries labelled `label`.
    pub fn new(label: impl Into<String>, log: &EventLog) -> Self {
        Self {
            recorder: Recorder::new(label, log),
        }
    }

    /// Makes the listener veto `event`.
    #[must_use]
    pub fn vetoing(mut self, event: impl Into<String>) -> Self {
        self.recorder.veto = Some(event.into());
        self
    }
}

impl TransactionListener for RecordingListener {
    fn transaction_discard(&self, tx: &mut ClientTransaction<'_>) {
        self.recorder.record("transaction_discard", tx.id());
    }

    fn sub_transaction_creating(&self, tx: &mut ClientTransaction<'_>) -> TxResult<()> {
        self.recorder.check("sub_transaction_creating", tx.id())
    }

    fn new_object_creating(
        &self,
        _tx: &mut ClientTransaction<'_>,
        class: &ClassId,
    ) -> TxResult<()> {
        self.recorder.check("new_object_creating", class)
    }

    fn objects_loaded(&self, _tx: &mut ClientTransaction<'_>, loaded: &[DomainObject]) {
        self.recorder.record("objects_loaded", objects(loaded));
    }

    fn object_deleting(
        &self,
        _tx: &mut ClientTransaction<'_>,
        object: &DomainObject,
    ) -> TxResult<()> {
        self.recorder.check("object_deleting", object.id())
    }

    fn object_deleted(&self, _tx: &mut ClientTransaction<'_>, object: &DomainObject) {
        self.recorder.record("object_deleted", object.id());
    }

    fn property_value_changing(
        &self,
        _tx: &mut ClientTransaction<'_>,
        object: &DomainObject,
        property: &str,
        old: &Value,
        new: &Value,
    ) -> TxResult<()> {
        self.recorder.check(
            "property_value_changing",
            format!("{}.{property}: {old} -> {new}", object.id()),
        )
    }

    fn relation_changing(
        &self,
        _tx: &mut ClientTransaction<'_>,
        object: &DomainObject,
        property: &str,
        old: Option<&DomainObject>,
        new: Option<&DomainObject>,
    ) -> TxResult<()> {
        self.recorder.check(
            "relation_changing",
            format!(
                "{}.{property}: {} -> {}",
                object.id(),
                optional(old),
                optional(new)
            ),
        )
    }

    fn relation_changed(
        &self,
        _tx: &mut ClientTransaction<'_>,
        object: &DomainObject,
        property: &str,
        old: Option<&DomainObject>,
        new: Option<&DomainObject>,
    ) {
        self.recorder.record(
            "relation_changed",
            format!(
                "{}.{property}: {} -> {}",
                object.id(),
                optional(old),
                optional(new)
            ),
        );
    }

    fn committing(
        &self,
        _tx: &mut ClientTransaction<'_>,
        committing: &[DomainObject],
    ) -> TxResult<()> {
        self.recorder.check("committing", objects(committing))
    }

    fn committed(&self, _tx: &mut ClientTransaction<'_>, committed: &[DomainObject]) {
        self.recorder.record("committed", objects(committed));
    }

    fn rolling_back(
        &self,
        _tx: &mut ClientTransaction<'_>,
        rolling_back: &[DomainObject],
    ) -> TxResult<()> {
        self.recorder.check("rolling_back", objects(rolling_back))
    }

    fn rolled_back(&self, _tx: &mut ClientTransaction<'_>, rolled_back: &[DomainObject]) {
        self.recorder.record("rolled_back", objects(rolled_back));
    }

    fn data_container_state_updated(
        &self,
        _tx: &mut ClientTransaction<'_>,
        id: &ObjectId,
        state: ObjectState,
    ) {
        self.recorder
            .record("state_updated", format!("{id}={state}"));
    }

    fn virtual_relation_end_point_state_updated(
        &self,
        _tx: &mut ClientTransaction<'_>,
        id: &RelationEndPointId,
        changed: bool,
    ) {
        let state = if changed { "changed" } else { "unchanged" };
        self.recorder
            .record("end_point_state_updated", format!("{id}={state}"));
    }
}

/// A per-object and per-collection handler recording every event.
#[derive(Debug, Clone)]
pub struct RecordingHandler {
    recorder: Recorder,
}

impl RecordingHandler {
    /// Creates a handler writing entries labelled `label`.
    pub fn new(label: impl Into<String>, log: &EventLog) -> Self {
        Self {
            recorder: Recorder::new(label, log),
        }
    }

    /// Makes the handler veto `event`.
    #[must_use]
    pub fn vetoing(mut self, event: impl Into<String>) -> Self {
        self.recorder.veto = Some(event.into());
        self
    }
}

impl DomainObjectEventHandler for RecordingHandler {
    fn property_changing(
        &self,
        _tx: &mut ClientTransaction<'_>,
        object: &DomainObject,
        property: &str,
        old: &Value,
        new: &Value,
    ) -> TxResult<()> {
        self.recorder.check(
            "property_changing",
            format!("{}.{property}: {old} -> {new}", object.id()),
        )
    }

    fn property_changed(
        &self,
        _tx: &mut ClientTransaction<'_>,
        object: &DomainObject,
        property: &str,
        old: &Value,
        new: &Value,
    ) {
        self.recorder.record(
            "property_changed",
            format!("{}.{property}: {old} -> {new}", object.id()),
        );
    }

    fn relation_changing(
        &self,
        _tx: &mut ClientTransaction<'_>,
        object: &DomainObject,
        property: &str,
        old: Option<&DomainObject>,
        new: Option<&DomainObject>,
    ) -> TxResult<()> {
        self.recorder.check(
            "relation_changing",
            format!(
                "{}.{property}: {} -> {}",
                object.id(),
                optional(old),
                optional(new)
            ),
        )
    }

    fn relation_changed(
        &self,
        _tx: &mut ClientTransaction<'_>,
        object: &DomainObject,
        property: &str,
        old: Option<&DomainObject>,
        new: Option<&DomainObject>,
    ) {
        self.recorder.record(
            "relation_changed",
            format!(
                "{}.{property}: {} -> {}",
                object.id(),
                optional(old),
                optional(new)
            ),
        );
    }

    fn deleting(&self, _tx: &mut ClientTransaction<'_>, object: &DomainObject) -> TxResult<()> {
        self.recorder.check("deleting", object.id())
    }

    fn deleted(&self, _tx: &mut ClientTransaction<'_>, object: &DomainObject) {
        self.recorder.record("deleted", object.id());
    }

    fn committing(&self, _tx: &mut ClientTransaction<'_>, object: &DomainObject) -> TxResult<()> {
        self.recorder.check("committing", object.id())
    }

    fn committed(&self, _tx: &mut ClientTransaction<'_>, object: &DomainObject) {
        self.recorder.record("committed", object.id());
    }

    fn rolling_back(&self, _tx: &mut ClientTransaction<'_>, object: &DomainObject) -> TxResult<()> {
        self.recorder.check("rolling_back", object.id())
    }

    fn rolled_back(&self, _tx: &mut ClientTransaction<'_>, object: &DomainObject) {
        self.recorder.record("rolled_back", object.id());
    }
}

impl CollectionEventHandler for RecordingHandler {
    fn adding(
        &self,
        _tx: &mut ClientTransaction<'_>,
        owner: &DomainObject,
        property: &str,
        item: &DomainObject,
    ) -> TxResult<()> {
        self.recorder.check(
            "adding",
            format!("{}.{property} + {}", owner.id(), item.id()),
        )
    }

    fn added(
        &self,
        _tx: &mut ClientTransaction<'_>,
        owner: &DomainObject,
        property: &str,
        item: &DomainObject,
    ) {
        self.recorder.record(
            "added",
            format!("{}.{property} + {}", owner.id(), item.id()),
        );
    }

    fn removing(
        &self,
        _tx: &mut ClientTransaction<'_>,
        owner: &DomainObject,
        property: &str,
        item: &DomainObject,
    ) -> TxResult<()> {
        self.recorder.check(
            "removing",
            format!("{}.{property} - {}", owner.id(), item.id()),
        )
    }

    fn removed(
        &self,
        _tx: &mut ClientTransaction<'_>,
        owner: &DomainObject,
        property: &str,
        item: &DomainObject,
    ) {
        self.recorder.record(
            "removed",
            format!("{}.{property} - {}", owner.id(), item.id()),
        );
    }
}

/// A commit validator recording the objects it is shown.
#[derive(Debug, Clone)]
pub struct RecordingValidator {
    recorder: Recorder,
}

impl RecordingValidator {
    /// Creates a validator writing entries labelled `label`.
    pub fn new(label: impl Into<String>, log: &EventLog) -> Self {
        Self {
            recorder: Recorder::new(label, log),
        }
    }

    /// Makes the validator reject every commit.
    #[must_use]
    pub fn rejecting(mut self) -> Self {
        self.recorder.veto = Some("validate".to_string());
        self
    }
}

impl CommitValidator for RecordingValidator {
    fn validate(
        &self,
        _tx: TransactionId,
        _mapping: &MappingConfiguration,
        data: &[PersistableData],
    ) -> TxResult<()> {
        let detail = join(data.iter().map(|d| format!("{}={}", d.id(), d.state)));
        self.recorder.check("validate", detail)
    }
}

/// An extension running a closure on every committing pass.
///
/// Used to change or create objects while a commit is under way.
pub struct CommittingHook<F> {
    key: String,
    hook: F,
}

impl<F> CommittingHook<F>
where
    F: Fn(&mut ClientTransaction<'_>, &[DomainObject]) -> TxResult<()> + Send + Sync,
{
    /// Creates a hook extension keyed `key`.
    pub fn new(key: impl Into<String>, hook: F) -> Self {
        Self {
            key: key.into(),
            hook,
        }
    }
}

impl<F> TransactionExtension for CommittingHook<F>
where
    F: Fn(&mut ClientTransaction<'_>, &[DomainObject]) -> TxResult<()> + Send + Sync,
{
    fn key(&self) -> &str {
        &self.key
    }

    fn committing(
        &self,
        tx: &mut ClientTransaction<'_>,
        committing: &[DomainObject],
    ) -> TxResult<()> {
        (self.hook)(tx, committing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_queries() {
        let log = EventLog::new();
        let recorder = Recorder::new("ext", &log);
        recorder.record("committing", "Order|1");
        recorder.record("committed", "Order|1");

        assert_eq!(log.len(), 2);
        assert_eq!(log.count("ext.commit"), 2);
        assert_eq!(log.position("ext.committed"), Some(1));
        assert_eq!(log.matching("committing"), vec!["ext.committing(Order|1)"]);

        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn test_veto_records_first() {
        let log = EventLog::new();
        let mut recorder = Recorder::new("ext", &log);
        recorder.veto = Some("object_deleting".to_string());

        assert!(recorder.check("committing", "x").is_ok());
        let err = recorder.check("object_deleting", "Order|1").unwrap_err();
        assert!(matches!(err, TxError::Vetoed { observer, .. } if observer == "ext"));
        assert_eq!(log.len(), 2);
    }
}
