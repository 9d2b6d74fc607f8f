//! The transaction engine.
//!
//! The [`Engine`] owns every transaction of every hierarchy in an arena keyed
//! by [`TransactionId`]. A transaction level holds its own data manager,
//! enlistment map and observers; it only reads its ancestors through the load
//! protocol and only writes them when a sub-transaction commits.

use crate::config::EngineConfig;
use crate::data::{DataContainer, DataManager};
use crate::domain_object::DomainObject;
use crate::endpoint::{RealObjectEndPoint, RelationEndPoint};
use crate::error::{CrossTransactionViolation, TxError, TxResult};
use crate::notify::{
    CollectionEventHandler, DomainObjectEventHandler, NotificationPipeline, TransactionExtension,
    TransactionListener,
};
use crate::transaction::ClientTransaction;
use crate::types::{ObjectHandle, ObjectState, TransactionId, TransactionKind};
use crate::validation::CommitValidator;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;
use txgraph_model::{MappingConfiguration, ObjectId, RelationEndPointId};
use txgraph_storage::StorageProvider;

/// Lifecycle of one transaction level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TransactionStatus {
    /// Usable.
    Active,
    /// A sub-transaction that committed and handed control back to its parent.
    Released,
}

/// One level of a transaction hierarchy.
pub(crate) struct TransactionNode {
    pub(crate) kind: TransactionKind,
    pub(crate) parent: Option<TransactionId>,
    pub(crate) sub: Option<TransactionId>,
    pub(crate) released: Option<TransactionId>,
    pub(crate) status: TransactionStatus,
    pub(crate) data: DataManager,
    pub(crate) enlisted: BTreeMap<ObjectId, DomainObject>,
    pub(crate) pipeline: NotificationPipeline,
    pub(crate) validators: Vec<Arc<dyn CommitValidator>>,
}

impl TransactionNode {
    fn new(kind: TransactionKind, parent: Option<TransactionId>, logging: bool) -> Self {
        Self {
            kind,
            parent,
            sub: None,
            released: None,
            status: TransactionStatus::Active,
            data: DataManager::new(),
            enlisted: BTreeMap::new(),
            pipeline: NotificationPipeline::new(logging),
            validators: Vec::new(),
        }
    }
}

/// Owner of all transactions and of the domain-object handler registries.
///
/// Every operation names the transaction it runs in. Use
/// [`Engine::transaction`] for a scope that does not repeat the ID.
///
/// Discarded transactions leave the arena. A released sub-transaction stays
/// until its parent starts the next one or is discarded itself. Handlers of
/// objects no remaining transaction knows are dropped on discard.
///
/// # Invariants
///
/// - A transaction has at most one active sub-transaction and is read-only
///   while it has one
/// - Objects with the same ID share one [`ObjectHandle`] within a hierarchy
/// - Binding transactions have neither parents nor sub-transactions
pub struct Engine {
    pub(crate) storage: Arc<dyn StorageProvider>,
    pub(crate) mapping: Arc<MappingConfiguration>,
    pub(crate) config: EngineConfig,
    pub(crate) transactions: BTreeMap<TransactionId, TransactionNode>,
    next_transaction: u64,
    next_handle: u64,
    object_handlers: HashMap<ObjectHandle, Vec<Arc<dyn DomainObjectEventHandler>>>,
    collection_handlers: HashMap<(ObjectHandle, String), Vec<Arc<dyn CollectionEventHandler>>>,
}

impl Engine {
    /// Creates an engine with the default configuration.
    pub fn new(storage: Arc<dyn StorageProvider>, mapping: Arc<MappingConfiguration>) -> Self {
        Self::with_config(storage, mapping, EngineConfig::default())
    }

    /// Creates an engine.
    pub fn with_config(
        storage: Arc<dyn StorageProvider>,
        mapping: Arc<MappingConfiguration>,
        config: EngineConfig,
    ) -> Self {
        Self {
            storage,
            mapping,
            config,
            transactions: BTreeMap::new(),
            next_transaction: 1,
            next_handle: 1,
            object_handlers: HashMap::new(),
            collection_handlers: HashMap::new(),
        }
    }

    /// Returns the mapping.
    #[must_use]
    pub fn mapping(&self) -> &Arc<MappingConfiguration> {
        &self.mapping
    }

    /// Returns the storage provider used by root transactions.
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn StorageProvider> {
        &self.storage
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns a scope running every operation in `tx`.
    pub fn transaction(&mut self, tx: TransactionId) -> ClientTransaction<'_> {
        ClientTransaction::new(self, tx)
    }

    // =========================================================================
    // Hierarchy
    // =========================================================================

    /// Creates a root transaction.
    pub fn create_root_transaction(&mut self) -> TransactionId {
        self.create_top_level(TransactionKind::Root)
    }

    /// Creates a binding transaction.
    ///
    /// Objects loaded or created in it are bound to it and cannot be used in
    /// any other transaction.
    pub fn create_binding_transaction(&mut self) -> TransactionId {
        self.create_top_level(TransactionKind::Binding)
    }

    fn create_top_level(&mut self, kind: TransactionKind) -> TransactionId {
        let id = self.mint_transaction_id();
        self.transactions.insert(
            id,
            TransactionNode::new(kind, None, self.config.logging_listener),
        );
        debug!(tx = %id, ?kind, "transaction created");
        id
    }

    fn mint_transaction_id(&mut self) -> TransactionId {
        let id = TransactionId::new(self.next_transaction);
        self.next_transaction += 1;
        id
    }

    /// Creates a sub-transaction of `parent`, making `parent` read-only.
    ///
    /// The sub-transaction sees the parent's current state as its original
    /// state. Objects deleted or invalid in the parent are invalid in it.
    ///
    /// # Errors
    ///
    /// - `InvalidOperation` for binding transactions
    /// - `ReadOnly` if `parent` already has an active sub-transaction or was
    ///   released
    pub fn create_sub_transaction(&mut self, parent: TransactionId) -> TxResult<TransactionId> {
        let node = self.node(parent)?;
        if node.kind == TransactionKind::Binding {
            return Err(TxError::invalid_operation(
                "binding transactions cannot have sub-transactions",
            ));
        }
        self.ensure_writable(parent)?;

        self.notify(parent, |l, s| l.sub_transaction_creating(s))?;

        if let Some(released) = self.node(parent)?.released {
            self.drop_level(released)?;
        }

        let id = self.mint_transaction_id();
        let parent_node = self.node(parent)?;
        let mut sub = TransactionNode::new(
            TransactionKind::Sub,
            Some(parent),
            self.config.logging_listener,
        );
        for invalid in parent_node.data.invalid_objects() {
            sub.data.mark_invalid(invalid.clone());
        }
        for container in parent_node.data.containers().filter(|c| c.is_deleted()) {
            sub.data.mark_invalid(container.id().clone());
        }
        sub.enlisted = parent_node.enlisted.clone();

        self.transactions.insert(id, sub);
        self.node_mut(parent)?.sub = Some(id);
        debug!(parent = %parent, sub = %id, "sub-transaction created");

        self.notify_after(parent, |l, s| l.sub_transaction_created(s, id));
        Ok(id)
    }

    /// Discards a transaction and its descendants.
    ///
    /// Discarding twice is a no-op. If `tx` is the active sub-transaction of
    /// its parent, the parent becomes writable again.
    pub fn discard(&mut self, tx: TransactionId) -> TxResult<()> {
        match self.node(tx) {
            Ok(_) => {}
            Err(TxError::Discarded { .. }) => return Ok(()),
            Err(err) => return Err(err),
        }
        self.drop_level(tx)?;
        self.prune_handlers();
        Ok(())
    }

    /// Removes `tx` and everything below it from the arena.
    fn drop_level(&mut self, tx: TransactionId) -> TxResult<()> {
        let node = self.node(tx)?;
        let children: Vec<TransactionId> = node.sub.into_iter().chain(node.released).collect();
        for child in children {
            self.drop_level(child)?;
        }

        self.notify_after(tx, |l, s| l.transaction_discard(s));

        let Some(node) = self.transactions.remove(&tx) else {
            return Ok(());
        };
        if let Some(parent) = node.parent.and_then(|p| self.transactions.get_mut(&p)) {
            if parent.sub == Some(tx) {
                parent.sub = None;
            }
            if parent.released == Some(tx) {
                parent.released = None;
            }
        }
        debug!(tx = %tx, "transaction discarded");
        Ok(())
    }

    /// Drops handlers of objects no remaining transaction has enlisted.
    fn prune_handlers(&mut self) {
        let live: HashSet<ObjectHandle> = self
            .transactions
            .values()
            .flat_map(|node| node.enlisted.values().map(DomainObject::handle))
            .collect();
        self.object_handlers
            .retain(|handle, _| live.contains(handle));
        self.collection_handlers
            .retain(|(handle, _), _| live.contains(handle));
    }

    /// Returns the parent of `tx`.
    pub fn parent_transaction(&self, tx: TransactionId) -> TxResult<Option<TransactionId>> {
        Ok(self.node(tx)?.parent)
    }

    /// Returns the active sub-transaction of `tx`.
    pub fn sub_transaction(&self, tx: TransactionId) -> TxResult<Option<TransactionId>> {
        Ok(self.node(tx)?.sub)
    }

    /// Walks up to the root of the hierarchy.
    pub fn root_transaction(&self, tx: TransactionId) -> TxResult<TransactionId> {
        let mut current = tx;
        while let Some(parent) = self.node(current)?.parent {
            current = parent;
        }
        Ok(current)
    }

    /// Walks down to the innermost active sub-transaction.
    pub fn leaf_transaction(&self, tx: TransactionId) -> TxResult<TransactionId> {
        let mut current = tx;
        while let Some(sub) = self.node(current)?.sub {
            current = sub;
        }
        Ok(current)
    }

    /// Returns the flavor of `tx`.
    pub fn transaction_kind(&self, tx: TransactionId) -> TxResult<TransactionKind> {
        Ok(self.node(tx)?.kind)
    }

    /// Returns whether mutations on `tx` currently fail.
    pub fn is_read_only(&self, tx: TransactionId) -> TxResult<bool> {
        let node = self.node(tx)?;
        Ok(node.sub.is_some() || node.status != TransactionStatus::Active)
    }

    /// Returns whether `tx` was discarded. Unknown IDs count as discarded.
    #[must_use]
    pub fn is_discarded(&self, tx: TransactionId) -> bool {
        !self.transactions.contains_key(&tx)
    }

    /// Returns whether `tx` is neither discarded nor released.
    #[must_use]
    pub fn is_active(&self, tx: TransactionId) -> bool {
        self.transactions
            .get(&tx)
            .is_some_and(|n| n.status == TransactionStatus::Active)
    }

    // =========================================================================
    // Observers
    // =========================================================================

    /// Attaches an extension to `tx`.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidOperation` if the key is taken.
    pub fn add_extension(
        &mut self,
        tx: TransactionId,
        extension: Arc<dyn TransactionExtension>,
    ) -> TxResult<()> {
        self.node_mut(tx)?.pipeline.add_extension(extension)
    }

    /// Detaches an extension; returns whether one was attached.
    pub fn remove_extension(&mut self, tx: TransactionId, key: &str) -> TxResult<bool> {
        Ok(self.node_mut(tx)?.pipeline.remove_extension(key))
    }

    /// Returns the keys of the extensions attached to `tx`.
    pub fn extensions(&self, tx: TransactionId) -> TxResult<Vec<String>> {
        Ok(self.node(tx)?.pipeline.extensions().keys())
    }

    /// Attaches a listener to `tx`.
    pub fn add_listener(
        &mut self,
        tx: TransactionId,
        listener: Arc<dyn TransactionListener>,
    ) -> TxResult<()> {
        self.node_mut(tx)?.pipeline.add_listener(listener);
        Ok(())
    }

    /// Adds a validator run on every commit of `tx`.
    pub fn add_commit_validator(
        &mut self,
        tx: TransactionId,
        validator: Arc<dyn CommitValidator>,
    ) -> TxResult<()> {
        self.node_mut(tx)?.validators.push(validator);
        Ok(())
    }

    /// Registers a handler for events of `object`, in any transaction.
    pub fn add_object_handler(
        &mut self,
        object: &DomainObject,
        handler: Arc<dyn DomainObjectEventHandler>,
    ) {
        self.object_handlers
            .entry(object.handle())
            .or_default()
            .push(handler);
    }

    /// Registers a handler for membership events of a collection property.
    pub fn add_collection_handler(
        &mut self,
        owner: &DomainObject,
        property: &str,
        handler: Arc<dyn CollectionEventHandler>,
    ) {
        self.collection_handlers
            .entry((owner.handle(), property.to_string()))
            .or_default()
            .push(handler);
    }

    /// Sends a pre-event to the pipeline of `tx`; the first error aborts.
    pub(crate) fn notify<F>(&mut self, tx: TransactionId, f: F) -> TxResult<()>
    where
        F: FnMut(&dyn TransactionListener, &mut ClientTransaction<'_>) -> TxResult<()>,
    {
        let observers = self.node(tx)?.pipeline.observers();
        let mut f = f;
        let mut scope = ClientTransaction::new(self, tx);
        for observer in &observers {
            f(observer.as_ref(), &mut scope)?;
        }
        Ok(())
    }

    /// Sends a post-event to the pipeline of `tx`.
    pub(crate) fn notify_after<F>(&mut self, tx: TransactionId, mut f: F)
    where
        F: FnMut(&dyn TransactionListener, &mut ClientTransaction<'_>),
    {
        let Ok(node) = self.node(tx) else {
            return;
        };
        let observers = node.pipeline.observers();
        let mut scope = ClientTransaction::new(self, tx);
        for observer in &observers {
            f(observer.as_ref(), &mut scope);
        }
    }

    /// Sends a pre-event to the handlers of `object`.
    pub(crate) fn notify_object<F>(
        &mut self,
        tx: TransactionId,
        object: &DomainObject,
        f: F,
    ) -> TxResult<()>
    where
        F: FnMut(&dyn DomainObjectEventHandler, &mut ClientTransaction<'_>) -> TxResult<()>,
    {
        let handlers = self
            .object_handlers
            .get(&object.handle())
            .cloned()
            .unwrap_or_default();
        let mut f = f;
        let mut scope = ClientTransaction::new(self, tx);
        for handler in &handlers {
            f(handler.as_ref(), &mut scope)?;
        }
        Ok(())
    }

    /// Sends a post-event to the handlers of `object`.
    pub(crate) fn notify_object_after<F>(
        &mut self,
        tx: TransactionId,
        object: &DomainObject,
        mut f: F,
    ) where
        F: FnMut(&dyn DomainObjectEventHandler, &mut ClientTransaction<'_>),
    {
        let handlers = self
            .object_handlers
            .get(&object.handle())
            .cloned()
            .unwrap_or_default();
        let mut scope = ClientTransaction::new(self, tx);
        for handler in &handlers {
            f(handler.as_ref(), &mut scope);
        }
    }

    /// Sends a pre-event to the handlers of a collection property.
    pub(crate) fn notify_collection<F>(
        &mut self,
        tx: TransactionId,
        owner: &DomainObject,
        property: &str,
        f: F,
    ) -> TxResult<()>
    where
        F: FnMut(&dyn CollectionEventHandler, &mut ClientTransaction<'_>) -> TxResult<()>,
    {
        let handlers = self.collection_handlers_of(owner, property);
        let mut f = f;
        let mut scope = ClientTransaction::new(self, tx);
        for handler in &handlers {
            f(handler.as_ref(), &mut scope)?;
        }
        Ok(())
    }

    /// Sends a post-event to the handlers of a collection property.
    pub(crate) fn notify_collection_after<F>(
        &mut self,
        tx: TransactionId,
        owner: &DomainObject,
        property: &str,
        mut f: F,
    ) where
        F: FnMut(&dyn CollectionEventHandler, &mut ClientTransaction<'_>),
    {
        let handlers = self.collection_handlers_of(owner, property);
        let mut scope = ClientTransaction::new(self, tx);
        for handler in &handlers {
            f(handler.as_ref(), &mut scope);
        }
    }

    fn collection_handlers_of(
        &self,
        owner: &DomainObject,
        property: &str,
    ) -> Vec<Arc<dyn CollectionEventHandler>> {
        self.collection_handlers
            .get(&(owner.handle(), property.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    // =========================================================================
    // Enlistment
    // =========================================================================

    /// Makes an object from another hierarchy usable in `tx`.
    ///
    /// Enlisting does not load data. Returns `false` if the object already was
    /// enlisted.
    ///
    /// # Errors
    ///
    /// - `CrossTransaction` if `tx` is a binding transaction or the object is
    ///   bound to another binding transaction
    /// - `InvalidOperation` if a different object with the same ID is enlisted
    pub fn enlist_domain_object(
        &mut self,
        tx: TransactionId,
        object: &DomainObject,
    ) -> TxResult<bool> {
        let levels = self.levels(tx)?;
        let node = self.node(tx)?;
        for level in &levels {
            if let Some(existing) = self.node(*level)?.enlisted.get(object.id()) {
                if existing.handle() == object.handle() && *level == tx {
                    return Ok(false);
                }
                if existing.handle() != object.handle() {
                    return Err(TxError::invalid_operation(format!(
                        "a different object with ID '{}' is already enlisted in {level}",
                        object.id()
                    )));
                }
            }
        }
        if node.kind == TransactionKind::Binding {
            return Err(TxError::cross_transaction(CrossTransactionViolation::BindingEnlist {
                id: object.id().clone(),
                transaction: tx,
            }));
        }
        if object.binding_transaction().is_some_and(|b| b != tx) {
            return Err(TxError::cross_transaction(CrossTransactionViolation::Bound {
                id: object.id().clone(),
                transaction: tx,
            }));
        }
        for level in levels {
            self.node_mut(level)?
                .enlisted
                .entry(object.id().clone())
                .or_insert_with(|| object.clone());
        }
        Ok(true)
    }

    /// Returns whether `object` is enlisted in `tx` itself.
    pub fn is_enlisted(&self, tx: TransactionId, object: &DomainObject) -> TxResult<bool> {
        Ok(self
            .node(tx)?
            .enlisted
            .get(object.id())
            .is_some_and(|o| o.handle() == object.handle()))
    }

    /// Returns every object enlisted in `tx`, ordered by ID.
    pub fn enlisted_objects(&self, tx: TransactionId) -> TxResult<Vec<DomainObject>> {
        Ok(self.node(tx)?.enlisted.values().cloned().collect())
    }

    /// Returns the reference `tx` uses for `id`, minting one if needed.
    ///
    /// The reference is shared with every ancestor.
    pub(crate) fn enlist(&mut self, tx: TransactionId, id: &ObjectId) -> TxResult<DomainObject> {
        let levels = self.levels(tx)?;
        let existing = levels
            .iter()
            .find_map(|level| self.transactions.get(level)?.enlisted.get(id).cloned());
        let object = match existing {
            Some(object) => object,
            None => {
                let binding =
                    (self.node(tx)?.kind == TransactionKind::Binding).then_some(tx);
                let handle = ObjectHandle(self.next_handle);
                self.next_handle += 1;
                DomainObject::new(id.clone(), handle, binding)
            }
        };
        for level in levels {
            self.node_mut(level)?
                .enlisted
                .entry(id.clone())
                .or_insert_with(|| object.clone());
        }
        Ok(object)
    }

    /// A sub-transaction starts with its parent's enlistments; later ones in
    /// an ancestor stay invisible to it until enlisted there.
    fn is_usable(&self, tx: TransactionId, object: &DomainObject) -> bool {
        self.transactions.get(&tx).is_some_and(|node| {
            node.enlisted
                .get(object.id())
                .is_some_and(|o| o.handle() == object.handle())
        })
    }

    /// Fails unless `object` belongs to the hierarchy of `tx`.
    pub(crate) fn check_usable(
        &mut self,
        tx: TransactionId,
        object: &DomainObject,
    ) -> TxResult<()> {
        self.node(tx)?;
        if self.is_usable(tx, object) {
            self.enlist(tx, object.id())?;
            return Ok(());
        }
        let violation = if object.binding_transaction().is_some_and(|b| b != tx) {
            CrossTransactionViolation::Bound {
                id: object.id().clone(),
                transaction: tx,
            }
        } else {
            CrossTransactionViolation::NotEnlisted {
                id: object.id().clone(),
                transaction: tx,
            }
        };
        Err(TxError::cross_transaction(violation))
    }

    /// Fails unless both sides of a relation change belong to `tx`.
    pub(crate) fn check_relation_participants(
        &mut self,
        tx: TransactionId,
        owner: &DomainObject,
        item: &DomainObject,
    ) -> TxResult<()> {
        self.node(tx)?;
        let owner_ok = self.is_usable(tx, owner);
        let item_ok = self.is_usable(tx, item);
        if owner_ok && item_ok {
            self.enlist(tx, owner.id())?;
            self.enlist(tx, item.id())?;
            return Ok(());
        }
        let id = item.id().clone();
        let owner_id = owner.id().clone();
        let violation = match (owner.binding_transaction(), item.binding_transaction()) {
            (Some(a), Some(b)) if a != b => CrossTransactionViolation::BoundToDifferent {
                id,
                owner: owner_id,
            },
            (_, Some(_)) if !item_ok => CrossTransactionViolation::ObjectBound {
                id,
                owner: owner_id,
            },
            (Some(a), _) if !owner_ok || a != tx => CrossTransactionViolation::OwnerBound {
                id,
                owner: owner_id,
            },
            _ if !owner_ok => CrossTransactionViolation::NotEnlisted {
                id: owner_id,
                transaction: tx,
            },
            _ => CrossTransactionViolation::NotEnlisted {
                id,
                transaction: tx,
            },
        };
        Err(TxError::cross_transaction(violation))
    }

    // =========================================================================
    // State
    // =========================================================================

    /// Returns the state of `object` in `tx`.
    ///
    /// Every object of a discarded transaction is `Invalid`.
    pub fn object_state(&self, tx: TransactionId, object: &DomainObject) -> TxResult<ObjectState> {
        match self.node(tx) {
            Ok(_) => {}
            Err(TxError::Discarded { .. }) => return Ok(ObjectState::Invalid),
            Err(err) => return Err(err),
        }
        if !self.is_usable(tx, object) {
            return Err(TxError::cross_transaction(CrossTransactionViolation::NotEnlisted {
                id: object.id().clone(),
                transaction: tx,
            }));
        }
        Ok(self.state_of(tx, object.id()))
    }

    /// Returns the data `tx` holds, for inspection.
    pub fn data_manager(&self, tx: TransactionId) -> TxResult<&DataManager> {
        Ok(&self.node(tx)?.data)
    }

    pub(crate) fn state_of(&self, tx: TransactionId, id: &ObjectId) -> ObjectState {
        let (Some(node), Ok(class)) =
            (self.transactions.get(&tx), self.mapping.class(id.class_id()))
        else {
            return ObjectState::Invalid;
        };
        node.data.object_state(id, class)
    }

    pub(crate) fn capture_states(
        &self,
        tx: TransactionId,
        ids: &[ObjectId],
    ) -> Vec<(ObjectId, ObjectState)> {
        ids.iter()
            .map(|id| (id.clone(), self.state_of(tx, id)))
            .collect()
    }

    /// Tells listeners about every object whose state moved.
    pub(crate) fn publish_state_changes(
        &mut self,
        tx: TransactionId,
        before: Vec<(ObjectId, ObjectState)>,
    ) {
        for (id, old) in before {
            let new = self.state_of(tx, &id);
            if new != old {
                self.notify_after(tx, |l, s| l.data_container_state_updated(s, &id, new));
            }
        }
    }

    /// Returns the IDs of every object `tx` has to commit or roll back.
    pub(crate) fn dirty_objects(&self, tx: TransactionId) -> TxResult<Vec<ObjectId>> {
        let node = self.node(tx)?;
        let mapping = &self.mapping;
        Ok(node
            .data
            .dirty_objects(|id| mapping.class(id.class_id()).ok()))
    }

    // =========================================================================
    // Map registration
    // =========================================================================

    /// Adds a container and the real end points it backs.
    pub(crate) fn register_container(
        &mut self,
        tx: TransactionId,
        container: DataContainer,
    ) -> TxResult<()> {
        let mapping = Arc::clone(&self.mapping);
        let class = mapping.class(container.id().class_id())?;
        let id = container.id().clone();

        self.notify_after(tx, |l, s| l.data_container_map_registering(s, &container));
        self.node_mut(tx)?.data.insert_container(container);
        self.notify_after(tx, |l, s| l.data_container_map_registered(s, &id));

        for def in class.real_end_points() {
            let ep_id = RelationEndPointId::new(id.clone(), def.property_name());
            self.register_end_point(tx, RelationEndPoint::Real(RealObjectEndPoint::new(ep_id)))?;
        }
        Ok(())
    }

    /// Removes a container and its real end points; with `with_virtual`, also
    /// the object's virtual end points.
    pub(crate) fn unregister_container(
        &mut self,
        tx: TransactionId,
        id: &ObjectId,
        with_virtual: bool,
    ) -> TxResult<()> {
        let end_points = self.node(tx)?.data.end_points_of(id);
        for ep_id in end_points {
            let is_virtual = self
                .node(tx)?
                .data
                .end_point(&ep_id)
                .is_some_and(RelationEndPoint::is_virtual);
            if with_virtual || !is_virtual {
                self.unregister_end_point(tx, &ep_id)?;
            }
        }
        if self.node(tx)?.data.container(id).is_none() {
            return Ok(());
        }
        self.notify_after(tx, |l, s| l.data_container_map_unregistering(s, id));
        self.node_mut(tx)?.data.remove_container(id);
        self.notify_after(tx, |l, s| l.data_container_map_unregistered(s, id));
        Ok(())
    }

    pub(crate) fn register_end_point(
        &mut self,
        tx: TransactionId,
        end_point: RelationEndPoint,
    ) -> TxResult<()> {
        self.notify_after(tx, |l, s| {
            l.relation_end_point_map_registering(s, &end_point)
        });
        self.node_mut(tx)?.data.insert_end_point(end_point);
        Ok(())
    }

    pub(crate) fn unregister_end_point(
        &mut self,
        tx: TransactionId,
        id: &RelationEndPointId,
    ) -> TxResult<()> {
        if self.node(tx)?.data.end_point(id).is_none() {
            return Ok(());
        }
        self.notify_after(tx, |l, s| l.relation_end_point_map_unregistering(s, id));
        self.node_mut(tx)?.data.remove_end_point(id);
        Ok(())
    }

    // =========================================================================
    // Node access
    // =========================================================================

    /// Returns the node of `tx`; IDs this engine minted but no longer holds
    /// were discarded.
    pub(crate) fn node(&self, tx: TransactionId) -> TxResult<&TransactionNode> {
        self.transactions
            .get(&tx)
            .ok_or_else(|| self.missing(tx))
    }

    pub(crate) fn node_mut(&mut self, tx: TransactionId) -> TxResult<&mut TransactionNode> {
        let missing = self.missing(tx);
        self.transactions.get_mut(&tx).ok_or(missing)
    }

    fn missing(&self, tx: TransactionId) -> TxError {
        if (1..self.next_transaction).contains(&tx.as_u64()) {
            TxError::Discarded { transaction: tx }
        } else {
            TxError::UnknownTransaction { transaction: tx }
        }
    }

    /// Returns the number of transactions the arena holds.
    #[must_use]
    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    /// Returns the number of objects and collections with handlers attached.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.object_handlers.len() + self.collection_handlers.len()
    }

    /// Fails unless `tx` may be mutated right now.
    pub(crate) fn ensure_writable(&self, tx: TransactionId) -> TxResult<()> {
        let node = self.node(tx)?;
        if node.status == TransactionStatus::Released {
            return Err(TxError::read_only(
                tx,
                "the sub-transaction was committed and its parent resumed",
            ));
        }
        if node.sub.is_some() {
            return Err(TxError::read_only(tx, "a sub-transaction is active"));
        }
        Ok(())
    }

    /// Returns the ancestors of `tx`, nearest first.
    pub(crate) fn ancestors(&self, tx: TransactionId) -> Vec<TransactionId> {
        let mut result = Vec::new();
        let mut current = self.transactions.get(&tx).and_then(|n| n.parent);
        while let Some(id) = current {
            result.push(id);
            current = self.transactions.get(&id).and_then(|n| n.parent);
        }
        result
    }

    /// Returns `tx` followed by its ancestors.
    pub(crate) fn levels(&self, tx: TransactionId) -> TxResult<Vec<TransactionId>> {
        self.node(tx)?;
        Ok(std::iter::once(tx).chain(self.ancestors(tx)).collect())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("transactions", &self.transactions.len())
            .finish()
    }
}
