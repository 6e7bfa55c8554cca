//! Binding Registry - anchor/worker bindings, companion markers and the
//! state hanging off them.
//!
//! The registry is the single owner of:
//! - **Bindings**: anchor position -> worker reference
//! - **Companions**: positions of placed companion markers
//! - **Grace entries**: one-shot placement-artifact tokens ([`GraceGuard`])
//! - **Logs**: per-anchor event buffers ([`LogStore`])
//!
//! Every map is a `dashmap` keyed by [`PositionKey`], so operations on
//! different positions never contend on a shared lock.

mod grace;
mod log_store;

pub use grace::*;
pub use log_store::*;

use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use sentinel_rules::{EntityId, MarkerKind, PositionKey, WorkerRef};

use crate::persistence::PersistenceBridge;

#[derive(Debug, Default)]
pub struct BindingRegistry {
    bindings: DashMap<PositionKey, WorkerRef>,
    companions: DashSet<PositionKey>,

    /// Persisted anchors still waiting for a worker after a restart. They stay
    /// in the snapshot so an early bind cannot erase them from disk.
    pending_restore: DashSet<PositionKey>,

    grace: GraceGuard,
    logs: LogStore,
    persistence: Option<PersistenceBridge>,
}

/// Why a conditional bind lost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum BindConflict {
    /// A live worker is already bound.
    Bound(WorkerRef),
    /// The anchor is no longer waiting for a restore.
    Removed(WorkerRef),
}

impl BindConflict {
    fn into_worker(self) -> WorkerRef {
        match self {
            BindConflict::Bound(worker) | BindConflict::Removed(worker) => worker,
        }
    }
}

impl BindingRegistry {
    /// Create a registry that snapshots bound anchors through `persistence`.
    pub fn new(persistence: PersistenceBridge) -> Self {
        Self {
            persistence: Some(persistence),
            ..Self::default()
        }
    }

    /// Create a registry with no durable snapshot.
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn persistence(&self) -> Option<&PersistenceBridge> {
        self.persistence.as_ref()
    }

    // ---------------------------------------------------------------------
    // Bindings
    // ---------------------------------------------------------------------

    /// Bind a worker to an anchor, replacing any previous binding.
    pub fn bind(&self, anchor: PositionKey, worker: WorkerRef) {
        let worker_id = worker.id();
        let previous = match self.bindings.entry(anchor) {
            Entry::Occupied(mut entry) => {
                self.pending_restore.remove(&anchor);
                Some(entry.insert(worker))
            }
            Entry::Vacant(entry) => {
                self.pending_restore.remove(&anchor);
                entry.insert(worker);
                None
            }
        };
        if let Some(previous) = previous {
            tracing::debug!(anchor = %anchor, previous = %previous.id(), "replacing existing binding");
        }
        tracing::info!(anchor = %anchor, worker = %worker_id, "worker bound to anchor");
        self.persist();
    }

    /// Bind a worker unless a live worker is already bound here. A stale
    /// binding is replaced. On conflict the worker is handed back.
    ///
    /// The check and the insert happen under the anchor's entry lock.
    pub fn bind_if_unbound(
        &self,
        anchor: PositionKey,
        worker: WorkerRef,
    ) -> Result<(), WorkerRef> {
        self.try_bind(anchor, worker, false).map_err(BindConflict::into_worker)
    }

    /// Bind a worker restored at startup. Fails if the anchor became bound
    /// or was removed (no longer pending restore) since the spawn began.
    pub(crate) fn bind_restored(
        &self,
        anchor: PositionKey,
        worker: WorkerRef,
    ) -> Result<(), BindConflict> {
        self.try_bind(anchor, worker, true)
    }

    fn try_bind(
        &self,
        anchor: PositionKey,
        worker: WorkerRef,
        require_pending: bool,
    ) -> Result<(), BindConflict> {
        let worker_id = worker.id();
        {
            let entry = self.bindings.entry(anchor);
            if let Entry::Occupied(existing) = &entry {
                if existing.get().is_valid() {
                    return Err(BindConflict::Bound(worker));
                }
            }
            // pending_restore is only touched under the binding entry lock
            if require_pending && !self.pending_restore.contains(&anchor) {
                return Err(BindConflict::Removed(worker));
            }
            self.pending_restore.remove(&anchor);
            entry.insert(worker);
        }

        tracing::info!(anchor = %anchor, worker = %worker_id, "worker bound to anchor");
        self.persist();
        Ok(())
    }

    /// Remove an anchor's binding and its log buffer.
    ///
    /// The buffer is cleared while the binding entry is still locked, so no
    /// concurrent append can land between the clear and the removal.
    pub fn unbind(&self, anchor: &PositionKey) -> Option<WorkerRef> {
        let (removed, was_pending) = match self.bindings.entry(*anchor) {
            Entry::Occupied(entry) => {
                self.logs.clear(anchor);
                let was_pending = self.pending_restore.remove(anchor).is_some();
                (Some(entry.remove()), was_pending)
            }
            Entry::Vacant(_vacant) => (None, self.pending_restore.remove(anchor).is_some()),
        };

        self.grace.disarm(MarkerKind::Anchor, anchor);

        if removed.is_some() || was_pending {
            tracing::info!(anchor = %anchor, "anchor unbound");
            self.persist();
        }
        removed
    }

    /// True if a binding exists and its worker is still live.
    ///
    /// A binding whose worker went stale is reported as unbound but kept; only
    /// [`BindingRegistry::unbind`] frees it.
    pub fn is_bound(&self, anchor: &PositionKey) -> bool {
        self.bindings
            .get(anchor)
            .map(|worker| worker.is_valid())
            .unwrap_or(false)
    }

    /// True if any binding exists, live or stale.
    pub fn is_tracked(&self, anchor: &PositionKey) -> bool {
        self.bindings.contains_key(anchor)
    }

    /// The worker bound to an anchor, if any.
    pub fn worker(&self, anchor: &PositionKey) -> Option<WorkerRef> {
        self.bindings.get(anchor).map(|worker| worker.value().clone())
    }

    /// Reverse lookup: is this worker part of any binding?
    pub fn is_worker_known(&self, worker: &WorkerRef) -> bool {
        self.is_worker_entity_known(&worker.id())
    }

    /// Reverse lookup by entity id, for hosts that only see the entity.
    pub fn is_worker_entity_known(&self, entity: &EntityId) -> bool {
        self.bindings.iter().any(|entry| entry.value().id() == *entity)
    }

    /// Point-in-time list of every anchor with a binding.
    pub fn anchor_keys(&self) -> Vec<PositionKey> {
        self.bindings.iter().map(|entry| *entry.key()).collect()
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    // ---------------------------------------------------------------------
    // Companions
    // ---------------------------------------------------------------------

    /// Register a companion marker. Returns `false` if it was already present,
    /// which is how repeated placement notifications are absorbed.
    pub fn add_companion(&self, pos: PositionKey) -> bool {
        let added = self.companions.insert(pos);
        if added {
            self.grace.arm(MarkerKind::Companion, pos);
        }
        added
    }

    /// Forget a companion marker. Returns whether it was present.
    pub fn remove_companion(&self, pos: &PositionKey) -> bool {
        self.grace.disarm(MarkerKind::Companion, pos);
        self.companions.remove(pos).is_some()
    }

    pub fn is_companion(&self, pos: &PositionKey) -> bool {
        self.companions.contains(pos)
    }

    pub fn companion_count(&self) -> usize {
        self.companions.len()
    }

    /// True if any face neighbour of the anchor holds a companion.
    pub fn is_companion_adjacent(&self, anchor: &PositionKey) -> bool {
        anchor
            .face_neighbors()
            .any(|neighbor| self.companions.contains(&neighbor))
    }

    /// The first tracked anchor face-adjacent to a companion position,
    /// checked in the order +x, -x, +y, -y, +z, -z.
    pub fn find_adjacent_anchor(&self, companion: &PositionKey) -> Option<PositionKey> {
        companion
            .face_neighbors()
            .find(|neighbor| self.bindings.contains_key(neighbor))
    }

    /// Bound with a live worker and touching a companion.
    pub fn is_active(&self, anchor: &PositionKey) -> bool {
        self.is_bound(anchor) && self.is_companion_adjacent(anchor)
    }

    // ---------------------------------------------------------------------
    // Logs
    // ---------------------------------------------------------------------

    /// Append to an anchor's log. No-op (returns `false`) when the anchor has
    /// no binding, so a scan racing an unbind cannot resurrect a buffer.
    pub fn append_log(&self, anchor: &PositionKey, text: impl Into<String>) -> bool {
        // Hold the binding's read guard across the push
        let Some(_binding) = self.bindings.get(anchor) else {
            return false;
        };
        self.logs.push(*anchor, LogEntry::now(text));
        true
    }

    /// Point-in-time copy of an anchor's log, oldest first.
    pub fn logs(&self, anchor: &PositionKey) -> Vec<LogEntry> {
        self.logs.snapshot(anchor)
    }

    pub fn log_store(&self) -> &LogStore {
        &self.logs
    }

    // ---------------------------------------------------------------------
    // Grace
    // ---------------------------------------------------------------------

    pub fn grace(&self) -> &GraceGuard {
        &self.grace
    }

    /// Arm the anchor grace entry for a just-placed anchor.
    pub fn arm_anchor_grace(&self, pos: PositionKey) -> bool {
        self.grace.arm(MarkerKind::Anchor, pos)
    }

    pub fn consume_grace(&self, kind: MarkerKind, pos: &PositionKey) -> bool {
        self.grace.consume(kind, pos)
    }

    // ---------------------------------------------------------------------
    // Restore bookkeeping
    // ---------------------------------------------------------------------

    pub(crate) fn mark_pending_restore(&self, anchor: PositionKey) -> bool {
        self.pending_restore.insert(anchor)
    }

    pub fn is_pending_restore(&self, anchor: &PositionKey) -> bool {
        self.pending_restore.contains(anchor)
    }

    pub(crate) fn pending_restore_keys(&self) -> Vec<PositionKey> {
        let mut keys: Vec<_> = self.pending_restore.iter().map(|key| *key).collect();
        keys.sort();
        keys
    }

    fn persist(&self) {
        let Some(bridge) = &self.persistence else {
            return;
        };
        bridge.save_with(|| {
            let mut keys = self.anchor_keys();
            keys.extend(self.pending_restore.iter().map(|key| *key));
            keys
        });
    }
}
