//! Startup reconciliation - respawn workers for anchors persisted by a
//! previous session.
//!
//! The pass runs in three steps so the host can defer spawns to its own
//! scheduling context:
//! 1. **Load**: read the snapshot once and mark every unbound key as
//!    pending restore (pending keys stay in later snapshots)
//! 2. **Begin**: hand the pending keys to the host, exactly once
//! 3. **Commit**: bind each spawned worker, re-checking that nothing else
//!    bound or removed the anchor in the meantime
//!
//! [`Reconciler::run`] drives all three against a [`WorkerHost`].

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use sentinel_rules::{PositionKey, WorkerRef};

use crate::events::{ReconcileReport, RestoreOutcome};
use crate::host::WorkerHost;
use crate::registry::{BindConflict, BindingRegistry};

#[derive(Debug, Default)]
pub struct Reconciler {
    loaded: AtomicBool,
    started: AtomicBool,
    malformed: AtomicUsize,
    already_bound: AtomicUsize,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the persisted snapshot into the registry's pending-restore set.
    ///
    /// Must run before anything binds, since a bind rewrites the snapshot.
    /// Only the first call reads the file; later calls return 0.
    pub fn load(&self, registry: &BindingRegistry) -> usize {
        if self.loaded.swap(true, Ordering::AcqRel) {
            return 0;
        }
        let Some(bridge) = registry.persistence() else {
            return 0;
        };

        let mut pending = 0;
        for raw in bridge.load_raw() {
            let key = match raw.parse::<PositionKey>() {
                Ok(key) => key,
                Err(err) => {
                    tracing::warn!(error = %err, "could not parse persisted anchor key, skipping");
                    self.malformed.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
            };
            if registry.is_bound(&key) {
                tracing::info!(anchor = %key, "persisted anchor already bound, no restore needed");
                self.already_bound.fetch_add(1, Ordering::Relaxed);
                continue;
            }
            if registry.mark_pending_restore(key) {
                pending += 1;
            }
        }

        tracing::info!(pending, "persisted anchors awaiting worker restore");
        pending
    }

    /// Start the pass. Returns the anchors that still need a worker, or
    /// `None` if the pass already started.
    pub fn begin(&self, registry: &BindingRegistry) -> Option<Vec<PositionKey>> {
        self.load(registry);
        if self.started.swap(true, Ordering::AcqRel) {
            return None;
        }
        let pending = registry
            .pending_restore_keys()
            .into_iter()
            .filter(|key| !registry.is_bound(key))
            .collect();
        Some(pending)
    }

    /// Whether [`Reconciler::begin`] has already handed out the pending keys.
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Commit one spawn result.
    ///
    /// The binding state is re-checked under the anchor's entry lock, so a
    /// late result never overwrites a newer binding or revives a removed anchor.
    pub fn commit(
        &self,
        registry: &BindingRegistry,
        anchor: PositionKey,
        spawned: Option<WorkerRef>,
    ) -> RestoreOutcome {
        let Some(worker) = spawned.filter(WorkerRef::is_valid) else {
            if registry.is_bound(&anchor) {
                return RestoreOutcome::Superseded { stray: None };
            }
            if !registry.is_pending_restore(&anchor) {
                return RestoreOutcome::Cancelled { stray: None };
            }
            tracing::warn!(anchor = %anchor, "worker restore spawn failed");
            return RestoreOutcome::SpawnFailed;
        };

        match registry.bind_restored(anchor, worker) {
            Ok(()) => {
                tracing::info!(anchor = %anchor, "worker restored");
                RestoreOutcome::Restored
            }
            Err(BindConflict::Bound(stray)) => {
                tracing::info!(anchor = %anchor, "anchor became bound before restore committed, dropping result");
                RestoreOutcome::Superseded { stray: Some(stray) }
            }
            Err(BindConflict::Removed(stray)) => {
                tracing::info!(anchor = %anchor, "anchor removed before restore committed, dropping result");
                RestoreOutcome::Cancelled { stray: Some(stray) }
            }
        }
    }

    /// Run the whole pass synchronously against `host`. Re-running after the
    /// first pass is a no-op returning an empty report.
    pub fn run(&self, registry: &BindingRegistry, host: &dyn WorkerHost) -> ReconcileReport {
        let Some(pending) = self.begin(registry) else {
            tracing::debug!("reconciliation already ran, skipping");
            return ReconcileReport::default();
        };

        let mut report = ReconcileReport {
            pending: pending.len(),
            malformed: self.malformed.load(Ordering::Relaxed),
            already_bound: self.already_bound.load(Ordering::Relaxed),
            ..Default::default()
        };

        for anchor in pending {
            // Something may have claimed the anchor since begin()
            if registry.is_bound(&anchor) || !registry.is_pending_restore(&anchor) {
                tracing::info!(anchor = %anchor, "anchor settled before restore ran, skipping");
                report.superseded += 1;
                continue;
            }

            let spawned = host.spawn_worker(anchor, anchor.spawn_point());
            match self.commit(registry, anchor, spawned) {
                RestoreOutcome::Restored => report.restored += 1,
                RestoreOutcome::SpawnFailed => report.failed += 1,
                RestoreOutcome::Superseded { stray } | RestoreOutcome::Cancelled { stray } => {
                    report.superseded += 1;
                    if let Some(worker) = stray {
                        host.despawn_worker(&worker);
                    }
                }
            }
        }

        tracing::info!(
            restored = report.restored,
            failed = report.failed,
            superseded = report.superseded,
            "reconciliation finished"
        );
        report
    }
}
