//! The tracker facade the host engine talks to.
//!
//! One [`Sentinel`] is constructed at plugin start and shared (by reference
//! or `Arc`) with every event handler. Each `on_*` method corresponds to one
//! host notification and returns what the host should do next.

use std::path::Path;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use sentinel_rules::{
    Actor, ActorId, MarkerKind, PositionKey, SentinelConfig, WorkerRef, WorldPos,
};

use crate::error::Result;
use crate::events::{
    ActorTick, AnchorPlacement, AnchorRemoval, BlockPlacement, BlockRemoval, CompanionLog,
    CompanionPlacement, CompanionRemoval, ReconcileReport, SpawnOutcome, SpawnRequest,
};
use crate::host::WorkerHost;
use crate::monitor::ProximityMonitor;
use crate::persistence::PersistenceBridge;
use crate::reconcile::Reconciler;
use crate::registry::{BindingRegistry, LogEntry};

#[derive(Debug)]
pub struct Sentinel {
    config: SentinelConfig,
    registry: BindingRegistry,
    monitor: ProximityMonitor,
    reconciler: Reconciler,
    /// Anchors with a worker spawn in flight, and the request issued for each.
    pending_spawns: DashMap<PositionKey, SpawnRequest>,
}

impl Sentinel {
    /// Create a tracker persisting to `config.persist_path`.
    ///
    /// The previous session's snapshot is read here, before anything can
    /// bind and overwrite it; workers are respawned later by
    /// [`Sentinel::on_startup`].
    pub fn new(config: SentinelConfig) -> Self {
        let registry = BindingRegistry::new(PersistenceBridge::new(config.persist_path.clone()));
        Self::with_registry(config, registry)
    }

    /// Create a tracker with no durable snapshot.
    pub fn in_memory(config: SentinelConfig) -> Self {
        Self::with_registry(config, BindingRegistry::in_memory())
    }

    /// Create a tracker from a TOML configuration file.
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self> {
        let config = SentinelConfig::load(path)?;
        Ok(Self::new(config))
    }

    fn with_registry(config: SentinelConfig, registry: BindingRegistry) -> Self {
        let reconciler = Reconciler::new();
        reconciler.load(&registry);
        Self {
            monitor: ProximityMonitor::new(&config),
            config,
            registry,
            reconciler,
            pending_spawns: DashMap::new(),
        }
    }

    pub fn config(&self) -> &SentinelConfig {
        &self.config
    }

    pub fn registry(&self) -> &BindingRegistry {
        &self.registry
    }

    pub fn monitor(&self) -> &ProximityMonitor {
        &self.monitor
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    // ---------------------------------------------------------------------
    // Placement and removal
    // ---------------------------------------------------------------------

    /// Route a block placement by block id.
    pub fn on_block_placed(&self, block_id: &str, pos: PositionKey) -> BlockPlacement {
        tracing::debug!(block = block_id, pos = %pos, "block placed");
        match MarkerKind::classify(block_id, &self.config) {
            Some(MarkerKind::Anchor) => BlockPlacement::Anchor(self.on_anchor_placed(pos)),
            Some(MarkerKind::Companion) => {
                BlockPlacement::Companion(self.on_companion_placed(pos))
            }
            None => BlockPlacement::Ignored,
        }
    }

    /// Route a block removal to both marker handlers. The host does not say
    /// what was removed, only where.
    pub fn on_block_removed(&self, pos: PositionKey) -> BlockRemoval {
        tracing::debug!(pos = %pos, "block removed");
        BlockRemoval {
            anchor: self.on_anchor_removed(pos),
            companion: self.on_companion_removed(pos),
        }
    }

    /// An anchor was placed. Either the event is a duplicate, or the host
    /// should spawn a worker and report back via
    /// [`Sentinel::complete_anchor_spawn`].
    pub fn on_anchor_placed(&self, pos: PositionKey) -> AnchorPlacement {
        // The bound check runs under the pending entry's lock, the same lock
        // complete_anchor_spawn binds under
        let request = match self.pending_spawns.entry(pos) {
            Entry::Occupied(_) => {
                tracing::info!(anchor = %pos, "spawn already in flight, ignoring placement");
                return AnchorPlacement::SpawnPending;
            }
            Entry::Vacant(slot) => {
                if self.registry.is_bound(&pos) {
                    tracing::info!(anchor = %pos, "worker already bound, ignoring placement");
                    return AnchorPlacement::AlreadyBound;
                }
                let request = SpawnRequest {
                    anchor: pos,
                    spawn_at: pos.spawn_point(),
                    companion_adjacent: self.registry.is_companion_adjacent(&pos),
                };
                slot.insert(request);
                request
            }
        };

        // Absorbs the removal the host fires right after this placement
        self.registry.arm_anchor_grace(pos);

        tracing::info!(
            anchor = %pos,
            spawn_at = %request.spawn_at,
            companion_adjacent = request.companion_adjacent,
            "requesting worker spawn"
        );
        AnchorPlacement::SpawnRequested(request)
    }

    /// Report the result of a spawn requested by [`Sentinel::on_anchor_placed`].
    ///
    /// A failed spawn drops the placement: nothing is bound and nothing is
    /// retried.
    pub fn complete_anchor_spawn(
        &self,
        request: SpawnRequest,
        spawned: Option<WorkerRef>,
    ) -> SpawnOutcome {
        let anchor = request.anchor;
        let mut spawned = spawned.filter(WorkerRef::is_valid);
        let mut bound = false;
        let mut superseded = None;

        // Bind under the pending entry's lock so a removal cannot slip in
        // between claiming the spawn and binding it
        let claimed = self.pending_spawns.remove_if(&anchor, |_, _| {
            if let Some(worker) = spawned.take() {
                match self.registry.bind_if_unbound(anchor, worker) {
                    Ok(()) => bound = true,
                    Err(worker) => superseded = Some(worker),
                }
            }
            true
        });

        if claimed.is_none() {
            tracing::info!(anchor = %anchor, "anchor removed before spawn completed");
            return SpawnOutcome::Cancelled { worker: spawned };
        }
        if let Some(worker) = superseded {
            tracing::info!(anchor = %anchor, "anchor bound elsewhere while spawn was in flight");
            return SpawnOutcome::Superseded { worker };
        }
        if !bound {
            tracing::warn!(anchor = %anchor, "worker spawn failed, placement dropped");
            return SpawnOutcome::Failed;
        }

        let active = self.registry.is_companion_adjacent(&anchor);
        tracing::info!(anchor = %anchor, active, "worker summoned");
        SpawnOutcome::Bound { active }
    }

    /// An anchor (or whatever stood at `pos`) was removed.
    pub fn on_anchor_removed(&self, pos: PositionKey) -> AnchorRemoval {
        // Grace first: at artifact time the spawn may not have bound yet
        if self.registry.consume_grace(MarkerKind::Anchor, &pos) {
            tracing::info!(anchor = %pos, "placement-artifact removal suppressed");
            return AnchorRemoval::PlacementArtifact;
        }

        let cancelled = self.pending_spawns.remove(&pos).is_some();

        if self.registry.is_tracked(&pos) || self.registry.is_pending_restore(&pos) {
            let worker = self.registry.unbind(&pos).filter(WorkerRef::is_valid);
            self.monitor.forget_anchor(&pos);
            tracing::info!(anchor = %pos, despawn = worker.is_some(), "anchor removed");
            return AnchorRemoval::Unbound { worker };
        }
        if cancelled {
            tracing::info!(anchor = %pos, "anchor removed while spawn in flight");
            return AnchorRemoval::SpawnCancelled;
        }
        AnchorRemoval::NotTracked
    }

    /// A companion was placed.
    pub fn on_companion_placed(&self, pos: PositionKey) -> CompanionPlacement {
        if !self.registry.add_companion(pos) {
            tracing::info!(companion = %pos, "duplicate companion placement, skipping");
            return CompanionPlacement::Duplicate;
        }

        let adjacent_anchor = self.registry.find_adjacent_anchor(&pos);
        match adjacent_anchor {
            Some(anchor) => {
                tracing::info!(companion = %pos, anchor = %anchor, "companion placed, monitoring active")
            }
            None => tracing::info!(companion = %pos, "companion placed, no adjacent anchor"),
        }
        CompanionPlacement::Placed { adjacent_anchor }
    }

    /// A companion (or whatever stood at `pos`) was removed.
    pub fn on_companion_removed(&self, pos: PositionKey) -> CompanionRemoval {
        if self.registry.consume_grace(MarkerKind::Companion, &pos) {
            tracing::info!(companion = %pos, "placement-artifact removal suppressed");
            return CompanionRemoval::PlacementArtifact;
        }
        if !self.registry.is_companion(&pos) {
            return CompanionRemoval::NotTracked;
        }

        // Adjacency must be read before the marker goes away
        let adjacent_anchor = self.registry.find_adjacent_anchor(&pos);
        self.registry.remove_companion(&pos);

        let still_active = adjacent_anchor
            .map(|anchor| self.registry.is_active(&anchor))
            .unwrap_or(false);
        if let Some(anchor) = adjacent_anchor {
            tracing::info!(companion = %pos, anchor = %anchor, still_active, "companion removed");
        }
        CompanionRemoval::Removed {
            adjacent_anchor,
            still_active,
        }
    }

    // ---------------------------------------------------------------------
    // Actors
    // ---------------------------------------------------------------------

    /// Periodic per-actor tick.
    pub fn on_actor_tick(&self, actor: &Actor, pos: WorldPos) -> ActorTick {
        if let Some(orphan) = self.monitor.check_orphan(&self.registry, actor) {
            return ActorTick {
                transitions: Vec::new(),
                orphan: Some(orphan),
            };
        }
        ActorTick {
            transitions: self.monitor.scan(&self.registry, actor, pos),
            orphan: None,
        }
    }

    /// The actor left the world; forget its pair state.
    pub fn on_actor_left(&self, actor: &ActorId) {
        self.monitor.forget_actor(actor);
    }

    /// An actor used a block. Returns how many anchors logged it.
    pub fn on_block_used(
        &self,
        actor: &Actor,
        actor_pos: WorldPos,
        block_id: &str,
        block_pos: PositionKey,
    ) -> usize {
        self.monitor
            .record_interaction(&self.registry, actor, actor_pos, block_id, block_pos)
    }

    // ---------------------------------------------------------------------
    // Startup
    // ---------------------------------------------------------------------

    /// Respawn workers for anchors persisted by the previous session. Safe to
    /// call repeatedly; only the first call does anything.
    pub fn on_startup(&self, host: &dyn WorkerHost) -> ReconcileReport {
        self.reconciler.run(&self.registry, host)
    }

    // ---------------------------------------------------------------------
    // Queries for presentation
    // ---------------------------------------------------------------------

    pub fn logs(&self, anchor: &PositionKey) -> Vec<LogEntry> {
        self.registry.logs(anchor)
    }

    pub fn is_active(&self, anchor: &PositionKey) -> bool {
        self.registry.is_active(anchor)
    }

    /// The log shown when a companion marker is read.
    pub fn read_companion(&self, pos: &PositionKey) -> CompanionLog {
        let active_anchor = pos
            .face_neighbors()
            .find(|anchor| self.registry.is_active(anchor));

        match active_anchor {
            Some(anchor) => CompanionLog::Log {
                anchor,
                entries: self.registry.logs(&anchor),
            },
            None => {
                tracing::debug!(companion = %pos, "read attempt with no active adjacent anchor");
                CompanionLog::NotActive
            }
        }
    }
}
