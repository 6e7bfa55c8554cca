//! Outcomes of host callbacks.
//!
//! Every callback on [`crate::Sentinel`] reports what it did instead of
//! acting on the world directly. The host turns these into spawns, despawns
//! and player feedback.

use serde::{Deserialize, Serialize};
use sentinel_rules::{ActorId, EntityId, PositionKey, WorkerRef, WorldPos};

use crate::registry::LogEntry;

/// A deferred worker spawn the host should perform and report back through
/// [`crate::Sentinel::complete_anchor_spawn`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnRequest {
    pub anchor: PositionKey,
    pub spawn_at: WorldPos,
    /// Whether a companion was already adjacent when the anchor was placed.
    pub companion_adjacent: bool,
}

/// Result of an anchor placement notification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnchorPlacement {
    /// A live worker is already bound here; the event was a duplicate.
    AlreadyBound,
    /// A spawn for this anchor is already in flight.
    SpawnPending,
    /// The host should spawn a worker.
    SpawnRequested(SpawnRequest),
}

/// Result of reporting a spawn back to the tracker.
#[derive(Debug, Clone, PartialEq)]
pub enum SpawnOutcome {
    /// The worker is bound. `active` tells whether a companion is adjacent.
    Bound { active: bool },
    /// The host produced no live worker. Nothing was bound.
    Failed,
    /// The anchor was removed while the spawn was in flight. The host should
    /// despawn the returned worker.
    Cancelled { worker: Option<WorkerRef> },
    /// Another live worker was bound to the anchor while the spawn was in
    /// flight (a startup restore). The host should despawn `worker`.
    Superseded { worker: WorkerRef },
}

/// Result of an anchor removal notification.
#[derive(Debug, Clone, PartialEq)]
pub enum AnchorRemoval {
    /// The synthetic removal that follows a placement. Ignored.
    PlacementArtifact,
    /// Nothing tracked at this position.
    NotTracked,
    /// A spawn was in flight; its result will be discarded.
    SpawnCancelled,
    /// The binding was removed. `worker` is set when it is still live and
    /// should be despawned by the host.
    Unbound { worker: Option<WorkerRef> },
}

/// Result of a companion placement notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompanionPlacement {
    /// Already registered; a repeated notification.
    Duplicate,
    Placed { adjacent_anchor: Option<PositionKey> },
}

/// Result of a companion removal notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompanionRemoval {
    PlacementArtifact,
    NotTracked,
    Removed {
        /// Anchor this companion was touching, found before removal.
        adjacent_anchor: Option<PositionKey>,
        /// Whether that anchor is still active through another companion.
        still_active: bool,
    },
}

/// Result of a block placement routed by block id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BlockPlacement {
    Anchor(AnchorPlacement),
    Companion(CompanionPlacement),
    Ignored,
}

/// Result of a block removal. Both marker kinds are checked for every removal.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockRemoval {
    pub anchor: AnchorRemoval,
    pub companion: CompanionRemoval,
}

/// Direction of a proximity edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Crossing {
    Entered,
    Departed,
}

/// One logged proximity edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProximityTransition {
    pub actor: ActorId,
    pub anchor: PositionKey,
    pub crossing: Crossing,
    pub distance: f64,
}

/// Result of one actor tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActorTick {
    pub transitions: Vec<ProximityTransition>,
    /// Set when the actor is a worker entity no binding knows about. The host
    /// should remove it. Reported once per entity.
    pub orphan: Option<EntityId>,
}

/// What a companion marker shows when read.
#[derive(Debug, Clone, PartialEq)]
pub enum CompanionLog {
    /// No active anchor next to this companion.
    NotActive,
    Log {
        anchor: PositionKey,
        entries: Vec<LogEntry>,
    },
}

/// Result of committing one restored worker during reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub enum RestoreOutcome {
    Restored,
    /// The anchor became bound while the spawn was in flight. The newer
    /// binding was kept; `stray` should be despawned.
    Superseded { stray: Option<WorkerRef> },
    /// The anchor was removed while the spawn was in flight.
    Cancelled { stray: Option<WorkerRef> },
    /// No live worker came back. The anchor stays persisted for the next start.
    SpawnFailed,
}

/// Summary of a reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Keys read from disk that still needed a worker.
    pub pending: usize,
    pub restored: usize,
    pub already_bound: usize,
    pub malformed: usize,
    pub failed: usize,
    /// Bound or removed by something else before the restore committed.
    pub superseded: usize,
}
