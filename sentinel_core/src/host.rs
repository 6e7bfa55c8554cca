//! The host engine's side of the worker lifecycle.

use sentinel_rules::{PositionKey, WorkerRef, WorldPos};

/// Spawns and removes worker entities on behalf of the tracker.
///
/// Implemented by the engine integration. Calls are made from whatever
/// context the host drives the tracker in; implementations must not call back
/// into the tracker synchronously.
pub trait WorkerHost {
    /// Spawn a worker for `anchor` at `at`. `None` (or a reference that is
    /// already invalid) means the spawn failed.
    fn spawn_worker(&self, anchor: PositionKey, at: WorldPos) -> Option<WorkerRef>;

    /// Remove a worker entity from the world.
    fn despawn_worker(&self, worker: &WorkerRef);
}
