//! End-to-end host flows against the public facade.

use std::sync::Mutex;

use sentinel_core::{
    AnchorPlacement, AnchorRemoval, BlockPlacement, CompanionLog, Crossing, Sentinel,
    SpawnOutcome, WorkerHost,
};
use sentinel_rules::{Actor, PositionKey, SentinelConfig, WorkerRef, WorldPos};

/// Spawns live workers and remembers everything it was asked to do.
#[derive(Default)]
struct FakeHost {
    spawned: Mutex<Vec<(PositionKey, WorkerRef)>>,
    despawned: Mutex<Vec<WorkerRef>>,
}

impl WorkerHost for FakeHost {
    fn spawn_worker(&self, anchor: PositionKey, _at: WorldPos) -> Option<WorkerRef> {
        let worker = WorkerRef::spawn();
        self.spawned.lock().unwrap().push((anchor, worker.clone()));
        Some(worker)
    }

    fn despawn_worker(&self, worker: &WorkerRef) {
        worker.invalidate();
        self.despawned.lock().unwrap().push(worker.clone());
    }
}

impl FakeHost {
    /// Place a block the way the engine does: placement, then the synthetic
    /// removal, then the deferred spawn.
    fn place(&self, sentinel: &Sentinel, block_id: &str, pos: PositionKey) {
        let placement = sentinel.on_block_placed(block_id, pos);
        sentinel.on_block_removed(pos);
        if let BlockPlacement::Anchor(AnchorPlacement::SpawnRequested(request)) = placement {
            let worker = self.spawn_worker(request.anchor, request.spawn_at);
            sentinel.complete_anchor_spawn(request, worker);
        }
    }

    fn break_block(&self, sentinel: &Sentinel, pos: PositionKey) {
        if let AnchorRemoval::Unbound {
            worker: Some(worker),
        } = sentinel.on_block_removed(pos).anchor
        {
            self.despawn_worker(&worker);
        }
    }
}

fn config_in(dir: &tempfile::TempDir) -> SentinelConfig {
    SentinelConfig {
        persist_path: dir.path().join("anchors.json"),
        ..Default::default()
    }
}

#[test]
fn test_full_session() {
    let dir = tempfile::tempdir().unwrap();
    let sentinel = Sentinel::new(config_in(&dir));
    let host = FakeHost::default();
    let anchor = PositionKey::new(10, 64, 10);
    let companion = anchor.offset(1, 0, 0);

    host.place(&sentinel, "Furniture_Scribes_Hourglass", anchor);
    assert!(sentinel.registry().is_bound(&anchor));
    assert!(!sentinel.is_active(&anchor));

    host.place(&sentinel, "Golem_Book", companion);
    assert!(sentinel.is_active(&anchor));

    let alice = Actor::player("p-1", "Alice");
    let near = WorldPos::new(14.5, 64.5, 10.5);
    let far = WorldPos::new(60.0, 64.5, 10.5);

    let tick = sentinel.on_actor_tick(&alice, near);
    assert_eq!(tick.transitions.len(), 1);
    assert_eq!(tick.transitions[0].crossing, Crossing::Entered);

    // Staying inside logs nothing new
    assert!(sentinel.on_actor_tick(&alice, near).transitions.is_empty());

    assert_eq!(
        sentinel.on_block_used(&alice, near, "Furniture_Chest", anchor.offset(0, 0, 3)),
        1
    );

    let tick = sentinel.on_actor_tick(&alice, far);
    assert_eq!(tick.transitions[0].crossing, Crossing::Departed);

    let CompanionLog::Log { entries, .. } = sentinel.read_companion(&companion) else {
        panic!("companion should show the anchor's log");
    };
    let lines: Vec<String> = entries.iter().map(|e| e.description.clone()).collect();
    assert_eq!(
        lines,
        vec![
            "Player 'Alice' entered monitoring radius (dist=4.0)".to_string(),
            "Alice opened/interacted with a chest [Furniture_Chest] at 10,64,13 (dist=4.0)"
                .to_string(),
            "Player 'Alice' departed monitoring radius".to_string(),
        ]
    );

    host.break_block(&sentinel, anchor);
    assert!(!sentinel.registry().is_tracked(&anchor));
    assert_eq!(host.despawned.lock().unwrap().len(), 1);
    assert!(sentinel.registry().persistence().unwrap().load().is_empty());
}

#[test]
fn test_restart_restores_workers() {
    let dir = tempfile::tempdir().unwrap();
    let kept = PositionKey::new(0, 0, 0);
    let removed = PositionKey::new(5, 5, 5);

    {
        let sentinel = Sentinel::new(config_in(&dir));
        let host = FakeHost::default();
        host.place(&sentinel, "hourglass", kept);
        host.place(&sentinel, "hourglass", removed);
        host.break_block(&sentinel, removed);
    }

    let sentinel = Sentinel::new(config_in(&dir));
    assert!(!sentinel.registry().is_bound(&kept));

    let host = FakeHost::default();
    let report = sentinel.on_startup(&host);

    assert_eq!(report.restored, 1);
    assert!(sentinel.registry().is_bound(&kept));
    assert!(!sentinel.registry().is_tracked(&removed));
    let spawned: Vec<PositionKey> = host.spawned.lock().unwrap().iter().map(|(p, _)| *p).collect();
    assert_eq!(spawned, vec![kept]);

    // The pass runs once per session
    assert_eq!(sentinel.on_startup(&host).restored, 0);
}

#[test]
fn test_placement_before_startup_keeps_other_anchors() {
    let dir = tempfile::tempdir().unwrap();
    let old = PositionKey::new(1, 2, 3);
    {
        let sentinel = Sentinel::new(config_in(&dir));
        FakeHost::default().place(&sentinel, "hourglass", old);
    }

    // A new anchor is placed before the restore pass gets to run
    let sentinel = Sentinel::new(config_in(&dir));
    let host = FakeHost::default();
    host.place(&sentinel, "hourglass", PositionKey::new(9, 9, 9));

    let on_disk = sentinel.registry().persistence().unwrap().load();
    assert!(on_disk.contains(&old));

    assert_eq!(sentinel.on_startup(&host).restored, 1);
    assert!(sentinel.registry().is_bound(&old));
}

#[test]
fn test_failed_spawn_is_not_retried() {
    let sentinel = Sentinel::in_memory(SentinelConfig::default());
    let anchor = PositionKey::new(0, 0, 0);

    let BlockPlacement::Anchor(AnchorPlacement::SpawnRequested(request)) =
        sentinel.on_block_placed("hourglass", anchor)
    else {
        panic!("expected a spawn request");
    };
    sentinel.on_block_removed(anchor);

    assert_eq!(sentinel.complete_anchor_spawn(request, None), SpawnOutcome::Failed);
    assert!(!sentinel.registry().is_tracked(&anchor));
    let bob = Actor::player("p-2", "Bob");
    let tick = sentinel.on_actor_tick(&bob, WorldPos::new(0.5, 0.5, 0.5));
    assert!(tick.transitions.is_empty());
}
