//! Entity definitions for the host world.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::SentinelConfig;

/// Unique identifier for all entities in the host world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    /// Create a new random entity ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle to a spawned worker entity.
///
/// The host owns the liveness flag and may invalidate it at any time without
/// telling the tracker (entity killed, chunk unloaded). Clones share the flag.
/// Equality and hashing use the entity id only.
#[derive(Debug, Clone)]
pub struct WorkerRef {
    id: EntityId,
    alive: Arc<AtomicBool>,
}

impl WorkerRef {
    /// Create a live reference to the given entity.
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Create a live reference to a fresh entity id.
    pub fn spawn() -> Self {
        Self::new(EntityId::new())
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Whether the host still considers the entity live.
    pub fn is_valid(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Mark the entity as gone. Called by the host.
    pub fn invalidate(&self) {
        self.alive.store(false, Ordering::Release);
    }
}

impl PartialEq for WorkerRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for WorkerRef {}

impl std::hash::Hash for WorkerRef {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Stable identifier for an observed actor, supplied by the host
/// (player session id or entity id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(pub String);

impl ActorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl From<EntityId> for ActorId {
    fn from(id: EntityId) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kinds of actors the monitor observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActorKind {
    Player,
    Npc,
    /// An NPC carrying the worker role. Never logged as a visitor.
    Worker,
}

impl ActorKind {
    /// Label used in log lines.
    pub fn label(&self) -> &'static str {
        match self {
            ActorKind::Player => "Player",
            ActorKind::Npc | ActorKind::Worker => "NPC",
        }
    }
}

/// An observed actor as reported by the host on each tick.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub kind: ActorKind,
    pub display_name: String,
    /// Entity backing this actor, when the host exposes one.
    pub entity: Option<EntityId>,
}

impl Actor {
    /// Create a player actor.
    pub fn player(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: ActorId::new(id),
            kind: ActorKind::Player,
            display_name: display_name.into(),
            entity: None,
        }
    }

    /// Create an NPC actor backed by an entity.
    pub fn npc(entity: EntityId, role_name: impl Into<String>) -> Self {
        Self {
            id: ActorId::from(entity),
            kind: ActorKind::Npc,
            display_name: role_name.into(),
            entity: Some(entity),
        }
    }

    /// Create an actor for a worker entity.
    pub fn worker(entity: EntityId, role_name: impl Into<String>) -> Self {
        Self {
            kind: ActorKind::Worker,
            ..Self::npc(entity, role_name)
        }
    }

    /// Create an NPC actor, recognising the configured worker role.
    pub fn from_npc_role(entity: EntityId, role_name: &str, config: &SentinelConfig) -> Self {
        if role_name.eq_ignore_ascii_case(&config.worker_role) {
            Self::worker(entity, role_name)
        } else {
            Self::npc(entity, role_name)
        }
    }
}
