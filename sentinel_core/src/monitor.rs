//! Proximity Monitor - edge-triggered presence logging around active anchors.
//!
//! Each (actor, anchor) pair is either OUTSIDE or INSIDE. A scan moves a pair
//! INSIDE when the actor is within the radius of an active anchor, and back
//! OUTSIDE when it leaves or the anchor stops being active. Only the edges are
//! logged, so log growth tracks crossings rather than poll count.
//!
//! Distances are compared squared; the square root is taken only to format a
//! log line.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::{DashMap, DashSet};
use sentinel_rules::{
    Actor, ActorId, ActorKind, EntityId, InteractionKind, PositionKey, SentinelConfig, WorldPos,
};

use crate::events::{Crossing, ProximityTransition};
use crate::registry::BindingRegistry;

#[derive(Debug)]
pub struct ProximityMonitor {
    radius_squared: f64,
    orphan_grace_scans: u64,
    state_log_every: u64,

    /// Pairs currently INSIDE.
    inside: DashSet<(ActorId, PositionKey)>,

    scans: AtomicU64,

    /// Times each unbound worker entity has been seen.
    worker_sightings: DashMap<EntityId, u64>,
    reported_orphans: DashSet<EntityId>,
}

impl ProximityMonitor {
    pub fn new(config: &SentinelConfig) -> Self {
        Self {
            radius_squared: config.radius_squared(),
            orphan_grace_scans: config.orphan_grace_scans,
            state_log_every: config.state_log_every,
            inside: DashSet::new(),
            scans: AtomicU64::new(0),
            worker_sightings: DashMap::new(),
            reported_orphans: DashSet::new(),
        }
    }

    /// Monitor with the given radius and default settings otherwise.
    pub fn with_radius(radius: f64) -> Self {
        Self::new(&SentinelConfig {
            monitor_radius: radius,
            ..Default::default()
        })
    }

    /// Scan one actor against every tracked anchor.
    ///
    /// Appends an "entered" or "departed" line to the anchor's log on each
    /// edge and returns the edges. Worker actors are never logged.
    pub fn scan(
        &self,
        registry: &BindingRegistry,
        actor: &Actor,
        pos: WorldPos,
    ) -> Vec<ProximityTransition> {
        self.log_state(registry);

        let mut transitions = Vec::new();
        if actor.kind != ActorKind::Worker {
            for anchor in registry.anchor_keys() {
                if let Some(transition) = self.update_pair(registry, actor, pos, anchor) {
                    transitions.push(transition);
                }
            }
        }

        // Anchors that lost their binding entirely take their pair state with them
        self.inside.retain(|(_, anchor)| registry.is_tracked(anchor));

        transitions
    }

    fn update_pair(
        &self,
        registry: &BindingRegistry,
        actor: &Actor,
        pos: WorldPos,
        anchor: PositionKey,
    ) -> Option<ProximityTransition> {
        let distance_squared = pos.distance_squared(&anchor.center());
        let inside_now = distance_squared <= self.radius_squared && registry.is_active(&anchor);
        let pair = (actor.id.clone(), anchor);

        let crossing = if inside_now {
            if !self.inside.insert(pair) {
                return None;
            }
            Crossing::Entered
        } else {
            self.inside.remove(&pair)?;
            Crossing::Departed
        };

        let distance = distance_squared.sqrt();
        let label = actor.kind.label();
        let text = match crossing {
            Crossing::Entered => format!(
                "{label} '{}' entered monitoring radius (dist={distance:.1})",
                actor.display_name
            ),
            Crossing::Departed => {
                format!("{label} '{}' departed monitoring radius", actor.display_name)
            }
        };

        tracing::info!(anchor = %anchor, actor = %actor.id, ?crossing, "{text}");
        registry.append_log(&anchor, text);

        Some(ProximityTransition {
            actor: actor.id.clone(),
            anchor,
            crossing,
            distance,
        })
    }

    /// Log a block use to every active anchor within the radius of the actor.
    /// Returns how many anchors recorded it.
    pub fn record_interaction(
        &self,
        registry: &BindingRegistry,
        actor: &Actor,
        actor_pos: WorldPos,
        block_id: &str,
        block_pos: PositionKey,
    ) -> usize {
        let phrase = InteractionKind::classify(block_id).phrase();
        let mut logged = 0;

        for anchor in registry.anchor_keys() {
            if !registry.is_active(&anchor) {
                continue;
            }
            let distance_squared = actor_pos.distance_squared(&anchor.center());
            if distance_squared > self.radius_squared {
                continue;
            }

            let text = format!(
                "{} {phrase} [{block_id}] at {block_pos} (dist={:.1})",
                actor.display_name,
                distance_squared.sqrt()
            );
            tracing::info!(anchor = %anchor, actor = %actor.id, "{text}");
            if registry.append_log(&anchor, text) {
                logged += 1;
            }
        }
        logged
    }

    /// Decide whether a worker actor is an orphan: a worker entity that no
    /// binding knows about after `orphan_grace_scans` sightings. Each orphan
    /// is reported once.
    pub fn check_orphan(&self, registry: &BindingRegistry, actor: &Actor) -> Option<EntityId> {
        if actor.kind != ActorKind::Worker {
            return None;
        }
        let entity = actor.entity?;

        if registry.is_worker_entity_known(&entity) {
            self.worker_sightings.remove(&entity);
            return None;
        }

        let sightings = {
            let mut count = self.worker_sightings.entry(entity).or_insert(0);
            *count += 1;
            *count
        };
        if sightings <= self.orphan_grace_scans {
            return None;
        }

        self.worker_sightings.remove(&entity);
        if !self.reported_orphans.insert(entity) {
            return None;
        }
        tracing::warn!(worker = %entity, "orphaned worker detected, requesting removal");
        Some(entity)
    }

    pub fn is_inside(&self, actor: &ActorId, anchor: &PositionKey) -> bool {
        self.inside.contains(&(actor.clone(), *anchor))
    }

    /// Number of pairs currently INSIDE.
    pub fn pair_count(&self) -> usize {
        self.inside.len()
    }

    /// Drop all pair state for an actor that left the world, without logging.
    pub fn forget_actor(&self, actor: &ActorId) {
        self.inside.retain(|(id, _)| id != actor);
    }

    /// Drop all pair state for an anchor that was unbound, without logging.
    /// A later binding at the same key starts with every actor OUTSIDE.
    pub fn forget_anchor(&self, anchor: &PositionKey) {
        self.inside.retain(|(_, key)| key != anchor);
    }

    fn log_state(&self, registry: &BindingRegistry) {
        let scan = self.scans.fetch_add(1, Ordering::Relaxed);
        if self.state_log_every == 0 || scan % self.state_log_every != 0 {
            return;
        }
        let anchors = registry.anchor_keys();
        let active = anchors.iter().filter(|anchor| registry.is_active(anchor)).count();
        tracing::info!(tracked = anchors.len(), active, "monitor state");
    }
}
