//! One-shot placement-artifact suppression.
//!
//! The host fires a removal notification at a position right after placing a
//! block there (the old block is "broken" before the new one lands). A grace
//! entry armed at placement time absorbs exactly that one notification.

use dashmap::DashSet;
use sentinel_rules::{MarkerKind, PositionKey};

/// Two independent grace namespaces, one per marker kind.
#[derive(Debug, Default)]
pub struct GraceGuard {
    anchor: DashSet<PositionKey>,
    companion: DashSet<PositionKey>,
}

impl GraceGuard {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self, kind: MarkerKind) -> &DashSet<PositionKey> {
        match kind {
            MarkerKind::Anchor => &self.anchor,
            MarkerKind::Companion => &self.companion,
        }
    }

    /// Arm a grace entry. Returns `false` if one was already armed.
    pub fn arm(&self, kind: MarkerKind, pos: PositionKey) -> bool {
        self.entries(kind).insert(pos)
    }

    /// Remove the entry and report whether it was armed.
    pub fn consume(&self, kind: MarkerKind, pos: &PositionKey) -> bool {
        self.entries(kind).remove(pos).is_some()
    }

    /// Drop a stale entry without reporting.
    pub fn disarm(&self, kind: MarkerKind, pos: &PositionKey) {
        self.entries(kind).remove(pos);
    }

    pub fn is_armed(&self, kind: MarkerKind, pos: &PositionKey) -> bool {
        self.entries(kind).contains(pos)
    }

    pub fn armed_count(&self, kind: MarkerKind) -> usize {
        self.entries(kind).len()
    }
}
