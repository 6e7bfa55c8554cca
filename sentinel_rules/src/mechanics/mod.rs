//! Marker and interaction mechanics: what a placed or used block means.

use serde::{Deserialize, Serialize};

use crate::config::SentinelConfig;

/// The two kinds of placed markers the tracker cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarkerKind {
    /// Primary marker; once bound it owns a worker.
    Anchor,
    /// Secondary marker; activates an adjacent anchor.
    Companion,
}

impl MarkerKind {
    /// Classify a block id by case-insensitive substring match against the
    /// configured marker keys. Anchor wins if both keys match.
    pub fn classify(block_id: &str, config: &SentinelConfig) -> Option<Self> {
        let lower = block_id.to_lowercase();
        let matches = |key: &str| !key.is_empty() && lower.contains(&key.to_lowercase());

        if matches(&config.anchor_block_key) {
            Some(MarkerKind::Anchor)
        } else if matches(&config.companion_block_key) {
            Some(MarkerKind::Companion)
        } else {
            None
        }
    }
}

impl std::fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarkerKind::Anchor => write!(f, "anchor"),
            MarkerKind::Companion => write!(f, "companion"),
        }
    }
}

/// What an actor did when using a block near a monitored anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InteractionKind {
    Storage,
    Door,
    Switch,
    Furnace,
    Generic,
}

impl InteractionKind {
    /// Classify a used block by keywords in its id.
    pub fn classify(block_id: &str) -> Self {
        let lower = block_id.to_lowercase();
        let any = |words: &[&str]| words.iter().any(|w| lower.contains(w));

        if any(&["chest", "crate", "storage"]) {
            InteractionKind::Storage
        } else if any(&["door", "gate"]) {
            InteractionKind::Door
        } else if any(&["lever", "button", "switch"]) {
            InteractionKind::Switch
        } else if any(&["furnace", "forge", "smelter"]) {
            InteractionKind::Furnace
        } else {
            InteractionKind::Generic
        }
    }

    /// Phrase used in log lines.
    pub fn phrase(&self) -> &'static str {
        match self {
            InteractionKind::Storage => "opened/interacted with a chest",
            InteractionKind::Door => "opened/closed a door",
            InteractionKind::Switch => "activated a switch",
            InteractionKind::Furnace => "used a furnace",
            InteractionKind::Generic => "interacted with a block",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_classification() {
        let config = SentinelConfig::default();

        assert_eq!(
            MarkerKind::classify("Furniture_Scribes_Hourglass", &config),
            Some(MarkerKind::Anchor)
        );
        assert_eq!(
            MarkerKind::classify("TinkersBench_Golem_Book", &config),
            Some(MarkerKind::Companion)
        );
        assert_eq!(MarkerKind::classify("Rock_Stone", &config), None);
    }

    #[test]
    fn test_marker_classification_ignores_empty_keys() {
        let config = SentinelConfig {
            companion_block_key: String::new(),
            ..Default::default()
        };
        assert_eq!(MarkerKind::classify("anything", &config), None);
    }

    #[test]
    fn test_interaction_classification() {
        assert_eq!(InteractionKind::classify("Wood_Chest_Small"), InteractionKind::Storage);
        assert_eq!(InteractionKind::classify("Castle_Gate"), InteractionKind::Door);
        assert_eq!(InteractionKind::classify("Stone_Lever"), InteractionKind::Switch);
        assert_eq!(InteractionKind::classify("Bench_Forge"), InteractionKind::Furnace);
        assert_eq!(InteractionKind::classify("Plant_Flower"), InteractionKind::Generic);
        assert_eq!(InteractionKind::Generic.phrase(), "interacted with a block");
    }
}
