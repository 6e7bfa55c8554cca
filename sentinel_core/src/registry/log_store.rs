//! Per-anchor append-only event logs.

use chrono::{DateTime, SecondsFormat, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sentinel_rules::PositionKey;

/// A single recorded event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Wall-clock time the entry was recorded.
    pub timestamp: DateTime<Utc>,

    /// Human-readable description of the event.
    pub description: String,
}

impl LogEntry {
    /// Create an entry stamped with the current time.
    pub fn now(description: impl Into<String>) -> Self {
        Self::at(Utc::now(), description)
    }

    /// Create an entry with an explicit timestamp.
    pub fn at(timestamp: DateTime<Utc>, description: impl Into<String>) -> Self {
        Self {
            timestamp,
            description: description.into(),
        }
    }
}

impl std::fmt::Display for LogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.description
        )
    }
}

/// Log buffers keyed by anchor position.
///
/// Owned by [`super::BindingRegistry`], which decides when an append is
/// allowed and is the only caller of [`LogStore::clear`].
#[derive(Debug, Default)]
pub struct LogStore {
    buffers: DashMap<PositionKey, Vec<LogEntry>>,
}

impl LogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, anchor: PositionKey, entry: LogEntry) {
        self.buffers.entry(anchor).or_default().push(entry);
    }

    /// Point-in-time copy of an anchor's log, oldest first.
    pub fn snapshot(&self, anchor: &PositionKey) -> Vec<LogEntry> {
        self.buffers
            .get(anchor)
            .map(|entries| entries.value().clone())
            .unwrap_or_default()
    }

    /// Number of entries recorded for an anchor.
    pub fn len(&self, anchor: &PositionKey) -> usize {
        self.buffers.get(anchor).map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self, anchor: &PositionKey) -> bool {
        self.len(anchor) == 0
    }

    pub(crate) fn clear(&self, anchor: &PositionKey) {
        self.buffers.remove(anchor);
    }

    /// Number of anchors with a live buffer.
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }
}
