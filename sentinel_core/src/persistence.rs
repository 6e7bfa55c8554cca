//! Durable snapshot of bound anchor positions.
//!
//! The file is a JSON array of `"x,y,z"` strings, rewritten in full on every
//! bind and unbind. Persistence is best-effort: failures are logged and the
//! session carries on with its in-memory state.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use sentinel_rules::PositionKey;

use crate::error::{Result, SentinelError};

/// Reads and writes the anchor snapshot file.
#[derive(Debug)]
pub struct PersistenceBridge {
    path: PathBuf,
    /// Serializes snapshot-and-write so an older key set never lands last.
    write_lock: Mutex<()>,
}

impl PersistenceBridge {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the given key set. Failures are logged, never returned.
    pub fn save(&self, keys: impl IntoIterator<Item = PositionKey>) {
        self.save_with(|| keys.into_iter().collect());
    }

    /// Take a snapshot and write it while holding the writer lock.
    pub(crate) fn save_with(&self, snapshot: impl FnOnce() -> Vec<PositionKey>) {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let keys = snapshot();
        let count = keys.len();
        match self.try_save(keys) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), count, "anchor snapshot written");
            }
            Err(err) => {
                tracing::error!(path = %self.path.display(), error = %err, "failed to save anchor positions");
            }
        }
    }

    /// Write the key set, reporting failures.
    pub fn try_save(&self, keys: Vec<PositionKey>) -> Result<()> {
        let mut keys = keys;
        keys.sort();
        keys.dedup();
        let encoded: Vec<String> = keys.iter().map(PositionKey::to_string).collect();
        let json = serde_json::to_string(&encoded)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| self.io_error(parent, source))?;
        }

        // Write beside the target, then swap it in
        let staging = self.staging_path();
        std::fs::write(&staging, json).map_err(|source| self.io_error(&staging, source))?;
        std::fs::rename(&staging, &self.path).map_err(|source| self.io_error(&self.path, source))?;
        Ok(())
    }

    /// Read the persisted key set. Missing or unreadable files yield an empty
    /// set; malformed entries are skipped individually.
    pub fn load(&self) -> HashSet<PositionKey> {
        self.load_raw()
            .into_iter()
            .filter_map(|raw| match raw.parse::<PositionKey>() {
                Ok(key) => Some(key),
                Err(err) => {
                    tracing::warn!(error = %err, "skipping malformed persisted anchor key");
                    None
                }
            })
            .collect()
    }

    /// Read the persisted strings without parsing them.
    pub fn load_raw(&self) -> Vec<String> {
        match self.try_load_raw() {
            Ok(Some(keys)) => {
                tracing::debug!(path = %self.path.display(), count = keys.len(), "loaded persisted anchor keys");
                keys
            }
            Ok(None) => {
                tracing::debug!(path = %self.path.display(), "no persisted anchor file, nothing to restore");
                Vec::new()
            }
            Err(err) => {
                tracing::error!(path = %self.path.display(), error = %err, "failed to read anchor positions");
                Vec::new()
            }
        }
    }

    /// Read the persisted strings. `Ok(None)` means the file does not exist.
    ///
    /// Only a file that is not a JSON array fails as a whole. A non-string
    /// element comes back as its JSON text, so it fails key parsing and is
    /// skipped like any other malformed entry.
    pub fn try_load_raw(&self) -> Result<Option<Vec<String>>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(self.io_error(&self.path, source)),
        };

        let entries: Option<Vec<serde_json::Value>> = serde_json::from_str(&contents)?;
        let keys = entries
            .unwrap_or_default()
            .into_iter()
            .map(|entry| match entry {
                serde_json::Value::String(key) => key,
                other => other.to_string(),
            })
            .collect();
        Ok(Some(keys))
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, path: &Path, source: std::io::Error) -> SentinelError {
        SentinelError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bridge_in(dir: &tempfile::TempDir) -> PersistenceBridge {
        PersistenceBridge::new(dir.path().join("config").join("anchors.json"))
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = bridge_in(&dir);

        let keys: HashSet<_> = [
            PositionKey::new(0, 0, 0),
            PositionKey::new(5, 5, 5),
            PositionKey::new(-12, 70, 3),
        ]
        .into_iter()
        .collect();

        bridge.save(keys.clone());
        assert_eq!(bridge.load(), keys);
    }

    #[test]
    fn test_round_trip_empty_set() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = bridge_in(&dir);

        bridge.save([PositionKey::new(1, 2, 3)]);
        bridge.save(Vec::new());

        assert!(bridge.load().is_empty());
        assert!(bridge.path().exists());
    }

    #[test]
    fn test_file_format() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = bridge_in(&dir);

        bridge.save([PositionKey::new(5, 5, 5), PositionKey::new(-1, 0, 2)]);

        let contents = std::fs::read_to_string(bridge.path()).unwrap();
        assert_eq!(contents, r#"["-1,0,2","5,5,5"]"#);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = bridge_in(&dir);

        assert!(bridge.load().is_empty());
        assert!(matches!(bridge.try_load_raw(), Ok(None)));
    }

    #[test]
    fn test_corrupt_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = PersistenceBridge::new(dir.path().join("anchors.json"));
        std::fs::write(bridge.path(), "{ not json").unwrap();

        assert!(bridge.load().is_empty());
        assert!(matches!(bridge.try_load_raw(), Err(SentinelError::Serialize(_))));
    }

    #[test]
    fn test_null_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = PersistenceBridge::new(dir.path().join("anchors.json"));
        std::fs::write(bridge.path(), "null").unwrap();

        assert!(bridge.load().is_empty());
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = PersistenceBridge::new(dir.path().join("anchors.json"));
        std::fs::write(bridge.path(), r#"["1,2,3", "garbage", "4,5", "6,7,8"]"#).unwrap();

        let loaded = bridge.load();
        assert_eq!(loaded.len(), 2);
        assert!(loaded.contains(&PositionKey::new(1, 2, 3)));
        assert!(loaded.contains(&PositionKey::new(6, 7, 8)));
        assert_eq!(bridge.load_raw().len(), 4);
    }

    #[test]
    fn test_non_string_entries_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = PersistenceBridge::new(dir.path().join("anchors.json"));
        std::fs::write(bridge.path(), r#"["1,2,3", 7, null, {"x": 1}, "4,5,6"]"#).unwrap();

        let loaded = bridge.load();
        assert_eq!(loaded.len(), 2);
        assert!(loaded.contains(&PositionKey::new(1, 2, 3)));
        assert!(loaded.contains(&PositionKey::new(4, 5, 6)));
        assert_eq!(bridge.load_raw()[1], "7");

        // Rewriting keeps the good keys
        bridge.save(loaded.clone());
        assert_eq!(bridge.load(), loaded);
    }

    #[test]
    fn test_unwritable_path_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the parent directory should be
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let bridge = PersistenceBridge::new(blocker.join("anchors.json"));

        bridge.save([PositionKey::new(0, 0, 0)]);
        assert!(bridge.try_save(vec![PositionKey::new(0, 0, 0)]).is_err());
        assert!(bridge.load().is_empty());
    }
}
