//! Tracker configuration, loaded from TOML.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, RulesError};

/// Configuration for binding, persistence and proximity monitoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelConfig {
    /// Radius around an anchor's block centre that counts as "inside".
    pub monitor_radius: f64,

    /// Cadence the host is expected to drive actor scans at, in seconds.
    pub scan_interval_secs: f64,

    /// Durable snapshot of bound anchor keys.
    pub persist_path: PathBuf,

    /// Scans to wait after startup before unknown workers count as orphans.
    pub orphan_grace_scans: u64,

    /// Emit a tracked/active summary every this many scans. Zero disables it.
    pub state_log_every: u64,

    /// Substring identifying anchor blocks (case-insensitive).
    pub anchor_block_key: String,

    /// Substring identifying companion blocks (case-insensitive).
    pub companion_block_key: String,

    /// NPC role name of the spawned worker.
    pub worker_role: String,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            monitor_radius: 15.0,
            scan_interval_secs: 0.5,
            persist_path: PathBuf::from("config/sentinel_anchors.json"),
            orphan_grace_scans: 8,
            state_log_every: 20,
            anchor_block_key: "hourglass".to_string(),
            companion_block_key: "golem_book".to_string(),
            worker_role: "Scriptorium_Golem".to_string(),
        }
    }
}

impl SentinelConfig {
    /// Parse configuration from a TOML string. Missing fields take defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| RulesError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Load configuration, falling back to defaults when the file is missing
    /// or unparseable.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "config unusable, using defaults");
                Self::default()
            }
        }
    }

    /// Scan cadence as a `Duration`. Non-positive or non-finite values fall
    /// back to the default half second.
    pub fn scan_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.scan_interval_secs)
            .ok()
            .filter(|interval| !interval.is_zero())
            .unwrap_or(Duration::from_millis(500))
    }

    /// Squared monitor radius, for comparisons against squared distances.
    pub fn radius_squared(&self) -> f64 {
        self.monitor_radius * self.monitor_radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = SentinelConfig::default();
        assert_eq!(config.monitor_radius, 15.0);
        assert_eq!(config.radius_squared(), 225.0);
        assert_eq!(config.orphan_grace_scans, 8);
        assert_eq!(config.scan_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_bad_scan_interval_falls_back() {
        for secs in [0.0, -1.0, f64::NAN] {
            let config = SentinelConfig {
                scan_interval_secs: secs,
                ..Default::default()
            };
            assert_eq!(config.scan_interval(), Duration::from_millis(500));
        }

        let config = SentinelConfig::from_toml_str("scan_interval_secs = 2.0").unwrap();
        assert_eq!(config.scan_interval(), Duration::from_secs(2));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = SentinelConfig::from_toml_str(
            r#"
            monitor_radius = 8.0
            persist_path = "data/anchors.json"
            "#,
        )
        .unwrap();

        assert_eq!(config.monitor_radius, 8.0);
        assert_eq!(config.persist_path, PathBuf::from("data/anchors.json"));
        assert_eq!(config.worker_role, "Scriptorium_Golem");
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let result = SentinelConfig::from_toml_str("monitor_radius = \"far\"");
        assert!(matches!(result, Err(RulesError::ConfigParse(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "orphan_grace_scans = 3").unwrap();

        let config = SentinelConfig::load(file.path()).unwrap();
        assert_eq!(config.orphan_grace_scans, 3);
    }

    #[test]
    fn test_load_or_default_on_missing_and_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert_eq!(SentinelConfig::load_or_default(&missing), SentinelConfig::default());

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "this is [not toml").unwrap();
        assert_eq!(SentinelConfig::load_or_default(&broken), SentinelConfig::default());
    }
}
