//! Error types for the `sentinel_rules` crate.

use std::path::PathBuf;

/// Errors produced while parsing world vocabulary or configuration.
#[derive(Debug, thiserror::Error)]
pub enum RulesError {
    /// A position key string was not three comma-separated integers.
    #[error("invalid position key: {0:?}")]
    InvalidPositionKey(String),

    /// The configuration file could not be read.
    #[error("failed to read config {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file was not valid TOML for [`crate::SentinelConfig`].
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, RulesError>;
