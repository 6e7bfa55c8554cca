//! Error types for the `sentinel_core` crate.
//!
//! Almost nothing in the tracker is allowed to fail loudly: persistence
//! errors surface here only through the `try_*` helpers and are otherwise
//! logged and swallowed.

use std::path::PathBuf;

use sentinel_rules::RulesError;

#[derive(Debug, thiserror::Error)]
pub enum SentinelError {
    /// Reading or writing the snapshot file failed.
    #[error("persistence I/O failed on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The snapshot could not be encoded or decoded.
    #[error("snapshot serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Rules(#[from] RulesError),
}

pub type Result<T> = std::result::Result<T, SentinelError>;
