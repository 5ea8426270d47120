//! Error types for memory operations.

use std::path::PathBuf;

/// Errors returned by memory snapshots and restore.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// The snapshot exists but cannot be read back.
    #[error("corrupt memory snapshot {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}
