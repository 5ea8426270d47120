//! Error types for the core runtime crate.

use chorus_rs_config::ConfigError;
use chorus_rs_memory::MemoryError;
use chorus_rs_protocol::{LlmError, PlatformError};
use thiserror::Error;

/// Errors returned by bot runtime operations.
#[derive(Debug, Error)]
pub enum ChorusCoreError {
    /// Config or prompt loading failed.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    /// Memory snapshot or restore failed.
    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),
    /// The memory actor is no longer running.
    #[error("memory actor stopped")]
    MemoryClosed,
    /// The model call failed.
    #[error("generation failed: {0}")]
    Generation(#[from] LlmError),
    /// The model call did not finish in time.
    #[error("generation timed out after {0}s")]
    GenerationTimeout(u64),
    /// The model finished without producing any text.
    #[error("generation returned an empty response")]
    EmptyResponse,
    /// The generation task panicked or was cancelled.
    #[error("generation task aborted: {0}")]
    StreamAborted(String),
    /// Chat platform error.
    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),
    /// Timezone name could not be resolved.
    #[error("unknown timezone: {0}")]
    InvalidTimezone(String),
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
