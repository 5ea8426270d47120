//! Configuration for Chorus: runtime settings, bot manifest, and
//! per-bot system prompts.
//!
//! Runtime settings come from layered JSON5 files. The manifest and the
//! prompt texts live in the storage `Configs` directory and are owned by
//! the operator.

mod error;
mod loader;
mod manifest;
mod model;
mod prompts;

/// Public error type returned by config loading and validation APIs.
pub use error::ConfigError;
/// Layered config types and loader options.
pub use loader::{ConfigLayer, ConfigLayerSource, LayeredConfig, LayeredConfigOptions};
/// Bot manifest (`bots.json`) handling.
pub use manifest::{BotManifest, MANIFEST_FILE, ManifestEntry, ManifestStatus};
/// Configuration schema models.
pub use model::*;
/// Per-bot system prompt storage.
pub use prompts::{DEFAULT_PROMPT_NAME, FALLBACK_SYSTEM_PROMPT, PromptStore};
