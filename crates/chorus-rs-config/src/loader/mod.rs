//! Layered configuration loader.
//!
//! Discovers the user and working-directory layers plus any runtime
//! overrides, validates each against the schema, merges them in order and
//! produces the final `ChorusConfig`.

mod layer_io;
mod merge;
mod schema;


use crate::{ChorusConfig, ConfigError, ContextWindow};
use layer_io::LayerCandidate;
use log::{debug, info};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Default config filename in local layers.
const DEFAULT_CONFIG_FILE: &str = "chorus.json5";
/// Default config directory under the home directory.
const DEFAULT_CONFIG_DIR: &str = ".chorus";

/// Effective config plus metadata about which layers were loaded.
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    /// The merged, validated config.
    pub config: ChorusConfig,
    /// Metadata for each layer that contributed.
    pub layers: Vec<ConfigLayer>,
}

/// Origin for a single config layer in the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayerSource {
    /// User-specific configuration.
    User,
    /// Current working directory configuration.
    Cwd,
    /// Explicit `--config` overrides (highest precedence).
    Runtime,
}

impl fmt::Display for ConfigLayerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConfigLayerSource::User => "user",
            ConfigLayerSource::Cwd => "cwd",
            ConfigLayerSource::Runtime => "runtime",
        })
    }
}

/// Metadata about a loaded config layer.
#[derive(Debug, Clone)]
pub struct ConfigLayer {
    pub source: ConfigLayerSource,
    pub path: Option<PathBuf>,
}

/// Options controlling layered config discovery and overrides.
#[derive(Debug, Clone)]
pub struct LayeredConfigOptions {
    /// Working directory used for the cwd layer.
    pub cwd: PathBuf,
    /// Optional user config path (defaults to `~/.chorus/chorus.json5`).
    pub user_config_path: Option<PathBuf>,
    /// Runtime override config paths applied last, in order.
    pub runtime_paths: Vec<PathBuf>,
}

impl LayeredConfigOptions {
    /// Create options with default layer locations for the provided cwd.
    pub fn new(cwd: impl AsRef<Path>) -> Self {
        Self {
            cwd: cwd.as_ref().to_path_buf(),
            user_config_path: layer_io::default_user_config_path(),
            runtime_paths: Vec::new(),
        }
    }

    /// Skip the user layer entirely.
    pub fn without_user_layer(mut self) -> Self {
        self.user_config_path = None;
        self
    }

    /// Add a runtime override config path that is applied last.
    pub fn with_runtime_path(mut self, path: impl AsRef<Path>) -> Self {
        self.runtime_paths.push(path.as_ref().to_path_buf());
        self
    }

    fn candidates(&self) -> Vec<LayerCandidate> {
        let user = self.user_config_path.iter().map(|path| LayerCandidate {
            source: ConfigLayerSource::User,
            path: path.clone(),
        });
        let cwd = std::iter::once(LayerCandidate {
            source: ConfigLayerSource::Cwd,
            path: self.cwd.join(DEFAULT_CONFIG_FILE),
        });
        let runtime = self.runtime_paths.iter().map(|path| LayerCandidate {
            source: ConfigLayerSource::Runtime,
            path: path.clone(),
        });
        user.chain(cwd).chain(runtime).collect()
    }
}

impl ChorusConfig {
    /// Read one JSON5 file, without layering.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("reading config (path={})", path.display());
        Self::load_from_str(&fs::read_to_string(path)?)
    }

    /// Parse JSON5 text, without layering.
    pub fn load_from_str(contents: &str) -> Result<Self, ConfigError> {
        config_from_value(json5::from_str(contents)?, "inline")
    }

    /// Layered load with the default user layer location.
    pub fn load_layered(cwd: impl AsRef<Path>) -> Result<LayeredConfig, ConfigError> {
        Self::load_layered_with_options(LayeredConfigOptions::new(cwd))
    }

    /// Merge user, cwd, then runtime layers (later wins) and validate the
    /// result. A file reached through more than one layer is read once.
    pub fn load_layered_with_options(
        options: LayeredConfigOptions,
    ) -> Result<LayeredConfig, ConfigError> {
        let mut merged = Value::Object(serde_json::Map::new());
        let mut layers = Vec::new();
        let mut seen = HashSet::new();

        for candidate in options.candidates() {
            if !seen.insert(candidate.key()) {
                debug!(
                    "config layer already read (source={}, path={})",
                    candidate.source,
                    candidate.path.display()
                );
                continue;
            }
            if let Some((meta, value)) = candidate.read()? {
                merge::merge_json_values(&mut merged, &value);
                layers.push(meta);
            }
        }

        let config = config_from_value(merged, "effective")?;
        info!("config ready (layers={})", layers.len());
        Ok(LayeredConfig { config, layers })
    }

    /// Validate configuration invariants that cannot be expressed in serde.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let storage = &self.storage;
        for (field, value) in [
            ("storage.memory_dir", &storage.memory_dir),
            ("storage.config_dir", &storage.config_dir),
            ("storage.log_dir", &storage.log_dir),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{field} must not be empty")));
            }
        }

        for (field, model) in [("llm.smart", &self.llm.smart), ("llm.fast", &self.llm.fast)] {
            if model.name.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{field}.name must not be empty")));
            }
            if !(0.0..=2.0).contains(&model.temperature) {
                return Err(ConfigError::Invalid(format!(
                    "{field}.temperature must be between 0 and 2"
                )));
            }
        }

        let streaming = &self.streaming;
        if streaming.first_content_poll_ms == 0
            || streaming.edit_interval_ms == 0
            || streaming.generation_timeout_secs == 0
        {
            return Err(ConfigError::Invalid(
                "streaming intervals and timeout must be positive".to_string(),
            ));
        }

        if self.context.window == ContextWindow::Recent(0) {
            return Err(ConfigError::Invalid(
                "context.window recent count must be at least 1".to_string(),
            ));
        }

        if self.chat.reset_phrase.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "chat.reset_phrase must not be empty".to_string(),
            ));
        }

        let supervisor = &self.supervisor;
        if supervisor.check_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "supervisor.check_interval_secs must be positive".to_string(),
            ));
        }
        if supervisor.max_backoff_secs < supervisor.restart_backoff_secs {
            return Err(ConfigError::Invalid(
                "supervisor.max_backoff_secs must not be below restart_backoff_secs".to_string(),
            ));
        }

        Ok(())
    }
}

fn config_from_value(value: Value, label: &str) -> Result<ChorusConfig, ConfigError> {
    schema::validate_layer_schema(&value, label)?;
    let config: ChorusConfig = serde_json::from_value(value)?;
    config.validate()?;
    Ok(config)
}
