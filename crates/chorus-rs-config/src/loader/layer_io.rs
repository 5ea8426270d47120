//! Locating and reading config layers.

use super::{ConfigLayer, ConfigLayerSource, DEFAULT_CONFIG_DIR, DEFAULT_CONFIG_FILE, schema};
use crate::ConfigError;
use directories::UserDirs;
use log::debug;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// A layer the loader will try, in precedence order.
pub(super) struct LayerCandidate {
    pub(super) source: ConfigLayerSource,
    pub(super) path: PathBuf,
}

impl LayerCandidate {
    /// Runtime layers were asked for explicitly and must exist.
    fn required(&self) -> bool {
        self.source == ConfigLayerSource::Runtime
    }

    /// Identity used to skip a file reached through two layers.
    pub(super) fn key(&self) -> PathBuf {
        fs::canonicalize(&self.path).unwrap_or_else(|_| self.path.clone())
    }

    /// Read and schema-check the layer. Absent optional layers yield `None`.
    pub(super) fn read(&self) -> Result<Option<(ConfigLayer, Value)>, ConfigError> {
        if !self.required() && !self.path.is_file() {
            debug!("config layer absent (layer={})", self.label());
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)?;
        let value: Value = json5::from_str(&contents)?;
        schema::validate_layer_schema(&value, &self.label())?;
        debug!("config layer read (layer={})", self.label());
        let meta = ConfigLayer {
            source: self.source,
            path: Some(self.path.clone()),
        };
        Ok(Some((meta, value)))
    }

    fn label(&self) -> String {
        format!("{}({})", self.source, self.path.display())
    }
}

/// `~/.chorus/chorus.json5`, when a home directory is known.
pub(super) fn default_user_config_path() -> Option<PathBuf> {
    let dirs = UserDirs::new()?;
    Some(home_config_path(dirs.home_dir()))
}

fn home_config_path(home: &Path) -> PathBuf {
    home.join(DEFAULT_CONFIG_DIR).join(DEFAULT_CONFIG_FILE)
}
