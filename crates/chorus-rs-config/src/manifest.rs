//! The bot manifest (`bots.json`): which bots exist, which run, and which
//! persist their memory.

use crate::ConfigError;
use crate::prompts::{DEFAULT_PROMPT_NAME, PROMPT_SUFFIX};
use chorus_rs_protocol::BotIdentity;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Manifest filename inside the config directory.
pub const MANIFEST_FILE: &str = "bots.json";

/// One bot listed in the manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestEntry {
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_save_memory")]
    pub save_memory: bool,
}

fn default_save_memory() -> bool {
    true
}

impl ManifestEntry {
    /// Identity handed to the bot runtime.
    pub fn identity(&self) -> BotIdentity {
        BotIdentity::new(self.name.clone(), self.save_memory)
    }
}

/// Parsed `bots.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct BotManifest {
    pub entries: Vec<ManifestEntry>,
}

/// Outcome of [`BotManifest::bootstrap`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestStatus {
    /// At least one bot is enabled.
    Ready(BotManifest),
    /// The manifest exists but enables nothing; the operator must edit it.
    NothingEnabled { path: PathBuf, created: bool },
}

impl BotManifest {
    /// Path of the manifest under `config_dir`.
    pub fn path(config_dir: &Path) -> PathBuf {
        config_dir.join(MANIFEST_FILE)
    }

    /// Read an existing manifest.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let path = Self::path(config_dir);
        if !path.exists() {
            return Err(ConfigError::MissingManifest(path.display().to_string()));
        }
        let contents = fs::read_to_string(&path)?;
        let manifest: BotManifest = serde_json::from_str(&contents)?;
        debug!(
            "loaded bot manifest (path={}, bots={})",
            path.display(),
            manifest.entries.len()
        );
        Ok(manifest)
    }

    /// Write the manifest as pretty JSON.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        fs::create_dir_all(config_dir)?;
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(Self::path(config_dir), contents)?;
        Ok(())
    }

    /// Guess a first-run manifest from the prompt files already present.
    ///
    /// Every `<name>_config.txt` other than the default one yields a
    /// disabled entry. With none found, the default bot is enabled.
    pub fn synthesize(config_dir: &Path) -> Result<Self, ConfigError> {
        let mut names = BTreeSet::new();
        if config_dir.exists() {
            for entry in fs::read_dir(config_dir)? {
                let file_name = entry?.file_name().to_string_lossy().to_string();
                if !file_name.ends_with(".txt") || file_name == default_prompt_file() {
                    continue;
                }
                if let Some(name) = file_name.split('_').next() {
                    if !name.is_empty() && !name.ends_with(".txt") {
                        names.insert(name.to_string());
                    }
                }
            }
        }

        let entries = if names.is_empty() {
            vec![ManifestEntry {
                name: DEFAULT_PROMPT_NAME.to_string(),
                enabled: true,
                save_memory: true,
            }]
        } else {
            names
                .into_iter()
                .map(|name| ManifestEntry {
                    name,
                    enabled: false,
                    save_memory: true,
                })
                .collect()
        };
        Ok(Self { entries })
    }

    /// Load the manifest, creating it on first run.
    pub fn bootstrap(config_dir: &Path) -> Result<ManifestStatus, ConfigError> {
        let path = Self::path(config_dir);
        let created = !path.exists();
        let manifest = if created {
            let manifest = Self::synthesize(config_dir)?;
            manifest.save(config_dir)?;
            info!(
                "created bot manifest (path={}, bots={})",
                path.display(),
                manifest.entries.len()
            );
            manifest
        } else {
            Self::load(config_dir)?
        };

        if manifest.entries.iter().any(|entry| entry.enabled) {
            Ok(ManifestStatus::Ready(manifest))
        } else {
            Ok(ManifestStatus::NothingEnabled { path, created })
        }
    }

    /// Identities of the enabled bots, in manifest order.
    pub fn enabled(&self) -> Vec<BotIdentity> {
        self.entries
            .iter()
            .filter(|entry| entry.enabled)
            .map(ManifestEntry::identity)
            .collect()
    }

    /// Look up an entry by bot name.
    pub fn find(&self, name: &str) -> Option<&ManifestEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }
}

fn default_prompt_file() -> String {
    format!("{DEFAULT_PROMPT_NAME}{PROMPT_SUFFIX}")
}
