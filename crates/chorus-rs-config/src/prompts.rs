//! Per-bot system prompt files (`<name>_config.txt`).

use crate::ConfigError;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the prompt every new bot starts from.
pub const DEFAULT_PROMPT_NAME: &str = "DEFAULT";
/// Text written to the default prompt when nothing exists yet.
pub const FALLBACK_SYSTEM_PROMPT: &str =
    "Assistant is a neutral and helpful AI who tries to answer users quickly.";
pub(crate) const PROMPT_SUFFIX: &str = "_config.txt";

/// Reads bot system prompts from the config directory.
///
/// Prompts are read fresh on every call so operators can edit them while
/// the bot runs.
#[derive(Debug, Clone)]
pub struct PromptStore {
    config_dir: PathBuf,
}

impl PromptStore {
    pub fn new(config_dir: impl AsRef<Path>) -> Self {
        Self {
            config_dir: config_dir.as_ref().to_path_buf(),
        }
    }

    /// Location of a bot's prompt file.
    pub fn prompt_path(&self, bot_name: &str) -> PathBuf {
        self.config_dir.join(format!("{bot_name}{PROMPT_SUFFIX}"))
    }

    /// Return the bot's system prompt, seeding it from the default prompt
    /// (and the default from the built-in fallback) when missing.
    pub fn system_prompt(&self, bot_name: &str) -> Result<String, ConfigError> {
        if !self.config_dir.exists() {
            info!("creating config directory {}", self.config_dir.display());
            fs::create_dir_all(&self.config_dir)?;
        }

        let path = self.prompt_path(bot_name);
        if !path.exists() {
            let default_path = self.prompt_path(DEFAULT_PROMPT_NAME);
            let seed = if default_path.exists() {
                fs::read_to_string(&default_path)?
            } else {
                info!("writing fallback prompt to {}", default_path.display());
                fs::write(&default_path, FALLBACK_SYSTEM_PROMPT)?;
                FALLBACK_SYSTEM_PROMPT.to_string()
            };
            if path != default_path {
                info!("seeding prompt for {bot_name} from {DEFAULT_PROMPT_NAME}");
                fs::write(&path, &seed)?;
            }
        }

        Ok(fs::read_to_string(&path)?)
    }
}
