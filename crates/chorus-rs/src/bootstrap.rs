//! First-run handling: turn the manifest into the roster of bots to launch.

use chorus_rs_config::{BotManifest, ChorusConfig, ConfigError, ManifestStatus};
use chorus_rs_protocol::BotIdentity;
use log::{info, warn};
use std::path::{Path, PathBuf};

/// Printed when the manifest enables no bots.
pub const ENABLE_BOTS_NOTICE: &str =
    "Please enable the bots you want in the Configs/bots.json file and then run this program again.";

/// What `chorus run` should do after reading the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Roster {
    /// Launch these bots, in manifest order.
    Launch(Vec<BotIdentity>),
    /// Nothing is enabled; the operator has to edit the manifest.
    NeedsOperator { manifest_path: PathBuf, created: bool },
}

/// Read (or on first run, synthesize) the manifest under the configured
/// storage root.
pub fn load_roster(config: &ChorusConfig, cwd: &Path) -> Result<Roster, ConfigError> {
    let config_dir = config.storage.resolve(cwd).config_dir;
    match BotManifest::bootstrap(&config_dir)? {
        ManifestStatus::Ready(manifest) => {
            let bots = manifest.enabled();
            info!(
                "roster ready (bots={}, manifest={})",
                bots.len(),
                BotManifest::path(&config_dir).display()
            );
            Ok(Roster::Launch(bots))
        }
        ManifestStatus::NothingEnabled { path, created } => Ok(Roster::NeedsOperator {
            manifest_path: path,
            created,
        }),
    }
}

/// Identity for a single-bot command.
///
/// Bots missing from the manifest (or with no manifest at all) persist
/// their memory.
pub fn resolve_identity(config: &ChorusConfig, cwd: &Path, name: &str) -> BotIdentity {
    let config_dir = config.storage.resolve(cwd).config_dir;
    match BotManifest::load(&config_dir) {
        Ok(manifest) => match manifest.find(name) {
            Some(entry) => entry.identity(),
            None => {
                warn!("bot not listed in manifest, persisting memory (bot={name})");
                BotIdentity::new(name, true)
            }
        },
        Err(err) => {
            warn!("manifest unavailable, persisting memory (bot={name}, err={err})");
            BotIdentity::new(name, true)
        }
    }
}

/// Human-readable list of bot names for the startup banner.
pub fn roster_label(bots: &[BotIdentity]) -> String {
    bots.iter()
        .map(|bot| bot.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chorus_rs_config::StorageConfig;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn config_in(root: &Path) -> ChorusConfig {
        ChorusConfig::builder()
            .storage(StorageConfig::rooted_at(root))
            .build()
    }

    #[test]
    fn unknown_bots_default_to_persistent_memory() {
        let temp = tempdir().expect("tempdir");
        let config = config_in(temp.path());
        let config_dir = temp.path().join("Configs");
        fs::create_dir_all(&config_dir).expect("dir");
        fs::write(
            config_dir.join("bots.json"),
            r#"[{"name": "Eve", "enabled": true, "save_memory": false}]"#,
        )
        .expect("manifest");

        assert_eq!(
            resolve_identity(&config, temp.path(), "Eve"),
            BotIdentity::new("Eve", false)
        );
        assert_eq!(
            resolve_identity(&config, temp.path(), "Zed"),
            BotIdentity::new("Zed", true)
        );
    }

    #[test]
    fn roster_label_joins_names() {
        let bots = vec![BotIdentity::new("Ada", true), BotIdentity::new("Bob", false)];
        assert_eq!(roster_label(&bots), "Ada, Bob");
        assert_eq!(roster_label(&bots[..1]), "Ada");
    }
}
