use chorus_rs::bootstrap::{Roster, load_roster};
use chorus_rs_config::{BotManifest, ChorusConfig, ManifestEntry, StorageConfig};
use chorus_rs_protocol::BotIdentity;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn config_in(root: &Path) -> ChorusConfig {
    ChorusConfig::builder()
        .storage(StorageConfig::rooted_at(root))
        .build()
}

fn entry(name: &str, enabled: bool) -> ManifestEntry {
    ManifestEntry {
        name: name.to_string(),
        enabled,
        save_memory: true,
    }
}

#[test]
fn first_run_lists_existing_prompts_and_asks_operator() {
    let temp = tempdir().expect("tempdir");
    let config = config_in(temp.path());
    let config_dir = temp.path().join("Configs");
    fs::create_dir_all(&config_dir).expect("config dir");
    fs::write(config_dir.join("Alpha_config.txt"), "You are Alpha.").expect("alpha");
    fs::write(config_dir.join("Beta_config.txt"), "You are Beta.").expect("beta");

    let roster = load_roster(&config, temp.path()).expect("roster");
    assert_eq!(
        roster,
        Roster::NeedsOperator {
            manifest_path: config_dir.join("bots.json"),
            created: true,
        }
    );
    let manifest = BotManifest::load(&config_dir).expect("manifest");
    assert_eq!(manifest.entries, vec![entry("Alpha", false), entry("Beta", false)]);

    // Still nothing enabled on the second run, but the file is kept.
    let again = load_roster(&config, temp.path()).expect("roster");
    assert!(matches!(again, Roster::NeedsOperator { created: false, .. }));
}

#[test]
fn enabled_bots_are_launched_in_manifest_order() {
    let temp = tempdir().expect("tempdir");
    let config = config_in(temp.path());
    let config_dir = temp.path().join("Configs");
    BotManifest {
        entries: vec![
            entry("Beta", true),
            entry("Alpha", false),
            ManifestEntry {
                name: "Gamma".to_string(),
                enabled: true,
                save_memory: false,
            },
        ],
    }
    .save(&config_dir)
    .expect("save");

    let roster = load_roster(&config, temp.path()).expect("roster");
    assert_eq!(
        roster,
        Roster::Launch(vec![
            BotIdentity::new("Beta", true),
            BotIdentity::new("Gamma", false),
        ])
    );
}

#[test]
fn empty_config_dir_enables_default_bot() {
    let temp = tempdir().expect("tempdir");
    let roster = load_roster(&config_in(temp.path()), temp.path()).expect("roster");
    assert_eq!(roster, Roster::Launch(vec![BotIdentity::new("DEFAULT", true)]));
}
