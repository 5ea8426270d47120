//! Durable JSONL snapshots of conversation memory.
//!
//! A snapshot is one header line followed by one `Message` per line. Writes
//! go to a temp file that is renamed over the previous snapshot, so readers
//! see either the old or the new file in full.

use crate::{ConversationMemory, MemoryError};
use chorus_rs_protocol::Message;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Version written to every snapshot header.
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotHeader {
    schema_version: u32,
    bot: String,
    saved_at: DateTime<Utc>,
}

/// Snapshot file for one bot.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
    bot_name: String,
    recover_corrupt: bool,
}

impl SnapshotStore {
    pub fn new(dir: impl AsRef<Path>, bot_name: impl Into<String>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            bot_name: bot_name.into(),
            recover_corrupt: false,
        }
    }

    /// Move unreadable snapshots aside instead of failing restore.
    pub fn with_recover_corrupt(mut self, recover_corrupt: bool) -> Self {
        self.recover_corrupt = recover_corrupt;
        self
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}_history.jsonl", self.bot_name))
    }

    fn temp_path(&self) -> PathBuf {
        self.dir.join(format!("{}_history.jsonl.tmp", self.bot_name))
    }

    /// Overwrite the snapshot with the full memory.
    pub fn save(&self, memory: &ConversationMemory) -> Result<(), MemoryError> {
        if !self.dir.exists() {
            info!("creating memory directory {}", self.dir.display());
            fs::create_dir_all(&self.dir)?;
        }
        let path = self.path();
        let temp_path = self.temp_path();
        {
            let mut file = OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(&temp_path)?;
            let header = SnapshotHeader {
                schema_version: SNAPSHOT_SCHEMA_VERSION,
                bot: self.bot_name.clone(),
                saved_at: Utc::now(),
            };
            writeln!(file, "{}", serde_json::to_string(&header)?)?;
            for message in memory.messages() {
                writeln!(file, "{}", serde_json::to_string(message)?)?;
            }
            file.sync_all()?;
        }
        fs::rename(temp_path, &path)?;
        debug!(
            "saved memory snapshot (bot={}, messages={})",
            self.bot_name,
            memory.len()
        );
        Ok(())
    }

    /// Read the snapshot back; `None` when none has been written.
    pub fn load(&self) -> Result<Option<ConversationMemory>, MemoryError> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let reader = BufReader::new(File::open(&path)?);
        let mut lines = reader.lines();

        let header_line = match lines.next() {
            Some(line) => self.check_line(line, 1)?,
            None => return Err(self.corrupt("empty snapshot")),
        };
        let header: SnapshotHeader = serde_json::from_str(&header_line)
            .map_err(|err| self.corrupt(format!("bad header: {err}")))?;
        if header.schema_version != SNAPSHOT_SCHEMA_VERSION {
            return Err(self.corrupt(format!(
                "unsupported schema version {}",
                header.schema_version
            )));
        }

        let mut messages = Vec::new();
        for (idx, line) in lines.enumerate() {
            let line = self.check_line(line, idx + 2)?;
            if line.trim().is_empty() {
                continue;
            }
            let message: Message = serde_json::from_str(&line)
                .map_err(|err| self.corrupt(format!("line {}: {err}", idx + 2)))?;
            messages.push(message);
        }
        if messages.is_empty() {
            return Err(self.corrupt("snapshot holds no messages"));
        }
        debug!(
            "loaded memory snapshot (bot={}, messages={})",
            self.bot_name,
            messages.len()
        );
        Ok(Some(ConversationMemory::from_messages(messages)))
    }

    /// Rename the snapshot to `<file>.corrupt-<unix>` and return the new path.
    pub fn quarantine(&self) -> Result<PathBuf, MemoryError> {
        let path = self.path();
        let target = PathBuf::from(format!(
            "{}.corrupt-{}",
            path.display(),
            Utc::now().timestamp()
        ));
        fs::rename(&path, &target)?;
        Ok(target)
    }

    /// Undecodable bytes mark the snapshot corrupt; other read errors stay IO.
    fn check_line(&self, line: io::Result<String>, number: usize) -> Result<String, MemoryError> {
        line.map_err(|err| match err.kind() {
            io::ErrorKind::InvalidData => self.corrupt(format!("line {number}: {err}")),
            _ => MemoryError::Io(err),
        })
    }

    fn corrupt(&self, reason: impl Into<String>) -> MemoryError {
        MemoryError::Corrupt {
            path: self.path(),
            reason: reason.into(),
        }
    }
}

impl ConversationMemory {
    /// Produce the memory a bot starts a session with.
    ///
    /// Without a store the memory is always fresh. With one, a fresh memory
    /// is written when no snapshot exists or `hard_reset` is set; otherwise
    /// the stored snapshot is returned verbatim.
    pub fn restore_or_init(
        store: Option<&SnapshotStore>,
        hard_reset: bool,
        stamp: &str,
    ) -> Result<Self, MemoryError> {
        let Some(store) = store else {
            return Ok(Self::seeded(stamp));
        };

        if !hard_reset {
            match store.load() {
                Ok(Some(memory)) => return Ok(memory),
                Ok(None) => {}
                Err(MemoryError::Corrupt { path, reason }) if store.recover_corrupt => {
                    let moved = store.quarantine()?;
                    warn!(
                        "moved corrupt memory snapshot aside (path={}, moved_to={}, reason={})",
                        path.display(),
                        moved.display(),
                        reason
                    );
                }
                Err(err) => return Err(err),
            }
        }

        let memory = Self::seeded(stamp);
        store.save(&memory)?;
        info!(
            "initialized memory (bot={}, hard_reset={})",
            store.bot_name, hard_reset
        );
        Ok(memory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chorus_rs_protocol::Role;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn sample_memory() -> ConversationMemory {
        let mut memory = ConversationMemory::seeded("01-02-2024 10:00 AM EST");
        memory.append(Message::user(
            "From Alice in channel general at 01-02-2024 10:01 AM: Hello",
            Some("Alice".to_string()),
            Some("01-02-2024 10:01 AM".to_string()),
        ));
        memory.append(Message::assistant("Hi there!"));
        memory
    }

    #[test]
    fn snapshot_then_restore_preserves_sequence() {
        let temp = TempDir::new().expect("tmp");
        let store = SnapshotStore::new(temp.path().join("LTM"), "Ada");
        let memory = sample_memory();
        store.save(&memory).expect("save");

        let restored =
            ConversationMemory::restore_or_init(Some(&store), false, "later").expect("restore");
        assert_eq!(restored, memory);
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn hard_reset_discards_previous_snapshot() {
        let temp = TempDir::new().expect("tmp");
        let store = SnapshotStore::new(temp.path(), "Ada");
        store.save(&sample_memory()).expect("save");

        let reset =
            ConversationMemory::restore_or_init(Some(&store), true, "reset-time").expect("reset");
        assert_eq!(reset.len(), 1);
        assert_eq!(reset.messages()[0].role, Role::System);

        let reloaded = store.load().expect("load").expect("snapshot");
        assert_eq!(reloaded, reset);
    }

    #[test]
    fn missing_snapshot_is_created_on_init() {
        let temp = TempDir::new().expect("tmp");
        let store = SnapshotStore::new(temp.path().join("LTM"), "Ada");

        let memory = ConversationMemory::restore_or_init(Some(&store), false, "now").expect("init");
        assert_eq!(memory.len(), 1);
        assert!(store.path().exists());
    }

    #[test]
    fn disabled_persistence_never_touches_disk() {
        let memory = ConversationMemory::restore_or_init(None, false, "now").expect("init");
        assert_eq!(memory, ConversationMemory::seeded("now"));
    }

    #[test]
    fn corrupt_snapshot_is_surfaced() {
        let temp = TempDir::new().expect("tmp");
        let store = SnapshotStore::new(temp.path(), "Ada");
        fs::write(store.path(), "not json\n").expect("write");

        let err = ConversationMemory::restore_or_init(Some(&store), false, "now").unwrap_err();
        assert!(matches!(err, MemoryError::Corrupt { .. }));
        assert!(store.path().exists());
    }

    #[test]
    fn corrupt_snapshot_can_be_moved_aside() {
        let temp = TempDir::new().expect("tmp");
        let store = SnapshotStore::new(temp.path(), "Ada").with_recover_corrupt(true);
        fs::write(store.path(), "{\"schema_version\":99}\n").expect("write");

        let memory = ConversationMemory::restore_or_init(Some(&store), false, "now").expect("init");
        assert_eq!(memory.len(), 1);

        let moved: Vec<_> = fs::read_dir(temp.path())
            .expect("read dir")
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .filter(|name| name.starts_with("Ada_history.jsonl.corrupt-"))
            .collect();
        assert_eq!(moved.len(), 1);
    }

    #[test]
    fn undecodable_snapshot_is_corrupt_and_recoverable() {
        let temp = TempDir::new().expect("tmp");
        let store = SnapshotStore::new(temp.path(), "Ada");
        fs::write(store.path(), b"\xff\xfe garbage\n").expect("write");

        let err = store.load().unwrap_err();
        assert!(matches!(err, MemoryError::Corrupt { .. }), "{err}");

        let store = store.with_recover_corrupt(true);
        let memory = ConversationMemory::restore_or_init(Some(&store), false, "now").expect("init");
        assert_eq!(memory, ConversationMemory::seeded("now"));
        let moved = fs::read_dir(temp.path())
            .expect("read dir")
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_string_lossy()
                    .starts_with("Ada_history.jsonl.corrupt-")
            })
            .count();
        assert_eq!(moved, 1);
    }

    #[test]
    fn snapshot_starts_with_versioned_header() {
        let temp = TempDir::new().expect("tmp");
        let store = SnapshotStore::new(temp.path(), "Ada");
        store.save(&sample_memory()).expect("save");

        let contents = fs::read_to_string(store.path()).expect("read");
        let header: serde_json::Value =
            serde_json::from_str(contents.lines().next().expect("header")).expect("json");
        assert_eq!(header["schema_version"], SNAPSHOT_SCHEMA_VERSION);
        assert_eq!(header["bot"], "Ada");
        assert_eq!(contents.lines().count(), 4);
    }
}
