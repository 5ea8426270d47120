//! Per-bot append-only audit log (`Logs/<name>_log.txt`).

use crate::TimeSource;
use log::{info, warn};
use parking_lot::Mutex;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Human-readable record of what a bot did.
///
/// Every entry is also mirrored to the process log. Failures to write the
/// file are logged and otherwise ignored; an audit problem never fails a
/// turn.
#[derive(Debug)]
pub struct AuditLog {
    bot_name: String,
    dir: PathBuf,
    time: TimeSource,
    write_lock: Mutex<()>,
}

impl AuditLog {
    pub fn new(dir: impl AsRef<Path>, bot_name: impl Into<String>, time: TimeSource) -> Self {
        Self {
            bot_name: bot_name.into(),
            dir: dir.as_ref().to_path_buf(),
            time,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}_log.txt", self.bot_name))
    }

    /// Append `<stamp> - <event>`.
    pub fn record(&self, event: &str) {
        info!("[{}] {}", self.bot_name, event);
        if let Err(err) = self.append(event) {
            warn!(
                "failed to write audit log (bot={}, path={}, err={})",
                self.bot_name,
                self.path().display(),
                err
            );
        }
    }

    fn append(&self, event: &str) -> std::io::Result<()> {
        let _guard = self.write_lock.lock();
        fs::create_dir_all(&self.dir)?;
        let path = self.path();
        let is_new = !path.exists();
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        if is_new {
            writeln!(file, "Log file created at {}.", self.time.labeled())?;
        }
        writeln!(file, "{} - {}", self.time.stamp(), event)?;
        Ok(())
    }
}
