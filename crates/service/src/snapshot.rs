//! JSON snapshot backup and restore.
//!
//! A snapshot is a single UTF-8 JSON object mapping every key to its raw
//! value, with no envelope. Backup replaces the file wholesale; restore merges
//! the file into the store without deleting anything.
//!
//! Neither operation is meant to take the process down. Each outcome is logged,
//! counted in the Prometheus registry and published as a [`SnapshotEvent`] to
//! any [`SnapshotManager::subscribe`]r before the result is handed back.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::errors::ServiceError;
use crate::observability::{
    BACKUPS_SKIPPED_TOTAL, BACKUPS_TOTAL, BACKUP_DURATION, BACKUP_FAILURES_TOTAL, RESTORED_KEYS_TOTAL,
    RESTORE_FAILURES_TOTAL,
};
use crate::storage::{transfer, KvStore};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot file {} does not exist", .path.display())]
    Missing { path: PathBuf },
    #[error("snapshot file {} is corrupt: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },
    #[error("I/O error on {}: {source}", .path.display())]
    Io { path: PathBuf, source: std::io::Error },
    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("store error: {0}")]
    Store(#[from] ServiceError),
    #[error("a backup is already in progress")]
    InProgress,
}

/// Outcome notifications published on the manager's report channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotEvent {
    BackupCompleted { entries: usize, bytes: usize },
    BackupFailed { error: String },
    BackupSkipped,
    RestoreCompleted { restored: usize },
    /// `restored` counts keys written before the failure.
    RestoreFailed { restored: usize, error: String },
}

/// Backs up a store into, and restores it from, one JSON file.
pub struct SnapshotManager {
    path: PathBuf,
    backup_running: AtomicBool,
    events: broadcast::Sender<SnapshotEvent>,
}

/// Clears the running flag when the backup finishes, however it finishes.
struct BackupGuard<'a>(&'a AtomicBool);

impl<'a> BackupGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BackupGuard(flag))
    }
}

impl Drop for BackupGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SnapshotManager {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { path: path.into(), backup_running: AtomicBool::new(false), events }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> bool {
        tokio::fs::metadata(&self.path).await.is_ok()
    }

    /// Whether a backup is currently being written.
    pub fn backup_in_progress(&self) -> bool {
        self.backup_running.load(Ordering::Acquire)
    }

    /// Receive every subsequent outcome. Slow receivers may observe `Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<SnapshotEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: SnapshotEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    /// Write the whole store to the snapshot file.
    ///
    /// Returns the number of entries written. A call made while another backup
    /// is still running does nothing and yields `SnapshotError::InProgress`.
    pub async fn backup(&self, store: &dyn KvStore) -> Result<usize, SnapshotError> {
        let Some(_guard) = BackupGuard::acquire(&self.backup_running) else {
            BACKUPS_SKIPPED_TOTAL.inc();
            warn!(event = "backup_skipped", path = %self.path.display(), "previous backup still running; skipping");
            self.publish(SnapshotEvent::BackupSkipped);
            return Err(SnapshotError::InProgress);
        };

        let timer = BACKUP_DURATION.start_timer();
        let res = self.write_snapshot(store).await;
        timer.observe_duration();

        match &res {
            Ok((entries, bytes)) => {
                BACKUPS_TOTAL.inc();
                info!(event = "backup_completed", path = %self.path.display(), entries, bytes, "backup created");
                self.publish(SnapshotEvent::BackupCompleted { entries: *entries, bytes: *bytes });
            }
            Err(e) => {
                BACKUP_FAILURES_TOTAL.inc();
                error!(event = "backup_failed", path = %self.path.display(), error = %e, "backup failed");
                self.publish(SnapshotEvent::BackupFailed { error: e.to_string() });
            }
        }
        res.map(|(entries, _)| entries)
    }

    async fn write_snapshot(&self, store: &dyn KvStore) -> Result<(usize, usize), SnapshotError> {
        let entries = store.list_all().await?;
        let count = entries.len();
        let data = serde_json::to_vec_pretty(&transfer::entries_to_map(entries)).map_err(SnapshotError::Serialize)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| SnapshotError::Io { path: parent.to_path_buf(), source })?;
        }

        // readers never see a half-written snapshot; the guard keeps the temp name unique
        let tmp = self.temp_path();
        if let Err(source) = tokio::fs::write(&tmp, &data).await {
            return Err(SnapshotError::Io { path: tmp, source });
        }
        if let Err(source) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(SnapshotError::Io { path: self.path.clone(), source });
        }
        Ok((count, data.len()))
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Merge the snapshot file into `store`; returns the number of keys written.
    ///
    /// Keys absent from the snapshot are left untouched.
    pub async fn restore(&self, store: &dyn KvStore) -> Result<usize, SnapshotError> {
        let mut restored = 0usize;
        let res = self.merge_into(store, &mut restored).await;
        RESTORED_KEYS_TOTAL.inc_by(restored as u64);
        match res {
            Ok(()) => {
                info!(event = "restore_completed", path = %self.path.display(), restored, "restored from snapshot");
                self.publish(SnapshotEvent::RestoreCompleted { restored });
                Ok(restored)
            }
            Err(e) => {
                RESTORE_FAILURES_TOTAL.inc();
                error!(event = "restore_failed", path = %self.path.display(), restored, error = %e, "restore failed");
                self.publish(SnapshotEvent::RestoreFailed { restored, error: e.to_string() });
                Err(e)
            }
        }
    }

    /// Writes keys one by one; `restored` stays accurate if a write fails midway.
    async fn merge_into(&self, store: &dyn KvStore, restored: &mut usize) -> Result<(), SnapshotError> {
        let data = self.read().await?;
        for (key, value) in data {
            store.set(&key, value).await?;
            *restored += 1;
        }
        Ok(())
    }

    /// Read and validate the snapshot file without touching any store.
    pub async fn read(&self) -> Result<Map<String, Value>, SnapshotError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SnapshotError::Missing { path: self.path.clone() });
            }
            Err(source) => return Err(SnapshotError::Io { path: self.path.clone(), source }),
        };

        let corrupt = |reason: String| SnapshotError::Corrupt { path: self.path.clone(), reason };
        let data = match serde_json::from_slice::<Value>(&raw) {
            Ok(Value::Object(data)) => data,
            Ok(other) => return Err(corrupt(format!("expected a JSON object, found {}", json_kind(&other)))),
            Err(e) => return Err(corrupt(e.to_string())),
        };
        if data.contains_key("") {
            return Err(corrupt("empty key".into()));
        }
        Ok(data)
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
