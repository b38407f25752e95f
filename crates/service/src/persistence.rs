//! Process-lifetime persistence: open the store, restore it from the snapshot
//! when the store file is new, then keep snapshotting on a fixed period.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use models::db::DatabaseConfig;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::errors::ServiceError;
use crate::snapshot::SnapshotManager;
use crate::storage::{KvStore, SqliteKvStore};

#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    pub store: DatabaseConfig,
    pub snapshot_path: PathBuf,
    pub backup_interval: Duration,
}

impl PersistenceConfig {
    pub fn new<S: Into<PathBuf>, B: Into<PathBuf>>(store_path: S, snapshot_path: B, backup_interval: Duration) -> Self {
        Self { store: DatabaseConfig::for_path(store_path), snapshot_path: snapshot_path.into(), backup_interval }
    }

    pub fn from_app(cfg: &configs::AppConfig) -> Self {
        Self {
            store: DatabaseConfig::from_storage(&cfg.storage),
            snapshot_path: cfg.backup.path.clone(),
            backup_interval: cfg.backup_interval(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Uninitialized,
    Ready,
    Restoring,
    Failed,
}

/// What the startup restore step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// The store file already existed.
    NotNeeded,
    /// The store file was new but there was no snapshot to load.
    NoSnapshot,
    Restored(usize),
    /// Restore was attempted and failed; the store is usable but may be partial.
    Failed(String),
}

/// Restore only into a freshly created store, and only when there is
/// something to restore from.
pub fn needs_restore(store_existed: bool, snapshot_exists: bool) -> bool {
    !store_existed && snapshot_exists
}

pub struct PersistenceCoordinator {
    cfg: PersistenceConfig,
    state: CoordinatorState,
}

impl PersistenceCoordinator {
    pub fn new(cfg: PersistenceConfig) -> Self {
        Self { cfg, state: CoordinatorState::Uninitialized }
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    /// Open the store, restore if needed and arm the backup timer.
    ///
    /// A zero backup interval is rejected before anything is opened. Beyond
    /// that, only a store that cannot be opened is an error. Restore failures are
    /// reported through the snapshot manager and recorded in the outcome.
    pub async fn start(&mut self) -> Result<Persistence, ServiceError> {
        if self.state != CoordinatorState::Uninitialized {
            return Err(ServiceError::Validation("persistence already started".into()));
        }
        if self.cfg.backup_interval.is_zero() {
            return Err(ServiceError::Validation("backup interval must be greater than zero".into()));
        }

        // must be sampled before open, which creates the file
        let store_existed = tokio::fs::metadata(&self.cfg.store.path).await.is_ok();

        let store = match SqliteKvStore::open(&self.cfg.store).await {
            Ok(store) => store,
            Err(e) => {
                self.state = CoordinatorState::Failed;
                error!(event = "store_open_failed", path = %self.cfg.store.path.display(), error = %e, "cannot open store");
                return Err(e);
            }
        };
        self.state = CoordinatorState::Ready;

        let snapshots = Arc::new(SnapshotManager::new(self.cfg.snapshot_path.clone()));
        let restore = if store_existed {
            debug!(path = %self.cfg.store.path.display(), "store file present; skipping restore");
            RestoreOutcome::NotNeeded
        } else if !needs_restore(store_existed, snapshots.exists().await) {
            info!(path = %snapshots.path().display(), "new store and no snapshot; starting empty");
            RestoreOutcome::NoSnapshot
        } else {
            self.state = CoordinatorState::Restoring;
            let outcome = match snapshots.restore(&*store).await {
                Ok(n) => RestoreOutcome::Restored(n),
                Err(e) => RestoreOutcome::Failed(e.to_string()),
            };
            self.state = CoordinatorState::Ready;
            outcome
        };

        let kv: Arc<dyn KvStore> = store.clone();
        let backup_task = spawn_backup_schedule(kv, snapshots.clone(), self.cfg.backup_interval);
        info!(
            store = %self.cfg.store.path.display(),
            snapshot = %snapshots.path().display(),
            interval_secs = self.cfg.backup_interval.as_secs_f64(),
            "persistence ready"
        );

        Ok(Persistence { store, snapshots, restore, state: self.state, backup_task: Some(backup_task) })
    }
}

/// Shorthand for `PersistenceCoordinator::new(cfg).start()`.
pub async fn init(cfg: PersistenceConfig) -> Result<Persistence, ServiceError> {
    PersistenceCoordinator::new(cfg).start().await
}

/// Back up `store` every `period`, starting one period from now.
///
/// Each tick runs in its own task so a slow write never delays the timer;
/// the manager's guard turns overlapping ticks into skips.
pub fn spawn_backup_schedule(store: Arc<dyn KvStore>, snapshots: Arc<SnapshotManager>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let store = store.clone();
            let snapshots = snapshots.clone();
            tokio::spawn(async move {
                // outcome already logged, counted and published
                let _ = snapshots.backup(&*store).await;
            });
        }
    })
}

/// Handle to the running persistence layer. Dropping it stops the timer.
pub struct Persistence {
    store: Arc<SqliteKvStore>,
    snapshots: Arc<SnapshotManager>,
    restore: RestoreOutcome,
    state: CoordinatorState,
    backup_task: Option<JoinHandle<()>>,
}

impl Persistence {
    pub fn store(&self) -> Arc<SqliteKvStore> {
        self.store.clone()
    }

    pub fn kv(&self) -> Arc<dyn KvStore> {
        self.store.clone()
    }

    pub fn snapshots(&self) -> Arc<SnapshotManager> {
        self.snapshots.clone()
    }

    pub fn restore_outcome(&self) -> &RestoreOutcome {
        &self.restore
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    pub fn backups_scheduled(&self) -> bool {
        self.backup_task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the backup timer. A backup already in flight is not interrupted.
    pub fn shutdown(&mut self) {
        if let Some(task) = self.backup_task.take() {
            task.abort();
            debug!("backup schedule stopped");
        }
    }
}

impl Drop for Persistence {
    fn drop(&mut self) {
        self.shutdown();
    }
}
