use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use models::{db::DatabaseConfig, kv_entry};
use sea_orm::{ConnectionTrait, DatabaseConnection};
use serde_json::Value;
use tracing::instrument;

use crate::errors::ServiceError;
use crate::storage::{validate_key, Entry, KvStore};

/// `KvStore` backed by a single SQLite file through SeaORM.
///
/// Concurrency control is left to the connection pool and SQLite itself;
/// with the default single-connection pool every statement is serialized.
#[derive(Clone)]
pub struct SqliteKvStore {
    db: DatabaseConnection,
    path: PathBuf,
}

impl SqliteKvStore {
    /// Open or create the store file, creating parent directories as needed.
    /// Any failure maps to `ServiceError::StorageUnavailable`.
    pub async fn open(cfg: &DatabaseConfig) -> Result<Arc<Self>, ServiceError> {
        let db = models::db::open(cfg).await.map_err(|e| match ServiceError::from(e) {
            unavailable @ ServiceError::StorageUnavailable(_) => unavailable,
            other => ServiceError::StorageUnavailable(other.to_string()),
        })?;
        Ok(Arc::new(Self { db, path: cfg.path.clone() }))
    }

    /// Open with default pool settings.
    pub async fn open_path<P: Into<PathBuf>>(path: P) -> Result<Arc<Self>, ServiceError> {
        Self::open(&DatabaseConfig::for_path(path)).await
    }

    /// Location of the backing database file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl KvStore for SqliteKvStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, ServiceError> {
        match kv_entry::find(&self.db, key).await? {
            Some(row) => Ok(Some(row.value()?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, value), level = "debug")]
    async fn set(&self, key: &str, value: Value) -> Result<(), ServiceError> {
        validate_key(key)?;
        kv_entry::upsert(&self.db, key, &value).await?;
        Ok(())
    }

    async fn has(&self, key: &str) -> Result<bool, ServiceError> {
        Ok(kv_entry::find(&self.db, key).await?.is_some())
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete(&self, key: &str) -> Result<bool, ServiceError> {
        Ok(kv_entry::remove(&self.db, key).await?)
    }

    #[instrument(skip(self), level = "debug")]
    async fn clear(&self) -> Result<(), ServiceError> {
        kv_entry::remove_all(&self.db).await?;
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Entry>, ServiceError> {
        kv_entry::all(&self.db)
            .await?
            .into_iter()
            .map(|row| -> Result<Entry, ServiceError> {
                let value = row.value()?;
                Ok(Entry { key: row.id, value })
            })
            .collect()
    }

    /// Fold the write-ahead log back into the main file so a byte copy of
    /// `path()` is current. A no-op in rollback-journal mode.
    async fn flush(&self) -> Result<(), ServiceError> {
        self.db
            .execute_unprepared("PRAGMA wal_checkpoint(TRUNCATE)")
            .await
            .map_err(|e| ServiceError::Db(e.to_string()))?;
        Ok(())
    }
}
