use std::path::PathBuf;
use std::time::Duration;

use migration::MigratorTrait;
use sea_orm::sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sea_orm::sqlx::ConnectOptions as _;
use sea_orm::{DatabaseConnection, SqlxSqliteConnector};
use tracing::{debug, info};

use crate::errors::ModelError;

/// Connection settings for the embedded SQLite file.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub sqlx_logging: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::from_storage(&configs::StorageConfig::default())
    }
}

impl DatabaseConfig {
    pub fn from_storage(cfg: &configs::StorageConfig) -> Self {
        Self {
            path: cfg.path.clone(),
            max_connections: cfg.max_connections,
            min_connections: 1,
            connect_timeout: cfg.connect_timeout(),
            sqlx_logging: cfg.sqlx_logging,
        }
    }

    /// Config for `path` with every other setting at its default.
    pub fn for_path<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into(), ..Self::default() }
    }

    /// Driver options naming `path` verbatim. A URL would be percent-decoded
    /// and split on `?` and `#`, so the file could land somewhere else.
    pub fn sqlite_options(&self) -> SqliteConnectOptions {
        let opts = SqliteConnectOptions::new().filename(&self.path).create_if_missing(true);
        if self.sqlx_logging { opts } else { opts.disable_statement_logging() }
    }
}

/// Connect without touching the schema.
pub async fn connect_with_config(cfg: &DatabaseConfig) -> Result<DatabaseConnection, ModelError> {
    let pool = SqlitePoolOptions::new()
        .max_connections(cfg.max_connections)
        .min_connections(cfg.min_connections.min(cfg.max_connections))
        .acquire_timeout(cfg.connect_timeout)
        .connect_with(cfg.sqlite_options())
        .await
        .map_err(|e| ModelError::Unavailable(format!("{}: {e}", cfg.path.display())))?;
    Ok(SqlxSqliteConnector::from_sqlx_sqlite_pool(pool))
}

/// Open (or create) the store file, creating parent directories and applying
/// pending migrations.
pub async fn open(cfg: &DatabaseConfig) -> Result<DatabaseConnection, ModelError> {
    if let Some(parent) = cfg.path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ModelError::Unavailable(format!("cannot create {}: {e}", parent.display())))?;
    }

    let db = connect_with_config(cfg).await?;
    migration::Migrator::up(&db, None)
        .await
        .map_err(|e| ModelError::Unavailable(format!("migration failed on {}: {e}", cfg.path.display())))?;

    debug!(max_connections = cfg.max_connections, "sqlite pool ready");
    info!(path = %cfg.path.display(), "database opened");
    Ok(db)
}
