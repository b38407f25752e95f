//! Runtime environment helpers
//!
//! Thin wrapper around `common::env` so binary crates can call
//! `service::runtime::ensure_env` without depending directly on `common`.

use std::path::Path;

/// Make sure the directories holding the store file and the snapshot exist.
pub async fn ensure_env(db_path: &Path, snapshot_path: &Path) -> anyhow::Result<()> {
    common::env::ensure_parent_dirs(&[db_path, snapshot_path]).await
}
