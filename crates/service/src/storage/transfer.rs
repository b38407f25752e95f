//! Whole-store export and bulk import.
//!
//! Export produces the same JSON object shape that snapshots use. Import is
//! the caller-driven counterpart to snapshot restore and, unlike restore, can
//! replace the store's contents.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::errors::ServiceError;
use crate::storage::{Entry, KvStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Overwrite keys present in the input, keep everything else.
    Merge,
    /// Clear the store first.
    Replace,
}

impl ImportMode {
    pub fn from_replace_flag(replace: bool) -> Self {
        if replace { ImportMode::Replace } else { ImportMode::Merge }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImportMode::Merge => "merge",
            ImportMode::Replace => "replace",
        }
    }
}

pub fn entries_to_map(entries: Vec<Entry>) -> Map<String, Value> {
    entries.into_iter().map(|e| (e.key, e.value)).collect()
}

/// Every entry as one JSON object.
pub async fn export_all(store: &dyn KvStore) -> Result<Map<String, Value>, ServiceError> {
    Ok(entries_to_map(store.list_all().await?))
}

/// Write every pair of `data` into the store; returns the number written.
///
/// Keys are checked before anything is touched, so an invalid key leaves the
/// store unchanged even in replace mode.
pub async fn import_all(store: &dyn KvStore, data: Map<String, Value>, mode: ImportMode) -> Result<usize, ServiceError> {
    if data.keys().any(|k| k.is_empty()) {
        return Err(ServiceError::Validation("empty key in import data".into()));
    }
    if mode == ImportMode::Replace {
        store.clear().await?;
    }
    let mut count = 0usize;
    for (key, value) in data {
        store.set(&key, value).await?;
        count += 1;
    }
    info!(event = "import", count, mode = mode.as_str(), "imported entries");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryKvStore;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => unreachable!("test input must be an object"),
        }
    }

    #[tokio::test]
    async fn merge_keeps_unlisted_keys() -> Result<(), anyhow::Error> {
        let store = MemoryKvStore::with_entries([("a", json!(1)), ("b", json!(0))]);
        let n = import_all(&*store, obj(json!({"b": 2, "c": 3})), ImportMode::Merge).await?;
        assert_eq!(n, 2);
        assert_eq!(Value::Object(export_all(&*store).await?), json!({"a": 1, "b": 2, "c": 3}));
        Ok(())
    }

    #[tokio::test]
    async fn replace_drops_unlisted_keys() -> Result<(), anyhow::Error> {
        let store = MemoryKvStore::with_entries([("a", json!(1))]);
        let n = import_all(&*store, obj(json!({"b": 2})), ImportMode::Replace).await?;
        assert_eq!(n, 1);
        assert_eq!(Value::Object(export_all(&*store).await?), json!({"b": 2}));
        Ok(())
    }

    #[tokio::test]
    async fn empty_key_aborts_before_mutation() -> Result<(), anyhow::Error> {
        let store = MemoryKvStore::with_entries([("a", json!(1))]);
        let res = import_all(&*store, obj(json!({"": 1, "b": 2})), ImportMode::Replace).await;
        assert!(matches!(res, Err(ServiceError::Validation(_))));
        assert_eq!(Value::Object(export_all(&*store).await?), json!({"a": 1}));
        Ok(())
    }

    #[test]
    fn mode_from_flag() {
        assert_eq!(ImportMode::from_replace_flag(true).as_str(), "replace");
        assert_eq!(ImportMode::from_replace_flag(false).as_str(), "merge");
    }
}
