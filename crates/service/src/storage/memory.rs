use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::errors::ServiceError;
use crate::storage::{validate_key, Entry, KvStore};

/// Process-local `KvStore` over a `HashMap`.
///
/// Nothing is written to disk; contents vanish with the process.
#[derive(Clone, Default)]
pub struct MemoryKvStore {
    inner: Arc<RwLock<HashMap<String, Value>>>,
}

impl MemoryKvStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seed a store from `(key, value)` pairs.
    pub fn with_entries<I, K>(entries: I) -> Arc<Self>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let map = entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Arc::new(Self { inner: Arc::new(RwLock::new(map)) })
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, ServiceError> {
        let map = self.inner.read().await;
        Ok(map.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), ServiceError> {
        validate_key(key)?;
        let mut map = self.inner.write().await;
        map.insert(key.to_string(), value);
        Ok(())
    }

    async fn has(&self, key: &str) -> Result<bool, ServiceError> {
        let map = self.inner.read().await;
        Ok(map.contains_key(key))
    }

    async fn delete(&self, key: &str) -> Result<bool, ServiceError> {
        let mut map = self.inner.write().await;
        Ok(map.remove(key).is_some())
    }

    async fn clear(&self) -> Result<(), ServiceError> {
        self.inner.write().await.clear();
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Entry>, ServiceError> {
        let map = self.inner.read().await;
        Ok(map.iter().map(|(k, v)| Entry::new(k.clone(), v.clone())).collect())
    }
}
