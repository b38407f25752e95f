//! Key-value storage abstractions for the service layer.
//!
//! `KvStore` is the seam every caller goes through: the HTTP routes, the
//! snapshot manager and the backup schedule all hold an `Arc<dyn KvStore>`.
//! `SqliteKvStore` is the durable implementation; `MemoryKvStore` keeps the
//! same contract in a `HashMap` for tests and throwaway setups.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ServiceError;

pub mod memory;
pub mod sqlite;
pub mod transfer;

pub use memory::MemoryKvStore;
pub use sqlite::SqliteKvStore;

/// A stored key and its JSON value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub key: String,
    pub value: Value,
}

impl Entry {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self { key: key.into(), value }
    }
}

/// Durable mapping from non-empty string keys to JSON values.
///
/// Every mutation is persisted before the call returns. Absence is a normal
/// result (`None` / `false`), never an error. Implementations serialize
/// concurrent access internally; callers add no locking of their own.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, ServiceError>;
    /// Insert or overwrite.
    async fn set(&self, key: &str, value: Value) -> Result<(), ServiceError>;
    async fn has(&self, key: &str) -> Result<bool, ServiceError>;
    /// Returns whether the key existed. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<bool, ServiceError>;
    async fn clear(&self) -> Result<(), ServiceError>;
    /// Eager full scan, unordered. Expensive on large stores.
    async fn list_all(&self) -> Result<Vec<Entry>, ServiceError>;

    /// Make every committed write visible in the backing file, if there is one.
    async fn flush(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}

pub(crate) fn validate_key(key: &str) -> Result<(), ServiceError> {
    if key.is_empty() {
        return Err(ServiceError::Validation("key required".into()));
    }
    Ok(())
}
