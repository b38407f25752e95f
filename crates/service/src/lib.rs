//! Service layer: the key-value store abstraction, its SQLite and in-memory
//! backends, JSON snapshots and the persistence coordinator that ties them
//! together for the lifetime of the process.

pub mod errors;
pub mod observability;
pub mod persistence;
pub mod runtime;
pub mod snapshot;
pub mod storage;
#[cfg(test)]
pub mod test_support;

pub use errors::ServiceError;
pub use persistence::{init, Persistence, PersistenceConfig};
pub use snapshot::{SnapshotError, SnapshotEvent, SnapshotManager};
pub use storage::{KvStore, MemoryKvStore, SqliteKvStore};
