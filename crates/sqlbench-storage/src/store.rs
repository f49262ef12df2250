//! The persistent store contract

use async_trait::async_trait;

use crate::error::StorageResult;
use crate::table::{StoreOp, StoreTable};

/// Asynchronous, transactional key/value store with one table per entity kind.
///
/// Values are JSON documents keyed by the entity id string.
#[async_trait]
pub trait PersistentStore: Send + Sync {
    /// Insert or replace `value` under `key`
    async fn put(&self, table: StoreTable, key: &str, value: &serde_json::Value) -> StorageResult<()>;

    /// Remove `key`; removing a missing key is not an error
    async fn delete(&self, table: StoreTable, key: &str) -> StorageResult<()>;

    /// Apply all operations atomically, in order
    async fn transaction(&self, ops: &[StoreOp]) -> StorageResult<()>;

    /// Every record of a table
    async fn load_all(&self, table: StoreTable) -> StorageResult<Vec<(String, serde_json::Value)>>;

    /// Apply a single operation
    async fn apply(&self, op: &StoreOp) -> StorageResult<()> {
        match op {
            StoreOp::Put { table, key, value } => self.put(*table, key, value).await,
            StoreOp::Delete { table, key } => self.delete(*table, key).await,
        }
    }
}
