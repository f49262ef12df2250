//! In-memory store
//!
//! Used for ephemeral sessions and tests. Writes can be made to fail on demand
//! to exercise the best-effort persistence paths.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::error::{StorageError, StorageResult};
use crate::store::PersistentStore;
use crate::table::{StoreOp, StoreTable};

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<StoreTable, BTreeMap<String, serde_json::Value>>>,
    /// Every operation that reached the store, in arrival order
    log: Mutex<Vec<StoreOp>>,
    transactions: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail (or succeed again)
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn get(&self, table: StoreTable, key: &str) -> Option<serde_json::Value> {
        self.tables
            .lock()
            .get(&table)
            .and_then(|rows| rows.get(key).cloned())
    }

    pub fn keys(&self, table: StoreTable) -> Vec<String> {
        self.tables
            .lock()
            .get(&table)
            .map(|rows| rows.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, table: StoreTable) -> usize {
        self.tables.lock().get(&table).map_or(0, |rows| rows.len())
    }

    pub fn operations(&self) -> Vec<StoreOp> {
        self.log.lock().clone()
    }

    pub fn operation_count(&self) -> usize {
        self.log.lock().len()
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.load(Ordering::SeqCst)
    }

    fn check_writable(&self) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(StorageError::Unavailable("writes disabled".into()))
        } else {
            Ok(())
        }
    }

    fn apply_locked(
        tables: &mut HashMap<StoreTable, BTreeMap<String, serde_json::Value>>,
        op: &StoreOp,
    ) {
        match op {
            StoreOp::Put { table, key, value } => {
                tables
                    .entry(*table)
                    .or_default()
                    .insert(key.clone(), value.clone());
            }
            StoreOp::Delete { table, key } => {
                if let Some(rows) = tables.get_mut(table) {
                    rows.remove(key);
                }
            }
        }
    }
}

#[async_trait]
impl PersistentStore for MemoryStore {
    async fn put(&self, table: StoreTable, key: &str, value: &serde_json::Value) -> StorageResult<()> {
        self.check_writable()?;
        let op = StoreOp::put(table, key, value.clone());
        Self::apply_locked(&mut self.tables.lock(), &op);
        self.log.lock().push(op);
        Ok(())
    }

    async fn delete(&self, table: StoreTable, key: &str) -> StorageResult<()> {
        self.check_writable()?;
        let op = StoreOp::delete(table, key);
        Self::apply_locked(&mut self.tables.lock(), &op);
        self.log.lock().push(op);
        Ok(())
    }

    async fn transaction(&self, ops: &[StoreOp]) -> StorageResult<()> {
        self.check_writable()?;
        let mut tables = self.tables.lock();
        for op in ops {
            Self::apply_locked(&mut tables, op);
        }
        drop(tables);
        self.log.lock().extend(ops.iter().cloned());
        self.transactions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load_all(&self, table: StoreTable) -> StorageResult<Vec<(String, serde_json::Value)>> {
        Ok(self
            .tables
            .lock()
            .get(&table)
            .map(|rows| {
                rows.iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }
}
