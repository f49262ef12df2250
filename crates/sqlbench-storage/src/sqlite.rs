//! SQLite-backed persistent store
//!
//! Each logical table is a `(key, value, updated_at)` table holding JSON text.
//! rusqlite is blocking, so the async trait methods hop onto tokio's blocking
//! pool.

use anyhow::Context;
use async_trait::async_trait;
use rusqlite::{Connection, params};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{StorageError, StorageResult};
use crate::store::PersistentStore;
use crate::table::{StoreOp, StoreTable};

/// Persistent store backed by a local SQLite database file
#[derive(Clone)]
pub struct SqliteStore {
    db_path: Arc<PathBuf>,
}

impl SqliteStore {
    /// Open (and if needed create) the store at the default location
    pub fn new() -> anyhow::Result<Self> {
        let db_path = Self::default_path()?;
        Self::with_path(db_path)
    }

    /// Open (and if needed create) the store at `db_path`
    pub fn with_path(db_path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        let store = Self {
            db_path: Arc::new(db_path),
        };
        store.initialize_schema()?;

        tracing::debug!(path = ?store.db_path, "opened session store");
        Ok(store)
    }

    /// `<data_dir>/sqlbench/session.db`
    pub fn default_path() -> anyhow::Result<PathBuf> {
        let data_dir = dirs::data_local_dir().context("Failed to get data directory")?;
        Ok(data_dir.join("sqlbench").join("session.db"))
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn connect(path: &Path) -> StorageResult<Connection> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(conn)
    }

    fn initialize_schema(&self) -> anyhow::Result<()> {
        let conn = Self::connect(&self.db_path)
            .with_context(|| format!("Failed to open database at {:?}", self.db_path))?;

        for table in StoreTable::ALL {
            conn.execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {} (
                        key TEXT PRIMARY KEY,
                        value TEXT NOT NULL,
                        updated_at TEXT NOT NULL
                    )",
                    table.as_str()
                ),
                [],
            )?;
        }

        Ok(())
    }

    fn apply_sync(conn: &Connection, op: &StoreOp) -> StorageResult<()> {
        match op {
            StoreOp::Put { table, key, value } => {
                let now = chrono::Utc::now().to_rfc3339();
                conn.execute(
                    &format!(
                        "INSERT OR REPLACE INTO {} (key, value, updated_at) VALUES (?1, ?2, ?3)",
                        table.as_str()
                    ),
                    params![key, serde_json::to_string(value)?, now],
                )?;
            }
            StoreOp::Delete { table, key } => {
                conn.execute(
                    &format!("DELETE FROM {} WHERE key = ?1", table.as_str()),
                    params![key],
                )?;
            }
        }
        Ok(())
    }

    /// Apply operations inside a single SQLite transaction
    pub fn transaction_sync(&self, ops: &[StoreOp]) -> StorageResult<()> {
        let mut conn = Self::connect(&self.db_path)?;
        let tx = conn.transaction()?;
        for op in ops {
            Self::apply_sync(&tx, op)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Every record of a table, blocking
    pub fn load_all_sync(&self, table: StoreTable) -> StorageResult<Vec<(String, serde_json::Value)>> {
        let conn = Self::connect(&self.db_path)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT key, value FROM {} ORDER BY key",
            table.as_str()
        ))?;

        let rows = stmt
            .query_map([], |row| {
                let key: String = row.get(0)?;
                let value: String = row.get(1)?;
                Ok((key, value))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut records = Vec::with_capacity(rows.len());
        for (key, value) in rows {
            match serde_json::from_str(&value) {
                Ok(value) => records.push((key, value)),
                Err(e) => {
                    tracing::warn!(table = %table, key = %key, error = %e, "skipping unreadable record");
                }
            }
        }
        Ok(records)
    }

    async fn run_blocking<T, F>(&self, f: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(SqliteStore) -> StorageResult<T> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || f(store))
            .await
            .map_err(|e| StorageError::Task(e.to_string()))?
    }
}

#[async_trait]
impl PersistentStore for SqliteStore {
    async fn put(&self, table: StoreTable, key: &str, value: &serde_json::Value) -> StorageResult<()> {
        let op = StoreOp::put(table, key, value.clone());
        self.run_blocking(move |store| {
            let conn = Self::connect(&store.db_path)?;
            Self::apply_sync(&conn, &op)
        })
        .await
    }

    async fn delete(&self, table: StoreTable, key: &str) -> StorageResult<()> {
        let op = StoreOp::delete(table, key);
        self.run_blocking(move |store| {
            let conn = Self::connect(&store.db_path)?;
            Self::apply_sync(&conn, &op)
        })
        .await
    }

    async fn transaction(&self, ops: &[StoreOp]) -> StorageResult<()> {
        let ops = ops.to_vec();
        self.run_blocking(move |store| store.transaction_sync(&ops))
            .await
    }

    async fn load_all(&self, table: StoreTable) -> StorageResult<Vec<(String, serde_json::Value)>> {
        self.run_blocking(move |store| store.load_all_sync(table))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::{TempDir, tempdir};

    fn create_test_store() -> (SqliteStore, TempDir) {
        let dir = tempdir().unwrap();
        let store = SqliteStore::with_path(dir.path().join("session.db")).unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn test_put_replaces_existing_value() {
        let (store, _dir) = create_test_store();

        store.put(StoreTable::SqlScripts, "s1", &json!({"name": "a"})).await.unwrap();
        store.put(StoreTable::SqlScripts, "s1", &json!({"name": "b"})).await.unwrap();

        let rows = store.load_all(StoreTable::SqlScripts).await.unwrap();
        assert_eq!(rows, vec![("s1".to_string(), json!({"name": "b"}))]);
    }

    #[tokio::test]
    async fn test_transaction_spans_tables() {
        let (store, _dir) = create_test_store();
        store.put(StoreTable::Tabs, "t1", &json!({"id": "t1"})).await.unwrap();
        store.put(StoreTable::SqlScripts, "s1", &json!({"id": "s1"})).await.unwrap();

        store
            .transaction(&[
                StoreOp::delete(StoreTable::Tabs, "t1"),
                StoreOp::delete(StoreTable::SqlScripts, "s1"),
                StoreOp::put(StoreTable::ContentView, "tabOrder", json!([])),
            ])
            .await
            .unwrap();

        assert!(store.load_all(StoreTable::Tabs).await.unwrap().is_empty());
        assert!(store.load_all(StoreTable::SqlScripts).await.unwrap().is_empty());
        assert_eq!(store.load_all(StoreTable::ContentView).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_data_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.db");

        {
            let store = SqliteStore::with_path(&path).unwrap();
            store.put(StoreTable::Tabs, "t1", &json!({"id": "t1"})).await.unwrap();
        }

        let reopened = SqliteStore::with_path(&path).unwrap();
        assert_eq!(reopened.load_all(StoreTable::Tabs).await.unwrap().len(), 1);
    }
}
