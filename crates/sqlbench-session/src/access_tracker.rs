//! Last-used tracking backed by the session store

use chrono::{DateTime, Utc};
use sqlbench_core::{AccessTracker, DataSourceId, ScriptId, table_fqn};
use sqlbench_storage::{PersistenceHandle, StoreTable};
use std::sync::Arc;

use crate::mutation::{self, Mutation};
use crate::store::{AccessTimes, SessionPatch, SessionStore};
use crate::writes;

/// Records access times in the session store and mirrors them to the
/// access-time tables
pub struct SessionAccessTracker {
    store: Arc<SessionStore>,
    persistence: PersistenceHandle,
}

impl SessionAccessTracker {
    pub fn new(store: Arc<SessionStore>, persistence: PersistenceHandle) -> Self {
        Self { store, persistence }
    }

    /// Most recently used scripts first
    pub fn most_recent_scripts(&self, limit: usize) -> Vec<(ScriptId, DateTime<Utc>)> {
        let snapshot = self.store.snapshot();
        let mut recent: Vec<(ScriptId, DateTime<Utc>)> = snapshot
            .access_times
            .scripts
            .iter()
            .map(|(id, at)| (id.clone(), *at))
            .collect();
        recent.sort_by(|a, b| b.1.cmp(&a.1));
        recent.truncate(limit);
        recent
    }

    pub fn data_source_last_used(&self, data_source_id: &DataSourceId) -> Option<DateTime<Utc>> {
        self.store
            .snapshot()
            .access_times
            .data_sources
            .get(data_source_id)
            .copied()
    }

    pub fn table_last_accessed(&self, database: &str, schema: &str, table: &str) -> Option<DateTime<Utc>> {
        self.store
            .snapshot()
            .access_times
            .tables
            .get(&table_fqn(database, schema, table))
            .copied()
    }

    fn record<F>(&self, table: StoreTable, key: String, insert: F)
    where
        F: FnOnce(&mut AccessTimes, DateTime<Utc>),
    {
        let now = Utc::now();
        mutation::apply(&self.store, &self.persistence, |snapshot| {
            let mut access_times = (*snapshot.access_times).clone();
            insert(&mut access_times, now);
            let ops = writes::put_access_time(table, key, now).into_iter().collect();
            Mutation::commit(SessionPatch::new().access_times(access_times), ops, ())
        });
    }
}

impl AccessTracker for SessionAccessTracker {
    fn update_sql_script_last_used(&self, script_id: &ScriptId) {
        let id = script_id.clone();
        self.record(StoreTable::ScriptAccessTime, script_id.to_string(), |times, now| {
            times.scripts.insert(id, now);
        });
    }

    fn update_data_source_last_used(&self, data_source_id: &DataSourceId) {
        let id = data_source_id.clone();
        self.record(
            StoreTable::DataSourceAccessTime,
            data_source_id.to_string(),
            |times, now| {
                times.data_sources.insert(id, now);
            },
        );
    }

    fn update_table_access_time(&self, database: &str, schema: &str, table: &str) {
        let fqn = table_fqn(database, schema, table);
        self.record(StoreTable::TableAccessTime, fqn.clone(), |times, now| {
            times.tables.insert(fqn, now);
        });
    }
}
