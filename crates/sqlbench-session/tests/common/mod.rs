//! Common test utilities and mocks
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use sqlbench_core::{
    AccessTracker, DataSourceId, Result, ScriptId, ScriptVersioning, VersionId, VersionOrigin,
    VersionSaveOutcome, WorkbenchError,
};
use sqlbench_session::{DataSourceController, ScriptController, SessionStore, TabController};
use sqlbench_storage::{MemoryStore, PersistenceHandle, PersistenceWorker, StoreOp, StoreTable};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Notify;

/// Versioning collaborator that remembers every saved version.
///
/// Can be made to fail, or to block inside `save_version_if_content_differs`
/// until released, for testing interleavings with other operations.
#[derive(Default)]
pub struct RecordingVersioning {
    pub saved: Mutex<Vec<(ScriptId, String, VersionOrigin)>>,
    pub deleted_histories: Mutex<Vec<ScriptId>>,
    latest: Mutex<HashMap<ScriptId, String>>,
    should_fail: Mutex<bool>,
    gate: Mutex<Option<Gate>>,
}

#[derive(Clone)]
struct Gate {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl RecordingVersioning {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_saves(&self) {
        *self.should_fail.lock() = true;
    }

    /// Block the next saves until `release` is notified; `entered` is
    /// notified when a save starts waiting
    pub fn gate(&self) -> (Arc<Notify>, Arc<Notify>) {
        let gate = Gate {
            entered: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        };
        let handles = (gate.entered.clone(), gate.release.clone());
        *self.gate.lock() = Some(gate);
        handles
    }

    pub fn saved_contents(&self) -> Vec<String> {
        self.saved.lock().iter().map(|(_, content, _)| content.clone()).collect()
    }

    pub fn save_count(&self) -> usize {
        self.saved.lock().len()
    }
}

#[async_trait]
impl ScriptVersioning for RecordingVersioning {
    async fn save_version_if_content_differs(
        &self,
        script_id: &ScriptId,
        content: &str,
        origin: VersionOrigin,
    ) -> Result<VersionSaveOutcome> {
        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        if *self.should_fail.lock() {
            return Err(WorkbenchError::Versioning("versioning offline".into()));
        }

        let mut latest = self.latest.lock();
        if latest.get(script_id).map(String::as_str) == Some(content) {
            return Ok(VersionSaveOutcome::Unchanged);
        }
        latest.insert(script_id.clone(), content.to_string());
        self.saved
            .lock()
            .push((script_id.clone(), content.to_string(), origin));
        Ok(VersionSaveOutcome::Saved(VersionId::new()))
    }

    async fn delete_script_history(&self, script_id: &ScriptId) -> Result<()> {
        self.latest.lock().remove(script_id);
        self.deleted_histories.lock().push(script_id.clone());
        Ok(())
    }
}

/// Access tracker that logs every notification
#[derive(Default)]
pub struct RecordingAccessTracker {
    pub calls: Mutex<Vec<String>>,
}

impl RecordingAccessTracker {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

impl AccessTracker for RecordingAccessTracker {
    fn update_sql_script_last_used(&self, script_id: &ScriptId) {
        self.calls.lock().push(format!("script:{}", script_id));
    }

    fn update_data_source_last_used(&self, data_source_id: &DataSourceId) {
        self.calls.lock().push(format!("data_source:{}", data_source_id));
    }

    fn update_table_access_time(&self, database: &str, schema: &str, table: &str) {
        self.calls
            .lock()
            .push(format!("table:{}.{}.{}", database, schema, table));
    }
}

/// A session over an in-memory backend with recording collaborators
pub struct TestSession {
    pub backend: Arc<MemoryStore>,
    pub store: Arc<SessionStore>,
    pub persistence: PersistenceHandle,
    pub tabs: Arc<TabController>,
    pub scripts: ScriptController,
    pub data_sources: DataSourceController,
    pub versioning: Arc<RecordingVersioning>,
    pub access: Arc<RecordingAccessTracker>,
}

impl TestSession {
    pub fn new() -> Self {
        Self::with_cache_capacity(50)
    }

    pub fn with_cache_capacity(capacity: usize) -> Self {
        let backend = Arc::new(MemoryStore::new());
        let (persistence, _worker) = PersistenceWorker::spawn(backend.clone(), 256);
        let store = Arc::new(SessionStore::default());
        let versioning = Arc::new(RecordingVersioning::new());
        let access = Arc::new(RecordingAccessTracker::default());

        let tabs = Arc::new(
            TabController::new(store.clone(), persistence.clone())
                .with_versioning(versioning.clone())
                .with_access_tracker(access.clone())
                .with_view_state_cache_capacity(capacity),
        );
        let scripts = ScriptController::new(tabs.clone()).with_versioning(versioning.clone());
        let data_sources = DataSourceController::new(tabs.clone());

        Self {
            backend,
            store,
            persistence,
            tabs,
            scripts,
            data_sources,
            versioning,
            access,
        }
    }

    pub async fn flush(&self) {
        self.persistence.flush().await;
    }

    /// Operations that reached the backend for one table
    pub fn ops_for(&self, table: StoreTable) -> Vec<StoreOp> {
        self.backend
            .operations()
            .into_iter()
            .filter(|op| op.table() == table)
            .collect()
    }

    /// Tab order and map keys must describe the same set, without duplicates
    pub fn assert_order_consistent(&self) {
        let snapshot = self.store.snapshot();
        let mut ordered: Vec<String> = snapshot.tab_order.iter().map(|id| id.to_string()).collect();
        let before_dedup = ordered.len();
        ordered.sort();
        ordered.dedup();
        assert_eq!(ordered.len(), before_dedup, "duplicate ids in tab order");

        let mut keys: Vec<String> = snapshot.tabs.keys().map(|id| id.to_string()).collect();
        keys.sort();
        assert_eq!(ordered, keys, "tab order and tab map disagree");

        if let Some(active) = &snapshot.active_tab_id {
            assert!(snapshot.tabs.contains_key(active), "dangling active tab");
        }
        if let Some(preview) = &snapshot.preview_tab_id {
            assert!(snapshot.tabs.contains_key(preview), "dangling preview tab");
        }
    }
}
