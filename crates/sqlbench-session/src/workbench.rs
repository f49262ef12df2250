//! Wiring of a complete session
//!
//! [`Workbench`] owns one session store, its persistence queue and the
//! controllers on top of them. Frontends build one per window.

use sqlbench_core::ScriptVersioning;
use sqlbench_storage::{DEFAULT_QUEUE_CAPACITY, PersistenceHandle, PersistenceWorker, PersistentStore};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::access_tracker::SessionAccessTracker;
use crate::data_source_controller::DataSourceController;
use crate::restore::restore_session;
use crate::script_controller::ScriptController;
use crate::store::{SessionSnapshot, SessionStore};
use crate::tab_controller::TabController;
use crate::view_state_cache::DEFAULT_VIEW_STATE_CACHE_CAPACITY;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkbenchOptions {
    pub view_state_cache_capacity: usize,
    pub persistence_queue_capacity: usize,
    /// Load the last persisted session on open
    pub restore_on_startup: bool,
}

impl Default for WorkbenchOptions {
    fn default() -> Self {
        Self {
            view_state_cache_capacity: DEFAULT_VIEW_STATE_CACHE_CAPACITY,
            persistence_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            restore_on_startup: true,
        }
    }
}

pub struct Workbench {
    store: Arc<SessionStore>,
    persistence: PersistenceHandle,
    worker: JoinHandle<()>,
    access: Arc<SessionAccessTracker>,
    tabs: Arc<TabController>,
    scripts: ScriptController,
    data_sources: DataSourceController,
}

impl Workbench {
    /// Open a session over `backend`, restoring it first if asked to.
    /// Must be called inside a tokio runtime; the persistence worker is
    /// spawned on it.
    pub async fn open(
        backend: Arc<dyn PersistentStore>,
        versioning: Option<Arc<dyn ScriptVersioning>>,
        options: WorkbenchOptions,
    ) -> Self {
        let initial = if options.restore_on_startup {
            restore_session(backend.as_ref()).await
        } else {
            SessionSnapshot::default()
        };

        let store = Arc::new(SessionStore::new(initial));
        let (persistence, worker) =
            PersistenceWorker::spawn(backend, options.persistence_queue_capacity);
        let access = Arc::new(SessionAccessTracker::new(store.clone(), persistence.clone()));

        let mut tabs = TabController::new(store.clone(), persistence.clone())
            .with_access_tracker(access.clone())
            .with_view_state_cache_capacity(options.view_state_cache_capacity);
        if let Some(versioning) = &versioning {
            tabs = tabs.with_versioning(versioning.clone());
        }
        let tabs = Arc::new(tabs);

        let mut scripts = ScriptController::new(tabs.clone());
        if let Some(versioning) = versioning {
            scripts = scripts.with_versioning(versioning);
        }
        let data_sources = DataSourceController::new(tabs.clone());

        Self {
            store,
            persistence,
            worker,
            access,
            tabs,
            scripts,
            data_sources,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn tabs(&self) -> &Arc<TabController> {
        &self.tabs
    }

    pub fn scripts(&self) -> &ScriptController {
        &self.scripts
    }

    pub fn data_sources(&self) -> &DataSourceController {
        &self.data_sources
    }

    pub fn access(&self) -> &SessionAccessTracker {
        &self.access
    }

    /// Wait for every write enqueued so far to reach the store
    pub async fn flush(&self) {
        self.persistence.flush().await;
    }

    /// Flush, then stop the persistence worker. Writes enqueued after the
    /// flush are dropped.
    pub async fn shutdown(self) {
        self.persistence.flush().await;
        self.worker.abort();
        tracing::debug!("workbench shut down");
    }
}
