//! In-memory session store
//!
//! The store holds one immutable [`SessionSnapshot`] behind an `Arc`. Writers
//! serialize on a single lock, compute a [`SessionPatch`] from the current
//! snapshot and swap in a new snapshot that shares every untouched field with
//! the old one. Readers clone the `Arc` and never observe a partial write.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use sqlbench_core::{
    DataSource, DataSourceId, Result, ScriptId, SqlScript, Tab, TabId,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;

/// Last execution failure shown on a tab
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TabExecutionError {
    pub message: String,
    /// Statement that failed, when known
    pub statement: Option<String>,
}

impl TabExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            statement: None,
        }
    }

    pub fn with_statement(mut self, statement: impl Into<String>) -> Self {
        self.statement = Some(statement.into());
        self
    }
}

/// Last-used timestamps used for recency ordering
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AccessTimes {
    pub scripts: HashMap<ScriptId, DateTime<Utc>>,
    pub data_sources: HashMap<DataSourceId, DateTime<Utc>>,
    /// Keyed by `database.schema.table`
    pub tables: HashMap<String, DateTime<Utc>>,
}

/// Immutable view of the whole session
#[derive(Clone, Debug, Default)]
pub struct SessionSnapshot {
    pub tabs: Arc<HashMap<TabId, Tab>>,
    pub tab_order: Arc<Vec<TabId>>,
    pub active_tab_id: Option<TabId>,
    pub preview_tab_id: Option<TabId>,
    pub sql_scripts: Arc<HashMap<ScriptId, SqlScript>>,
    pub data_sources: Arc<HashMap<DataSourceId, DataSource>>,
    pub tab_execution_errors: Arc<HashMap<TabId, TabExecutionError>>,
    pub access_times: Arc<AccessTimes>,
}

impl SessionSnapshot {
    pub fn tab(&self, tab_id: &TabId) -> Option<&Tab> {
        self.tabs.get(tab_id)
    }

    /// Tabs in display order
    pub fn ordered_tabs(&self) -> impl Iterator<Item = &Tab> {
        self.tab_order.iter().filter_map(|id| self.tabs.get(id))
    }

    pub fn active_tab(&self) -> Option<&Tab> {
        self.active_tab_id.as_ref().and_then(|id| self.tabs.get(id))
    }

    pub fn preview_tab(&self) -> Option<&Tab> {
        self.preview_tab_id.as_ref().and_then(|id| self.tabs.get(id))
    }

    fn apply(&self, patch: SessionPatch) -> SessionSnapshot {
        SessionSnapshot {
            tabs: patch.tabs.unwrap_or_else(|| self.tabs.clone()),
            tab_order: patch.tab_order.unwrap_or_else(|| self.tab_order.clone()),
            active_tab_id: patch
                .active_tab_id
                .unwrap_or_else(|| self.active_tab_id.clone()),
            preview_tab_id: patch
                .preview_tab_id
                .unwrap_or_else(|| self.preview_tab_id.clone()),
            sql_scripts: patch.sql_scripts.unwrap_or_else(|| self.sql_scripts.clone()),
            data_sources: patch
                .data_sources
                .unwrap_or_else(|| self.data_sources.clone()),
            tab_execution_errors: patch
                .tab_execution_errors
                .unwrap_or_else(|| self.tab_execution_errors.clone()),
            access_times: patch
                .access_times
                .unwrap_or_else(|| self.access_times.clone()),
        }
    }
}

/// Whole-field replacements applied in one commit.
///
/// `None` leaves a field as it is. For the pointer fields the inner `Option`
/// is the new value, so `Some(None)` clears the pointer.
#[derive(Clone, Debug, Default)]
pub struct SessionPatch {
    pub tabs: Option<Arc<HashMap<TabId, Tab>>>,
    pub tab_order: Option<Arc<Vec<TabId>>>,
    pub active_tab_id: Option<Option<TabId>>,
    pub preview_tab_id: Option<Option<TabId>>,
    pub sql_scripts: Option<Arc<HashMap<ScriptId, SqlScript>>>,
    pub data_sources: Option<Arc<HashMap<DataSourceId, DataSource>>>,
    pub tab_execution_errors: Option<Arc<HashMap<TabId, TabExecutionError>>>,
    pub access_times: Option<Arc<AccessTimes>>,
}

impl SessionPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tabs(mut self, tabs: HashMap<TabId, Tab>) -> Self {
        self.tabs = Some(Arc::new(tabs));
        self
    }

    pub fn tab_order(mut self, order: Vec<TabId>) -> Self {
        self.tab_order = Some(Arc::new(order));
        self
    }

    pub fn active_tab_id(mut self, id: Option<TabId>) -> Self {
        self.active_tab_id = Some(id);
        self
    }

    pub fn preview_tab_id(mut self, id: Option<TabId>) -> Self {
        self.preview_tab_id = Some(id);
        self
    }

    pub fn sql_scripts(mut self, scripts: HashMap<ScriptId, SqlScript>) -> Self {
        self.sql_scripts = Some(Arc::new(scripts));
        self
    }

    pub fn data_sources(mut self, data_sources: HashMap<DataSourceId, DataSource>) -> Self {
        self.data_sources = Some(Arc::new(data_sources));
        self
    }

    pub fn tab_execution_errors(mut self, errors: HashMap<TabId, TabExecutionError>) -> Self {
        self.tab_execution_errors = Some(Arc::new(errors));
        self
    }

    pub fn access_times(mut self, access_times: AccessTimes) -> Self {
        self.access_times = Some(Arc::new(access_times));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_none()
            && self.tab_order.is_none()
            && self.active_tab_id.is_none()
            && self.preview_tab_id.is_none()
            && self.sql_scripts.is_none()
            && self.data_sources.is_none()
            && self.tab_execution_errors.is_none()
            && self.access_times.is_none()
    }
}

/// Single-writer holder of the current [`SessionSnapshot`]
pub struct SessionStore {
    current: RwLock<Arc<SessionSnapshot>>,
    writer: Mutex<()>,
    revision: AtomicU64,
    notify: watch::Sender<Arc<SessionSnapshot>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SessionSnapshot::default())
    }
}

impl SessionStore {
    pub fn new(initial: SessionSnapshot) -> Self {
        let initial = Arc::new(initial);
        let (notify, _) = watch::channel(initial.clone());
        Self {
            current: RwLock::new(initial),
            writer: Mutex::new(()),
            revision: AtomicU64::new(0),
            notify,
        }
    }

    /// The current snapshot; cheap, never blocks on a running update
    pub fn snapshot(&self) -> Arc<SessionSnapshot> {
        self.current.read().clone()
    }

    /// Number of commits so far
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    /// Receiver that sees every committed snapshot
    pub fn subscribe(&self) -> watch::Receiver<Arc<SessionSnapshot>> {
        self.notify.subscribe()
    }

    /// Apply `patch` on top of whatever is current
    pub fn commit(&self, patch: SessionPatch) {
        self.update(|_| Some(patch));
    }

    /// Read-compute-commit under the writer lock. Returns whether a commit
    /// happened; `None` or an empty patch commits nothing.
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&SessionSnapshot) -> Option<SessionPatch>,
    {
        self.update_with(|snapshot| (f(snapshot), ())).1
    }

    /// Like [`update`](Self::update) but also hands back a value computed
    /// from the snapshot the patch was based on
    pub fn update_with<T, F>(&self, f: F) -> (T, bool)
    where
        F: FnOnce(&SessionSnapshot) -> (Option<SessionPatch>, T),
    {
        let _writer = self.writer.lock();
        let current = self.snapshot();
        let (patch, value) = f(&current);

        let committed = match patch {
            Some(patch) if !patch.is_empty() => {
                self.install(Arc::new(current.apply(patch)));
                true
            }
            _ => false,
        };
        (value, committed)
    }

    /// Fallible variant; an error commits nothing
    pub fn try_update<T, F>(&self, f: F) -> Result<(T, bool)>
    where
        F: FnOnce(&SessionSnapshot) -> Result<(Option<SessionPatch>, T)>,
    {
        let _writer = self.writer.lock();
        let current = self.snapshot();
        let (patch, value) = f(&current)?;

        let committed = match patch {
            Some(patch) if !patch.is_empty() => {
                self.install(Arc::new(current.apply(patch)));
                true
            }
            _ => false,
        };
        Ok((value, committed))
    }

    /// Replace the whole snapshot, e.g. after restoring from disk
    pub fn replace(&self, snapshot: SessionSnapshot) {
        let _writer = self.writer.lock();
        self.install(Arc::new(snapshot));
    }

    fn install(&self, next: Arc<SessionSnapshot>) {
        *self.current.write() = next.clone();
        let revision = self.revision.fetch_add(1, Ordering::AcqRel) + 1;
        self.notify.send_replace(next);
        tracing::trace!(revision, "session snapshot committed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlbench_core::{SchemaBrowserSourceType, SchemaBrowserTab, TabKind};

    fn browser_tab() -> Tab {
        Tab::new(
            TabId::new(),
            TabKind::SchemaBrowser(SchemaBrowserTab {
                source_id: None,
                source_type: SchemaBrowserSourceType::All,
                schema_name: None,
                object_names: None,
            }),
        )
    }

    #[test]
    fn test_commit_shares_untouched_fields() {
        let store = SessionStore::default();
        let before = store.snapshot();

        let tab = browser_tab();
        store.commit(
            SessionPatch::new()
                .tabs(HashMap::from([(tab.id.clone(), tab.clone())]))
                .tab_order(vec![tab.id.clone()]),
        );

        let after = store.snapshot();
        assert_eq!(store.revision(), 1);
        assert!(before.tabs.is_empty());
        assert_eq!(after.tabs.len(), 1);
        assert!(Arc::ptr_eq(&before.sql_scripts, &after.sql_scripts));
        assert!(!Arc::ptr_eq(&before.tabs, &after.tabs));
    }

    #[test]
    fn test_update_without_patch_does_not_commit() {
        let store = SessionStore::default();
        let before = store.snapshot();

        assert!(!store.update(|_| None));
        assert!(!store.update(|_| Some(SessionPatch::new())));

        assert_eq!(store.revision(), 0);
        assert!(Arc::ptr_eq(&before, &store.snapshot()));
    }

    #[test]
    fn test_try_update_error_commits_nothing() {
        let store = SessionStore::default();
        let result: Result<((), bool)> = store.try_update(|_| {
            Err(sqlbench_core::WorkbenchError::not_found(
                sqlbench_core::EntityKind::Tab,
                "missing",
            ))
        });

        assert!(result.unwrap_err().is_not_found());
        assert_eq!(store.revision(), 0);
    }

    #[test]
    fn test_pointer_patch_can_clear() {
        let tab = browser_tab();
        let store = SessionStore::new(SessionSnapshot {
            active_tab_id: Some(tab.id.clone()),
            ..Default::default()
        });

        store.commit(SessionPatch::new().active_tab_id(None));
        assert_eq!(store.snapshot().active_tab_id, None);
    }

    #[tokio::test]
    async fn test_subscribers_see_commits() {
        let store = SessionStore::default();
        let mut rx = store.subscribe();

        let tab = browser_tab();
        store.commit(SessionPatch::new().active_tab_id(Some(tab.id.clone())));

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().active_tab_id, Some(tab.id));
    }
}
