//! Tab lifecycle controller
//!
//! Creates, finds, updates and deletes tabs while keeping three things in
//! step: the in-memory [`SessionStore`], the persistence queue and the
//! collaborators that care about tabs going away (script versioning, access
//! tracking, the parked view-state cache).
//!
//! Every resource (script, flat file, database object, schema browser) has at
//! most one tab. All creation paths go through find-or-create under the store's
//! writer lock, so two racing callers still end up with the same tab.

use parking_lot::Mutex;
use sqlbench_core::{
    AccessTracker, ChartConfig, ColumnMeta, ColumnSortSpec, DataSource, DataSourceId,
    DataSourceTab, DataViewStateCachePatch, EntityKind, NoopAccessTracker, ObjectType,
    ResourceKey, Result, SchemaBrowserSourceType, SchemaBrowserTab, ScriptId, ScriptTab,
    ScriptVersioning, SqlScript, StaleDataPatch, Tab, TabId, TabKind, ToDataRow, VersionOrigin,
    VersionSaveOutcome, ViewMode, WorkbenchError, make_id, sorted_names,
};
use sqlbench_storage::{PersistenceHandle, StoreOp};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::mutation::{self, Mutation};
use crate::resolve::{ensure_database_data_source, ensure_flat_file_data_source, ensure_script};
use crate::store::{SessionPatch, SessionSnapshot, SessionStore, TabExecutionError};
use crate::tab_algebra::{
    delete_tabs, find_tab_by_resource, find_tabs_by_data_source, merge_data_view_state_cache,
    validate_tab_order,
};
use crate::view_state_cache::{DEFAULT_VIEW_STATE_CACHE_CAPACITY, ScriptViewStateCache};
use crate::writes;

/// Initial editor/data-view split of a new script tab
pub const DEFAULT_PANE_SPLIT: (f64, f64) = (0.5, 0.5);

/// Lookup key and activation flag for a schema browser tab
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchemaBrowserTabOptions {
    pub source_id: Option<String>,
    pub source_type: SchemaBrowserSourceType,
    pub schema_name: Option<String>,
    pub object_names: Option<Vec<String>>,
    pub set_active: bool,
}

impl SchemaBrowserTabOptions {
    pub fn new(source_type: SchemaBrowserSourceType) -> Self {
        Self {
            source_id: None,
            source_type,
            schema_name: None,
            object_names: None,
            set_active: false,
        }
    }

    pub fn source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    pub fn schema_name(mut self, schema_name: impl Into<String>) -> Self {
        self.schema_name = Some(schema_name.into());
        self
    }

    pub fn object_names(mut self, names: Vec<String>) -> Self {
        self.object_names = Some(names);
        self
    }

    pub fn set_active(mut self, set_active: bool) -> Self {
        self.set_active = set_active;
        self
    }

    fn resource_key(&self) -> ResourceKey {
        ResourceKey::schema_browser(
            self.source_id.clone(),
            self.source_type,
            self.schema_name.clone(),
            self.object_names.as_deref(),
        )
    }
}

/// Partial update of the stale rows a data view shows while re-querying.
///
/// Rows arrive in whatever shape the engine produced and are converted
/// through [`ToDataRow`] before they reach the store.
#[derive(Clone, Debug)]
pub struct StaleDataUpdate<R> {
    pub schema: Option<Vec<ColumnMeta>>,
    pub data: Option<Vec<R>>,
    pub row_offset: Option<u64>,
    pub real_row_count: Option<Option<u64>>,
    pub estimated_row_count: Option<Option<u64>>,
}

impl<R> Default for StaleDataUpdate<R> {
    fn default() -> Self {
        Self {
            schema: None,
            data: None,
            row_offset: None,
            real_row_count: None,
            estimated_row_count: None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct StaleDataCacheUpdate<R> {
    /// Replaces the sort when set
    pub sort: Option<Vec<ColumnSortSpec>>,
    pub stale_data: Option<StaleDataUpdate<R>>,
}

impl<R> Default for StaleDataCacheUpdate<R> {
    fn default() -> Self {
        Self {
            sort: None,
            stale_data: None,
        }
    }
}

impl<R: ToDataRow> StaleDataCacheUpdate<R> {
    fn into_patch(self) -> DataViewStateCachePatch {
        DataViewStateCachePatch {
            sort: self.sort.map(Some),
            stale_data: self.stale_data.map(|stale| {
                Some(StaleDataPatch {
                    schema: stale.schema,
                    data: stale
                        .data
                        .map(|rows| rows.iter().map(ToDataRow::to_data_row).collect()),
                    row_offset: stale.row_offset,
                    real_row_count: stale.real_row_count,
                    estimated_row_count: stale.estimated_row_count,
                })
            }),
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateLastExecutedQuery {
    pub tab_id: TabId,
    pub last_executed_query: Option<String>,
    /// Commit even if the query did not change
    pub force: bool,
}

/// Tab lifecycle controller
///
/// Owns the coordination state that outlives a single call: the parked view
/// states of closed script tabs, the set of tabs currently being deleted and
/// the live (unsaved) editor content registered by open editors.
pub struct TabController {
    store: Arc<SessionStore>,
    persistence: PersistenceHandle,
    versioning: Option<Arc<dyn ScriptVersioning>>,
    access: Arc<dyn AccessTracker>,
    view_states: Mutex<ScriptViewStateCache>,
    /// Tab id to the number of `delete_tab` calls currently closing it
    being_deleted: Mutex<HashMap<TabId, usize>>,
    live_content: Mutex<HashMap<TabId, String>>,
}

impl TabController {
    pub fn new(store: Arc<SessionStore>, persistence: PersistenceHandle) -> Self {
        Self {
            store,
            persistence,
            versioning: None,
            access: Arc::new(NoopAccessTracker),
            view_states: Mutex::new(ScriptViewStateCache::new(DEFAULT_VIEW_STATE_CACHE_CAPACITY)),
            being_deleted: Mutex::new(HashMap::new()),
            live_content: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_versioning(mut self, versioning: Arc<dyn ScriptVersioning>) -> Self {
        self.versioning = Some(versioning);
        self
    }

    pub fn with_access_tracker(mut self, access: Arc<dyn AccessTracker>) -> Self {
        self.access = access;
        self
    }

    pub fn with_view_state_cache_capacity(self, capacity: usize) -> Self {
        *self.view_states.lock() = ScriptViewStateCache::new(capacity);
        self
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub(crate) fn apply<T, F>(&self, f: F) -> (T, bool)
    where
        F: FnOnce(&SessionSnapshot) -> Mutation<T>,
    {
        mutation::apply(&self.store, &self.persistence, f)
    }

    pub(crate) fn try_apply<T, F>(&self, f: F) -> Result<(T, bool)>
    where
        F: FnOnce(&SessionSnapshot) -> Result<Mutation<T>>,
    {
        mutation::try_apply(&self.store, &self.persistence, f)
    }

    // ---- reads ----

    pub fn get_tab(&self, tab_id: &TabId) -> Option<Tab> {
        self.store.snapshot().tabs.get(tab_id).cloned()
    }

    pub fn tab_count(&self) -> usize {
        self.store.snapshot().tabs.len()
    }

    /// Tabs in display order
    pub fn ordered_tabs(&self) -> Vec<Tab> {
        self.store.snapshot().ordered_tabs().cloned().collect()
    }

    /// Whether the parked view-state cache holds state for `script_id`
    pub fn has_parked_view_state(&self, script_id: &ScriptId) -> bool {
        self.view_states.lock().contains(script_id)
    }

    // ---- find-or-create ----

    pub fn get_or_create_schema_browser_tab(&self, options: SchemaBrowserTabOptions) -> Tab {
        let key = options.resource_key();
        let (tab, _) = self.apply(|snapshot| {
            self.find_or_create(snapshot, &key, |id| {
                Tab::new(
                    id,
                    TabKind::SchemaBrowser(SchemaBrowserTab {
                        source_id: options.source_id.clone(),
                        source_type: options.source_type,
                        schema_name: options.schema_name.clone(),
                        object_names: options.object_names.as_deref().map(sorted_names),
                    }),
                )
            })
        });
        self.activate_if(options.set_active, &tab);
        tab
    }

    /// Tab for a table or view of a database source, by source id
    pub fn get_or_create_tab_from_local_db_object(
        &self,
        data_source_id: &DataSourceId,
        schema_name: &str,
        object_name: &str,
        object_type: ObjectType,
        set_active: bool,
    ) -> Result<Tab> {
        let (tab, _) = self.try_apply(|snapshot| {
            ensure_database_data_source(snapshot, data_source_id)?;
            Ok(self.find_or_create_db_object(
                snapshot,
                data_source_id,
                schema_name,
                object_name,
                object_type,
            ))
        })?;
        self.activate_if(set_active, &tab);
        Ok(tab)
    }

    /// Same as [`get_or_create_tab_from_local_db_object`](Self::get_or_create_tab_from_local_db_object)
    /// for a data source the caller already holds
    pub fn get_or_create_tab_from_local_db_object_for_data_source(
        &self,
        data_source: &DataSource,
        schema_name: &str,
        object_name: &str,
        object_type: ObjectType,
        set_active: bool,
    ) -> Result<Tab> {
        let data_source_id = data_source.expect_database()?.id();
        let (tab, _) = self.apply(|snapshot| {
            self.find_or_create_db_object(
                snapshot,
                data_source_id,
                schema_name,
                object_name,
                object_type,
            )
        });
        self.activate_if(set_active, &tab);
        Ok(tab)
    }

    pub fn get_or_create_tab_from_flat_file_data_source(
        &self,
        data_source_id: &DataSourceId,
        set_active: bool,
    ) -> Result<Tab> {
        let (tab, _) = self.try_apply(|snapshot| {
            ensure_flat_file_data_source(snapshot, data_source_id)?;
            Ok(self.find_or_create_flat_file(snapshot, data_source_id))
        })?;
        self.activate_if(set_active, &tab);
        Ok(tab)
    }

    pub fn get_or_create_tab_from_flat_file_for_data_source(
        &self,
        data_source: &DataSource,
        set_active: bool,
    ) -> Result<Tab> {
        let data_source_id = data_source.expect_flat_file()?.id();
        let (tab, _) = self.apply(|snapshot| self.find_or_create_flat_file(snapshot, data_source_id));
        self.activate_if(set_active, &tab);
        Ok(tab)
    }

    /// Tab for a script. A new tab takes back the view state parked when the
    /// script's previous tab closed, if any.
    pub fn get_or_create_tab_from_script(&self, script_id: &ScriptId, set_active: bool) -> Result<Tab> {
        let (tab, _) = self.try_apply(|snapshot| {
            ensure_script(snapshot, script_id)?;
            Ok(self.find_or_create_script(snapshot, script_id))
        })?;
        self.activate_if(set_active, &tab);
        Ok(tab)
    }

    pub fn get_or_create_tab_for_script(&self, script: &SqlScript, set_active: bool) -> Tab {
        let (tab, _) = self.apply(|snapshot| self.find_or_create_script(snapshot, &script.id));
        self.activate_if(set_active, &tab);
        tab
    }

    fn find_or_create_script(&self, snapshot: &SessionSnapshot, script_id: &ScriptId) -> Mutation<Tab> {
        self.find_or_create(snapshot, &ResourceKey::Script(script_id.clone()), |id| {
            let mut tab = Tab::new(
                id,
                TabKind::Script(ScriptTab {
                    sql_script_id: script_id.clone(),
                    last_executed_query: None,
                    editor_pane_height: DEFAULT_PANE_SPLIT.0,
                    data_view_pane_height: DEFAULT_PANE_SPLIT.1,
                }),
            );
            tab.data_view_state_cache = self.view_states.lock().take(script_id);
            if tab.data_view_state_cache.is_some() {
                tracing::debug!(script_id = %script_id, "restored parked view state");
            }
            tab
        })
    }

    fn find_or_create_flat_file(
        &self,
        snapshot: &SessionSnapshot,
        data_source_id: &DataSourceId,
    ) -> Mutation<Tab> {
        self.find_or_create(snapshot, &ResourceKey::FlatFile(data_source_id.clone()), |id| {
            Tab::new(
                id,
                TabKind::DataSource(DataSourceTab::File {
                    data_source_id: data_source_id.clone(),
                }),
            )
        })
    }

    fn find_or_create_db_object(
        &self,
        snapshot: &SessionSnapshot,
        data_source_id: &DataSourceId,
        schema_name: &str,
        object_name: &str,
        object_type: ObjectType,
    ) -> Mutation<Tab> {
        let key = ResourceKey::DbObject {
            data_source_id: data_source_id.clone(),
            schema_name: schema_name.to_string(),
            object_name: object_name.to_string(),
        };
        self.find_or_create(snapshot, &key, |id| {
            Tab::new(
                id,
                TabKind::DataSource(DataSourceTab::Db {
                    data_source_id: data_source_id.clone(),
                    schema_name: schema_name.to_string(),
                    object_name: object_name.to_string(),
                    object_type,
                }),
            )
        })
    }

    /// Existing tab for `key`, or a new one appended to the tab order.
    /// `build` only runs when a tab is created.
    fn find_or_create<F>(&self, snapshot: &SessionSnapshot, key: &ResourceKey, build: F) -> Mutation<Tab>
    where
        F: FnOnce(TabId) -> Tab,
    {
        if let Some(existing) = find_tab_by_resource(&snapshot.tabs, key) {
            return Mutation::none(existing.clone());
        }

        let tab = build(make_id());
        self.append_tab(snapshot, tab)
    }

    /// Insert `tab` at the end of the order
    pub(crate) fn append_tab(&self, snapshot: &SessionSnapshot, tab: Tab) -> Mutation<Tab> {
        let mut tabs = (*snapshot.tabs).clone();
        tabs.insert(tab.id.clone(), tab.clone());
        let mut order = (*snapshot.tab_order).clone();
        order.push(tab.id.clone());

        let ops = [writes::put_tab(&tab), writes::put_tab_order(&order)]
            .into_iter()
            .flatten()
            .collect();

        tracing::debug!(tab_id = %tab.id, kind = tab.kind.name(), "tab created");
        Mutation::commit(SessionPatch::new().tabs(tabs).tab_order(order), ops, tab)
    }

    pub(crate) fn activate_if(&self, set_active: bool, tab: &Tab) {
        if !set_active {
            return;
        }
        if let Err(e) = self.set_active_tab_id(Some(tab.id.clone())) {
            // The tab was deleted between creation and activation
            tracing::debug!(tab_id = %tab.id, error = %e, "tab vanished before activation");
        }
    }

    // ---- read-only lookups ----

    pub fn find_tab_from_script(&self, script_id: &ScriptId) -> Result<Option<Tab>> {
        let snapshot = self.store.snapshot();
        ensure_script(&snapshot, script_id)?;
        Ok(find_tab_by_resource(&snapshot.tabs, &ResourceKey::Script(script_id.clone())).cloned())
    }

    pub fn find_tab_from_local_db_object(
        &self,
        data_source_id: &DataSourceId,
        schema_name: &str,
        object_name: &str,
    ) -> Result<Option<Tab>> {
        let snapshot = self.store.snapshot();
        ensure_database_data_source(&snapshot, data_source_id)?;
        let key = ResourceKey::DbObject {
            data_source_id: data_source_id.clone(),
            schema_name: schema_name.to_string(),
            object_name: object_name.to_string(),
        };
        Ok(find_tab_by_resource(&snapshot.tabs, &key).cloned())
    }

    pub fn find_tab_from_flat_file_data_source(
        &self,
        data_source_id: &DataSourceId,
    ) -> Result<Option<Tab>> {
        let snapshot = self.store.snapshot();
        ensure_flat_file_data_source(&snapshot, data_source_id)?;
        Ok(
            find_tab_by_resource(&snapshot.tabs, &ResourceKey::FlatFile(data_source_id.clone()))
                .cloned(),
        )
    }

    // ---- data-view cache ----

    /// Merge new stale rows and sort into the tab's cache. A tab that no
    /// longer exists is ignored; async readers may finish after a close.
    pub fn update_tab_data_view_stale_data_cache<R: ToDataRow>(
        &self,
        tab_id: &TabId,
        update: StaleDataCacheUpdate<R>,
    ) -> bool {
        self.update_data_view_cache(tab_id, update.into_patch())
    }

    pub fn update_tab_data_view_column_sizes_cache(
        &self,
        tab_id: &TabId,
        column_sizes: BTreeMap<String, f64>,
    ) -> bool {
        self.update_data_view_cache(tab_id, DataViewStateCachePatch::column_sizes(column_sizes))
    }

    pub fn update_tab_data_view_data_page_cache(&self, tab_id: &TabId, page: u64) -> bool {
        self.update_data_view_cache(tab_id, DataViewStateCachePatch::data_view_page(page))
    }

    pub fn update_tab_view_mode(&self, tab_id: &TabId, view_mode: ViewMode) -> bool {
        self.update_data_view_cache(tab_id, DataViewStateCachePatch::view_mode(view_mode))
    }

    pub fn update_tab_chart_config(&self, tab_id: &TabId, chart_config: Option<ChartConfig>) -> bool {
        self.update_data_view_cache(tab_id, DataViewStateCachePatch::chart_config(chart_config))
    }

    /// Merge `patch` into the tab's cache. Returns whether anything changed;
    /// an unchanged cache commits nothing and writes nothing.
    fn update_data_view_cache(&self, tab_id: &TabId, patch: DataViewStateCachePatch) -> bool {
        self.edit_tab(tab_id, |tab| {
            let merged = merge_data_view_state_cache(tab.data_view_state_cache.as_ref(), patch);
            if tab.data_view_state_cache.as_ref() == Some(&merged) {
                return None;
            }
            let mut updated = tab.clone();
            updated.data_view_state_cache = Some(merged);
            Some(updated)
        })
    }

    // ---- script tabs ----

    pub fn update_script_tab_last_executed_query(&self, update: UpdateLastExecutedQuery) -> bool {
        let UpdateLastExecutedQuery {
            tab_id,
            last_executed_query,
            force,
        } = update;

        self.edit_tab(&tab_id, |tab| {
            let Some(script) = tab.as_script() else {
                report_type_mismatch(tab, "script", "update_script_tab_last_executed_query");
                return None;
            };
            if !force && script.last_executed_query == last_executed_query {
                return None;
            }
            Some(with_script(tab, |script| {
                script.last_executed_query = last_executed_query;
            }))
        })
    }

    /// Store the editor/data-view split of a script tab
    pub fn update_script_tab_layout(&self, tab_id: &TabId, layout: (f64, f64)) -> bool {
        let (editor_height, data_view_height) = layout;
        self.edit_tab(tab_id, |tab| {
            let Some(script) = tab.as_script() else {
                report_type_mismatch(tab, "script", "update_script_tab_layout");
                return None;
            };
            if script.editor_pane_height == editor_height
                && script.data_view_pane_height == data_view_height
            {
                return None;
            }
            Some(with_script(tab, |script| {
                script.editor_pane_height = editor_height;
                script.data_view_pane_height = data_view_height;
            }))
        })
    }

    /// Replace one tab with the result of `f`. `f` returns `None` for "no
    /// change"; a missing tab is ignored.
    pub(crate) fn edit_tab<F>(&self, tab_id: &TabId, f: F) -> bool
    where
        F: FnOnce(&Tab) -> Option<Tab>,
    {
        let (_, committed) = self.apply(|snapshot| {
            let Some(tab) = snapshot.tabs.get(tab_id) else {
                tracing::trace!(tab_id = %tab_id, "ignoring update of missing tab");
                return Mutation::none(());
            };
            match f(tab) {
                Some(updated) => self.replace_tab(snapshot, updated, ()),
                None => Mutation::none(()),
            }
        });
        committed
    }

    /// Swap in a new version of an existing tab
    pub(crate) fn replace_tab<T>(&self, snapshot: &SessionSnapshot, updated: Tab, value: T) -> Mutation<T> {
        let ops = writes::put_tab(&updated).into_iter().collect();
        let mut tabs = (*snapshot.tabs).clone();
        tabs.insert(updated.id.clone(), updated);
        Mutation::commit(SessionPatch::new().tabs(tabs), ops, value)
    }

    // ---- pointers and order ----

    /// Make `tab_id` the active tab.
    ///
    /// Last-used tracking for the tab's resource is updated on every call,
    /// including when the tab is already active.
    pub fn set_active_tab_id(&self, tab_id: Option<TabId>) -> Result<()> {
        if let Some(id) = &tab_id {
            let snapshot = self.store.snapshot();
            let tab = snapshot
                .tabs
                .get(id)
                .ok_or_else(|| WorkbenchError::not_found(EntityKind::Tab, id))?;
            self.record_access(&snapshot, tab);
        }

        self.try_apply(|snapshot| {
            if snapshot.active_tab_id == tab_id {
                return Ok(Mutation::none(()));
            }
            if let Some(id) = &tab_id {
                if !snapshot.tabs.contains_key(id) {
                    return Err(WorkbenchError::not_found(EntityKind::Tab, id));
                }
            }
            Ok(Mutation::commit(
                SessionPatch::new().active_tab_id(tab_id.clone()),
                vec![writes::active_tab(tab_id.as_ref())],
                (),
            ))
        })?;
        Ok(())
    }

    fn record_access(&self, snapshot: &SessionSnapshot, tab: &Tab) {
        match &tab.kind {
            TabKind::Script(script) => self.access.update_sql_script_last_used(&script.sql_script_id),
            TabKind::DataSource(DataSourceTab::File { data_source_id }) => {
                self.access.update_data_source_last_used(data_source_id)
            }
            TabKind::DataSource(DataSourceTab::Db {
                data_source_id,
                schema_name,
                object_name,
                ..
            }) => {
                self.access.update_data_source_last_used(data_source_id);
                if let Some(data_source) = snapshot.data_sources.get(data_source_id) {
                    self.access
                        .update_table_access_time(data_source.sql_name(), schema_name, object_name);
                }
            }
            TabKind::SchemaBrowser(_) | TabKind::Comparison(_) => {}
        }
    }

    /// Mark `tab_id` as the preview tab.
    ///
    /// Replacing an existing preview with a different tab deletes the old
    /// preview. Clearing the preview keeps the tab as a regular one.
    pub fn set_preview_tab_id(&self, tab_id: Option<TabId>) -> Result<()> {
        let (evicted, _) = self.try_apply(|snapshot| {
            if snapshot.preview_tab_id == tab_id {
                return Ok(Mutation::none(None));
            }
            if let Some(id) = &tab_id {
                if !snapshot.tabs.contains_key(id) {
                    return Err(WorkbenchError::not_found(EntityKind::Tab, id));
                }
            }

            let mutation = match (&snapshot.preview_tab_id, &tab_id) {
                (Some(old), Some(new)) => {
                    let result = delete_tabs(
                        std::slice::from_ref(old),
                        &snapshot.tabs,
                        &snapshot.tab_order,
                        snapshot.active_tab_id.as_ref(),
                        snapshot.preview_tab_id.as_ref(),
                    );
                    let mut ops = vec![writes::delete_tab(old)];
                    ops.extend(writes::put_tab_order(&result.order));
                    if result.active != snapshot.active_tab_id {
                        ops.push(writes::active_tab(result.active.as_ref()));
                    }
                    ops.push(writes::preview_tab(Some(new)));

                    let mut patch = SessionPatch::new()
                        .tabs(result.tabs)
                        .tab_order(result.order)
                        .active_tab_id(result.active)
                        .preview_tab_id(Some(new.clone()));
                    if snapshot.tab_execution_errors.contains_key(old) {
                        let mut errors = (*snapshot.tab_execution_errors).clone();
                        errors.remove(old);
                        patch = patch.tab_execution_errors(errors);
                    }

                    tracing::debug!(old_preview = %old, new_preview = %new, "preview tab replaced");
                    Mutation::commit(patch, ops, Some(old.clone()))
                }
                _ => Mutation::commit(
                    SessionPatch::new().preview_tab_id(tab_id.clone()),
                    vec![writes::preview_tab(tab_id.as_ref())],
                    None,
                ),
            };
            Ok(mutation)
        })?;
        if let Some(old) = evicted {
            self.forget_live_content(std::slice::from_ref(&old));
        }
        Ok(())
    }

    /// Replace the tab order. The new order must be a permutation of the
    /// existing tabs.
    pub fn set_tab_order(&self, order: Vec<TabId>) -> Result<()> {
        self.try_apply(|snapshot| {
            validate_tab_order(&order, &snapshot.tabs)?;
            if *snapshot.tab_order == order {
                return Ok(Mutation::none(()));
            }
            let ops = writes::put_tab_order(&order).into_iter().collect();
            Ok(Mutation::commit(SessionPatch::new().tab_order(order), ops, ()))
        })?;
        Ok(())
    }

    // ---- deletion ----

    /// Close tabs.
    ///
    /// Script tabs park their view state and get a version snapshot of their
    /// content (live editor content when registered) before they disappear.
    /// Versioning failures are logged and do not stop the deletion. The
    /// removal itself is computed against the store as it is when the
    /// snapshots are done, not as it was on entry.
    #[tracing::instrument(skip(self, tab_ids), fields(count = tab_ids.len()))]
    pub async fn delete_tab(&self, tab_ids: &[TabId]) {
        if tab_ids.is_empty() {
            return;
        }
        let _guard = DeletionGuard::mark(self, tab_ids);

        let pending_versions = self.park_script_state(tab_ids);

        if let Some(versioning) = &self.versioning {
            for (script_id, content) in pending_versions {
                match versioning
                    .save_version_if_content_differs(&script_id, &content, VersionOrigin::TabClose)
                    .await
                {
                    Ok(VersionSaveOutcome::Saved(version_id)) => {
                        tracing::debug!(script_id = %script_id, version_id = %version_id, "saved version on tab close");
                    }
                    Ok(VersionSaveOutcome::Unchanged) => {}
                    Err(e) => {
                        tracing::warn!(script_id = %script_id, error = %e, "failed to save version on tab close");
                    }
                }
            }
        }

        let (removed, _) = self.apply(|snapshot| remove_tabs(snapshot, tab_ids));
        if removed > 0 {
            tracing::debug!(removed, "tabs deleted");
        }
    }

    /// Park non-empty view states of script tabs and collect the content to
    /// snapshot for each of them
    fn park_script_state(&self, tab_ids: &[TabId]) -> Vec<(ScriptId, String)> {
        let snapshot = self.store.snapshot();
        let mut pending = Vec::new();

        for tab_id in tab_ids {
            let Some(tab) = snapshot.tabs.get(tab_id) else {
                continue;
            };
            let Some(script) = tab.as_script() else {
                continue;
            };
            let script_id = &script.sql_script_id;

            if let Some(cache) = tab
                .data_view_state_cache
                .as_ref()
                .filter(|cache| cache.has_restorable_state())
            {
                self.view_states.lock().insert(script_id.clone(), cache.clone());
            }

            let live = self.live_content.lock().get(tab_id).cloned();
            let content = live.or_else(|| {
                snapshot
                    .sql_scripts
                    .get(script_id)
                    .map(|stored| stored.content.clone())
            });
            if let Some(content) = content {
                pending.push((script_id.clone(), content));
            }
        }

        pending
    }

    /// Close the tab of a script, if it has one
    pub async fn delete_tab_by_script_id(&self, script_id: &ScriptId) -> bool {
        let found = find_tab_by_resource(
            &self.store.snapshot().tabs,
            &ResourceKey::Script(script_id.clone()),
        )
        .map(|tab| tab.id.clone());

        match found {
            Some(tab_id) => {
                self.delete_tab(&[tab_id]).await;
                true
            }
            None => false,
        }
    }

    /// Close every tab showing a data source
    pub async fn delete_tab_by_data_source_id(&self, data_source_id: &DataSourceId) -> bool {
        let tab_ids: Vec<TabId> = find_tabs_by_data_source(&self.store.snapshot().tabs, data_source_id)
            .into_iter()
            .map(|tab| tab.id.clone())
            .collect();

        if tab_ids.is_empty() {
            return false;
        }
        self.delete_tab(&tab_ids).await;
        true
    }

    // ---- editor coordination ----

    /// Record unsaved editor content; used for the version snapshot if the
    /// tab is closed before the content is saved
    pub fn register_live_script_content(&self, tab_id: &TabId, content: impl Into<String>) {
        self.live_content.lock().insert(tab_id.clone(), content.into());
    }

    pub fn clear_live_script_content(&self, tab_id: &TabId) {
        self.live_content.lock().remove(tab_id);
    }

    /// Drop live content of tabs removed without going through `delete_tab`
    pub(crate) fn forget_live_content(&self, tab_ids: &[TabId]) {
        let mut live_content = self.live_content.lock();
        for id in tab_ids {
            live_content.remove(id);
        }
    }

    /// Editors check this on unmount to skip their own version snapshot
    pub fn is_tab_being_deleted(&self, tab_id: &TabId) -> bool {
        self.being_deleted.lock().contains_key(tab_id)
    }

    // ---- execution errors ----

    pub fn set_tab_execution_error(&self, tab_id: &TabId, error: TabExecutionError) {
        self.store.update(|snapshot| {
            if !snapshot.tabs.contains_key(tab_id) {
                return None;
            }
            if snapshot.tab_execution_errors.get(tab_id) == Some(&error) {
                return None;
            }
            let mut errors = (*snapshot.tab_execution_errors).clone();
            errors.insert(tab_id.clone(), error);
            Some(SessionPatch::new().tab_execution_errors(errors))
        });
    }

    pub fn clear_tab_execution_error(&self, tab_id: &TabId) {
        self.store.update(|snapshot| {
            if !snapshot.tab_execution_errors.contains_key(tab_id) {
                return None;
            }
            let mut errors = (*snapshot.tab_execution_errors).clone();
            errors.remove(tab_id);
            Some(SessionPatch::new().tab_execution_errors(errors))
        });
    }

    pub fn clear_all_tab_execution_errors(&self) {
        self.store.update(|snapshot| {
            if snapshot.tab_execution_errors.is_empty() {
                return None;
            }
            Some(SessionPatch::new().tab_execution_errors(HashMap::new()))
        });
    }
}

/// Remove `tab_ids` from `snapshot` in one patch. Ids that are already gone
/// are skipped. Returns the number of tabs removed.
pub(crate) fn remove_tabs(snapshot: &SessionSnapshot, tab_ids: &[TabId]) -> Mutation<usize> {
    let present: Vec<TabId> = tab_ids
        .iter()
        .filter(|id| snapshot.tabs.contains_key(*id))
        .cloned()
        .collect();
    if present.is_empty() {
        return Mutation::none(0);
    }

    let result = delete_tabs(
        &present,
        &snapshot.tabs,
        &snapshot.tab_order,
        snapshot.active_tab_id.as_ref(),
        snapshot.preview_tab_id.as_ref(),
    );

    let mut ops: Vec<StoreOp> = present.iter().map(writes::delete_tab).collect();
    ops.extend(writes::put_tab_order(&result.order));
    if result.active != snapshot.active_tab_id {
        ops.push(writes::active_tab(result.active.as_ref()));
    }
    if result.preview != snapshot.preview_tab_id {
        ops.push(writes::preview_tab(result.preview.as_ref()));
    }

    let mut patch = SessionPatch::new()
        .tabs(result.tabs)
        .tab_order(result.order)
        .active_tab_id(result.active)
        .preview_tab_id(result.preview);

    if present
        .iter()
        .any(|id| snapshot.tab_execution_errors.contains_key(id))
    {
        let mut errors = (*snapshot.tab_execution_errors).clone();
        for id in &present {
            errors.remove(id);
        }
        patch = patch.tab_execution_errors(errors);
    }

    Mutation::commit(patch, ops, present.len())
}

/// Marks tabs as being deleted for the duration of a `delete_tab` call.
/// Dropping it releases the marks on every exit path; the last release of a
/// tab also drops its live content.
struct DeletionGuard<'a> {
    controller: &'a TabController,
    tab_ids: Vec<TabId>,
}

impl<'a> DeletionGuard<'a> {
    fn mark(controller: &'a TabController, tab_ids: &[TabId]) -> Self {
        let mut being_deleted = controller.being_deleted.lock();
        for id in tab_ids {
            *being_deleted.entry(id.clone()).or_insert(0) += 1;
        }
        drop(being_deleted);
        Self {
            controller,
            tab_ids: tab_ids.to_vec(),
        }
    }
}

impl Drop for DeletionGuard<'_> {
    fn drop(&mut self) {
        let mut being_deleted = self.controller.being_deleted.lock();
        let mut live_content = self.controller.live_content.lock();
        for id in &self.tab_ids {
            let Some(count) = being_deleted.get_mut(id) else {
                continue;
            };
            *count -= 1;
            if *count == 0 {
                being_deleted.remove(id);
                live_content.remove(id);
            }
        }
    }
}

fn with_script<F>(tab: &Tab, f: F) -> Tab
where
    F: FnOnce(&mut ScriptTab),
{
    let mut updated = tab.clone();
    if let TabKind::Script(script) = &mut updated.kind {
        f(script);
    }
    updated
}

pub(crate) fn report_type_mismatch(tab: &Tab, expected: &'static str, operation: &str) {
    let error = WorkbenchError::TypeMismatch {
        tab_id: tab.id.to_string(),
        expected,
        actual: tab.kind.name(),
    };
    tracing::warn!(operation, error = %error, "ignoring operation on wrong tab type");
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sqlbench_core::DataViewStateCache;

    fn controller_with_script() -> (TabController, SqlScript) {
        let script = SqlScript::new("query", "select 1");
        let store = Arc::new(SessionStore::new(SessionSnapshot {
            sql_scripts: Arc::new(HashMap::from([(script.id.clone(), script.clone())])),
            ..Default::default()
        }));
        (TabController::new(store, PersistenceHandle::detached()), script)
    }

    #[test]
    fn test_stale_data_update_converts_rows() {
        let update = StaleDataCacheUpdate {
            sort: Some(vec![ColumnSortSpec::asc("id")]),
            stale_data: Some(StaleDataUpdate {
                data: Some(vec![vec![("id".to_string(), serde_json::json!(1))]]),
                row_offset: Some(0),
                ..Default::default()
            }),
        };

        let patch = update.into_patch();
        let stale = patch.stale_data.unwrap().unwrap();
        let rows = stale.data.unwrap();
        assert_eq!(rows[0].get("id"), Some(&serde_json::json!(1)));
        assert_eq!(patch.sort, Some(Some(vec![ColumnSortSpec::asc("id")])));
    }

    #[test]
    fn test_layout_update_on_wrong_tab_type_is_ignored() {
        let (controller, _) = controller_with_script();
        let browser = controller.get_or_create_schema_browser_tab(SchemaBrowserTabOptions::new(
            SchemaBrowserSourceType::All,
        ));
        let revision = controller.store().revision();

        assert!(!controller.update_script_tab_layout(&browser.id, (0.3, 0.7)));
        assert_eq!(controller.store().revision(), revision);
    }

    #[test]
    fn test_forced_query_update_commits_unchanged_value() {
        let (controller, script) = controller_with_script();
        let tab = controller.get_or_create_tab_from_script(&script.id, false).unwrap();

        let update = UpdateLastExecutedQuery {
            tab_id: tab.id.clone(),
            last_executed_query: Some("select 1".into()),
            force: false,
        };
        assert!(controller.update_script_tab_last_executed_query(update.clone()));
        assert!(!controller.update_script_tab_last_executed_query(update.clone()));
        assert!(controller.update_script_tab_last_executed_query(UpdateLastExecutedQuery {
            force: true,
            ..update
        }));
    }

    #[test]
    fn test_new_script_tab_uses_default_split() {
        let (controller, script) = controller_with_script();
        let tab = controller.get_or_create_tab_for_script(&script, false);
        let script_tab = tab.as_script().unwrap();
        assert_eq!(
            (script_tab.editor_pane_height, script_tab.data_view_pane_height),
            DEFAULT_PANE_SPLIT
        );
        assert_eq!(tab.data_view_state_cache, None);
    }

    #[test]
    fn test_guard_clears_marks_and_live_content() {
        let (controller, _) = controller_with_script();
        let tab_id = TabId::new();
        controller.register_live_script_content(&tab_id, "select 2");

        {
            let _guard = DeletionGuard::mark(&controller, std::slice::from_ref(&tab_id));
            assert!(controller.is_tab_being_deleted(&tab_id));
        }

        assert!(!controller.is_tab_being_deleted(&tab_id));
        assert!(controller.live_content.lock().is_empty());
    }

    #[test]
    fn test_overlapping_guards_keep_mark_until_last_release() {
        let (controller, _) = controller_with_script();
        let tab_id = TabId::new();
        controller.register_live_script_content(&tab_id, "select 2");

        let first = DeletionGuard::mark(&controller, std::slice::from_ref(&tab_id));
        let second = DeletionGuard::mark(&controller, std::slice::from_ref(&tab_id));

        drop(first);
        assert!(controller.is_tab_being_deleted(&tab_id));
        assert!(controller.live_content.lock().contains_key(&tab_id));

        drop(second);
        assert!(!controller.is_tab_being_deleted(&tab_id));
        assert!(controller.live_content.lock().is_empty());
    }

    #[test]
    fn test_evicted_preview_drops_live_content() {
        let (controller, script) = controller_with_script();
        let script_tab = controller
            .get_or_create_tab_from_script(&script.id, false)
            .unwrap();
        let browser = controller.get_or_create_schema_browser_tab(SchemaBrowserTabOptions::new(
            SchemaBrowserSourceType::All,
        ));
        controller.register_live_script_content(&script_tab.id, "select 2");

        controller
            .set_preview_tab_id(Some(script_tab.id.clone()))
            .unwrap();
        controller.set_preview_tab_id(Some(browser.id)).unwrap();

        assert!(controller.get_tab(&script_tab.id).is_none());
        assert!(!controller.live_content.lock().contains_key(&script_tab.id));
    }

    #[test]
    fn test_execution_errors_require_existing_tab() {
        let (controller, script) = controller_with_script();
        controller.set_tab_execution_error(&TabId::new(), TabExecutionError::new("boom"));
        assert!(controller.store().snapshot().tab_execution_errors.is_empty());

        let tab = controller.get_or_create_tab_for_script(&script, false);
        controller.set_tab_execution_error(&tab.id, TabExecutionError::new("boom"));
        assert_eq!(controller.store().snapshot().tab_execution_errors.len(), 1);

        controller.clear_all_tab_execution_errors();
        assert!(controller.store().snapshot().tab_execution_errors.is_empty());
    }

    #[test]
    fn test_parked_state_is_not_restored_for_other_scripts() {
        let (controller, script) = controller_with_script();
        let other = ScriptId::new();
        controller.view_states.lock().insert(
            other.clone(),
            DataViewStateCache {
                view_mode: Some(ViewMode::Chart),
                ..Default::default()
            },
        );

        let tab = controller.get_or_create_tab_from_script(&script.id, false).unwrap();
        assert_eq!(tab.data_view_state_cache, None);
        assert!(controller.has_parked_view_state(&other));
    }
}
