//! Pure functions over tab maps, orders and pointers
//!
//! Nothing here touches the session store. Every function takes its inputs
//! by reference and returns fresh values, which is what lets the controllers
//! compute a complete patch before committing anything.

use sqlbench_core::{
    DataSourceId, DataViewStateCache, DataViewStateCachePatch, ResourceKey, ScriptId, SqlScript,
    StaleData, StaleDataPatch, Tab, TabId, TabKind, WorkbenchError,
};
use std::collections::{HashMap, HashSet};

/// Result of [`delete_tabs`]
#[derive(Clone, Debug, PartialEq)]
pub struct DeleteTabsResult {
    pub tabs: HashMap<TabId, Tab>,
    pub order: Vec<TabId>,
    pub active: Option<TabId>,
    pub preview: Option<TabId>,
}

/// Remove `delete_ids` from the map and order in one step.
///
/// If the active tab goes away, the closest surviving predecessor in the
/// original order becomes active; with no surviving predecessor the first
/// survivor does; with no survivors nothing is active. A deleted preview is
/// cleared, never re-targeted.
pub fn delete_tabs(
    delete_ids: &[TabId],
    tabs: &HashMap<TabId, Tab>,
    order: &[TabId],
    active: Option<&TabId>,
    preview: Option<&TabId>,
) -> DeleteTabsResult {
    let doomed: HashSet<&TabId> = delete_ids.iter().collect();

    let new_tabs: HashMap<TabId, Tab> = tabs
        .iter()
        .filter(|(id, _)| !doomed.contains(id))
        .map(|(id, tab)| (id.clone(), tab.clone()))
        .collect();

    let new_order: Vec<TabId> = order
        .iter()
        .filter(|id| !doomed.contains(id))
        .cloned()
        .collect();

    let new_active = match active {
        Some(active) if doomed.contains(active) => {
            let position = order.iter().position(|id| id == active);
            let predecessor = position.and_then(|pos| {
                order[..pos]
                    .iter()
                    .rev()
                    .find(|id| !doomed.contains(id))
                    .cloned()
            });
            predecessor.or_else(|| new_order.first().cloned())
        }
        other => other.cloned(),
    };

    let new_preview = match preview {
        Some(preview) if doomed.contains(preview) => None,
        other => other.cloned(),
    };

    DeleteTabsResult {
        tabs: new_tabs,
        order: new_order,
        active: new_active,
        preview: new_preview,
    }
}

/// The tab owning `key`, if any
pub fn find_tab_by_resource<'a>(
    tabs: &'a HashMap<TabId, Tab>,
    key: &ResourceKey,
) -> Option<&'a Tab> {
    tabs.values()
        .find(|tab| tab.resource_key().as_ref().is_some_and(|k| matches_key(k, key)))
}

fn matches_key(tab_key: &ResourceKey, wanted: &ResourceKey) -> bool {
    match (tab_key, wanted) {
        (
            ResourceKey::SchemaBrowser {
                source_id: a_source,
                source_type: a_type,
                schema_name: a_schema,
                object_names: a_names,
            },
            ResourceKey::SchemaBrowser {
                source_id: b_source,
                source_type: b_type,
                schema_name: b_schema,
                object_names: b_names,
            },
        ) => {
            a_source == b_source
                && a_type == b_type
                && a_schema == b_schema
                && match (a_names, b_names) {
                    (Some(a), Some(b)) => {
                        sqlbench_core::sorted_names(a) == sqlbench_core::sorted_names(b)
                    }
                    (None, None) => true,
                    _ => false,
                }
        }
        _ => tab_key == wanted,
    }
}

/// Every tab that shows `data_source_id`: file and db data-source tabs plus
/// schema browsers rooted at it
pub fn find_tabs_by_data_source<'a>(
    tabs: &'a HashMap<TabId, Tab>,
    data_source_id: &DataSourceId,
) -> Vec<&'a Tab> {
    let source_key = data_source_id.to_string();
    tabs.values()
        .filter(|tab| match &tab.kind {
            TabKind::DataSource(ds) => ds.data_source_id() == data_source_id,
            TabKind::SchemaBrowser(browser) => {
                browser.source_id.as_deref() == Some(source_key.as_str())
            }
            TabKind::Script(_) | TabKind::Comparison(_) => false,
        })
        .collect()
}

/// Shallow merge of `patch` into `current` (or a fresh cache).
/// `stale_data` merges its own sub-fields.
pub fn merge_data_view_state_cache(
    current: Option<&DataViewStateCache>,
    patch: DataViewStateCachePatch,
) -> DataViewStateCache {
    let mut merged = current.cloned().unwrap_or_default();

    if let Some(sort) = patch.sort {
        merged.sort = sort;
    }
    if let Some(column_sizes) = patch.column_sizes {
        merged.column_sizes = column_sizes;
    }
    if let Some(page) = patch.data_view_page {
        merged.data_view_page = page;
    }
    if let Some(stale) = patch.stale_data {
        merged.stale_data = stale.map(|stale| merge_stale_data(merged.stale_data.take(), stale));
    }
    if let Some(chart_config) = patch.chart_config {
        merged.chart_config = chart_config;
    }
    if let Some(view_mode) = patch.view_mode {
        merged.view_mode = view_mode;
    }

    merged
}

fn merge_stale_data(current: Option<StaleData>, patch: StaleDataPatch) -> StaleData {
    let mut merged = current.unwrap_or_default();
    if let Some(schema) = patch.schema {
        merged.schema = schema;
    }
    if let Some(data) = patch.data {
        merged.data = data;
    }
    if let Some(row_offset) = patch.row_offset {
        merged.row_offset = row_offset;
    }
    if let Some(real) = patch.real_row_count {
        merged.real_row_count = real;
    }
    if let Some(estimated) = patch.estimated_row_count {
        merged.estimated_row_count = estimated;
    }
    merged
}

/// Set difference on the script map
pub fn delete_scripts(
    ids: &[ScriptId],
    scripts: &HashMap<ScriptId, SqlScript>,
) -> HashMap<ScriptId, SqlScript> {
    let doomed: HashSet<&ScriptId> = ids.iter().collect();
    scripts
        .iter()
        .filter(|(id, _)| !doomed.contains(id))
        .map(|(id, script)| (id.clone(), script.clone()))
        .collect()
}

/// Check that `order` is a duplicate-free permutation of the tab map's keys
pub fn validate_tab_order(
    order: &[TabId],
    tabs: &HashMap<TabId, Tab>,
) -> Result<(), WorkbenchError> {
    let mut seen = HashSet::with_capacity(order.len());
    for id in order {
        if !tabs.contains_key(id) {
            return Err(WorkbenchError::InvalidTabOrder(format!("unknown tab {}", id)));
        }
        if !seen.insert(id) {
            return Err(WorkbenchError::InvalidTabOrder(format!("duplicate tab {}", id)));
        }
    }
    if seen.len() != tabs.len() {
        return Err(WorkbenchError::InvalidTabOrder(format!(
            "order lists {} of {} tabs",
            seen.len(),
            tabs.len()
        )));
    }
    Ok(())
}

/// Names held by scripts and comparison tabs, minus the entity being renamed
pub fn names_in_use<'a>(
    scripts: &'a HashMap<ScriptId, SqlScript>,
    tabs: &'a HashMap<TabId, Tab>,
    skip_script: Option<&ScriptId>,
    skip_tab: Option<&TabId>,
) -> Vec<&'a str> {
    let script_names = scripts
        .values()
        .filter(|script| Some(&script.id) != skip_script)
        .map(|script| script.name.as_str());
    let comparison_names = tabs
        .values()
        .filter(|tab| Some(&tab.id) != skip_tab)
        .filter_map(|tab| tab.as_comparison())
        .map(|comparison| comparison.name.as_str());
    script_names.chain(comparison_names).collect()
}

/// `base` if free, otherwise the first free `base_N` counting from 1
pub fn unique_name<'a, I>(base: &str, taken: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let taken: HashSet<&str> = taken.into_iter().collect();
    if !taken.contains(base) {
        return base.to_string();
    }
    (1..)
        .map(|n| format!("{}_{}", base, n))
        .find(|candidate| !taken.contains(candidate.as_str()))
        .unwrap_or_else(|| base.to_string())
}
