//! Session restore from the persistent store
//!
//! The store is an eventually consistent mirror, so a crash can leave it
//! slightly out of step with itself (an order entry for a tab whose put never
//! landed, a script tab whose script was deleted). Restoring repairs those
//! before the snapshot is handed to the session store, and writes the repairs
//! back so the next launch starts clean.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use sqlbench_core::{DataSource, DataSourceId, ResourceKey, ScriptId, SqlScript, Tab, TabId};
use sqlbench_storage::{
    ACTIVE_TAB_ID_KEY, PREVIEW_TAB_ID_KEY, PersistentStore, StorageResult, StoreOp, StoreTable,
    TAB_ORDER_KEY, report_persistence_failure,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::store::{AccessTimes, SessionSnapshot};
use crate::writes;

/// Load the last persisted session.
///
/// Undecodable rows are skipped with a warning. If a table cannot be read at
/// all the result is an empty session.
#[tracing::instrument(skip(store))]
pub async fn restore_session(store: &dyn PersistentStore) -> SessionSnapshot {
    match load_session(store).await {
        Ok(snapshot) => {
            tracing::info!(
                tabs = snapshot.tabs.len(),
                scripts = snapshot.sql_scripts.len(),
                data_sources = snapshot.data_sources.len(),
                "session restored"
            );
            snapshot
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to load session, starting empty");
            SessionSnapshot::default()
        }
    }
}

async fn load_session(store: &dyn PersistentStore) -> StorageResult<SessionSnapshot> {
    let scripts: HashMap<ScriptId, SqlScript> = decode_rows::<SqlScript>(store, StoreTable::SqlScripts)
        .await?
        .into_iter()
        .map(|script| (script.id.clone(), script))
        .collect();

    let data_sources: HashMap<DataSourceId, DataSource> =
        decode_rows::<DataSource>(store, StoreTable::DataSources)
            .await?
            .into_iter()
            .map(|source| (source.id().clone(), source))
            .collect();

    let tabs = decode_rows::<Tab>(store, StoreTable::Tabs).await?;

    let content_view: HashMap<String, serde_json::Value> =
        store.load_all(StoreTable::ContentView).await?.into_iter().collect();
    let stored_order: Vec<TabId> = content_view
        .get(TAB_ORDER_KEY)
        .and_then(|value| decode(TAB_ORDER_KEY, value.clone()))
        .unwrap_or_default();
    let active = content_view
        .get(ACTIVE_TAB_ID_KEY)
        .and_then(|value| decode::<TabId>(ACTIVE_TAB_ID_KEY, value.clone()));
    let preview = content_view
        .get(PREVIEW_TAB_ID_KEY)
        .and_then(|value| decode::<TabId>(PREVIEW_TAB_ID_KEY, value.clone()));

    let access_times = AccessTimes {
        scripts: decode_keyed(store, StoreTable::ScriptAccessTime).await?,
        data_sources: decode_keyed(store, StoreTable::DataSourceAccessTime).await?,
        tables: decode_keyed(store, StoreTable::TableAccessTime).await?,
    };

    let RepairedTabs {
        tabs,
        order: tab_order,
        dropped,
    } = repair_tabs(tabs, &stored_order, &scripts);
    let active_tab_id = active.clone().filter(|id| tabs.contains_key(id));
    let preview_tab_id = preview.clone().filter(|id| tabs.contains_key(id));

    let mut repairs: Vec<StoreOp> = dropped.iter().map(writes::delete_tab).collect();
    if tab_order != stored_order {
        repairs.extend(writes::put_tab_order(&tab_order));
    }
    if active_tab_id != active {
        repairs.push(writes::active_tab(None));
    }
    if preview_tab_id != preview {
        repairs.push(writes::preview_tab(None));
    }
    if !repairs.is_empty() {
        tracing::info!(dropped_tabs = dropped.len(), ops = repairs.len(), "writing back session repairs");
        if let Err(e) = store.transaction(&repairs).await {
            report_persistence_failure("session repair", &e);
        }
    }

    Ok(SessionSnapshot {
        tabs: Arc::new(tabs),
        tab_order: Arc::new(tab_order),
        active_tab_id,
        preview_tab_id,
        sql_scripts: Arc::new(scripts),
        data_sources: Arc::new(data_sources),
        tab_execution_errors: Arc::default(),
        access_times: Arc::new(access_times),
    })
}

pub(crate) struct RepairedTabs {
    pub tabs: HashMap<TabId, Tab>,
    pub order: Vec<TabId>,
    /// Stored tab rows that did not survive
    pub dropped: Vec<TabId>,
}

/// Drop script tabs without a script and duplicate tabs for one resource,
/// then rebuild the order: stored order first (known tabs only, no
/// duplicates), then any tab the order missed
pub(crate) fn repair_tabs(
    tabs: Vec<Tab>,
    stored_order: &[TabId],
    scripts: &HashMap<ScriptId, SqlScript>,
) -> RepairedTabs {
    let position: HashMap<&TabId, usize> = stored_order
        .iter()
        .enumerate()
        .rev()
        .map(|(i, id)| (id, i))
        .collect();

    // Tabs listed in the order win over unlisted duplicates
    let mut candidates = tabs;
    candidates.sort_by(|a, b| {
        let pa = position.get(&a.id).copied().unwrap_or(usize::MAX);
        let pb = position.get(&b.id).copied().unwrap_or(usize::MAX);
        pa.cmp(&pb).then_with(|| a.id.to_string().cmp(&b.id.to_string()))
    });

    let mut seen_resources: HashSet<ResourceKey> = HashSet::new();
    let mut kept: HashMap<TabId, Tab> = HashMap::new();
    let mut order: Vec<TabId> = Vec::new();
    let mut dropped: Vec<TabId> = Vec::new();

    for tab in candidates {
        if let Some(script_id) = tab.script_id() {
            if !scripts.contains_key(script_id) {
                tracing::warn!(tab_id = %tab.id, script_id = %script_id, "dropping tab of missing script");
                dropped.push(tab.id.clone());
                continue;
            }
        }
        if let Some(key) = tab.resource_key() {
            if !seen_resources.insert(normalize(key)) {
                tracing::warn!(tab_id = %tab.id, "dropping duplicate tab");
                dropped.push(tab.id.clone());
                continue;
            }
        }
        if kept.contains_key(&tab.id) {
            continue;
        }
        order.push(tab.id.clone());
        kept.insert(tab.id.clone(), tab);
    }

    RepairedTabs {
        tabs: kept,
        order,
        dropped,
    }
}

fn normalize(key: ResourceKey) -> ResourceKey {
    match key {
        ResourceKey::SchemaBrowser {
            source_id,
            source_type,
            schema_name,
            object_names,
        } => ResourceKey::schema_browser(source_id, source_type, schema_name, object_names.as_deref()),
        other => other,
    }
}

async fn decode_rows<T: DeserializeOwned>(
    store: &dyn PersistentStore,
    table: StoreTable,
) -> StorageResult<Vec<T>> {
    Ok(store
        .load_all(table)
        .await?
        .into_iter()
        .filter_map(|(key, value)| decode(&format!("{}/{}", table, key), value))
        .collect())
}

async fn decode_keyed<K>(
    store: &dyn PersistentStore,
    table: StoreTable,
) -> StorageResult<HashMap<K, DateTime<Utc>>>
where
    K: std::str::FromStr + std::hash::Hash + Eq,
{
    Ok(store
        .load_all(table)
        .await?
        .into_iter()
        .filter_map(|(key, value)| {
            let at = decode::<DateTime<Utc>>(&format!("{}/{}", table, key), value)?;
            let key = key.parse::<K>().ok()?;
            Some((key, at))
        })
        .collect())
}

fn decode<T: DeserializeOwned>(what: &str, value: serde_json::Value) -> Option<T> {
    match serde_json::from_value(value) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            tracing::warn!(row = %what, error = %e, "skipping undecodable row");
            None
        }
    }
}
