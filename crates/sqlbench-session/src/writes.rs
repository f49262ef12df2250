//! Store operations for session entities

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlbench_core::{DataSource, SqlScript, Tab, TabId};
use sqlbench_storage::{
    ACTIVE_TAB_ID_KEY, PREVIEW_TAB_ID_KEY, StorageError, StoreOp, StoreTable, TAB_ORDER_KEY,
    report_persistence_failure,
};

fn put_json<T: Serialize + ?Sized>(table: StoreTable, key: String, value: &T) -> Option<StoreOp> {
    match StoreOp::put_json(table, key.as_str(), value) {
        Ok(op) => Some(op),
        Err(e) => {
            report_persistence_failure(
                &format!("serialize {}/{}", table, key),
                &StorageError::Serialization(e),
            );
            None
        }
    }
}

pub(crate) fn put_tab(tab: &Tab) -> Option<StoreOp> {
    put_json(StoreTable::Tabs, tab.id.to_string(), tab)
}

pub(crate) fn delete_tab(tab_id: &TabId) -> StoreOp {
    StoreOp::delete(StoreTable::Tabs, tab_id.to_string())
}

pub(crate) fn put_tab_order(order: &[TabId]) -> Option<StoreOp> {
    put_json(StoreTable::ContentView, TAB_ORDER_KEY.to_string(), order)
}

pub(crate) fn active_tab(tab_id: Option<&TabId>) -> StoreOp {
    pointer(ACTIVE_TAB_ID_KEY, tab_id)
}

pub(crate) fn preview_tab(tab_id: Option<&TabId>) -> StoreOp {
    pointer(PREVIEW_TAB_ID_KEY, tab_id)
}

fn pointer(key: &str, tab_id: Option<&TabId>) -> StoreOp {
    match tab_id {
        Some(id) => StoreOp::put(
            StoreTable::ContentView,
            key,
            serde_json::Value::String(id.to_string()),
        ),
        None => StoreOp::delete(StoreTable::ContentView, key),
    }
}

pub(crate) fn put_script(script: &SqlScript) -> Option<StoreOp> {
    put_json(StoreTable::SqlScripts, script.id.to_string(), script)
}

pub(crate) fn put_data_source(data_source: &DataSource) -> Option<StoreOp> {
    put_json(StoreTable::DataSources, data_source.id().to_string(), data_source)
}

pub(crate) fn put_access_time(table: StoreTable, key: String, at: DateTime<Utc>) -> Option<StoreOp> {
    put_json(table, key, &at)
}
