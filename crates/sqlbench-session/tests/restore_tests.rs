//! Session persistence round trips through `Workbench`

mod common;

use common::RecordingVersioning;
use pretty_assertions::assert_eq;
use serde_json::json;
use sqlbench_core::{
    DataSource, DataSourceId, DatabaseKind, ObjectType, ScriptId, ScriptVersioning, TabId,
};
use sqlbench_session::{Workbench, WorkbenchOptions, restore_session};
use sqlbench_storage::{
    ACTIVE_TAB_ID_KEY, MemoryStore, PersistentStore, SqliteStore, StoreTable, TAB_ORDER_KEY,
};
use std::sync::Arc;

async fn open(backend: Arc<dyn PersistentStore>) -> Workbench {
    let versioning: Arc<dyn ScriptVersioning> = Arc::new(RecordingVersioning::new());
    Workbench::open(backend, Some(versioning), WorkbenchOptions::default()).await
}

#[tokio::test]
async fn test_session_survives_reopen() {
    let backend = Arc::new(MemoryStore::new());

    let (script_id, script_tab, table_tab) = {
        let workbench = open(backend.clone()).await;
        let script = workbench
            .scripts()
            .create_sql_script(Some("orders report"), "select * from orders");
        let db = workbench.data_sources().add_data_source(DataSource::Database {
            id: DataSourceId::new(),
            db_name: "warehouse".into(),
            kind: DatabaseKind::Local,
        });
        let script_tab = workbench
            .tabs()
            .get_or_create_tab_from_script(&script.id, false)
            .expect("script tab");
        let table_tab = workbench
            .tabs()
            .get_or_create_tab_from_local_db_object(db.id(), "main", "orders", ObjectType::Table, true)
            .expect("table tab");
        workbench.shutdown().await;
        (script.id, script_tab.id, table_tab.id)
    };

    let workbench = open(backend).await;
    let snapshot = workbench.store().snapshot();
    assert_eq!(*snapshot.tab_order, vec![script_tab, table_tab.clone()]);
    assert_eq!(snapshot.active_tab_id, Some(table_tab));
    assert_eq!(
        workbench
            .scripts()
            .get_sql_script(&script_id)
            .map(|script| script.name),
        Some("orders report".to_string())
    );
    assert_eq!(workbench.data_sources().list_data_sources().len(), 1);
    assert!(workbench
        .access()
        .table_last_accessed("warehouse", "main", "orders")
        .is_some());
}

#[tokio::test]
async fn test_restore_repairs_inconsistent_store() {
    let backend = MemoryStore::new();
    let dangling = TabId::new();
    let orphan = TabId::new();

    backend
        .put(
            StoreTable::Tabs,
            &orphan.to_string(),
            &json!({
                "id": orphan.to_string(),
                "type": "script",
                "sqlScriptId": ScriptId::new().to_string(),
                "editorPaneHeight": 0.5,
                "dataViewPaneHeight": 0.5
            }),
        )
        .await
        .expect("put tab");
    backend
        .put(
            StoreTable::ContentView,
            TAB_ORDER_KEY,
            &json!([dangling.to_string(), orphan.to_string()]),
        )
        .await
        .expect("put order");
    backend
        .put(StoreTable::ContentView, ACTIVE_TAB_ID_KEY, &json!(dangling.to_string()))
        .await
        .expect("put active");
    backend
        .put(StoreTable::SqlScripts, "garbage", &json!({ "not": "a script" }))
        .await
        .expect("put garbage");

    let snapshot = restore_session(&backend).await;

    assert!(snapshot.tabs.is_empty());
    assert!(snapshot.tab_order.is_empty());
    assert_eq!(snapshot.active_tab_id, None);
    assert!(snapshot.sql_scripts.is_empty());

    // The repairs are written back
    assert_eq!(backend.get(StoreTable::Tabs, &orphan.to_string()), None);
    assert_eq!(backend.get(StoreTable::ContentView, TAB_ORDER_KEY), Some(json!([])));
    assert_eq!(backend.get(StoreTable::ContentView, ACTIVE_TAB_ID_KEY), None);
}

#[tokio::test]
async fn test_consistent_store_is_not_rewritten() {
    let backend = Arc::new(MemoryStore::new());
    {
        let workbench = open(backend.clone()).await;
        let script = workbench.scripts().create_sql_script(None, "select 1");
        workbench
            .tabs()
            .get_or_create_tab_from_script(&script.id, true)
            .expect("tab");
        workbench.shutdown().await;
    }

    let writes_before = backend.operation_count();
    restore_session(backend.as_ref()).await;
    assert_eq!(backend.operation_count(), writes_before);
}

#[tokio::test]
async fn test_restore_disabled_starts_empty() {
    let backend = Arc::new(MemoryStore::new());
    {
        let workbench = open(backend.clone()).await;
        workbench.scripts().create_sql_script(None, "select 1");
        workbench.shutdown().await;
    }

    let workbench = Workbench::open(
        backend,
        None,
        WorkbenchOptions {
            restore_on_startup: false,
            ..Default::default()
        },
    )
    .await;
    assert!(workbench.scripts().list_sql_scripts().is_empty());
}

#[tokio::test]
async fn test_sqlite_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("session.db");

    let tab_id = {
        let store = SqliteStore::with_path(&path).expect("open store");
        let workbench = open(Arc::new(store)).await;
        let script = workbench.scripts().create_sql_script(None, "select 42");
        let tab = workbench
            .tabs()
            .get_or_create_tab_from_script(&script.id, true)
            .expect("tab");
        workbench.tabs().update_tab_data_view_data_page_cache(&tab.id, 4);
        workbench.shutdown().await;
        tab.id
    };

    let store = SqliteStore::with_path(&path).expect("reopen store");
    let workbench = open(Arc::new(store)).await;
    let tab = workbench.tabs().get_tab(&tab_id).expect("restored tab");
    assert_eq!(
        tab.data_view_state_cache
            .and_then(|cache| cache.data_view_page),
        Some(4)
    );
    assert_eq!(workbench.store().snapshot().active_tab_id, Some(tab_id));
}
