//! Logical tables of the persistent store

use serde::{Deserialize, Serialize};

/// Content-view singleton key holding the active tab id
pub const ACTIVE_TAB_ID_KEY: &str = "activeTabId";
/// Content-view singleton key holding the preview tab id
pub const PREVIEW_TAB_ID_KEY: &str = "previewTabId";
/// Content-view singleton key holding the tab order
pub const TAB_ORDER_KEY: &str = "tabOrder";

/// One table per persisted entity kind
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StoreTable {
    /// Tab id -> tab record
    Tabs,
    /// Script id -> script record
    SqlScripts,
    /// Singleton keys: active tab, preview tab, tab order
    ContentView,
    /// Script id -> last used timestamp
    ScriptAccessTime,
    /// Data source id -> data source record
    DataSources,
    /// Data source id -> last used timestamp
    DataSourceAccessTime,
    /// `db.schema.table` -> last accessed timestamp
    TableAccessTime,
}

impl StoreTable {
    pub const ALL: [StoreTable; 7] = [
        StoreTable::Tabs,
        StoreTable::SqlScripts,
        StoreTable::ContentView,
        StoreTable::ScriptAccessTime,
        StoreTable::DataSources,
        StoreTable::DataSourceAccessTime,
        StoreTable::TableAccessTime,
    ];

    /// Table name used in the backing database
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreTable::Tabs => "tabs",
            StoreTable::SqlScripts => "sql_scripts",
            StoreTable::ContentView => "content_view",
            StoreTable::ScriptAccessTime => "script_access_time",
            StoreTable::DataSources => "data_sources",
            StoreTable::DataSourceAccessTime => "data_source_access_time",
            StoreTable::TableAccessTime => "table_access_time",
        }
    }
}

impl std::fmt::Display for StoreTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single write against the store
#[derive(Clone, Debug, PartialEq)]
pub enum StoreOp {
    Put {
        table: StoreTable,
        key: String,
        value: serde_json::Value,
    },
    Delete {
        table: StoreTable,
        key: String,
    },
}

impl StoreOp {
    pub fn put(table: StoreTable, key: impl Into<String>, value: serde_json::Value) -> Self {
        StoreOp::Put {
            table,
            key: key.into(),
            value,
        }
    }

    /// Put of a serialized value
    pub fn put_json<T: Serialize + ?Sized>(
        table: StoreTable,
        key: impl Into<String>,
        value: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::put(table, key, serde_json::to_value(value)?))
    }

    pub fn delete(table: StoreTable, key: impl Into<String>) -> Self {
        StoreOp::Delete {
            table,
            key: key.into(),
        }
    }

    pub fn table(&self) -> StoreTable {
        match self {
            StoreOp::Put { table, .. } | StoreOp::Delete { table, .. } => *table,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            StoreOp::Put { key, .. } | StoreOp::Delete { key, .. } => key,
        }
    }
}
