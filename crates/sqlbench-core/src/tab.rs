//! Tabs and the logical resources they point at

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::comparison::{ComparisonConfig, SchemaComparisonResult};
use crate::data_view::DataViewStateCache;
use crate::ids::{ComparisonId, DataSourceId, ScriptId, TabId};

/// A database object a data-source tab can show
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    Table,
    View,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Table => "table",
            ObjectType::View => "view",
        }
    }
}

/// What a schema browser tab is scoped to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaBrowserSourceType {
    File,
    Db,
    Folder,
    All,
}

/// Script tab: an editor bound to a SQL script plus its result view
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptTab {
    pub sql_script_id: ScriptId,
    pub last_executed_query: Option<String>,
    /// Editor pane height in pixels; 0 lets the UI pick
    pub editor_pane_height: f64,
    pub data_view_pane_height: f64,
}

/// Data-source tab: shows a flat file view or a single database object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "dataSourceType", rename_all = "camelCase")]
pub enum DataSourceTab {
    #[serde(rename_all = "camelCase")]
    File { data_source_id: DataSourceId },
    #[serde(rename_all = "camelCase")]
    Db {
        data_source_id: DataSourceId,
        schema_name: String,
        object_name: String,
        object_type: ObjectType,
    },
}

impl DataSourceTab {
    pub fn data_source_id(&self) -> &DataSourceId {
        match self {
            DataSourceTab::File { data_source_id } => data_source_id,
            DataSourceTab::Db { data_source_id, .. } => data_source_id,
        }
    }
}

/// Schema browser tab
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaBrowserTab {
    pub source_id: Option<String>,
    pub source_type: SchemaBrowserSourceType,
    pub schema_name: Option<String>,
    /// Kept sorted so the list compares as a set
    pub object_names: Option<Vec<String>>,
}

/// Comparison tab
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonTab {
    pub comparison_id: ComparisonId,
    pub name: String,
    pub config: Option<ComparisonConfig>,
    pub schema_comparison: Option<SchemaComparisonResult>,
    /// `true` while looking at results, `false` while configuring
    pub viewing_results: bool,
    pub last_execution_time: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TabKind {
    Script(ScriptTab),
    DataSource(DataSourceTab),
    SchemaBrowser(SchemaBrowserTab),
    Comparison(ComparisonTab),
}

impl TabKind {
    pub fn name(&self) -> &'static str {
        match self {
            TabKind::Script(_) => "script",
            TabKind::DataSource(_) => "data-source",
            TabKind::SchemaBrowser(_) => "schema-browser",
            TabKind::Comparison(_) => "comparison",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    pub id: TabId,
    pub data_view_state_cache: Option<DataViewStateCache>,
    #[serde(flatten)]
    pub kind: TabKind,
}

impl Tab {
    pub fn new(id: TabId, kind: TabKind) -> Self {
        Self {
            id,
            data_view_state_cache: None,
            kind,
        }
    }

    pub fn as_script(&self) -> Option<&ScriptTab> {
        match &self.kind {
            TabKind::Script(script) => Some(script),
            _ => None,
        }
    }

    pub fn as_comparison(&self) -> Option<&ComparisonTab> {
        match &self.kind {
            TabKind::Comparison(comparison) => Some(comparison),
            _ => None,
        }
    }

    pub fn script_id(&self) -> Option<&ScriptId> {
        self.as_script().map(|script| &script.sql_script_id)
    }

    /// The logical resource this tab is deduplicated on, if any.
    /// Comparison tabs are never deduplicated.
    pub fn resource_key(&self) -> Option<ResourceKey> {
        match &self.kind {
            TabKind::Script(script) => Some(ResourceKey::Script(script.sql_script_id.clone())),
            TabKind::DataSource(DataSourceTab::File { data_source_id }) => {
                Some(ResourceKey::FlatFile(data_source_id.clone()))
            }
            TabKind::DataSource(DataSourceTab::Db {
                data_source_id,
                schema_name,
                object_name,
                ..
            }) => Some(ResourceKey::DbObject {
                data_source_id: data_source_id.clone(),
                schema_name: schema_name.clone(),
                object_name: object_name.clone(),
            }),
            TabKind::SchemaBrowser(browser) => Some(ResourceKey::SchemaBrowser {
                source_id: browser.source_id.clone(),
                source_type: browser.source_type,
                schema_name: browser.schema_name.clone(),
                object_names: browser.object_names.clone(),
            }),
            TabKind::Comparison(_) => None,
        }
    }
}

/// Key identifying the logical resource behind a tab.
///
/// At most one tab may exist per key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKey {
    Script(ScriptId),
    FlatFile(DataSourceId),
    DbObject {
        data_source_id: DataSourceId,
        schema_name: String,
        object_name: String,
    },
    SchemaBrowser {
        source_id: Option<String>,
        source_type: SchemaBrowserSourceType,
        schema_name: Option<String>,
        object_names: Option<Vec<String>>,
    },
}

impl ResourceKey {
    /// Schema browser key with `object_names` normalized into a sorted copy
    pub fn schema_browser(
        source_id: Option<String>,
        source_type: SchemaBrowserSourceType,
        schema_name: Option<String>,
        object_names: Option<&[String]>,
    ) -> Self {
        ResourceKey::SchemaBrowser {
            source_id,
            source_type,
            schema_name,
            object_names: object_names.map(sorted_names),
        }
    }
}

/// Sorted copy of an object name list
pub fn sorted_names(names: &[String]) -> Vec<String> {
    let mut sorted = names.to_vec();
    sorted.sort();
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_script_tab_serializes_with_type_tag() {
        let script_id = ScriptId::new();
        let tab = Tab::new(
            TabId::new(),
            TabKind::Script(ScriptTab {
                sql_script_id: script_id.clone(),
                last_executed_query: None,
                editor_pane_height: 0.0,
                data_view_pane_height: 0.0,
            }),
        );

        let value = serde_json::to_value(&tab).unwrap();
        assert_eq!(value["type"], json!("script"));
        assert_eq!(value["sqlScriptId"], json!(script_id.to_string()));

        let back: Tab = serde_json::from_value(value).unwrap();
        assert_eq!(back, tab);
    }

    #[test]
    fn test_db_tab_carries_data_source_subtype() {
        let tab = Tab::new(
            TabId::new(),
            TabKind::DataSource(DataSourceTab::Db {
                data_source_id: DataSourceId::new(),
                schema_name: "main".into(),
                object_name: "orders".into(),
                object_type: ObjectType::View,
            }),
        );

        let value = serde_json::to_value(&tab).unwrap();
        assert_eq!(value["type"], json!("data-source"));
        assert_eq!(value["dataSourceType"], json!("db"));
        assert_eq!(value["objectType"], json!("view"));
    }

    #[test]
    fn test_schema_browser_key_sorts_object_names() {
        let names = vec!["b".to_string(), "a".to_string()];
        let key = ResourceKey::schema_browser(
            None,
            SchemaBrowserSourceType::All,
            None,
            Some(&names),
        );
        match key {
            ResourceKey::SchemaBrowser { object_names, .. } => {
                assert_eq!(object_names, Some(vec!["a".to_string(), "b".to_string()]));
            }
            other => panic!("unexpected key {:?}", other),
        }
    }
}
