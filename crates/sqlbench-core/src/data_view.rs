//! Cached presentation state of a tab's data view
//!
//! The cache lets a tab re-render instantly (sort, column widths, the last page
//! of rows it showed) while a fresh query result is still being fetched.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single result row in plain, serializable form
pub type DataRow = serde_json::Map<String, serde_json::Value>;

/// Conversion from engine-native rows into [`DataRow`].
///
/// Engine rows usually borrow from a result buffer and cannot be stored as-is,
/// so anything written into the stale-data cache goes through this trait first.
pub trait ToDataRow {
    fn to_data_row(&self) -> DataRow;
}

impl ToDataRow for DataRow {
    fn to_data_row(&self) -> DataRow {
        self.clone()
    }
}

impl ToDataRow for Vec<(String, serde_json::Value)> {
    fn to_data_row(&self) -> DataRow {
        self.iter().cloned().collect()
    }
}

impl ToDataRow for serde_json::Value {
    fn to_data_row(&self) -> DataRow {
        match self {
            serde_json::Value::Object(map) => map.clone(),
            other => {
                let mut row = DataRow::new();
                row.insert("value".to_string(), other.clone());
                row
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Sort applied to one column of the data view
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSortSpec {
    pub column: String,
    pub order: SortOrder,
}

impl ColumnSortSpec {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            order: SortOrder::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            order: SortOrder::Desc,
        }
    }
}

/// Column description carried along with stale rows
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMeta {
    pub name: String,
    pub sql_type: String,
    pub nullable: bool,
}

/// Snapshot of the last rendered rows, shown optimistically on re-open
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaleData {
    pub schema: Vec<ColumnMeta>,
    pub data: Vec<DataRow>,
    pub row_offset: u64,
    pub real_row_count: Option<u64>,
    pub estimated_row_count: Option<u64>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Table,
    Chart,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    #[default]
    Bar,
    Line,
    Area,
    Scatter,
    Pie,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartAggregation {
    #[default]
    None,
    Sum,
    Avg,
    Count,
    Min,
    Max,
}

/// Chart configuration of a data view
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChartConfig {
    pub chart_type: ChartType,
    pub x_axis_column: Option<String>,
    pub y_axis_columns: Vec<String>,
    pub group_by_column: Option<String>,
    pub aggregation: ChartAggregation,
    pub title: Option<String>,
    pub x_axis_label: Option<String>,
    pub y_axis_label: Option<String>,
}

/// Per-tab presentation cache; every field is optional and independently updatable
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataViewStateCache {
    pub sort: Option<Vec<ColumnSortSpec>>,
    pub column_sizes: Option<BTreeMap<String, f64>>,
    pub data_view_page: Option<u64>,
    pub stale_data: Option<StaleData>,
    pub chart_config: Option<ChartConfig>,
    pub view_mode: Option<ViewMode>,
}

impl DataViewStateCache {
    /// Whether the cache holds anything worth restoring later.
    ///
    /// Only user-chosen presentation counts: chart config, view mode, column
    /// sizes or a non-empty sort. Stale rows and page cursors are not kept.
    pub fn has_restorable_state(&self) -> bool {
        self.chart_config.is_some()
            || self.view_mode.is_some()
            || self
                .column_sizes
                .as_ref()
                .is_some_and(|sizes| !sizes.is_empty())
            || self.sort.as_ref().is_some_and(|sort| !sort.is_empty())
    }
}

/// Partial update of [`StaleData`]; `None` leaves a sub-field untouched
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StaleDataPatch {
    pub schema: Option<Vec<ColumnMeta>>,
    pub data: Option<Vec<DataRow>>,
    pub row_offset: Option<u64>,
    pub real_row_count: Option<Option<u64>>,
    pub estimated_row_count: Option<Option<u64>>,
}

/// Partial update of [`DataViewStateCache`].
///
/// The outer `Option` says whether the field is touched at all, the inner value
/// is what it becomes (`Some(None)` clears it).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DataViewStateCachePatch {
    pub sort: Option<Option<Vec<ColumnSortSpec>>>,
    pub column_sizes: Option<Option<BTreeMap<String, f64>>>,
    pub data_view_page: Option<Option<u64>>,
    pub stale_data: Option<Option<StaleDataPatch>>,
    pub chart_config: Option<Option<ChartConfig>>,
    pub view_mode: Option<Option<ViewMode>>,
}

impl DataViewStateCachePatch {
    pub fn sort(sort: Option<Vec<ColumnSortSpec>>) -> Self {
        Self {
            sort: Some(sort),
            ..Default::default()
        }
    }

    pub fn column_sizes(sizes: BTreeMap<String, f64>) -> Self {
        Self {
            column_sizes: Some(Some(sizes)),
            ..Default::default()
        }
    }

    pub fn data_view_page(page: u64) -> Self {
        Self {
            data_view_page: Some(Some(page)),
            ..Default::default()
        }
    }

    pub fn view_mode(mode: ViewMode) -> Self {
        Self {
            view_mode: Some(Some(mode)),
            ..Default::default()
        }
    }

    pub fn chart_config(config: Option<ChartConfig>) -> Self {
        Self {
            chart_config: Some(config),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_cache_has_nothing_to_restore() {
        assert!(!DataViewStateCache::default().has_restorable_state());

        let cache = DataViewStateCache {
            sort: Some(vec![]),
            column_sizes: Some(BTreeMap::new()),
            data_view_page: Some(3),
            ..Default::default()
        };
        assert!(!cache.has_restorable_state());
    }

    #[test]
    fn test_view_mode_alone_is_restorable() {
        let cache = DataViewStateCache {
            view_mode: Some(ViewMode::Chart),
            ..Default::default()
        };
        assert!(cache.has_restorable_state());
    }

    #[test]
    fn test_json_value_rows_convert_to_objects() {
        let row = json!({"id": 1, "name": "a"}).to_data_row();
        assert_eq!(row.get("id"), Some(&json!(1)));

        let scalar = json!(42).to_data_row();
        assert_eq!(scalar.get("value"), Some(&json!(42)));
    }

    #[test]
    fn test_cache_deserializes_with_missing_fields() {
        let cache: DataViewStateCache = serde_json::from_str(r#"{"viewMode":"chart"}"#).unwrap();
        assert_eq!(cache.view_mode, Some(ViewMode::Chart));
        assert!(cache.sort.is_none());
    }
}
