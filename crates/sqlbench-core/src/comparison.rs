//! Comparison configuration and schema comparison results
//!
//! A comparison tab diffs the rows of two sources (tables or ad-hoc queries).
//! The session core only stores these values; running the comparison is the
//! query engine's business.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One side of a comparison
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ComparisonSource {
    #[serde(rename_all = "camelCase")]
    Table {
        table_name: String,
        schema_name: Option<String>,
        database_name: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Query { sql: String, alias: String },
}

impl ComparisonSource {
    /// Display label, e.g. `db.main.orders` or the query alias
    pub fn label(&self) -> String {
        match self {
            ComparisonSource::Table {
                table_name,
                schema_name,
                database_name,
            } => [database_name.as_deref(), schema_name.as_deref(), Some(table_name)]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join("."),
            ComparisonSource::Query { alias, .. } => alias.clone(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    #[default]
    Common,
    Separate,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareMode {
    #[default]
    Strict,
    Coerce,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComparisonAlgorithm {
    #[default]
    Auto,
    HashBucket,
    Join,
}

/// Join, filter and column mapping specification of a comparison
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonConfig {
    pub source_a: Option<ComparisonSource>,
    pub source_b: Option<ComparisonSource>,
    pub join_columns: Vec<String>,
    /// Join key in A mapped to its counterpart in B, when names differ
    #[serde(default)]
    pub join_key_mappings: BTreeMap<String, String>,
    /// Compared column in A mapped to its counterpart in B
    #[serde(default)]
    pub column_mappings: BTreeMap<String, String>,
    #[serde(default)]
    pub excluded_columns: Vec<String>,
    #[serde(default)]
    pub filter_mode: FilterMode,
    pub common_filter: Option<String>,
    pub filter_a: Option<String>,
    pub filter_b: Option<String>,
    #[serde(default)]
    pub compare_mode: CompareMode,
    #[serde(default)]
    pub show_only_differences: bool,
    #[serde(default)]
    pub algorithm: ComparisonAlgorithm,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            source_a: None,
            source_b: None,
            join_columns: Vec::new(),
            join_key_mappings: BTreeMap::new(),
            column_mappings: BTreeMap::new(),
            excluded_columns: Vec::new(),
            filter_mode: FilterMode::Common,
            common_filter: None,
            filter_a: None,
            filter_b: None,
            compare_mode: CompareMode::Strict,
            show_only_differences: true,
            algorithm: ComparisonAlgorithm::Auto,
        }
    }
}

impl ComparisonConfig {
    /// Both sources chosen and at least one join column
    pub fn is_runnable(&self) -> bool {
        self.source_a.is_some() && self.source_b.is_some() && !self.join_columns.is_empty()
    }
}

/// A column whose type differs between the two sources
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnTypeMismatch {
    pub column: String,
    pub type_a: String,
    pub type_b: String,
}

/// Result of comparing the column sets of both sources
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchemaComparisonResult {
    pub common_columns: Vec<String>,
    pub only_in_a: Vec<String>,
    pub only_in_b: Vec<String>,
    pub type_mismatches: Vec<ColumnTypeMismatch>,
    pub suggested_keys: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_source_label_skips_missing_parts() {
        let source = ComparisonSource::Table {
            table_name: "orders".into(),
            schema_name: Some("main".into()),
            database_name: None,
        };
        assert_eq!(source.label(), "main.orders");
    }

    #[test]
    fn test_config_requires_sources_and_join_columns() {
        let mut config = ComparisonConfig::default();
        assert!(!config.is_runnable());

        config.source_a = Some(ComparisonSource::Query {
            sql: "select 1 as id".into(),
            alias: "a".into(),
        });
        config.source_b = Some(ComparisonSource::Query {
            sql: "select 1 as id".into(),
            alias: "b".into(),
        });
        assert!(!config.is_runnable());

        config.join_columns.push("id".into());
        assert!(config.is_runnable());
    }
}
