//! Data sources tabs can be opened on
//!
//! A flat-file source is a single queryable view created over a local file. A
//! database source is an attached (local or remote) database whose schemas and
//! objects are browsed individually.

use serde::{Deserialize, Serialize};

use crate::error::{EntityKind, Result, WorkbenchError};
use crate::ids::DataSourceId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlatFileType {
    Csv,
    Parquet,
    Json,
    Xlsx,
}

impl FlatFileType {
    /// Guess the file type from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" | "tsv" => Some(Self::Csv),
            "parquet" => Some(Self::Parquet),
            "json" | "jsonl" | "ndjson" => Some(Self::Json),
            "xlsx" => Some(Self::Xlsx),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseKind {
    /// The engine's own in-process database
    Local,
    /// A database file attached to the engine
    Attached,
    /// A remote database reached over the network
    Remote,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DataSource {
    #[serde(rename_all = "camelCase")]
    FlatFile {
        id: DataSourceId,
        file_source_id: Option<String>,
        view_name: String,
        file_type: FlatFileType,
    },
    #[serde(rename_all = "camelCase")]
    Database {
        id: DataSourceId,
        db_name: String,
        kind: DatabaseKind,
    },
}

impl DataSource {
    pub fn id(&self) -> &DataSourceId {
        match self {
            DataSource::FlatFile { id, .. } => id,
            DataSource::Database { id, .. } => id,
        }
    }

    /// Name used in SQL to reach this source
    pub fn sql_name(&self) -> &str {
        match self {
            DataSource::FlatFile { view_name, .. } => view_name,
            DataSource::Database { db_name, .. } => db_name,
        }
    }

    pub fn is_flat_file(&self) -> bool {
        matches!(self, DataSource::FlatFile { .. })
    }

    pub fn is_database(&self) -> bool {
        matches!(self, DataSource::Database { .. })
    }

    /// Accept only database sources
    pub fn expect_database(&self) -> Result<&Self> {
        if self.is_database() {
            Ok(self)
        } else {
            Err(WorkbenchError::not_found(EntityKind::DataSource, self.id()))
        }
    }

    /// Accept only flat-file sources
    pub fn expect_flat_file(&self) -> Result<&Self> {
        if self.is_flat_file() {
            Ok(self)
        } else {
            Err(WorkbenchError::not_found(EntityKind::DataSource, self.id()))
        }
    }
}
