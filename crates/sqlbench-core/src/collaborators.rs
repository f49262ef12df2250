//! Traits for the subsystems the session core calls into
//!
//! Implementations live in other crates (`sqlbench-versioning` for script
//! history, `sqlbench-session` for access-time tracking); tests supply mocks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use crate::error::Result;
use crate::ids::{DataSourceId, ScriptId, VersionId};

/// Why a script version was recorded
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionOrigin {
    /// Periodic or on-blur auto save
    Auto,
    /// Explicitly saved by the user
    Manual,
    /// Recorded before running the script
    Run,
    /// Recorded when the script's tab was closed
    TabClose,
}

impl VersionOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionOrigin::Auto => "auto",
            VersionOrigin::Manual => "manual",
            VersionOrigin::Run => "run",
            VersionOrigin::TabClose => "tab_close",
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown version origin: {0}")]
pub struct UnknownVersionOrigin(pub String);

impl FromStr for VersionOrigin {
    type Err = UnknownVersionOrigin;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "auto" => Ok(VersionOrigin::Auto),
            "manual" => Ok(VersionOrigin::Manual),
            "run" => Ok(VersionOrigin::Run),
            "tab_close" => Ok(VersionOrigin::TabClose),
            other => Err(UnknownVersionOrigin(other.to_string())),
        }
    }
}

/// Outcome of a conditional version save
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VersionSaveOutcome {
    /// A new version was stored
    Saved(VersionId),
    /// Content matched the latest version, nothing stored
    Unchanged,
}

/// Script version history
#[async_trait]
pub trait ScriptVersioning: Send + Sync {
    /// Store `content` as a new version of `script_id` unless it equals the
    /// latest stored version.
    async fn save_version_if_content_differs(
        &self,
        script_id: &ScriptId,
        content: &str,
        origin: VersionOrigin,
    ) -> Result<VersionSaveOutcome>;

    /// Drop all stored history of a script
    async fn delete_script_history(&self, script_id: &ScriptId) -> Result<()>;
}

/// Last-used bookkeeping for recency ordering.
///
/// All methods are fire-and-forget notifications.
pub trait AccessTracker: Send + Sync {
    fn update_sql_script_last_used(&self, script_id: &ScriptId);

    fn update_data_source_last_used(&self, data_source_id: &DataSourceId);

    fn update_table_access_time(&self, database: &str, schema: &str, table: &str);
}

/// Tracker that records nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAccessTracker;

impl AccessTracker for NoopAccessTracker {
    fn update_sql_script_last_used(&self, _script_id: &ScriptId) {}

    fn update_data_source_last_used(&self, _data_source_id: &DataSourceId) {}

    fn update_table_access_time(&self, _database: &str, _schema: &str, _table: &str) {}
}

/// Fully qualified `database.schema.table` key used for table access times
pub fn table_fqn(database: &str, schema: &str, table: &str) -> String {
    format!("{}.{}.{}", database, schema, table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_origin_parses_its_own_names() {
        for origin in [
            VersionOrigin::Auto,
            VersionOrigin::Manual,
            VersionOrigin::Run,
            VersionOrigin::TabClose,
        ] {
            assert_eq!(origin.as_str().parse::<VersionOrigin>().ok(), Some(origin));
        }
        assert!("closed".parse::<VersionOrigin>().is_err());
    }
}
