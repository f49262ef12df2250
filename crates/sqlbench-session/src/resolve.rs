//! Id resolution against a session snapshot
//!
//! Every function fails with `WorkbenchError::NotFound` and touches nothing.

use sqlbench_core::{
    DataSource, DataSourceId, EntityKind, Result, ScriptId, SqlScript, Tab, TabId,
    WorkbenchError,
};

use crate::store::SessionSnapshot;

pub fn ensure_script<'a>(snapshot: &'a SessionSnapshot, id: &ScriptId) -> Result<&'a SqlScript> {
    snapshot
        .sql_scripts
        .get(id)
        .ok_or_else(|| WorkbenchError::not_found(EntityKind::Script, id))
}

/// Resolve an attached, remote or local database source
pub fn ensure_database_data_source<'a>(
    snapshot: &'a SessionSnapshot,
    id: &DataSourceId,
) -> Result<&'a DataSource> {
    snapshot
        .data_sources
        .get(id)
        .ok_or_else(|| WorkbenchError::not_found(EntityKind::DataSource, id))?
        .expect_database()
}

/// Resolve a flat-file source (csv, parquet, json, xlsx)
pub fn ensure_flat_file_data_source<'a>(
    snapshot: &'a SessionSnapshot,
    id: &DataSourceId,
) -> Result<&'a DataSource> {
    snapshot
        .data_sources
        .get(id)
        .ok_or_else(|| WorkbenchError::not_found(EntityKind::DataSource, id))?
        .expect_flat_file()
}

pub fn ensure_tab<'a>(snapshot: &'a SessionSnapshot, id: &TabId) -> Result<&'a Tab> {
    snapshot
        .tabs
        .get(id)
        .ok_or_else(|| WorkbenchError::not_found(EntityKind::Tab, id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlbench_core::{DatabaseKind, FlatFileType};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn snapshot_with(sources: Vec<DataSource>) -> SessionSnapshot {
        SessionSnapshot {
            data_sources: Arc::new(sources.into_iter().map(|s| (s.id().clone(), s)).collect()),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_script_is_not_found() {
        let snapshot = SessionSnapshot::default();
        let err = ensure_script(&snapshot, &ScriptId::new()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_data_source_kind_is_checked() {
        let file = DataSource::FlatFile {
            id: DataSourceId::new(),
            file_source_id: None,
            view_name: "orders_csv".into(),
            file_type: FlatFileType::Csv,
        };
        let db = DataSource::Database {
            id: DataSourceId::new(),
            db_name: "warehouse".into(),
            kind: DatabaseKind::Attached,
        };
        let snapshot = snapshot_with(vec![file.clone(), db.clone()]);

        assert!(ensure_flat_file_data_source(&snapshot, file.id()).is_ok());
        assert!(ensure_database_data_source(&snapshot, db.id()).is_ok());
        assert!(ensure_database_data_source(&snapshot, file.id()).unwrap_err().is_not_found());
        assert!(ensure_flat_file_data_source(&snapshot, db.id()).unwrap_err().is_not_found());
    }

    #[test]
    fn test_tab_lookup() {
        let snapshot = SessionSnapshot {
            tabs: Arc::new(HashMap::new()),
            ..Default::default()
        };
        assert!(ensure_tab(&snapshot, &TabId::new()).is_err());
    }
}
