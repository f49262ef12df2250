//! SQLite persistence for script version history

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, params};
use std::path::PathBuf;
use sqlbench_core::{ScriptId, VersionId, VersionOrigin};

use crate::ScriptVersion;

const VERSION_COLUMNS: &str =
    "id, script_id, content, origin, label, created_at, parent_id";

/// Storage for script versions using SQLite
pub struct VersionStorage {
    db_path: PathBuf,
}

impl VersionStorage {
    /// Create a version storage at the default location
    pub fn new() -> Result<Self> {
        Self::with_path(Self::get_storage_path()?)
    }

    /// Create storage with a custom path
    pub fn with_path(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let storage = Self { db_path };
        storage.initialize_schema()?;

        Ok(storage)
    }

    fn get_storage_path() -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir().context("Failed to get data directory")?;
        Ok(data_dir.join("sqlbench").join("versions.db"))
    }

    fn connect(&self) -> Result<Connection> {
        Connection::open(&self.db_path)
            .with_context(|| format!("Failed to open version database at {:?}", self.db_path))
    }

    fn initialize_schema(&self) -> Result<()> {
        let conn = self.connect()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS script_versions (
                id TEXT PRIMARY KEY,
                script_id TEXT NOT NULL,
                content TEXT NOT NULL,
                origin TEXT NOT NULL,
                label TEXT,
                created_at TEXT NOT NULL,
                parent_id TEXT
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_script_versions_script
             ON script_versions(script_id, created_at)",
            [],
        )?;

        Ok(())
    }

    /// Save a new version
    pub fn save_version(&self, version: &ScriptVersion) -> Result<()> {
        let conn = self.connect()?;

        conn.execute(
            "INSERT INTO script_versions (id, script_id, content, origin, label, created_at, parent_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                version.id.to_string(),
                version.script_id.to_string(),
                version.content,
                version.origin.as_str(),
                version.label.as_deref(),
                version.created_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
                version.parent_id.as_ref().map(|id| id.to_string()),
            ],
        )?;

        Ok(())
    }

    /// All versions of a script, newest first
    pub fn get_versions_for_script(&self, script_id: &ScriptId) -> Result<Vec<ScriptVersion>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {VERSION_COLUMNS} FROM script_versions
             WHERE script_id = ?1
             ORDER BY created_at DESC, rowid DESC"
        ))?;
        Self::query_versions(&mut stmt, params![script_id.to_string()])
    }

    pub fn get_version(&self, version_id: &VersionId) -> Result<Option<ScriptVersion>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {VERSION_COLUMNS} FROM script_versions WHERE id = ?1"
        ))?;
        let versions = Self::query_versions(&mut stmt, params![version_id.to_string()])?;
        Ok(versions.into_iter().next())
    }

    pub fn get_latest_version(&self, script_id: &ScriptId) -> Result<Option<ScriptVersion>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {VERSION_COLUMNS} FROM script_versions
             WHERE script_id = ?1
             ORDER BY created_at DESC, rowid DESC
             LIMIT 1"
        ))?;
        let versions = Self::query_versions(&mut stmt, params![script_id.to_string()])?;
        Ok(versions.into_iter().next())
    }

    /// Walk parent links starting at `version_id`
    pub fn get_version_history(
        &self,
        version_id: &VersionId,
        limit: usize,
    ) -> Result<Vec<ScriptVersion>> {
        let mut history = Vec::new();
        let mut current = Some(version_id.clone());

        while let Some(id) = current {
            if history.len() >= limit {
                break;
            }
            match self.get_version(&id)? {
                Some(version) => {
                    current = version.parent_id.clone();
                    history.push(version);
                }
                None => break,
            }
        }

        Ok(history)
    }

    /// Set or clear the user label of a version
    pub fn set_label(&self, version_id: &VersionId, label: Option<&str>) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE script_versions SET label = ?1 WHERE id = ?2",
            params![label, version_id.to_string()],
        )?;
        Ok(())
    }

    /// Delete a version, re-linking its children to its parent
    pub fn delete_version(&self, version_id: &VersionId) -> Result<()> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        let parent_id: Option<String> = tx
            .query_row(
                "SELECT parent_id FROM script_versions WHERE id = ?1",
                params![version_id.to_string()],
                |row| row.get(0),
            )
            .ok()
            .flatten();

        tx.execute(
            "UPDATE script_versions SET parent_id = ?1 WHERE parent_id = ?2",
            params![parent_id, version_id.to_string()],
        )?;
        tx.execute(
            "DELETE FROM script_versions WHERE id = ?1",
            params![version_id.to_string()],
        )?;

        tx.commit()?;
        Ok(())
    }

    pub fn delete_versions_for_script(&self, script_id: &ScriptId) -> Result<usize> {
        let conn = self.connect()?;
        let deleted = conn.execute(
            "DELETE FROM script_versions WHERE script_id = ?1",
            params![script_id.to_string()],
        )?;
        Ok(deleted)
    }

    /// Keep the `keep` newest unlabeled versions of a script, delete older
    /// unlabeled ones. Labeled versions are never pruned.
    pub fn prune_versions(&self, script_id: &ScriptId, keep: usize) -> Result<usize> {
        let stale: Vec<VersionId> = self
            .get_versions_for_script(script_id)?
            .into_iter()
            .filter(|v| v.label.is_none())
            .skip(keep)
            .map(|v| v.id)
            .collect();

        for id in &stale {
            self.delete_version(id)?;
        }

        if !stale.is_empty() {
            tracing::debug!(script_id = %script_id, pruned = stale.len(), "pruned script versions");
        }
        Ok(stale.len())
    }

    fn query_versions(
        stmt: &mut rusqlite::Statement<'_>,
        params: impl rusqlite::Params,
    ) -> Result<Vec<ScriptVersion>> {
        let rows = stmt
            .query_map(params, |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, Option<String>>(6)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, script_id, content, origin, label, created_at, parent_id)| {
                Ok(ScriptVersion {
                    id: id.parse::<VersionId>().context("Invalid version id")?,
                    script_id: script_id
                        .parse::<ScriptId>()
                        .context("Invalid script id")?,
                    content,
                    origin: origin
                        .parse::<VersionOrigin>()
                        .context("Invalid version origin")?,
                    label,
                    created_at: parse_datetime(&created_at),
                    parent_id: parent_id
                        .map(|p| p.parse::<VersionId>())
                        .transpose()
                        .context("Invalid parent version id")?,
                })
            })
            .collect()
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{TempDir, tempdir};

    fn create_test_storage() -> (VersionStorage, TempDir) {
        let dir = tempdir().unwrap();
        let storage = VersionStorage::with_path(dir.path().join("test_versions.db")).unwrap();
        (storage, dir)
    }

    #[test]
    fn test_save_and_load_version() {
        let (storage, _dir) = create_test_storage();
        let script_id = ScriptId::new();

        let version = ScriptVersion::new(
            script_id.clone(),
            "select 1".to_string(),
            VersionOrigin::Manual,
            None,
        );
        storage.save_version(&version).unwrap();

        let loaded = storage.get_version(&version.id).unwrap().unwrap();
        assert_eq!(loaded.script_id, script_id);
        assert_eq!(loaded.content, "select 1");
        assert_eq!(loaded.origin, VersionOrigin::Manual);
    }

    #[test]
    fn test_history_follows_parents() {
        let (storage, _dir) = create_test_storage();
        let script_id = ScriptId::new();

        let v1 = ScriptVersion::new(script_id.clone(), "v1".into(), VersionOrigin::Auto, None);
        storage.save_version(&v1).unwrap();
        let v2 = ScriptVersion::new(
            script_id.clone(),
            "v2".into(),
            VersionOrigin::Auto,
            Some(v1.id.clone()),
        );
        storage.save_version(&v2).unwrap();

        let history = storage.get_version_history(&v2.id, 10).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "v2");
        assert_eq!(history[1].content, "v1");
    }

    #[test]
    fn test_delete_relinks_children() {
        let (storage, _dir) = create_test_storage();
        let script_id = ScriptId::new();

        let v1 = ScriptVersion::new(script_id.clone(), "v1".into(), VersionOrigin::Auto, None);
        let v2 = ScriptVersion::new(
            script_id.clone(),
            "v2".into(),
            VersionOrigin::Auto,
            Some(v1.id.clone()),
        );
        let v3 = ScriptVersion::new(
            script_id.clone(),
            "v3".into(),
            VersionOrigin::Auto,
            Some(v2.id.clone()),
        );
        for v in [&v1, &v2, &v3] {
            storage.save_version(v).unwrap();
        }

        storage.delete_version(&v2.id).unwrap();

        let v3_loaded = storage.get_version(&v3.id).unwrap().unwrap();
        assert_eq!(v3_loaded.parent_id, Some(v1.id));
    }

    #[test]
    fn test_prune_keeps_labeled_versions() {
        let (storage, _dir) = create_test_storage();
        let script_id = ScriptId::new();

        let mut parent = None;
        let mut ids = Vec::new();
        for i in 0..5 {
            let v = ScriptVersion::new(
                script_id.clone(),
                format!("v{}", i),
                VersionOrigin::Auto,
                parent.clone(),
            );
            storage.save_version(&v).unwrap();
            parent = Some(v.id.clone());
            ids.push(v.id);
        }
        storage.set_label(&ids[0], Some("baseline")).unwrap();

        let pruned = storage.prune_versions(&script_id, 2).unwrap();
        assert_eq!(pruned, 2);

        let remaining = storage.get_versions_for_script(&script_id).unwrap();
        let contents: Vec<_> = remaining.iter().map(|v| v.content.as_str()).collect();
        assert_eq!(contents, vec!["v4", "v3", "v0"]);
    }
}
