//! Version repository for script history
//!
//! This is the main API of the crate. It is backed by [`VersionStorage`] and
//! also implements the session core's [`ScriptVersioning`] contract.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use sqlbench_core::{
    ScriptId, ScriptVersioning, VersionId, VersionOrigin, VersionSaveOutcome, WorkbenchError,
};

use crate::diff::{Change, DiffEngine, DiffStats};
use crate::storage::VersionStorage;

/// One stored version of a script
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScriptVersion {
    pub id: VersionId,
    pub script_id: ScriptId,
    pub content: String,
    pub origin: VersionOrigin,
    /// Optional user-given name; labeled versions survive pruning
    pub label: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Previous version (None for the first one)
    pub parent_id: Option<VersionId>,
}

impl ScriptVersion {
    pub fn new(
        script_id: ScriptId,
        content: String,
        origin: VersionOrigin,
        parent_id: Option<VersionId>,
    ) -> Self {
        Self {
            id: VersionId::new(),
            script_id,
            content,
            origin,
            label: None,
            created_at: Utc::now(),
            parent_id,
        }
    }

    /// First eight characters of the id, for display
    pub fn short_id(&self) -> String {
        self.id.to_string()[..8].to_string()
    }
}

/// Repository managing script version history
#[derive(Clone)]
pub struct ScriptVersionRepository {
    storage: Arc<VersionStorage>,
    /// Unlabeled versions kept per script; `None` keeps everything
    max_versions_per_script: Option<usize>,
}

impl ScriptVersionRepository {
    /// Repository with default storage location
    pub fn new() -> Result<Self> {
        Ok(Self::with_storage(Arc::new(VersionStorage::new()?)))
    }

    pub fn with_storage(storage: Arc<VersionStorage>) -> Self {
        Self {
            storage,
            max_versions_per_script: None,
        }
    }

    pub fn with_max_versions(mut self, max_versions: usize) -> Self {
        self.max_versions_per_script = Some(max_versions.max(1));
        self
    }

    pub fn storage(&self) -> &VersionStorage {
        &self.storage
    }

    /// Record a new version, linking it to the latest one
    pub fn commit(
        &self,
        script_id: &ScriptId,
        content: String,
        origin: VersionOrigin,
    ) -> Result<ScriptVersion> {
        let parent_id = self.storage.get_latest_version(script_id)?.map(|v| v.id);
        let version = ScriptVersion::new(script_id.clone(), content, origin, parent_id);
        self.storage.save_version(&version)?;

        tracing::debug!(
            script_id = %script_id,
            version_id = %version.id,
            origin = origin.as_str(),
            "committed script version"
        );

        if let Some(keep) = self.max_versions_per_script {
            self.storage.prune_versions(script_id, keep)?;
        }

        Ok(version)
    }

    /// Commit only when `content` differs from the latest stored version
    pub fn commit_if_changed(
        &self,
        script_id: &ScriptId,
        content: &str,
        origin: VersionOrigin,
    ) -> Result<VersionSaveOutcome> {
        if !self.has_changes(script_id, content)? {
            return Ok(VersionSaveOutcome::Unchanged);
        }
        let version = self.commit(script_id, content.to_string(), origin)?;
        Ok(VersionSaveOutcome::Saved(version.id))
    }

    /// Newest first
    pub fn get_versions(&self, script_id: &ScriptId) -> Result<Vec<ScriptVersion>> {
        self.storage.get_versions_for_script(script_id)
    }

    /// `version_id` and its ancestors, newest first, at most `limit` of them
    pub fn get_history(&self, version_id: &VersionId, limit: usize) -> Result<Vec<ScriptVersion>> {
        self.storage.get_version_history(version_id, limit)
    }

    pub fn label(&self, version_id: &VersionId, label: Option<&str>) -> Result<()> {
        self.storage.set_label(version_id, label)
    }

    /// Compare two versions
    pub fn diff(&self, from: &VersionId, to: &VersionId) -> Result<VersionDiff> {
        let from_version = self
            .storage
            .get_version(from)?
            .ok_or_else(|| anyhow::anyhow!("From version not found"))?;
        let to_version = self
            .storage
            .get_version(to)?
            .ok_or_else(|| anyhow::anyhow!("To version not found"))?;

        Ok(VersionDiff {
            unified_diff: DiffEngine::unified_diff(&from_version.content, &to_version.content, 3),
            changes: DiffEngine::changes(&from_version.content, &to_version.content),
            stats: DiffEngine::stats(&from_version.content, &to_version.content),
            from_version,
            to_version,
        })
    }

    /// Compare live editor content with the latest stored version
    pub fn diff_with_current(
        &self,
        script_id: &ScriptId,
        current_content: &str,
    ) -> Result<Option<CurrentDiff>> {
        let Some(latest) = self.storage.get_latest_version(script_id)? else {
            return Ok(None);
        };

        let stats = DiffEngine::stats(&latest.content, current_content);
        Ok(Some(CurrentDiff {
            unified_diff: DiffEngine::unified_diff(&latest.content, current_content, 3),
            is_modified: !stats.is_empty(),
            stats,
            latest_version: latest,
        }))
    }

    /// Whether `content` differs from the latest stored version.
    /// A script without history always has changes.
    pub fn has_changes(&self, script_id: &ScriptId, content: &str) -> Result<bool> {
        Ok(match self.storage.get_latest_version(script_id)? {
            Some(latest) => latest.content != content,
            None => true,
        })
    }

    pub fn delete_script_versions(&self, script_id: &ScriptId) -> Result<usize> {
        self.storage.delete_versions_for_script(script_id)
    }
}

/// Result of comparing two versions
#[derive(Clone, Debug)]
pub struct VersionDiff {
    pub from_version: ScriptVersion,
    pub to_version: ScriptVersion,
    pub unified_diff: String,
    pub changes: Vec<Change>,
    pub stats: DiffStats,
}

/// Result of comparing live content with the latest version
#[derive(Clone, Debug)]
pub struct CurrentDiff {
    pub latest_version: ScriptVersion,
    pub unified_diff: String,
    pub stats: DiffStats,
    pub is_modified: bool,
}

/// Async adapter used by the tab controller; SQLite work runs on the blocking pool
#[async_trait]
impl ScriptVersioning for ScriptVersionRepository {
    async fn save_version_if_content_differs(
        &self,
        script_id: &ScriptId,
        content: &str,
        origin: VersionOrigin,
    ) -> sqlbench_core::Result<VersionSaveOutcome> {
        let repo = self.clone();
        let script_id = script_id.clone();
        let content = content.to_string();

        tokio::task::spawn_blocking(move || repo.commit_if_changed(&script_id, &content, origin))
            .await
            .map_err(|e| WorkbenchError::Versioning(e.to_string()))?
            .map_err(|e| WorkbenchError::Versioning(format!("{:#}", e)))
    }

    async fn delete_script_history(&self, script_id: &ScriptId) -> sqlbench_core::Result<()> {
        let repo = self.clone();
        let script_id = script_id.clone();

        tokio::task::spawn_blocking(move || repo.delete_script_versions(&script_id))
            .await
            .map_err(|e| WorkbenchError::Versioning(e.to_string()))?
            .map(|_| ())
            .map_err(|e| WorkbenchError::Versioning(format!("{:#}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{TempDir, tempdir};

    fn create_test_repo() -> (ScriptVersionRepository, TempDir) {
        let dir = tempdir().unwrap();
        let storage = Arc::new(VersionStorage::with_path(dir.path().join("versions.db")).unwrap());
        (ScriptVersionRepository::with_storage(storage), dir)
    }

    #[test]
    fn test_commit_links_parent() {
        let (repo, _dir) = create_test_repo();
        let script_id = ScriptId::new();

        let v1 = repo
            .commit(&script_id, "select 1".into(), VersionOrigin::Manual)
            .unwrap();
        let v2 = repo
            .commit(&script_id, "select 2".into(), VersionOrigin::Manual)
            .unwrap();

        assert!(v1.parent_id.is_none());
        assert_eq!(v2.parent_id, Some(v1.id));
    }

    #[test]
    fn test_commit_if_changed_skips_duplicates() {
        let (repo, _dir) = create_test_repo();
        let script_id = ScriptId::new();

        let first = repo
            .commit_if_changed(&script_id, "select 1", VersionOrigin::TabClose)
            .unwrap();
        assert!(matches!(first, VersionSaveOutcome::Saved(_)));

        let second = repo
            .commit_if_changed(&script_id, "select 1", VersionOrigin::TabClose)
            .unwrap();
        assert_eq!(second, VersionSaveOutcome::Unchanged);
        assert_eq!(repo.get_versions(&script_id).unwrap().len(), 1);
    }

    #[test]
    fn test_max_versions_prunes_oldest() {
        let (repo, _dir) = create_test_repo();
        let repo = repo.with_max_versions(2);
        let script_id = ScriptId::new();

        for i in 0..4 {
            repo.commit(&script_id, format!("select {}", i), VersionOrigin::Auto)
                .unwrap();
        }

        let versions = repo.get_versions(&script_id).unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].content, "select 3");
    }

    #[test]
    fn test_history_follows_parents() {
        let (repo, _dir) = create_test_repo();
        let script_id = ScriptId::new();

        let v1 = repo
            .commit(&script_id, "select 1\n".into(), VersionOrigin::Manual)
            .unwrap();
        let v2 = repo
            .commit(&script_id, "select 2\n".into(), VersionOrigin::Run)
            .unwrap();
        let v3 = repo
            .commit(&script_id, "select 3\n".into(), VersionOrigin::TabClose)
            .unwrap();

        let ids: Vec<VersionId> = repo
            .get_history(&v3.id, 10)
            .unwrap()
            .into_iter()
            .map(|version| version.id)
            .collect();
        assert_eq!(ids, vec![v3.id.clone(), v2.id.clone(), v1.id.clone()]);
        assert_eq!(repo.get_history(&v3.id, 2).unwrap().len(), 2);

        repo.label(&v1.id, Some("baseline")).unwrap();
        let history = repo.get_history(&v2.id, 10).unwrap();
        assert_eq!(history[1].label.as_deref(), Some("baseline"));

        let diff = repo.diff(&v1.id, &v3.id).unwrap();
        assert_eq!(diff.stats.insertions, 1);
        assert_eq!(diff.stats.deletions, 1);
    }

    #[test]
    fn test_diff_with_current() {
        let (repo, _dir) = create_test_repo();
        let script_id = ScriptId::new();

        assert!(repo.diff_with_current(&script_id, "x").unwrap().is_none());

        repo.commit(&script_id, "select 1\n".into(), VersionOrigin::Manual)
            .unwrap();
        let diff = repo
            .diff_with_current(&script_id, "select 2\n")
            .unwrap()
            .unwrap();
        assert!(diff.is_modified);
        assert_eq!(diff.stats.insertions, 1);
    }

    #[tokio::test]
    async fn test_async_adapter_saves_once() {
        let (repo, _dir) = create_test_repo();
        let script_id = ScriptId::new();

        let outcome = repo
            .save_version_if_content_differs(&script_id, "select 1", VersionOrigin::TabClose)
            .await
            .unwrap();
        assert!(matches!(outcome, VersionSaveOutcome::Saved(_)));

        let outcome = repo
            .save_version_if_content_differs(&script_id, "select 1", VersionOrigin::TabClose)
            .await
            .unwrap();
        assert_eq!(outcome, VersionSaveOutcome::Unchanged);
    }
}
