//! SQLBench Settings
//!
//! Workbench settings persisted as JSON, including:
//! - Storage locations (session database, version history database)
//! - Session limits (view-state cache, persistence queue)
//! - Script versioning
//! - Logging defaults
//!
//! Every section uses `#[serde(default)]`, so partial files and files written
//! by older builds load cleanly.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod settings_file;

pub use settings_file::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct WorkbenchSettings {
    pub storage: StorageSettings,
    pub session: SessionSettings,
    pub versioning: VersioningSettings,
    pub logging: LoggingSettings,
}

impl WorkbenchSettings {
    /// Load from the default location, falling back to defaults when the
    /// file does not exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::settings_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {:?}", path))?;
        serde_json::from_str(&content).with_context(|| "Failed to parse settings JSON")
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::settings_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write settings to {:?}", path))?;
        Ok(())
    }

    pub fn settings_path() -> Result<PathBuf> {
        Ok(config_dir()?.join("settings.json"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StorageSettings {
    /// Session database; `None` means `<data_dir>/sqlbench/session.db`
    pub database_path: Option<PathBuf>,
    /// Version history database; `None` means `<data_dir>/sqlbench/versions.db`
    pub versions_path: Option<PathBuf>,
}

impl StorageSettings {
    pub fn resolved_database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => session_db_file(),
        }
    }

    pub fn resolved_versions_path(&self) -> Result<PathBuf> {
        match &self.versions_path {
            Some(path) => Ok(path.clone()),
            None => versions_db_file(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Script view states kept after their tab closes
    pub view_state_cache_capacity: usize,
    /// Pending writes before new ones are dropped
    pub persistence_queue_capacity: usize,
    pub restore_on_startup: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            view_state_cache_capacity: 50,
            persistence_queue_capacity: 1024,
            restore_on_startup: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersioningSettings {
    pub enabled: bool,
    /// Unlabeled versions kept per script
    pub max_versions_per_script: usize,
}

impl Default for VersioningSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_versions_per_script: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Used when `RUST_LOG` is not set
    pub default_filter: String,
    pub json_logs: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            default_filter: "info,sqlbench=debug".to_string(),
            json_logs: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let settings = WorkbenchSettings::load_from(&dir.path().join("settings.json")).unwrap();
        assert_eq!(settings, WorkbenchSettings::default());
        assert_eq!(settings.session.view_state_cache_capacity, 50);
        assert_eq!(settings.versioning.max_versions_per_script, 100);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "session": { "view_state_cache_capacity": 5 } }"#).unwrap();

        let settings = WorkbenchSettings::load_from(&path).unwrap();
        assert_eq!(settings.session.view_state_cache_capacity, 5);
        assert_eq!(settings.session.persistence_queue_capacity, 1024);
        assert!(settings.session.restore_on_startup);
        assert!(settings.versioning.enabled);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut settings = WorkbenchSettings::default();
        settings.storage.database_path = Some(dir.path().join("custom.db"));
        settings.versioning.enabled = false;
        settings.save_to(&path).unwrap();

        assert_eq!(WorkbenchSettings::load_from(&path).unwrap(), settings);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(WorkbenchSettings::load_from(&path).is_err());
    }

    #[test]
    fn test_explicit_database_path_wins() {
        let storage = StorageSettings {
            database_path: Some(PathBuf::from("/tmp/session.db")),
            versions_path: None,
        };
        assert_eq!(
            storage.resolved_database_path().unwrap(),
            PathBuf::from("/tmp/session.db")
        );
    }
}
