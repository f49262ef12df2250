//! SQL script lifecycle
//!
//! Scripts are created with a unique name, edited in place and deleted
//! together with their tab, their access-time record and their version
//! history.

use sqlbench_core::{
    EntityKind, ResourceKey, Result, ScriptId, ScriptVersioning, SqlScript, TabId,
    WorkbenchError,
};
use sqlbench_storage::{StoreOp, StoreTable};
use std::sync::Arc;

use crate::mutation::Mutation;
use crate::resolve::ensure_script;
use crate::store::{AccessTimes, SessionPatch, SessionSnapshot};
use crate::tab_algebra::{delete_scripts, find_tab_by_resource, names_in_use, unique_name};
use crate::tab_controller::{TabController, remove_tabs};
use crate::writes;

/// Base name of new scripts
pub const DEFAULT_SCRIPT_NAME: &str = "query";

pub struct ScriptController {
    tabs: Arc<TabController>,
    versioning: Option<Arc<dyn ScriptVersioning>>,
}

impl ScriptController {
    pub fn new(tabs: Arc<TabController>) -> Self {
        Self {
            tabs,
            versioning: None,
        }
    }

    /// Version history is dropped along with deleted scripts
    pub fn with_versioning(mut self, versioning: Arc<dyn ScriptVersioning>) -> Self {
        self.versioning = Some(versioning);
        self
    }

    /// Create a script named `name` (or `query`), suffixed with `_N` when the
    /// name is taken
    pub fn create_sql_script(&self, name: Option<&str>, content: impl Into<String>) -> SqlScript {
        let base = name.unwrap_or(DEFAULT_SCRIPT_NAME);
        let content = content.into();

        let (script, _) = self.tabs.apply(|snapshot| {
            let taken = names_in_use(&snapshot.sql_scripts, &snapshot.tabs, None, None);
            let script = SqlScript::new(unique_name(base, taken), content);

            let mut scripts = (*snapshot.sql_scripts).clone();
            scripts.insert(script.id.clone(), script.clone());
            let ops = writes::put_script(&script).into_iter().collect();

            tracing::debug!(script_id = %script.id, name = %script.name, "script created");
            Mutation::commit(SessionPatch::new().sql_scripts(scripts), ops, script)
        });
        script
    }

    /// Returns whether the content changed
    pub fn update_sql_script_content(&self, script_id: &ScriptId, content: &str) -> Result<bool> {
        let (_, committed) = self.tabs.try_apply(|snapshot| {
            let script = ensure_script(snapshot, script_id)?;
            if script.content == content {
                return Ok(Mutation::none(()));
            }
            let mut updated = script.clone();
            updated.content = content.to_string();
            Ok(replace_script(snapshot, updated, ()))
        })?;
        Ok(committed)
    }

    /// Rename a script; returns the script with the name it ended up with
    pub fn rename_sql_script(&self, script_id: &ScriptId, name: &str) -> Result<SqlScript> {
        let (script, _) = self.tabs.try_apply(|snapshot| {
            let script = ensure_script(snapshot, script_id)?;
            let taken = names_in_use(&snapshot.sql_scripts, &snapshot.tabs, Some(script_id), None);
            let final_name = unique_name(name, taken);
            if script.name == final_name {
                return Ok(Mutation::none(script.clone()));
            }
            let mut updated = script.clone();
            updated.name = final_name;
            Ok(replace_script(snapshot, updated.clone(), updated))
        })?;
        Ok(script)
    }

    pub fn get_sql_script(&self, script_id: &ScriptId) -> Option<SqlScript> {
        self.tabs.store().snapshot().sql_scripts.get(script_id).cloned()
    }

    /// All scripts, sorted by name
    pub fn list_sql_scripts(&self) -> Vec<SqlScript> {
        let mut scripts: Vec<SqlScript> = self
            .tabs
            .store()
            .snapshot()
            .sql_scripts
            .values()
            .cloned()
            .collect();
        scripts.sort_by(|a, b| a.name.cmp(&b.name));
        scripts
    }

    /// Delete scripts, closing their tabs first.
    ///
    /// The scripts and their access-time rows are removed from the store in
    /// one transaction.
    #[tracing::instrument(skip(self, script_ids), fields(count = script_ids.len()))]
    pub async fn delete_sql_scripts(&self, script_ids: &[ScriptId]) -> Result<()> {
        let snapshot = self.tabs.store().snapshot();
        if let Some(missing) = script_ids
            .iter()
            .find(|id| !snapshot.sql_scripts.contains_key(*id))
        {
            return Err(WorkbenchError::not_found(EntityKind::Script, missing));
        }

        self.tabs.delete_tab(&script_tabs(&snapshot, script_ids)).await;

        // Tabs opened for these scripts while the closes above were awaiting
        // are removed in the same commit as the scripts
        let ((removed, late_tabs), _) = self.tabs.apply(|snapshot| {
            let late_tabs = script_tabs(snapshot, script_ids);
            let scripts = delete_scripts(script_ids, &snapshot.sql_scripts);
            let removed = snapshot.sql_scripts.len() - scripts.len();
            if removed == 0 && late_tabs.is_empty() {
                return Mutation::none((0, late_tabs));
            }

            let (tab_patch, mut ops, _) = remove_tabs(snapshot, &late_tabs).into_parts();
            let mut access_times: AccessTimes = (*snapshot.access_times).clone();
            for id in script_ids {
                access_times.scripts.remove(id);
                ops.push(StoreOp::delete(StoreTable::SqlScripts, id.to_string()));
                ops.push(StoreOp::delete(StoreTable::ScriptAccessTime, id.to_string()));
            }

            Mutation::commit(
                tab_patch
                    .unwrap_or_default()
                    .sql_scripts(scripts)
                    .access_times(access_times),
                ops,
                (removed, late_tabs),
            )
        });
        if !late_tabs.is_empty() {
            tracing::debug!(count = late_tabs.len(), "closed tabs opened during script deletion");
            self.tabs.forget_live_content(&late_tabs);
        }
        tracing::debug!(removed, "scripts deleted");

        if let Some(versioning) = &self.versioning {
            for id in script_ids {
                if let Err(e) = versioning.delete_script_history(id).await {
                    tracing::warn!(script_id = %id, error = %e, "failed to delete script history");
                }
            }
        }

        Ok(())
    }
}

fn script_tabs(snapshot: &SessionSnapshot, script_ids: &[ScriptId]) -> Vec<TabId> {
    script_ids
        .iter()
        .filter_map(|id| find_tab_by_resource(&snapshot.tabs, &ResourceKey::Script(id.clone())))
        .map(|tab| tab.id.clone())
        .collect()
}

fn replace_script<T>(
    snapshot: &SessionSnapshot,
    updated: SqlScript,
    value: T,
) -> Mutation<T> {
    let ops = writes::put_script(&updated).into_iter().collect();
    let mut scripts = (*snapshot.sql_scripts).clone();
    scripts.insert(updated.id.clone(), updated);
    Mutation::commit(SessionPatch::new().sql_scripts(scripts), ops, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SessionStore;
    use sqlbench_storage::PersistenceHandle;

    fn controller() -> ScriptController {
        let store = Arc::new(SessionStore::default());
        ScriptController::new(Arc::new(TabController::new(
            store,
            PersistenceHandle::detached(),
        )))
    }

    #[test]
    fn test_names_are_uniquified() {
        let scripts = controller();
        let a = scripts.create_sql_script(None, "");
        let b = scripts.create_sql_script(None, "");
        let c = scripts.create_sql_script(Some("report"), "");

        assert_eq!(a.name, "query");
        assert_eq!(b.name, "query_1");
        assert_eq!(c.name, "report");
    }

    #[test]
    fn test_rename_excludes_itself() {
        let scripts = controller();
        let a = scripts.create_sql_script(Some("a"), "");
        let b = scripts.create_sql_script(Some("b"), "");

        assert_eq!(scripts.rename_sql_script(&a.id, "a").unwrap().name, "a");
        assert_eq!(scripts.rename_sql_script(&b.id, "a").unwrap().name, "a_1");
        assert!(scripts.rename_sql_script(&ScriptId::new(), "x").unwrap_err().is_not_found());
    }

    #[test]
    fn test_content_update_short_circuits() {
        let scripts = controller();
        let script = scripts.create_sql_script(None, "select 1");

        assert!(!scripts.update_sql_script_content(&script.id, "select 1").unwrap());
        assert!(scripts.update_sql_script_content(&script.id, "select 2").unwrap());
        assert_eq!(scripts.get_sql_script(&script.id).unwrap().content, "select 2");
    }

    #[tokio::test]
    async fn test_delete_unknown_script_mutates_nothing() {
        let scripts = controller();
        let script = scripts.create_sql_script(None, "");
        let revision = scripts.tabs.store().revision();

        let err = scripts
            .delete_sql_scripts(&[script.id.clone(), ScriptId::new()])
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(scripts.tabs.store().revision(), revision);
        assert!(scripts.get_sql_script(&script.id).is_some());
    }
}
