//! Comparison tab operations
//!
//! Comparison tabs are not deduplicated by resource: each one is its own
//! comparison. Their names share a namespace with script names.

use chrono::{DateTime, Utc};
use sqlbench_core::{
    ComparisonConfig, ComparisonId, ComparisonTab, SchemaComparisonResult, Tab, TabId, TabKind,
    make_id,
};

use crate::mutation::Mutation;
use crate::tab_algebra::{names_in_use, unique_name};
use crate::tab_controller::{TabController, report_type_mismatch};

/// Base name of new comparisons
pub const DEFAULT_COMPARISON_NAME: &str = "comparison";

impl TabController {
    /// Open a new comparison tab, named uniquely against scripts and other
    /// comparisons
    pub fn create_comparison_tab(
        &self,
        name: Option<&str>,
        config: Option<ComparisonConfig>,
        set_active: bool,
    ) -> Tab {
        let base = name.unwrap_or(DEFAULT_COMPARISON_NAME);
        let (tab, _) = self.apply(|snapshot| {
            let taken = names_in_use(&snapshot.sql_scripts, &snapshot.tabs, None, None);
            let comparison = ComparisonTab {
                comparison_id: make_id::<ComparisonId>(),
                name: unique_name(base, taken),
                config,
                schema_comparison: None,
                viewing_results: false,
                last_execution_time: None,
            };
            self.append_tab(snapshot, Tab::new(make_id(), TabKind::Comparison(comparison)))
        });
        self.activate_if(set_active, &tab);
        tab
    }

    /// Replace the comparison config. The stored schema comparison belongs to
    /// the old sources and is dropped with it.
    pub fn update_comparison_tab_config(
        &self,
        tab_id: &TabId,
        config: Option<ComparisonConfig>,
    ) -> bool {
        self.edit_comparison(tab_id, "update_comparison_tab_config", |comparison| {
            if comparison.config != config {
                comparison.config = config;
                comparison.schema_comparison = None;
            }
        })
    }

    /// Switch between the configuration and results views
    pub fn set_comparison_tab_viewing_results(&self, tab_id: &TabId, viewing_results: bool) -> bool {
        self.edit_comparison(tab_id, "set_comparison_tab_viewing_results", |comparison| {
            comparison.viewing_results = viewing_results;
        })
    }

    pub fn update_comparison_tab_schema_result(
        &self,
        tab_id: &TabId,
        result: Option<SchemaComparisonResult>,
    ) -> bool {
        self.edit_comparison(tab_id, "update_comparison_tab_schema_result", |comparison| {
            comparison.schema_comparison = result;
        })
    }

    /// Record a finished run and show its results
    pub fn mark_comparison_tab_executed(&self, tab_id: &TabId, at: DateTime<Utc>) -> bool {
        self.edit_comparison(tab_id, "mark_comparison_tab_executed", |comparison| {
            comparison.last_execution_time = Some(at);
            comparison.viewing_results = true;
        })
    }

    /// Rename a comparison. Returns the name it ended up with, which differs
    /// from `name` when that is taken.
    pub fn rename_comparison_tab(&self, tab_id: &TabId, name: &str) -> Option<String> {
        let (renamed, _) = self.apply(|snapshot| {
            let Some(tab) = snapshot.tabs.get(tab_id) else {
                return Mutation::none(None);
            };
            let Some(comparison) = tab.as_comparison() else {
                report_type_mismatch(tab, "comparison", "rename_comparison_tab");
                return Mutation::none(None);
            };

            let taken = names_in_use(&snapshot.sql_scripts, &snapshot.tabs, None, Some(tab_id));
            let final_name = unique_name(name, taken);
            if comparison.name == final_name {
                return Mutation::none(Some(final_name));
            }

            let mut updated = tab.clone();
            if let TabKind::Comparison(comparison) = &mut updated.kind {
                comparison.name = final_name.clone();
            }
            self.replace_tab(snapshot, updated, Some(final_name))
        });
        renamed
    }

    fn edit_comparison<F>(&self, tab_id: &TabId, operation: &str, f: F) -> bool
    where
        F: FnOnce(&mut ComparisonTab),
    {
        self.edit_tab(tab_id, |tab| {
            let TabKind::Comparison(comparison) = &tab.kind else {
                report_type_mismatch(tab, "comparison", operation);
                return None;
            };
            let mut edited = comparison.clone();
            f(&mut edited);
            if &edited == comparison {
                return None;
            }
            let mut updated = tab.clone();
            updated.kind = TabKind::Comparison(edited);
            Some(updated)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{SessionSnapshot, SessionStore};
    use sqlbench_core::{ComparisonSource, SqlScript};
    use sqlbench_storage::PersistenceHandle;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn controller() -> TabController {
        let script = SqlScript::new("comparison", "");
        let store = Arc::new(SessionStore::new(SessionSnapshot {
            sql_scripts: Arc::new(HashMap::from([(script.id.clone(), script)])),
            ..Default::default()
        }));
        TabController::new(store, PersistenceHandle::detached())
    }

    fn comparison(tab: &Tab) -> &ComparisonTab {
        tab.as_comparison().unwrap()
    }

    #[test]
    fn test_comparison_names_avoid_script_names() {
        let controller = controller();
        let first = controller.create_comparison_tab(None, None, true);
        let second = controller.create_comparison_tab(None, None, false);

        assert_eq!(comparison(&first).name, "comparison_1");
        assert_eq!(comparison(&second).name, "comparison_2");
        assert_eq!(controller.tab_count(), 2);
        assert_eq!(controller.store().snapshot().active_tab_id, Some(first.id));
    }

    #[test]
    fn test_config_change_drops_schema_result() {
        let controller = controller();
        let tab = controller.create_comparison_tab(Some("orders diff"), None, false);

        assert!(controller.update_comparison_tab_schema_result(
            &tab.id,
            Some(SchemaComparisonResult::default())
        ));

        let config = ComparisonConfig {
            source_a: Some(ComparisonSource::Query {
                sql: "select 1".into(),
                alias: "a".into(),
            }),
            ..Default::default()
        };
        assert!(controller.update_comparison_tab_config(&tab.id, Some(config.clone())));
        assert!(!controller.update_comparison_tab_config(&tab.id, Some(config)));

        let updated = controller.get_tab(&tab.id).unwrap();
        assert!(comparison(&updated).schema_comparison.is_none());
    }

    #[test]
    fn test_mark_executed_shows_results() {
        let controller = controller();
        let tab = controller.create_comparison_tab(None, None, false);
        let now = Utc::now();

        assert!(controller.mark_comparison_tab_executed(&tab.id, now));
        let updated = controller.get_tab(&tab.id).unwrap();
        assert!(comparison(&updated).viewing_results);
        assert_eq!(comparison(&updated).last_execution_time, Some(now));

        assert!(controller.set_comparison_tab_viewing_results(&tab.id, false));
        assert!(!controller.set_comparison_tab_viewing_results(&tab.id, false));
    }

    #[test]
    fn test_rename_uniquifies_and_keeps_own_name() {
        let controller = controller();
        let a = controller.create_comparison_tab(Some("a"), None, false);
        let b = controller.create_comparison_tab(Some("b"), None, false);

        assert_eq!(controller.rename_comparison_tab(&b.id, "a").as_deref(), Some("a_1"));
        assert_eq!(controller.rename_comparison_tab(&a.id, "a").as_deref(), Some("a"));
        assert_eq!(controller.rename_comparison_tab(&TabId::new(), "x"), None);
    }
}
