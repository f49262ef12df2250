//! Data source registry of the session

use sqlbench_core::{DataSource, DataSourceId, TabId};
use sqlbench_storage::{StoreOp, StoreTable};
use std::sync::Arc;

use crate::mutation::Mutation;
use crate::store::{SessionPatch, SessionSnapshot};
use crate::tab_algebra::find_tabs_by_data_source;
use crate::tab_controller::{TabController, remove_tabs};
use crate::writes;

pub struct DataSourceController {
    tabs: Arc<TabController>,
}

impl DataSourceController {
    pub fn new(tabs: Arc<TabController>) -> Self {
        Self { tabs }
    }

    /// Register a data source, replacing any source with the same id
    pub fn add_data_source(&self, data_source: DataSource) -> DataSource {
        let (added, _) = self.tabs.apply(|snapshot| {
            if snapshot.data_sources.get(data_source.id()) == Some(&data_source) {
                return Mutation::none(data_source);
            }
            let mut sources = (*snapshot.data_sources).clone();
            sources.insert(data_source.id().clone(), data_source.clone());
            let ops = writes::put_data_source(&data_source).into_iter().collect();

            tracing::debug!(
                data_source_id = %data_source.id(),
                name = data_source.sql_name(),
                "data source added"
            );
            Mutation::commit(SessionPatch::new().data_sources(sources), ops, data_source)
        });
        added
    }

    pub fn get_data_source(&self, data_source_id: &DataSourceId) -> Option<DataSource> {
        self.tabs
            .store()
            .snapshot()
            .data_sources
            .get(data_source_id)
            .cloned()
    }

    /// All sources, sorted by SQL name
    pub fn list_data_sources(&self) -> Vec<DataSource> {
        let mut sources: Vec<DataSource> = self
            .tabs
            .store()
            .snapshot()
            .data_sources
            .values()
            .cloned()
            .collect();
        sources.sort_by(|a, b| a.sql_name().cmp(b.sql_name()));
        sources
    }

    /// Remove sources and close every tab showing them. Unknown ids are
    /// skipped. Returns how many sources were removed.
    #[tracing::instrument(skip(self, data_source_ids), fields(count = data_source_ids.len()))]
    pub async fn remove_data_sources(&self, data_source_ids: &[DataSourceId]) -> usize {
        let tab_ids = source_tabs(&self.tabs.store().snapshot(), data_source_ids);
        self.tabs.delete_tab(&tab_ids).await;

        // Tabs opened for these sources while the closes above were awaiting
        // are removed in the same commit as the sources
        let ((removed, late_tabs), _) = self.tabs.apply(|snapshot| {
            let late_tabs = source_tabs(snapshot, data_source_ids);
            let present: Vec<&DataSourceId> = data_source_ids
                .iter()
                .filter(|id| snapshot.data_sources.contains_key(*id))
                .collect();
            if present.is_empty() && late_tabs.is_empty() {
                return Mutation::none((0, late_tabs));
            }

            let (tab_patch, mut ops, _) = remove_tabs(snapshot, &late_tabs).into_parts();
            let mut sources = (*snapshot.data_sources).clone();
            let mut access_times = (*snapshot.access_times).clone();
            for id in &present {
                sources.remove(*id);
                access_times.data_sources.remove(*id);
                ops.push(StoreOp::delete(StoreTable::DataSources, id.to_string()));
                ops.push(StoreOp::delete(StoreTable::DataSourceAccessTime, id.to_string()));
            }

            Mutation::commit(
                tab_patch
                    .unwrap_or_default()
                    .data_sources(sources)
                    .access_times(access_times),
                ops,
                (present.len(), late_tabs),
            )
        });
        if !late_tabs.is_empty() {
            tracing::debug!(count = late_tabs.len(), "closed tabs opened during data source removal");
            self.tabs.forget_live_content(&late_tabs);
        }
        removed
    }
}

fn source_tabs(snapshot: &SessionSnapshot, data_source_ids: &[DataSourceId]) -> Vec<TabId> {
    data_source_ids
        .iter()
        .flat_map(|id| find_tabs_by_data_source(&snapshot.tabs, id))
        .map(|tab| tab.id.clone())
        .collect()
}
