//! Bounded side cache of script data-view states
//!
//! When a script tab closes, its presentation state is parked here under the
//! script id. The next tab opened for that script takes it back out. Capacity
//! is fixed; the oldest insertion is evicted first.

use indexmap::IndexMap;
use sqlbench_core::{DataViewStateCache, ScriptId};

/// Default number of parked view states
pub const DEFAULT_VIEW_STATE_CACHE_CAPACITY: usize = 50;

#[derive(Debug)]
pub struct ScriptViewStateCache {
    entries: IndexMap<ScriptId, DataViewStateCache>,
    capacity: usize,
}

impl Default for ScriptViewStateCache {
    fn default() -> Self {
        Self::new(DEFAULT_VIEW_STATE_CACHE_CAPACITY)
    }
}

impl ScriptViewStateCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: IndexMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Park `state` for `script_id`. Re-inserting moves the entry to the back
    /// of the eviction order.
    pub fn insert(&mut self, script_id: ScriptId, state: DataViewStateCache) {
        self.entries.shift_remove(&script_id);
        while self.entries.len() >= self.capacity {
            if let Some((evicted, _)) = self.entries.shift_remove_index(0) {
                tracing::trace!(script_id = %evicted, "evicted parked view state");
            }
        }
        self.entries.insert(script_id, state);
    }

    /// Remove and return the parked state
    pub fn take(&mut self, script_id: &ScriptId) -> Option<DataViewStateCache> {
        self.entries.shift_remove(script_id)
    }

    pub fn contains(&self, script_id: &ScriptId) -> bool {
        self.entries.contains_key(script_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlbench_core::ViewMode;

    fn chart_state() -> DataViewStateCache {
        DataViewStateCache {
            view_mode: Some(ViewMode::Chart),
            ..Default::default()
        }
    }

    #[test]
    fn test_take_is_pop_once() {
        let mut cache = ScriptViewStateCache::default();
        let script_id = ScriptId::new();
        cache.insert(script_id.clone(), chart_state());

        assert_eq!(cache.take(&script_id), Some(chart_state()));
        assert_eq!(cache.take(&script_id), None);
    }

    #[test]
    fn test_oldest_entry_is_evicted() {
        let mut cache = ScriptViewStateCache::new(2);
        let ids: Vec<ScriptId> = (0..3).map(|_| ScriptId::new()).collect();
        for id in &ids {
            cache.insert(id.clone(), chart_state());
        }

        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(&ids[0]));
        assert!(cache.contains(&ids[1]));
        assert!(cache.contains(&ids[2]));
    }

    #[test]
    fn test_reinsert_refreshes_position() {
        let mut cache = ScriptViewStateCache::new(2);
        let a = ScriptId::new();
        let b = ScriptId::new();
        let c = ScriptId::new();

        cache.insert(a.clone(), chart_state());
        cache.insert(b.clone(), chart_state());
        cache.insert(a.clone(), DataViewStateCache::default());
        cache.insert(c.clone(), chart_state());

        assert!(cache.contains(&a));
        assert!(!cache.contains(&b));
        assert_eq!(cache.take(&a), Some(DataViewStateCache::default()));
    }
}
