//! Commit-then-persist plumbing shared by the controllers

use sqlbench_core::Result;
use sqlbench_storage::{PersistenceHandle, StoreOp};

use crate::store::{SessionPatch, SessionSnapshot, SessionStore};

/// What an operation wants to do with the snapshot it was handed
pub(crate) struct Mutation<T> {
    patch: Option<SessionPatch>,
    writes: Vec<StoreOp>,
    value: T,
}

impl<T> Mutation<T> {
    /// Leave the store alone
    pub(crate) fn none(value: T) -> Self {
        Self {
            patch: None,
            writes: Vec::new(),
            value,
        }
    }

    pub(crate) fn commit(patch: SessionPatch, writes: Vec<StoreOp>, value: T) -> Self {
        Self {
            patch: Some(patch),
            writes,
            value,
        }
    }

    /// Split into patch, writes and value, for folding into a larger commit
    pub(crate) fn into_parts(self) -> (Option<SessionPatch>, Vec<StoreOp>, T) {
        (self.patch, self.writes, self.value)
    }
}

/// Run `f` under the store's writer lock, commit its patch and enqueue its
/// writes. Writes are enqueued before the lock is released, so the
/// persistence queue sees batches in commit order.
pub(crate) fn apply<T, F>(store: &SessionStore, persistence: &PersistenceHandle, f: F) -> (T, bool)
where
    F: FnOnce(&SessionSnapshot) -> Mutation<T>,
{
    store.update_with(|snapshot| {
        let Mutation {
            patch,
            writes,
            value,
        } = f(snapshot);
        if patch.as_ref().is_some_and(|p| !p.is_empty()) {
            persistence.write_all(writes);
        }
        (patch, value)
    })
}

/// Fallible [`apply`]; an error leaves both the store and the queue untouched
pub(crate) fn try_apply<T, F>(
    store: &SessionStore,
    persistence: &PersistenceHandle,
    f: F,
) -> Result<(T, bool)>
where
    F: FnOnce(&SessionSnapshot) -> Result<Mutation<T>>,
{
    store.try_update(|snapshot| {
        let Mutation {
            patch,
            writes,
            value,
        } = f(snapshot)?;
        if patch.as_ref().is_some_and(|p| !p.is_empty()) {
            persistence.write_all(writes);
        }
        Ok((patch, value))
    })
}
