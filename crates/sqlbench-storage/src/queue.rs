//! Background persistence queue
//!
//! The in-memory session is the source of truth for a running session; the
//! persistent store is an eventually consistent mirror. Mutations hand their
//! writes to a bounded queue and return immediately. A single worker task
//! drains the queue in order and applies each write to the store. Failures are
//! logged and dropped, never retried and never surfaced to the caller.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::StorageError;
use crate::store::PersistentStore;
use crate::table::{StoreOp, StoreTable};

/// Default queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

enum PersistMessage {
    Op(StoreOp),
    Transaction(Vec<StoreOp>),
    Flush(oneshot::Sender<()>),
}

/// Shared handler for failed persistence writes
pub fn report_persistence_failure(action: &str, error: &StorageError) {
    tracing::error!(action = %action, error = %error, "persistence write failed");
}

/// Cheap, cloneable sender side of the persistence queue
#[derive(Clone)]
pub struct PersistenceHandle {
    tx: mpsc::Sender<PersistMessage>,
}

impl PersistenceHandle {
    /// A handle whose writes go nowhere. Every enqueue is logged at debug level.
    pub fn detached() -> Self {
        let (tx, _rx) = mpsc::channel(1);
        Self { tx }
    }

    pub fn put(&self, table: StoreTable, key: impl Into<String>, value: serde_json::Value) {
        self.enqueue(PersistMessage::Op(StoreOp::put(table, key, value)));
    }

    /// Serialize `value` and enqueue a put; serialization failures are logged
    pub fn put_json<T: Serialize + ?Sized>(&self, table: StoreTable, key: impl Into<String>, value: &T) {
        let key = key.into();
        match serde_json::to_value(value) {
            Ok(value) => self.put(table, key, value),
            Err(e) => report_persistence_failure(
                &format!("serialize {}/{}", table, key),
                &StorageError::Serialization(e),
            ),
        }
    }

    pub fn delete(&self, table: StoreTable, key: impl Into<String>) {
        self.enqueue(PersistMessage::Op(StoreOp::delete(table, key)));
    }

    /// Enqueue a batch; more than one operation is applied as a transaction
    pub fn write_all(&self, mut ops: Vec<StoreOp>) {
        match ops.len() {
            0 => {}
            1 => {
                if let Some(op) = ops.pop() {
                    self.enqueue(PersistMessage::Op(op));
                }
            }
            _ => self.enqueue(PersistMessage::Transaction(ops)),
        }
    }

    /// Enqueue operations to be applied atomically
    pub fn transaction(&self, ops: Vec<StoreOp>) {
        if ops.is_empty() {
            return;
        }
        self.enqueue(PersistMessage::Transaction(ops));
    }

    /// Wait until everything enqueued before this call has been applied.
    ///
    /// Returns immediately when no worker is running.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(PersistMessage::Flush(done_tx)).await.is_err() {
            return;
        }
        let _ = done_rx.await;
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn enqueue(&self, message: PersistMessage) {
        match self.tx.try_send(message) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::error!("persistence queue full, dropping write");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("persistence queue closed, dropping write");
            }
        }
    }
}

/// Receiver side of the persistence queue; applies writes to the store
pub struct PersistenceWorker {
    store: Arc<dyn PersistentStore>,
    rx: mpsc::Receiver<PersistMessage>,
}

impl PersistenceWorker {
    /// Create a queue of `capacity` pending writes in front of `store`
    pub fn new(store: Arc<dyn PersistentStore>, capacity: usize) -> (PersistenceHandle, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (PersistenceHandle { tx }, Self { store, rx })
    }

    /// Create the queue and run the worker on the current tokio runtime
    pub fn spawn(
        store: Arc<dyn PersistentStore>,
        capacity: usize,
    ) -> (PersistenceHandle, JoinHandle<()>) {
        let (handle, worker) = Self::new(store, capacity);
        let task = tokio::spawn(worker.run());
        (handle, task)
    }

    /// Drain the queue until every handle is dropped
    pub async fn run(mut self) {
        tracing::debug!("persistence worker started");

        while let Some(message) = self.rx.recv().await {
            match message {
                PersistMessage::Op(op) => {
                    if let Err(e) = self.store.apply(&op).await {
                        report_persistence_failure(
                            &format!("{} {}/{}", op_verb(&op), op.table(), op.key()),
                            &e,
                        );
                    }
                }
                PersistMessage::Transaction(ops) => {
                    if let Err(e) = self.store.transaction(&ops).await {
                        report_persistence_failure(
                            &format!("transaction of {} operations", ops.len()),
                            &e,
                        );
                    }
                }
                PersistMessage::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }

        tracing::debug!("persistence worker stopped");
    }
}

fn op_verb(op: &StoreOp) -> &'static str {
    match op {
        StoreOp::Put { .. } => "put",
        StoreOp::Delete { .. } => "delete",
    }
}
