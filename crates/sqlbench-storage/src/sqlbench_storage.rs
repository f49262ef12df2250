//! SQLBench Storage - the persistent store adapter
//!
//! The session core mirrors its in-memory state into a transactional key/value
//! store with one table per entity kind:
//!
//! | Table | Key | Value |
//! |---|---|---|
//! | `tabs` | tab id | tab record |
//! | `sql_scripts` | script id | script record |
//! | `content_view` | `activeTabId`, `previewTabId`, `tabOrder` | singleton values |
//! | `script_access_time` | script id | last used timestamp |
//! | `data_sources` | data source id | data source record |
//! | `data_source_access_time` | data source id | last used timestamp |
//! | `table_access_time` | `db.schema.table` | last accessed timestamp |
//!
//! Writes flow through [`PersistenceHandle`] into a bounded queue drained by a
//! [`PersistenceWorker`]; see `queue` for the delivery guarantees.

mod error;
mod memory;
mod queue;
mod sqlite;
mod store;
mod table;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use queue::{
    DEFAULT_QUEUE_CAPACITY, PersistenceHandle, PersistenceWorker, report_persistence_failure,
};
pub use sqlite::SqliteStore;
pub use store::PersistentStore;
pub use table::{ACTIVE_TAB_ID_KEY, PREVIEW_TAB_ID_KEY, StoreOp, StoreTable, TAB_ORDER_KEY};
