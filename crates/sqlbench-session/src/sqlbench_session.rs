//! SQLBench Session - tab and session lifecycle
//!
//! This crate keeps the open tabs of a workbench consistent:
//!
//! - [`SessionStore`]: the in-memory snapshot, single writer, copy-on-write
//! - [`tab_algebra`]: pure functions over tab maps and orders
//! - [`TabController`]: find-or-create, updates, preview handling, deletion
//! - [`ScriptController`], [`DataSourceController`]: the entities tabs point at
//! - [`SessionAccessTracker`]: last-used bookkeeping
//! - [`restore_session`]: loading and repairing a persisted session
//! - [`Workbench`]: all of the above wired over one persistent store
//!
//! # Example
//!
//! ```rust,ignore
//! use sqlbench_session::{Workbench, WorkbenchOptions};
//! use sqlbench_storage::SqliteStore;
//!
//! let backend = Arc::new(SqliteStore::new()?);
//! let workbench = Workbench::open(backend, None, WorkbenchOptions::default()).await;
//!
//! let script = workbench.scripts().create_sql_script(None, "select 42");
//! let tab = workbench.tabs().get_or_create_tab_from_script(&script.id, true)?;
//! workbench.tabs().delete_tab(&[tab.id]).await;
//! workbench.shutdown().await;
//! ```

mod access_tracker;
mod comparison_tabs;
mod data_source_controller;
mod mutation;
mod resolve;
mod restore;
mod script_controller;
mod store;
pub mod tab_algebra;
mod tab_controller;
mod view_state_cache;
mod workbench;
mod writes;

pub use access_tracker::SessionAccessTracker;
pub use comparison_tabs::DEFAULT_COMPARISON_NAME;
pub use data_source_controller::DataSourceController;
pub use resolve::{ensure_database_data_source, ensure_flat_file_data_source, ensure_script, ensure_tab};
pub use restore::restore_session;
pub use script_controller::{DEFAULT_SCRIPT_NAME, ScriptController};
pub use store::{AccessTimes, SessionPatch, SessionSnapshot, SessionStore, TabExecutionError};
pub use tab_controller::{
    DEFAULT_PANE_SPLIT, SchemaBrowserTabOptions, StaleDataCacheUpdate, StaleDataUpdate,
    TabController, UpdateLastExecutedQuery,
};
pub use view_state_cache::{DEFAULT_VIEW_STATE_CACHE_CAPACITY, ScriptViewStateCache};
pub use workbench::{Workbench, WorkbenchOptions};
