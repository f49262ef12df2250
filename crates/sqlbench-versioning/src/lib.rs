//! SQLBench Versioning - local version history for SQL scripts
//!
//! Every script keeps a chain of versions in a local SQLite database. Versions
//! are recorded on explicit save, before runs, and when a script's tab is
//! closed, but only when the content differs from the latest stored version.
//!
//! # Example
//!
//! ```rust,ignore
//! use sqlbench_versioning::ScriptVersionRepository;
//! use sqlbench_core::{ScriptId, VersionOrigin};
//!
//! let repo = ScriptVersionRepository::new()?.with_max_versions(100);
//! let script_id = ScriptId::new();
//!
//! let v1 = repo.commit(&script_id, "select 1".into(), VersionOrigin::Manual)?;
//! let v2 = repo.commit(&script_id, "select 2".into(), VersionOrigin::Manual)?;
//!
//! let diff = repo.diff(&v1.id, &v2.id)?;
//! println!("{}", diff.unified_diff);
//! ```

mod diff;
mod repository;
mod storage;

pub use diff::{Change, ChangeType, DiffEngine, DiffStats};
pub use repository::{CurrentDiff, ScriptVersion, ScriptVersionRepository, VersionDiff};
pub use storage::VersionStorage;
