//! SQLBench Core - data model and collaborator contracts of the session core
//!
//! This crate defines the types every other SQLBench crate agrees on:
//!
//! - Identifiers and the `make_id` factory
//! - `Tab` and its variants, `ResourceKey` for tab deduplication
//! - `SqlScript`, `DataSource`, comparison configuration
//! - `DataViewStateCache`, the per-tab presentation cache
//! - `WorkbenchError`, the shared error taxonomy
//! - `ScriptVersioning` and `AccessTracker`, the traits the tab controller
//!   calls into during its lifecycle operations

mod collaborators;
mod comparison;
mod data_source;
mod data_view;
mod error;
mod ids;
mod script;
mod tab;

pub use collaborators::*;
pub use comparison::*;
pub use data_source::*;
pub use data_view::*;
pub use error::*;
pub use ids::*;
pub use script::*;
pub use tab::*;
