//! Error types for SQLBench

use thiserror::Error;

/// Kind of entity a lookup failed to resolve
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityKind {
    Tab,
    Script,
    DataSource,
    Comparison,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Tab => "tab",
            EntityKind::Script => "script",
            EntityKind::DataSource => "data source",
            EntityKind::Comparison => "comparison",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Core error type for session operations
#[derive(Error, Debug)]
pub enum WorkbenchError {
    /// An id did not resolve. Raised before any state is touched.
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    /// A variant-specific operation was invoked on the wrong tab variant
    #[error("tab {tab_id} is a {actual} tab, expected {expected}")]
    TypeMismatch {
        tab_id: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("invalid tab order: {0}")]
    InvalidTabOrder(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("versioning error: {0}")]
    Versioning(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkbenchError {
    pub fn not_found(kind: EntityKind, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, WorkbenchError>;
