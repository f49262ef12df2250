use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by persistent store implementations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage task failed: {0}")]
    Task(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<StorageError> for sqlbench_core::WorkbenchError {
    fn from(err: StorageError) -> Self {
        sqlbench_core::WorkbenchError::Persistence(err.to_string())
    }
}
