use thiserror::Error;

/// Domain-level storage failures. Raw sqlx errors are translated into these
/// at the repository boundary; nothing above it sees a database error type.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to save statistics: {0}")]
    SaveFailed(String),

    #[error("failed to create banner: {0}")]
    CreateFailed(String),

    #[error("banner name already exists")]
    NameConflict,

    #[error("failed to execute stats query: {0}")]
    QueryFailed(String),

    #[error("failed to scan stats row: {0}")]
    ScanFailed(String),
}
