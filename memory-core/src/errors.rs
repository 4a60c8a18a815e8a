//! Crate-wide error taxonomy.
//!
//! Every tier operation returns [`MemoryResult`]. Per-row failures during a
//! scan (malformed metadata, a dropped embedding) are logged and skipped by
//! the caller rather than propagated — only failures that abort the whole
//! operation become a `MemoryError`.

/// Top-level error type for the memory-tier store.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage i/o error: {0}")]
    StorageIo(#[from] rusqlite::Error),

    #[error("migration v{version:03} failed: {reason}")]
    MigrationFailed { version: u32, reason: String },

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("embedding engine unavailable")]
    EngineUnavailable,

    #[error("embedding engine failed: {0}")]
    EngineFailure(String),

    #[error("operation cancelled: {0}")]
    Cancelled(String),
}

impl From<serde_json::Error> for MemoryError {
    fn from(e: serde_json::Error) -> Self {
        MemoryError::Encoding(e.to_string())
    }
}

/// Convenience alias used throughout the workspace.
pub type MemoryResult<T> = Result<T, MemoryError>;
