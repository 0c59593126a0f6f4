//! Error types for the SQLite cache backend.

use launch_report_cache::CacheError;
use thiserror::Error;

/// Errors that can occur during SQLite cache operations.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// SQLite database operation failure.
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// Payload could not be encoded or decoded.
    #[error("payload error: {0}")]
    PayloadError(#[from] serde_json::Error),

    /// Database directory could not be created.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Table prefix contains invalid characters.
    #[error("invalid prefix '{0}': must contain only alphanumeric characters and underscores")]
    InvalidPrefix(String),
}

impl From<SqliteError> for CacheError {
    fn from(err: SqliteError) -> Self {
        CacheError::Backend(err.to_string())
    }
}

/// Convenience alias for results with [`SqliteError`].
pub type Result<T> = std::result::Result<T, SqliteError>;
