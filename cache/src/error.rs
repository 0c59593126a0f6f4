//! Error types for cache store operations.
//!
//! Cache errors are never fatal to a report run: callers log them and fall
//! back to a live fetch.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading or writing a cache store.
#[derive(Debug, Error)]
pub enum CacheError {
    /// File I/O failure on the cache file.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The cache file exists but does not contain valid cache JSON.
    #[error("corrupt cache file '{path}': {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Payload or entry serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failure reported by a backend that is not file based.
    #[error("cache backend error: {0}")]
    Backend(String),
}

/// Convenience alias for results with [`CacheError`].
pub type Result<T> = std::result::Result<T, CacheError>;
