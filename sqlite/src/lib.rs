//! SQLite backend for the launch page cache.
//!
//! [`SqliteCacheStore`] implements
//! [`CacheStore`](launch_report_cache::CacheStore) on top of a single table,
//! `{prefix}cache_entries`, with one row per `(namespace, fingerprint)`.
//! Several services can share one database file; each store only sees the
//! rows of its own namespace.
//!
//! # Quick start
//!
//! ```no_run
//! use chrono::Duration;
//! use launch_report_cache::{CacheStore, default_cache_dir};
//! use launch_report_core::QueryParams;
//! use launch_report_sqlite::SqliteCacheStore;
//!
//! let path = default_cache_dir().join("cache.db");
//! let mut store = SqliteCacheStore::open(path, "rp.example.com", Duration::hours(1)).unwrap();
//!
//! let fingerprint = QueryParams::new("demo", 1, 20).fingerprint();
//! if store.get(&fingerprint).unwrap().is_none() {
//!     store.put(&fingerprint, &serde_json::json!({"content": []})).unwrap();
//! }
//! ```
//!
//! # Table prefix customization
//!
//! Table names are prefixed with a configurable string (default `lr_`).
//! Prefixes must contain only alphanumeric characters and underscores.

mod error;
mod schema;
mod store;

pub use error::{Result, SqliteError};
pub use schema::generate_schema_sql;
pub use store::{DEFAULT_PREFIX, SqliteCacheStore};
