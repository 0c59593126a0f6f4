//! TTL cache stores for fetched launch pages.
//!
//! Every backend implements [`CacheStore`]: `get` answers only with fresh
//! entries, `put` overwrites and restamps, `clear` drops everything. The
//! reporting pipeline talks to the trait alone, so the backing store can be
//! swapped without touching it.
//!
//! - [`JsonFileStore`]: one JSON file per namespace (the default).
//! - [`MemoryStore`]: in-process, used by tests.
//!
//! Freshness is judged against a [`Clock`]; [`ManualClock`] makes expiry
//! testable without sleeping.
//!
//! # Quick start
//!
//! ```no_run
//! use chrono::Duration;
//! use launch_report_cache::{CacheStore, JsonFileStore, default_cache_dir, namespace_file};
//! use launch_report_core::QueryParams;
//!
//! let path = namespace_file(default_cache_dir(), "rp.example.com");
//! let mut store = JsonFileStore::new(path, Duration::hours(1));
//! let fingerprint = QueryParams::new("demo", 1, 20).fingerprint();
//!
//! if store.get(&fingerprint).unwrap().is_none() {
//!     store.put(&fingerprint, &serde_json::json!({"content": []})).unwrap();
//! }
//! ```

mod clock;
mod error;
mod file;
mod memory;
mod paths;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CacheError, Result};
pub use file::JsonFileStore;
pub use memory::MemoryStore;
pub use paths::{default_cache_dir, namespace_file, namespace_for};
pub use store::{CacheEntry, CacheStore};
