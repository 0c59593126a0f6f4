//! The cache store contract and the entry type shared by all backends.

use chrono::{DateTime, Duration, Utc};
use launch_report_core::QueryFingerprint;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Key-value store of raw launch pages, keyed by query fingerprint.
///
/// Implementations answer freshness themselves: [`get`](Self::get) returns
/// `Ok(None)` both for absent and for expired entries. Errors are reserved for
/// a store that cannot be read or written at all.
pub trait CacheStore {
    /// Returns the payload stored for `fingerprint` if it is still fresh.
    fn get(&self, fingerprint: &QueryFingerprint) -> Result<Option<Value>>;

    /// Stores `payload`, replacing any entry for `fingerprint` and stamping
    /// the current time.
    fn put(&mut self, fingerprint: &QueryFingerprint, payload: &Value) -> Result<()>;

    /// Removes every entry.
    fn clear(&mut self) -> Result<()>;
}

impl<S: CacheStore + ?Sized> CacheStore for Box<S> {
    fn get(&self, fingerprint: &QueryFingerprint) -> Result<Option<Value>> {
        (**self).get(fingerprint)
    }

    fn put(&mut self, fingerprint: &QueryFingerprint, payload: &Value) -> Result<()> {
        (**self).put(fingerprint, payload)
    }

    fn clear(&mut self) -> Result<()> {
        (**self).clear()
    }
}

/// One cached launch page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fetched_at: DateTime<Utc>,
    pub payload: Value,
}

impl CacheEntry {
    /// An entry is fresh while `now - fetched_at < ttl`.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::{Duration, TimeZone, Utc};
    /// use launch_report_cache::CacheEntry;
    ///
    /// let fetched_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    /// let entry = CacheEntry { fetched_at, payload: serde_json::json!({}) };
    /// let ttl = Duration::hours(1);
    /// assert!(entry.is_fresh(fetched_at + Duration::minutes(59), ttl));
    /// assert!(!entry.is_fresh(fetched_at + Duration::hours(1), ttl));
    /// ```
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.fetched_at < ttl
    }
}
