//! In-process cache backend.

use std::collections::HashMap;

use chrono::Duration;
use launch_report_core::QueryFingerprint;
use serde_json::Value;

use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::store::{CacheEntry, CacheStore};

/// Cache store that lives only as long as the process.
///
/// # Examples
///
/// ```
/// use chrono::Duration;
/// use launch_report_cache::{CacheStore, MemoryStore};
/// use launch_report_core::QueryParams;
///
/// let mut store = MemoryStore::new(Duration::hours(1));
/// let fingerprint = QueryParams::new("demo", 1, 20).fingerprint();
/// store.put(&fingerprint, &serde_json::json!({"content": []})).unwrap();
/// assert!(store.get(&fingerprint).unwrap().is_some());
/// ```
pub struct MemoryStore<C: Clock = SystemClock> {
    entries: HashMap<QueryFingerprint, CacheEntry>,
    ttl: Duration,
    clock: C,
}

impl MemoryStore<SystemClock> {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, SystemClock)
    }
}

impl<C: Clock> MemoryStore<C> {
    pub fn with_clock(ttl: Duration, clock: C) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            clock,
        }
    }

    /// Number of stored entries, fresh or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<C: Clock> CacheStore for MemoryStore<C> {
    fn get(&self, fingerprint: &QueryFingerprint) -> Result<Option<Value>> {
        let now = self.clock.now();
        Ok(self
            .entries
            .get(fingerprint)
            .filter(|entry| entry.is_fresh(now, self.ttl))
            .map(|entry| entry.payload.clone()))
    }

    fn put(&mut self, fingerprint: &QueryFingerprint, payload: &Value) -> Result<()> {
        let entry = CacheEntry {
            fetched_at: self.clock.now(),
            payload: payload.clone(),
        };
        self.entries.insert(fingerprint.clone(), entry);
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }
}
