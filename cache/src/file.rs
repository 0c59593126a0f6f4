//! JSON-file cache backend.
//!
//! One file holds every entry of a namespace:
//!
//! ```json
//! {
//!   "version": 1,
//!   "entries": {
//!     "<fingerprint>": { "fetched_at": "2024-05-01T12:00:00Z", "payload": { "content": [] } }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use chrono::Duration;
use launch_report_core::QueryFingerprint;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{CacheError, Result};
use crate::store::{CacheEntry, CacheStore};

const FILE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    entries: BTreeMap<QueryFingerprint, CacheEntry>,
}

/// File-backed cache store.
pub struct JsonFileStore<C: Clock = SystemClock> {
    path: PathBuf,
    ttl: Duration,
    clock: C,
}

impl JsonFileStore<SystemClock> {
    pub fn new(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self::with_clock(path, ttl, SystemClock)
    }
}

impl<C: Clock> JsonFileStore<C> {
    pub fn with_clock(path: impl Into<PathBuf>, ttl: Duration, clock: C) -> Self {
        Self {
            path: path.into(),
            ttl,
            clock,
        }
    }

    /// Reads the cache file. A missing file is an empty cache.
    fn load(&self) -> Result<CacheFile> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(CacheFile::default()),
            Err(source) => {
                return Err(CacheError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        serde_json::from_str(&raw).map_err(|source| CacheError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Writes the cache file through a sibling temp file and a rename.
    fn save(&self, file: &CacheFile) -> Result<()> {
        let io_err = |source| CacheError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        let json = serde_json::to_string_pretty(file)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }
}

impl<C: Clock> CacheStore for JsonFileStore<C> {
    fn get(&self, fingerprint: &QueryFingerprint) -> Result<Option<Value>> {
        let file = self.load()?;
        let Some(entry) = file.entries.get(fingerprint) else {
            debug!(%fingerprint, "cache miss: no entry");
            return Ok(None);
        };
        if !entry.is_fresh(self.clock.now(), self.ttl) {
            debug!(%fingerprint, fetched_at = %entry.fetched_at, "cache miss: entry expired");
            return Ok(None);
        }
        debug!(%fingerprint, fetched_at = %entry.fetched_at, "cache hit");
        Ok(Some(entry.payload.clone()))
    }

    fn put(&mut self, fingerprint: &QueryFingerprint, payload: &Value) -> Result<()> {
        let mut file = match self.load() {
            Ok(file) => file,
            Err(err @ CacheError::Corrupt { .. }) => {
                warn!(error = %err, "discarding unreadable cache file");
                CacheFile::default()
            }
            Err(err) => return Err(err),
        };

        let now = self.clock.now();
        let ttl = self.ttl;
        file.entries.retain(|_, entry| entry.is_fresh(now, ttl));
        file.entries.insert(
            fingerprint.clone(),
            CacheEntry {
                fetched_at: now,
                payload: payload.clone(),
            },
        );
        file.version = FILE_FORMAT_VERSION;
        self.save(&file)
    }

    fn clear(&mut self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CacheError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn fp(tag: &str) -> QueryFingerprint {
        QueryFingerprint::from_hex(format!("{tag:0>64}"))
    }

    fn clock() -> ManualClock {
        ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap())
    }

    #[test]
    fn test_put_then_get_returns_payload_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileStore::with_clock(dir.path().join("demo.json"), Duration::hours(1), clock());
        let payload = json!({"content": [{"id": 1, "name": "nightly"}], "page": {"number": 1}});

        store.put(&fp("a"), &payload).unwrap();
        assert_eq!(store.get(&fp("a")).unwrap(), Some(payload));
    }

    #[test]
    fn test_get_misses_after_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let clock = clock();
        let mut store = JsonFileStore::with_clock(dir.path().join("demo.json"), Duration::hours(1), clock.clone());
        store.put(&fp("a"), &json!({"content": []})).unwrap();

        clock.advance(Duration::minutes(59));
        assert!(store.get(&fp("a")).unwrap().is_some());

        clock.advance(Duration::minutes(1));
        assert!(store.get(&fp("a")).unwrap().is_none());
    }

    #[test]
    fn test_missing_file_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("absent.json"), Duration::hours(1));
        assert!(store.get(&fp("a")).unwrap().is_none());
    }

    #[test]
    fn test_put_overwrites_and_restamps() {
        let dir = tempfile::tempdir().unwrap();
        let clock = clock();
        let mut store = JsonFileStore::with_clock(dir.path().join("demo.json"), Duration::hours(1), clock.clone());
        store.put(&fp("a"), &json!({"v": 1})).unwrap();

        clock.advance(Duration::minutes(50));
        store.put(&fp("a"), &json!({"v": 2})).unwrap();

        clock.advance(Duration::minutes(50));
        assert_eq!(store.get(&fp("a")).unwrap(), Some(json!({"v": 2})));
    }

    #[test]
    fn test_put_prunes_expired_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.json");
        let clock = clock();
        let mut store = JsonFileStore::with_clock(&path, Duration::hours(1), clock.clone());
        store.put(&fp("old"), &json!({})).unwrap();
        clock.advance(Duration::hours(2));
        store.put(&fp("new"), &json!({})).unwrap();

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let entries = raw["entries"].as_object().unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries.contains_key(fp("new").as_str()));
    }

    #[test]
    fn test_clear_removes_all_entries() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileStore::with_clock(dir.path().join("demo.json"), Duration::hours(1), clock());
        store.put(&fp("a"), &json!({})).unwrap();
        store.put(&fp("b"), &json!({})).unwrap();

        store.clear().unwrap();
        assert!(store.get(&fp("a")).unwrap().is_none());
        assert!(store.get(&fp("b")).unwrap().is_none());
        // Clearing twice is fine.
        store.clear().unwrap();
    }

    #[test]
    fn test_corrupt_file_errors_on_get_and_is_replaced_on_put() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.json");
        fs::write(&path, "{not json").unwrap();
        let mut store = JsonFileStore::with_clock(&path, Duration::hours(1), clock());

        assert!(matches!(store.get(&fp("a")), Err(CacheError::Corrupt { .. })));

        store.put(&fp("a"), &json!({"ok": true})).unwrap();
        assert_eq!(store.get(&fp("a")).unwrap(), Some(json!({"ok": true})));
    }

    #[test]
    fn test_put_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache").join("demo.json");
        let mut store = JsonFileStore::with_clock(&path, Duration::hours(1), clock());
        store.put(&fp("a"), &json!({})).unwrap();
        assert!(path.exists());
    }
}
