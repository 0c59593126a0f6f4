//! [`CacheStore`] implementation over a SQLite table.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Duration};
use launch_report_cache::{CacheEntry, CacheStore, Clock, SystemClock};
use launch_report_core::QueryFingerprint;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::schema::{generate_schema_sql, validate_prefix};

/// Default table prefix.
pub const DEFAULT_PREFIX: &str = "lr_";

/// SQLite-backed cache store.
///
/// Rows are scoped to a namespace (usually the service host), so one database
/// file can serve several services. [`clear`](CacheStore::clear) only drops
/// the rows of this store's namespace.
///
/// # Examples
///
/// ```
/// use chrono::Duration;
/// use launch_report_cache::CacheStore;
/// use launch_report_core::QueryParams;
/// use launch_report_sqlite::SqliteCacheStore;
///
/// let mut store = SqliteCacheStore::in_memory("rp.example.com", Duration::hours(1)).unwrap();
/// let fingerprint = QueryParams::new("demo", 1, 20).fingerprint();
/// store.put(&fingerprint, &serde_json::json!({"content": []})).unwrap();
/// assert!(store.get(&fingerprint).unwrap().is_some());
/// ```
pub struct SqliteCacheStore<C: Clock = SystemClock> {
    conn: Connection,
    prefix: String,
    namespace: String,
    ttl: Duration,
    clock: C,
}

impl SqliteCacheStore<SystemClock> {
    /// Opens (or creates) the database at `path`.
    ///
    /// # Errors
    ///
    /// Fails when the parent directory cannot be created or the database
    /// cannot be opened or initialised.
    pub fn open(path: impl AsRef<Path>, namespace: impl Into<String>, ttl: Duration) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn, DEFAULT_PREFIX, namespace, ttl, SystemClock)
    }

    /// Opens a private in-memory database.
    pub fn in_memory(namespace: impl Into<String>, ttl: Duration) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, DEFAULT_PREFIX, namespace, ttl, SystemClock)
    }
}

impl<C: Clock> SqliteCacheStore<C> {
    /// Wraps an existing connection, creating the cache table if needed.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::InvalidPrefix`](crate::SqliteError::InvalidPrefix)
    /// for a bad prefix, or a database error if the table cannot be created.
    pub fn with_connection(
        conn: Connection,
        prefix: impl Into<String>,
        namespace: impl Into<String>,
        ttl: Duration,
        clock: C,
    ) -> Result<Self> {
        let prefix = prefix.into();
        validate_prefix(&prefix)?;
        conn.execute_batch(&generate_schema_sql(&prefix)?)?;
        Ok(Self {
            conn,
            prefix,
            namespace: namespace.into(),
            ttl,
            clock,
        })
    }

    /// Replaces the clock, keeping the connection.
    pub fn with_clock<D: Clock>(self, clock: D) -> SqliteCacheStore<D> {
        SqliteCacheStore {
            conn: self.conn,
            prefix: self.prefix,
            namespace: self.namespace,
            ttl: self.ttl,
            clock,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Number of rows stored for this namespace, fresh or not.
    pub fn entry_count(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM {}cache_entries WHERE namespace = ?1",
                self.prefix
            ),
            params![self.namespace],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn load_entry(&self, fingerprint: &QueryFingerprint) -> Result<Option<CacheEntry>> {
        let row: Option<(i64, String)> = self
            .conn
            .query_row(
                &format!(
                    "SELECT fetched_at_ms, payload FROM {}cache_entries \
                     WHERE namespace = ?1 AND fingerprint = ?2",
                    self.prefix
                ),
                params![self.namespace, fingerprint.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((fetched_at_ms, payload)) = row else {
            return Ok(None);
        };
        let fetched_at = DateTime::from_timestamp_millis(fetched_at_ms).unwrap_or_default();
        let payload: Value = serde_json::from_str(&payload)?;
        Ok(Some(CacheEntry {
            fetched_at,
            payload,
        }))
    }

    fn store_entry(&self, fingerprint: &QueryFingerprint, payload: &Value) -> Result<()> {
        let now = self.clock.now();
        // A TTL reaching past the earliest representable time prunes nothing.
        let oldest_fresh = now
            .checked_sub_signed(self.ttl)
            .map_or(i64::MIN, |cutoff| cutoff.timestamp_millis());
        let payload = serde_json::to_string(payload)?;

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            &format!(
                "DELETE FROM {}cache_entries WHERE namespace = ?1 AND fetched_at_ms <= ?2",
                self.prefix
            ),
            params![self.namespace, oldest_fresh],
        )?;
        tx.execute(
            &format!(
                "INSERT OR REPLACE INTO {}cache_entries \
                 (namespace, fingerprint, fetched_at_ms, payload) VALUES (?1, ?2, ?3, ?4)",
                self.prefix
            ),
            params![
                self.namespace,
                fingerprint.as_str(),
                now.timestamp_millis(),
                payload
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn clear_namespace(&self) -> Result<usize> {
        let removed = self.conn.execute(
            &format!("DELETE FROM {}cache_entries WHERE namespace = ?1", self.prefix),
            params![self.namespace],
        )?;
        Ok(removed)
    }
}

impl<C: Clock> CacheStore for SqliteCacheStore<C> {
    fn get(&self, fingerprint: &QueryFingerprint) -> launch_report_cache::Result<Option<Value>> {
        let Some(entry) = self.load_entry(fingerprint)? else {
            debug!(%fingerprint, namespace = %self.namespace, "cache miss: no row");
            return Ok(None);
        };
        if !entry.is_fresh(self.clock.now(), self.ttl) {
            debug!(%fingerprint, fetched_at = %entry.fetched_at, "cache miss: row expired");
            return Ok(None);
        }
        debug!(%fingerprint, fetched_at = %entry.fetched_at, "cache hit");
        Ok(Some(entry.payload))
    }

    fn put(
        &mut self,
        fingerprint: &QueryFingerprint,
        payload: &Value,
    ) -> launch_report_cache::Result<()> {
        self.store_entry(fingerprint, payload)?;
        Ok(())
    }

    fn clear(&mut self) -> launch_report_cache::Result<()> {
        let removed = self.clear_namespace()?;
        debug!(namespace = %self.namespace, removed, "cleared cache rows");
        Ok(())
    }
}
