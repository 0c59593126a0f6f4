//! SQL generation with customizable table prefixes.
//!
//! The cache lives in a single table, `{prefix}cache_entries`, keyed by
//! `(namespace, fingerprint)` so several services can share one database file.

use crate::error::{Result, SqliteError};

/// Validates that a table prefix contains only alphanumeric characters and underscores.
pub(crate) fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix.is_empty() {
        return Err(SqliteError::InvalidPrefix(prefix.to_string()));
    }
    if !prefix.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(SqliteError::InvalidPrefix(prefix.to_string()));
    }
    Ok(())
}

/// Generates the `CREATE TABLE` statement for the cache table.
///
/// # Errors
///
/// Returns [`SqliteError::InvalidPrefix`] if the prefix is empty or contains
/// characters other than alphanumerics and underscores.
pub fn generate_schema_sql(prefix: &str) -> Result<String> {
    validate_prefix(prefix)?;

    Ok(format!(
        r#"
CREATE TABLE IF NOT EXISTS {prefix}cache_entries (
    namespace TEXT NOT NULL,
    fingerprint TEXT NOT NULL,
    fetched_at_ms INTEGER NOT NULL,
    payload TEXT NOT NULL,
    PRIMARY KEY (namespace, fingerprint)
);
"#
    ))
}
