//! Query parameters and the cache fingerprint derived from them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::filter::LaunchFilter;
use crate::types::{Attribute, LaunchStatus};

/// Every parameter that shapes one launch-listing request.
///
/// Two requests with equal [`QueryParams::normalized`] values are the same
/// request as far as the service and the cache are concerned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParams {
    pub project: String,
    pub name: Option<String>,
    pub exclude_name: Option<String>,
    pub status: Option<LaunchStatus>,
    pub tags: Vec<String>,
    pub attributes: Vec<Attribute>,
    pub start_from: Option<DateTime<Utc>>,
    pub start_to: Option<DateTime<Utc>>,
    /// 1-based page number.
    pub page: u32,
    pub limit: u32,
}

impl QueryParams {
    pub fn new(project: impl Into<String>, page: u32, limit: u32) -> Self {
        Self {
            project: project.into(),
            page,
            limit,
            ..Self::default()
        }
    }

    /// Returns the same query for another page.
    pub fn with_page(&self, page: u32) -> Self {
        Self {
            page,
            ..self.clone()
        }
    }

    /// Canonical form: trimmed strings, empty strings dropped, tags and
    /// attributes sorted and deduplicated.
    pub fn normalized(&self) -> Self {
        let mut tags: Vec<String> = self
            .tags
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        tags.sort();
        tags.dedup();

        let mut attributes = self.attributes.clone();
        attributes.sort();
        attributes.dedup();

        Self {
            project: self.project.trim().to_string(),
            name: non_empty(self.name.as_deref()),
            exclude_name: non_empty(self.exclude_name.as_deref()),
            status: self.status,
            tags,
            attributes,
            start_from: self.start_from,
            start_to: self.start_to,
            page: self.page,
            limit: self.limit,
        }
    }

    /// Deterministic cache key for this query.
    ///
    /// # Examples
    ///
    /// ```
    /// use launch_report_core::QueryParams;
    ///
    /// let mut a = QueryParams::new("demo", 1, 20);
    /// a.tags = vec!["smoke".into(), "nightly".into()];
    /// let mut b = QueryParams::new("demo", 1, 20);
    /// b.tags = vec!["nightly".into(), "smoke".into(), "smoke".into()];
    /// assert_eq!(a.fingerprint(), b.fingerprint());
    ///
    /// assert_ne!(a.fingerprint(), a.with_page(2).fingerprint());
    /// ```
    pub fn fingerprint(&self) -> QueryFingerprint {
        let canonical = self.normalized();
        // Struct fields serialize in declaration order, so the encoding is stable.
        let encoded = serde_json::to_vec(&canonical).unwrap_or_default();
        let digest = Sha256::digest(&encoded);
        QueryFingerprint(format!("{digest:x}"))
    }

    /// The launch predicates carried by this query.
    pub fn filter(&self) -> LaunchFilter {
        let normalized = self.normalized();
        LaunchFilter {
            name: normalized.name,
            exclude_name: normalized.exclude_name,
            status: normalized.status,
            tags: normalized.tags,
            attributes: normalized.attributes,
            start_from: normalized.start_from,
            start_to: normalized.start_to,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToOwned::to_owned)
}

/// Hex SHA-256 digest identifying a query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryFingerprint(String);

impl QueryFingerprint {
    /// Wraps an already computed digest, e.g. one read back from storage.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn base() -> QueryParams {
        let mut params = QueryParams::new("demo", 1, 50);
        params.name = Some("nightly".to_string());
        params.status = Some(LaunchStatus::Failed);
        params.tags = vec!["smoke".to_string(), "regression".to_string()];
        params.attributes = vec![Attribute::new("os", "linux"), Attribute::new("env", "qa")];
        params.start_from = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        params.start_to = Some(Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap());
        params
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        assert_eq!(base().fingerprint(), base().fingerprint());
        assert_eq!(base().fingerprint().as_str().len(), 64);
    }

    #[test]
    fn test_fingerprint_ignores_tag_and_attribute_order() {
        let mut reordered = base();
        reordered.tags.reverse();
        reordered.attributes.reverse();
        assert_eq!(base().fingerprint(), reordered.fingerprint());
    }

    #[test]
    fn test_fingerprint_treats_blank_filter_as_absent() {
        let mut blank = base();
        blank.name = Some("   ".to_string());
        let mut absent = base();
        absent.name = None;
        assert_eq!(blank.fingerprint(), absent.fingerprint());
    }

    #[test]
    fn test_fingerprint_changes_with_every_parameter() {
        let reference = base().fingerprint();
        let variants: Vec<QueryParams> = vec![
            QueryParams { project: "other".into(), ..base() },
            QueryParams { name: Some("weekly".into()), ..base() },
            QueryParams { exclude_name: Some("debug".into()), ..base() },
            QueryParams { status: Some(LaunchStatus::Passed), ..base() },
            QueryParams { status: None, ..base() },
            QueryParams { tags: vec!["smoke".into()], ..base() },
            QueryParams { attributes: vec![Attribute::new("os", "mac")], ..base() },
            QueryParams { start_from: None, ..base() },
            QueryParams { start_to: None, ..base() },
            QueryParams { page: 2, ..base() },
            QueryParams { limit: 20, ..base() },
        ];
        for variant in variants {
            assert_ne!(variant.fingerprint(), reference, "{variant:?}");
        }
    }

    #[test]
    fn test_filter_carries_normalized_predicates() {
        let mut params = base();
        params.tags.push("smoke".to_string());
        let filter = params.filter();
        assert_eq!(filter.tags, vec!["regression", "smoke"]);
        assert_eq!(filter.status, Some(LaunchStatus::Failed));
        assert_eq!(filter.name.as_deref(), Some("nightly"));
    }
}
