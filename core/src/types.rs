//! Launch and test item types as seen by the reporting pipeline.
//!
//! These types are the decoded form of ReportPortal's launch and test item
//! records. They are immutable once built and serialize with [`serde`] so they
//! can flow unchanged into JSON/YAML output.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Final (or current) status of a launch.
///
/// The variant order is the fixed order used by summaries and renderers.
///
/// # Examples
///
/// ```
/// use launch_report_core::LaunchStatus;
///
/// let status: LaunchStatus = "failed".parse().unwrap();
/// assert_eq!(status, LaunchStatus::Failed);
/// assert_eq!(status.as_str(), "FAILED");
/// assert!("SKIPPED".parse::<LaunchStatus>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LaunchStatus {
    Passed,
    Failed,
    Stopped,
    Interrupted,
    InProgress,
}

impl LaunchStatus {
    /// All statuses in summary order.
    pub const ALL: [LaunchStatus; 5] = [
        LaunchStatus::Passed,
        LaunchStatus::Failed,
        LaunchStatus::Stopped,
        LaunchStatus::Interrupted,
        LaunchStatus::InProgress,
    ];

    /// Wire name of the status, as used by the service.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "PASSED",
            Self::Failed => "FAILED",
            Self::Stopped => "STOPPED",
            Self::Interrupted => "INTERRUPTED",
            Self::InProgress => "IN_PROGRESS",
        }
    }
}

impl fmt::Display for LaunchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not one of the five launch statuses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown launch status '{}'", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for LaunchStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        LaunchStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// A `key=value` launch attribute.
///
/// Keys are not unique: a launch may carry `os=linux` and `os=windows`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Attribute {
    pub key: String,
    pub value: String,
}

impl Attribute {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Parses a `KEY=VALUE` pair. The value may itself contain `=`.
    ///
    /// # Examples
    ///
    /// ```
    /// use launch_report_core::Attribute;
    ///
    /// let attr = Attribute::parse("build=a=b").unwrap();
    /// assert_eq!(attr.key, "build");
    /// assert_eq!(attr.value, "a=b");
    /// assert!(Attribute::parse("novalue").is_none());
    /// assert!(Attribute::parse("=value").is_none());
    /// ```
    pub fn parse(raw: &str) -> Option<Self> {
        let (key, value) = raw.split_once('=')?;
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        Some(Self::new(key, value.trim()))
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// One test-execution run recorded by the reporting service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Launch {
    pub id: i64,
    /// Sequential run number within launches of the same name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<i64>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: LaunchStatus,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub failed_count: u64,
}

impl Launch {
    /// Creates a launch with no attributes, tags or failures.
    pub fn new(id: i64, name: impl Into<String>, status: LaunchStatus, start_time: DateTime<Utc>) -> Self {
        Self {
            id,
            number: None,
            name: name.into(),
            description: None,
            status,
            start_time,
            attributes: Vec::new(),
            tags: Vec::new(),
            failed_count: 0,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(Attribute::new(key, value));
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn has_attribute(&self, attribute: &Attribute) -> bool {
        self.attributes.iter().any(|a| a == attribute)
    }
}

/// Status of a single test item.
///
/// Items carry more states than launches, and services add new ones over
/// time, so unknown values decode to [`ItemStatus::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    Passed,
    Failed,
    Skipped,
    Stopped,
    Interrupted,
    InProgress,
    Cancelled,
    Info,
    Warn,
    #[serde(other)]
    Other,
}

impl ItemStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "PASSED",
            Self::Failed => "FAILED",
            Self::Skipped => "SKIPPED",
            Self::Stopped => "STOPPED",
            Self::Interrupted => "INTERRUPTED",
            Self::InProgress => "IN_PROGRESS",
            Self::Cancelled => "CANCELLED",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Other => "OTHER",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An individual test case result within a launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestItem {
    pub id: i64,
    /// Id of the owning launch.
    pub launch_id: i64,
    pub name: String,
    pub status: ItemStatus,
    /// Id of the parent suite, when the item is nested in one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suite_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suite_name: Option<String>,
}

impl TestItem {
    pub fn new(id: i64, launch_id: i64, name: impl Into<String>, status: ItemStatus) -> Self {
        Self {
            id,
            launch_id,
            name: name.into(),
            status,
            suite_id: None,
            suite_name: None,
        }
    }

    pub fn with_suite(mut self, suite_id: i64, suite_name: Option<String>) -> Self {
        self.suite_id = Some(suite_id);
        self.suite_name = suite_name;
        self
    }

    /// Direct link to this item's log view in the service UI.
    pub fn link(&self, base_url: &str, project: &str) -> String {
        item_link(base_url, project, self.launch_id, self.id)
    }
}

/// Builds the UI link for a test item.
///
/// # Examples
///
/// ```
/// use launch_report_core::item_link;
///
/// assert_eq!(
///     item_link("https://rp.example.com/", "demo", 12, 345),
///     "https://rp.example.com/ui/#demo/launches/all/12/345/log",
/// );
/// ```
pub fn item_link(base_url: &str, project: &str, launch_id: i64, item_id: i64) -> String {
    format!(
        "{}/ui/#{}/launches/all/{}/{}/log",
        base_url.trim_end_matches('/'),
        project,
        launch_id,
        item_id
    )
}

/// Pagination metadata reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    /// 1-based page number.
    pub number: u32,
    pub size: u32,
    pub total_elements: u64,
    pub total_pages: u32,
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page: PageInfo,
}
