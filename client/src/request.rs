//! Turning user-supplied filter strings into a validated run request.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use launch_report_core::{Attribute, LaunchStatus, QueryParams};

use crate::error::{ReportError, Result};

pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Which end of a date range a `YYYY-MM-DD` value bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateBound {
    /// 00:00:00.000 UTC of the day.
    Start,
    /// 23:59:59.999 UTC of the day.
    End,
}

/// Parses a date filter. Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp.
///
/// # Examples
///
/// ```
/// use launch_report_client::request::{DateBound, parse_date};
///
/// let end = parse_date("2024-03-31", DateBound::End).unwrap();
/// assert_eq!(end.to_rfc3339(), "2024-03-31T23:59:59.999+00:00");
/// assert!(parse_date("31/03/2024", DateBound::Start).is_err());
/// ```
pub fn parse_date(raw: &str, bound: DateBound) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let time = match bound {
            DateBound::Start => NaiveTime::MIN,
            DateBound::End => NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN),
        };
        return Ok(date.and_time(time).and_utc());
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ReportError::config(format!("invalid date '{raw}', expected YYYY-MM-DD")))
}

/// Parses a `KEY=VALUE` attribute filter.
pub fn parse_attribute(raw: &str) -> Result<Attribute> {
    Attribute::parse(raw).ok_or_else(|| {
        ReportError::config(format!("invalid attribute '{raw}', expected KEY=VALUE"))
    })
}

/// Splits repeated and comma-separated tag arguments into single tags.
pub fn split_tags<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    raw.iter()
        .flat_map(|value| value.as_ref().split(','))
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// Launch filters and pagination as typed by the user.
#[derive(Debug, Clone)]
pub struct FilterArgs {
    pub name: Option<String>,
    pub exclude_name: Option<String>,
    pub status: Option<LaunchStatus>,
    pub tags: Vec<String>,
    pub attributes: Vec<String>,
    pub start_from: Option<String>,
    pub start_to: Option<String>,
    pub page: u32,
    pub limit: u32,
}

impl Default for FilterArgs {
    fn default() -> Self {
        Self {
            name: None,
            exclude_name: None,
            status: None,
            tags: Vec::new(),
            attributes: Vec::new(),
            start_from: None,
            start_to: None,
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl FilterArgs {
    /// Validates the arguments and builds the query for `project`.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Config`] for a bad date, a malformed attribute,
    /// an inverted date range or a zero page/limit.
    pub fn to_query(&self, project: &str) -> Result<QueryParams> {
        if self.page == 0 {
            return Err(ReportError::config("page numbers start at 1"));
        }
        if self.limit == 0 {
            return Err(ReportError::config("page size must be at least 1"));
        }

        let start_from = self
            .start_from
            .as_deref()
            .map(|raw| parse_date(raw, DateBound::Start))
            .transpose()?;
        let start_to = self
            .start_to
            .as_deref()
            .map(|raw| parse_date(raw, DateBound::End))
            .transpose()?;
        if let (Some(from), Some(to)) = (start_from, start_to) {
            if from > to {
                return Err(ReportError::config(format!(
                    "start date {} is after end date {}",
                    from.date_naive(),
                    to.date_naive()
                )));
            }
        }

        let attributes = self
            .attributes
            .iter()
            .map(|raw| parse_attribute(raw))
            .collect::<Result<Vec<_>>>()?;

        let mut params = QueryParams::new(project, self.page, self.limit);
        params.name = self.name.clone();
        params.exclude_name = self.exclude_name.clone();
        params.status = self.status;
        params.tags = split_tags(&self.tags);
        params.attributes = attributes;
        params.start_from = start_from;
        params.start_to = start_to;
        Ok(params.normalized())
    }
}

/// Everything the pipeline needs to know about one run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub params: QueryParams,
    /// Follow pagination to the last page.
    pub all_pages: bool,
    /// Fetch failed test items for every matching launch.
    pub failed_tests: bool,
    /// Substring filter on test item names (failed-tests mode only).
    pub test_name: Option<String>,
    /// Compute launch status counts.
    pub summarize: bool,
    /// Clear the cache store before the run.
    pub reset_cache: bool,
    /// Neither read nor write the cache store.
    pub no_cache: bool,
}

impl RunRequest {
    pub fn new(params: QueryParams) -> Self {
        Self {
            params,
            all_pages: false,
            failed_tests: false,
            test_name: None,
            summarize: false,
            reset_cache: false,
            no_cache: false,
        }
    }
}
