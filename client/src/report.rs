//! Structured result of one report run, handed to the renderers.

use chrono::{DateTime, Utc};
use launch_report_core::{FailedTestsReport, Launch, Summary};
use serde::{Deserialize, Serialize};

/// Everything a renderer may show.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub project: String,
    pub generated_at: DateTime<Utc>,
    /// `true` when every page came from the cache store.
    pub from_cache: bool,
    pub pages_fetched: u32,
    pub launches: Vec<Launch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_tests: Option<FailedTestsReport>,
}

impl RunReport {
    pub fn new(project: impl Into<String>, generated_at: DateTime<Utc>) -> Self {
        Self {
            project: project.into(),
            generated_at,
            from_cache: false,
            pages_fetched: 0,
            launches: Vec::new(),
            summary: None,
            failed_tests: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use launch_report_core::{LaunchStatus, summarize};

    #[test]
    fn test_optional_sections_are_omitted_from_json() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let report = RunReport::new("shop", at);
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("summary").is_none());
        assert!(json.get("failed_tests").is_none());
        assert_eq!(json["generated_at"], "2024-05-01T12:00:00Z");
    }

    #[test]
    fn test_report_round_trips_through_json() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut report = RunReport::new("shop", at);
        report.launches = vec![Launch::new(1, "nightly", LaunchStatus::Passed, at)];
        report.summary = Some(summarize(&report.launches));
        let back: RunReport = serde_json::from_str(&serde_json::to_string(&report).unwrap()).unwrap();
        assert_eq!(back, report);
        assert!(back.failed_tests.is_none());
    }
}
