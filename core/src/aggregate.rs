//! Summary statistics and failed-test extraction.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::types::{ItemStatus, Launch, LaunchStatus, TestItem, item_link};

/// Launch counts for a filtered result set.
///
/// `counts_by_status` always holds all five statuses, zero included, so
/// rendered output has a stable shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub counts_by_status: BTreeMap<LaunchStatus, usize>,
}

impl Summary {
    /// Count for one status.
    pub fn count(&self, status: LaunchStatus) -> usize {
        self.counts_by_status.get(&status).copied().unwrap_or(0)
    }
}

/// Counts launches by status.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use launch_report_core::{Launch, LaunchStatus, summarize};
///
/// let launches = vec![
///     Launch::new(1, "a", LaunchStatus::Passed, Utc::now()),
///     Launch::new(2, "b", LaunchStatus::Failed, Utc::now()),
/// ];
/// let summary = summarize(&launches);
/// assert_eq!(summary.total, 2);
/// assert_eq!(summary.count(LaunchStatus::Failed), 1);
/// assert_eq!(summary.count(LaunchStatus::Stopped), 0);
/// assert_eq!(summary.counts_by_status.len(), 5);
/// ```
pub fn summarize(launches: &[Launch]) -> Summary {
    let mut counts_by_status: BTreeMap<LaunchStatus, usize> =
        LaunchStatus::ALL.into_iter().map(|s| (s, 0)).collect();
    for launch in launches {
        *counts_by_status.entry(launch.status).or_insert(0) += 1;
    }
    Summary {
        total: launches.len(),
        counts_by_status,
    }
}

/// One failed test, with a link back to its log in the service UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedTestRecord {
    pub launch_id: i64,
    pub launch_name: String,
    pub test_id: i64,
    pub test_name: String,
    pub status: ItemStatus,
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suite_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suite_name: Option<String>,
}

/// Returns a record for every FAILED item of `launch`.
///
/// Items that belong to another launch are ignored.
pub fn extract_failed_tests(
    base_url: &str,
    project: &str,
    launch: &Launch,
    test_items: &[TestItem],
) -> Vec<FailedTestRecord> {
    test_items
        .iter()
        .filter(|item| item.status == ItemStatus::Failed && item.launch_id == launch.id)
        .map(|item| FailedTestRecord {
            launch_id: launch.id,
            launch_name: launch.name.clone(),
            test_id: item.id,
            test_name: item.name.clone(),
            status: item.status,
            link: item_link(base_url, project, launch.id, item.id),
            suite_id: item.suite_id,
            suite_name: item.suite_name.clone(),
        })
        .collect()
}

/// Failed tests across all inspected launches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedTestsReport {
    pub records: Vec<FailedTestRecord>,
    pub total_failed_tests: usize,
    /// Distinct parent suites holding at least one failed test. Items
    /// without a known suite are not counted.
    #[serde(default)]
    pub suites_with_failures: usize,
    pub launches_with_failures: usize,
    pub launches_inspected: usize,
}

impl FailedTestsReport {
    /// Adds the records found for one launch.
    pub fn push_launch(&mut self, records: Vec<FailedTestRecord>) {
        self.launches_inspected += 1;
        if !records.is_empty() {
            self.launches_with_failures += 1;
        }
        let suites: BTreeSet<i64> = records.iter().filter_map(|r| r.suite_id).collect();
        self.suites_with_failures += suites.len();
        self.total_failed_tests += records.len();
        self.records.extend(records);
    }
}
