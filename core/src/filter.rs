//! Launch and test item predicates.
//!
//! Filtering is a pure function of its inputs: the input slice is never
//! modified and matching records keep their original relative order. All
//! predicates compose conjunctively; a default [`LaunchFilter`] passes
//! everything through.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Attribute, Launch, LaunchStatus, TestItem};

/// Predicates applied to fetched launches.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use launch_report_core::{Launch, LaunchFilter, LaunchStatus};
///
/// let launches = vec![
///     Launch::new(1, "API nightly", LaunchStatus::Passed, Utc::now()).with_tag("smoke"),
///     Launch::new(2, "UI nightly", LaunchStatus::Failed, Utc::now()),
/// ];
///
/// let filter = LaunchFilter {
///     name: Some("api".into()),
///     tags: vec!["smoke".into()],
///     ..LaunchFilter::default()
/// };
/// let matched = filter.apply(&launches);
/// assert_eq!(matched.len(), 1);
/// assert_eq!(matched[0].id, 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchFilter {
    /// Case-insensitive substring the launch name must contain.
    pub name: Option<String>,
    /// Case-insensitive substring the launch name must not contain.
    pub exclude_name: Option<String>,
    pub status: Option<LaunchStatus>,
    /// Every tag must be present on the launch.
    pub tags: Vec<String>,
    /// Every pair must be present verbatim on the launch.
    pub attributes: Vec<Attribute>,
    /// Inclusive lower bound on the launch start time.
    pub start_from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on the launch start time.
    pub start_to: Option<DateTime<Utc>>,
}

impl LaunchFilter {
    /// Returns `true` if no predicate is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Returns `true` if `launch` satisfies every predicate.
    pub fn matches(&self, launch: &Launch) -> bool {
        if let Some(name) = &self.name {
            if !contains_ignore_case(&launch.name, name) {
                return false;
            }
        }
        if let Some(excluded) = &self.exclude_name {
            if contains_ignore_case(&launch.name, excluded) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if launch.status != status {
                return false;
            }
        }
        if !self.tags.iter().all(|tag| launch.has_tag(tag)) {
            return false;
        }
        if !self.attributes.iter().all(|attr| launch.has_attribute(attr)) {
            return false;
        }
        if self.start_from.is_some_and(|from| launch.start_time < from) {
            return false;
        }
        if self.start_to.is_some_and(|to| launch.start_time > to) {
            return false;
        }
        true
    }

    /// Returns the matching launches in their original order.
    pub fn apply(&self, launches: &[Launch]) -> Vec<Launch> {
        launches
            .iter()
            .filter(|launch| self.matches(launch))
            .cloned()
            .collect()
    }
}

/// Keeps test items whose name contains `test_name`, ignoring case.
///
/// A missing or blank `test_name` keeps every item.
pub fn filter_test_items(items: &[TestItem], test_name: Option<&str>) -> Vec<TestItem> {
    match test_name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(needle) => items
            .iter()
            .filter(|item| contains_ignore_case(&item.name, needle))
            .cloned()
            .collect(),
        None => items.to_vec(),
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ItemStatus;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
    }

    fn sample() -> Vec<Launch> {
        vec![
            Launch::new(1, "API Regression", LaunchStatus::Passed, at(1, 8))
                .with_tag("smoke")
                .with_attribute("key1", "value1")
                .with_attribute("key2", "value2"),
            Launch::new(2, "UI Smoke", LaunchStatus::Failed, at(2, 9))
                .with_tag("smoke")
                .with_tag("regression")
                .with_tag("nightly")
                .with_attribute("key1", "value2"),
            Launch::new(3, "api debug run", LaunchStatus::Interrupted, at(5, 23)),
        ]
    }

    fn ids(launches: &[Launch]) -> Vec<i64> {
        launches.iter().map(|l| l.id).collect()
    }

    #[test]
    fn test_empty_filter_passes_everything() {
        let launches = sample();
        let filter = LaunchFilter::default();
        assert!(filter.is_empty());
        assert_eq!(filter.apply(&launches), launches);
    }

    #[test]
    fn test_name_filter_is_case_insensitive_substring() {
        let filter = LaunchFilter {
            name: Some("API".into()),
            ..LaunchFilter::default()
        };
        assert_eq!(ids(&filter.apply(&sample())), vec![1, 3]);
    }

    #[test]
    fn test_exclude_name_drops_matching_launches() {
        let filter = LaunchFilter {
            exclude_name: Some("DEBUG".into()),
            ..LaunchFilter::default()
        };
        assert_eq!(ids(&filter.apply(&sample())), vec![1, 2]);
    }

    #[test]
    fn test_status_filter_is_exact() {
        let filter = LaunchFilter {
            status: Some(LaunchStatus::Failed),
            ..LaunchFilter::default()
        };
        assert_eq!(ids(&filter.apply(&sample())), vec![2]);
    }

    #[test]
    fn test_tag_filter_requires_all_tags() {
        let filter = LaunchFilter {
            tags: vec!["smoke".into(), "regression".into()],
            ..LaunchFilter::default()
        };
        let launches = sample();
        assert!(!filter.matches(&launches[0]));
        assert!(filter.matches(&launches[1]));
        assert_eq!(ids(&filter.apply(&launches)), vec![2]);
    }

    #[test]
    fn test_attribute_filter_requires_verbatim_pairs() {
        let filter = LaunchFilter {
            attributes: vec![Attribute::new("key1", "value1")],
            ..LaunchFilter::default()
        };
        let launches = sample();
        assert!(filter.matches(&launches[0]));
        assert!(!filter.matches(&launches[1]));
    }

    #[test]
    fn test_multiple_attributes_are_anded() {
        let filter = LaunchFilter {
            attributes: vec![Attribute::new("key1", "value1"), Attribute::new("key2", "value3")],
            ..LaunchFilter::default()
        };
        assert!(filter.apply(&sample()).is_empty());
    }

    #[test]
    fn test_date_range_is_inclusive_and_open_ended() {
        let launches = sample();
        let bounded = LaunchFilter {
            start_from: Some(at(1, 8)),
            start_to: Some(at(2, 9)),
            ..LaunchFilter::default()
        };
        assert_eq!(ids(&bounded.apply(&launches)), vec![1, 2]);

        let from_only = LaunchFilter {
            start_from: Some(at(2, 0)),
            ..LaunchFilter::default()
        };
        assert_eq!(ids(&from_only.apply(&launches)), vec![2, 3]);

        let to_only = LaunchFilter {
            start_to: Some(at(1, 7)),
            ..LaunchFilter::default()
        };
        assert!(to_only.apply(&launches).is_empty());
    }

    #[test]
    fn test_filters_compose_conjunctively() {
        let filter = LaunchFilter {
            name: Some("smoke".into()),
            status: Some(LaunchStatus::Passed),
            ..LaunchFilter::default()
        };
        assert!(filter.apply(&sample()).is_empty());
    }

    #[test]
    fn test_apply_is_idempotent_and_does_not_mutate_input() {
        let launches = sample();
        let before = launches.clone();
        let filters = [
            LaunchFilter::default(),
            LaunchFilter {
                name: Some("a".into()),
                ..LaunchFilter::default()
            },
            LaunchFilter {
                tags: vec!["smoke".into()],
                status: Some(LaunchStatus::Failed),
                ..LaunchFilter::default()
            },
            LaunchFilter {
                start_from: Some(at(2, 0)),
                exclude_name: Some("ui".into()),
                ..LaunchFilter::default()
            },
        ];
        for filter in filters {
            let once = filter.apply(&launches);
            let twice = filter.apply(&once);
            assert_eq!(once, twice);
        }
        assert_eq!(launches, before);
    }

    #[test]
    fn test_filter_test_items_by_name() {
        let items = vec![
            TestItem::new(1, 9, "Login succeeds", ItemStatus::Failed),
            TestItem::new(2, 9, "Logout clears session", ItemStatus::Failed),
        ];
        let kept = filter_test_items(&items, Some("LOGIN"));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, 1);
        assert_eq!(filter_test_items(&items, Some("  ")), items);
        assert_eq!(filter_test_items(&items, None), items);
    }
}
