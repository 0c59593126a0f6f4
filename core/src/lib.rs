//! Core launch types and the pure parts of the reporting pipeline.
//!
//! This crate defines the data model for ReportPortal launches and test items
//! and the I/O-free logic that operates on them:
//!
//! - [`Launch`], [`TestItem`], [`Page`]: decoded service records.
//! - [`QueryParams`] / [`QueryFingerprint`]: the parameters of one
//!   launch-listing request and the deterministic cache key derived from them.
//! - [`LaunchFilter`] / [`filter_test_items`]: conjunctive predicates over
//!   launches and test items.
//! - [`summarize`] / [`extract_failed_tests`]: status counts and failed-test
//!   records with UI links.
//!
//! # Example
//!
//! ```
//! use chrono::Utc;
//! use launch_report_core::*;
//!
//! let launches = vec![
//!     Launch::new(1, "nightly", LaunchStatus::Passed, Utc::now()),
//!     Launch::new(2, "nightly", LaunchStatus::Failed, Utc::now()),
//! ];
//!
//! let mut params = QueryParams::new("demo", 1, 20);
//! params.status = Some(LaunchStatus::Failed);
//!
//! let matched = params.filter().apply(&launches);
//! let summary = summarize(&matched);
//! assert_eq!(summary.total, 1);
//! assert_eq!(summary.count(LaunchStatus::Failed), 1);
//! ```

mod aggregate;
mod filter;
mod fingerprint;
mod types;

pub use aggregate::{FailedTestRecord, FailedTestsReport, Summary, extract_failed_tests, summarize};
pub use filter::{LaunchFilter, filter_test_items};
pub use fingerprint::{QueryFingerprint, QueryParams};
pub use types::*;
