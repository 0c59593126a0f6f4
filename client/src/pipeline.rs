//! The fetch, cache, filter and aggregate pipeline.
//!
//! [`Pipeline::run`] performs one cycle for a resolved configuration:
//!
//! 1. optionally clear the cache store, even when reads and writes are off,
//! 2. for each requested page, use a fresh cache entry or fetch and store it,
//! 3. filter the merged launches,
//! 4. extract failed tests or count statuses,
//!
//! and returns a [`RunReport`]. Cache failures are logged and treated as
//! misses; every other failure aborts the run.

use std::collections::HashSet;

use chrono::Utc;
use launch_report_cache::CacheStore;
use launch_report_core::{
    FailedTestsReport, Launch, Page, QueryParams, extract_failed_tests, filter_test_items,
    summarize,
};
use tracing::{debug, info, warn};

use crate::api::{LaunchApi, decode_launch_page};
use crate::error::Result;
use crate::report::RunReport;
use crate::request::RunRequest;

/// Orchestrates one report run against an API and an optional cache store.
pub struct Pipeline<A: LaunchApi> {
    api: A,
    cache: Option<Box<dyn CacheStore>>,
    base_url: String,
}

struct FetchedPage {
    page: Page<Launch>,
    from_cache: bool,
}

impl<A: LaunchApi> Pipeline<A> {
    /// Creates a pipeline without a cache store. `base_url` is used for test
    /// item links.
    pub fn new(api: A, base_url: impl Into<String>) -> Self {
        Self {
            api,
            cache: None,
            base_url: base_url.into(),
        }
    }

    /// Attaches a cache store.
    pub fn with_cache(mut self, store: Box<dyn CacheStore>) -> Self {
        self.cache = Some(store);
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Runs the pipeline once.
    ///
    /// # Errors
    ///
    /// Propagates API, timeout, network and invalid-response errors. Cache
    /// errors never surface here.
    pub fn run(&mut self, request: &RunRequest) -> Result<RunReport> {
        let params = &request.params;
        let mut report = RunReport::new(params.project.clone(), Utc::now());

        if request.reset_cache {
            self.reset_cache();
        }
        if request.no_cache {
            debug!("cache reads and writes disabled for this run");
        }

        let mut launches = Vec::new();
        let mut seen = HashSet::new();
        let mut all_from_cache = true;
        let mut page_number = params.page;
        loop {
            let fetched = self.fetch_page(&params.with_page(page_number), request.no_cache)?;
            report.pages_fetched += 1;
            all_from_cache &= fetched.from_cache;

            let total_pages = fetched.page.page.total_pages;
            let page_len = fetched.page.content.len();
            for launch in fetched.page.content {
                if seen.insert(launch.id) {
                    launches.push(launch);
                } else {
                    debug!(launch_id = launch.id, "dropping duplicate launch from later page");
                }
            }

            if !request.all_pages || page_number >= total_pages || page_len == 0 {
                break;
            }
            page_number += 1;
        }
        report.from_cache = all_from_cache;

        let filter = params.filter();
        let matched = filter.apply(&launches);
        info!(
            fetched = launches.len(),
            matched = matched.len(),
            pages = report.pages_fetched,
            from_cache = report.from_cache,
            "launches filtered"
        );

        if request.failed_tests {
            report.failed_tests = Some(self.collect_failed_tests(
                &params.project,
                &matched,
                request.test_name.as_deref(),
            )?);
        } else if request.summarize {
            report.summary = Some(summarize(&matched));
        }
        report.launches = matched;
        Ok(report)
    }

    fn reset_cache(&mut self) {
        let Some(store) = self.cache.as_mut() else {
            return;
        };
        match store.clear() {
            Ok(()) => info!("cache cleared"),
            Err(err) => warn!(error = %err, "failed to clear cache"),
        }
    }

    fn fetch_page(&mut self, params: &QueryParams, no_cache: bool) -> Result<FetchedPage> {
        let fingerprint = params.fingerprint();
        let store = if no_cache { None } else { self.cache.as_mut() };
        let Some(store) = store else {
            let fetched = self.api.fetch_launches(params)?;
            return Ok(FetchedPage {
                page: fetched.page,
                from_cache: false,
            });
        };

        match store.get(&fingerprint) {
            Ok(Some(raw)) => match decode_launch_page(&raw) {
                Ok(page) => {
                    debug!(%fingerprint, page = params.page, "using cached launch page");
                    return Ok(FetchedPage {
                        page,
                        from_cache: true,
                    });
                }
                Err(err) => warn!(%fingerprint, error = %err, "ignoring undecodable cache entry"),
            },
            Ok(None) => debug!(%fingerprint, page = params.page, "cache miss"),
            Err(err) => warn!(error = %err, "cache read failed, fetching live"),
        }

        let fetched = self.api.fetch_launches(params)?;
        if let Err(err) = store.put(&fingerprint, &fetched.raw) {
            warn!(error = %err, "cache write failed");
        }
        Ok(FetchedPage {
            page: fetched.page,
            from_cache: false,
        })
    }

    fn collect_failed_tests(
        &self,
        project: &str,
        launches: &[Launch],
        test_name: Option<&str>,
    ) -> Result<FailedTestsReport> {
        let mut failed = FailedTestsReport::default();
        for launch in launches {
            let items = self.api.fetch_test_items(launch.id)?;
            let items = filter_test_items(&items, test_name);
            let records = extract_failed_tests(&self.base_url, project, launch, &items);
            debug!(launch_id = launch.id, failed = records.len(), "failed tests extracted");
            failed.push_launch(records);
        }
        info!(
            total_failed_tests = failed.total_failed_tests,
            launches_with_failures = failed.launches_with_failures,
            "failed tests collected"
        );
        Ok(failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;

    use chrono::{Duration, TimeZone};
    use launch_report_cache::{CacheError, ManualClock, MemoryStore};
    use launch_report_core::{ItemStatus, LaunchStatus, TestItem};
    use serde_json::{Value, json};

    use crate::api::LaunchPage;
    use crate::error::ReportError;

    const BASE_URL: &str = "https://rp.example.com";

    /// Serves canned pages keyed by page number and counts calls.
    #[derive(Default)]
    struct FakeApi {
        pages: HashMap<u32, Value>,
        items: HashMap<i64, Vec<TestItem>>,
        launch_calls: Cell<usize>,
        item_calls: RefCell<Vec<i64>>,
    }

    impl FakeApi {
        fn with_page(mut self, number: u32, raw: Value) -> Self {
            self.pages.insert(number, raw);
            self
        }
    }

    impl LaunchApi for FakeApi {
        fn fetch_launches(&self, params: &QueryParams) -> Result<LaunchPage> {
            self.launch_calls.set(self.launch_calls.get() + 1);
            let raw = self
                .pages
                .get(&params.page)
                .cloned()
                .ok_or_else(|| ReportError::api(404, "no such page"))?;
            Ok(LaunchPage {
                page: decode_launch_page(&raw)?,
                raw,
            })
        }

        fn fetch_test_items(&self, launch_id: i64) -> Result<Vec<TestItem>> {
            self.item_calls.borrow_mut().push(launch_id);
            Ok(self.items.get(&launch_id).cloned().unwrap_or_default())
        }
    }

    /// A store whose every call fails.
    struct BrokenStore;

    impl CacheStore for BrokenStore {
        fn get(&self, _: &launch_report_core::QueryFingerprint) -> launch_report_cache::Result<Option<Value>> {
            Err(CacheError::Backend("disk on fire".into()))
        }
        fn put(&mut self, _: &launch_report_core::QueryFingerprint, _: &Value) -> launch_report_cache::Result<()> {
            Err(CacheError::Backend("disk on fire".into()))
        }
        fn clear(&mut self) -> launch_report_cache::Result<()> {
            Err(CacheError::Backend("disk on fire".into()))
        }
    }

    fn launch(id: i64, name: &str, status: &str) -> Value {
        json!({"id": id, "name": name, "status": status, "startTime": 1707553800000_i64})
    }

    fn envelope(content: Vec<Value>, number: u32, total_pages: u32) -> Value {
        json!({
            "content": content,
            "page": {"number": number, "size": 3, "totalElements": 9, "totalPages": total_pages}
        })
    }

    fn three_launches() -> Value {
        envelope(
            vec![
                launch(1, "api nightly", "PASSED"),
                launch(2, "ui nightly", "PASSED"),
                launch(3, "api smoke", "FAILED"),
            ],
            1,
            1,
        )
    }

    fn memory_store() -> (Box<dyn CacheStore>, ManualClock) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 2, 10, 9, 0, 0).unwrap());
        let store = MemoryStore::with_clock(Duration::hours(1), clock.clone());
        (Box::new(store), clock)
    }

    fn request(params: QueryParams) -> RunRequest {
        RunRequest::new(params)
    }

    #[test]
    fn test_cached_page_is_filtered_and_summarized_without_network() {
        let (mut store, _clock) = memory_store();
        let mut params = QueryParams::new("shop", 1, 20);
        params.status = Some(LaunchStatus::Failed);
        store.put(&params.fingerprint(), &three_launches()).unwrap();

        let mut pipeline = Pipeline::new(FakeApi::default(), BASE_URL).with_cache(store);
        let mut req = request(params);
        req.summarize = true;
        let report = pipeline.run(&req).unwrap();

        assert_eq!(pipeline.api().launch_calls.get(), 0);
        assert!(report.from_cache);
        assert_eq!(report.launches.len(), 1);
        assert_eq!(report.launches[0].id, 3);
        let summary = report.summary.unwrap();
        assert_eq!(summary.total, 1);
        assert_eq!(summary.count(LaunchStatus::Failed), 1);
        for status in [
            LaunchStatus::Passed,
            LaunchStatus::Stopped,
            LaunchStatus::Interrupted,
            LaunchStatus::InProgress,
        ] {
            assert_eq!(summary.count(status), 0);
        }
    }

    #[test]
    fn test_miss_fetches_once_then_hits() {
        let (store, clock) = memory_store();
        let api = FakeApi::default().with_page(1, three_launches());
        let mut pipeline = Pipeline::new(api, BASE_URL).with_cache(store);
        let req = request(QueryParams::new("shop", 1, 20));

        let first = pipeline.run(&req).unwrap();
        assert!(!first.from_cache);
        let second = pipeline.run(&req).unwrap();
        assert!(second.from_cache);
        assert_eq!(first.launches, second.launches);
        assert_eq!(pipeline.api().launch_calls.get(), 1);

        clock.advance(Duration::hours(1));
        pipeline.run(&req).unwrap();
        assert_eq!(pipeline.api().launch_calls.get(), 2);
    }

    #[test]
    fn test_reset_cache_forces_live_fetch() {
        let (store, _clock) = memory_store();
        let api = FakeApi::default().with_page(1, three_launches());
        let mut pipeline = Pipeline::new(api, BASE_URL).with_cache(store);
        let mut req = request(QueryParams::new("shop", 1, 20));
        pipeline.run(&req).unwrap();

        req.reset_cache = true;
        let report = pipeline.run(&req).unwrap();
        assert!(!report.from_cache);
        assert_eq!(pipeline.api().launch_calls.get(), 2);
    }

    #[test]
    fn test_no_cache_skips_read_and_write() {
        let (mut store, _clock) = memory_store();
        let params = QueryParams::new("shop", 1, 20);
        store.put(&params.fingerprint(), &envelope(vec![], 1, 1)).unwrap();

        let api = FakeApi::default().with_page(1, three_launches());
        let mut pipeline = Pipeline::new(api, BASE_URL).with_cache(store);
        let mut req = request(params);
        req.no_cache = true;
        let report = pipeline.run(&req).unwrap();
        assert_eq!(report.launches.len(), 3);

        // The stale empty entry is still there: nothing was written.
        req.no_cache = false;
        let cached = pipeline.run(&req).unwrap();
        assert!(cached.from_cache);
        assert!(cached.launches.is_empty());
    }

    #[test]
    fn test_reset_applies_even_without_cache_reads() {
        let (mut store, _clock) = memory_store();
        let params = QueryParams::new("shop", 1, 20);
        store.put(&params.fingerprint(), &envelope(vec![], 1, 1)).unwrap();

        let api = FakeApi::default().with_page(1, three_launches());
        let mut pipeline = Pipeline::new(api, BASE_URL).with_cache(store);
        let mut req = request(params);
        req.reset_cache = true;
        req.no_cache = true;
        let report = pipeline.run(&req).unwrap();
        assert_eq!(report.launches.len(), 3);

        // The entry is gone and the live page was not written back.
        let plain = request(QueryParams::new("shop", 1, 20));
        let after = pipeline.run(&plain).unwrap();
        assert!(!after.from_cache);
        assert_eq!(after.launches.len(), 3);
        assert_eq!(pipeline.api().launch_calls.get(), 2);
    }

    #[test]
    fn test_broken_store_degrades_to_live_fetch() {
        let api = FakeApi::default().with_page(1, three_launches());
        let mut pipeline = Pipeline::new(api, BASE_URL).with_cache(Box::new(BrokenStore));
        let mut req = request(QueryParams::new("shop", 1, 20));
        req.reset_cache = true;
        let report = pipeline.run(&req).unwrap();
        assert_eq!(report.launches.len(), 3);
        assert_eq!(pipeline.api().launch_calls.get(), 1);
    }

    #[test]
    fn test_all_pages_merges_in_order_and_dedupes() {
        let api = FakeApi::default()
            .with_page(1, envelope(vec![launch(1, "a", "PASSED"), launch(2, "b", "FAILED")], 1, 3))
            .with_page(2, envelope(vec![launch(2, "b", "FAILED"), launch(3, "c", "STOPPED")], 2, 3))
            .with_page(3, envelope(vec![launch(4, "d", "INTERRUPTED")], 3, 3));
        let mut pipeline = Pipeline::new(api, BASE_URL);
        let mut req = request(QueryParams::new("shop", 1, 2));
        req.all_pages = true;

        let report = pipeline.run(&req).unwrap();
        let ids: Vec<i64> = report.launches.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert_eq!(report.pages_fetched, 3);
        assert!(!report.from_cache);
    }

    #[test]
    fn test_single_page_without_all_pages() {
        let api = FakeApi::default().with_page(1, envelope(vec![launch(1, "a", "PASSED")], 1, 3));
        let mut pipeline = Pipeline::new(api, BASE_URL);
        let report = pipeline.run(&request(QueryParams::new("shop", 1, 1))).unwrap();
        assert_eq!(report.pages_fetched, 1);
        assert_eq!(pipeline.api().launch_calls.get(), 1);
    }

    #[test]
    fn test_api_error_aborts_run() {
        let mut pipeline = Pipeline::new(FakeApi::default(), BASE_URL);
        let err = pipeline
            .run(&request(QueryParams::new("shop", 1, 20)))
            .unwrap_err();
        assert!(matches!(err, ReportError::Api { status: 404, .. }));
    }

    #[test]
    fn test_failed_tests_mode_builds_links() {
        let mut api = FakeApi::default().with_page(
            1,
            envelope(vec![launch(4711, "api nightly", "FAILED"), launch(4712, "ui", "PASSED")], 1, 1),
        );
        api.items.insert(
            4711,
            vec![
                TestItem::new(9001, 4711, "checkout_total", ItemStatus::Failed),
                TestItem::new(9002, 4711, "login_flow", ItemStatus::Failed),
            ],
        );
        let mut params = QueryParams::new("shop", 1, 20);
        params.name = Some("api".into());
        let mut req = request(params);
        req.failed_tests = true;
        req.test_name = Some("CHECKOUT".into());

        let mut pipeline = Pipeline::new(api, BASE_URL);
        let report = pipeline.run(&req).unwrap();

        assert_eq!(*pipeline.api().item_calls.borrow(), vec![4711]);
        let failed = report.failed_tests.unwrap();
        assert_eq!(failed.total_failed_tests, 1);
        assert_eq!(failed.launches_with_failures, 1);
        assert_eq!(failed.records[0].test_name, "checkout_total");
        assert_eq!(
            failed.records[0].link,
            "https://rp.example.com/ui/#shop/launches/all/4711/9001/log"
        );
        assert!(report.summary.is_none());
    }
}
