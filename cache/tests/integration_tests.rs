use chrono::{Duration, TimeZone, Utc};
use launch_report_cache::{
    CacheStore, JsonFileStore, ManualClock, MemoryStore, namespace_file, namespace_for,
};
use launch_report_core::{LaunchStatus, QueryParams};
use serde_json::{Value, json};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn start_clock() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2024, 2, 10, 8, 30, 0).unwrap())
}

fn sample_page() -> Value {
    json!({
        "content": [
            {"id": 1, "name": "nightly", "status": "PASSED", "startTime": 1707553800000_i64},
            {"id": 2, "name": "nightly", "status": "FAILED", "startTime": 1707557400000_i64}
        ],
        "page": {"number": 1, "size": 20, "totalElements": 2, "totalPages": 1}
    })
}

fn failed_query() -> QueryParams {
    let mut params = QueryParams::new("demo", 1, 20);
    params.status = Some(LaunchStatus::Failed);
    params
}

/// Runs the store contract against any backend.
fn exercise_contract(store: &mut dyn CacheStore, clock: &ManualClock) {
    let fingerprint = failed_query().fingerprint();
    let other = failed_query().with_page(2).fingerprint();

    assert!(store.get(&fingerprint).unwrap().is_none());

    store.put(&fingerprint, &sample_page()).unwrap();
    assert_eq!(store.get(&fingerprint).unwrap(), Some(sample_page()));
    assert!(store.get(&other).unwrap().is_none());

    clock.advance(Duration::minutes(30));
    assert!(store.get(&fingerprint).unwrap().is_some());

    clock.advance(Duration::minutes(30));
    assert!(store.get(&fingerprint).unwrap().is_none());

    store.put(&fingerprint, &json!({"content": []})).unwrap();
    store.put(&other, &sample_page()).unwrap();
    store.clear().unwrap();
    assert!(store.get(&fingerprint).unwrap().is_none());
    assert!(store.get(&other).unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Backend contract
// ---------------------------------------------------------------------------

#[test]
fn test_json_file_store_contract() {
    let dir = tempfile::tempdir().unwrap();
    let clock = start_clock();
    let path = namespace_file(dir.path(), &namespace_for("https://rp.example.com"));
    let mut store = JsonFileStore::with_clock(path, Duration::hours(1), clock.clone());
    exercise_contract(&mut store, &clock);
}

#[test]
fn test_memory_store_contract() {
    let clock = start_clock();
    let mut store = MemoryStore::with_clock(Duration::hours(1), clock.clone());
    exercise_contract(&mut store, &clock);
}

#[test]
fn test_boxed_store_dispatches_to_backend() {
    let clock = start_clock();
    let mut store: Box<dyn CacheStore> =
        Box::new(MemoryStore::with_clock(Duration::hours(1), clock.clone()));
    exercise_contract(&mut store, &clock);
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[test]
fn test_entries_survive_reopening_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rp.local.json");
    let clock = start_clock();
    let fingerprint = failed_query().fingerprint();

    {
        let mut store = JsonFileStore::with_clock(&path, Duration::hours(4), clock.clone());
        store.put(&fingerprint, &sample_page()).unwrap();
    }

    let reopened = JsonFileStore::with_clock(&path, Duration::hours(4), clock.clone());
    assert_eq!(reopened.get(&fingerprint).unwrap(), Some(sample_page()));

    // A shorter TTL on the next run makes the same entry stale.
    clock.advance(Duration::hours(2));
    let strict = JsonFileStore::with_clock(&path, Duration::hours(1), clock);
    assert!(strict.get(&fingerprint).unwrap().is_none());
}

#[test]
fn test_cache_file_stores_timestamp_and_raw_payload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rp.local.json");
    let mut store = JsonFileStore::with_clock(&path, Duration::hours(1), start_clock());
    let fingerprint = failed_query().fingerprint();
    store.put(&fingerprint, &sample_page()).unwrap();

    let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let entry = &raw["entries"][fingerprint.as_str()];
    assert_eq!(entry["fetched_at"], "2024-02-10T08:30:00Z");
    assert_eq!(entry["payload"], sample_page());
}
