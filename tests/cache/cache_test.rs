//! Cache key derivation and store behavior.

#[path = "../common/mod.rs"]
mod common;

use common::raw_input;
use informe::cache::{
    cache_relevant_subset, CacheCoordinator, CacheEntry, CacheStore, MemoryCacheStore,
    SqliteCacheStore, DEFAULT_TTL_SECONDS,
};
use informe::query::FetchMode;
use informe::report::ReportResult;
use informe::schema::{normalize, schema_of, ParamSpec};
use serde_json::json;
use std::sync::Arc;

fn coordinator() -> CacheCoordinator {
    CacheCoordinator::new(
        Arc::new(MemoryCacheStore::new()),
        "informe:report:",
        DEFAULT_TTL_SECONDS,
    )
}

fn normalized(pairs: &[(&str, serde_json::Value)]) -> informe::query::NormalizedQuery {
    let schema = schema_of([
        ("from", ParamSpec::date()),
        ("to", ParamSpec::date()),
        ("limit", ParamSpec::int()),
    ]);
    let (query, errors) = normalize(&schema, &raw_input(pairs));
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    query
}

#[test]
fn key_is_deterministic_across_input_order() {
    let cache = coordinator();
    let a = normalized(&[("from", json!("2026-01-01")), ("to", json!("2026-02-01"))]);
    let b = normalized(&[("to", json!("2026-02-01")), ("from", json!("2026-01-01"))]);
    assert_eq!(
        cache.compute_key("orders.missing_schedule", &a),
        cache.compute_key("orders.missing_schedule", &b)
    );
}

#[test]
fn key_carries_prefix_and_report_key() {
    let cache = coordinator();
    let query = normalized(&[("from", json!("2026-01-01"))]);
    let key = cache.compute_key("orders.missing_schedule", &query);
    assert!(key.starts_with("informe:report:orders.missing_schedule:"));
    // 64 hex chars of sha256 after the last colon.
    assert_eq!(key.rsplit(':').next().unwrap().len(), 64);
}

#[test]
fn differing_parameters_change_the_key() {
    let cache = coordinator();
    let a = normalized(&[("limit", json!(10))]);
    let b = normalized(&[("limit", json!(20))]);
    assert_ne!(cache.compute_key("r", &a), cache.compute_key("r", &b));
}

#[test]
fn page_participates_only_in_paged_mode() {
    let cache = coordinator();
    let page1 = normalized(&[("page", json!(1))]);
    let page2 = normalized(&[("page", json!(2))]);
    assert_ne!(cache.compute_key("r", &page1), cache.compute_key("r", &page2));

    let all1 = normalized(&[("page", json!(1)), ("fetch", json!("all"))]);
    let all2 = normalized(&[("page", json!(2)), ("fetch", json!("all"))]);
    assert_eq!(cache.compute_key("r", &all1), cache.compute_key("r", &all2));

    let subset = cache_relevant_subset(&all1);
    assert_eq!(all1.fetch, FetchMode::All);
    assert!(!subset.contains_key("page"));
    assert!(!subset.contains_key("per_page"));
}

#[test]
fn sort_and_dir_participate() {
    let cache = coordinator();
    let asc = normalized(&[("sort", json!("created_at"))]);
    let desc = normalized(&[("sort", json!("created_at")), ("dir", json!("desc"))]);
    assert_ne!(cache.compute_key("r", &asc), cache.compute_key("r", &desc));
}

#[test]
fn ttl_precedence_override_then_declared_then_default() {
    let cache = coordinator();
    assert_eq!(cache.resolve_ttl(Some(5), Some(1200)), 5);
    assert_eq!(cache.resolve_ttl(None, Some(1200)), 1200);
    assert_eq!(cache.resolve_ttl(None, None), DEFAULT_TTL_SECONDS);
}

#[test]
fn zero_ttl_and_cache_flag_disable_use() {
    let cache = coordinator();
    assert!(cache.should_use(true, 900));
    assert!(!cache.should_use(true, 0));
    assert!(!cache.should_use(false, 900));
    assert!(!CacheCoordinator::disabled().should_use(true, 900));
}

#[tokio::test]
async fn roundtrip_through_memory_store() {
    let cache = coordinator();
    let mut result = ReportResult::default();
    result.summary.insert("total".into(), json!(3));
    let entry = CacheEntry::from_result(&result);

    cache.write("informe:report:r:abc", &entry, 60).await;
    let read = cache.read("informe:report:r:abc").await.unwrap();
    assert_eq!(read.summary["total"], json!(3));
    assert!(cache.read("informe:report:r:other").await.is_none());
}

#[tokio::test]
async fn corrupt_entry_counts_as_miss() {
    let store = Arc::new(MemoryCacheStore::new());
    store.set_with_ttl("bad", "{not json", 60).await.unwrap();
    let cache = CacheCoordinator::new(store, "", DEFAULT_TTL_SECONDS);
    assert!(cache.read("bad").await.is_none());
}

#[tokio::test]
async fn sqlite_store_roundtrip_and_expiry() {
    let store = SqliteCacheStore::open_in_memory().unwrap();
    store.set_with_ttl("live", "payload", 60).await.unwrap();
    store.set_with_ttl("dead", "payload", 0).await.unwrap();
    assert_eq!(store.get("live").await.unwrap().as_deref(), Some("payload"));
    assert_eq!(store.get("dead").await.unwrap(), None);
    assert_eq!(store.len().await.unwrap(), 1);
}
