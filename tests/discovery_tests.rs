//! Integration tests for the discovery loop
//!
//! These tests use wiremock to serve listing pages and check pagination,
//! termination, and circuit-breaker behavior end-to-end.

mod common;

use common::{client, listing_page, memory_store, numbered_ids, test_config, LISTING_PATH};
use jobtrawl::crawler::{DiscoveryLoop, FailureClass, FetchFailure, StopReason, PLACEHOLDER_BODY};
use jobtrawl::events::{EventKind, EventStatus, MemorySink, Phase};
use jobtrawl::storage::RecordStore;
use jobtrawl::JobStatus;
use std::sync::Arc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_page(server: &MockServer, start: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param("start", start))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_discovery_pages_until_empty_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param("location", "Chile"))
        .and(query_param("f_TPR", "r86400"))
        .and(query_param("pageNum", "0"))
        .and(query_param("start", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&["1", "2", "3"])))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, "3", listing_page(&["4", "5"])).await;
    mount_page(&server, "5", "<ul></ul>".to_string()).await;

    let config = test_config(&server.uri());
    let store = memory_store();
    let events = Arc::new(MemorySink::new());

    let report = DiscoveryLoop::new(&config, client(&config), store.clone(), events.clone())
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.stop_reason, StopReason::Exhausted);
    assert_eq!(report.pages, 3);
    assert_eq!(report.final_offset, 5);
    assert_eq!(report.ids_found, 5);
    assert_eq!(report.ids_inserted, 5);

    let storage = store.lock().unwrap();
    let pending = storage.list_pending(Some("Chile")).unwrap();
    assert_eq!(pending.len(), 5);
    assert!(pending.iter().all(|r| r.status == JobStatus::Pending));

    assert_eq!(events.count(EventKind::DiscoveryStarted), 1);
    assert_eq!(events.count(EventKind::DiscoveryIteration), 2);
    assert_eq!(events.count(EventKind::NoIdsFound), 1);
    assert_eq!(events.count(EventKind::DiscoveryCompleted), 1);
    assert_eq!(events.count(EventKind::CircuitTripped(Phase::Discovery)), 0);
}

#[tokio::test]
async fn test_full_pages_advance_offset_by_page_size() {
    let server = MockServer::start().await;
    mount_page(&server, "0", listing_page(&numbered_ids(1000, 1250))).await;
    mount_page(&server, "250", listing_page(&numbered_ids(1250, 1500))).await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param("start", "500"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<ul></ul>"))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let store = memory_store();

    let report = DiscoveryLoop::new(&config, client(&config), store.clone(), Arc::new(MemorySink::new()))
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.stop_reason, StopReason::Exhausted);
    assert_eq!(report.pages, 3);
    assert_eq!(report.final_offset, 500);
    assert_eq!(report.ids_inserted, 500);
    assert_eq!(
        store.lock().unwrap().count_by_status(JobStatus::Pending).unwrap(),
        500
    );
}

#[tokio::test]
async fn test_rediscovery_is_idempotent() {
    let server = MockServer::start().await;
    mount_page(&server, "0", listing_page(&["10", "11", "12"])).await;
    mount_page(&server, "3", "<html><body></body></html>".to_string()).await;

    let config = test_config(&server.uri());
    let store = memory_store();
    let events = Arc::new(MemorySink::new());

    let discovery =
        DiscoveryLoop::new(&config, client(&config), store.clone(), events.clone()).unwrap();
    let first = discovery.run().await.unwrap();
    let second = discovery.run().await.unwrap();

    assert_eq!(first.ids_inserted, 3);
    assert_eq!(second.ids_found, 3);
    assert_eq!(second.ids_inserted, 0);
    assert_eq!(second.final_offset, 3);
    assert_eq!(
        store.lock().unwrap().count_by_status(JobStatus::Pending).unwrap(),
        3
    );
}

#[tokio::test]
async fn test_duplicate_batch_still_advances() {
    let server = MockServer::start().await;
    mount_page(&server, "0", listing_page(&["1", "2", "3"])).await;
    // Same identifiers again at the next offset
    mount_page(&server, "3", listing_page(&["1", "2", "3"])).await;
    mount_page(&server, "6", "<ul></ul>".to_string()).await;

    let config = test_config(&server.uri());
    let store = memory_store();

    let report = DiscoveryLoop::new(&config, client(&config), store.clone(), Arc::new(MemorySink::new()))
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.stop_reason, StopReason::Exhausted);
    assert_eq!(report.final_offset, 6);
    assert_eq!(report.ids_found, 6);
    assert_eq!(report.ids_inserted, 3);
}

#[tokio::test]
async fn test_discovery_rate_limit_trips_breaker() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(ResponseTemplate::new(429))
        .expect(5)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let store = memory_store();
    let events = Arc::new(MemorySink::new());

    let discovery =
        DiscoveryLoop::new(&config, client(&config), store.clone(), events.clone()).unwrap();
    let report = discovery.run().await.unwrap();

    assert_eq!(
        report.stop_reason,
        StopReason::FetchFailed(FetchFailure::RateLimited)
    );
    assert_eq!(report.pages, 0);
    assert_eq!(report.ids_inserted, 0);
    assert!(discovery.breaker().is_stopped());
    assert_eq!(discovery.breaker().tripped_by(), Some(FailureClass::RateLimited));
    assert_eq!(store.lock().unwrap().count_by_status(JobStatus::Pending).unwrap(), 0);
    assert_eq!(events.count(EventKind::CircuitTripped(Phase::Discovery)), 1);

    // The stop signal stays set; a second run sends no requests
    let again = discovery.run().await.unwrap();
    assert_eq!(again.stop_reason, StopReason::FetchFailed(FetchFailure::Aborted));
}

#[tokio::test]
async fn test_discovery_not_found_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let discovery =
        DiscoveryLoop::new(&config, client(&config), memory_store(), Arc::new(MemorySink::new()))
            .unwrap();
    let report = discovery.run().await.unwrap();

    assert_eq!(report.stop_reason, StopReason::FetchFailed(FetchFailure::NotFound));
    assert_eq!(discovery.breaker().counts().not_found, 1);
    assert!(!discovery.breaker().is_stopped());
}

#[tokio::test]
async fn test_discovery_placeholder_body_stops() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(PLACEHOLDER_BODY))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let store = memory_store();
    let discovery =
        DiscoveryLoop::new(&config, client(&config), store.clone(), Arc::new(MemorySink::new()))
            .unwrap();
    let report = discovery.run().await.unwrap();

    assert_eq!(report.stop_reason, StopReason::FetchFailed(FetchFailure::EmptyBody));
    assert_eq!(discovery.breaker().counts().empty_body, 1);
    assert_eq!(store.lock().unwrap().count_by_status(JobStatus::Pending).unwrap(), 0);
}

#[tokio::test]
async fn test_placeholder_after_last_page_completes_normally() {
    let server = MockServer::start().await;
    mount_page(&server, "0", listing_page(&["21", "22"])).await;
    mount_page(&server, "2", PLACEHOLDER_BODY.to_string()).await;

    let config = test_config(&server.uri());
    let events = Arc::new(MemorySink::new());
    let report = DiscoveryLoop::new(&config, client(&config), memory_store(), events.clone())
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.stop_reason, StopReason::FetchFailed(FetchFailure::EmptyBody));
    assert_eq!(report.ids_inserted, 2);
    assert_eq!(events.count(EventKind::NoIdsFound), 1);

    let completed = events
        .events()
        .into_iter()
        .find(|e| e.kind == EventKind::DiscoveryCompleted)
        .expect("completion event");
    assert_eq!(completed.status, EventStatus::Success);
    assert_eq!(completed.error_message, None);
    assert_eq!(completed.records_count, 2);
}

#[tokio::test]
async fn test_tripped_empty_body_completion_is_partial() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(PLACEHOLDER_BODY))
        .mount(&server)
        .await;

    let mut config = test_config(&server.uri());
    config.thresholds.empty_body = 1;
    let events = Arc::new(MemorySink::new());
    let discovery =
        DiscoveryLoop::new(&config, client(&config), memory_store(), events.clone()).unwrap();
    discovery.run().await.unwrap();

    assert_eq!(discovery.breaker().tripped_by(), Some(FailureClass::EmptyBody));
    assert_eq!(events.count(EventKind::NoIdsFound), 0);
    let completed = events
        .events()
        .into_iter()
        .find(|e| e.kind == EventKind::DiscoveryCompleted)
        .expect("completion event");
    assert_eq!(completed.status, EventStatus::Partial);
}

#[tokio::test]
async fn test_discovery_server_errors_exhaust_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(ResponseTemplate::new(503))
        .expect(5)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let report =
        DiscoveryLoop::new(&config, client(&config), memory_store(), Arc::new(MemorySink::new()))
            .unwrap()
            .run()
            .await
            .unwrap();

    assert_eq!(
        report.stop_reason,
        StopReason::FetchFailed(FetchFailure::NetworkExhausted {
            attempts: 5,
            last_error: "HTTP 503".to_string()
        })
    );
}

#[tokio::test]
async fn test_discovery_recovers_from_transient_rate_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param("start", "0"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    mount_page(&server, "0", listing_page(&["7", "8"])).await;
    mount_page(&server, "2", "<ul></ul>".to_string()).await;

    let config = test_config(&server.uri());
    let store = memory_store();
    let discovery =
        DiscoveryLoop::new(&config, client(&config), store.clone(), Arc::new(MemorySink::new()))
            .unwrap();
    let report = discovery.run().await.unwrap();

    assert_eq!(report.stop_reason, StopReason::Exhausted);
    assert_eq!(report.ids_inserted, 2);
    // The 200 reset the rate-limit counter
    assert_eq!(discovery.breaker().counts().rate_limited, 0);
    assert!(!discovery.breaker().is_stopped());
}
