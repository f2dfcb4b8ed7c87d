//! HTTP API tests driven in-process against scripted backends.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;

use common::{fixtures, TestFixture};
use scout_core::dispatch::DownloadClientError;
use scout_core::indexer::{IndexerKind, Protocol};
use scout_core::testing::MockFailure;

// =============================================================================
// Health and config
// =============================================================================

#[tokio::test]
async fn test_health() {
    let fixture = TestFixture::new(&[]);
    let response = fixture.get("/api/v1/health").await;

    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "status", json!("ok"));
    assert!(response.body["version"].is_string());
}

#[tokio::test]
async fn test_config_is_sanitized() {
    let mut secret = fixtures::descriptor("private");
    secret.credentials.api_key = Some("very-secret-key".to_string());
    let fixture = TestFixture::with_descriptors(&[secret]);

    let response = fixture.get("/api/v1/config").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["indexers"][0]["id"], "private");
    assert_eq!(response.body["indexers"][0]["api_key_configured"], true);
    assert!(!response.body.to_string().contains("very-secret-key"));
}

// =============================================================================
// Indexer registry
// =============================================================================

#[tokio::test]
async fn test_list_indexers_in_priority_order() {
    let mut low = fixtures::descriptor("low");
    low.priority = 50;
    let mut high = fixtures::descriptor("high");
    high.priority = 1;
    high.credentials.api_key = Some("k".to_string());
    let fixture = TestFixture::with_descriptors(&[low, high]);

    let response = fixture.get("/api/v1/indexers").await;
    assert_status!(response, StatusCode::OK);

    let indexers = response.body["indexers"].as_array().unwrap();
    assert_eq!(indexers.len(), 2);
    assert_eq!(indexers[0]["id"], "high");
    assert_eq!(indexers[0]["api_key_configured"], true);
    assert!(indexers[0].get("credentials").is_none());
    assert_eq!(indexers[1]["id"], "low");
}

#[tokio::test]
async fn test_disable_indexer_excludes_it_from_search() {
    let fixture = TestFixture::new(&["a", "b"]);

    let response = fixture
        .post("/api/v1/indexers/b/enabled", json!({ "enabled": false }))
        .await;
    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "enabled", json!(false));

    let response = fixture
        .post("/api/v1/search", json!({ "request": { "query": "anything" } }))
        .await;
    assert_status!(response, StatusCode::OK);
    let outcomes = response.body["indexer_outcomes"].as_array().unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0]["indexer_id"], "a");
}

#[tokio::test]
async fn test_set_priority() {
    let fixture = TestFixture::new(&["a"]);
    let response = fixture
        .post("/api/v1/indexers/a/priority", json!({ "priority": 3 }))
        .await;

    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "priority", json!(3));
    assert_eq!(fixture.store.get("a").unwrap().priority, 3);
}

#[tokio::test]
async fn test_unknown_indexer_is_not_found() {
    let fixture = TestFixture::new(&["a"]);

    let response = fixture
        .post("/api/v1/indexers/ghost/enabled", json!({ "enabled": true }))
        .await;
    assert_status!(response, StatusCode::NOT_FOUND);
    assert!(response.body["error"].is_string());

    let response = fixture
        .post("/api/v1/indexers/ghost/priority", json!({ "priority": 1 }))
        .await;
    assert_status!(response, StatusCode::NOT_FOUND);
}

// =============================================================================
// Search and selection
// =============================================================================

#[tokio::test]
async fn test_search_reports_failures_per_indexer() {
    let fixture = TestFixture::new(&["good", "broken"]);
    fixture
        .adapter
        .set_releases(
            "good",
            vec![
                fixtures::raw_release("1", "Movie.2020.1080p.BluRay"),
                fixtures::raw_release("2", "Movie.2020.DVDRip"),
            ],
        )
        .await;
    fixture
        .adapter
        .set_failure("broken", MockFailure::Unauthorized)
        .await;

    let response = fixture
        .post(
            "/api/v1/search",
            json!({
                "request": { "title": "Movie", "year": 2020 },
                "policy": { "quality": "hd-1080p" }
            }),
        )
        .await;

    assert_status!(response, StatusCode::OK);
    let body = &response.body;
    assert_eq!(body["releases"].as_array().unwrap().len(), 2);
    assert_eq!(body["selection"]["state"], "selected");
    assert_eq!(body["selection"]["best"]["key"], "good:1");

    let outcomes = body["indexer_outcomes"].as_array().unwrap();
    assert_eq!(outcomes.len(), 2);
    let broken = outcomes.iter().find(|o| o["indexer_id"] == "broken").unwrap();
    assert_eq!(broken["status"]["kind"], "unauthorized");
}

#[tokio::test]
async fn test_search_with_no_candidates_is_empty_not_error() {
    let fixture = TestFixture::new(&["a"]);
    fixture
        .adapter
        .set_releases("a", vec![fixtures::raw_release("1", "Movie.DVDRip")])
        .await;

    let response = fixture
        .post(
            "/api/v1/search",
            json!({ "request": { "query": "movie" }, "policy": { "quality": "2160p" } }),
        )
        .await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["selection"]["state"], "empty");
    assert_eq!(response.body["releases"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_search_respects_request_deadline() {
    let fixture = TestFixture::new(&["fast", "stuck"]);
    fixture
        .adapter
        .set_releases("fast", vec![fixtures::raw_release("1", "Show.720p")])
        .await;
    fixture.adapter.set_hang("stuck").await;

    let started = std::time::Instant::now();
    let response = fixture
        .post(
            "/api/v1/search",
            json!({ "request": { "query": "show", "deadline_ms": 200 } }),
        )
        .await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["deadline_exceeded"], true);
    let stuck = response.body["indexer_outcomes"]
        .as_array()
        .unwrap()
        .iter()
        .find(|o| o["indexer_id"] == "stuck")
        .cloned()
        .unwrap();
    assert_eq!(stuck["status"]["kind"], "timeout");
    assert_eq!(stuck["status"]["scope"], "call");
}

#[tokio::test]
async fn test_search_invalid_request() {
    let fixture = TestFixture::new(&["a"]);

    let response = fixture
        .post("/api/v1/search", json!({ "request": { "query": "   " } }))
        .await;
    assert_status!(response, StatusCode::BAD_REQUEST);
    assert!(response.body["error"]
        .as_str()
        .unwrap()
        .contains("query or title"));

    let response = fixture.post_raw("/api/v1/search", "{not json").await;
    assert!(response.status.is_client_error());
}

#[tokio::test]
async fn test_search_after_shutdown_is_cancelled() {
    let fixture = TestFixture::new(&["a"]);
    fixture.state.shutdown_token().cancel();

    let response = fixture
        .post("/api/v1/search", json!({ "request": { "query": "x" } }))
        .await;
    assert_eq!(response.status.as_u16(), 499);
}

#[tokio::test]
async fn test_select_best_over_prior_results() {
    let fixture = TestFixture::new(&[]);
    let releases = vec![
        fixtures::release("a", "1", "Movie.720p", 500),
        fixtures::release("b", "2", "Movie.1080p", 5),
        fixtures::release("c", "3", "Movie.1080p", 50),
    ];

    let response = fixture
        .post(
            "/api/v1/search/best",
            json!({ "releases": releases, "policy": { "quality": "1080p" } }),
        )
        .await;
    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "key", json!("c:3"));
}

#[tokio::test]
async fn test_select_best_no_candidates() {
    let fixture = TestFixture::new(&[]);
    let releases = vec![fixtures::release("a", "1", "Movie.DVDRip", 10)];

    let response = fixture
        .post(
            "/api/v1/search/best",
            json!({ "releases": releases, "policy": { "quality": "hd-1080p" } }),
        )
        .await;
    assert_status!(response, StatusCode::NOT_FOUND);
    assert_json_path!(response.body, "error", json!("no_candidates"));
}

// =============================================================================
// Grab
// =============================================================================

#[tokio::test]
async fn test_grab_routes_by_protocol() {
    let fixture = TestFixture::new(&["a"]);
    let release = fixtures::release("a", "abc", "Show.S01E01.1080p", 10);

    let response = fixture
        .post("/api/v1/grab", json!({ "release": release }))
        .await;

    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "client", json!("qbittorrent"));
    assert_json_path!(response.body, "quality", json!("1080p"));
    assert_json_path!(response.body, "release_key", json!("a:abc"));

    let grabs = fixture.torrent_client.grabs().await;
    assert_eq!(grabs.len(), 1);
    assert_eq!(grabs[0].uri, "magnet:?xt=urn:btih:abc");
    assert!(fixture.usenet_client.grabs().await.is_empty());
}

#[tokio::test]
async fn test_grab_named_client_mismatch_is_bad_request() {
    let fixture = TestFixture::new(&["a"]);
    let release = fixtures::release("a", "abc", "Show", 10);

    let response = fixture
        .post(
            "/api/v1/grab",
            json!({ "release": release, "client": "sabnzbd" }),
        )
        .await;
    assert_status!(response, StatusCode::BAD_REQUEST);

    let response = fixture
        .post(
            "/api/v1/grab",
            json!({ "release": release, "client": "transmission" }),
        )
        .await;
    assert_status!(response, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_grab_client_failure_is_bad_gateway() {
    let mut nzb = fixtures::descriptor("usenet");
    nzb.kind = IndexerKind::Newznab;
    nzb.protocol = Protocol::Nzb;
    let fixture = TestFixture::with_descriptors(&[nzb]);
    fixture
        .usenet_client
        .set_next_error(DownloadClientError::ConnectionFailed("refused".to_string()))
        .await;

    let mut release = fixtures::release("usenet", "n1", "Show.720p", 0);
    release.protocol = Protocol::Nzb;
    release.download = scout_core::searcher::DownloadLocator::from_uri("https://usenet.test/nzb/n1");

    let response = fixture
        .post("/api/v1/grab", json!({ "release": release }))
        .await;
    assert_status!(response, StatusCode::BAD_GATEWAY);
    assert!(response.body["error"].as_str().unwrap().contains("sabnzbd"));
}

// =============================================================================
// Metrics
// =============================================================================

#[tokio::test]
async fn test_metrics_exposition() {
    let fixture = TestFixture::new(&["a"]);
    fixture
        .post("/api/v1/search", json!({ "request": { "query": "x" } }))
        .await;

    let (status, text) = fixture.get_text("/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("scout_searches_total"));
    assert!(text.contains("scout_indexers"));
}
