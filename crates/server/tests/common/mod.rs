//! Common test utilities for in-process API testing.
//!
//! The fixture wires a real SQLite indexer store to a scripted adapter and
//! mock download clients, then drives the router with `oneshot` requests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use scout_core::{
    config::{Config, DatabaseConfig, IndexerConfig},
    indexer::{IndexerKind, Protocol},
    testing::{MockAdapter, MockDownloadClient},
    AdapterSet, Dispatcher, IndexerDescriptor, IndexerStore, ReleaseEngine, SqliteIndexerStore,
};
use scout_server::{api::create_router, state::AppState};

pub use scout_core::testing::fixtures;

/// In-process server with controllable backends.
///
/// # Example
///
/// ```rust,ignore
/// let fixture = TestFixture::new(&["nyaa"]);
/// fixture.adapter.set_releases("nyaa", vec![fixtures::raw_release("1", "Show.1080p")]).await;
/// let response = fixture.post("/api/v1/search", json!({ "request": { "query": "show" } })).await;
/// assert_eq!(response.status, StatusCode::OK);
/// ```
pub struct TestFixture {
    pub router: Router,
    pub state: Arc<AppState>,
    /// Answers for every Torznab and Newznab indexer
    pub adapter: Arc<MockAdapter>,
    /// Registered as "qbittorrent", handles torrents
    pub torrent_client: Arc<MockDownloadClient>,
    /// Registered as "sabnzbd", handles NZBs
    pub usenet_client: Arc<MockDownloadClient>,
    pub store: Arc<dyn IndexerStore>,
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Torznab indexers with the given ids, all enabled at default priority.
    pub fn new(indexer_ids: &[&str]) -> Self {
        let descriptors: Vec<_> = indexer_ids.iter().map(|id| fixtures::descriptor(id)).collect();
        Self::with_descriptors(&descriptors)
    }

    pub fn with_descriptors(descriptors: &[IndexerDescriptor]) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let config = Config {
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            indexers: descriptors.iter().map(indexer_config).collect(),
            ..Default::default()
        };

        let sqlite = Arc::new(SqliteIndexerStore::new(&db_path).expect("Failed to create store"));
        sqlite.import(descriptors).expect("Failed to import indexers");
        let store: Arc<dyn IndexerStore> = sqlite;

        let adapter = Arc::new(MockAdapter::new());
        let adapters = AdapterSet::new()
            .with(IndexerKind::Torznab, adapter.clone())
            .with(IndexerKind::Newznab, adapter.clone());
        let engine = Arc::new(ReleaseEngine::new(
            Arc::clone(&store),
            adapters,
            &config.search,
        ));

        let torrent_client = Arc::new(MockDownloadClient::new("qbittorrent", &[Protocol::Torrent]));
        let usenet_client = Arc::new(MockDownloadClient::new("sabnzbd", &[Protocol::Nzb]));
        let dispatcher = Dispatcher::new(Arc::clone(&store))
            .with_client(torrent_client.clone())
            .with_client(usenet_client.clone());

        let state = Arc::new(AppState::new(config, engine, Arc::new(dispatcher)));
        let router = create_router(Arc::clone(&state));

        Self {
            router,
            state,
            adapter,
            torrent_client,
            usenet_client,
            store,
            temp_dir,
        }
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// POST a raw string body (for malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// GET returning the raw body text (for non-JSON endpoints).
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder().uri(path).body(Body::empty()).unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        let body = match body {
            Some(json) => {
                builder = builder.header("Content-Type", "application/json");
                Body::from(serde_json::to_vec(&json).unwrap())
            }
            None => Body::empty(),
        };
        self.send(builder.body(body).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

fn indexer_config(d: &IndexerDescriptor) -> IndexerConfig {
    IndexerConfig {
        id: d.id.clone(),
        name: Some(d.name.clone()),
        kind: d.kind,
        protocol: Some(d.protocol),
        privacy: d.privacy,
        priority: d.priority,
        enabled: d.enabled,
        base_url: d.base_url.clone(),
        mirrors: Vec::new(),
        api_key: d.credentials.api_key.clone(),
        username: None,
        password: None,
        remote_id: None,
        rate_limit_rpm: d.rate_limit_rpm,
        categories: Default::default(),
        supported_categories: Vec::new(),
    }
}

/// Assert a response status, printing the body on mismatch.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}

/// Assert a top-level JSON field equals the expected value.
#[macro_export]
macro_rules! assert_json_path {
    ($json:expr, $path:expr, $expected:expr) => {
        let actual = &$json[$path];
        assert_eq!(
            actual, &$expected,
            "Path '{}' expected {:?}, got {:?}",
            $path, $expected, actual
        );
    };
}
