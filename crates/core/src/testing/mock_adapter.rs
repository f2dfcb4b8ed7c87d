//! Mock indexer adapter for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::indexer::IndexerDescriptor;
use crate::searcher::{AdapterError, IndexerAdapter, RawRelease, SearchRequest};

/// A recorded adapter query for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedQuery {
    pub indexer_id: String,
    pub query: String,
    pub timeout: Duration,
}

/// Failure a scripted indexer reports.
#[derive(Debug, Clone)]
pub enum MockFailure {
    Timeout,
    Unauthorized,
    RateLimited,
    Malformed { partial: Vec<RawRelease> },
    Network,
}

impl From<MockFailure> for AdapterError {
    fn from(failure: MockFailure) -> Self {
        match failure {
            MockFailure::Timeout => AdapterError::Timeout,
            MockFailure::Unauthorized => AdapterError::Unauthorized("HTTP 401".to_string()),
            MockFailure::RateLimited => AdapterError::RateLimited {
                retry_after: Some(Duration::from_secs(60)),
            },
            MockFailure::Malformed { partial } => AdapterError::MalformedResponse {
                reason: "unexpected end of document".to_string(),
                partial,
            },
            MockFailure::Network => AdapterError::Network("connection refused".to_string()),
        }
    }
}

#[derive(Debug, Clone)]
enum Response {
    Releases(Vec<RawRelease>),
    Fail(MockFailure),
    Hang,
}

#[derive(Debug, Clone)]
struct Script {
    delay: Option<Duration>,
    response: Response,
}

/// Decrements the in-flight counter when a query ends or is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Mock implementation of the IndexerAdapter trait.
///
/// Each indexer id is scripted independently; unscripted indexers answer
/// with no results. The mock also tracks how many queries ran at once.
///
/// # Example
///
/// ```rust,ignore
/// let adapter = Arc::new(MockAdapter::new());
/// adapter.set_releases("nyaa", vec![fixtures::raw_release("1", "Show.S01E01")]).await;
/// adapter.set_hang("slow").await;
///
/// let adapters = AdapterSet::new().with(IndexerKind::Torznab, adapter.clone());
/// // ... run a search ...
/// assert_eq!(adapter.calls().await.len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct MockAdapter {
    scripts: Arc<RwLock<HashMap<String, Script>>>,
    calls: Arc<RwLock<Vec<RecordedQuery>>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    async fn script(&self, indexer_id: &str, delay: Option<Duration>, response: Response) {
        self.scripts
            .write()
            .await
            .insert(indexer_id.to_string(), Script { delay, response });
    }

    /// Answer immediately with `releases`.
    pub async fn set_releases(&self, indexer_id: &str, releases: Vec<RawRelease>) {
        self.script(indexer_id, None, Response::Releases(releases))
            .await;
    }

    /// Answer with `releases` after `delay`.
    pub async fn set_delayed(&self, indexer_id: &str, delay: Duration, releases: Vec<RawRelease>) {
        self.script(indexer_id, Some(delay), Response::Releases(releases))
            .await;
    }

    pub async fn set_failure(&self, indexer_id: &str, failure: MockFailure) {
        self.script(indexer_id, None, Response::Fail(failure)).await;
    }

    /// Never answer.
    pub async fn set_hang(&self, indexer_id: &str) {
        self.script(indexer_id, None, Response::Hang).await;
    }

    /// Every query received, in arrival order.
    pub async fn calls(&self) -> Vec<RecordedQuery> {
        self.calls.read().await.clone()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of queries observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IndexerAdapter for MockAdapter {
    async fn search(
        &self,
        indexer: &IndexerDescriptor,
        request: &SearchRequest,
        timeout: Duration,
    ) -> Result<Vec<RawRelease>, AdapterError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        self.calls.write().await.push(RecordedQuery {
            indexer_id: indexer.id.clone(),
            query: request.effective_query(),
            timeout,
        });

        let script = self.scripts.read().await.get(&indexer.id).cloned();
        let Some(script) = script else {
            return Ok(Vec::new());
        };
        if let Some(delay) = script.delay {
            tokio::time::sleep(delay).await;
        }
        match script.response {
            Response::Releases(mut releases) => {
                if let Some(limit) = request.limit {
                    releases.truncate(limit as usize);
                }
                Ok(releases)
            }
            Response::Fail(failure) => Err(failure.into()),
            Response::Hang => std::future::pending().await,
        }
    }
}
