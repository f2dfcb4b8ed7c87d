//! The adapter seam between the aggregator and indexer wire protocols.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::RETRY_AFTER, Client, Response, StatusCode};
use thiserror::Error;

use super::apibay::ApiBayAdapter;
use super::jackett::JackettAdapter;
use super::newznab::NewznabAdapter;
use super::torznab::TorznabAdapter;
use super::types::{OutcomeStatus, RawRelease, SearchRequest, TimeoutScope};
use crate::indexer::{IndexerDescriptor, IndexerKind};

/// Failure of a single indexer query.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Request timed out")]
    Timeout,

    #[error("Authentication rejected: {0}")]
    Unauthorized(String),

    #[error("Rate limited by indexer")]
    RateLimited { retry_after: Option<Duration> },

    /// Entries parsed before the failure are kept in `partial`.
    #[error("Malformed response: {reason}")]
    MalformedResponse {
        reason: String,
        partial: Vec<RawRelease>,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
}

impl AdapterError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        AdapterError::MalformedResponse {
            reason: reason.into(),
            partial: Vec::new(),
        }
    }

    /// Outcome status plus any salvaged entries.
    pub fn into_outcome(self) -> (OutcomeStatus, Vec<RawRelease>) {
        match self {
            AdapterError::Timeout => (
                OutcomeStatus::Timeout {
                    scope: TimeoutScope::Adapter,
                },
                Vec::new(),
            ),
            AdapterError::Unauthorized(_) => (OutcomeStatus::Unauthorized, Vec::new()),
            AdapterError::RateLimited { retry_after } => (
                OutcomeStatus::RateLimited {
                    retry_after_ms: retry_after.map(|d| d.as_millis() as u64),
                },
                Vec::new(),
            ),
            AdapterError::MalformedResponse { partial, .. } => {
                (OutcomeStatus::MalformedResponse, partial)
            }
            AdapterError::Network(_) | AdapterError::Http { .. } => {
                (OutcomeStatus::Network, Vec::new())
            }
        }
    }
}

impl From<reqwest::Error> for AdapterError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AdapterError::Timeout
        } else if e.is_decode() {
            AdapterError::malformed(e.to_string())
        } else {
            AdapterError::Network(e.to_string())
        }
    }
}

/// Queries one kind of indexer backend and returns its entries un-normalized.
#[async_trait]
pub trait IndexerAdapter: Send + Sync {
    async fn search(
        &self,
        indexer: &IndexerDescriptor,
        request: &SearchRequest,
        timeout: Duration,
    ) -> Result<Vec<RawRelease>, AdapterError>;
}

/// Adapter per indexer kind.
#[derive(Clone, Default)]
pub struct AdapterSet {
    adapters: HashMap<IndexerKind, Arc<dyn IndexerAdapter>>,
}

impl AdapterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// All built-in HTTP adapters sharing one connection pool.
    pub fn http(user_agent: &str) -> Result<Self, AdapterError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| AdapterError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self::new()
            .with(IndexerKind::Torznab, Arc::new(TorznabAdapter::new(client.clone())))
            .with(IndexerKind::Newznab, Arc::new(NewznabAdapter::new(client.clone())))
            .with(IndexerKind::Jackett, Arc::new(JackettAdapter::new(client.clone())))
            .with(IndexerKind::ApiBay, Arc::new(ApiBayAdapter::new(client))))
    }

    pub fn with(mut self, kind: IndexerKind, adapter: Arc<dyn IndexerAdapter>) -> Self {
        self.adapters.insert(kind, adapter);
        self
    }

    pub fn get(&self, kind: IndexerKind) -> Option<Arc<dyn IndexerAdapter>> {
        self.adapters.get(&kind).cloned()
    }
}

impl fmt::Debug for AdapterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.adapters.keys().map(|k| k.as_str()).collect();
        kinds.sort_unstable();
        f.debug_struct("AdapterSet").field("kinds", &kinds).finish()
    }
}

/// Base URL of an indexer or a network error when none is configured.
pub(crate) fn base_url(indexer: &IndexerDescriptor) -> Result<&str, AdapterError> {
    indexer
        .effective_base_url()
        .ok_or_else(|| AdapterError::Network(format!("indexer '{}' has no URL", indexer.id)))
}

/// GET `url` and return the body of a successful response.
pub(crate) async fn fetch_text(
    client: &Client,
    url: &str,
    timeout: Duration,
) -> Result<String, AdapterError> {
    let response = client.get(url).timeout(timeout).send().await?;
    let response = check_status(response).await?;
    Ok(response.text().await?)
}

/// Map non-success statuses onto adapter errors.
pub(crate) async fn check_status(response: Response) -> Result<Response, AdapterError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after);
    let body = response.text().await.unwrap_or_default();
    Err(classify_status(status, retry_after, &body))
}

pub(crate) fn classify_status(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
) -> AdapterError {
    if is_challenge_page(body) {
        return AdapterError::Network(format!(
            "HTTP {}: blocked by a browser challenge page",
            status.as_u16()
        ));
    }
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            AdapterError::Unauthorized(format!("HTTP {}", status.as_u16()))
        }
        StatusCode::TOO_MANY_REQUESTS => AdapterError::RateLimited { retry_after },
        _ => AdapterError::Http {
            status: status.as_u16(),
            body: body.chars().take(200).collect(),
        },
    }
}

fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

fn is_challenge_page(body: &str) -> bool {
    let head: String = body.chars().take(4096).collect::<String>().to_ascii_lowercase();
    head.contains("cf-browser-verification")
        || head.contains("challenge-platform")
        || (head.contains("cloudflare") && head.contains("just a moment"))
}
