//! Request, release and outcome types for the search engine.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::indexer::{CategoryId, Protocol, RegistryError};
use crate::selection::Selection;

/// A search call as issued by a caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Free text. When empty, built from the structured fields.
    #[serde(default)]
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,
    /// Canonical categories; empty means all.
    #[serde(default)]
    pub categories: Vec<CategoryId>,
    /// Restrict to these protocols (None = all).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocols: Option<Vec<Protocol>>,
    /// Restrict to these indexer ids (None = all enabled).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexer_ids: Option<Vec<String>>,
    /// Skip this many ranked releases in the outcome.
    #[serde(default)]
    pub offset: u32,
    /// Max releases per indexer and in the outcome.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Per-indexer timeout override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Whole-call deadline override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_ms: Option<u64>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// Movie lookup: "{title} {year}" in the Movies category.
    pub fn movie(title: impl Into<String>, year: Option<u32>) -> Self {
        Self {
            title: Some(title.into()),
            year,
            categories: vec![CategoryId::MOVIES],
            ..Default::default()
        }
    }

    /// Episode lookup: "{title} S01E02" in the TV category.
    pub fn episode(title: impl Into<String>, season: u32, episode: Option<u32>) -> Self {
        Self {
            title: Some(title.into()),
            season: Some(season),
            episode,
            categories: vec![CategoryId::TV],
            ..Default::default()
        }
    }

    pub fn with_categories(mut self, categories: impl IntoIterator<Item = CategoryId>) -> Self {
        self.categories = categories.into_iter().collect();
        self
    }

    pub fn with_indexers(mut self, ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.indexer_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_protocols(mut self, protocols: impl IntoIterator<Item = Protocol>) -> Self {
        self.protocols = Some(protocols.into_iter().collect());
        self
    }

    /// The text sent to indexers.
    pub fn effective_query(&self) -> String {
        let query = self.query.trim();
        if !query.is_empty() {
            return query.to_string();
        }
        let Some(title) = self.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
            return String::new();
        };
        match (self.season, self.episode, self.year) {
            (Some(s), Some(e), _) => format!("{} S{:02}E{:02}", title, s, e),
            (Some(s), None, _) => format!("{} S{:02}", title, s),
            (None, _, Some(y)) => format!("{} {}", title, y),
            _ => title.to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.effective_query().is_empty() {
            return Err(EngineError::InvalidRequest(
                "query or title is required".to_string(),
            ));
        }
        if self.limit == Some(0) {
            return Err(EngineError::InvalidRequest(
                "limit must be greater than 0".to_string(),
            ));
        }
        if self.timeout_ms == Some(0) || self.deadline_ms == Some(0) {
            return Err(EngineError::InvalidRequest(
                "timeouts must be greater than 0".to_string(),
            ));
        }
        if matches!(&self.protocols, Some(p) if p.is_empty()) {
            return Err(EngineError::InvalidRequest(
                "protocols restriction cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Size as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReportedSize {
    Bytes(u64),
    /// Human text such as "1.4 GiB" or "700 MB".
    Text(String),
    #[default]
    Unknown,
}

/// Publication time as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReportedAge {
    At(DateTime<Utc>),
    UnixSeconds(i64),
    /// Date text: RFC 2822/3339, "Today 12:30", "Y-day", "3 days ago", ...
    Text(String),
    #[default]
    Unknown,
}

/// How a download is fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorKind {
    Url,
    Magnet,
}

/// Where to fetch a release from, with indexer secrets removed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DownloadLocator {
    pub uri: String,
    pub kind: LocatorKind,
    /// Query parameter the indexer API key goes back under at grab time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_param: Option<String>,
}

impl DownloadLocator {
    pub fn from_uri(uri: impl Into<String>) -> Self {
        let uri = uri.into();
        let kind = if uri.starts_with("magnet:") {
            LocatorKind::Magnet
        } else {
            LocatorKind::Url
        };
        Self {
            uri,
            kind,
            auth_param: None,
        }
    }

    pub fn magnet(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            kind: LocatorKind::Magnet,
            auth_param: None,
        }
    }

    /// URI with the indexer credential attached, ready for a download client.
    pub fn resolve(&self, api_key: Option<&str>) -> String {
        match (&self.auth_param, api_key, self.kind) {
            (Some(param), Some(key), LocatorKind::Url) => {
                let sep = if self.uri.contains('?') { '&' } else { '?' };
                format!("{}{}{}={}", self.uri, sep, param, urlencoding::encode(key))
            }
            _ => self.uri.clone(),
        }
    }
}

/// One entry exactly as an adapter produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRelease {
    pub guid: String,
    pub title: String,
    pub size: ReportedSize,
    pub age: ReportedAge,
    pub seeders: Option<u32>,
    pub leechers: Option<u32>,
    pub grabs: Option<u32>,
    pub categories: Vec<CategoryId>,
    pub download: DownloadLocator,
    pub details_url: Option<String>,
    pub info_hash: Option<String>,
}

impl RawRelease {
    pub fn new(guid: impl Into<String>, title: impl Into<String>, download: DownloadLocator) -> Self {
        Self {
            guid: guid.into(),
            title: title.into(),
            size: ReportedSize::Unknown,
            age: ReportedAge::Unknown,
            seeders: None,
            leechers: None,
            grabs: None,
            categories: Vec::new(),
            download,
            details_url: None,
            info_hash: None,
        }
    }
}

/// Identity of a release: "{indexer_id}:{guid}".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReleaseKey(pub String);

impl ReleaseKey {
    pub fn new(indexer_id: &str, guid: &str) -> Self {
        Self(format!("{}:{}", indexer_id, guid))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReleaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A normalized, deduplicated search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub key: ReleaseKey,
    pub protocol: Protocol,
    pub title: String,
    pub size_bytes: u64,
    /// Seconds since publication, relative to the start of the search.
    pub age_secs: Option<u64>,
    pub published_at: Option<DateTime<Utc>>,
    pub seeders: Option<u32>,
    pub leechers: Option<u32>,
    pub grabs: u32,
    pub categories: Vec<CategoryId>,
    pub download: DownloadLocator,
    pub details_url: Option<String>,
    pub info_hash: Option<String>,
    pub indexer_id: String,
    pub indexer_name: String,
    pub indexer_priority: i32,
}

/// Which timeout layer fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutScope {
    /// The per-indexer bound.
    Adapter,
    /// The whole-call deadline.
    Call,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Network,
    Auth,
    Parse,
    Timeout,
    RateLimited,
}

/// How one indexer query ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Ok,
    Timeout { scope: TimeoutScope },
    Unauthorized,
    RateLimited { retry_after_ms: Option<u64> },
    MalformedResponse,
    Network,
}

impl OutcomeStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, OutcomeStatus::Ok)
    }

    pub fn error_class(&self) -> Option<ErrorClass> {
        match self {
            OutcomeStatus::Ok => None,
            OutcomeStatus::Timeout { .. } => Some(ErrorClass::Timeout),
            OutcomeStatus::Unauthorized => Some(ErrorClass::Auth),
            OutcomeStatus::RateLimited { .. } => Some(ErrorClass::RateLimited),
            OutcomeStatus::MalformedResponse => Some(ErrorClass::Parse),
            OutcomeStatus::Network => Some(ErrorClass::Network),
        }
    }

    /// Short label used for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            OutcomeStatus::Ok => "ok",
            OutcomeStatus::Timeout {
                scope: TimeoutScope::Adapter,
            } => "timeout",
            OutcomeStatus::Timeout {
                scope: TimeoutScope::Call,
            } => "deadline",
            OutcomeStatus::Unauthorized => "unauthorized",
            OutcomeStatus::RateLimited { .. } => "rate_limited",
            OutcomeStatus::MalformedResponse => "malformed",
            OutcomeStatus::Network => "network",
        }
    }
}

/// Per-indexer record of a search call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexerOutcome {
    pub indexer_id: String,
    pub indexer_name: String,
    pub protocol: Protocol,
    pub status: OutcomeStatus,
    pub result_count: usize,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl IndexerOutcome {
    pub fn error_class(&self) -> Option<ErrorClass> {
        self.status.error_class()
    }
}

/// Result of one search call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub search_id: Uuid,
    pub query: String,
    /// Deduplicated and normalized, not filtered, in ranked order.
    pub releases: Vec<Release>,
    /// One entry per attempted indexer.
    pub indexer_outcomes: Vec<IndexerOutcome>,
    pub selection: Selection,
    /// The call deadline cut collection short.
    pub deadline_exceeded: bool,
    pub duration_ms: u64,
}

impl SearchOutcome {
    /// Terminal phase of the call that produced this outcome.
    pub fn phase(&self) -> SearchPhase {
        match self.selection {
            Selection::Selected { .. } => SearchPhase::Selected,
            Selection::Empty => SearchPhase::Empty,
        }
    }

    /// Every attempted indexer failed (distinct from "no results").
    pub fn all_indexers_failed(&self) -> bool {
        !self.indexer_outcomes.is_empty() && self.indexer_outcomes.iter().all(|o| !o.status.is_ok())
    }

    pub fn best(&self) -> Option<&Release> {
        self.selection.best()
    }
}

/// Lifecycle of a single search call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchPhase {
    Pending,
    FanningOut,
    Collecting,
    Normalizing,
    Filtering,
    Selected,
    Empty,
    Cancelled,
}

impl SearchPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SearchPhase::Selected | SearchPhase::Empty | SearchPhase::Cancelled
        )
    }

    pub fn can_transition_to(&self, next: SearchPhase) -> bool {
        use SearchPhase::*;
        matches!(
            (self, next),
            (Pending, FanningOut)
                | (FanningOut, Collecting)
                | (FanningOut, Cancelled)
                | (Collecting, Normalizing)
                | (Collecting, Cancelled)
                | (Normalizing, Filtering)
                | (Filtering, Selected)
                | (Filtering, Empty)
        )
    }
}

impl fmt::Display for SearchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SearchPhase::Pending => "pending",
            SearchPhase::FanningOut => "fanning_out",
            SearchPhase::Collecting => "collecting",
            SearchPhase::Normalizing => "normalizing",
            SearchPhase::Filtering => "filtering",
            SearchPhase::Selected => "selected",
            SearchPhase::Empty => "empty",
            SearchPhase::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Errors that abort a whole search call.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Search cancelled")]
    Cancelled,

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}
