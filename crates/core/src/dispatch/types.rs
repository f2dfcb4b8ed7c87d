//! Types for handing releases to download clients.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::indexer::{Protocol, RegistryError};
use crate::searcher::ReleaseKey;

/// Errors reported by a download client.
#[derive(Debug, Error)]
pub enum DownloadClientError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rejected by client: {0}")]
    Rejected(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Request timeout")]
    Timeout,
}

impl From<reqwest::Error> for DownloadClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            DownloadClientError::Timeout
        } else if e.is_connect() {
            DownloadClientError::ConnectionFailed(e.to_string())
        } else {
            DownloadClientError::ApiError(e.to_string())
        }
    }
}

/// Errors from `Dispatcher::grab`.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Download client not found: {0}")]
    ClientNotFound(String),

    #[error("No download client handles {0} releases")]
    NoClientForProtocol(Protocol),

    #[error("Client '{client}' does not handle {protocol} releases")]
    ProtocolMismatch { client: String, protocol: Protocol },

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Client '{client}' failed: {source}")]
    Client {
        client: String,
        #[source]
        source: DownloadClientError,
    },
}

/// A client that accepts releases of one or more protocols.
#[async_trait]
pub trait DownloadClient: Send + Sync {
    /// Name used to pick this client explicitly.
    fn name(&self) -> &str;

    fn protocols(&self) -> &[Protocol];

    /// Queue `uri` (credentials already attached) for download.
    async fn grab(&self, uri: &str, protocol: Protocol) -> Result<(), DownloadClientError>;
}

/// Record of a release handed to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrabReceipt {
    pub grab_id: Uuid,
    pub client: String,
    pub release_key: ReleaseKey,
    pub title: String,
    pub protocol: Protocol,
    /// Resolution detected from the title.
    pub quality: String,
    pub indexer_id: String,
    pub grabbed_at: DateTime<Utc>,
}
