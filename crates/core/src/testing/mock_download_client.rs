//! Mock download client for testing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::dispatch::{DownloadClient, DownloadClientError};
use crate::indexer::Protocol;

/// A recorded grab for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedGrab {
    pub uri: String,
    pub protocol: Protocol,
    pub timestamp: DateTime<Utc>,
}

/// Mock implementation of the DownloadClient trait.
///
/// Records every accepted grab; `set_next_error` makes the next call fail.
#[derive(Debug)]
pub struct MockDownloadClient {
    name: String,
    protocols: Vec<Protocol>,
    grabs: Arc<RwLock<Vec<RecordedGrab>>>,
    next_error: Arc<RwLock<Option<DownloadClientError>>>,
}

impl MockDownloadClient {
    pub fn new(name: impl Into<String>, protocols: &[Protocol]) -> Self {
        Self {
            name: name.into(),
            protocols: protocols.to_vec(),
            grabs: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn grabs(&self) -> Vec<RecordedGrab> {
        self.grabs.read().await.clone()
    }

    pub async fn set_next_error(&self, error: DownloadClientError) {
        *self.next_error.write().await = Some(error);
    }
}

#[async_trait]
impl DownloadClient for MockDownloadClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn protocols(&self) -> &[Protocol] {
        &self.protocols
    }

    async fn grab(&self, uri: &str, protocol: Protocol) -> Result<(), DownloadClientError> {
        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }
        self.grabs.write().await.push(RecordedGrab {
            uri: uri.to_string(),
            protocol,
            timestamp: Utc::now(),
        });
        Ok(())
    }
}
