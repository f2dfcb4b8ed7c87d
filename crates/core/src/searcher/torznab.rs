//! Torznab (torrent RSS) adapter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::adapter::{fetch_text, AdapterError, IndexerAdapter};
use super::feed::{parse_feed, search_url, Dialect};
use super::types::{RawRelease, SearchRequest};
use crate::indexer::IndexerDescriptor;

/// Talks to Torznab endpoints (Prowlarr, Jackett's Torznab feeds, trackers).
pub struct TorznabAdapter {
    client: Client,
}

impl TorznabAdapter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IndexerAdapter for TorznabAdapter {
    async fn search(
        &self,
        indexer: &IndexerDescriptor,
        request: &SearchRequest,
        timeout: Duration,
    ) -> Result<Vec<RawRelease>, AdapterError> {
        let url = search_url(indexer, request)?;
        debug!(indexer = %indexer.id, query = %request.effective_query(), "Querying Torznab feed");

        let body = fetch_text(&self.client, &url, timeout).await?;
        parse_feed(&body, indexer, Dialect::Torznab)
    }
}
