//! Newznab (Usenet NZB) adapter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::adapter::{fetch_text, AdapterError, IndexerAdapter};
use super::feed::{parse_feed, search_url, Dialect};
use super::types::{RawRelease, ReportedSize, SearchRequest};
use crate::indexer::IndexerDescriptor;

/// Talks to Newznab indexers. Results carry grabs but no peer counts.
pub struct NewznabAdapter {
    client: Client,
}

impl NewznabAdapter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IndexerAdapter for NewznabAdapter {
    async fn search(
        &self,
        indexer: &IndexerDescriptor,
        request: &SearchRequest,
        timeout: Duration,
    ) -> Result<Vec<RawRelease>, AdapterError> {
        let url = search_url(indexer, request)?;
        debug!(indexer = %indexer.id, query = %request.effective_query(), "Querying Newznab API");

        let body = fetch_text(&self.client, &url, timeout).await?;
        parse_feed(&body, indexer, Dialect::Newznab).map(drop_empty_posts)
    }
}

/// Zero-byte posts are placeholders for removed NZBs.
fn drop_empty_posts(releases: Vec<RawRelease>) -> Vec<RawRelease> {
    releases
        .into_iter()
        .filter(|r| !matches!(r.size, ReportedSize::Bytes(0)))
        .collect()
}
