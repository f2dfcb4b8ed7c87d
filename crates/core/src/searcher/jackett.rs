//! Jackett JSON results API adapter.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::adapter::{base_url, check_status, AdapterError, IndexerAdapter};
use super::feed::locator_for;
use super::types::{RawRelease, ReportedAge, ReportedSize, SearchRequest};
use crate::indexer::IndexerDescriptor;

/// One descriptor per Jackett indexer; `remote_id` names it ("all" by default).
pub struct JackettAdapter {
    client: Client,
}

impl JackettAdapter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build the Jackett API URL for a search.
    fn build_search_url(
        indexer: &IndexerDescriptor,
        request: &SearchRequest,
    ) -> Result<String, AdapterError> {
        let remote = indexer.remote_id.as_deref().unwrap_or("all");
        let mut url = format!(
            "{}/api/v2.0/indexers/{}/results?apikey={}&Query={}",
            base_url(indexer)?,
            urlencoding::encode(remote),
            urlencoding::encode(indexer.credentials.api_key().unwrap_or_default()),
            urlencoding::encode(&request.effective_query())
        );

        for cat in indexer.category_map.to_local(&request.categories) {
            url.push_str(&format!("&Category[]={}", cat));
        }

        Ok(url)
    }
}

#[async_trait]
impl IndexerAdapter for JackettAdapter {
    async fn search(
        &self,
        indexer: &IndexerDescriptor,
        request: &SearchRequest,
        timeout: Duration,
    ) -> Result<Vec<RawRelease>, AdapterError> {
        let url = Self::build_search_url(indexer, request)?;
        debug!(indexer = %indexer.id, "Searching Jackett");

        let response = self.client.get(&url).timeout(timeout).send().await?;
        let body = check_status(response).await?.text().await?;

        let jackett_response: JackettResponse = serde_json::from_str(&body)
            .map_err(|e| AdapterError::malformed(format!("Failed to parse response: {}", e)))?;

        debug!(
            indexer = %indexer.id,
            results = jackett_response.Results.len(),
            "Jackett search complete"
        );

        let mut releases: Vec<RawRelease> = jackett_response
            .Results
            .into_iter()
            .filter_map(|r| r.into_raw(indexer))
            .collect();
        if let Some(limit) = request.limit {
            releases.truncate(limit as usize);
        }
        Ok(releases)
    }
}

/// Parse Jackett's date format.
fn parse_jackett_date(date_str: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(date_str)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(date_str, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|ndt| ndt.and_utc())
        })
}

// Jackett API response types
#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct JackettResponse {
    Results: Vec<JackettResult>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct JackettResult {
    Title: Option<String>,
    Guid: Option<String>,
    MagnetUri: Option<String>,
    Link: Option<String>,
    InfoHash: Option<String>,
    Size: Option<i64>,
    Seeders: Option<i64>,
    Peers: Option<i64>,
    Grabs: Option<i64>,
    #[serde(default)]
    Category: Vec<i64>,
    PublishDate: Option<String>,
    Details: Option<String>,
}

fn count(n: Option<i64>) -> Option<u32> {
    n.map(|v| v.clamp(0, u32::MAX as i64) as u32)
}

impl JackettResult {
    fn into_raw(self, indexer: &IndexerDescriptor) -> Option<RawRelease> {
        let title = self.Title.filter(|t| !t.is_empty())?;
        let link = self
            .Link
            .clone()
            .or_else(|| self.MagnetUri.clone())
            .filter(|l| !l.is_empty())?;
        let guid = self
            .Guid
            .or_else(|| self.InfoHash.clone())
            .unwrap_or_else(|| locator_for(&link).uri);

        let mut release = RawRelease::new(guid, title, locator_for(&link));
        release.size = match self.Size {
            Some(s) if s > 0 => ReportedSize::Bytes(s as u64),
            _ => ReportedSize::Unknown,
        };
        release.age = match self.PublishDate.as_deref().map(|d| (d, parse_jackett_date(d))) {
            Some((_, Some(at))) => ReportedAge::At(at),
            Some((text, None)) => ReportedAge::Text(text.to_string()),
            None => ReportedAge::Unknown,
        };
        release.seeders = count(self.Seeders);
        release.leechers = match (self.Peers, self.Seeders) {
            (Some(peers), seeders) => count(Some(peers.saturating_sub(seeders.unwrap_or(0)))),
            (None, _) => None,
        };
        release.grabs = count(self.Grabs);
        let codes: Vec<String> = self.Category.iter().map(|c| c.to_string()).collect();
        release.categories = indexer
            .category_map
            .resolve_all(codes.iter().map(String::as_str));
        release.details_url = self.Details;
        release.info_hash = self.InfoHash;
        Some(release)
    }
}
