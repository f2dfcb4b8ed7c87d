//! SABnzbd API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::types::{DownloadClient, DownloadClientError};
use crate::config::SabnzbdConfig;
use crate::indexer::Protocol;

const PROTOCOLS: &[Protocol] = &[Protocol::Nzb];

/// Queues NZB URLs with `mode=addurl`.
pub struct SabnzbdClient {
    client: Client,
    config: SabnzbdConfig,
}

#[derive(Debug, Deserialize)]
struct AddUrlResponse {
    #[serde(default)]
    status: bool,
    #[serde(default)]
    nzo_ids: Vec<String>,
    #[serde(default)]
    error: Option<String>,
}

impl SabnzbdClient {
    pub fn new(config: SabnzbdConfig) -> Result<Self, DownloadClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                DownloadClientError::ConnectionFailed(format!("Failed to create HTTP client: {}", e))
            })?;
        Ok(Self { client, config })
    }

    fn addurl_url(&self, nzb_url: &str) -> String {
        let mut url = format!(
            "{}/api?mode=addurl&output=json&apikey={}&name={}",
            self.config.url.trim_end_matches('/'),
            urlencoding::encode(&self.config.api_key),
            urlencoding::encode(nzb_url)
        );
        if let Some(category) = self.config.category.as_deref().filter(|c| !c.is_empty()) {
            url.push_str(&format!("&cat={}", urlencoding::encode(category)));
        }
        url
    }
}

fn parse_addurl(status: reqwest::StatusCode, body: &str) -> Result<Vec<String>, DownloadClientError> {
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(DownloadClientError::AuthenticationFailed(format!(
            "HTTP {}",
            status.as_u16()
        )));
    }
    if !status.is_success() {
        return Err(DownloadClientError::ApiError(format!("HTTP {}", status)));
    }

    let response: AddUrlResponse = serde_json::from_str(body)
        .map_err(|e| DownloadClientError::ApiError(format!("Invalid response: {}", e)))?;
    if response.status {
        return Ok(response.nzo_ids);
    }
    let error = response.error.unwrap_or_else(|| "unknown error".to_string());
    if error.to_lowercase().contains("api key") {
        Err(DownloadClientError::AuthenticationFailed(error))
    } else {
        Err(DownloadClientError::Rejected(error))
    }
}

#[async_trait]
impl DownloadClient for SabnzbdClient {
    fn name(&self) -> &str {
        "sabnzbd"
    }

    fn protocols(&self) -> &[Protocol] {
        PROTOCOLS
    }

    async fn grab(&self, uri: &str, protocol: Protocol) -> Result<(), DownloadClientError> {
        if protocol != Protocol::Nzb {
            return Err(DownloadClientError::Rejected(format!(
                "SABnzbd cannot download {} releases",
                protocol
            )));
        }

        let response = self.client.get(self.addurl_url(uri)).send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let ids = parse_addurl(status, &body)?;
        debug!(nzo_ids = ?ids, "SABnzbd accepted NZB");
        Ok(())
    }
}
