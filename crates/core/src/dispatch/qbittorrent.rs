//! qBittorrent Web API client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{multipart, Client, Response, StatusCode};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::types::{DownloadClient, DownloadClientError};
use crate::config::QBittorrentConfig;
use crate::indexer::Protocol;

const PROTOCOLS: &[Protocol] = &[Protocol::Torrent];

/// Adds torrents by URL or magnet through `/api/v2/torrents/add`.
pub struct QBittorrentClient {
    client: Client,
    config: QBittorrentConfig,
    /// Set after a successful login; the cookie itself lives in the jar.
    session: Arc<RwLock<Option<String>>>,
}

impl QBittorrentClient {
    pub fn new(config: QBittorrentConfig) -> Result<Self, DownloadClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .cookie_store(true)
            .build()
            .map_err(|e| {
                DownloadClientError::ConnectionFailed(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            config,
            session: Arc::new(RwLock::new(None)),
        })
    }

    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    async fn login(&self) -> Result<(), DownloadClientError> {
        let url = format!("{}/api/v2/auth/login", self.base_url());
        let params = [
            ("username", self.config.username.as_str()),
            ("password", self.config.password.as_str()),
        ];

        let response = self.client.post(&url).form(&params).send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        check_login(status, &body)?;
        debug!("qBittorrent login successful");
        *self.session.write().await = Some("authenticated".to_string());
        Ok(())
    }

    async fn ensure_authenticated(&self) -> Result<(), DownloadClientError> {
        if self.session.read().await.is_some() {
            return Ok(());
        }
        self.login().await
    }

    async fn post_add(&self, uri: &str) -> Result<Response, DownloadClientError> {
        let url = format!("{}/api/v2/torrents/add", self.base_url());
        let mut form = multipart::Form::new();
        for (name, value) in add_fields(uri, self.config.category.as_deref()) {
            form = form.text(name, value);
        }
        Ok(self.client.post(&url).multipart(form).send().await?)
    }

    async fn add_url(&self, uri: &str) -> Result<(), DownloadClientError> {
        self.ensure_authenticated().await?;

        let mut response = self.post_add(uri).await?;
        if response.status() == StatusCode::FORBIDDEN {
            warn!("qBittorrent session expired, re-authenticating");
            *self.session.write().await = None;
            self.login().await?;
            response = self.post_add(uri).await?;
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        check_add(status, &body)
    }
}

/// Form fields for `torrents/add`.
fn add_fields(uri: &str, category: Option<&str>) -> Vec<(&'static str, String)> {
    let mut fields = vec![("urls", uri.to_string())];
    if let Some(category) = category.filter(|c| !c.is_empty()) {
        fields.push(("category", category.to_string()));
    }
    fields
}

fn check_login(status: StatusCode, body: &str) -> Result<(), DownloadClientError> {
    if body.contains("Ok.") {
        Ok(())
    } else if body.contains("Fails.") || status == StatusCode::FORBIDDEN {
        Err(DownloadClientError::AuthenticationFailed(
            "Invalid credentials".to_string(),
        ))
    } else {
        Err(DownloadClientError::AuthenticationFailed(format!(
            "Unexpected response: {}",
            body.chars().take(100).collect::<String>()
        )))
    }
}

fn check_add(status: StatusCode, body: &str) -> Result<(), DownloadClientError> {
    match status {
        StatusCode::FORBIDDEN => Err(DownloadClientError::AuthenticationFailed(
            "session rejected after re-login".to_string(),
        )),
        StatusCode::UNSUPPORTED_MEDIA_TYPE => Err(DownloadClientError::Rejected(
            "torrent file is not valid".to_string(),
        )),
        s if !s.is_success() => Err(DownloadClientError::ApiError(format!("HTTP {}", s))),
        _ if body.trim() == "Fails." => Err(DownloadClientError::Rejected(
            "qBittorrent refused the torrent".to_string(),
        )),
        _ => Ok(()),
    }
}

#[async_trait]
impl DownloadClient for QBittorrentClient {
    fn name(&self) -> &str {
        "qbittorrent"
    }

    fn protocols(&self) -> &[Protocol] {
        PROTOCOLS
    }

    async fn grab(&self, uri: &str, protocol: Protocol) -> Result<(), DownloadClientError> {
        if protocol != Protocol::Torrent {
            return Err(DownloadClientError::Rejected(format!(
                "qBittorrent cannot download {} releases",
                protocol
            )));
        }
        self.add_url(uri).await
    }
}
