use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::indexer::{IndexerKind, Privacy, Protocol};

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub indexers: Vec<IndexerConfig>,
    #[serde(default)]
    pub download_clients: DownloadClientsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("scout.db")
}

/// Search fan-out configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Upper bound for a single indexer query (default: 20)
    #[serde(default = "default_adapter_timeout")]
    pub adapter_timeout_secs: u64,
    /// Upper bound for the whole search call (default: 45)
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
    /// Indexers queried at once; the rest wait for a free slot (default: 8)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_indexers: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl SearchConfig {
    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_secs(self.adapter_timeout_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            adapter_timeout_secs: default_adapter_timeout(),
            call_timeout_secs: default_call_timeout(),
            max_concurrent_indexers: default_max_concurrent(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_adapter_timeout() -> u64 {
    20
}

fn default_call_timeout() -> u64 {
    45
}

fn default_max_concurrent() -> usize {
    8
}

fn default_user_agent() -> String {
    concat!("scout/", env!("CARGO_PKG_VERSION")).to_string()
}

/// One configured indexer backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexerConfig {
    pub id: String,
    /// Display name, defaults to the id
    #[serde(default)]
    pub name: Option<String>,
    pub kind: IndexerKind,
    /// Overrides the protocol implied by `kind`
    #[serde(default)]
    pub protocol: Option<Protocol>,
    #[serde(default)]
    pub privacy: Privacy,
    /// Lower wins during selection (default: 25)
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub base_url: String,
    #[serde(default)]
    pub mirrors: Vec<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Indexer name on the remote side (Jackett), defaults to "all"
    #[serde(default)]
    pub remote_id: Option<String>,
    #[serde(default)]
    pub rate_limit_rpm: Option<u32>,
    /// Indexer-local category code -> canonical category id
    #[serde(default)]
    pub categories: BTreeMap<String, u32>,
    /// Canonical categories this indexer serves (empty = any)
    #[serde(default)]
    pub supported_categories: Vec<u32>,
}

fn default_priority() -> i32 {
    25
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DownloadClientsConfig {
    #[serde(default)]
    pub qbittorrent: Option<QBittorrentConfig>,
    #[serde(default)]
    pub sabnzbd: Option<SabnzbdConfig>,
}

/// qBittorrent Web UI connection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QBittorrentConfig {
    /// Web UI URL (e.g., "http://localhost:8080")
    pub url: String,
    pub username: String,
    pub password: String,
    /// Category assigned to added torrents
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_client_timeout")]
    pub timeout_secs: u64,
}

/// SABnzbd API connection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SabnzbdConfig {
    pub url: String,
    pub api_key: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_client_timeout")]
    pub timeout_secs: u64,
}

fn default_client_timeout() -> u64 {
    30
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub search: SearchConfig,
    pub indexers: Vec<SanitizedIndexerConfig>,
    pub download_clients: SanitizedDownloadClients,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedIndexerConfig {
    pub id: String,
    pub kind: IndexerKind,
    pub priority: i32,
    pub enabled: bool,
    pub base_url: String,
    pub mirrors: Vec<String>,
    pub api_key_configured: bool,
    pub login_configured: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedDownloadClients {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qbittorrent: Option<SanitizedClientConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sabnzbd: Option<SanitizedClientConfig>,
}

/// Download client connection with credentials hidden
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedClientConfig {
    pub url: String,
    pub credentials_configured: bool,
    pub timeout_secs: u64,
}

impl From<&IndexerConfig> for SanitizedIndexerConfig {
    fn from(indexer: &IndexerConfig) -> Self {
        Self {
            id: indexer.id.clone(),
            kind: indexer.kind,
            priority: indexer.priority,
            enabled: indexer.enabled,
            base_url: indexer.base_url.clone(),
            mirrors: indexer.mirrors.clone(),
            api_key_configured: indexer.api_key.as_deref().is_some_and(|k| !k.is_empty()),
            login_configured: indexer.username.is_some() && indexer.password.is_some(),
        }
    }
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        let clients = &config.download_clients;
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            search: config.search.clone(),
            indexers: config.indexers.iter().map(Into::into).collect(),
            download_clients: SanitizedDownloadClients {
                qbittorrent: clients.qbittorrent.as_ref().map(|q| SanitizedClientConfig {
                    url: q.url.clone(),
                    credentials_configured: !q.username.is_empty() && !q.password.is_empty(),
                    timeout_secs: q.timeout_secs,
                }),
                sabnzbd: clients.sabnzbd.as_ref().map(|s| SanitizedClientConfig {
                    url: s.url.clone(),
                    credentials_configured: !s.api_key.is_empty(),
                    timeout_secs: s.timeout_secs,
                }),
            },
        }
    }
}
