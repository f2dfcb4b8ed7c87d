use std::fmt;

use serde::{Deserialize, Serialize};

use super::categories::{CategoryId, CategoryMap};
use crate::config::IndexerConfig;

/// Transfer protocol a release is fetched with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    Torrent,
    Nzb,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Torrent => "torrent",
            Protocol::Nzb => "nzb",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Privacy {
    #[default]
    Public,
    SemiPrivate,
    Private,
}

/// Wire dialect spoken by an indexer. Each variant has exactly one adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexerKind {
    Torznab,
    Newznab,
    Jackett,
    #[serde(rename = "apibay")]
    ApiBay,
}

impl IndexerKind {
    pub fn default_protocol(&self) -> Protocol {
        match self {
            IndexerKind::Newznab => Protocol::Nzb,
            IndexerKind::Torznab | IndexerKind::Jackett | IndexerKind::ApiBay => Protocol::Torrent,
        }
    }

    /// Whether the backend already speaks the standard Newznab category ids.
    pub fn speaks_standard_categories(&self) -> bool {
        !matches!(self, IndexerKind::ApiBay)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IndexerKind::Torznab => "torznab",
            IndexerKind::Newznab => "newznab",
            IndexerKind::Jackett => "jackett",
            IndexerKind::ApiBay => "apibay",
        }
    }
}

impl fmt::Display for IndexerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Secrets used to talk to an indexer. Never copied into results.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Credentials {
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.is_empty())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("Credentials")
            .field("api_key", &redact(&self.api_key))
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .finish()
    }
}

/// A configured indexer backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexerDescriptor {
    pub id: String,
    pub name: String,
    pub kind: IndexerKind,
    pub protocol: Protocol,
    #[serde(default)]
    pub privacy: Privacy,
    /// Lower number = higher precedence during selection.
    pub priority: i32,
    pub enabled: bool,
    pub base_url: String,
    #[serde(default)]
    pub mirrors: Vec<String>,
    #[serde(default)]
    pub credentials: Credentials,
    #[serde(default)]
    pub category_map: CategoryMap,
    /// Canonical categories served; empty means unknown, treated as "any".
    #[serde(default)]
    pub supported_categories: Vec<CategoryId>,
    #[serde(default)]
    pub remote_id: Option<String>,
    #[serde(default)]
    pub rate_limit_rpm: Option<u32>,
}

impl IndexerDescriptor {
    pub fn new(id: impl Into<String>, kind: IndexerKind, base_url: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            kind,
            protocol: kind.default_protocol(),
            privacy: Privacy::Public,
            priority: 25,
            enabled: true,
            base_url: base_url.into(),
            mirrors: Vec::new(),
            credentials: Credentials::default(),
            category_map: CategoryMap::for_kind(kind),
            supported_categories: Vec::new(),
            remote_id: None,
            rate_limit_rpm: None,
        }
    }

    /// Base URL used for queries: the configured one, else the first mirror.
    pub fn effective_base_url(&self) -> Option<&str> {
        std::iter::once(self.base_url.as_str())
            .chain(self.mirrors.iter().map(String::as_str))
            .map(|u| u.trim_end_matches('/'))
            .find(|u| !u.is_empty())
    }

    /// Whether this indexer could serve any of `requested`.
    pub fn serves_any(&self, requested: &[CategoryId]) -> bool {
        if requested.is_empty() || self.supported_categories.is_empty() {
            return true;
        }
        requested.iter().any(|want| {
            self.supported_categories
                .iter()
                .any(|have| have == want || have.parent() == *want || want.parent() == *have)
        })
    }
}

impl From<&IndexerConfig> for IndexerDescriptor {
    fn from(config: &IndexerConfig) -> Self {
        let mut category_map = CategoryMap::for_kind(config.kind);
        for (local, canonical) in &config.categories {
            category_map.insert(local.clone(), CategoryId(*canonical));
        }

        Self {
            id: config.id.clone(),
            name: config.name.clone().unwrap_or_else(|| config.id.clone()),
            kind: config.kind,
            protocol: config.protocol.unwrap_or_else(|| config.kind.default_protocol()),
            privacy: config.privacy,
            priority: config.priority,
            enabled: config.enabled,
            base_url: config.base_url.clone(),
            mirrors: config.mirrors.clone(),
            credentials: Credentials {
                api_key: config.api_key.clone(),
                username: config.username.clone(),
                password: config.password.clone(),
            },
            category_map,
            supported_categories: config
                .supported_categories
                .iter()
                .copied()
                .map(CategoryId)
                .collect(),
            remote_id: config.remote_id.clone(),
            rate_limit_rpm: config.rate_limit_rpm,
        }
    }
}

/// Descriptor view without secrets, for listings.
#[derive(Debug, Clone, Serialize)]
pub struct IndexerSummary {
    pub id: String,
    pub name: String,
    pub kind: IndexerKind,
    pub protocol: Protocol,
    pub privacy: Privacy,
    pub priority: i32,
    pub enabled: bool,
    pub base_url: String,
    pub supported_categories: Vec<CategoryId>,
    pub api_key_configured: bool,
}

impl From<&IndexerDescriptor> for IndexerSummary {
    fn from(d: &IndexerDescriptor) -> Self {
        Self {
            id: d.id.clone(),
            name: d.name.clone(),
            kind: d.kind,
            protocol: d.protocol,
            privacy: d.privacy,
            priority: d.priority,
            enabled: d.enabled,
            base_url: d.base_url.clone(),
            supported_categories: d.supported_categories.clone(),
            api_key_configured: d.credentials.api_key().is_some(),
        }
    }
}
