//! apibay-style JSON search API (The Pirate Bay and mirrors).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use tracing::debug;

use super::adapter::{base_url, fetch_text, AdapterError, IndexerAdapter};
use super::types::{DownloadLocator, RawRelease, ReportedAge, ReportedSize, SearchRequest};
use crate::indexer::IndexerDescriptor;

const TRACKERS: &[&str] = &[
    "udp://tracker.opentrackr.org:1337",
    "udp://open.stealth.si:80/announce",
    "udp://tracker.torrent.eu.org:451/announce",
    "udp://tracker.bittor.pw:1337/announce",
    "udp://public.popcorn-tracker.org:6969/announce",
    "udp://tracker.dler.org:6969/announce",
    "udp://exodus.desync.com:6969",
    "udp://open.demonii.com:1337/announce",
];

const DETAILS_BASE: &str = "https://thepiratebay.org/description.php?id=";

/// Queries `{base}/q.php` and builds magnet links from info hashes.
pub struct ApiBayAdapter {
    client: Client,
}

impl ApiBayAdapter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn build_search_url(indexer: &IndexerDescriptor, request: &SearchRequest) -> Result<String, AdapterError> {
        let cats = indexer.category_map.to_local(&request.categories);
        let cat = if cats.is_empty() {
            "0".to_string()
        } else {
            cats.join(",")
        };
        Ok(format!(
            "{}/q.php?q={}&cat={}",
            base_url(indexer)?,
            urlencoding::encode(&request.effective_query()),
            cat
        ))
    }
}

#[async_trait]
impl IndexerAdapter for ApiBayAdapter {
    async fn search(
        &self,
        indexer: &IndexerDescriptor,
        request: &SearchRequest,
        timeout: Duration,
    ) -> Result<Vec<RawRelease>, AdapterError> {
        let url = Self::build_search_url(indexer, request)?;
        debug!(indexer = %indexer.id, query = %request.effective_query(), "Querying apibay");

        let body = fetch_text(&self.client, &url, timeout).await?;
        let mut releases = parse_response(&body, indexer)?;
        if let Some(limit) = request.limit {
            releases.truncate(limit as usize);
        }
        Ok(releases)
    }
}

/// apibay encodes every number as a string.
#[derive(Debug, Deserialize)]
struct ApiBayEntry {
    #[serde(deserialize_with = "loose_string")]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    info_hash: String,
    #[serde(default, deserialize_with = "loose_u64")]
    size: u64,
    #[serde(default, deserialize_with = "loose_u64")]
    seeders: u64,
    #[serde(default, deserialize_with = "loose_u64")]
    leechers: u64,
    #[serde(default, deserialize_with = "loose_u64")]
    added: u64,
    #[serde(default, deserialize_with = "loose_string")]
    category: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Str(String),
    Num(u64),
}

fn loose_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Loose::deserialize(d)? {
        Loose::Str(s) => s,
        Loose::Num(n) => n.to_string(),
    })
}

fn loose_u64<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    Ok(match Loose::deserialize(d)? {
        Loose::Str(s) => s.trim().parse().unwrap_or(0),
        Loose::Num(n) => n,
    })
}

fn magnet_link(info_hash: &str, name: &str) -> String {
    let mut magnet = format!(
        "magnet:?xt=urn:btih:{}&dn={}",
        info_hash,
        urlencoding::encode(name)
    );
    for tracker in TRACKERS {
        magnet.push_str("&tr=");
        magnet.push_str(&urlencoding::encode(tracker));
    }
    magnet
}

fn to_count(n: u64) -> Option<u32> {
    Some(n.min(u32::MAX as u64) as u32)
}

fn parse_response(body: &str, indexer: &IndexerDescriptor) -> Result<Vec<RawRelease>, AdapterError> {
    let entries: Vec<serde_json::Value> = serde_json::from_str(body)
        .map_err(|e| AdapterError::malformed(format!("expected JSON array: {}", e)))?;

    let mut releases = Vec::with_capacity(entries.len());
    for value in entries {
        let entry: ApiBayEntry = match serde_json::from_value(value) {
            Ok(entry) => entry,
            Err(e) => {
                debug!(indexer = %indexer.id, error = %e, "Skipping unreadable apibay entry");
                continue;
            }
        };
        // A single entry with id "0" is the "no results" marker.
        if entry.id == "0" || entry.name.is_empty() || entry.info_hash.is_empty() {
            continue;
        }
        let info_hash = entry.info_hash.to_ascii_lowercase();

        let mut release = RawRelease::new(
            entry.id.clone(),
            entry.name.clone(),
            DownloadLocator::magnet(magnet_link(&info_hash, &entry.name)),
        );
        release.size = ReportedSize::Bytes(entry.size);
        release.age = ReportedAge::UnixSeconds(entry.added as i64);
        release.seeders = to_count(entry.seeders);
        release.leechers = to_count(entry.leechers);
        release.categories = indexer.category_map.resolve_all([entry.category.as_str()]);
        release.details_url = Some(format!("{}{}", DETAILS_BASE, entry.id));
        release.info_hash = Some(info_hash);
        releases.push(release);
    }
    Ok(releases)
}
