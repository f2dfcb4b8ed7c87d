//! Streaming reader for Torznab/Newznab RSS responses.

use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;
use url::Url;

use super::adapter::{base_url, AdapterError};
use super::types::{DownloadLocator, RawRelease, ReportedAge, ReportedSize, SearchRequest};
use crate::indexer::IndexerDescriptor;

/// Query parameter names that carry indexer secrets in links.
const SECRET_PARAMS: &[&str] = &["apikey", "api_key", "jackett_apikey", "passkey"];

/// Attribute namespace used by the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dialect {
    Torznab,
    Newznab,
}

impl Dialect {
    fn attr_tag(&self) -> &'static str {
        match self {
            Dialect::Torznab => "torznab:attr",
            Dialect::Newznab => "newznab:attr",
        }
    }
}

/// `{base}/api?t=search&q=...` for a Torznab/Newznab endpoint.
pub(crate) fn search_url(
    indexer: &IndexerDescriptor,
    request: &SearchRequest,
) -> Result<String, AdapterError> {
    let base = base_url(indexer)?;
    let mut url = if base.ends_with("/api") {
        base.to_string()
    } else {
        format!("{}/api", base)
    };
    url.push_str("?t=search&extended=1&q=");
    url.push_str(&urlencoding::encode(&request.effective_query()));

    let cats = indexer.category_map.to_local(&request.categories);
    if !cats.is_empty() {
        url.push_str("&cat=");
        url.push_str(&cats.join(","));
    }
    if let Some(limit) = request.limit {
        url.push_str(&format!("&limit={}", limit));
    }
    if let Some(key) = indexer.credentials.api_key() {
        url.push_str("&apikey=");
        url.push_str(&urlencoding::encode(key));
    }
    Ok(url)
}

/// Remove secret query parameters from a link.
///
/// Returns the cleaned link and the name of the removed parameter.
pub(crate) fn scrub_link(link: &str) -> (String, Option<String>) {
    let Ok(mut url) = Url::parse(link) else {
        return (link.to_string(), None);
    };
    if url.scheme() == "magnet" {
        return (link.to_string(), None);
    }

    let mut removed = None;
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| {
            let secret = SECRET_PARAMS.iter().any(|s| k.eq_ignore_ascii_case(s));
            if secret && removed.is_none() {
                removed = Some(k.to_string());
            }
            !secret
        })
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if removed.is_none() {
        return (link.to_string(), None);
    }
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    (url.to_string(), removed)
}

/// Locator for a feed link with secrets removed.
pub(crate) fn locator_for(link: &str) -> DownloadLocator {
    let (uri, auth_param) = scrub_link(link);
    let mut locator = DownloadLocator::from_uri(uri);
    locator.auth_param = auth_param;
    locator
}

#[derive(Debug, Default)]
struct ItemBuilder {
    title: Option<String>,
    guid: Option<String>,
    link: Option<String>,
    enclosure: Option<String>,
    comments: Option<String>,
    pub_date: Option<String>,
    size: Option<u64>,
    size_text: Option<String>,
    categories: Vec<String>,
    seeders: Option<u32>,
    peers: Option<u32>,
    leechers: Option<u32>,
    grabs: Option<u32>,
    info_hash: Option<String>,
    magnet: Option<String>,
}

impl ItemBuilder {
    fn set_field(&mut self, tag: &str, text: String) {
        match tag {
            "title" => self.title = Some(text),
            "guid" => self.guid = Some(text),
            "link" => self.link = Some(text),
            "comments" => self.comments = Some(text),
            "pubDate" => self.pub_date = Some(text),
            "size" => self.size_text = Some(text),
            "category" => self.categories.push(text),
            _ => {}
        }
    }

    fn set_attr(&mut self, name: &str, value: &str) {
        let number = || value.trim().parse::<u64>().ok();
        let count = || number().map(|n| n.min(u32::MAX as u64) as u32);
        match name {
            "seeders" => self.seeders = count(),
            "peers" => self.peers = count(),
            "leechers" => self.leechers = count(),
            "grabs" => self.grabs = count(),
            "size" => self.size = self.size.or_else(number),
            "infohash" => self.info_hash = Some(value.to_string()),
            "magneturl" => self.magnet = Some(value.to_string()),
            "category" => self.categories.push(value.to_string()),
            "publishdate" | "usenetdate" => {
                if self.pub_date.is_none() {
                    self.pub_date = Some(value.to_string());
                }
            }
            _ => {}
        }
    }

    fn set_enclosure(&mut self, e: &BytesStart) {
        for attr in e.attributes().flatten() {
            let value = attr_value(&attr);
            match attr.key.as_ref() {
                b"url" => self.enclosure = Some(value),
                b"length" => {
                    if let Ok(len) = value.parse::<u64>() {
                        if len > 0 {
                            self.size = Some(len);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn build(self, indexer: &IndexerDescriptor, dialect: Dialect) -> Option<RawRelease> {
        let title = self.title.filter(|t| !t.trim().is_empty())?;
        let link = self
            .enclosure
            .or(self.link)
            .or(self.magnet)
            .filter(|l| !l.trim().is_empty())?;
        let guid = self
            .guid
            .filter(|g| !g.trim().is_empty())
            .or_else(|| self.info_hash.clone())
            .unwrap_or_else(|| scrub_link(&link).0);

        let mut release = RawRelease::new(guid, title, locator_for(&link));
        release.size = match (self.size, self.size_text) {
            (Some(bytes), _) => ReportedSize::Bytes(bytes),
            (None, Some(text)) => ReportedSize::Text(text),
            (None, None) => ReportedSize::Unknown,
        };
        release.age = self
            .pub_date
            .map(ReportedAge::Text)
            .unwrap_or(ReportedAge::Unknown);
        release.grabs = self.grabs;
        release.categories = indexer
            .category_map
            .resolve_all(self.categories.iter().map(String::as_str));
        release.details_url = self.comments;
        release.info_hash = self.info_hash;

        if dialect == Dialect::Torznab {
            release.seeders = self.seeders;
            // Torznab "peers" counts seeders too.
            release.leechers = self
                .leechers
                .or_else(|| Some(self.peers?.saturating_sub(self.seeders.unwrap_or(0))));
        }
        Some(release)
    }
}

/// Map a Newznab `<error code=".." description=".."/>` body.
fn feed_error(e: &BytesStart) -> AdapterError {
    let mut code = 0u16;
    let mut description = String::new();
    for attr in e.attributes().flatten() {
        let value = attr_value(&attr);
        match attr.key.as_ref() {
            b"code" => code = value.parse().unwrap_or(0),
            b"description" => description = value,
            _ => {}
        }
    }
    match code {
        100..=102 => AdapterError::Unauthorized(description),
        429 | 500 | 501 => AdapterError::RateLimited { retry_after: None },
        _ => AdapterError::Http {
            status: code,
            body: description,
        },
    }
}

fn attr_value(attr: &Attribute) -> String {
    attr.unescape_value()
        .map(|v| v.into_owned())
        .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned())
}

fn tag_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.name().as_ref()).to_string()
}

/// Parse a feed body. On malformed XML the items read so far are kept.
pub(crate) fn parse_feed(
    body: &str,
    indexer: &IndexerDescriptor,
    dialect: Dialect,
) -> Result<Vec<RawRelease>, AdapterError> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut releases = Vec::new();
    let mut item: Option<ItemBuilder> = None;
    let mut text = String::new();
    let mut depth = 0usize;
    let mut root_seen = false;

    let malformed = |reason: String, releases: Vec<RawRelease>| AdapterError::MalformedResponse {
        reason,
        partial: releases,
    };

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => {
                debug!(indexer = %indexer.id, error = %e, parsed = releases.len(), "Feed parse error");
                return Err(malformed(format!("XML error: {}", e), releases));
            }
        };

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                let name = tag_name(e);

                if !root_seen {
                    root_seen = true;
                    match name.as_str() {
                        "rss" => {}
                        "error" => return Err(feed_error(e)),
                        other => {
                            return Err(malformed(
                                format!("unexpected root element <{}>", other),
                                releases,
                            ))
                        }
                    }
                }
                if !is_empty {
                    depth += 1;
                }
                text.clear();

                if name == "item" && !is_empty {
                    item = Some(ItemBuilder::default());
                } else if let Some(current) = item.as_mut() {
                    if name == dialect.attr_tag() {
                        let mut attr_name = String::new();
                        let mut value_text = String::new();
                        for attr in e.attributes().flatten() {
                            let value = attr_value(&attr);
                            match attr.key.as_ref() {
                                b"name" => attr_name = value,
                                b"value" => value_text = value,
                                _ => {}
                            }
                        }
                        current.set_attr(&attr_name, &value_text);
                    } else if name == "enclosure" {
                        current.set_enclosure(e);
                    }
                }
            }
            Event::Text(e) => {
                let chunk = e
                    .unescape()
                    .map_err(|err| malformed(format!("bad text: {}", err), std::mem::take(&mut releases)))?;
                text.push_str(&chunk);
            }
            Event::CData(e) => {
                text.push_str(&String::from_utf8_lossy(&e.into_inner()));
            }
            Event::End(ref e) => {
                depth = depth.saturating_sub(1);
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name == "item" {
                    if let Some(done) = item.take() {
                        match done.build(indexer, dialect) {
                            Some(release) => releases.push(release),
                            None => debug!(indexer = %indexer.id, "Skipping feed item without title or link"),
                        }
                    }
                } else if let Some(current) = item.as_mut() {
                    let value = text.trim();
                    if !value.is_empty() {
                        current.set_field(&name, value.to_string());
                    }
                }
                text.clear();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !root_seen {
        return Err(malformed("empty response".to_string(), releases));
    }
    if depth > 0 || item.is_some() {
        return Err(malformed("truncated feed".to_string(), releases));
    }
    Ok(releases)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::{CategoryId, IndexerKind};

    fn torznab() -> IndexerDescriptor {
        let mut d = IndexerDescriptor::new("prowl", IndexerKind::Torznab, "http://localhost:9696/1/");
        d.credentials.api_key = Some("s3cret".into());
        d
    }

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:torznab="http://torznab.com/schemas/2015/feed">
  <channel>
    <title>Prowlarr</title>
    <item>
      <title>Movie.Name.2020.1080p.WEB-DL</title>
      <guid>https://tracker.example/t/1</guid>
      <comments>https://tracker.example/t/1</comments>
      <pubDate>Sat, 18 Jan 2025 14:30:00 +0000</pubDate>
      <enclosure url="http://localhost:9696/1/download?apikey=s3cret&amp;link=abc" length="2147483648" type="application/x-bittorrent"/>
      <category>2040</category>
      <torznab:attr name="seeders" value="42"/>
      <torznab:attr name="peers" value="50"/>
      <torznab:attr name="infohash" value="ABCDEF0123"/>
      <torznab:attr name="category" value="100001"/>
    </item>
    <item>
      <title><![CDATA[Movie & Friends 2020 720p]]></title>
      <link>magnet:?xt=urn:btih:ffff</link>
      <size>700 MB</size>
      <torznab:attr name="grabs" value="7"/>
    </item>
    <item>
      <guid>no-title</guid>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_search_url() {
        let req = SearchRequest::new("dune 2021").with_categories([CategoryId::MOVIES]);
        let url = search_url(&torznab(), &req).unwrap();
        assert_eq!(
            url,
            "http://localhost:9696/1/api?t=search&extended=1&q=dune%202021&cat=2000&apikey=s3cret"
        );
    }

    #[test]
    fn test_search_url_base_already_api() {
        let d = IndexerDescriptor::new("n", IndexerKind::Newznab, "https://api.example.org/api");
        let mut req = SearchRequest::new("x");
        req.limit = Some(50);
        assert_eq!(
            search_url(&d, &req).unwrap(),
            "https://api.example.org/api?t=search&extended=1&q=x&limit=50"
        );
    }

    #[test]
    fn test_scrub_link() {
        let (clean, param) = scrub_link("http://h/dl?apikey=k&id=9");
        assert_eq!(clean, "http://h/dl?id=9");
        assert_eq!(param.as_deref(), Some("apikey"));

        let (clean, param) = scrub_link("http://h/dl?id=9");
        assert_eq!(clean, "http://h/dl?id=9");
        assert!(param.is_none());

        let (clean, _) = scrub_link("http://h/dl?apikey=k");
        assert_eq!(clean, "http://h/dl");

        let magnet = "magnet:?xt=urn:btih:abc&tr=udp://x";
        assert_eq!(scrub_link(magnet).0, magnet);
    }

    #[test]
    fn test_parse_torznab_items() {
        let releases = parse_feed(FEED, &torznab(), Dialect::Torznab).unwrap();
        assert_eq!(releases.len(), 2);

        let first = &releases[0];
        assert_eq!(first.title, "Movie.Name.2020.1080p.WEB-DL");
        assert_eq!(first.guid, "https://tracker.example/t/1");
        assert_eq!(first.size, ReportedSize::Bytes(2_147_483_648));
        assert_eq!(first.seeders, Some(42));
        assert_eq!(first.leechers, Some(8));
        assert_eq!(first.categories, vec![CategoryId::MOVIES_HD]);
        assert_eq!(first.info_hash.as_deref(), Some("ABCDEF0123"));
        assert_eq!(
            first.age,
            ReportedAge::Text("Sat, 18 Jan 2025 14:30:00 +0000".into())
        );
        assert!(!first.download.uri.contains("s3cret"));
        assert_eq!(first.download.auth_param.as_deref(), Some("apikey"));

        let second = &releases[1];
        assert_eq!(second.title, "Movie & Friends 2020 720p");
        assert_eq!(second.size, ReportedSize::Text("700 MB".into()));
        assert_eq!(second.grabs, Some(7));
        assert_eq!(second.seeders, None);
        assert_eq!(second.categories, vec![CategoryId::UNKNOWN]);
        assert_eq!(second.guid, "magnet:?xt=urn:btih:ffff");
    }

    #[test]
    fn test_newznab_ignores_peer_counts() {
        let feed = r#"<rss><channel><item>
            <title>Show.S01E01.720p</title>
            <guid>nzb-1</guid>
            <link>https://nzb.example/getnzb/1.nzb?apikey=k</link>
            <newznab:attr name="size" value="1000"/>
            <newznab:attr name="grabs" value="12"/>
            <newznab:attr name="seeders" value="12"/>
            <newznab:attr name="category" value="5040"/>
            <newznab:attr name="usenetdate" value="Sat, 18 Jan 2025 14:30:00 +0000"/>
        </item></channel></rss>"#;
        let d = IndexerDescriptor::new("geek", IndexerKind::Newznab, "https://nzb.example");
        let releases = parse_feed(feed, &d, Dialect::Newznab).unwrap();
        assert_eq!(releases.len(), 1);
        let r = &releases[0];
        assert_eq!(r.seeders, None);
        assert_eq!(r.leechers, None);
        assert_eq!(r.grabs, Some(12));
        assert_eq!(r.size, ReportedSize::Bytes(1000));
        assert_eq!(r.categories, vec![CategoryId::TV_HD]);
        assert_eq!(r.download.uri, "https://nzb.example/getnzb/1.nzb");
    }

    #[test]
    fn test_error_body_mapping() {
        let d = torznab();
        let auth = r#"<?xml version="1.0"?><error code="100" description="Incorrect user credentials"/>"#;
        assert!(matches!(
            parse_feed(auth, &d, Dialect::Torznab),
            Err(AdapterError::Unauthorized(_))
        ));

        let limit = r#"<error code="500" description="Request limit reached"/>"#;
        assert!(matches!(
            parse_feed(limit, &d, Dialect::Torznab),
            Err(AdapterError::RateLimited { .. })
        ));

        let other = r#"<error code="300" description="No such function"/>"#;
        assert!(matches!(
            parse_feed(other, &d, Dialect::Torznab),
            Err(AdapterError::Http { status: 300, .. })
        ));
    }

    #[test]
    fn test_truncated_feed_keeps_parsed_items() {
        let body = r#"<rss><channel>
            <item><title>First</title><guid>1</guid><link>http://x/1</link></item>
            <item><title>Second</title><guid>2</gu"#;
        match parse_feed(body, &torznab(), Dialect::Torznab) {
            Err(AdapterError::MalformedResponse { partial, .. }) => {
                assert_eq!(partial.len(), 1);
                assert_eq!(partial[0].title, "First");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_html_and_empty_bodies_are_malformed() {
        assert!(matches!(
            parse_feed("<html><body>oops</body></html>", &torznab(), Dialect::Torznab),
            Err(AdapterError::MalformedResponse { .. })
        ));
        assert!(matches!(
            parse_feed("", &torznab(), Dialect::Torznab),
            Err(AdapterError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_empty_channel_is_ok() {
        let body = r#"<rss><channel><title>none</title></channel></rss>"#;
        assert!(parse_feed(body, &torznab(), Dialect::Torznab).unwrap().is_empty());
    }
}
