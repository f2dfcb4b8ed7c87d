//! Deduplication of normalized releases by identity key.

use std::cmp::Ordering;
use std::collections::HashMap;

use super::types::{Release, ReleaseKey};

/// Collapse releases sharing an identity key into the richest record.
///
/// The output is sorted by key, so it does not depend on input order and
/// running it twice changes nothing.
pub fn deduplicate_releases(releases: Vec<Release>) -> Vec<Release> {
    let mut by_key: HashMap<ReleaseKey, Release> = HashMap::with_capacity(releases.len());

    for release in releases {
        match by_key.get_mut(&release.key) {
            Some(existing) => {
                if richness(&release, existing) == Ordering::Greater {
                    *existing = release;
                }
            }
            None => {
                by_key.insert(release.key.clone(), release);
            }
        }
    }

    let mut out: Vec<Release> = by_key.into_values().collect();
    out.sort_by(|a, b| a.key.cmp(&b.key));
    out
}

fn known_peer_fields(r: &Release) -> u8 {
    r.seeders.is_some() as u8 + r.leechers.is_some() as u8
}

/// Total order on records with the same key; `Greater` means `a` is richer.
fn richness(a: &Release, b: &Release) -> Ordering {
    known_peer_fields(a)
        .cmp(&known_peer_fields(b))
        .then_with(|| a.title.len().cmp(&b.title.len()))
        .then_with(|| b.indexer_priority.cmp(&a.indexer_priority))
        // Remaining fields only break ties deterministically.
        .then_with(|| a.title.cmp(&b.title))
        .then_with(|| a.download.cmp(&b.download))
        .then_with(|| a.size_bytes.cmp(&b.size_bytes))
        .then_with(|| a.grabs.cmp(&b.grabs))
        .then_with(|| a.seeders.cmp(&b.seeders))
        .then_with(|| a.leechers.cmp(&b.leechers))
        .then_with(|| a.published_at.cmp(&b.published_at))
        .then_with(|| a.categories.cmp(&b.categories))
        .then_with(|| a.details_url.cmp(&b.details_url))
        .then_with(|| a.info_hash.cmp(&b.info_hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[test]
    fn test_no_duplicates_passthrough() {
        let releases = vec![
            fixtures::release("b", "g1", "Two", 10),
            fixtures::release("a", "g1", "One", 5),
        ];
        let out = deduplicate_releases(releases);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].key.as_str(), "a:g1");
        assert_eq!(out[1].key.as_str(), "b:g1");
    }

    #[test]
    fn test_prefers_known_peer_counts() {
        let mut without = fixtures::release("a", "g1", "A much longer title here", 0);
        without.seeders = None;
        without.leechers = None;
        let with = fixtures::release("a", "g1", "Short", 3);

        let out = deduplicate_releases(vec![without, with.clone()]);
        assert_eq!(out, vec![with]);
    }

    #[test]
    fn test_prefers_longer_title_then_priority() {
        let short = fixtures::release("a", "g1", "Movie", 3);
        let long = fixtures::release("a", "g1", "Movie.2020.1080p", 3);
        let out = deduplicate_releases(vec![long.clone(), short]);
        assert_eq!(out[0].title, "Movie.2020.1080p");

        let mut low = fixtures::release("a", "g1", "Movie", 3);
        low.indexer_priority = 50;
        let mut high = fixtures::release("a", "g1", "Movie", 3);
        high.indexer_priority = 1;
        let out = deduplicate_releases(vec![high.clone(), low]);
        assert_eq!(out, vec![high]);
    }

    #[test]
    fn test_order_independent_and_idempotent() {
        let mut x = fixtures::release("a", "g1", "Movie", 3);
        x.size_bytes = 10;
        let mut y = fixtures::release("a", "g1", "Movie", 3);
        y.size_bytes = 20;
        let z = fixtures::release("c", "g9", "Other", 1);

        let forward = deduplicate_releases(vec![x.clone(), y.clone(), z.clone()]);
        let backward = deduplicate_releases(vec![z, y, x]);
        assert_eq!(forward, backward);
        assert_eq!(forward.len(), 2);

        let again = deduplicate_releases(forward.clone());
        assert_eq!(again, forward);
    }

    #[test]
    fn test_empty_input() {
        assert!(deduplicate_releases(Vec::new()).is_empty());
    }
}
