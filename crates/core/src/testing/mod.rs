//! Testing utilities and mock implementations.
//!
//! Mocks stand in for indexer backends and download clients so the engine,
//! dispatcher and HTTP API can be exercised without network access.
//!
//! # Example
//!
//! ```rust,ignore
//! use scout_core::testing::{fixtures, MockAdapter};
//!
//! let adapter = Arc::new(MockAdapter::new());
//! adapter.set_releases("nyaa", vec![fixtures::raw_release("1", "Show.S01E01.1080p")]).await;
//! adapter.set_hang("dead").await;
//! ```

mod mock_adapter;
mod mock_download_client;

pub use mock_adapter::{MockAdapter, MockFailure, RecordedQuery};
pub use mock_download_client::{MockDownloadClient, RecordedGrab};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::indexer::{IndexerDescriptor, IndexerKind};
    use crate::searcher::{DownloadLocator, RawRelease, Release, ReleaseKey, ReportedSize};

    /// Enabled Torznab indexer at priority 25, named after its id.
    pub fn descriptor(id: &str) -> IndexerDescriptor {
        IndexerDescriptor::new(id, IndexerKind::Torznab, format!("http://{}.test/api", id))
    }

    fn magnet(guid: &str) -> DownloadLocator {
        DownloadLocator::magnet(format!("magnet:?xt=urn:btih:{}", guid))
    }

    /// Adapter entry with a magnet link and a 1 GB size.
    pub fn raw_release(guid: &str, title: &str) -> RawRelease {
        let mut raw = RawRelease::new(guid, title, magnet(guid));
        raw.size = ReportedSize::Bytes(1024 * 1024 * 1024);
        raw
    }

    /// Normalized torrent release from `indexer` with the given seeders.
    pub fn release(indexer: &str, guid: &str, title: &str, seeders: u32) -> Release {
        let descriptor = descriptor(indexer);
        Release {
            key: ReleaseKey::new(indexer, guid),
            protocol: descriptor.protocol,
            title: title.to_string(),
            size_bytes: 1024 * 1024 * 1024,
            age_secs: Some(3600),
            published_at: None,
            seeders: Some(seeders),
            leechers: Some(1),
            grabs: 0,
            categories: Vec::new(),
            download: magnet(guid),
            details_url: None,
            info_hash: None,
            indexer_id: descriptor.id,
            indexer_name: descriptor.name,
            indexer_priority: descriptor.priority,
        }
    }
}
