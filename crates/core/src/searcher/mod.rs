//! Release search across configured indexers.
//!
//! A search takes a snapshot of the enabled indexers, queries each through
//! the adapter for its kind (bounded concurrency, two timeout layers),
//! normalizes and deduplicates the entries, and hands them to the selector.

mod adapter;
mod aggregator;
mod apibay;
mod dedup;
mod engine;
mod feed;
mod jackett;
mod newznab;
mod normalize;
mod rate_limiter;
mod torznab;
mod types;

pub use adapter::{AdapterError, AdapterSet, IndexerAdapter};
pub use aggregator::{Aggregation, Aggregator, IndexerResult};
pub use apibay::ApiBayAdapter;
pub use dedup::deduplicate_releases;
pub use engine::{select_targets, ReleaseEngine};
pub use jackett::JackettAdapter;
pub use newznab::NewznabAdapter;
pub use normalize::{normalize_release, parse_date, parse_size};
pub use rate_limiter::{RateLimitStatus, RateLimiterPool, TokenBucket};
pub use torznab::TorznabAdapter;
pub use types::*;
