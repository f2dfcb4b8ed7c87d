//! Search entry point: snapshot, fan out, normalize, dedupe, select.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use super::adapter::AdapterSet;
use super::aggregator::Aggregator;
use super::dedup::deduplicate_releases;
use super::normalize::normalize_release;
use super::rate_limiter::RateLimiterPool;
use super::types::{EngineError, Release, SearchOutcome, SearchPhase, SearchRequest};
use crate::config::SearchConfig;
use crate::indexer::{IndexerDescriptor, IndexerStore};
use crate::metrics;
use crate::selection::{self, SelectError, Selection, SelectionPolicy};

/// Current phase of one call, with traced transitions.
struct PhaseTracker {
    search_id: Uuid,
    phase: SearchPhase,
}

impl PhaseTracker {
    fn new(search_id: Uuid) -> Self {
        Self {
            search_id,
            phase: SearchPhase::Pending,
        }
    }

    fn advance(&mut self, next: SearchPhase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "illegal search transition {} -> {}",
            self.phase,
            next
        );
        debug!(search_id = %self.search_id, from = %self.phase, to = %next, "Search phase");
        self.phase = next;
    }
}

/// Release discovery over the registered indexers.
pub struct ReleaseEngine {
    store: Arc<dyn IndexerStore>,
    aggregator: Aggregator,
}

impl ReleaseEngine {
    pub fn new(store: Arc<dyn IndexerStore>, adapters: AdapterSet, config: &SearchConfig) -> Self {
        Self {
            store,
            aggregator: Aggregator::new(adapters, config),
        }
    }

    pub fn store(&self) -> &Arc<dyn IndexerStore> {
        &self.store
    }

    pub fn rate_limits(&self) -> &RateLimiterPool {
        self.aggregator.rate_limiters()
    }

    pub async fn search(
        &self,
        request: &SearchRequest,
        policy: &SelectionPolicy,
    ) -> Result<SearchOutcome, EngineError> {
        self.search_with_cancel(request, policy, &CancellationToken::new())
            .await
    }

    /// Run a search that stops as soon as `cancel` fires.
    ///
    /// A cancelled call returns `EngineError::Cancelled` and no releases.
    pub async fn search_with_cancel(
        &self,
        request: &SearchRequest,
        policy: &SelectionPolicy,
        cancel: &CancellationToken,
    ) -> Result<SearchOutcome, EngineError> {
        let started = Instant::now();
        if let Err(e) = request.validate() {
            metrics::SEARCHES_TOTAL.with_label_values(&["invalid"]).inc();
            return Err(e);
        }

        let search_id = Uuid::new_v4();
        let query = request.effective_query();
        let mut phase = PhaseTracker::new(search_id);

        let targets = select_targets(self.store.list_enabled()?, request);
        debug!(
            search_id = %search_id,
            query = %query,
            targets = targets.len(),
            "Starting search"
        );
        phase.advance(SearchPhase::FanningOut);
        if cancel.is_cancelled() {
            return Err(cancelled(&mut phase, started));
        }

        // Ages are measured against the start of collection.
        let now = Utc::now();
        phase.advance(SearchPhase::Collecting);
        let aggregation = match self.aggregator.collect(&targets, request, cancel).await {
            Ok(aggregation) => aggregation,
            Err(EngineError::Cancelled) => return Err(cancelled(&mut phase, started)),
            Err(e) => return Err(e),
        };

        phase.advance(SearchPhase::Normalizing);
        let mut outcomes = Vec::with_capacity(aggregation.results.len());
        let mut releases = Vec::new();
        for (indexer, result) in targets.iter().zip(aggregation.results) {
            releases.extend(
                result
                    .releases
                    .into_iter()
                    .map(|raw| normalize_release(raw, indexer, now)),
            );
            outcomes.push(result.outcome);
        }
        let mut releases = deduplicate_releases(releases);
        selection::rank(&mut releases, &policy.tie_break);

        phase.advance(SearchPhase::Filtering);
        let selection = Selection::from(selection::evaluate(&releases, policy));
        let terminal = match selection {
            Selection::Selected { .. } => SearchPhase::Selected,
            Selection::Empty => SearchPhase::Empty,
        };
        phase.advance(terminal);

        let total = releases.len();
        let releases = paginate(releases, request.offset, request.limit);
        let elapsed = started.elapsed();
        record(terminal, elapsed.as_secs_f64());
        metrics::SEARCH_RESULTS.observe(total as f64);
        if aggregation.deadline_exceeded {
            metrics::SEARCH_DEADLINES.inc();
        }

        let failed = outcomes.iter().filter(|o| !o.status.is_ok()).count();
        info!(
            search_id = %search_id,
            query = %query,
            indexers = outcomes.len(),
            failed,
            releases = total,
            result = %terminal,
            deadline_exceeded = aggregation.deadline_exceeded,
            duration_ms = elapsed.as_millis() as u64,
            "Search completed"
        );

        Ok(SearchOutcome {
            search_id,
            query,
            releases,
            indexer_outcomes: outcomes,
            selection,
            deadline_exceeded: aggregation.deadline_exceeded,
            duration_ms: elapsed.as_millis() as u64,
        })
    }

    /// The best of already-collected releases under `policy`.
    pub fn select_best(
        &self,
        releases: &[Release],
        policy: &SelectionPolicy,
    ) -> Result<Release, SelectError> {
        selection::select_best(releases, policy)
    }
}

/// Enabled indexers that can answer `request`, in registry order.
pub fn select_targets(
    enabled: Vec<IndexerDescriptor>,
    request: &SearchRequest,
) -> Vec<IndexerDescriptor> {
    enabled
        .into_iter()
        .filter(|d| d.enabled)
        .filter(|d| {
            request
                .protocols
                .as_ref()
                .is_none_or(|p| p.contains(&d.protocol))
        })
        .filter(|d| {
            request
                .indexer_ids
                .as_ref()
                .is_none_or(|ids| ids.iter().any(|id| id == &d.id))
        })
        .filter(|d| d.serves_any(&request.categories))
        .collect()
}

fn paginate(releases: Vec<Release>, offset: u32, limit: Option<u32>) -> Vec<Release> {
    let take = limit.map_or(usize::MAX, |l| l as usize);
    releases
        .into_iter()
        .skip(offset as usize)
        .take(take)
        .collect()
}

fn cancelled(phase: &mut PhaseTracker, started: Instant) -> EngineError {
    phase.advance(SearchPhase::Cancelled);
    record(SearchPhase::Cancelled, started.elapsed().as_secs_f64());
    info!(search_id = %phase.search_id, "Search cancelled");
    EngineError::Cancelled
}

fn record(phase: SearchPhase, seconds: f64) {
    let label = phase.to_string();
    metrics::SEARCHES_TOTAL.with_label_values(&[&label]).inc();
    metrics::SEARCH_DURATION
        .with_label_values(&[&label])
        .observe(seconds);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::{CategoryId, IndexerKind, IndexerRegistry, Protocol};
    use crate::searcher::{OutcomeStatus, ReportedAge};
    use std::time::Duration;
    use crate::selection::QualityProfile;
    use crate::testing::{fixtures, MockAdapter, MockFailure};

    fn engine(descriptors: Vec<IndexerDescriptor>, mock: &Arc<MockAdapter>) -> ReleaseEngine {
        let store = Arc::new(IndexerRegistry::from_descriptors(descriptors).unwrap());
        let adapters = AdapterSet::new()
            .with(IndexerKind::Torznab, mock.clone())
            .with(IndexerKind::Newznab, mock.clone());
        ReleaseEngine::new(store, adapters, &SearchConfig::default())
    }

    #[test]
    fn test_select_targets_filters() {
        let mut nzb = fixtures::descriptor("nzb");
        nzb.kind = IndexerKind::Newznab;
        nzb.protocol = Protocol::Nzb;
        let mut tv_only = fixtures::descriptor("tv");
        tv_only.supported_categories = vec![CategoryId::TV];
        let mut disabled = fixtures::descriptor("off");
        disabled.enabled = false;
        let all = vec![fixtures::descriptor("a"), nzb, tv_only, disabled];

        let ids = |v: Vec<IndexerDescriptor>| v.into_iter().map(|d| d.id).collect::<Vec<_>>();

        let req = SearchRequest::new("x");
        assert_eq!(ids(select_targets(all.clone(), &req)), vec!["a", "nzb", "tv"]);

        let req = SearchRequest::new("x").with_protocols([Protocol::Torrent]);
        assert_eq!(ids(select_targets(all.clone(), &req)), vec!["a", "tv"]);

        let req = SearchRequest::new("x").with_categories([CategoryId::MOVIES_HD]);
        assert_eq!(ids(select_targets(all.clone(), &req)), vec!["a", "nzb"]);

        let req = SearchRequest::new("x").with_indexers(["tv", "off"]);
        assert_eq!(ids(select_targets(all, &req)), vec!["tv"]);
    }

    fn assert_send<T: Send>(_: T) {}

    #[test]
    fn test_search_future_is_send() {
        let mock = Arc::new(MockAdapter::new());
        let engine = engine(vec![fixtures::descriptor("a")], &mock);
        let request = SearchRequest::new("x");
        let policy = SelectionPolicy::default();
        let cancel = CancellationToken::new();
        assert_send(engine.search(&request, &policy));
        assert_send(engine.search_with_cancel(&request, &policy, &cancel));
    }

    #[tokio::test]
    async fn test_age_measured_from_collection_start() {
        let mock = Arc::new(MockAdapter::new());
        let published = Utc::now();
        let mut raw = fixtures::raw_release("1", "Movie.1080p");
        raw.age = ReportedAge::At(published);
        mock.set_delayed("slow", Duration::from_millis(1500), vec![raw])
            .await;

        let engine = engine(vec![fixtures::descriptor("slow")], &mock);
        let outcome = engine
            .search(&SearchRequest::new("movie"), &SelectionPolicy::default())
            .await
            .unwrap();

        // Published just before the call; the 1.5 s collection does not count.
        assert_eq!(outcome.releases[0].age_secs, Some(0));
    }

    #[tokio::test]
    async fn test_search_merges_and_selects() {
        let mock = Arc::new(MockAdapter::new());
        let mut a = fixtures::descriptor("a");
        a.priority = 10;
        let b = fixtures::descriptor("b");

        let mut low_seeds = fixtures::raw_release("1", "Movie.Name.2020.1080p.WEB-DL");
        low_seeds.seeders = Some(5);
        let mut high_seeds = fixtures::raw_release("1", "Movie.Name.2020.1080p.BluRay");
        high_seeds.seeders = Some(500);
        mock.set_releases("a", vec![low_seeds]).await;
        mock.set_releases("b", vec![high_seeds]).await;

        let engine = engine(vec![a, b], &mock);
        let outcome = engine
            .search(&SearchRequest::new("movie name"), &SelectionPolicy::default())
            .await
            .unwrap();

        assert_eq!(outcome.indexer_outcomes.len(), 2);
        assert_eq!(outcome.releases.len(), 2);
        assert_eq!(outcome.phase(), SearchPhase::Selected);
        assert_eq!(outcome.best().unwrap().key.as_str(), "a:1");
        assert_eq!(outcome.releases[0].key.as_str(), "a:1");
        assert_eq!(outcome.query, "movie name");
    }

    #[tokio::test]
    async fn test_empty_filter_still_returns_releases() {
        let mock = Arc::new(MockAdapter::new());
        mock.set_releases("a", vec![fixtures::raw_release("1", "Movie.DVDRip")])
            .await;
        let engine = engine(vec![fixtures::descriptor("a")], &mock);

        let policy = SelectionPolicy::with_quality(QualityProfile::Hd1080p);
        let outcome = engine
            .search(&SearchRequest::new("movie"), &policy)
            .await
            .unwrap();

        assert_eq!(outcome.selection, Selection::Empty);
        assert_eq!(outcome.phase(), SearchPhase::Empty);
        assert_eq!(outcome.releases.len(), 1);
        assert_eq!(outcome.indexer_outcomes.len(), 1);
        assert_eq!(
            engine.select_best(&outcome.releases, &policy),
            Err(SelectError::NoCandidates)
        );
    }

    #[tokio::test]
    async fn test_all_failed_distinct_from_no_results() {
        let mock = Arc::new(MockAdapter::new());
        mock.set_failure("a", MockFailure::Network).await;
        mock.set_failure("b", MockFailure::Unauthorized).await;
        let engine = engine(
            vec![fixtures::descriptor("a"), fixtures::descriptor("b")],
            &mock,
        );
        let outcome = engine
            .search(&SearchRequest::new("x"), &SelectionPolicy::default())
            .await
            .unwrap();
        assert!(outcome.all_indexers_failed());
        assert_eq!(outcome.indexer_outcomes[0].status, OutcomeStatus::Network);

        let mock = Arc::new(MockAdapter::new());
        let engine = self::engine(vec![fixtures::descriptor("a")], &mock);
        let outcome = engine
            .search(&SearchRequest::new("x"), &SelectionPolicy::default())
            .await
            .unwrap();
        assert!(!outcome.all_indexers_failed());
        assert!(outcome.releases.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_request() {
        let mock = Arc::new(MockAdapter::new());
        let engine = engine(vec![fixtures::descriptor("a")], &mock);
        let result = engine
            .search(&SearchRequest::new("  "), &SelectionPolicy::default())
            .await;
        assert!(matches!(result, Err(EngineError::InvalidRequest(_))));
        assert!(mock.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_fan_out() {
        let mock = Arc::new(MockAdapter::new());
        let engine = engine(vec![fixtures::descriptor("a")], &mock);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = engine
            .search_with_cancel(&SearchRequest::new("x"), &SelectionPolicy::default(), &cancel)
            .await;
        assert!(matches!(result, Err(EngineError::Cancelled)));
        assert!(mock.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_pagination_after_ranking() {
        let mock = Arc::new(MockAdapter::new());
        let raws = (0..5)
            .map(|i| {
                let mut r = fixtures::raw_release(&format!("g{}", i), "Movie.1080p");
                r.seeders = Some(i * 10);
                r
            })
            .collect();
        mock.set_releases("a", raws).await;
        let engine = engine(vec![fixtures::descriptor("a")], &mock);

        let request = SearchRequest {
            offset: 1,
            limit: Some(2),
            ..SearchRequest::new("movie")
        };
        let outcome = engine
            .search(&request, &SelectionPolicy::default())
            .await
            .unwrap();
        let keys: Vec<_> = outcome.releases.iter().map(|r| r.key.as_str()).collect();
        // Adapters were capped at 2 results, g0 and g1; offset skips the best.
        assert_eq!(keys, vec!["a:g0"]);
        assert_eq!(outcome.best().unwrap().key.as_str(), "a:g1");
    }
}
