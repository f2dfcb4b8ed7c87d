//! Bounded concurrent fan-out over the selected indexers.

use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::adapter::{AdapterError, AdapterSet};
use super::rate_limiter::RateLimiterPool;
use super::types::{
    EngineError, IndexerOutcome, OutcomeStatus, RawRelease, SearchRequest, TimeoutScope,
};
use crate::config::SearchConfig;
use crate::indexer::IndexerDescriptor;
use crate::metrics;

/// What one indexer contributed to a call.
#[derive(Debug, Clone)]
pub struct IndexerResult {
    pub outcome: IndexerOutcome,
    pub releases: Vec<RawRelease>,
}

/// Collected results, one entry per target in target order.
#[derive(Debug, Clone)]
pub struct Aggregation {
    pub results: Vec<IndexerResult>,
    pub deadline_exceeded: bool,
}

impl Aggregation {
    pub fn outcomes(&self) -> impl Iterator<Item = &IndexerOutcome> {
        self.results.iter().map(|r| &r.outcome)
    }
}

struct Finished {
    index: usize,
    result: IndexerResult,
}

/// Issues one query per indexer through a worker pool of fixed width.
#[derive(Debug)]
pub struct Aggregator {
    adapters: AdapterSet,
    rate_limiters: RateLimiterPool,
    adapter_timeout: Duration,
    call_timeout: Duration,
    max_concurrent: usize,
}

impl Aggregator {
    pub fn new(adapters: AdapterSet, config: &SearchConfig) -> Self {
        Self {
            adapters,
            rate_limiters: RateLimiterPool::new(),
            adapter_timeout: config.adapter_timeout(),
            call_timeout: config.call_timeout(),
            max_concurrent: config.max_concurrent_indexers.max(1),
        }
    }

    pub fn rate_limiters(&self) -> &RateLimiterPool {
        &self.rate_limiters
    }

    /// Query every target and wait for all of them or the call deadline.
    ///
    /// Indexer failures become outcomes. The only error is cancellation,
    /// which drops every in-flight query.
    pub async fn collect(
        &self,
        targets: &[IndexerDescriptor],
        request: &SearchRequest,
        cancel: &CancellationToken,
    ) -> Result<Aggregation, EngineError> {
        let adapter_timeout = request
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.adapter_timeout);
        let call_timeout = request
            .deadline_ms
            .map(Duration::from_millis)
            .unwrap_or(self.call_timeout);

        let started = Instant::now();
        let deadline = started + call_timeout;
        let mut slots: Vec<Option<IndexerResult>> = vec![None; targets.len()];
        let mut deadline_exceeded = false;

        // Must stay a collected Vec: a borrowing `map` closure makes the call non-Send.
        let pending: Vec<_> = targets
            .iter()
            .enumerate()
            .map(|(index, indexer)| self.query_one(index, indexer, request, adapter_timeout))
            .collect();
        let queries = stream::iter(pending).buffer_unordered(self.max_concurrent);
        tokio::pin!(queries);

        let sleep = tokio::time::sleep_until(deadline);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(targets = targets.len(), "Search cancelled during collection");
                    return Err(EngineError::Cancelled);
                }
                _ = &mut sleep => {
                    deadline_exceeded = true;
                    break;
                }
                next = queries.next() => match next {
                    Some(finished) => slots[finished.index] = Some(finished.result),
                    None => break,
                },
            }
        }

        let waited = started.elapsed();
        let results = targets
            .iter()
            .zip(slots)
            .map(|(indexer, slot)| slot.unwrap_or_else(|| deadline_result(indexer, waited)))
            .collect();

        Ok(Aggregation {
            results,
            deadline_exceeded,
        })
    }

    async fn query_one(
        &self,
        index: usize,
        indexer: &IndexerDescriptor,
        request: &SearchRequest,
        timeout: Duration,
    ) -> Finished {
        let started = Instant::now();
        let result = self.run_query(indexer, request, timeout).await;
        let elapsed = started.elapsed();

        let (status, mut releases, message) = match result {
            Ok(releases) => (OutcomeStatus::Ok, releases, None),
            Err(e) => {
                let message = e.to_string();
                let (status, partial) = e.into_outcome();
                warn!(
                    indexer = %indexer.id,
                    status = status.label(),
                    error = %message,
                    "Indexer query failed"
                );
                (status, partial, Some(message))
            }
        };
        if let Some(limit) = request.limit {
            releases.truncate(limit as usize);
        }

        metrics::INDEXER_QUERIES
            .with_label_values(&[indexer.id.as_str(), status.label()])
            .inc();
        metrics::INDEXER_QUERY_DURATION
            .with_label_values(&[indexer.id.as_str()])
            .observe(elapsed.as_secs_f64());
        debug!(
            indexer = %indexer.id,
            status = status.label(),
            results = releases.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Indexer query finished"
        );

        Finished {
            index,
            result: IndexerResult {
                outcome: outcome(indexer, status, releases.len(), elapsed, message),
                releases,
            },
        }
    }

    async fn run_query(
        &self,
        indexer: &IndexerDescriptor,
        request: &SearchRequest,
        timeout: Duration,
    ) -> Result<Vec<RawRelease>, AdapterError> {
        if let Err(wait) = self.rate_limiters.try_acquire(indexer).await {
            return Err(AdapterError::RateLimited {
                retry_after: Some(wait),
            });
        }
        let adapter = self.adapters.get(indexer.kind).ok_or_else(|| {
            AdapterError::Network(format!("no adapter for kind '{}'", indexer.kind.as_str()))
        })?;

        match tokio::time::timeout(timeout, adapter.search(indexer, request, timeout)).await {
            Ok(result) => result,
            Err(_) => Err(AdapterError::Timeout),
        }
    }
}

fn outcome(
    indexer: &IndexerDescriptor,
    status: OutcomeStatus,
    result_count: usize,
    elapsed: Duration,
    message: Option<String>,
) -> IndexerOutcome {
    IndexerOutcome {
        indexer_id: indexer.id.clone(),
        indexer_name: indexer.name.clone(),
        protocol: indexer.protocol,
        status,
        result_count,
        elapsed_ms: elapsed.as_millis() as u64,
        message,
    }
}

/// Outcome for an indexer still queued or in flight at the deadline.
fn deadline_result(indexer: &IndexerDescriptor, waited: Duration) -> IndexerResult {
    let status = OutcomeStatus::Timeout {
        scope: TimeoutScope::Call,
    };
    metrics::INDEXER_QUERIES
        .with_label_values(&[indexer.id.as_str(), status.label()])
        .inc();
    warn!(indexer = %indexer.id, "Indexer did not answer before the call deadline");
    IndexerResult {
        outcome: outcome(
            indexer,
            status,
            0,
            waited,
            Some("call deadline elapsed".to_string()),
        ),
        releases: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::indexer::IndexerKind;
    use crate::testing::{fixtures, MockAdapter, MockFailure};

    fn config(max_concurrent: usize) -> SearchConfig {
        SearchConfig {
            adapter_timeout_secs: 20,
            call_timeout_secs: 45,
            max_concurrent_indexers: max_concurrent,
            ..Default::default()
        }
    }

    fn aggregator(mock: &Arc<MockAdapter>, max_concurrent: usize) -> Aggregator {
        let adapters = AdapterSet::new().with(IndexerKind::Torznab, mock.clone());
        Aggregator::new(adapters, &config(max_concurrent))
    }

    fn targets(n: usize) -> Vec<IndexerDescriptor> {
        (0..n).map(|i| fixtures::descriptor(&format!("idx{}", i))).collect()
    }

    #[tokio::test]
    async fn test_one_outcome_per_target_in_order() {
        let mock = Arc::new(MockAdapter::new());
        mock.set_releases("idx0", vec![fixtures::raw_release("a", "A")]).await;
        mock.set_failure("idx1", MockFailure::Unauthorized).await;
        mock.set_releases("idx2", vec![]).await;

        let agg = aggregator(&mock, 8)
            .collect(&targets(3), &SearchRequest::new("a"), &CancellationToken::new())
            .await
            .unwrap();

        let ids: Vec<_> = agg.outcomes().map(|o| o.indexer_id.as_str()).collect();
        assert_eq!(ids, vec!["idx0", "idx1", "idx2"]);
        assert_eq!(agg.results[0].outcome.status, OutcomeStatus::Ok);
        assert_eq!(agg.results[0].outcome.result_count, 1);
        assert_eq!(agg.results[1].outcome.status, OutcomeStatus::Unauthorized);
        assert!(agg.results[1].outcome.message.is_some());
        assert_eq!(agg.results[2].outcome.result_count, 0);
        assert!(!agg.deadline_exceeded);
    }

    #[tokio::test]
    async fn test_empty_targets() {
        let mock = Arc::new(MockAdapter::new());
        let agg = aggregator(&mock, 8)
            .collect(&[], &SearchRequest::new("a"), &CancellationToken::new())
            .await
            .unwrap();
        assert!(agg.results.is_empty());
        assert!(!agg.deadline_exceeded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_adapter_bounded_by_deadline() {
        let mock = Arc::new(MockAdapter::new());
        mock.set_releases("idx0", vec![fixtures::raw_release("a", "A")]).await;
        mock.set_hang("idx1").await;

        let request = SearchRequest {
            timeout_ms: Some(60_000),
            deadline_ms: Some(5_000),
            ..SearchRequest::new("a")
        };
        let started = Instant::now();
        let agg = aggregator(&mock, 8)
            .collect(&targets(2), &request, &CancellationToken::new())
            .await
            .unwrap();

        assert!(started.elapsed() <= Duration::from_millis(5_100));
        assert!(agg.deadline_exceeded);
        assert_eq!(agg.results[0].outcome.status, OutcomeStatus::Ok);
        assert_eq!(
            agg.results[1].outcome.status,
            OutcomeStatus::Timeout {
                scope: TimeoutScope::Call
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_adapter_timeout() {
        let mock = Arc::new(MockAdapter::new());
        mock.set_delayed("idx0", Duration::from_secs(30), vec![]).await;

        let agg = aggregator(&mock, 8)
            .collect(&targets(1), &SearchRequest::new("a"), &CancellationToken::new())
            .await
            .unwrap();

        assert!(!agg.deadline_exceeded);
        assert_eq!(
            agg.results[0].outcome.status,
            OutcomeStatus::Timeout {
                scope: TimeoutScope::Adapter
            }
        );
        let elapsed = agg.results[0].outcome.elapsed_ms;
        assert!((20_000..21_000).contains(&elapsed));
    }

    #[tokio::test]
    async fn test_malformed_keeps_partial() {
        let mock = Arc::new(MockAdapter::new());
        mock.set_failure(
            "idx0",
            MockFailure::Malformed {
                partial: vec![fixtures::raw_release("a", "A")],
            },
        )
        .await;

        let agg = aggregator(&mock, 8)
            .collect(&targets(1), &SearchRequest::new("a"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(agg.results[0].outcome.status, OutcomeStatus::MalformedResponse);
        assert_eq!(agg.results[0].releases.len(), 1);
        assert_eq!(agg.results[0].outcome.result_count, 1);
    }

    #[tokio::test]
    async fn test_limit_truncates_per_indexer() {
        let mock = Arc::new(MockAdapter::new());
        let many = (0..5)
            .map(|i| fixtures::raw_release(&format!("g{}", i), "T"))
            .collect();
        mock.set_releases("idx0", many).await;

        let request = SearchRequest {
            limit: Some(2),
            ..SearchRequest::new("a")
        };
        let agg = aggregator(&mock, 8)
            .collect(&targets(1), &request, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(agg.results[0].releases.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_bound() {
        let mock = Arc::new(MockAdapter::new());
        for i in 0..6 {
            mock.set_delayed(&format!("idx{}", i), Duration::from_secs(1), vec![])
                .await;
        }

        let agg = aggregator(&mock, 2)
            .collect(&targets(6), &SearchRequest::new("a"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(agg.results.len(), 6);
        assert!(agg.outcomes().all(|o| o.status.is_ok()));
        assert_eq!(mock.max_in_flight(), 2);
        assert_eq!(mock.calls().await.len(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_collection() {
        let mock = Arc::new(MockAdapter::new());
        mock.set_releases("idx0", vec![fixtures::raw_release("a", "A")]).await;
        mock.set_releases("idx1", vec![fixtures::raw_release("b", "B")]).await;
        for i in 2..5 {
            mock.set_hang(&format!("idx{}", i)).await;
        }

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let result = aggregator(&mock, 8)
            .collect(&targets(5), &SearchRequest::new("a"), &cancel)
            .await;
        assert!(matches!(result, Err(EngineError::Cancelled)));
        assert_eq!(mock.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_locally_rate_limited_indexer_not_queried() {
        let mock = Arc::new(MockAdapter::new());
        let mut indexer = fixtures::descriptor("slow");
        indexer.rate_limit_rpm = Some(1);
        let agg = aggregator(&mock, 8);

        let request = SearchRequest::new("a");
        let first = agg
            .collect(std::slice::from_ref(&indexer), &request, &CancellationToken::new())
            .await
            .unwrap();
        assert!(first.results[0].outcome.status.is_ok());

        let second = agg
            .collect(std::slice::from_ref(&indexer), &request, &CancellationToken::new())
            .await
            .unwrap();
        assert!(matches!(
            second.results[0].outcome.status,
            OutcomeStatus::RateLimited {
                retry_after_ms: Some(_)
            }
        ));
        assert_eq!(mock.calls().await.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_adapter_is_network_outcome() {
        let mock = Arc::new(MockAdapter::new());
        let mut indexer = fixtures::descriptor("nzb");
        indexer.kind = IndexerKind::Newznab;

        let agg = aggregator(&mock, 8)
            .collect(&[indexer], &SearchRequest::new("a"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(agg.results[0].outcome.status, OutcomeStatus::Network);
        assert!(agg.results[0]
            .outcome
            .message
            .as_deref()
            .unwrap()
            .contains("newznab"));
    }
}
