//! The quota merger - the main entry point of the library.
//!
//! Issues the internal and external searches concurrently, each with its own
//! quota, and combines whatever comes back within the deadline: internal
//! results first, external second, duplicates removed. One failed source only
//! shrinks the result; both failing is an error.

use futures::future::join_all;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::{RetrievalError, Result, SourceError, SourceResult};
use crate::pipeline::accountant::UsageAccountant;
use crate::pipeline::dedup::{dedup, without_urls};
use crate::pipeline::expander::ContextExpander;
use crate::sources::{ExternalSource, InternalSource};
use crate::traits::{source::RetrievalSource, store::InternalStore, web::WebSearchProvider};
use crate::types::{
    config::{MergeOptions, RetrievalConfig},
    passage::Passage,
    request::{RetrievalRequest, Scope, ScopeCatalog},
    usage::UsageSnapshot,
};

/// What a merge hands back.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// Internal passages first, then external, deduplicated.
    pub passages: Vec<Passage>,

    /// Non-resetting usage snapshot taken after the merge.
    pub usage: UsageSnapshot,
}

/// Hybrid retriever over one internal store and one web provider.
///
/// # Example
///
/// ```rust,ignore
/// use hybrid_retrieval::{HybridRetriever, MemoryStore, RetrievalConfig, SerperProvider};
///
/// let retriever = HybridRetriever::new(store, SerperProvider::from_env()?, RetrievalConfig::from_env()?);
/// let request = retriever.config().request("HBM market outlook", "Acme Corp");
/// let outcome = retriever.merge(&request).await?;
/// for passage in &outcome.passages {
///     println!("{} {}", passage.citation(), passage.expanded_text());
/// }
/// ```
pub struct HybridRetriever<S: InternalStore, W: WebSearchProvider> {
    internal: InternalSource<S>,
    external: ExternalSource<W>,
    accountant: UsageAccountant,
    config: RetrievalConfig,
}

impl<S: InternalStore, W: WebSearchProvider> HybridRetriever<S, W> {
    /// Create a retriever that owns the store and the provider.
    pub fn new(store: S, web: W, config: RetrievalConfig) -> Self {
        let accountant = UsageAccountant::new();
        let internal =
            InternalSource::new(store, accountant.internal()).with_min_score(config.min_score);
        let external = ExternalSource::new(web, accountant.external());
        Self {
            internal,
            external,
            accountant,
            config,
        }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn internal(&self) -> &InternalSource<S> {
        &self.internal
    }

    pub fn external(&self) -> &ExternalSource<W> {
        &self.external
    }

    /// Merge with the configured timeout and expansion settings.
    pub async fn merge(&self, request: &RetrievalRequest) -> Result<MergeOutcome> {
        self.merge_with(request, &self.config.merge_options()).await
    }

    /// Merge with explicit per-call options.
    pub async fn merge_with(
        &self,
        request: &RetrievalRequest,
        options: &MergeOptions,
    ) -> Result<MergeOutcome> {
        self.run(request, options, &CancellationToken::new()).await
    }

    /// Merge, aborting both in-flight searches when `cancel` fires.
    pub async fn merge_with_cancel(
        &self,
        request: &RetrievalRequest,
        cancel: CancellationToken,
    ) -> Result<MergeOutcome> {
        self.run(request, &self.config.merge_options(), &cancel).await
    }

    /// Run one merge per query, in order, and concatenate the results.
    ///
    /// Passages already returned for an earlier query are not repeated.
    /// Failing queries are logged and skipped; the batch fails only when every
    /// query fails.
    #[instrument(skip(self, queries), fields(scope = %scope, queries = queries.len()))]
    pub async fn merge_batch(
        &self,
        queries: &[impl AsRef<str>],
        scope: &Scope,
    ) -> Result<MergeOutcome> {
        if queries.is_empty() {
            return Err(RetrievalError::invalid("batch has no queries"));
        }

        let mut passages = Vec::new();
        let mut last_error = None;
        let mut succeeded = 0usize;

        for query in queries {
            let request = self.config.request(query.as_ref(), scope.clone());
            match self.merge(&request).await {
                Ok(outcome) => {
                    succeeded += 1;
                    passages.extend(outcome.passages);
                }
                Err(e) => {
                    warn!(query = query.as_ref(), error = %e, "Batch query failed, skipping");
                    last_error = Some(e);
                }
            }
        }

        if succeeded == 0 {
            if let Some(e) = last_error {
                return Err(e);
            }
        }

        Ok(MergeOutcome {
            passages: dedup(passages),
            usage: self.accountant.snapshot(),
        })
    }

    /// Passages around an internal passage (see [`ContextExpander::expand`]).
    pub async fn expand(&self, passage: &Passage, window: u32) -> Result<Vec<Passage>> {
        ContextExpander::new(&self.internal).expand(passage, window).await
    }

    /// The entities a caller may scope a request to.
    pub async fn scope_catalog(&self) -> Result<ScopeCatalog> {
        Ok(self.internal.catalog().await?)
    }

    /// Usage counters without resetting them.
    pub fn usage(&self) -> UsageSnapshot {
        self.accountant.snapshot()
    }

    /// Usage counters, then zero them.
    pub fn read_and_reset(&self) -> UsageSnapshot {
        self.accountant.read_and_reset()
    }

    #[instrument(
        skip(self, request, options, cancel),
        fields(
            scope = %request.scope,
            internal_k = request.internal_k,
            external_k = request.external_k
        )
    )]
    async fn run(
        &self,
        request: &RetrievalRequest,
        options: &MergeOptions,
        cancel: &CancellationToken,
    ) -> Result<MergeOutcome> {
        request.validate()?;
        self.accountant.record_merge();

        let deadline = deadline_after(options.timeout);
        let (internal, external) = tokio::join!(
            bounded(&self.internal, request, request.internal_k, deadline, options, cancel),
            bounded(&self.external, request, request.external_k, deadline, options, cancel),
        );

        if cancel.is_cancelled() {
            info!("Merge cancelled");
            return Err(RetrievalError::Cancelled);
        }

        let (internal, external) = match (internal, external) {
            (Err(i), Err(e)) => {
                return Err(RetrievalError::AllSourcesFailed {
                    internal: i.to_string(),
                    external: e.to_string(),
                });
            }
            (i, e) => (i.unwrap_or_default(), e.unwrap_or_default()),
        };

        let internal_count = internal.len();
        let external = without_urls(external, &request.exclude_urls);
        let external_count = external.len();

        let merged: Vec<Passage> = internal
            .into_iter()
            .filter(|p| !p.excluded)
            .chain(external)
            .collect();
        let mut passages = dedup(merged);

        if options.expansion.enabled {
            ContextExpander::new(&self.internal)
                .attach_all(&mut passages, &options.expansion)
                .await;
        }

        info!(
            internal = internal_count,
            external = external_count,
            returned = passages.len(),
            "Merge completed"
        );

        Ok(MergeOutcome {
            passages,
            usage: self.accountant.snapshot(),
        })
    }
}

/// Roughly 30 years, far enough to never fire.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout).unwrap_or_else(|| now + FAR_FUTURE)
}

/// One source call under the shared deadline and the caller's cancellation.
///
/// Timeouts and cancellations are recorded here; the adapter records
/// everything else itself.
async fn bounded<R: RetrievalSource>(
    source: &R,
    request: &RetrievalRequest,
    k: usize,
    deadline: Instant,
    options: &MergeOptions,
    cancel: &CancellationToken,
) -> SourceResult<Vec<Passage>> {
    let search = timeout_at(deadline, source.search(&request.query, &request.scope, k));

    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SourceError::Cancelled),
        result = search => match result {
            Ok(inner) => return inner,
            Err(_) => Err(SourceError::Timeout {
                after_ms: options.timeout.as_millis() as u64,
            }),
        },
    };

    if let Err(e) = &outcome {
        warn!(source = %source.kind(), error = %e, "Source abandoned");
        source.usage().record_failure(e);
    }
    outcome
}

/// Run several independent merges concurrently against one retriever.
///
/// Results come back in request order.
pub async fn merge_all<S: InternalStore, W: WebSearchProvider>(
    retriever: &HybridRetriever<S, W>,
    requests: &[RetrievalRequest],
) -> Vec<Result<MergeOutcome>> {
    let results = join_all(requests.iter().map(|r| retriever.merge(r))).await;
    debug!(merges = results.len(), "Concurrent merges completed");
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedStore;
    use crate::traits::web::WebHit;
    use async_trait::async_trait;
    use crate::testing::ScriptedProvider;
    use mockall::mock;

    mock! {
        pub Web {}

        #[async_trait]
        impl WebSearchProvider for Web {
            fn name(&self) -> &'static str;
            async fn search(&self, query: &str, limit: usize) -> SourceResult<Vec<WebHit>>;
        }
    }

    fn web_hits(n: usize) -> Vec<WebHit> {
        (0..n)
            .map(|i| {
                WebHit::new(format!("https://news{}.example.com/hbm", i))
                    .with_snippet(format!("web {}", i))
            })
            .collect()
    }

    fn acme_hits(n: i64) -> Vec<Passage> {
        (1..=n)
            .map(|i| Passage::internal("D1", i, "Acme Corp", format!("internal {}", i)))
            .collect()
    }

    fn mock_web(hits: usize) -> MockWeb {
        let mut web = MockWeb::new();
        web.expect_name().return_const("mock");
        web.expect_search()
            .withf(|_, limit| *limit == 7)
            .times(1)
            .returning(move |_, limit| Ok(web_hits(hits.min(limit))));
        web
    }

    #[tokio::test]
    async fn test_internal_shortfall_is_not_redistributed() {
        let store = ScriptedStore::new().with_hits(acme_hits(1));
        let retriever = HybridRetriever::new(store, mock_web(20), RetrievalConfig::default());

        let request = RetrievalRequest::new("HBM market outlook", "Acme Corp");
        let outcome = retriever.merge(&request).await.unwrap();

        assert_eq!(outcome.passages.len(), 8);
        assert_eq!(outcome.usage.internal.items_returned, 1);
        assert_eq!(outcome.usage.external.items_returned, 7);
    }

    #[tokio::test]
    async fn test_invalid_request_does_no_io() {
        let store = ScriptedStore::new().with_hits(acme_hits(3));
        let mut web = MockWeb::new();
        web.expect_search().never();
        let retriever = HybridRetriever::new(store, web, RetrievalConfig::default());

        let request = RetrievalRequest::new("HBM", "Acme Corp").with_quota(0, 7);
        let err = retriever.merge(&request).await.unwrap_err();

        assert!(matches!(err, RetrievalError::InvalidRequest { .. }));
        assert_eq!(retriever.usage().total_calls(), 0);
    }

    #[tokio::test]
    async fn test_both_failures_are_fatal() {
        let store = ScriptedStore::new().failing();
        let mut web = MockWeb::new();
        web.expect_name().return_const("mock");
        web.expect_search()
            .returning(|_, _| Err(SourceError::RateLimited));
        let retriever = HybridRetriever::new(store, web, RetrievalConfig::default());

        let request = RetrievalRequest::new("HBM", "Acme Corp");
        let err = retriever.merge(&request).await.unwrap_err();

        match err {
            RetrievalError::AllSourcesFailed { internal, external } => {
                assert!(internal.contains("storage"));
                assert!(external.contains("rate limit"));
            }
            other => panic!("expected AllSourcesFailed, got {other:?}"),
        }
        // Failed merges still count as attempts.
        assert_eq!(retriever.usage().merges, 1);
    }

    #[tokio::test]
    async fn test_excluded_urls_are_dropped() {
        let store = ScriptedStore::new().with_hits(acme_hits(3));
        let retriever = HybridRetriever::new(store, mock_web(7), RetrievalConfig::default());

        let request = RetrievalRequest::new("HBM market outlook", "Acme Corp")
            .excluding(["HTTPS://news0.example.com/hbm/?utm_source=feed"]);
        let outcome = retriever.merge(&request).await.unwrap();

        assert_eq!(outcome.passages.len(), 9);
        assert!(outcome
            .passages
            .iter()
            .all(|p| p.url.as_deref() != Some("https://news0.example.com/hbm")));
    }

    #[tokio::test]
    async fn test_cancellation_aborts_merge() {
        let store = ScriptedStore::new()
            .with_hits(acme_hits(3))
            .with_delay(Duration::from_secs(5));
        let mut web = MockWeb::new();
        web.expect_name().return_const("mock");
        web.expect_search().returning(|_, _| Ok(web_hits(7)));
        let retriever = HybridRetriever::new(store, web, RetrievalConfig::default());

        let cancel = CancellationToken::new();
        cancel.cancel();

        let request = RetrievalRequest::new("HBM", "Acme Corp");
        let err = retriever
            .merge_with_cancel(&request, cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, RetrievalError::Cancelled));
        let usage = retriever.usage();
        assert_eq!(usage.internal.last_error.unwrap().kind, "cancelled");
        assert_eq!(usage.merges, 1);
    }

    #[tokio::test]
    async fn test_cancellation_stops_searches_in_flight() {
        let store = ScriptedStore::new()
            .with_hits(acme_hits(3))
            .with_delay(Duration::from_secs(5));
        let web = ScriptedProvider::new()
            .with_distinct_hits(7)
            .with_delay(Duration::from_secs(5));
        let config = RetrievalConfig::default().with_timeout(Duration::from_secs(30));
        let retriever = HybridRetriever::new(store, web, config);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let request = RetrievalRequest::new("HBM", "Acme Corp");
        let err = retriever
            .merge_with_cancel(&request, cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, RetrievalError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(2));

        // Both searches were started once and then dropped.
        assert_eq!(retriever.internal().store().search_count(), 1);
        assert_eq!(retriever.external().provider().search_count(), 1);

        let usage = retriever.usage();
        for record in [&usage.internal, &usage.external] {
            assert_eq!(record.calls, 1);
            assert_eq!(record.items_returned, 0);
            assert_eq!(record.last_error.as_ref().unwrap().kind, "cancelled");
        }
    }

    #[tokio::test]
    async fn test_oversized_timeout_does_not_overflow() {
        let store = ScriptedStore::new().with_hits(acme_hits(3));
        let retriever = HybridRetriever::new(store, mock_web(7), RetrievalConfig::default());

        let mut options = retriever.config().merge_options();
        options.timeout = Duration::MAX;

        let request = RetrievalRequest::new("HBM market outlook", "Acme Corp");
        let outcome = retriever.merge_with(&request, &options).await.unwrap();
        assert_eq!(outcome.passages.len(), 10);
    }

    #[tokio::test]
    async fn test_merge_batch_skips_failed_queries_and_dedups() {
        let store = ScriptedStore::new().with_hits(acme_hits(2));
        let mut web = MockWeb::new();
        web.expect_name().return_const("mock");
        web.expect_search()
            .returning(|query, _| {
                if query.contains("second") {
                    Err(SourceError::RateLimited)
                } else {
                    Ok(web_hits(2))
                }
            });
        let retriever = HybridRetriever::new(store, web, RetrievalConfig::default());

        let outcome = retriever
            .merge_batch(&["first", "  ", "second"], &Scope::new("Acme Corp"))
            .await
            .unwrap();

        // The blank query is rejected and skipped. Internal hits repeat
        // across the other two and are deduplicated.
        assert_eq!(outcome.passages.len(), 4);
        assert_eq!(outcome.usage.merges, 2);
        assert_eq!(outcome.usage.external.calls, 2);
    }

    #[tokio::test]
    async fn test_merge_batch_rejects_empty_batch() {
        let retriever = HybridRetriever::new(
            ScriptedStore::new(),
            MockWeb::new(),
            RetrievalConfig::default(),
        );
        let queries: [&str; 0] = [];
        let err = retriever
            .merge_batch(&queries, &Scope::new("Acme Corp"))
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidRequest { .. }));
    }
}
