//! Rate-limited web search wrapper.
//!
//! Wraps any [`WebSearchProvider`] with a request quota using the governor
//! crate. Calls wait for a permit instead of failing, so the merge deadline is
//! what ultimately bounds a throttled search.

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::trace;

use crate::error::{RetrievalError, Result, SourceResult};
use crate::traits::web::{WebHit, WebSearchProvider};

type DefaultRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// A provider wrapper that enforces a request rate.
pub struct RateLimitedProvider<W: WebSearchProvider> {
    inner: W,
    limiter: Arc<DefaultRateLimiter>,
}

impl<W: WebSearchProvider> RateLimitedProvider<W> {
    /// Wrap with a per-second rate; zero is a configuration error.
    pub fn new(provider: W, requests_per_second: u32) -> Result<Self> {
        let rate = NonZeroU32::new(requests_per_second).ok_or_else(|| {
            RetrievalError::Config("requests_per_second must be > 0".to_string())
        })?;
        Ok(Self::with_quota(provider, Quota::per_second(rate)))
    }

    /// Wrap with the default rate of 5 requests per second.
    pub fn with_default_rate(provider: W) -> Self {
        Self::with_quota(provider, Quota::per_second(nonzero!(5u32)))
    }

    /// Wrap with a custom quota (burst, per-minute, ...).
    pub fn with_quota(provider: W, quota: Quota) -> Self {
        Self {
            inner: provider,
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    pub fn inner(&self) -> &W {
        &self.inner
    }
}

#[async_trait]
impl<W: WebSearchProvider> WebSearchProvider for RateLimitedProvider<W> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn search(&self, query: &str, limit: usize) -> SourceResult<Vec<WebHit>> {
        self.limiter.until_ready().await;
        trace!(provider = self.inner.name(), "Rate limit permit acquired");
        self.inner.search(query, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::web::MockWebProvider;
    use std::time::Duration;

    #[test]
    fn test_zero_rate_is_rejected() {
        let err = RateLimitedProvider::new(MockWebProvider::new(), 0).err();
        assert!(matches!(err, Some(RetrievalError::Config(_))));
    }

    #[tokio::test]
    async fn test_passes_through_results() {
        let provider = RateLimitedProvider::with_default_rate(
            MockWebProvider::new().with_pages("q", &[("https://a.example.com", "a")]),
        );
        assert_eq!(provider.name(), "mock");
        let hits = provider.search("q", 3).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_second_call_waits_for_permit() {
        let provider = RateLimitedProvider::with_quota(
            MockWebProvider::new(),
            Quota::with_period(Duration::from_millis(200)).unwrap(),
        );

        provider.search("q", 1).await.unwrap();
        let started = std::time::Instant::now();
        provider.search("q", 1).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(100));
    }
}
