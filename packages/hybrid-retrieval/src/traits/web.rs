//! Web search provider trait for live external lookups.
//!
//! Abstracts over search providers (Serper, Tavily, etc.). Hits are turned
//! into ad-hoc passages for one merge and never written to any store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{SourceError, SourceResult};

/// One hit from a web search provider.
#[derive(Debug, Clone, PartialEq)]
pub struct WebHit {
    /// Link as returned by the provider.
    pub url: String,

    /// Title of the page (if available).
    pub title: Option<String>,

    /// Snippet/description from search results.
    pub snippet: Option<String>,

    /// Relevance score (if provided by the search API).
    pub score: Option<f32>,
}

impl WebHit {
    /// Create a new hit from a URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
            snippet: None,
            score: None,
        }
    }

    /// Add a title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Add a snippet.
    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }

    /// Add a relevance score.
    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }
}

/// Live web search capability.
///
/// # Implementations
///
/// - `SerperProvider` - google.serper.dev
/// - `TavilyProvider` - Tavily API
/// - `RateLimitedProvider` - wraps any provider with a rate limit
/// - `MockWebProvider` - For testing
#[async_trait]
pub trait WebSearchProvider: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &'static str;

    /// Search the web, returning at most `limit` hits, best first.
    async fn search(&self, query: &str, limit: usize) -> SourceResult<Vec<WebHit>>;
}

#[async_trait]
impl<T: WebSearchProvider + ?Sized> WebSearchProvider for Arc<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn search(&self, query: &str, limit: usize) -> SourceResult<Vec<WebHit>> {
        (**self).search(query, limit).await
    }
}

/// Mock web provider for testing.
#[derive(Default)]
pub struct MockWebProvider {
    results: RwLock<HashMap<String, Vec<WebHit>>>,
    fail_with_rate_limit: bool,
}

impl MockWebProvider {
    /// Create a new mock provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add hits for a query.
    pub fn with_results(self, query: &str, hits: Vec<WebHit>) -> Self {
        self.results
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(query.to_string(), hits);
        self
    }

    /// Add `(url, snippet)` pairs as hits.
    pub fn with_pages(self, query: &str, pages: &[(&str, &str)]) -> Self {
        let hits = pages
            .iter()
            .map(|(url, snippet)| WebHit::new(*url).with_snippet(*snippet))
            .collect();
        self.with_results(query, hits)
    }

    /// Make every search fail with [`SourceError::RateLimited`].
    pub fn rate_limited(mut self) -> Self {
        self.fail_with_rate_limit = true;
        self
    }
}

#[async_trait]
impl WebSearchProvider for MockWebProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn search(&self, query: &str, limit: usize) -> SourceResult<Vec<WebHit>> {
        if self.fail_with_rate_limit {
            return Err(SourceError::RateLimited);
        }
        let mut hits = self
            .results
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(query)
            .cloned()
            .unwrap_or_default();
        hits.truncate(limit);
        Ok(hits)
    }
}
