//! Testing utilities including mock implementations.
//!
//! These are useful for testing applications that use the hybrid retrieval
//! library without a database or network calls.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::{SourceError, SourceResult};
use crate::traits::{
    embedder::Embedder,
    store::InternalStore,
    web::{WebHit, WebSearchProvider},
};
use crate::types::{passage::Passage, request::Scope};

/// A scripted internal store.
///
/// `search` returns the scripted hits verbatim, ignoring scope and `k`, so
/// tests can check that the adapter enforces both. Range fetches filter by
/// document and position only.
#[derive(Default)]
pub struct ScriptedStore {
    hits: Vec<Passage>,
    documents: Vec<Passage>,
    scopes: Option<Vec<String>>,
    delay: Option<Duration>,
    fail_search: bool,
    fail_windows: bool,
    searches: AtomicUsize,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Passages returned by every search.
    pub fn with_hits(mut self, hits: Vec<Passage>) -> Self {
        self.hits = hits;
        self
    }

    /// Passages served to range fetches.
    pub fn with_document(mut self, passages: Vec<Passage>) -> Self {
        self.documents.extend(passages);
        self
    }

    /// Explicit scope list (defaults to the tags seen in hits and documents).
    pub fn with_scopes(mut self, scopes: &[&str]) -> Self {
        self.scopes = Some(scopes.iter().map(|s| s.to_string()).collect());
        self
    }

    /// Sleep before answering a search.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make every search fail with a storage error.
    pub fn failing(mut self) -> Self {
        self.fail_search = true;
        self
    }

    /// Make every range fetch fail with a storage error.
    pub fn failing_windows(mut self) -> Self {
        self.fail_windows = true;
        self
    }

    /// Number of searches started so far.
    pub fn search_count(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

fn scripted_failure(what: &str) -> SourceError {
    SourceError::storage(std::io::Error::other(format!("scripted {} failure", what)))
}

#[async_trait]
impl InternalStore for ScriptedStore {
    async fn search(&self, _query: &str, _scope: &Scope, _k: usize) -> SourceResult<Vec<Passage>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_search {
            return Err(scripted_failure("search"));
        }
        Ok(self.hits.clone())
    }

    async fn fetch_by_sequence_range(
        &self,
        document_id: &str,
        range: RangeInclusive<i64>,
        _scope: &Scope,
    ) -> SourceResult<Vec<Passage>> {
        if self.fail_windows {
            return Err(scripted_failure("window"));
        }
        let mut window: Vec<Passage> = self
            .documents
            .iter()
            .filter(|p| {
                p.document_id.as_deref() == Some(document_id)
                    && p.sequence_order.is_some_and(|seq| range.contains(&seq))
            })
            .cloned()
            .collect();
        window.sort_by_key(|p| p.sequence_order);
        Ok(window)
    }

    async fn list_scopes(&self) -> SourceResult<Vec<String>> {
        if let Some(scopes) = &self.scopes {
            return Ok(scopes.clone());
        }
        let seen: BTreeSet<String> = self
            .hits
            .iter()
            .chain(&self.documents)
            .filter_map(|p| p.scope_tag.clone())
            .collect();
        Ok(seen.into_iter().collect())
    }
}

/// A scripted web provider with optional latency and failure.
#[derive(Default)]
pub struct ScriptedProvider {
    hits: Vec<WebHit>,
    delay: Option<Duration>,
    failure: Option<fn() -> SourceError>,
    searches: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hits returned by every search (truncated to the limit).
    pub fn with_hits(mut self, hits: Vec<WebHit>) -> Self {
        self.hits = hits;
        self
    }

    /// `n` distinct hits with snippets.
    pub fn with_distinct_hits(self, n: usize) -> Self {
        let hits = (0..n)
            .map(|i| {
                WebHit::new(format!("https://web{}.example.com/article", i))
                    .with_title(format!("Article {}", i))
                    .with_snippet(format!("External finding {}", i))
            })
            .collect();
        self.with_hits(hits)
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail every search with the error built by `failure`.
    pub fn failing_with(mut self, failure: fn() -> SourceError) -> Self {
        self.failure = Some(failure);
        self
    }

    pub fn search_count(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WebSearchProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn search(&self, _query: &str, limit: usize) -> SourceResult<Vec<WebHit>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(failure) = self.failure {
            return Err(failure());
        }
        Ok(self.hits.iter().take(limit).cloned().collect())
    }
}

/// Deterministic embedder seeded from a SHA-256 of the text.
///
/// Identical texts embed identically; anything else is effectively random.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> SourceResult<Vec<f32>> {
        use sha2::{Digest, Sha256};

        let hash = Sha256::digest(text.as_bytes());
        Ok((0..self.dimension)
            .map(|i| (hash[i % 32] as f32 / 127.5) - 1.0)
            .collect())
    }
}
