//! Storage trait for the internal, pre-ingested document store.
//!
//! Every operation receives the [`Scope`] and must apply it inside the store
//! (as a query predicate), never as a filter over unscoped results.

use async_trait::async_trait;
use std::ops::RangeInclusive;
use std::sync::Arc;

use crate::error::SourceResult;
use crate::types::{passage::Passage, request::Scope};

/// The internal structured + vector store.
#[async_trait]
pub trait InternalStore: Send + Sync {
    /// Search passages of one entity, best first.
    ///
    /// Must return at most `k` passages, only with `scope_tag == scope`, and
    /// never passages flagged `excluded`.
    async fn search(&self, query: &str, scope: &Scope, k: usize) -> SourceResult<Vec<Passage>>;

    /// Fetch passages of a document by position, ascending.
    ///
    /// Unlike [`search`](Self::search) this includes excluded passages; the
    /// caller decides how to present them.
    async fn fetch_by_sequence_range(
        &self,
        document_id: &str,
        range: RangeInclusive<i64>,
        scope: &Scope,
    ) -> SourceResult<Vec<Passage>>;

    /// All entity names present in the store.
    async fn list_scopes(&self) -> SourceResult<Vec<String>>;
}

#[async_trait]
impl<T: InternalStore + ?Sized> InternalStore for Arc<T> {
    async fn search(&self, query: &str, scope: &Scope, k: usize) -> SourceResult<Vec<Passage>> {
        (**self).search(query, scope, k).await
    }

    async fn fetch_by_sequence_range(
        &self,
        document_id: &str,
        range: RangeInclusive<i64>,
        scope: &Scope,
    ) -> SourceResult<Vec<Passage>> {
        (**self)
            .fetch_by_sequence_range(document_id, range, scope)
            .await
    }

    async fn list_scopes(&self) -> SourceResult<Vec<String>> {
        (**self).list_scopes().await
    }
}

/// Cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Simple keyword matching.
///
/// Returns the fraction of query terms (longer than two characters) found in
/// the text.
pub fn keyword_match(query: &str, text: &str) -> f32 {
    let query_lower = query.to_lowercase();
    let query_terms: Vec<&str> = query_lower
        .split_whitespace()
        .filter(|w| w.chars().count() > 2) // Skip short words
        .collect();

    if query_terms.is_empty() {
        return 0.0;
    }

    let text_lower = text.to_lowercase();
    let matches = query_terms
        .iter()
        .filter(|term| text_lower.contains(*term))
        .count();

    matches as f32 / query_terms.len() as f32
}
