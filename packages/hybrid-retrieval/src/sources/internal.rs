//! Internal source adapter over an [`InternalStore`].

use async_trait::async_trait;
use std::ops::RangeInclusive;
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

use crate::error::{SourceError, SourceResult};
use crate::pipeline::accountant::SourceUsage;
use crate::traits::{source::RetrievalSource, store::InternalStore};
use crate::types::{
    passage::{Passage, SourceKind},
    request::{Scope, ScopeCatalog},
};

/// Default threshold below which internal hits are reported as weak.
pub const DEFAULT_MIN_SCORE: f32 = 0.5;

/// Scoped retrieval from the pre-ingested document store.
///
/// Owns the store handle. The store applies the scope as a query predicate;
/// this adapter re-checks every returned tag and drops (loudly) anything that
/// slipped through, since that indicates a filter defect upstream.
pub struct InternalSource<S: InternalStore> {
    store: S,
    usage: Arc<SourceUsage>,
    min_score: f32,
}

impl<S: InternalStore> InternalSource<S> {
    pub fn new(store: S, usage: Arc<SourceUsage>) -> Self {
        Self {
            store,
            usage,
            min_score: DEFAULT_MIN_SCORE,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Set the low-score reporting threshold.
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    /// Fetch structurally adjacent passages (including excluded filler).
    #[instrument(skip(self), fields(source = "internal", scope = %scope))]
    pub async fn fetch_window(
        &self,
        document_id: &str,
        range: RangeInclusive<i64>,
        scope: &Scope,
    ) -> SourceResult<Vec<Passage>> {
        let mut passages = self
            .store
            .fetch_by_sequence_range(document_id, range.clone(), scope)
            .await?;

        passages.retain(|p| {
            p.document_id.as_deref() == Some(document_id)
                && p.sequence_order.is_some_and(|seq| range.contains(&seq))
                && self.in_scope(p, scope)
        });
        passages.sort_by_key(|p| p.sequence_order);
        debug!(document_id, fetched = passages.len(), "Window fetched");
        Ok(passages)
    }

    /// The enumerated list of entities callers may scope to.
    pub async fn catalog(&self) -> SourceResult<ScopeCatalog> {
        Ok(ScopeCatalog::new(self.store.list_scopes().await?))
    }

    /// Scope check with loud rejection.
    fn in_scope(&self, passage: &Passage, scope: &Scope) -> bool {
        match passage.scope_tag.as_deref() {
            Some(tag) if scope.matches(tag) => true,
            found => {
                let err = SourceError::ScopeMismatch {
                    expected: scope.to_string(),
                    found: found.unwrap_or("<untagged>").to_string(),
                    identity: passage.identity.to_string(),
                };
                error!(error = %err, "Dropping internal passage from foreign scope");
                self.usage.record_scope_violation(&err);
                false
            }
        }
    }

    fn admit(&self, raw: Vec<Passage>, scope: &Scope, k: usize) -> Vec<Passage> {
        let mut admitted = Vec::with_capacity(raw.len().min(k));
        let mut low_score = 0usize;

        for mut passage in raw {
            if admitted.len() == k {
                break;
            }
            if !self.in_scope(&passage, scope) {
                continue;
            }
            if passage.excluded {
                warn!(identity = %passage.identity, "Store returned excluded passage as a hit");
                continue;
            }
            if passage.text.trim().is_empty() {
                warn!(identity = %passage.identity, "Skipping empty internal passage");
                continue;
            }
            if passage.score.is_some_and(|s| s < self.min_score) {
                low_score += 1;
            }
            passage.source = SourceKind::Internal;
            admitted.push(passage);
        }

        if low_score > 0 {
            warn!(
                low_score,
                min_score = self.min_score,
                "Internal results below score threshold"
            );
        }
        admitted
    }
}

#[async_trait]
impl<S: InternalStore> RetrievalSource for InternalSource<S> {
    fn kind(&self) -> SourceKind {
        SourceKind::Internal
    }

    fn usage(&self) -> &Arc<SourceUsage> {
        &self.usage
    }

    #[instrument(skip(self), fields(source = "internal", scope = %scope))]
    async fn search(&self, query: &str, scope: &Scope, k: usize) -> SourceResult<Vec<Passage>> {
        self.usage.record_call();

        let raw = match self.store.search(query, scope, k).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Internal search failed");
                self.usage.record_failure(&e);
                return Err(e);
            }
        };

        let passages = self.admit(raw, scope, k);
        self.usage.record_returned(passages.len());
        debug!(returned = passages.len(), "Internal search completed");
        Ok(passages)
    }
}
