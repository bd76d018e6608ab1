//! In-memory internal store for testing and development.

use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::ops::RangeInclusive;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, instrument};

use crate::error::SourceResult;
use crate::traits::{
    embedder::Embedder,
    store::{cosine_similarity, keyword_match, InternalStore},
};
use crate::types::{
    passage::{ChunkKind, Passage},
    request::Scope,
};

struct Stored {
    passage: Passage,
    embedding: Option<Vec<f32>>,
}

/// In-memory passage store keyed by document.
///
/// Scores by cosine similarity when an [`Embedder`] is configured and the
/// passage was added with an embedding, by keyword overlap otherwise. Only
/// text passages are search hits; tables are reached by range fetch. Not
/// suitable for production as data is lost on restart.
pub struct MemoryStore {
    documents: RwLock<HashMap<String, Vec<Stored>>>,
    embedder: Option<Arc<dyn Embedder>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a new empty keyword-scored store.
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
            embedder: None,
        }
    }

    /// Use an embedder for vector scoring.
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Insert an internal passage without an embedding.
    ///
    /// Passages without a document id are ignored. A passage at an occupied
    /// position replaces the previous one.
    pub fn insert(&self, passage: Passage) {
        self.put(passage, None);
    }

    /// Insert many passages.
    pub fn extend(&self, passages: impl IntoIterator<Item = Passage>) {
        for passage in passages {
            self.insert(passage);
        }
    }

    /// Insert a passage, embedding its text when an embedder is configured.
    pub async fn index(&self, passage: Passage) -> SourceResult<()> {
        let embedding = match &self.embedder {
            Some(embedder) => Some(embedder.embed(&passage.text).await?),
            None => None,
        };
        self.put(passage, embedding);
        Ok(())
    }

    /// Number of stored passages, excluded ones included.
    pub fn passage_count(&self) -> usize {
        self.read().values().map(Vec::len).sum()
    }

    /// Clear all stored data.
    pub fn clear(&self) {
        self.write().clear();
    }

    fn put(&self, passage: Passage, embedding: Option<Vec<f32>>) {
        let Some(document_id) = passage.document_id.clone() else {
            return;
        };
        let mut documents = self.write();
        let chunks = documents.entry(document_id).or_default();
        chunks.retain(|c| c.passage.sequence_order != passage.sequence_order);
        let at = chunks.partition_point(|c| c.passage.sequence_order < passage.sequence_order);
        chunks.insert(at, Stored { passage, embedding });
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Vec<Stored>>> {
        self.documents.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Vec<Stored>>> {
        self.documents.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn in_scope(passage: &Passage, scope: &Scope) -> bool {
    passage
        .scope_tag
        .as_deref()
        .is_some_and(|tag| scope.matches(tag))
}

#[async_trait]
impl InternalStore for MemoryStore {
    #[instrument(skip(self), fields(store = "memory", scope = %scope))]
    async fn search(&self, query: &str, scope: &Scope, k: usize) -> SourceResult<Vec<Passage>> {
        let query_embedding = match &self.embedder {
            Some(embedder) => Some(embedder.embed(query).await?),
            None => None,
        };

        let mut scored: Vec<(f32, Passage)> = self
            .read()
            .values()
            .flatten()
            .filter(|c| {
                !c.passage.excluded
                    && c.passage.kind == ChunkKind::Text
                    && in_scope(&c.passage, scope)
            })
            .filter_map(|c| {
                let score = match (&query_embedding, &c.embedding) {
                    (Some(q), Some(e)) => cosine_similarity(q, e),
                    _ => {
                        let score = keyword_match(query, &c.passage.text);
                        if score <= 0.0 {
                            return None;
                        }
                        score
                    }
                };
                Some((score, c.passage.clone()))
            })
            .collect();

        scored.sort_by(|(a, pa), (b, pb)| {
            b.partial_cmp(a)
                .unwrap_or(Ordering::Equal)
                .then_with(|| pa.document_id.cmp(&pb.document_id))
                .then_with(|| pa.sequence_order.cmp(&pb.sequence_order))
        });
        scored.truncate(k);

        debug!(hits = scored.len(), "Memory search completed");
        Ok(scored
            .into_iter()
            .map(|(score, passage)| passage.with_score(score))
            .collect())
    }

    async fn fetch_by_sequence_range(
        &self,
        document_id: &str,
        range: RangeInclusive<i64>,
        scope: &Scope,
    ) -> SourceResult<Vec<Passage>> {
        Ok(self
            .read()
            .get(document_id)
            .map(|chunks| {
                chunks
                    .iter()
                    .filter(|c| {
                        in_scope(&c.passage, scope)
                            && c.passage
                                .sequence_order
                                .is_some_and(|seq| range.contains(&seq))
                    })
                    .map(|c| c.passage.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list_scopes(&self) -> SourceResult<Vec<String>> {
        let scopes: BTreeSet<String> = self
            .read()
            .values()
            .flatten()
            .filter_map(|c| c.passage.scope_tag.clone())
            .collect();
        Ok(scopes.into_iter().collect())
    }
}
