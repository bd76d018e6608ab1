//! External source adapter over a live [`WebSearchProvider`].

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::error::SourceResult;
use crate::pipeline::accountant::SourceUsage;
use crate::traits::{
    source::RetrievalSource,
    web::{WebHit, WebSearchProvider},
};
use crate::types::{
    passage::{Passage, SourceKind},
    request::Scope,
};

/// Live web retrieval. Hits become ephemeral passages keyed by canonical URL.
pub struct ExternalSource<W: WebSearchProvider> {
    provider: W,
    usage: Arc<SourceUsage>,
}

impl<W: WebSearchProvider> ExternalSource<W> {
    pub fn new(provider: W, usage: Arc<SourceUsage>) -> Self {
        Self { provider, usage }
    }

    pub fn provider(&self) -> &W {
        &self.provider
    }

    fn to_passage(hit: WebHit) -> Option<Passage> {
        let text = hit
            .snippet
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .or_else(|| hit.title.as_deref().map(str::trim).filter(|s| !s.is_empty()))?
            .to_string();
        if hit.url.trim().is_empty() {
            return None;
        }

        let mut passage = Passage::external(&hit.url, text);
        if let Some(title) = hit.title {
            passage = passage.with_title(title);
        }
        if let Some(score) = hit.score {
            passage = passage.with_score(score);
        }
        Some(passage)
    }
}

#[async_trait]
impl<W: WebSearchProvider> RetrievalSource for ExternalSource<W> {
    fn kind(&self) -> SourceKind {
        SourceKind::External
    }

    fn usage(&self) -> &Arc<SourceUsage> {
        &self.usage
    }

    /// Scope does not constrain the web; it is only carried into the span.
    #[instrument(skip(self), fields(source = "external", scope = %scope))]
    async fn search(&self, query: &str, scope: &Scope, k: usize) -> SourceResult<Vec<Passage>> {
        self.usage.record_call();

        let hits = match self.provider.search(query, k).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(provider = self.provider.name(), error = %e, "Web search failed");
                self.usage.record_failure(&e);
                return Err(e);
            }
        };

        let total = hits.len();
        let passages: Vec<Passage> = hits
            .into_iter()
            .filter_map(Self::to_passage)
            .take(k)
            .collect();
        if passages.len() < total.min(k) {
            debug!(
                skipped = total - passages.len(),
                "Skipped web hits without usable text"
            );
        }

        self.usage.record_returned(passages.len());
        debug!(
            provider = self.provider.name(),
            returned = passages.len(),
            "Web search completed"
        );
        Ok(passages)
    }
}
