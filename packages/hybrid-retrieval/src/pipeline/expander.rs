//! Context expansion around internal passages.
//!
//! Widens a hit with the passages structurally adjacent to it in the same
//! document. Excluded filler never stands on its own: its text is folded into
//! the context of a neighbouring non-excluded passage. During a merge the
//! widened text is attached to the originating passage, so the top-level
//! result list never grows.

use futures::future::join_all;
use tracing::{debug, instrument, warn};

use crate::error::{RetrievalError, Result};
use crate::sources::InternalSource;
use crate::traits::store::InternalStore;
use crate::types::{
    config::ExpansionConfig,
    passage::{ChunkKind, ContextSegment, Passage},
    request::Scope,
};

/// Expands internal passages through the internal source's window fetch.
pub struct ContextExpander<'a, S: InternalStore> {
    source: &'a InternalSource<S>,
}

impl<'a, S: InternalStore> ContextExpander<'a, S> {
    pub fn new(source: &'a InternalSource<S>) -> Self {
        Self { source }
    }

    /// Passages covering `sequence_order ± window`, ascending.
    ///
    /// Excluded passages in the window are not returned; each is attached as
    /// context to the nearest preceding non-excluded passage, or the following
    /// one when none precedes it.
    #[instrument(skip(self, passage), fields(identity = %passage.identity))]
    pub async fn expand(&self, passage: &Passage, window: u32) -> Result<Vec<Passage>> {
        let (document_id, center, scope) = position(passage)?;
        let window = i64::from(window);
        let range = center.saturating_sub(window)..=center.saturating_add(window);

        let fetched = self.source.fetch_window(document_id, range, &scope).await?;

        let mut out: Vec<Passage> = Vec::with_capacity(fetched.len());
        let mut leading: Vec<Passage> = Vec::new();
        for mut neighbour in fetched {
            if neighbour.sequence_order == Some(center) {
                neighbour = Passage {
                    context: Vec::new(),
                    excluded: neighbour.excluded,
                    ..passage.clone()
                };
            }
            if neighbour.excluded {
                match out.last_mut() {
                    Some(previous) => previous.attach_context(&neighbour),
                    None => leading.push(neighbour),
                }
                continue;
            }
            for filler in leading.drain(..) {
                neighbour.attach_context(&filler);
            }
            out.push(neighbour);
        }

        if !leading.is_empty() {
            debug!(
                dropped = leading.len(),
                "Window holds only excluded passages"
            );
        }
        Ok(out)
    }

    /// The next non-excluded passage within `max_gap` positions, when it is a table.
    ///
    /// Only the nearest following chunk is considered: a text chunk in between
    /// means the table belongs to a different section.
    #[instrument(skip(self, passage), fields(identity = %passage.identity))]
    pub async fn following_table(
        &self,
        passage: &Passage,
        max_gap: u32,
    ) -> Result<Option<Passage>> {
        let (document_id, center, scope) = position(passage)?;
        if max_gap == 0 {
            return Ok(None);
        }
        let range = center.saturating_add(1)..=center.saturating_add(i64::from(max_gap));

        let fetched = self.source.fetch_window(document_id, range, &scope).await?;
        Ok(fetched
            .into_iter()
            .find(|p| !p.excluded)
            .filter(|p| p.kind == ChunkKind::Table))
    }

    /// Context segments to attach to `passage` under `config`.
    pub async fn context_for(
        &self,
        passage: &Passage,
        config: &ExpansionConfig,
    ) -> Result<Vec<ContextSegment>> {
        let center = passage.sequence_order;
        let mut segments = Vec::new();

        for neighbour in self.expand(passage, config.window).await? {
            if neighbour.sequence_order != center {
                segments.extend(ContextSegment::from_passage(&neighbour));
            }
            segments.extend(neighbour.context);
        }

        if config.attach_following_table && config.max_table_gap > config.window {
            if let Some(table) = self.following_table(passage, config.max_table_gap).await? {
                segments.extend(ContextSegment::from_passage(&table));
            }
        }
        Ok(segments)
    }

    /// Expand every expandable passage in place, concurrently.
    ///
    /// A failed window fetch leaves that passage unexpanded and logs a warning.
    #[instrument(skip_all, fields(count = passages.len(), window = config.window))]
    pub async fn attach_all(&self, passages: &mut [Passage], config: &ExpansionConfig) {
        let contexts = join_all(passages.iter().map(|p| async move {
            if p.is_expandable() {
                Some(self.context_for(p, config).await)
            } else {
                None
            }
        }))
        .await;

        let mut expanded = 0usize;
        for (passage, context) in passages.iter_mut().zip(contexts) {
            match context {
                Some(Ok(segments)) => {
                    for segment in segments {
                        passage.attach_segment(segment);
                    }
                    expanded += 1;
                }
                Some(Err(e)) => {
                    warn!(identity = %passage.identity, error = %e, "Context expansion skipped");
                }
                None => {}
            }
        }
        debug!(expanded, "Context expansion completed");
    }
}

fn position(passage: &Passage) -> Result<(&str, i64, Scope)> {
    match (
        passage.is_expandable(),
        passage.document_id.as_deref(),
        passage.sequence_order,
        passage.scope_tag.as_deref(),
    ) {
        (true, Some(document_id), Some(center), Some(tag)) => {
            Ok((document_id, center, Scope::new(tag)))
        }
        _ => Err(RetrievalError::NotExpandable {
            identity: passage.identity.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::accountant::SourceUsage;
    use crate::testing::ScriptedStore;
    use crate::types::passage::SourceKind;
    use std::sync::Arc;

    fn source(store: ScriptedStore) -> InternalSource<ScriptedStore> {
        InternalSource::new(store, Arc::new(SourceUsage::new(SourceKind::Internal)))
    }

    fn d1() -> ScriptedStore {
        ScriptedStore::new().with_document(vec![
            Passage::internal("D1", 3, "Acme Corp", "three").with_excluded(true),
            Passage::internal("D1", 4, "Acme Corp", "four"),
            Passage::internal("D1", 5, "Acme Corp", "five").with_excluded(true),
            Passage::internal("D1", 6, "Acme Corp", "six"),
            Passage::internal("D1", 8, "Acme Corp", "| table |").with_kind(ChunkKind::Table),
        ])
    }

    #[tokio::test]
    async fn test_excluded_neighbour_becomes_context() {
        let source = source(d1());
        let expander = ContextExpander::new(&source);
        let hit = Passage::internal("D1", 4, "Acme Corp", "four");

        let window = expander.expand(&hit, 1).await.unwrap();
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].sequence_order, Some(4));

        // 3 has no preceding non-excluded passage, so it folds forward into 4.
        let orders: Vec<_> = window[0].context.iter().map(|s| s.sequence_order).collect();
        assert_eq!(orders, vec![3, 5]);
        assert!(window[0].context.iter().all(|s| s.excluded));
    }

    #[tokio::test]
    async fn test_window_is_ascending() {
        let source = source(d1());
        let expander = ContextExpander::new(&source);
        let hit = Passage::internal("D1", 5, "Acme Corp", "five").with_excluded(true);

        let window = expander.expand(&hit, 1).await.unwrap();
        let orders: Vec<_> = window.iter().map(|p| p.sequence_order).collect();
        assert_eq!(orders, vec![Some(4), Some(6)]);
    }

    #[tokio::test]
    async fn test_external_passage_is_not_expandable() {
        let source = source(d1());
        let expander = ContextExpander::new(&source);
        let web = Passage::external("https://example.com/a", "web");

        let err = expander.expand(&web, 1).await.unwrap_err();
        assert!(matches!(err, RetrievalError::NotExpandable { .. }));
    }

    #[tokio::test]
    async fn test_attach_all_keeps_top_level_count() {
        let source = source(d1());
        let expander = ContextExpander::new(&source);
        let mut passages = vec![
            Passage::internal("D1", 4, "Acme Corp", "four"),
            Passage::external("https://example.com/a", "web"),
        ];

        expander
            .attach_all(&mut passages, &ExpansionConfig::window(1).with_following_table(false))
            .await;

        assert_eq!(passages.len(), 2);
        let orders: Vec<_> = passages[0].context.iter().map(|s| s.sequence_order).collect();
        assert_eq!(orders, vec![3, 5]);
        assert!(passages[1].context.is_empty());
    }

    #[tokio::test]
    async fn test_following_table_is_attached() {
        let source = source(d1());
        let expander = ContextExpander::new(&source);
        let mut passages = vec![Passage::internal("D1", 6, "Acme Corp", "six")];

        expander
            .attach_all(&mut passages, &ExpansionConfig::window(1))
            .await;

        let tables: Vec<_> = passages[0]
            .context
            .iter()
            .filter(|s| s.kind == ChunkKind::Table)
            .map(|s| s.sequence_order)
            .collect();
        assert_eq!(tables, vec![8]);
    }

    #[tokio::test]
    async fn test_following_table_must_be_next_chunk() {
        let source = source(ScriptedStore::new().with_document(vec![
            Passage::internal("D1", 4, "Acme Corp", "four"),
            Passage::internal("D1", 5, "Acme Corp", "five"),
            Passage::internal("D1", 6, "Acme Corp", "six"),
            Passage::internal("D1", 7, "Acme Corp", "(noise)").with_excluded(true),
            Passage::internal("D1", 8, "Acme Corp", "| table |").with_kind(ChunkKind::Table),
        ]));
        let expander = ContextExpander::new(&source);

        let four = Passage::internal("D1", 4, "Acme Corp", "four");
        assert!(expander.following_table(&four, 5).await.unwrap().is_none());

        let six = Passage::internal("D1", 6, "Acme Corp", "six");
        let table = expander.following_table(&six, 5).await.unwrap().unwrap();
        assert_eq!(table.sequence_order, Some(8));

        assert!(expander.following_table(&six, 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_fetch_leaves_passage_unexpanded() {
        let source = source(d1().failing_windows());
        let expander = ContextExpander::new(&source);
        let mut passages = vec![Passage::internal("D1", 4, "Acme Corp", "four")];

        expander
            .attach_all(&mut passages, &ExpansionConfig::window(1))
            .await;

        assert_eq!(passages.len(), 1);
        assert!(passages[0].context.is_empty());
    }
}
