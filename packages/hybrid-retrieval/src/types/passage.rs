//! Passage types - the unit of text flowing through the merge pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::pipeline::dedup::canonical_url;

/// Which retrieval source produced a passage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Pre-ingested, scope-tagged documents.
    Internal,
    /// Live web search, never persisted.
    External,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Internal => write!(f, "internal"),
            SourceKind::External => write!(f, "external"),
        }
    }
}

/// Structural kind of an internal chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    #[default]
    Text,
    Table,
}

/// Canonical key used for duplicate detection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PassageIdentity {
    /// Stable position inside an ingested document.
    Internal {
        document_id: String,
        sequence_order: i64,
    },
    /// Normalized URL (see [`canonical_url`]).
    External { url: String },
}

impl fmt::Display for PassageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassageIdentity::Internal {
                document_id,
                sequence_order,
            } => write!(f, "{}#{}", document_id, sequence_order),
            PassageIdentity::External { url } => f.write_str(url),
        }
    }
}

/// Supporting text attached to a passage by context expansion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSegment {
    /// Position of the contributing passage in the same document.
    pub sequence_order: i64,

    /// Contributing text.
    pub text: String,

    /// True when the contributor is excluded filler (supporting detail only).
    pub excluded: bool,

    /// Structural kind of the contributor.
    pub kind: ChunkKind,
}

impl ContextSegment {
    pub(crate) fn from_passage(passage: &Passage) -> Option<Self> {
        Some(Self {
            sequence_order: passage.sequence_order?,
            text: passage.text.clone(),
            excluded: passage.excluded,
            kind: passage.kind,
        })
    }
}

/// One retrieved unit of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    /// Content, never empty.
    pub text: String,

    /// Originating source.
    pub source: SourceKind,

    /// Canonical identity.
    pub identity: PassageIdentity,

    /// Originating document (always set for internal passages).
    pub document_id: Option<String>,

    /// Position within the document (internal only).
    pub sequence_order: Option<i64>,

    /// Non-authoritative filler flag, set at ingestion time.
    #[serde(default)]
    pub excluded: bool,

    /// Entity this passage belongs to (internal only).
    pub scope_tag: Option<String>,

    /// Title or section path.
    pub title: Option<String>,

    /// Link as returned by the source (external only).
    pub url: Option<String>,

    /// Relevance score reported by the source.
    pub score: Option<f32>,

    /// Structural kind.
    #[serde(default)]
    pub kind: ChunkKind,

    /// Context attached by expansion, ordered by position.
    #[serde(default)]
    pub context: Vec<ContextSegment>,
}

impl Passage {
    /// Create an internal passage at `(document_id, sequence_order)`.
    pub fn internal(
        document_id: impl Into<String>,
        sequence_order: i64,
        scope_tag: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        let document_id = document_id.into();
        Self {
            text: text.into(),
            source: SourceKind::Internal,
            identity: PassageIdentity::Internal {
                document_id: document_id.clone(),
                sequence_order,
            },
            document_id: Some(document_id),
            sequence_order: Some(sequence_order),
            excluded: false,
            scope_tag: Some(scope_tag.into()),
            title: None,
            url: None,
            score: None,
            kind: ChunkKind::Text,
            context: Vec::new(),
        }
    }

    /// Create an external passage identified by its canonical URL.
    pub fn external(url: impl Into<String>, text: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            text: text.into(),
            source: SourceKind::External,
            identity: PassageIdentity::External {
                url: canonical_url(&url),
            },
            document_id: None,
            sequence_order: None,
            excluded: false,
            scope_tag: None,
            title: None,
            url: Some(url),
            score: None,
            kind: ChunkKind::Text,
            context: Vec::new(),
        }
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the relevance score.
    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }

    /// Set the chunk kind.
    pub fn with_kind(mut self, kind: ChunkKind) -> Self {
        self.kind = kind;
        self
    }

    /// Mark as excluded filler.
    pub fn with_excluded(mut self, excluded: bool) -> Self {
        self.excluded = excluded;
        self
    }

    /// Only internal passages have a structural position to expand around.
    pub fn is_expandable(&self) -> bool {
        self.source == SourceKind::Internal
            && self.document_id.is_some()
            && self.sequence_order.is_some()
    }

    /// Attach another passage's text as supporting context.
    ///
    /// Contributors without a position, or already attached, are ignored.
    pub fn attach_context(&mut self, contributor: &Passage) {
        if let Some(segment) = ContextSegment::from_passage(contributor) {
            self.attach_segment(segment);
        }
    }

    /// Insert a context segment in position order, skipping duplicates.
    pub fn attach_segment(&mut self, segment: ContextSegment) {
        if Some(segment.sequence_order) == self.sequence_order
            || self
                .context
                .iter()
                .any(|s| s.sequence_order == segment.sequence_order)
        {
            return;
        }
        let at = self
            .context
            .partition_point(|s| s.sequence_order < segment.sequence_order);
        self.context.insert(at, segment);
    }

    /// Text with attached context, in document order.
    pub fn expanded_text(&self) -> String {
        if self.context.is_empty() {
            return self.text.clone();
        }
        let center = self.sequence_order.unwrap_or(i64::MIN);
        let before = self.context.iter().filter(|s| s.sequence_order < center);
        let after = self.context.iter().filter(|s| s.sequence_order > center);

        before
            .map(|s| s.text.as_str())
            .chain(std::iter::once(self.text.as_str()))
            .chain(after.map(|s| s.text.as_str()))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Human-readable attribution tag for prompts.
    pub fn citation(&self) -> String {
        match &self.identity {
            PassageIdentity::Internal { document_id, .. } => format!(
                "[[Source: {} (Document: {})]]",
                self.scope_tag.as_deref().unwrap_or("unknown"),
                document_id
            ),
            PassageIdentity::External { url } => {
                format!("[[Source: {}]]", self.url.as_deref().unwrap_or(url))
            }
        }
    }
}
