//! Hybrid Retrieval Merging Engine
//!
//! Answers a natural-language query restricted to one entity (company) by
//! combining two very different sources:
//!
//! - an internal store of pre-ingested, scope-tagged document passages
//! - a live web search whose hits are ephemeral and never persisted
//!
//! Both are searched concurrently under fixed per-source quotas. Results are
//! concatenated internal-first, deduplicated by identity, and optionally
//! widened with structurally adjacent context from the same document.
//!
//! # Guarantees
//!
//! - Internal passages from a foreign scope never reach the caller
//! - Excluded filler is never a primary result, only supporting context
//! - One failing source shrinks the result; only both failing is an error
//! - Per-source usage counters can be read and reset concurrently
//!
//! # Usage
//!
//! ```rust,ignore
//! use hybrid_retrieval::{HybridRetriever, MemoryStore, RetrievalConfig, TavilyProvider};
//!
//! let store = MemoryStore::new();
//! let web = TavilyProvider::new(api_key);
//! let retriever = HybridRetriever::new(store, web, RetrievalConfig::from_env()?);
//!
//! let scope = retriever.scope_catalog().await?.select("Acme Corp")?;
//! let request = retriever.config().request("HBM market outlook", scope);
//! let outcome = retriever.merge(&request).await?;
//!
//! println!("{} passages, {} source calls", outcome.passages.len(), outcome.usage.total_calls());
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Capability traits (RetrievalSource, InternalStore, WebSearchProvider, Embedder)
//! - [`types`] - Passages, requests, configuration and usage records
//! - [`sources`] - Internal and external source adapters
//! - [`pipeline`] - Merger, deduplicator, context expander, usage accountant
//! - [`stores`] - Internal store implementations (MemoryStore, PostgresStore)
//! - [`searchers`] - Web search providers (Serper, Tavily, rate limiting)
//! - [`security`] - Credential handling
//! - [`testing`] - Mock implementations for testing

pub mod error;
pub mod pipeline;
pub mod searchers;
pub mod security;
pub mod sources;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use error::{Result, RetrievalError, SourceError, SourceResult};
pub use pipeline::{
    canonical_url, dedup, merge_all, ContextExpander, HybridRetriever, MergeOutcome,
    SourceUsage, UsageAccountant,
};
pub use searchers::{RateLimitedProvider, SerperProvider, TavilyProvider};
pub use security::{SearchCredentials, SecretString};
pub use sources::{ExternalSource, InternalSource};
pub use stores::MemoryStore;
pub use traits::{
    embedder::Embedder,
    source::RetrievalSource,
    store::InternalStore,
    web::{MockWebProvider, WebHit, WebSearchProvider},
};
pub use types::{
    config::{ExpansionConfig, MergeOptions, RetrievalConfig},
    passage::{ChunkKind, ContextSegment, Passage, PassageIdentity, SourceKind},
    request::{RetrievalRequest, Scope, ScopeCatalog},
    usage::{SourceFailure, UsageRecord, UsageSnapshot},
};

#[cfg(feature = "postgres")]
pub use stores::PostgresStore;
