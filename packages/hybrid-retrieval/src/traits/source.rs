//! The retrieval source capability.
//!
//! Internal and external retrieval are two implementations of one trait so
//! the merger can drive them uniformly. Adapters own their backend (database
//! pool, HTTP client) and their usage record; the merger only ever calls
//! [`RetrievalSource::search`].

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::SourceResult;
use crate::pipeline::accountant::SourceUsage;
use crate::types::{
    passage::{Passage, SourceKind},
    request::Scope,
};

/// A source of candidate passages.
#[async_trait]
pub trait RetrievalSource: Send + Sync {
    /// Which side of the merge this source feeds.
    fn kind(&self) -> SourceKind;

    /// Usage record this source updates on every call.
    fn usage(&self) -> &Arc<SourceUsage>;

    /// Return at most `k` passages for the query, best first.
    ///
    /// Implementations count the call and the returned items, and record
    /// failures in [`usage`](Self::usage) before returning them.
    async fn search(&self, query: &str, scope: &Scope, k: usize) -> SourceResult<Vec<Passage>>;
}
