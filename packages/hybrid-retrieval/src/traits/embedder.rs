//! Embedding trait used by vector-backed internal stores.
//!
//! The embedding model itself lives outside this crate; stores only need a
//! way to turn the query into a vector compatible with what was ingested.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::SourceResult;

/// Query embedding capability.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for the text.
    async fn embed(&self, text: &str) -> SourceResult<Vec<f32>>;
}

#[async_trait]
impl<T: Embedder + ?Sized> Embedder for Arc<T> {
    async fn embed(&self, text: &str) -> SourceResult<Vec<f32>> {
        (**self).embed(text).await
    }
}
