//! Typed errors for the hybrid retrieval library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.
//!
//! Two layers exist:
//! - [`SourceError`] is produced by a single retrieval source and is contained
//!   at the adapter boundary (recorded in usage, logged, treated as empty).
//! - [`RetrievalError`] is what a caller of the merge engine sees.

use thiserror::Error;

/// Errors surfaced to callers of the merge engine.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Malformed quota, scope or query. Rejected before any I/O.
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// Both retrieval sources failed or timed out.
    #[error("all sources failed (internal: {internal}; external: {external})")]
    AllSourcesFailed { internal: String, external: String },

    /// Context expansion requested on a passage with no structural position.
    #[error("passage is not expandable: {identity}")]
    NotExpandable { identity: String },

    /// Operation was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,

    /// A source-level failure that escaped containment (expansion fetches).
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),
}

impl RetrievalError {
    /// Shorthand for [`RetrievalError::InvalidRequest`].
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }
}

/// Errors raised by one retrieval source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Storage operation failed
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Provider answered with something we could not interpret
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    /// Provider rate limit exceeded
    #[error("rate limit exceeded")]
    RateLimited,

    /// The per-call deadline elapsed before the source answered
    #[error("timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    /// Internal passage tagged with a scope other than the requested one
    #[error("scope mismatch on {identity}: expected {expected:?}, found {found:?}")]
    ScopeMismatch {
        expected: String,
        found: String,
        identity: String,
    },

    /// Embedding generation failed
    #[error("embedding error: {0}")]
    Embedding(String),

    /// The in-flight call was dropped by caller cancellation
    #[error("cancelled")]
    Cancelled,
}

impl SourceError {
    /// Stable machine-readable label for usage reports and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Storage(_) => "storage",
            Self::Http(_) => "http",
            Self::InvalidResponse(_) => "invalid_response",
            Self::RateLimited => "rate_limited",
            Self::Timeout { .. } => "timeout",
            Self::ScopeMismatch { .. } => "scope_mismatch",
            Self::Embedding(_) => "embedding",
            Self::Cancelled => "cancelled",
        }
    }

    pub(crate) fn storage(e: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Storage(Box::new(e))
    }

    pub(crate) fn http(e: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Http(Box::new(e))
    }
}

/// Result type alias for merge-engine operations.
pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Result type alias for source operations.
pub type SourceResult<T> = std::result::Result<T, SourceError>;
