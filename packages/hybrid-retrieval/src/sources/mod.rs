//! Retrieval source adapters.
//!
//! - [`InternalSource`] - scoped search over the pre-ingested store
//! - [`ExternalSource`] - live web search

pub mod external;
pub mod internal;

pub use external::ExternalSource;
pub use internal::{InternalSource, DEFAULT_MIN_SCORE};
