//! Merge pipeline - the core of the library.
//!
//! The pipeline orchestrates:
//! - Concurrent, quota-bounded retrieval from both sources ([`merger`])
//! - Identity-based duplicate removal ([`dedup`])
//! - Optional context expansion of internal passages ([`expander`])
//! - Per-source usage accounting ([`accountant`])

pub mod accountant;
pub mod dedup;
pub mod expander;
pub mod merger;

pub use accountant::{SourceUsage, UsageAccountant};
pub use dedup::{canonical_url, dedup, without_urls};
pub use expander::ContextExpander;
pub use merger::{merge_all, HybridRetriever, MergeOutcome};
