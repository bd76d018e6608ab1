//! Core trait abstractions for the hybrid retrieval library.
//!
//! These traits define the interfaces that applications implement
//! to provide the internal store, live web search and query embeddings.

pub mod embedder;
pub mod source;
pub mod store;
pub mod web;
