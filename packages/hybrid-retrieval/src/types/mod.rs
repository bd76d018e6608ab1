//! Data types shared across the merge pipeline.

pub mod config;
pub mod passage;
pub mod request;
pub mod usage;
