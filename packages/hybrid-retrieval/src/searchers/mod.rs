//! Web search provider implementations.
//!
//! - [`SerperProvider`] - google.serper.dev
//! - [`TavilyProvider`] - api.tavily.com
//! - [`RateLimitedProvider`] - governor-backed throttle around any provider

pub mod rate_limited;
pub mod serper;
pub mod tavily;

pub use rate_limited::RateLimitedProvider;
pub use serper::SerperProvider;
pub use tavily::TavilyProvider;
