//! Credential handling for web search providers.

pub mod credentials;

pub use credentials::{SearchCredentials, SecretString};
