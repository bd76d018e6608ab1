//! Provider credential handling with secure memory.
//!
//! Uses the `secrecy` crate to prevent accidental logging of API keys.

use secrecy::{ExposeSecret, SecretBox};
use std::env;
use std::fmt;

/// Environment variable holding the Serper key.
pub const SERPER_API_KEY: &str = "SERPER_API_KEY";

/// Environment variable holding the Tavily key.
pub const TAVILY_API_KEY: &str = "TAVILY_API_KEY";

/// A secret string that won't be logged or displayed.
pub struct SecretString(SecretBox<str>);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretBox::new(value.into().into_boxed_str()))
    }

    /// Read a secret from the environment; unset or blank yields `None`.
    pub fn from_env(key: &str) -> Option<Self> {
        env::var(key)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(Self::new)
    }

    /// Expose the secret value. Only call this when building a request.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl Clone for SecretString {
    fn clone(&self) -> Self {
        Self::new(self.expose())
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Web search provider keys found in the environment.
#[derive(Clone, Default)]
pub struct SearchCredentials {
    pub serper: Option<SecretString>,
    pub tavily: Option<SecretString>,
}

impl SearchCredentials {
    /// Load `SERPER_API_KEY` and `TAVILY_API_KEY` (after `.env`, if present).
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self {
            serper: SecretString::from_env(SERPER_API_KEY),
            tavily: SecretString::from_env(TAVILY_API_KEY),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.serper.is_none() && self.tavily.is_none()
    }
}

impl fmt::Debug for SearchCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchCredentials")
            .field("serper", &self.serper.as_ref().map(|_| "[REDACTED]"))
            .field("tavily", &self.tavily.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
