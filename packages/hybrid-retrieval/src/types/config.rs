//! Configuration types for merging and context expansion.

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{RetrievalError, Result};
use crate::types::request::{RetrievalRequest, Scope};

/// Configuration for context expansion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpansionConfig {
    /// Enable context widening.
    ///
    /// Default: false.
    pub enabled: bool,

    /// Expansion radius in sequence positions.
    ///
    /// Default: 1.
    pub window: u32,

    /// Attach the nearest following table chunk even outside the window.
    ///
    /// Default: true.
    pub attach_following_table: bool,

    /// Maximum position gap for the following-table lookup.
    ///
    /// Default: 5.
    pub max_table_gap: u32,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            window: 1,
            attach_following_table: true,
            max_table_gap: 5,
        }
    }
}

impl ExpansionConfig {
    /// Enabled expansion with the given radius.
    pub fn window(window: u32) -> Self {
        Self {
            enabled: true,
            window,
            ..Default::default()
        }
    }

    /// Toggle the following-table lookup.
    pub fn with_following_table(mut self, enabled: bool) -> Self {
        self.attach_following_table = enabled;
        self
    }
}

/// Per-call knobs that are not part of the request itself.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOptions {
    /// Bound on the whole merge; a source still pending is treated as failed.
    pub timeout: Duration,

    /// Context expansion settings.
    pub expansion: ExpansionConfig,
}

impl Default for MergeOptions {
    fn default() -> Self {
        RetrievalConfig::default().merge_options()
    }
}

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Quota for the internal source.
    ///
    /// Default: 3.
    pub internal_k: usize,

    /// Quota for the external source.
    ///
    /// Default: 7.
    pub external_k: usize,

    /// Maximum wait per merge, in milliseconds.
    ///
    /// Default: 30000.
    pub timeout_ms: u64,

    /// Internal passages scoring below this are reported (not dropped).
    ///
    /// Default: 0.5.
    pub min_score: f32,

    /// Context expansion.
    #[serde(default)]
    pub expansion: ExpansionConfig,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            internal_k: 3,
            external_k: 7,
            timeout_ms: 30_000,
            min_score: 0.5,
            expansion: ExpansionConfig::default(),
        }
    }
}

impl RetrievalConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from `HYBRID_*` environment variables.
    ///
    /// Unset variables keep their defaults; malformed ones are an error.
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenvy::dotenv();

        let defaults = Self::default();
        let expansion = ExpansionConfig {
            enabled: env_or("HYBRID_EXPAND", defaults.expansion.enabled)?,
            window: env_or("HYBRID_EXPAND_WINDOW", defaults.expansion.window)?,
            attach_following_table: env_or(
                "HYBRID_ATTACH_TABLES",
                defaults.expansion.attach_following_table,
            )?,
            max_table_gap: env_or("HYBRID_MAX_TABLE_GAP", defaults.expansion.max_table_gap)?,
        };

        let config = Self {
            internal_k: env_or("HYBRID_INTERNAL_K", defaults.internal_k)?,
            external_k: env_or("HYBRID_EXTERNAL_K", defaults.external_k)?,
            timeout_ms: env_or("HYBRID_TIMEOUT_MS", defaults.timeout_ms)?,
            min_score: env_or("HYBRID_MIN_SCORE", defaults.min_score)?,
            expansion,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check quotas and timeout.
    pub fn validate(&self) -> Result<()> {
        if self.internal_k == 0 || self.external_k == 0 {
            return Err(RetrievalError::Config(
                "internal_k and external_k must be > 0".to_string(),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(RetrievalError::Config("timeout_ms must be > 0".to_string()));
        }
        Ok(())
    }

    /// Set the quota ratio.
    pub fn with_quota(mut self, internal_k: usize, external_k: usize) -> Self {
        self.internal_k = internal_k;
        self.external_k = external_k;
        self
    }

    /// Set the per-merge timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the expansion settings.
    pub fn with_expansion(mut self, expansion: ExpansionConfig) -> Self {
        self.expansion = expansion;
        self
    }

    /// Set the low-score reporting threshold.
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Per-call options derived from this config.
    pub fn merge_options(&self) -> MergeOptions {
        MergeOptions {
            timeout: self.timeout(),
            expansion: self.expansion.clone(),
        }
    }

    /// Build a request using the configured quotas.
    pub fn request(&self, query: impl Into<String>, scope: impl Into<Scope>) -> RetrievalRequest {
        RetrievalRequest::new(query, scope).with_quota(self.internal_k, self.external_k)
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| RetrievalError::Config(format!("{} has invalid value {:?}", key, raw))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_three_to_seven_split() {
        let config = RetrievalConfig::default();
        assert_eq!((config.internal_k, config.external_k), (3, 7));
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(!config.expansion.enabled);
        assert!(config.validate().is_ok());

        let request = config.request("HBM market outlook", "Acme Corp");
        assert_eq!((request.internal_k, request.external_k), (3, 7));
    }

    #[test]
    fn test_validate_rejects_zero_quota() {
        let config = RetrievalConfig::default().with_quota(0, 7);
        assert!(matches!(config.validate(), Err(RetrievalError::Config(_))));
    }

    #[test]
    fn test_env_or_parses_and_rejects() {
        env::set_var("HYBRID_TEST_ENV_OR_OK", " 12 ");
        assert_eq!(env_or("HYBRID_TEST_ENV_OR_OK", 3usize).unwrap(), 12);

        env::set_var("HYBRID_TEST_ENV_OR_BAD", "twelve");
        assert!(env_or("HYBRID_TEST_ENV_OR_BAD", 3usize).is_err());

        assert_eq!(env_or("HYBRID_TEST_ENV_OR_UNSET", 3usize).unwrap(), 3);
    }

    #[test]
    fn test_config_serde_roundtrip_keeps_expansion() {
        let config = RetrievalConfig::default().with_expansion(ExpansionConfig::window(2));
        let json = serde_json::to_string(&config).unwrap();
        let back: RetrievalConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.expansion, ExpansionConfig::window(2));
    }
}
