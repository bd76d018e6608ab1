//! Usage types - per-source call/result counters for cost monitoring.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SourceError;

/// A recorded source failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFailure {
    /// Machine-readable kind (see [`SourceError::kind`]).
    pub kind: String,

    /// Rendered error message.
    pub message: String,

    /// When the failure was recorded.
    pub occurred_at: DateTime<Utc>,
}

impl From<&SourceError> for SourceFailure {
    fn from(error: &SourceError) -> Self {
        Self {
            kind: error.kind().to_string(),
            message: error.to_string(),
            occurred_at: Utc::now(),
        }
    }
}

/// Counters for one retrieval source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Invocations, successful or not.
    pub calls: u64,

    /// Passages actually handed back to the merger.
    pub items_returned: u64,

    /// Internal passages dropped for carrying a foreign scope tag.
    #[serde(default)]
    pub scope_violations: u64,

    /// Most recent failure, if any.
    pub last_error: Option<SourceFailure>,
}

impl UsageRecord {
    pub fn is_zero(&self) -> bool {
        self == &Self::default()
    }
}

/// Counters for both sources at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub internal: UsageRecord,
    pub external: UsageRecord,

    /// Merges attempted past validation, failed and cancelled ones included.
    #[serde(default)]
    pub merges: u64,
}

impl UsageSnapshot {
    /// Total source invocations across both sources.
    pub fn total_calls(&self) -> u64 {
        self.internal.calls + self.external.calls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_from_source_error() {
        let failure = SourceFailure::from(&SourceError::Timeout { after_ms: 250 });
        assert_eq!(failure.kind, "timeout");
        assert!(failure.message.contains("250ms"));
    }

    #[test]
    fn test_snapshot_serializes_for_cost_reports() {
        let snapshot = UsageSnapshot {
            internal: UsageRecord {
                calls: 2,
                items_returned: 6,
                ..Default::default()
            },
            external: UsageRecord {
                calls: 2,
                ..Default::default()
            },
            merges: 2,
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["internal"]["items_returned"], 6);
        assert_eq!(json["external"]["last_error"], serde_json::Value::Null);
        assert_eq!(snapshot.total_calls(), 4);
    }
}
