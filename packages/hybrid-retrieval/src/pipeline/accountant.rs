//! Usage accounting for cost monitoring.
//!
//! The accountant owns one [`SourceUsage`] per source and hands each adapter
//! an `Arc` to its own record. Every update takes the record's mutex for a
//! few instructions only; no guard is ever held across an `.await`, so
//! increments from concurrent merges and a concurrent `read_and_reset` never
//! lose updates.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use crate::error::SourceError;
use crate::types::{
    passage::SourceKind,
    usage::{SourceFailure, UsageRecord, UsageSnapshot},
};

/// Shared, mutex-guarded counters for one source.
#[derive(Debug)]
pub struct SourceUsage {
    kind: SourceKind,
    record: Mutex<UsageRecord>,
}

impl SourceUsage {
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            record: Mutex::new(UsageRecord::default()),
        }
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// Count one invocation.
    pub fn record_call(&self) {
        self.lock().calls += 1;
    }

    /// Count passages handed back to the merger.
    pub fn record_returned(&self, count: usize) {
        self.lock().items_returned += count as u64;
    }

    /// Remember the latest failure.
    pub fn record_failure(&self, error: &SourceError) {
        self.lock().last_error = Some(SourceFailure::from(error));
    }

    /// Count a dropped foreign-scope passage and remember it as the latest failure.
    pub fn record_scope_violation(&self, error: &SourceError) {
        let mut record = self.lock();
        record.scope_violations += 1;
        record.last_error = Some(SourceFailure::from(error));
    }

    /// Current counters, unchanged.
    pub fn snapshot(&self) -> UsageRecord {
        self.lock().clone()
    }

    /// Current counters, then zero them.
    pub fn take(&self) -> UsageRecord {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, UsageRecord> {
        // Counters stay meaningful even if a holder panicked mid-update.
        self.record.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Process-lifetime usage state for both sources.
#[derive(Debug)]
pub struct UsageAccountant {
    internal: Arc<SourceUsage>,
    external: Arc<SourceUsage>,
    merges: AtomicU64,
}

impl Default for UsageAccountant {
    fn default() -> Self {
        Self::new()
    }
}

impl UsageAccountant {
    pub fn new() -> Self {
        Self {
            internal: Arc::new(SourceUsage::new(SourceKind::Internal)),
            external: Arc::new(SourceUsage::new(SourceKind::External)),
            merges: AtomicU64::new(0),
        }
    }

    /// Handle for the internal adapter.
    pub fn internal(&self) -> Arc<SourceUsage> {
        Arc::clone(&self.internal)
    }

    /// Handle for the external adapter.
    pub fn external(&self) -> Arc<SourceUsage> {
        Arc::clone(&self.external)
    }

    /// Handle for a given source.
    pub fn for_source(&self, kind: SourceKind) -> Arc<SourceUsage> {
        match kind {
            SourceKind::Internal => self.internal(),
            SourceKind::External => self.external(),
        }
    }

    /// Count a merge that passed validation, whatever its outcome.
    pub(crate) fn record_merge(&self) {
        self.merges.fetch_add(1, Ordering::Relaxed);
    }

    /// Read without reset.
    pub fn snapshot(&self) -> UsageSnapshot {
        UsageSnapshot {
            internal: self.internal.snapshot(),
            external: self.external.snapshot(),
            merges: self.merges.load(Ordering::Relaxed),
        }
    }

    /// Read, then zero all counters.
    pub fn read_and_reset(&self) -> UsageSnapshot {
        let snapshot = UsageSnapshot {
            internal: self.internal.take(),
            external: self.external.take(),
            merges: self.merges.swap(0, Ordering::Relaxed),
        };
        debug!(
            internal_calls = snapshot.internal.calls,
            external_calls = snapshot.external.calls,
            merges = snapshot.merges,
            "Usage read and reset"
        );
        snapshot
    }
}
