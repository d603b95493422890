//! Request counters exposed on `/metrics`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// Server metrics.
pub struct Metrics {
    /// Accounts inserted.
    pub accounts_created: AtomicU64,
    /// Create requests for ids that already existed.
    pub accounts_existing: AtomicU64,
    /// Transfers submitted to the ledger.
    pub transfers_total: AtomicU64,
    /// Transfers committed.
    pub transfers_committed: AtomicU64,
    /// Transfers refused for a business reason.
    pub transfers_rejected: AtomicU64,
    /// Transfers aborted by a store failure or cancellation.
    pub transfers_failed: AtomicU64,
    /// Transfers in progress.
    pub transfers_active: AtomicU64,
}

impl Metrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self {
            accounts_created: AtomicU64::new(0),
            accounts_existing: AtomicU64::new(0),
            transfers_total: AtomicU64::new(0),
            transfers_committed: AtomicU64::new(0),
            transfers_rejected: AtomicU64::new(0),
            transfers_failed: AtomicU64::new(0),
            transfers_active: AtomicU64::new(0),
        }
    }

    /// Record an account insert.
    pub fn account_created(&self) {
        self.accounts_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a create for an existing id.
    pub fn account_existing(&self) {
        self.accounts_existing.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment transfer started.
    pub fn transfer_started(&self) {
        self.transfers_total.fetch_add(1, Ordering::Relaxed);
        self.transfers_active.fetch_add(1, Ordering::Relaxed);
    }

    /// Record transfer commit.
    pub fn transfer_committed(&self) {
        self.transfers_committed.fetch_add(1, Ordering::Relaxed);
        self.transfers_active.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record transfer rejection.
    pub fn transfer_rejected(&self) {
        self.transfers_rejected.fetch_add(1, Ordering::Relaxed);
        self.transfers_active.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record transfer failure.
    pub fn transfer_failed(&self) {
        self.transfers_failed.fetch_add(1, Ordering::Relaxed);
        self.transfers_active.fetch_sub(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            accounts_created: self.accounts_created.load(Ordering::Relaxed),
            accounts_existing: self.accounts_existing.load(Ordering::Relaxed),
            transfers_total: self.transfers_total.load(Ordering::Relaxed),
            transfers_committed: self.transfers_committed.load(Ordering::Relaxed),
            transfers_rejected: self.transfers_rejected.load(Ordering::Relaxed),
            transfers_failed: self.transfers_failed.load(Ordering::Relaxed),
            transfers_active: self.transfers_active.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub accounts_created: u64,
    pub accounts_existing: u64,
    pub transfers_total: u64,
    pub transfers_committed: u64,
    pub transfers_rejected: u64,
    pub transfers_failed: u64,
    pub transfers_active: u64,
}

/// Shared metrics instance.
pub type SharedMetrics = Arc<Metrics>;
