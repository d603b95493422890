//! Shared handler state.

use std::sync::Arc;

use pairledger_ledger::{AccountStore, Ledger, LedgerConfig};

use crate::metrics::{Metrics, SharedMetrics};

/// State handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Ledger,
    pub metrics: SharedMetrics,
}

impl AppState {
    /// Create state over an existing ledger.
    pub fn new(ledger: Ledger) -> Self {
        Self {
            ledger,
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Build the ledger and state over `store`.
    pub fn with_store(store: Arc<dyn AccountStore>, config: LedgerConfig) -> Self {
        Self::new(Ledger::new(store, config))
    }
}
