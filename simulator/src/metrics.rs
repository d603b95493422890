//! Simulation metrics.

use std::collections::VecDeque;
use std::time::Duration;

/// Simulation metrics.
#[derive(Debug, Clone)]
pub struct SimulationMetrics {
    /// Total transfers attempted.
    pub total_transfers: u64,
    /// Committed transfers.
    pub committed_transfers: u64,
    /// Transfers refused for insufficient funds or a missing account.
    pub rejected_transfers: u64,
    /// Transfers aborted by the store or a timeout.
    pub failed_transfers: u64,
    /// Latency samples (µs) of committed transfers.
    latency_samples: VecDeque<u64>,
    /// Maximum samples to keep.
    max_samples: usize,
}

impl SimulationMetrics {
    /// Create new metrics.
    pub fn new() -> Self {
        Self {
            total_transfers: 0,
            committed_transfers: 0,
            rejected_transfers: 0,
            failed_transfers: 0,
            latency_samples: VecDeque::with_capacity(10000),
            max_samples: 10000,
        }
    }

    /// Record a committed transfer.
    pub fn record_commit(&mut self, latency: Duration) {
        self.total_transfers += 1;
        self.committed_transfers += 1;

        if self.latency_samples.len() >= self.max_samples {
            self.latency_samples.pop_front();
        }
        self.latency_samples
            .push_back(u64::try_from(latency.as_micros()).unwrap_or(u64::MAX));
    }

    /// Record a rejected transfer.
    pub fn record_rejection(&mut self) {
        self.total_transfers += 1;
        self.rejected_transfers += 1;
    }

    /// Record a failed transfer.
    pub fn record_failure(&mut self) {
        self.total_transfers += 1;
        self.failed_transfers += 1;
    }

    /// Get average latency in µs.
    pub fn average_latency_us(&self) -> u64 {
        if self.latency_samples.is_empty() {
            return 0;
        }

        let sum: u64 = self.latency_samples.iter().sum();
        sum / self.latency_samples.len() as u64
    }

    /// Get p50 latency.
    pub fn p50_latency_us(&self) -> u64 {
        self.percentile_latency(50)
    }

    /// Get p99 latency.
    pub fn p99_latency_us(&self) -> u64 {
        self.percentile_latency(99)
    }

    fn percentile_latency(&self, percentile: usize) -> u64 {
        if self.latency_samples.is_empty() {
            return 0;
        }

        let mut sorted: Vec<_> = self.latency_samples.iter().copied().collect();
        sorted.sort_unstable();

        let idx = (sorted.len() * percentile / 100).min(sorted.len() - 1);
        sorted[idx]
    }

    /// Share of attempted transfers that committed.
    pub fn commit_rate(&self) -> f64 {
        if self.total_transfers == 0 {
            return 0.0;
        }

        self.committed_transfers as f64 / self.total_transfers as f64
    }

    /// Attempted transfers per second.
    pub fn throughput(&self, elapsed: Duration) -> f64 {
        let secs = elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }

        self.total_transfers as f64 / secs
    }
}

impl Default for SimulationMetrics {
    fn default() -> Self {
        Self::new()
    }
}
