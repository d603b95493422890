//! Simulation controller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use pairledger_common::{AccountId, LedgerError, Money};
use pairledger_ledger::Ledger;

use crate::metrics::SimulationMetrics;
use crate::scenario::Scenario;

/// Outcome of a scenario run.
#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub scenario: &'static str,
    pub elapsed: Duration,
    pub metrics: SimulationMetrics,
    /// Sum of balances before the run.
    pub expected_total: Money,
    /// Sum of balances after the run.
    pub actual_total: Money,
}

impl SimulationReport {
    /// Check no money was created or destroyed.
    pub fn is_conserved(&self) -> bool {
        self.expected_total == self.actual_total
    }
}

/// Controls the simulation.
pub struct SimulationController {
    ledger: Ledger,
    accounts: Vec<AccountId>,
    initial_balance: Money,
    /// Simulation metrics.
    metrics: Arc<RwLock<SimulationMetrics>>,
    /// Running flag.
    running: Arc<AtomicBool>,
}

impl SimulationController {
    /// Create a new simulation controller over `accounts`.
    pub fn new(ledger: Ledger, accounts: Vec<AccountId>, initial_balance: Money) -> Self {
        Self {
            ledger,
            accounts,
            initial_balance,
            metrics: Arc::new(RwLock::new(SimulationMetrics::new())),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Account ids taking part.
    pub fn accounts(&self) -> &[AccountId] {
        &self.accounts
    }

    /// Create the accounts. Ids that already exist keep their balance.
    pub async fn initialize(&self) -> anyhow::Result<()> {
        info!(accounts = self.accounts.len(), "Initializing simulation accounts");

        for &id in &self.accounts {
            let outcome = self.ledger.create_account(id, self.initial_balance).await?;
            debug!(account = %id, outcome = ?outcome, "Account ready");
        }

        Ok(())
    }

    /// Run every worker of `scenario` concurrently and verify conservation.
    pub async fn run_scenario(&self, scenario: Scenario) -> anyhow::Result<SimulationReport> {
        info!(
            scenario = scenario.name,
            workers = scenario.workers.len(),
            transfers = scenario.transfer_count(),
            "{}",
            scenario.description
        );

        let expected_total = self.total_balance().await?;
        self.running.store(true, Ordering::SeqCst);
        let start = Instant::now();

        let handles: Vec<_> = scenario
            .workers
            .into_iter()
            .enumerate()
            .map(|(worker, transfers)| {
                let ledger = self.ledger.clone();
                let metrics = self.metrics.clone();
                let running = self.running.clone();

                tokio::spawn(async move {
                    for request in transfers {
                        if !running.load(Ordering::SeqCst) {
                            debug!(worker, "Worker stopped early");
                            break;
                        }

                        let started = Instant::now();
                        let result = ledger.execute_transfer(&request).await;
                        let mut metrics = metrics.write().await;
                        match result {
                            Ok(_) => metrics.record_commit(started.elapsed()),
                            Err(
                                LedgerError::InsufficientFunds { .. }
                                | LedgerError::AccountNotFound,
                            ) => metrics.record_rejection(),
                            Err(e) => {
                                warn!(worker, error = %e, "Transfer failed");
                                metrics.record_failure();
                            }
                        }
                    }
                })
            })
            .collect();

        for joined in join_all(handles).await {
            joined?;
        }

        let elapsed = start.elapsed();
        self.running.store(false, Ordering::SeqCst);

        let actual_total = self.total_balance().await?;
        let report = SimulationReport {
            scenario: scenario.name,
            elapsed,
            metrics: self.metrics.read().await.clone(),
            expected_total,
            actual_total,
        };

        if report.is_conserved() {
            info!(total = %actual_total, "Balances conserved");
        } else {
            warn!(
                expected = %expected_total,
                actual = %actual_total,
                "Balance total changed during simulation"
            );
        }

        Ok(report)
    }

    /// Sum of the participating balances.
    pub async fn total_balance(&self) -> anyhow::Result<Money> {
        let mut total = Money::ZERO;
        for &id in &self.accounts {
            total += self.ledger.get_account(id).await?.balance;
        }
        Ok(total)
    }

    /// Flag that stops workers after their current transfer once cleared.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }
}
