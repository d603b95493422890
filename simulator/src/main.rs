//! PairLedger Simulator
//!
//! Drives concurrent transfer scenarios against the ledger and checks that
//! the balance total is unchanged afterwards.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pairledger_common::{AccountId, Money};
use pairledger_ledger::{
    AccountStore, Ledger, LedgerConfig, MemoryStore, PostgresConfig, PostgresStore,
};

mod controller;
mod metrics;
mod scenario;

use controller::SimulationController;
use scenario::{Scenario, ScenarioKind};

/// PairLedger Simulator CLI
#[derive(Parser, Debug)]
#[command(name = "simulator")]
#[command(about = "PairLedger concurrent transfer simulator")]
struct Args {
    /// Scenario to run
    #[arg(short, long, value_enum, default_value = "random")]
    scenario: ScenarioKind,

    /// Number of accounts to create
    #[arg(short, long, default_value = "4")]
    accounts: usize,

    /// First account id; later accounts use consecutive ids
    #[arg(long, default_value = "1")]
    first_account_id: i64,

    /// Opening balance of every account
    #[arg(long, default_value = "1000.00")]
    initial_balance: Money,

    /// Concurrent workers
    #[arg(short, long, default_value = "8")]
    workers: usize,

    /// Transfers submitted by each worker
    #[arg(short, long, default_value = "100")]
    transfers: usize,

    /// Largest amount drawn by the random scenario
    #[arg(long, default_value = "50.00")]
    max_amount: Money,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Per-transfer timeout in milliseconds (0 = none)
    #[arg(long, default_value = "0")]
    transfer_timeout_ms: u64,

    /// Run against PostgreSQL instead of the in-memory store
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting PairLedger Simulator");

    let store: Arc<dyn AccountStore> = match &args.database_url {
        Some(url) => {
            let config = PostgresConfig {
                database_url: url.clone(),
                max_connections: u32::try_from(args.workers.max(1)).unwrap_or(u32::MAX),
                ..PostgresConfig::default()
            };
            Arc::new(PostgresStore::connect(&config).await?)
        }
        None => Arc::new(MemoryStore::new()),
    };

    let ledger = Ledger::new(
        store,
        LedgerConfig {
            transfer_timeout: (args.transfer_timeout_ms > 0)
                .then(|| Duration::from_millis(args.transfer_timeout_ms)),
            ..LedgerConfig::default()
        },
    );

    let accounts: Vec<AccountId> = (0..args.accounts)
        .map(|offset| AccountId::new(args.first_account_id + offset as i64))
        .collect();
    let controller = SimulationController::new(ledger, accounts, args.initial_balance);
    controller.initialize().await?;

    let mut rng = match args.seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    let scenario = Scenario::build(
        args.scenario,
        controller.accounts(),
        args.workers,
        args.transfers,
        args.max_amount,
        &mut rng,
    )?;

    // Set up graceful shutdown
    let running = controller.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received, stopping workers");
            running.store(false, Ordering::SeqCst);
        }
    });

    let report = controller.run_scenario(scenario).await?;
    let metrics = &report.metrics;

    info!("Simulation complete");
    info!("Scenario: {}", report.scenario);
    info!("Total transfers: {}", metrics.total_transfers);
    info!("Committed: {}", metrics.committed_transfers);
    info!("Rejected: {}", metrics.rejected_transfers);
    info!("Failed: {}", metrics.failed_transfers);
    info!("Commit rate: {:.2}%", metrics.commit_rate() * 100.0);
    info!("Throughput: {:.1} transfers/s", metrics.throughput(report.elapsed));
    info!(
        "Latency: avg {}µs, p50 {}µs, p99 {}µs",
        metrics.average_latency_us(),
        metrics.p50_latency_us(),
        metrics.p99_latency_us()
    );

    if !report.is_conserved() {
        warn!(
            expected = %report.expected_total,
            actual = %report.actual_total,
            "Conservation check failed"
        );
        anyhow::bail!("balance total changed during simulation");
    }

    Ok(())
}
