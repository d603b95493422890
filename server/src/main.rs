//! PairLedger Server Binary

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pairledger_ledger::{AccountStore, MemoryStore, PostgresStore};
use pairledger_server::{create_router, AppState, ServerConfig, StoreBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env()
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting PairLedger server");

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    let store: Arc<dyn AccountStore> = match config.backend {
        StoreBackend::Postgres => {
            let store = PostgresStore::connect(&config.postgres_config())
                .await
                .map_err(|e| anyhow::anyhow!("Failed to initialize database: {}", e))?;
            info!("Database connection established and schema initialized");
            Arc::new(store)
        }
        StoreBackend::Memory => {
            info!("Using in-memory store, balances are lost on exit");
            Arc::new(MemoryStore::new())
        }
    };

    let state = AppState::with_store(store, config.ledger_config());
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    info!(
        listen_addr = %config.listen_addr,
        listen_port = %config.listen_port,
        backend = ?config.backend,
        "Server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
