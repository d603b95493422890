//! PairLedger Server
//!
//! HTTP surface over the ledger: account creation and reads, transfers,
//! health and counters.

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod routes;
pub mod state;

pub use config::{ServerConfig, StoreBackend};
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
