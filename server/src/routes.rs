//! Route table.
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | POST | /accounts | `create_account` |
//! | GET | /accounts/{account_id} | `get_account` |
//! | POST | /transactions | `create_transaction` |
//! | GET | /health | `health_check` |
//! | GET | /metrics | `metrics` |

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{create_account, create_transaction, get_account, health_check, metrics};
use crate::state::AppState;

/// Build the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/accounts", post(create_account))
        .route("/accounts/{account_id}", get(get_account))
        .route("/transactions", post(create_transaction))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .with_state(state)
}
