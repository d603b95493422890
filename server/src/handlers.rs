//! Request handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::{info, warn};

use pairledger_common::{
    Account, AccountId, CreateOutcome, LedgerError, NewAccount, TransferRequest,
};
use pairledger_ledger::TransferReceipt;

use crate::error::ApiError;
use crate::metrics::MetricsSnapshot;
use crate::state::AppState;

/// Body returned by `POST /accounts`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateAccountResponse {
    pub account_id: AccountId,
    pub outcome: CreateOutcome,
}

/// Body returned by `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// "healthy" or "unhealthy".
    pub status: &'static str,
    pub version: &'static str,
}

/// POST /accounts
///
/// 201 when the account was created, 200 when the id already existed. The
/// existing row is never modified.
pub async fn create_account(
    State(state): State<AppState>,
    payload: Result<Json<NewAccount>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateAccountResponse>), ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::invalid_body(rejection.body_text()))?;

    if request.initial_balance.is_negative() {
        return Err(ApiError::from(LedgerError::invalid_amount(
            "Initial balance cannot be negative",
        )));
    }

    let outcome = state
        .ledger
        .create_account(request.id, request.initial_balance)
        .await?;

    let status = match outcome {
        CreateOutcome::Created => {
            state.metrics.account_created();
            StatusCode::CREATED
        }
        CreateOutcome::AlreadyExists => {
            state.metrics.account_existing();
            StatusCode::OK
        }
    };

    Ok((
        status,
        Json(CreateAccountResponse {
            account_id: request.id,
            outcome,
        }),
    ))
}

/// GET /accounts/{account_id}
pub async fn get_account(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<Account>, ApiError> {
    let id: AccountId = raw_id
        .parse()
        .map_err(|_| ApiError::bad_request("INVALID_ACCOUNT_ID", "Invalid account ID format"))?;

    Ok(Json(state.ledger.get_account(id).await?))
}

/// POST /transactions
pub async fn create_transaction(
    State(state): State<AppState>,
    payload: Result<Json<TransferRequest>, JsonRejection>,
) -> Result<Json<TransferReceipt>, ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::invalid_body(rejection.body_text()))?;

    if request.is_self_transfer() {
        return Err(ApiError::bad_request(
            "SAME_ACCOUNT",
            "Source and destination accounts cannot be the same",
        ));
    }
    if !request.amount.is_positive() {
        return Err(ApiError::from(LedgerError::invalid_amount(
            "Transaction amount must be positive",
        )));
    }

    state.metrics.transfer_started();
    match state.ledger.execute_transfer(&request).await {
        Ok(receipt) => {
            state.metrics.transfer_committed();
            Ok(Json(receipt))
        }
        Err(err) => {
            if err.is_retryable() {
                state.metrics.transfer_failed();
                warn!(error = %err, "Transfer failed");
            } else {
                state.metrics.transfer_rejected();
                info!(error = %err, "Transfer rejected");
            }
            Err(err.into())
        }
    }
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (status, label) = match state.ledger.health_check().await {
        Ok(()) => (StatusCode::OK, "healthy"),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "unhealthy"),
    };

    (
        status,
        Json(HealthResponse {
            status: label,
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

/// GET /metrics
pub async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}
