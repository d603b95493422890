//! HTTP API tests against an in-memory store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use pairledger_common::{Account, AccountId, LedgerError, NewAccount, Result};
use pairledger_ledger::{
    AccountStore, LedgerConfig, MemoryStore, StoreTransaction, TransactionScope,
};
use pairledger_server::{create_router, AppState};

fn app_with(store: Arc<dyn AccountStore>, config: LedgerConfig) -> Router {
    create_router(AppState::with_store(store, config))
}

fn app() -> Router {
    app_with(Arc::new(MemoryStore::new()), LedgerConfig::default())
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(body) => {
            request = request.header("content-type", "application/json");
            Body::from(body.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn create(app: &Router, id: i64, balance: &str) -> StatusCode {
    let body = json!({ "account_id": id, "initial_balance": balance }).to_string();
    send(app, "POST", "/accounts", Some(&body)).await.0
}

async fn transfer(app: &Router, from: i64, to: i64, amount: &str) -> (StatusCode, Value) {
    let body = json!({
        "source_account_id": from,
        "destination_account_id": to,
        "amount": amount,
    })
    .to_string();
    send(app, "POST", "/transactions", Some(&body)).await
}

fn decimal(value: &Value) -> rust_decimal::Decimal {
    value.as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn test_create_account_returns_201_then_200() {
    let app = app();

    assert_eq!(create(&app, 1, "100.50").await, StatusCode::CREATED);
    assert_eq!(create(&app, 1, "999.00").await, StatusCode::OK);

    let (status, body) = send(&app, "GET", "/accounts/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["account_id"], 1);
    assert_eq!(decimal(&body["balance"]), rust_decimal_macros::dec!(100.50));
    assert!(body["created_at"].is_string());
}

#[tokio::test]
async fn test_create_account_rejects_bad_input() {
    let app = app();

    let (status, body) = send(&app, "POST", "/accounts", Some("{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_REQUEST");

    let (status, _) = send(
        &app,
        "POST",
        "/accounts",
        Some(r#"{"account_id": 1, "initial_balance": "lots"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(create(&app, 2, "-1.00").await, StatusCode::BAD_REQUEST);
    let (status, _) = send(&app, "GET", "/accounts/2", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_amounts_the_balance_column_cannot_hold_are_400() {
    let app = app();

    for opening in ["100000000000000", "0.000004"] {
        let body = json!({ "account_id": 7, "initial_balance": opening }).to_string();
        let (status, body) = send(&app, "POST", "/accounts", Some(&body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_AMOUNT");
    }
    let (status, _) = send(&app, "GET", "/accounts/7", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    assert_eq!(create(&app, 1, "1.00").await, StatusCode::CREATED);
    assert_eq!(create(&app, 2, "1.00").await, StatusCode::CREATED);
    let (status, body) = transfer(&app, 1, 2, "0.000005").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_AMOUNT");

    let (_, body) = send(&app, "GET", "/accounts/2", None).await;
    assert_eq!(decimal(&body["balance"]), rust_decimal_macros::dec!(1.00));
}

#[tokio::test]
async fn test_get_account_errors() {
    let app = app();

    let (status, body) = send(&app, "GET", "/accounts/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_ACCOUNT_ID");

    let (status, body) = send(&app, "GET", "/accounts/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_transfer_flow() {
    let app = app();
    create(&app, 1, "1000.00").await;
    create(&app, 2, "500.00").await;

    let (status, receipt) = transfer(&app, 1, 2, "250.25").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&receipt["source_balance"]), rust_decimal_macros::dec!(749.75));
    assert_eq!(decimal(&receipt["destination_balance"]), rust_decimal_macros::dec!(750.25));

    let (_, account) = send(&app, "GET", "/accounts/2", None).await;
    assert_eq!(decimal(&account["balance"]), rust_decimal_macros::dec!(750.25));
}

#[tokio::test]
async fn test_transfer_validation_and_errors() {
    let app = app();
    create(&app, 1, "100.00").await;
    create(&app, 2, "0").await;

    let (status, body) = transfer(&app, 1, 1, "10").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "SAME_ACCOUNT");

    for amount in ["0", "-5"] {
        let (status, body) = transfer(&app, 1, 2, amount).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_AMOUNT");
    }

    let (status, body) = transfer(&app, 999, 2, "10").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "ACCOUNT_NOT_FOUND");

    let (status, body) = transfer(&app, 1, 2, "100.00001").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "INSUFFICIENT_FUNDS");

    let (status, _) = send(&app, "POST", "/transactions", Some("[]")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, metrics) = send(&app, "GET", "/metrics", None).await;
    assert_eq!(metrics["transfers_total"], 2);
    assert_eq!(metrics["transfers_rejected"], 2);
    assert_eq!(metrics["accounts_created"], 2);
}

#[tokio::test]
async fn test_transfer_timeout_maps_to_503() {
    let store = MemoryStore::new();
    let app = app_with(
        Arc::new(store.clone()),
        LedgerConfig {
            transfer_timeout: Some(Duration::from_millis(20)),
            ..LedgerConfig::default()
        },
    );
    create(&app, 1, "10").await;
    create(&app, 2, "10").await;

    let mut holder = TransactionScope::begin(&store).await.unwrap();
    holder
        .transaction()
        .unwrap()
        .lock_accounts(&[AccountId::new(2)])
        .await
        .unwrap();

    let (status, body) = transfer(&app, 1, 2, "5").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "CANCELLED");
    holder.rollback().await.unwrap();

    let (status, _) = transfer(&app, 1, 2, "5").await;
    assert_eq!(status, StatusCode::OK);
}

/// A store whose connection is gone.
struct UnreachableStore;

#[async_trait]
impl AccountStore for UnreachableStore {
    async fn insert_if_absent(&self, _account: &NewAccount) -> Result<bool> {
        Err(LedgerError::StoreFailure("connection refused".to_string()))
    }

    async fn fetch(&self, _id: AccountId) -> Result<Option<Account>> {
        Err(LedgerError::StoreFailure("connection refused".to_string()))
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        Err(LedgerError::StoreFailure("connection refused".to_string()))
    }

    async fn ping(&self) -> Result<()> {
        Err(LedgerError::StoreFailure("connection refused".to_string()))
    }
}

#[tokio::test]
async fn test_store_failures_map_to_500_and_503() {
    let app = app_with(Arc::new(UnreachableStore), LedgerConfig::default());

    assert_eq!(create(&app, 1, "10").await, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, body) = send(&app, "GET", "/accounts/1", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "STORE_FAILURE");

    let (status, _) = transfer(&app, 1, 2, "1").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");

    let (_, metrics) = send(&app, "GET", "/metrics", None).await;
    assert_eq!(metrics["transfers_failed"], 1);
}

#[tokio::test]
async fn test_health_ok() {
    let (status, body) = send(&app(), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}
