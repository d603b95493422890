//! HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use pairledger_common::LedgerError;

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// An error ready to be written as an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    /// Create a new error response.
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
        }
    }

    /// 400 with the given code.
    pub fn bad_request(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }

    /// 400 for a body that is not valid JSON for the endpoint.
    pub fn invalid_body(detail: impl std::fmt::Display) -> Self {
        Self::bad_request("INVALID_REQUEST", format!("Invalid request body: {detail}"))
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        let code = err.error_code();
        match &err {
            LedgerError::MalformedAmount(_) | LedgerError::InvalidAmount { .. } => {
                Self::bad_request(code, err.to_string())
            }
            LedgerError::InsufficientFunds { .. } => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, code, "Insufficient funds")
            }
            LedgerError::AccountNotFound => {
                Self::new(StatusCode::NOT_FOUND, code, "One or both accounts not found")
            }
            LedgerError::NotFound(_) => Self::new(StatusCode::NOT_FOUND, code, "Account not found"),
            LedgerError::StoreFailure(detail) => {
                error!(error = %detail, "Store failure while handling request");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, code, "Internal store failure")
            }
            LedgerError::Cancelled => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                code,
                "Operation cancelled before commit, retry later",
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
