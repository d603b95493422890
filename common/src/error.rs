//! Error types for PairLedger operations.

use crate::{AccountId, Money};
use thiserror::Error;

/// Closed set of outcomes a ledger operation can fail with.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Text could not be parsed as a decimal amount.
    #[error("Malformed amount: {0:?}")]
    MalformedAmount(String),

    /// Amount rejected by the configured amount policy.
    #[error("Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    /// Source balance is lower than the requested amount.
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Money, available: Money },

    /// Source, destination, or both accounts of a transfer are missing.
    #[error("One or both accounts not found")]
    AccountNotFound,

    /// Account lookup by id found no row.
    #[error("Account not found: {0}")]
    NotFound(AccountId),

    /// Connectivity, lock timeout, serialization failure or any other
    /// store-level error. Nothing was applied.
    #[error("Store failure: {0}")]
    StoreFailure(String),

    /// The caller's cancellation signal fired before commit.
    #[error("Operation cancelled before commit")]
    Cancelled,
}

impl LedgerError {
    /// Build an [`LedgerError::InvalidAmount`].
    pub fn invalid_amount(reason: impl Into<String>) -> Self {
        LedgerError::InvalidAmount {
            reason: reason.into(),
        }
    }

    /// Check if resubmitting the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::StoreFailure(_) | LedgerError::Cancelled)
    }

    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            LedgerError::MalformedAmount(_) => "MALFORMED_AMOUNT",
            LedgerError::InvalidAmount { .. } => "INVALID_AMOUNT",
            LedgerError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            LedgerError::AccountNotFound => "ACCOUNT_NOT_FOUND",
            LedgerError::NotFound(_) => "NOT_FOUND",
            LedgerError::StoreFailure(_) => "STORE_FAILURE",
            LedgerError::Cancelled => "CANCELLED",
        }
    }
}

/// Result type alias for PairLedger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
