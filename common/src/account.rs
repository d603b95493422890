//! Account rows and transfer requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, Money};

/// A persisted account row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique account identifier.
    #[serde(rename = "account_id")]
    pub id: AccountId,
    /// Current balance.
    pub balance: Money,
    /// When the row was inserted.
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Check if the balance covers `amount`.
    pub fn has_sufficient_funds(&self, amount: Money) -> bool {
        self.balance >= amount
    }
}

/// Input for account creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAccount {
    /// Identifier chosen by the caller.
    #[serde(rename = "account_id")]
    pub id: AccountId,
    /// Opening balance.
    pub initial_balance: Money,
}

impl NewAccount {
    /// Create a new account request.
    pub fn new(id: impl Into<AccountId>, initial_balance: Money) -> Self {
        Self {
            id: id.into(),
            initial_balance,
        }
    }
}

/// Result of an idempotent create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreateOutcome {
    /// A new row was inserted.
    Created,
    /// A row with the same id existed; nothing changed.
    AlreadyExists,
}

/// A request to move `amount` from one account to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub source_account_id: AccountId,
    pub destination_account_id: AccountId,
    pub amount: Money,
}

impl TransferRequest {
    /// Create a new transfer request.
    pub fn new(
        source_account_id: impl Into<AccountId>,
        destination_account_id: impl Into<AccountId>,
        amount: Money,
    ) -> Self {
        Self {
            source_account_id: source_account_id.into(),
            destination_account_id: destination_account_id.into(),
            amount,
        }
    }

    /// Check if both sides name the same account.
    pub fn is_self_transfer(&self) -> bool {
        self.source_account_id == self.destination_account_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_request_json() {
        let json = r#"{"source_account_id": 1, "destination_account_id": 2, "amount": "250.25"}"#;
        let request: TransferRequest = serde_json::from_str(json).unwrap();

        assert_eq!(request.source_account_id, AccountId::new(1));
        assert_eq!(request.destination_account_id, AccountId::new(2));
        assert_eq!(request.amount, Money::parse("250.25").unwrap());
        assert!(!request.is_self_transfer());
    }

    #[test]
    fn test_new_account_json() {
        let json = r#"{"account_id": 7, "initial_balance": "1000.00"}"#;
        let account: NewAccount = serde_json::from_str(json).unwrap();
        assert_eq!(account, NewAccount::new(7, Money::parse("1000").unwrap()));

        let bad = r#"{"account_id": 7, "initial_balance": 1000.0}"#;
        assert!(serde_json::from_str::<NewAccount>(bad).is_err());
    }

    #[test]
    fn test_account_json() {
        let account = Account {
            id: AccountId::new(3),
            balance: Money::parse("100.50").unwrap(),
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&account).unwrap();
        assert_eq!(value["account_id"], 3);
        assert_eq!(value["balance"], "100.50");
        assert!(account.has_sufficient_funds(Money::parse("100.50").unwrap()));
        assert!(!account.has_sufficient_funds(Money::parse("100.50001").unwrap()));
    }
}
