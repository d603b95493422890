//! Debit/credit postings for double-entry transfers.

use serde::{Deserialize, Serialize};

use pairledger_common::{AccountId, Money, TransferRequest};

/// Side of a posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryType {
    /// Reduces the account balance.
    Debit,
    /// Increases the account balance.
    Credit,
}

/// A single balance change within a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    /// Account affected.
    pub account_id: AccountId,
    /// Entry type (debit or credit).
    pub entry_type: EntryType,
    /// Amount as requested.
    pub amount: Money,
}

impl Posting {
    /// Create a debit posting.
    pub fn debit(account_id: AccountId, amount: Money) -> Self {
        Self {
            account_id,
            entry_type: EntryType::Debit,
            amount,
        }
    }

    /// Create a credit posting.
    pub fn credit(account_id: AccountId, amount: Money) -> Self {
        Self {
            account_id,
            entry_type: EntryType::Credit,
            amount,
        }
    }

    /// Change applied to the account balance.
    pub fn delta(&self) -> Money {
        match self.entry_type {
            EntryType::Debit => -self.amount,
            EntryType::Credit => self.amount,
        }
    }
}

/// The two postings of one transfer, applied debit first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostingPair {
    pub debit: Posting,
    pub credit: Posting,
}

impl PostingPair {
    /// Build the postings for a transfer request.
    pub fn for_transfer(request: &TransferRequest) -> Self {
        Self {
            debit: Posting::debit(request.source_account_id, request.amount),
            credit: Posting::credit(request.destination_account_id, request.amount),
        }
    }

    /// Postings in application order.
    pub fn postings(&self) -> [Posting; 2] {
        [self.debit, self.credit]
    }

    /// Check debits equal credits.
    pub fn is_balanced(&self) -> bool {
        self.debit.entry_type == EntryType::Debit
            && self.credit.entry_type == EntryType::Credit
            && (self.debit.delta() + self.credit.delta()).is_zero()
    }

    /// Net balance change for `account_id` once both postings are applied.
    pub fn net_change(&self, account_id: AccountId) -> Money {
        self.postings()
            .iter()
            .filter(|posting| posting.account_id == account_id)
            .map(Posting::delta)
            .sum()
    }
}
