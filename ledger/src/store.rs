//! Transactional store abstraction.
//!
//! The ledger never coordinates writers itself. Every mutual-exclusion
//! guarantee comes from the store: a [`StoreTransaction`] holds exclusive row
//! locks from [`StoreTransaction::lock_accounts`] until it commits or is
//! rolled back.

use async_trait::async_trait;

use pairledger_common::{Account, AccountId, Money, NewAccount, Result};

/// Shared handle to the persistence engine.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert the row unless one with the same id exists.
    ///
    /// Returns `true` when a row was inserted. An existing row is left
    /// untouched.
    async fn insert_if_absent(&self, account: &NewAccount) -> Result<bool>;

    /// Read the committed state of one row.
    async fn fetch(&self, id: AccountId) -> Result<Option<Account>>;

    /// Start a new atomic unit of work.
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>>;

    /// Check the store is reachable.
    async fn ping(&self) -> Result<()>;
}

/// An open store transaction.
///
/// Dropping a transaction that was neither committed nor rolled back must
/// discard its writes and release its locks.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Lock the rows for `ids` exclusively and return them.
    ///
    /// Callers pass distinct ids in ascending order; rows are locked in that
    /// order and returned in that order. Ids without a row are skipped.
    async fn lock_accounts(&mut self, ids: &[AccountId]) -> Result<Vec<Account>>;

    /// Add `delta` to the balance of a row previously locked by this
    /// transaction.
    async fn apply_delta(&mut self, id: AccountId, delta: Money) -> Result<()>;

    /// Make every write visible atomically and release all locks.
    async fn commit(&mut self) -> Result<()>;

    /// Discard every write and release all locks.
    async fn rollback(&mut self) -> Result<()>;
}
