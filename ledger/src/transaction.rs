//! Scoped transaction boundary.

use tracing::{debug, warn};

use pairledger_common::{LedgerError, Result};

use crate::store::{AccountStore, StoreTransaction};

/// Lifecycle of a [`TransactionScope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    /// Statements may still be issued.
    Active,
    /// Commit succeeded.
    Committed,
    /// Writes were discarded.
    RolledBack,
}

impl ScopeState {
    /// Check if the scope can no longer be used.
    pub fn is_finished(&self) -> bool {
        !matches!(self, ScopeState::Active)
    }
}

/// An atomic unit of work that rolls back unless explicitly committed.
///
/// Early returns, `?` propagation and dropped futures all end up in `Drop`,
/// which discards the underlying store transaction. Nothing executed inside
/// the scope is visible to other transactions before [`commit`] returns.
///
/// [`commit`]: TransactionScope::commit
pub struct TransactionScope {
    tx: Option<Box<dyn StoreTransaction>>,
    state: ScopeState,
}

impl TransactionScope {
    /// Open a new scope on `store`.
    pub async fn begin(store: &dyn AccountStore) -> Result<Self> {
        let tx = store.begin().await?;
        Ok(Self {
            tx: Some(tx),
            state: ScopeState::Active,
        })
    }

    /// Current state.
    pub fn state(&self) -> ScopeState {
        self.state
    }

    /// Borrow the open store transaction.
    pub fn transaction(&mut self) -> Result<&mut dyn StoreTransaction> {
        let state = self.state;
        match self.tx.as_deref_mut() {
            Some(tx) => Ok(tx),
            None => Err(LedgerError::StoreFailure(format!(
                "transaction scope is not active ({state:?})"
            ))),
        }
    }

    /// Commit every statement issued inside the scope.
    ///
    /// A failed commit leaves the scope rolled back.
    pub async fn commit(&mut self) -> Result<()> {
        let Some(mut tx) = self.tx.take() else {
            return Err(LedgerError::StoreFailure(format!(
                "cannot commit a finished transaction ({:?})",
                self.state
            )));
        };

        match tx.commit().await {
            Ok(()) => {
                self.state = ScopeState::Committed;
                Ok(())
            }
            Err(e) => {
                self.state = ScopeState::RolledBack;
                warn!(error = %e, "Commit failed, transaction rolled back");
                Err(e)
            }
        }
    }

    /// Discard every statement issued inside the scope.
    ///
    /// Calling this after a commit or a previous rollback does nothing.
    pub async fn rollback(&mut self) -> Result<()> {
        let Some(mut tx) = self.tx.take() else {
            return Ok(());
        };
        self.state = ScopeState::RolledBack;
        tx.rollback().await
    }
}

impl Drop for TransactionScope {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            self.state = ScopeState::RolledBack;
            debug!("Transaction scope dropped before commit, discarding writes");
            drop(tx);
        }
    }
}
