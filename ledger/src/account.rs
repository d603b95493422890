//! Account repository.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use pairledger_common::{Account, AccountId, CreateOutcome, LedgerError, NewAccount, Result};

use crate::store::AccountStore;
use crate::transaction::TransactionScope;

/// Owns account rows: create-if-absent, read, and locked read.
#[derive(Clone)]
pub struct AccountRepository {
    store: Arc<dyn AccountStore>,
}

impl AccountRepository {
    /// Create a repository over `store`.
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self { store }
    }

    /// The underlying store handle.
    pub fn store(&self) -> &dyn AccountStore {
        self.store.as_ref()
    }

    /// Insert an account unless one with the same id exists.
    ///
    /// A duplicate id is not an error: the existing row is left untouched,
    /// whatever balance is passed the second time.
    #[instrument(skip(self, account), fields(account = %account.id))]
    pub async fn create(&self, account: &NewAccount) -> Result<CreateOutcome> {
        if self.store.insert_if_absent(account).await? {
            info!(
                account = %account.id,
                balance = %account.initial_balance,
                "Account created"
            );
            Ok(CreateOutcome::Created)
        } else {
            debug!(account = %account.id, "Account already exists, nothing changed");
            Ok(CreateOutcome::AlreadyExists)
        }
    }

    /// Read one account.
    pub async fn get(&self, id: AccountId) -> Result<Account> {
        self.store
            .fetch(id)
            .await?
            .ok_or(LedgerError::NotFound(id))
    }

    /// Lock the rows for `ids` inside `scope` and return them ascending by id.
    ///
    /// Locks are always requested from the smallest id to the largest, so two
    /// transactions touching overlapping rows queue on the same row first and
    /// can never wait on each other in a cycle. Missing ids are left out of
    /// the result.
    pub async fn get_for_update(
        &self,
        scope: &mut TransactionScope,
        ids: impl IntoIterator<Item = AccountId>,
    ) -> Result<Vec<Account>> {
        let ordered: Vec<AccountId> = ids
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let mut accounts = scope.transaction()?.lock_accounts(&ordered).await?;
        accounts.sort_by_key(|account| account.id);
        Ok(accounts)
    }
}
