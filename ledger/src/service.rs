//! Ledger facade used by the request-handling layer.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, instrument};

use pairledger_common::{
    Account, AccountId, CreateOutcome, Money, NewAccount, Result, TransferRequest,
};

use crate::account::AccountRepository;
use crate::engine::{TransferEngine, TransferReceipt};
use crate::policy::AmountPolicy;
use crate::store::AccountStore;

/// Ledger configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Which amount signs are accepted.
    pub policy: AmountPolicy,
    /// Upper bound on a single transfer; `None` waits for as long as the
    /// store does.
    pub transfer_timeout: Option<Duration>,
}

/// Account creation, reads and transfers over a single store handle.
#[derive(Clone)]
pub struct Ledger {
    accounts: AccountRepository,
    engine: TransferEngine,
    config: LedgerConfig,
}

impl Ledger {
    /// Create a new ledger over `store`.
    pub fn new(store: Arc<dyn AccountStore>, config: LedgerConfig) -> Self {
        let accounts = AccountRepository::new(store);
        let engine = TransferEngine::new(accounts.clone(), config.policy)
            .with_timeout(config.transfer_timeout);

        Self {
            accounts,
            engine,
            config,
        }
    }

    /// Configuration in force.
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Account repository.
    pub fn accounts(&self) -> &AccountRepository {
        &self.accounts
    }

    /// Transfer engine.
    pub fn engine(&self) -> &TransferEngine {
        &self.engine
    }

    /// Create an account unless the id is already taken.
    pub async fn create_account(
        &self,
        id: impl Into<AccountId>,
        initial_balance: Money,
    ) -> Result<CreateOutcome> {
        self.config.policy.check_initial_balance(initial_balance)?;
        self.accounts
            .create(&NewAccount::new(id, initial_balance))
            .await
    }

    /// Read one account.
    pub async fn get_account(&self, id: impl Into<AccountId>) -> Result<Account> {
        self.accounts.get(id.into()).await
    }

    /// Move funds between two accounts.
    pub async fn execute_transfer(&self, request: &TransferRequest) -> Result<TransferReceipt> {
        self.engine.execute_transfer(request).await
    }

    /// Move funds unless `cancelled` completes before the commit point.
    pub async fn execute_transfer_until<F>(
        &self,
        request: &TransferRequest,
        cancelled: F,
    ) -> Result<TransferReceipt>
    where
        F: Future<Output = ()>,
    {
        self.engine.execute_transfer_until(request, cancelled).await
    }

    /// Check the store answers.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<()> {
        self.accounts.store().ping().await.map_err(|e| {
            error!(error = %e, "Store health check failed");
            e
        })
    }
}
