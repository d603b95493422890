//! Atomic two-account transfer engine.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use pairledger_common::{AccountId, LedgerError, Money, Result, TransferRequest};

use crate::account::AccountRepository;
use crate::journal::PostingPair;
use crate::policy::AmountPolicy;
use crate::transaction::TransactionScope;

/// Lifecycle of a single transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferPhase {
    /// Transaction opened.
    Started,
    /// Both rows locked (or found missing).
    Locked,
    /// Existence and funds checked under the locks.
    Validated,
    /// Debit and credit written inside the transaction.
    Applied,
    /// Commit succeeded.
    Committed,
    /// Rolled back; nothing is visible.
    Aborted,
}

impl TransferPhase {
    /// Check if this is a final state.
    pub fn is_final(&self) -> bool {
        matches!(self, TransferPhase::Committed | TransferPhase::Aborted)
    }

    /// Get valid next states from current state.
    pub fn valid_transitions(&self) -> &[TransferPhase] {
        match self {
            TransferPhase::Started => &[TransferPhase::Locked, TransferPhase::Aborted],
            TransferPhase::Locked => &[TransferPhase::Validated, TransferPhase::Aborted],
            TransferPhase::Validated => &[TransferPhase::Applied, TransferPhase::Aborted],
            TransferPhase::Applied => &[TransferPhase::Committed, TransferPhase::Aborted],
            TransferPhase::Committed => &[],
            TransferPhase::Aborted => &[],
        }
    }

    /// Check if transition to given state is valid.
    pub fn can_transition_to(&self, next: TransferPhase) -> bool {
        self.valid_transitions().contains(&next)
    }

    fn advance(&mut self, next: TransferPhase) {
        debug_assert!(
            self.can_transition_to(next),
            "invalid transfer transition {self:?} -> {next:?}"
        );
        debug!(from = ?self, to = ?next, "Transfer phase");
        *self = next;
    }
}

/// Outcome of a committed transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub source_account_id: AccountId,
    pub destination_account_id: AccountId,
    pub amount: Money,
    /// Source balance right after commit.
    pub source_balance: Money,
    /// Destination balance right after commit.
    pub destination_balance: Money,
}

/// Moves money between two accounts atomically.
///
/// Each transfer runs in its own store transaction: lock both rows in
/// ascending id order, check existence and funds against the locked
/// balances, write the debit and the credit, commit. Any failure before the
/// commit rolls the transaction back.
#[derive(Clone)]
pub struct TransferEngine {
    accounts: AccountRepository,
    policy: AmountPolicy,
    timeout: Option<Duration>,
}

impl TransferEngine {
    /// Create a new engine with no transfer timeout.
    pub fn new(accounts: AccountRepository, policy: AmountPolicy) -> Self {
        Self {
            accounts,
            policy,
            timeout: None,
        }
    }

    /// Bound every [`execute_transfer`](Self::execute_transfer) call.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The amount policy in force.
    pub fn policy(&self) -> AmountPolicy {
        self.policy
    }

    /// Execute a transfer, giving up with [`LedgerError::Cancelled`] if the
    /// configured timeout elapses before the commit point.
    pub async fn execute_transfer(&self, request: &TransferRequest) -> Result<TransferReceipt> {
        match self.timeout {
            Some(limit) => {
                self.execute_transfer_until(request, tokio::time::sleep(limit))
                    .await
            }
            None => {
                self.execute_transfer_until(request, std::future::pending::<()>())
                    .await
            }
        }
    }

    /// Execute a transfer that aborts if `cancelled` completes first.
    ///
    /// The signal is only observed up to the commit point. Once the commit
    /// has been issued the transfer finishes regardless of the signal.
    #[instrument(
        skip(self, request, cancelled),
        fields(
            source = %request.source_account_id,
            destination = %request.destination_account_id,
            amount = %request.amount,
        )
    )]
    pub async fn execute_transfer_until<F>(
        &self,
        request: &TransferRequest,
        cancelled: F,
    ) -> Result<TransferReceipt>
    where
        F: Future<Output = ()>,
    {
        self.policy.check_transfer_amount(request.amount)?;

        let mut phase = TransferPhase::Started;
        tokio::pin!(cancelled);

        let prepared = tokio::select! {
            biased;
            prepared = self.prepare(request, &mut phase) => prepared,
            () = &mut cancelled => Err(LedgerError::Cancelled),
        };

        let (mut scope, receipt) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                abort(&mut phase, &e);
                return Err(e);
            }
        };

        if let Err(e) = scope.commit().await {
            abort(&mut phase, &e);
            return Err(e);
        }
        phase.advance(TransferPhase::Committed);

        info!(
            source_balance = %receipt.source_balance,
            destination_balance = %receipt.destination_balance,
            "Transfer committed"
        );
        Ok(receipt)
    }

    /// Open the transaction and run everything up to the commit point.
    ///
    /// On error the transaction is rolled back before returning.
    async fn prepare(
        &self,
        request: &TransferRequest,
        phase: &mut TransferPhase,
    ) -> Result<(TransactionScope, TransferReceipt)> {
        let mut scope = TransactionScope::begin(self.accounts.store()).await?;

        match self.lock_validate_apply(&mut scope, request, phase).await {
            Ok(receipt) => Ok((scope, receipt)),
            Err(e) => {
                if let Err(rollback_error) = scope.rollback().await {
                    warn!(error = %rollback_error, "Rollback failed, connection discarded");
                }
                Err(e)
            }
        }
    }

    async fn lock_validate_apply(
        &self,
        scope: &mut TransactionScope,
        request: &TransferRequest,
        phase: &mut TransferPhase,
    ) -> Result<TransferReceipt> {
        let source_id = request.source_account_id;
        let destination_id = request.destination_account_id;

        let locked = self
            .accounts
            .get_for_update(scope, [source_id, destination_id])
            .await?;
        phase.advance(TransferPhase::Locked);

        let source = locked.iter().find(|account| account.id == source_id);
        let destination = locked.iter().find(|account| account.id == destination_id);
        let (Some(source), Some(destination)) = (source, destination) else {
            return Err(LedgerError::AccountNotFound);
        };

        if !source.has_sufficient_funds(request.amount) {
            return Err(LedgerError::InsufficientFunds {
                required: request.amount,
                available: source.balance,
            });
        }
        phase.advance(TransferPhase::Validated);

        let postings = PostingPair::for_transfer(request);
        debug_assert!(postings.is_balanced());

        let tx = scope.transaction()?;
        for posting in postings.postings() {
            tx.apply_delta(posting.account_id, posting.delta()).await?;
        }
        phase.advance(TransferPhase::Applied);

        Ok(TransferReceipt {
            source_account_id: source_id,
            destination_account_id: destination_id,
            amount: request.amount,
            source_balance: source.balance + postings.net_change(source_id),
            destination_balance: destination.balance + postings.net_change(destination_id),
        })
    }
}

/// Move `phase` to [`TransferPhase::Aborted`], logging the phase reached.
fn abort(phase: &mut TransferPhase, error: &LedgerError) {
    let reached = *phase;
    phase.advance(TransferPhase::Aborted);

    match error {
        LedgerError::StoreFailure(_) | LedgerError::Cancelled => {
            warn!(from = ?reached, error = %error, "Transfer aborted");
        }
        _ => {
            info!(from = ?reached, error = %error, "Transfer rejected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_transitions() {
        use TransferPhase::*;

        let happy_path = [Started, Locked, Validated, Applied, Committed];
        for pair in happy_path.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "{:?} -> {:?}",
                pair[0],
                pair[1]
            );
        }

        for phase in [Started, Locked, Validated, Applied] {
            assert!(phase.can_transition_to(Aborted));
            assert!(!phase.is_final());
        }

        assert!(Committed.is_final());
        assert!(Aborted.is_final());
        assert!(!Committed.can_transition_to(Aborted));
        assert!(!Started.can_transition_to(Applied));
        assert!(!Locked.can_transition_to(Committed));
    }

    #[test]
    fn test_advance_moves_phase() {
        let mut phase = TransferPhase::Started;
        phase.advance(TransferPhase::Locked);
        assert_eq!(phase, TransferPhase::Locked);
    }

    #[test]
    fn test_abort_ends_in_aborted_from_any_open_phase() {
        use TransferPhase::*;

        for reached in [Started, Locked, Validated, Applied] {
            let mut phase = reached;
            abort(&mut phase, &LedgerError::Cancelled);
            assert_eq!(phase, Aborted);
            assert!(phase.is_final());
        }

        let mut phase = Locked;
        abort(&mut phase, &LedgerError::AccountNotFound);
        assert_eq!(phase, Aborted);
    }
}
