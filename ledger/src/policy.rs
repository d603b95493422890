//! Amount policy applied at the ledger boundary.

use pairledger_common::{LedgerError, Money, Result, BALANCE_PRECISION, BALANCE_SCALE};

/// Which amount signs the ledger accepts.
///
/// The storage layer itself accepts any sign. The default policy rejects
/// negative transfer amounts and negative opening balances; the permissive
/// policy lets a negative transfer run as a reverse transfer and lets
/// accounts open below zero.
///
/// Under either policy an amount must fit the balance column exactly.
/// Rounding each leg of a transfer on its own would break conservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmountPolicy {
    /// Execute negative transfer amounts as reverse transfers.
    pub allow_negative_transfers: bool,
    /// Accept accounts created with a negative balance.
    pub allow_negative_initial_balance: bool,
}

impl AmountPolicy {
    /// Reject negative transfer amounts and negative opening balances.
    pub const fn strict() -> Self {
        Self {
            allow_negative_transfers: false,
            allow_negative_initial_balance: false,
        }
    }

    /// Accept any sign.
    pub const fn permissive() -> Self {
        Self {
            allow_negative_transfers: true,
            allow_negative_initial_balance: true,
        }
    }

    /// Validate a transfer amount. Zero is always accepted.
    pub fn check_transfer_amount(&self, amount: Money) -> Result<()> {
        if amount.is_negative() && !self.allow_negative_transfers {
            return Err(LedgerError::invalid_amount(format!(
                "transfer amount must not be negative, got {amount}"
            )));
        }
        check_storable("transfer amount", amount)
    }

    /// Validate an opening balance.
    pub fn check_initial_balance(&self, balance: Money) -> Result<()> {
        if balance.is_negative() && !self.allow_negative_initial_balance {
            return Err(LedgerError::invalid_amount(format!(
                "initial balance cannot be negative, got {balance}"
            )));
        }
        check_storable("initial balance", balance)
    }
}

fn check_storable(what: &str, amount: Money) -> Result<()> {
    if amount.is_storable() {
        return Ok(());
    }
    Err(LedgerError::invalid_amount(format!(
        "{what} must have at most {} integer and {BALANCE_SCALE} fractional digits, got {amount}",
        BALANCE_PRECISION - BALANCE_SCALE,
    )))
}

impl Default for AmountPolicy {
    fn default() -> Self {
        Self::strict()
    }
}
