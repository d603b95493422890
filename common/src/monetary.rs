//! Monetary types for PairLedger.
//!
//! Every balance and transfer amount is an exact decimal. Amounts cross text
//! boundaries (JSON, logs) as decimal strings such as `"100.50"`, never as
//! numeric literals.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

use crate::LedgerError;

/// Fractional digits kept by the persisted balance column.
pub const BALANCE_SCALE: u32 = 5;

/// Total significant digits of the persisted balance column.
pub const BALANCE_PRECISION: u32 = 19;

/// An exact, signed decimal amount of money.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct Money(Decimal);

impl Money {
    /// Zero.
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Create from a decimal value.
    pub const fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Parse from a decimal string.
    ///
    /// Fails with [`LedgerError::MalformedAmount`] when the text is not a plain
    /// decimal or carries more precision than can be held exactly.
    pub fn parse(value: &str) -> Result<Self, LedgerError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(LedgerError::MalformedAmount(value.to_string()));
        }
        Decimal::from_str_exact(trimmed)
            .map(Self)
            .map_err(|_| LedgerError::MalformedAmount(value.to_string()))
    }

    /// The smallest amount the balance column can represent (`0.00001`).
    pub fn smallest_unit() -> Self {
        Self(Decimal::new(1, BALANCE_SCALE))
    }

    /// Get the underlying decimal.
    pub const fn value(&self) -> Decimal {
        self.0
    }

    /// Check if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Check if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Check if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Addition that reports overflow instead of panicking.
    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Self)
    }

    /// Subtraction that reports overflow instead of panicking.
    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Self)
    }

    /// Normalize to what a `NUMERIC(19, 5)` column would store.
    ///
    /// Rounds to [`BALANCE_SCALE`] fractional digits, midpoints away from
    /// zero, and returns `None` when the integer part does not fit.
    pub fn to_storage(&self) -> Option<Money> {
        let rounded = self
            .0
            .round_dp_with_strategy(BALANCE_SCALE, RoundingStrategy::MidpointAwayFromZero);
        let integer_digits = BALANCE_PRECISION - BALANCE_SCALE;
        let limit = Decimal::from(10_i64.pow(integer_digits));
        if rounded.abs() >= limit {
            return None;
        }
        Some(Self(rounded))
    }

    /// Check the amount fits a `NUMERIC(19, 5)` column exactly, with no
    /// rounding and no overflow.
    pub fn is_storable(&self) -> bool {
        self.to_storage() == Some(*self)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Money {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Money {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Money> for String {
    fn from(money: Money) -> Self {
        money.0.to_string()
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(Decimal::from(value))
    }
}

impl From<i32> for Money {
    fn from(value: i32) -> Self {
        Self(Decimal::from(value))
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, other: Money) -> Money {
        Money(self.0 + other.0)
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, other: Money) -> Money {
        Money(self.0 - other.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, other: Money) {
        self.0 += other.0;
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, other: Money) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |total, amount| total + amount)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |total, amount| total + *amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_operations() {
        let m1 = Money::parse("100.00").unwrap();
        let m2 = Money::parse("50.25").unwrap();

        assert_eq!((m1 + m2).value(), dec!(150.25));
        assert_eq!((m1 - m2).value(), dec!(49.75));
        assert_eq!((-m2).value(), dec!(-50.25));
        assert!(m2 < m1);
    }

    #[test]
    fn test_decimal_is_exact() {
        let sum = Money::parse("0.1").unwrap() + Money::parse("0.2").unwrap();
        assert_eq!(sum, Money::parse("0.3").unwrap());
    }

    #[test]
    fn test_equality_ignores_trailing_zeros() {
        assert_eq!(Money::parse("749.75").unwrap(), Money::parse("749.75000").unwrap());
    }

    #[test]
    fn test_sign_inspection() {
        assert!(Money::parse("0.00001").unwrap().is_positive());
        assert!(Money::parse("-3").unwrap().is_negative());
        assert!(Money::parse("0.000").unwrap().is_zero());
        assert!(!Money::ZERO.is_positive());
        assert!(!Money::ZERO.is_negative());
    }

    #[test]
    fn test_malformed_amounts() {
        for input in ["", "   ", "abc", "1.2.3", "1e5", "12,50", "NaN"] {
            assert!(
                matches!(Money::parse(input), Err(LedgerError::MalformedAmount(_))),
                "{input:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_serializes_as_string() {
        let money = Money::parse("100.50").unwrap();
        assert_eq!(serde_json::to_string(&money).unwrap(), "\"100.50\"");

        let parsed: Money = serde_json::from_str("\"250.25\"").unwrap();
        assert_eq!(parsed.value(), dec!(250.25));
    }

    #[test]
    fn test_rejects_numeric_json_literal() {
        assert!(serde_json::from_str::<Money>("100.5").is_err());
        assert!(serde_json::from_str::<Money>("\"ten\"").is_err());
    }

    #[test]
    fn test_to_storage_rounds_like_numeric_column() {
        let stored = Money::parse("1.123455").unwrap().to_storage().unwrap();
        assert_eq!(stored.value(), dec!(1.12346));

        let stored = Money::parse("-1.123455").unwrap().to_storage().unwrap();
        assert_eq!(stored.value(), dec!(-1.12346));

        let largest = Money::parse("99999999999999.99999").unwrap();
        assert_eq!(largest.to_storage(), Some(largest));

        assert!(Money::parse("100000000000000").unwrap().to_storage().is_none());
    }

    #[test]
    fn test_is_storable() {
        assert!(Money::parse("0.00001").unwrap().is_storable());
        assert!(Money::parse("1.500000").unwrap().is_storable());
        assert!(Money::parse("-99999999999999.99999").unwrap().is_storable());
        assert!(!Money::parse("0.000005").unwrap().is_storable());
        assert!(!Money::parse("100000000000000").unwrap().is_storable());
    }

    #[test]
    fn test_smallest_unit() {
        assert_eq!(Money::smallest_unit().value(), dec!(0.00001));
    }

    #[test]
    fn test_checked_arithmetic_overflow() {
        let max = Money::new(Decimal::MAX);
        assert!(max.checked_add(Money::from(1)).is_none());
        assert!((-max).checked_sub(Money::from(1)).is_none());
        assert_eq!(Money::from(2).checked_sub(Money::from(5)), Some(Money::from(-3)));
    }

    #[test]
    fn test_sum() {
        let amounts = [Money::from(1), Money::parse("2.5").unwrap(), Money::from(-1)];
        let total: Money = amounts.iter().sum();
        assert_eq!(total.value(), dec!(2.5));
    }

    proptest! {
        #[test]
        fn prop_debit_credit_cancel(
            balance in -1_000_000_000i64..1_000_000_000,
            cents in 0i64..100_000_000,
        ) {
            let balance = Money::new(Decimal::new(balance, 2));
            let amount = Money::new(Decimal::new(cents, 5));
            prop_assert_eq!(balance - amount + amount, balance);
        }

        #[test]
        fn prop_display_parses_back(units in any::<i64>(), scale in 0u32..10) {
            let money = Money::new(Decimal::new(units, scale));
            prop_assert_eq!(Money::parse(&money.to_string()).unwrap(), money);
        }
    }
}
