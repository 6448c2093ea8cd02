//! Money type with decimal precision and currency.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! This type wraps `rust_decimal::Decimal` for arbitrary precision.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Represents a monetary amount with currency.
///
/// Uses `Decimal` internally to avoid floating-point precision errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// The amount in major currency units (e.g., dollars, not cents).
    pub amount: Decimal,
    /// ISO 4217 currency code (e.g., "USD", "EUR").
    pub currency: Currency,
}

/// Errors raised by money arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    /// Arithmetic across two currencies.
    #[error("Currency mismatch: {left} vs {right}")]
    CurrencyMismatch {
        /// Left operand currency.
        left: Currency,
        /// Right operand currency.
        right: Currency,
    },

    /// Decimal overflow.
    #[error("Arithmetic overflow")]
    Overflow,
}

/// ISO 4217 currency codes supported by the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// US Dollar
    Usd,
    /// Euro
    Eur,
    /// British Pound
    Gbp,
    /// Swiss Franc
    Chf,
    /// Canadian Dollar
    Cad,
    /// Australian Dollar
    Aud,
    /// Singapore Dollar
    Sgd,
    /// Indonesian Rupiah
    Idr,
    /// Japanese Yen
    Jpy,
    /// Chinese Yuan
    Cny,
}

impl Currency {
    /// Number of minor-unit decimal places (ISO 4217 exponent).
    #[must_use]
    pub const fn minor_units(self) -> u32 {
        match self {
            Self::Jpy => 0,
            _ => 2,
        }
    }

    /// Returns the ISO code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Usd => "USD",
            Self::Eur => "EUR",
            Self::Gbp => "GBP",
            Self::Chf => "CHF",
            Self::Cad => "CAD",
            Self::Aud => "AUD",
            Self::Sgd => "SGD",
            Self::Idr => "IDR",
            Self::Jpy => "JPY",
            Self::Cny => "CNY",
        }
    }

    /// Rounds an amount to this currency's minor units (half away from zero).
    #[must_use]
    pub fn round_to_minor(self, amount: Decimal) -> Decimal {
        amount.round_dp_with_strategy(self.minor_units(), RoundingStrategy::MidpointAwayFromZero)
    }

    /// Returns true if the amount is zero once rounded to minor units.
    #[must_use]
    pub fn is_negligible(self, amount: Decimal) -> bool {
        self.round_to_minor(amount).is_zero()
    }
}

impl Money {
    /// Creates a new Money instance.
    #[must_use]
    pub const fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }

    /// Creates a zero amount in the specified currency.
    #[must_use]
    pub fn zero(currency: Currency) -> Self {
        Self {
            amount: Decimal::ZERO,
            currency,
        }
    }

    /// Returns true if the amount is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Returns true if the amount is negative.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }

    /// Adds two amounts of the same currency.
    pub fn checked_add(self, other: Self) -> Result<Self, MoneyError> {
        self.ensure_same_currency(other)?;
        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or(MoneyError::Overflow)?;
        Ok(Self::new(amount, self.currency))
    }

    /// Subtracts an amount of the same currency.
    pub fn checked_sub(self, other: Self) -> Result<Self, MoneyError> {
        self.ensure_same_currency(other)?;
        let amount = self
            .amount
            .checked_sub(other.amount)
            .ok_or(MoneyError::Overflow)?;
        Ok(Self::new(amount, self.currency))
    }

    /// Multiplies the amount by a unitless factor (ratio or exchange rate).
    pub fn checked_scale(self, factor: Decimal) -> Result<Self, MoneyError> {
        let amount = self
            .amount
            .checked_mul(factor)
            .ok_or(MoneyError::Overflow)?;
        Ok(Self::new(amount, self.currency))
    }

    /// Returns the amount with its sign flipped.
    #[must_use]
    pub fn negate(self) -> Self {
        Self::new(-self.amount, self.currency)
    }

    /// Returns the absolute amount.
    #[must_use]
    pub fn abs(self) -> Self {
        Self::new(self.amount.abs(), self.currency)
    }

    /// Rounds to the currency's minor units.
    #[must_use]
    pub fn round_to_minor(self) -> Self {
        Self::new(self.currency.round_to_minor(self.amount), self.currency)
    }

    fn ensure_same_currency(self, other: Self) -> Result<(), MoneyError> {
        if self.currency == other.currency {
            Ok(())
        } else {
            Err(MoneyError::CurrencyMismatch {
                left: self.currency,
                right: other.currency,
            })
        }
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "USD" => Ok(Self::Usd),
            "EUR" => Ok(Self::Eur),
            "GBP" => Ok(Self::Gbp),
            "CHF" => Ok(Self::Chf),
            "CAD" => Ok(Self::Cad),
            "AUD" => Ok(Self::Aud),
            "SGD" => Ok(Self::Sgd),
            "IDR" => Ok(Self::Idr),
            "JPY" => Ok(Self::Jpy),
            "CNY" => Ok(Self::Cny),
            _ => Err(format!("Unknown currency: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use std::str::FromStr;

    #[test]
    fn test_money_zero() {
        let money = Money::zero(Currency::Idr);
        assert!(money.is_zero());
        assert!(!money.is_negative());
        assert_eq!(money.currency, Currency::Idr);
    }

    #[test]
    fn test_checked_add_same_currency() {
        let a = Money::new(dec!(100.25), Currency::Usd);
        let b = Money::new(dec!(-0.25), Currency::Usd);
        assert_eq!(a.checked_add(b).unwrap(), Money::new(dec!(100.00), Currency::Usd));
    }

    #[test]
    fn test_checked_add_currency_mismatch() {
        let a = Money::new(dec!(1), Currency::Usd);
        let b = Money::new(dec!(1), Currency::Eur);
        assert_eq!(
            a.checked_add(b),
            Err(MoneyError::CurrencyMismatch {
                left: Currency::Usd,
                right: Currency::Eur,
            })
        );
        assert!(a.checked_sub(b).is_err());
    }

    #[test]
    fn test_scale_preserves_precision() {
        let money = Money::new(dec!(1000.00), Currency::Usd);
        let scaled = money.checked_scale(dec!(0.3333)).unwrap();
        assert_eq!(scaled.amount, dec!(333.300000));
    }

    #[test]
    fn test_negate_and_abs() {
        let money = Money::new(dec!(-42.10), Currency::Gbp);
        assert!(money.is_negative());
        assert_eq!(money.negate().amount, dec!(42.10));
        assert_eq!(money.abs().amount, dec!(42.10));
    }

    #[rstest]
    #[case(Currency::Usd, dec!(10.005), dec!(10.01))]
    #[case(Currency::Usd, dec!(-10.005), dec!(-10.01))]
    #[case(Currency::Jpy, dec!(1500.5), dec!(1501))]
    #[case(Currency::Eur, dec!(0.004), dec!(0.00))]
    fn test_round_to_minor(
        #[case] currency: Currency,
        #[case] input: Decimal,
        #[case] expected: Decimal,
    ) {
        assert_eq!(currency.round_to_minor(input), expected);
    }

    #[test]
    fn test_is_negligible() {
        assert!(Currency::Usd.is_negligible(dec!(0.0049)));
        assert!(!Currency::Usd.is_negligible(dec!(0.01)));
        assert!(!Currency::Usd.is_negligible(dec!(1)));
    }

    #[test]
    fn test_currency_from_str_round_trip() {
        for code in ["USD", "EUR", "GBP", "CHF", "CAD", "AUD", "SGD", "IDR", "JPY", "CNY"] {
            let currency = Currency::from_str(code).unwrap();
            assert_eq!(currency.to_string(), code);
        }
        assert_eq!(Currency::from_str("usd").unwrap(), Currency::Usd);
        assert!(Currency::from_str("XXX").is_err());
        assert!(Currency::from_str("").is_err());
    }
}
