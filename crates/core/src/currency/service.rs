//! Currency service for translation arithmetic.
//!
//! All translation rounding uses Banker's Rounding (MidpointNearestEven) so
//! that rounding differences do not drift in one direction across many lines.

use rust_decimal::prelude::*;
use rust_decimal::Decimal;

/// Decimal places kept on averaged rates.
const AVERAGE_RATE_PRECISION: u32 = 8;

/// Currency service for conversion operations.
pub struct CurrencyService;

impl CurrencyService {
    /// Translate an amount at a rate, rounding to `decimal_places` with Banker's Rounding.
    ///
    /// # Example
    ///
    /// ```
    /// use rust_decimal_macros::dec;
    /// use consolida_core::currency::CurrencyService;
    ///
    /// let result = CurrencyService::convert(dec!(100), dec!(1.23456789), 4);
    /// assert_eq!(result, dec!(123.4568));
    /// ```
    #[must_use]
    pub fn convert(amount: Decimal, rate: Decimal, decimal_places: u32) -> Decimal {
        Self::round(amount * rate, decimal_places)
    }

    /// Round a decimal value using Banker's Rounding.
    #[must_use]
    pub fn round(value: Decimal, decimal_places: u32) -> Decimal {
        value.round_dp_with_strategy(decimal_places, RoundingStrategy::MidpointNearestEven)
    }

    /// Arithmetic mean of a series of rates.
    ///
    /// Returns `None` for an empty series.
    #[must_use]
    pub fn average_rate(rates: &[Decimal]) -> Option<Decimal> {
        if rates.is_empty() {
            return None;
        }
        let sum: Decimal = rates.iter().sum();
        let count = Decimal::from(rates.len() as u64);
        Some(Self::round(sum / count, AVERAGE_RATE_PRECISION))
    }
}
