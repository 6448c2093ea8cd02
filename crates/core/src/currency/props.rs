//! Property-based tests for currency operations.
//!
//! - Property 1: Translation rounding precision
//! - Property 2: Sign preservation
//! - Property 3: Average rate bounds

use proptest::prelude::*;
use rust_decimal::Decimal;

use super::service::CurrencyService;

/// Signed amounts from -1,000,000.00 to 1,000,000.00.
fn signed_amount() -> impl Strategy<Value = Decimal> {
    (-100_000_000i64..100_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Positive rates from 0.0001 to 10000.0000.
fn positive_rate() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000i64).prop_map(|v| Decimal::new(v, 4))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property 1.1: Translated amounts never carry more than the requested precision.
    #[test]
    fn prop_convert_respects_precision(
        amount in signed_amount(),
        rate in positive_rate(),
        precision in 0u32..=6,
    ) {
        let result = CurrencyService::convert(amount, rate, precision);
        prop_assert!(result.scale() <= precision, "{} has scale {}", result, result.scale());
    }

    /// Property 1.2: Rounding error is at most half a unit of the last kept digit.
    #[test]
    fn prop_convert_error_bounded(
        amount in signed_amount(),
        rate in positive_rate(),
    ) {
        let exact = amount * rate;
        let rounded = CurrencyService::convert(amount, rate, 4);
        prop_assert!((exact - rounded).abs() <= Decimal::new(5, 5));
    }

    /// Property 2: A positive rate never flips a balance from debit to credit.
    #[test]
    fn prop_convert_preserves_sign(
        amount in signed_amount(),
        rate in positive_rate(),
    ) {
        let result = CurrencyService::convert(amount, rate, 4);
        if amount > Decimal::ZERO {
            prop_assert!(result >= Decimal::ZERO);
        } else {
            prop_assert!(result <= Decimal::ZERO);
        }
    }

    /// Property 3: An average rate lies between the smallest and largest rate.
    #[test]
    fn prop_average_rate_within_bounds(
        rates in prop::collection::vec(positive_rate(), 1..24),
    ) {
        let average = CurrencyService::average_rate(&rates).unwrap();
        let min = rates.iter().copied().min().unwrap();
        let max = rates.iter().copied().max().unwrap();
        prop_assert!(average >= CurrencyService::round(min, 8) && average <= max);
    }
}
