//! Exchange rate types and lookup.

use chrono::NaiveDate;
use consolida_shared::types::Currency;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::service::CurrencyService;

/// Exchange rate between two currencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRate {
    /// Source currency.
    pub from_currency: Currency,
    /// Target currency.
    pub to_currency: Currency,
    /// 1 from_currency = rate to_currency.
    pub rate: Decimal,
    /// Date this rate is effective.
    pub effective_date: NaiveDate,
}

impl ExchangeRate {
    /// Creates a new exchange rate.
    #[must_use]
    pub const fn new(
        from_currency: Currency,
        to_currency: Currency,
        rate: Decimal,
        effective_date: NaiveDate,
    ) -> Self {
        Self {
            from_currency,
            to_currency,
            rate,
            effective_date,
        }
    }

    /// Returns the inverse rate, or `None` for a zero rate.
    #[must_use]
    pub fn inverse(&self) -> Option<Self> {
        if self.rate.is_zero() {
            return None;
        }
        Some(Self {
            from_currency: self.to_currency,
            to_currency: self.from_currency,
            rate: Decimal::ONE / self.rate,
            effective_date: self.effective_date,
        })
    }

    /// The rate for `from -> to`, inverting if the pair is stored the other way round.
    fn oriented(&self, from: Currency, to: Currency) -> Option<Decimal> {
        if self.from_currency == from && self.to_currency == to {
            Some(self.rate)
        } else if self.from_currency == to && self.to_currency == from {
            self.inverse().map(|r| r.rate)
        } else {
            None
        }
    }
}

/// A set of rates with direct and inverse lookup.
#[derive(Debug, Clone, Default)]
pub struct RateTable {
    rates: Vec<ExchangeRate>,
}

impl RateTable {
    /// Creates a table from rates.
    #[must_use]
    pub fn new(rates: Vec<ExchangeRate>) -> Self {
        Self { rates }
    }

    /// Adds a rate.
    pub fn push(&mut self, rate: ExchangeRate) {
        self.rates.push(rate);
    }

    /// Latest rate effective on or before `date`.
    ///
    /// Direct quotes win over inverse quotes on the same date.
    #[must_use]
    pub fn closing(&self, from: Currency, to: Currency, date: NaiveDate) -> Option<Decimal> {
        if from == to {
            return Some(Decimal::ONE);
        }
        self.rates
            .iter()
            .filter(|r| r.effective_date <= date)
            .filter_map(|r| {
                let direct = r.from_currency == from;
                r.oriented(from, to).map(|rate| ((r.effective_date, direct), rate))
            })
            .max_by_key(|(key, _)| *key)
            .map(|(_, rate)| rate)
    }

    /// Mean of the rates effective within `start..=end`.
    #[must_use]
    pub fn average(
        &self,
        from: Currency,
        to: Currency,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Option<Decimal> {
        if from == to {
            return Some(Decimal::ONE);
        }
        let rates: Vec<Decimal> = self
            .rates
            .iter()
            .filter(|r| r.effective_date >= start && r.effective_date <= end)
            .filter_map(|r| r.oriented(from, to))
            .collect();
        CurrencyService::average_rate(&rates)
    }
}
