//! Multi-currency handling and exchange rates.

pub mod exchange;
pub mod service;

#[cfg(test)]
mod props;

pub use exchange::{ExchangeRate, RateTable};
pub use service::CurrencyService;
