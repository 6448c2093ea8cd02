//! Ledger inputs to consolidation.
//!
//! - Chart of accounts shared across an organization's companies
//! - Companies and their functional currencies
//! - Per-company trial balances and signed balance maps

pub mod account;
pub mod balance;
pub mod company;

pub use account::{Account, AccountType, CashFlowCategory, NormalBalance, subtype};
pub use balance::{BalanceMap, CompanyTrialBalance, TrialBalanceLine};
pub use company::Company;
