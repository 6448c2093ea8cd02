//! `SeaORM` entity definitions.

pub mod account_balances;
pub mod accounts;
pub mod audit_logs;
pub mod companies;
pub mod consolidation_groups;
pub mod consolidation_runs;
pub mod elimination_rules;
pub mod exchange_rates;
