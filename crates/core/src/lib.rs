//! Core business logic for Consolida.
//!
//! This crate contains the consolidation domain with ZERO web or database
//! dependencies. Persistence is reached through the repository traits in
//! [`consolidation::repository`].
//!
//! # Modules
//!
//! - `ledger` - Accounts, companies and trial balances
//! - `currency` - Exchange rates and conversion
//! - `consolidation` - Groups, elimination rules, runs and the service
//! - `reports` - Consolidated financial statements

pub mod consolidation;
pub mod currency;
pub mod ledger;
pub mod reports;
