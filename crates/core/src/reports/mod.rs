//! Consolidated financial statements.
//!
//! Statements are derived from the final trial balance of a completed
//! consolidation run:
//! - Balance Sheet
//! - Income Statement
//! - Cash Flow Statement
//! - Statement of Changes in Equity

pub mod cache;
pub mod error;
pub mod service;
pub mod types;

#[cfg(test)]
mod tests;

pub use cache::StatementCache;
pub use error::ReportError;
pub use service::{StatementInput, StatementService};
pub use types::*;
