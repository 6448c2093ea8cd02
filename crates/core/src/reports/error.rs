//! Report error types.

use consolida_shared::types::{AccountId, ConsolidationRunId};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::consolidation::run::RunStatus;

/// Errors that can occur during statement generation.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Statements are only generated from completed runs.
    #[error("Run {run_id} is not completed (status {status})")]
    RunNotCompleted {
        /// The run.
        run_id: ConsolidationRunId,
        /// Its status.
        status: RunStatus,
    },

    /// The run has no consolidated trial balance.
    #[error("Run {0} has no consolidated trial balance")]
    NoTrialBalance(ConsolidationRunId),

    /// Assets differ from liabilities plus equity.
    #[error(
        "Consolidated balance sheet does not balance: assets {assets}, liabilities and equity {liabilities_and_equity}"
    )]
    BalanceSheetNotBalanced {
        /// Total assets.
        assets: Decimal,
        /// Total liabilities plus equity.
        liabilities_and_equity: Decimal,
        /// Assets minus liabilities and equity.
        difference: Decimal,
    },

    /// Trial balance references an account missing from the chart.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),
}

impl ReportError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::RunNotCompleted { .. } => "RUN_NOT_COMPLETED",
            Self::NoTrialBalance(_) => "NO_TRIAL_BALANCE",
            Self::BalanceSheetNotBalanced { .. } => "BALANCE_SHEET_NOT_BALANCED",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::AccountNotFound(_) => 404,
            Self::RunNotCompleted { .. } | Self::NoTrialBalance(_) => 409,
            Self::BalanceSheetNotBalanced { .. } => 422,
        }
    }
}
