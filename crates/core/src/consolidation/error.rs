//! Consolidation error types.

use consolida_shared::error::AppError;
use consolida_shared::types::{
    AccountId, CompanyId, ConsolidationGroupId, ConsolidationRunId, Currency, EliminationRuleId,
};
use rust_decimal::Decimal;
use thiserror::Error;

use super::repository::RepositoryError;
use super::run::{RunStatus, StepStatus, StepType};
use crate::reports::ReportError;

/// Errors that can occur during consolidation operations.
#[derive(Debug, Error)]
pub enum ConsolidationError {
    /// Consolidation group not found in the caller's organization.
    #[error("Consolidation group not found: {0}")]
    GroupNotFound(ConsolidationGroupId),

    /// Company is not a member of the group.
    #[error("Company {company_id} is not a member of group {group_id}")]
    MemberNotFound {
        /// The group.
        group_id: ConsolidationGroupId,
        /// The company.
        company_id: CompanyId,
    },

    /// Elimination rule not found.
    #[error("Elimination rule not found: {0}")]
    RuleNotFound(EliminationRuleId),

    /// Consolidation run not found.
    #[error("Consolidation run not found: {0}")]
    RunNotFound(ConsolidationRunId),

    /// Parent company does not exist in the organization.
    #[error("Parent company not found: {0}")]
    ParentCompanyNotFound(CompanyId),

    /// Member company does not exist in the organization.
    #[error("Company not found: {0}")]
    CompanyNotFound(CompanyId),

    /// Account referenced by a rule or trial balance does not exist.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// Company already belongs to the group.
    #[error("Company {0} is already a member of the group")]
    AlreadyMember(CompanyId),

    /// The parent cannot also be listed as a member.
    #[error("Parent company {0} cannot be a member of its own group")]
    ParentCannotBeMember(CompanyId),

    /// Company is inactive.
    #[error("Company {0} is inactive")]
    CompanyInactive(CompanyId),

    /// Group is inactive.
    #[error("Consolidation group {0} is inactive")]
    GroupInactive(ConsolidationGroupId),

    /// Ownership percentage outside 0..=100 or with more than two decimals.
    #[error("Invalid percentage: {0} (must be between 0 and 100 with at most 2 decimals)")]
    InvalidPercentage(Decimal),

    /// Invalid fiscal period reference.
    #[error("Invalid period {year}/{period}")]
    InvalidPeriod {
        /// Fiscal year.
        year: i32,
        /// Period number.
        period: u8,
    },

    /// Input failed validation.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A run already exists for the group and period.
    #[error("A consolidation run already exists for this group and period: {existing}")]
    RunAlreadyExists {
        /// The blocking run.
        existing: ConsolidationRunId,
    },

    /// The group has a run in progress.
    #[error("Consolidation group {0} has an active run")]
    GroupHasActiveRun(ConsolidationGroupId),

    /// The group has completed runs and cannot be deleted.
    #[error("Consolidation group {0} has completed runs")]
    HasCompletedRuns(ConsolidationGroupId),

    /// Rule produced entries in an existing run.
    #[error("Elimination rule {0} is referenced by existing runs")]
    RuleInUse(EliminationRuleId),

    /// Run cannot be cancelled from its current status.
    #[error("Cannot cancel run {run_id} in status {status}")]
    CannotCancel {
        /// The run.
        run_id: ConsolidationRunId,
        /// Its current status.
        status: RunStatus,
    },

    /// Run cannot be deleted from its current status.
    #[error("Cannot delete run {run_id} in status {status}")]
    CannotDelete {
        /// The run.
        run_id: ConsolidationRunId,
        /// Its current status.
        status: RunStatus,
    },

    /// Invalid run status transition.
    #[error("Invalid run transition from {from} to {to}")]
    InvalidRunTransition {
        /// Current status.
        from: RunStatus,
        /// Attempted status.
        to: RunStatus,
    },

    /// Step started out of order or twice.
    #[error("Step {step} cannot start from status {status}")]
    InvalidStepTransition {
        /// The step.
        step: StepType,
        /// Its current status.
        status: StepStatus,
    },

    /// Group settings lack an account needed by the run.
    #[error("No account configured for {purpose}")]
    AccountNotConfigured {
        /// What the account is used for.
        purpose: &'static str,
    },

    /// No exchange rate for a translation.
    #[error("Exchange rate not found: {from} -> {to}")]
    ExchangeRateNotFound {
        /// Source currency.
        from: Currency,
        /// Target currency.
        to: Currency,
    },

    /// A member's own trial balance does not balance.
    #[error("Trial balance for company {company_id} does not balance (residual {residual})")]
    CompanyTrialBalanceNotBalanced {
        /// The company.
        company_id: CompanyId,
        /// Debits minus credits.
        residual: Decimal,
    },

    /// The consolidated trial balance does not sum to zero.
    #[error("Consolidated trial balance does not balance (residual {residual})")]
    TrialBalanceNotBalanced {
        /// Debits minus credits.
        residual: Decimal,
    },

    /// Validation step found blocking issues.
    #[error("Consolidation validation failed: {errors} error(s), {warnings} warning(s)")]
    ValidationFailed {
        /// Number of errors.
        errors: usize,
        /// Number of warnings.
        warnings: usize,
    },

    /// The record changed since it was read.
    #[error("Record was modified concurrently")]
    ConcurrentModification,

    /// A required audit record could not be written.
    #[error("Audit log write failed: {0}")]
    AuditFailed(String),

    /// Statement generation failed.
    #[error(transparent)]
    Report(#[from] ReportError),

    /// Persistence failure.
    #[error("Repository error: {0}")]
    Repository(String),
}

impl ConsolidationError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::GroupNotFound(_) => "GROUP_NOT_FOUND",
            Self::MemberNotFound { .. } => "MEMBER_NOT_FOUND",
            Self::RuleNotFound(_) => "RULE_NOT_FOUND",
            Self::RunNotFound(_) => "RUN_NOT_FOUND",
            Self::ParentCompanyNotFound(_) => "PARENT_COMPANY_NOT_FOUND",
            Self::CompanyNotFound(_) => "COMPANY_NOT_FOUND",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::AlreadyMember(_) => "ALREADY_MEMBER",
            Self::ParentCannotBeMember(_) => "PARENT_CANNOT_BE_MEMBER",
            Self::CompanyInactive(_) => "COMPANY_INACTIVE",
            Self::GroupInactive(_) => "GROUP_INACTIVE",
            Self::InvalidPercentage(_) => "INVALID_PERCENTAGE",
            Self::InvalidPeriod { .. } => "INVALID_PERIOD",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::RunAlreadyExists { .. } => "RUN_ALREADY_EXISTS",
            Self::GroupHasActiveRun(_) => "GROUP_HAS_ACTIVE_RUN",
            Self::HasCompletedRuns(_) => "HAS_COMPLETED_RUNS",
            Self::RuleInUse(_) => "RULE_IN_USE",
            Self::CannotCancel { .. } => "CANNOT_CANCEL",
            Self::CannotDelete { .. } => "CANNOT_DELETE",
            Self::InvalidRunTransition { .. } => "INVALID_RUN_TRANSITION",
            Self::InvalidStepTransition { .. } => "INVALID_STEP_TRANSITION",
            Self::AccountNotConfigured { .. } => "ACCOUNT_NOT_CONFIGURED",
            Self::ExchangeRateNotFound { .. } => "EXCHANGE_RATE_NOT_FOUND",
            Self::CompanyTrialBalanceNotBalanced { .. } => "COMPANY_TRIAL_BALANCE_NOT_BALANCED",
            Self::TrialBalanceNotBalanced { .. } => "TRIAL_BALANCE_NOT_BALANCED",
            Self::ValidationFailed { .. } => "CONSOLIDATION_VALIDATION_FAILED",
            Self::ConcurrentModification => "CONCURRENT_MODIFICATION",
            Self::AuditFailed(_) => "AUDIT_FAILED",
            Self::Report(err) => err.error_code(),
            Self::Repository(_) => "REPOSITORY_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::GroupNotFound(_)
            | Self::MemberNotFound { .. }
            | Self::RuleNotFound(_)
            | Self::RunNotFound(_)
            | Self::ParentCompanyNotFound(_)
            | Self::CompanyNotFound(_)
            | Self::AccountNotFound(_) => 404,
            Self::InvalidPercentage(_) | Self::InvalidPeriod { .. } | Self::Validation(_) => 400,
            Self::AlreadyMember(_)
            | Self::RunAlreadyExists { .. }
            | Self::GroupHasActiveRun(_)
            | Self::HasCompletedRuns(_)
            | Self::RuleInUse(_)
            | Self::ConcurrentModification => 409,
            Self::Report(err) => err.http_status_code(),
            Self::AuditFailed(_) | Self::Repository(_) => 500,
            _ => 422,
        }
    }

    /// Infrastructure failures abort a run instead of being recorded on it.
    #[must_use]
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Self::Repository(_) | Self::ConcurrentModification | Self::AuditFailed(_)
        )
    }
}

impl From<RepositoryError> for ConsolidationError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::ConcurrentModification => Self::ConcurrentModification,
            other => Self::Repository(other.to_string()),
        }
    }
}

impl From<ConsolidationError> for AppError {
    fn from(err: ConsolidationError) -> Self {
        let code = err.error_code();
        let message = err.to_string();
        match err.http_status_code() {
            404 => Self::NotFound { code, message },
            400 => Self::Validation { code, message },
            409 => Self::Conflict { code, message },
            500 if matches!(err, ConsolidationError::Repository(_)) => Self::Database(message),
            500 => Self::Internal(message),
            _ => Self::BusinessRule { code, message },
        }
    }
}
