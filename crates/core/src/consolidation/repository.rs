//! Collaborator seams for the consolidation service.
//!
//! Implementations live in the database crate; in-memory versions for tests
//! and embedding live in [`super::memory`].

use async_trait::async_trait;
use chrono::NaiveDate;
use consolida_shared::types::{
    AccountId, CompanyId, ConsolidationGroupId, ConsolidationRunId, Currency, EliminationRuleId,
    OrganizationId, UserId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::group::{ConsolidationGroup, GroupFilter};
use super::rules::EliminationRule;
use super::run::{ConsolidationRun, FiscalPeriodRef, RunFilter};
use crate::ledger::{Account, Company, CompanyTrialBalance};

/// Errors raised by repository implementations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The stored version differs from the expected one.
    #[error("Record was modified concurrently")]
    ConcurrentModification,

    /// A uniqueness constraint was violated.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The stored data could not be decoded.
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// Underlying storage failure.
    #[error("Database error: {0}")]
    Database(String),
}

/// Caller identity threaded through every operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContext {
    /// Organization whose data is visible.
    pub organization_id: OrganizationId,
    /// Acting user.
    pub user_id: UserId,
}

impl TenantContext {
    /// Creates a context.
    #[must_use]
    pub const fn new(organization_id: OrganizationId, user_id: UserId) -> Self {
        Self {
            organization_id,
            user_id,
        }
    }
}

/// Company registry and per-company balances.
#[async_trait]
pub trait CompanyRepository: Send + Sync {
    /// Finds a company within an organization.
    async fn find_company(
        &self,
        organization_id: OrganizationId,
        company_id: CompanyId,
    ) -> Result<Option<Company>, RepositoryError>;

    /// Cumulative trial balance of a company up to and including `as_of`.
    async fn trial_balance(
        &self,
        organization_id: OrganizationId,
        company_id: CompanyId,
        as_of: NaiveDate,
    ) -> Result<CompanyTrialBalance, RepositoryError>;
}

/// Organization chart of accounts.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// All accounts of an organization.
    async fn list_accounts(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<Account>, RepositoryError>;

    /// Finds one account.
    async fn find_account(
        &self,
        organization_id: OrganizationId,
        account_id: AccountId,
    ) -> Result<Option<Account>, RepositoryError>;
}

/// Exchange rate source.
#[async_trait]
pub trait ExchangeRateRepository: Send + Sync {
    /// Latest rate effective on or before `date`.
    async fn closing_rate(
        &self,
        organization_id: OrganizationId,
        from: Currency,
        to: Currency,
        date: NaiveDate,
    ) -> Result<Option<Decimal>, RepositoryError>;

    /// Mean of rates effective within `start..=end`.
    async fn average_rate(
        &self,
        organization_id: OrganizationId,
        from: Currency,
        to: Currency,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<Decimal>, RepositoryError>;
}

/// Outcome of an atomic run insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunInsertOutcome {
    /// The run was stored.
    Inserted,
    /// Another run blocks the period.
    Blocked(ConsolidationRunId),
}

/// Persistence of groups, rules and runs.
///
/// Every lookup is scoped to an organization; records of other
/// organizations are invisible.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConsolidationRepository: Send + Sync {
    /// Stores a new group.
    async fn insert_group(&self, group: &ConsolidationGroup) -> Result<(), RepositoryError>;

    /// Replaces a group if its stored version equals `group.version`, then
    /// bumps the stored version.
    async fn update_group(&self, group: &ConsolidationGroup) -> Result<(), RepositoryError>;

    /// Removes a group together with its rules.
    async fn delete_group(
        &self,
        organization_id: OrganizationId,
        group_id: ConsolidationGroupId,
    ) -> Result<(), RepositoryError>;

    /// Finds a group.
    async fn find_group(
        &self,
        organization_id: OrganizationId,
        group_id: ConsolidationGroupId,
    ) -> Result<Option<ConsolidationGroup>, RepositoryError>;

    /// Lists groups ordered by name.
    async fn list_groups(
        &self,
        organization_id: OrganizationId,
        filter: &GroupFilter,
    ) -> Result<Vec<ConsolidationGroup>, RepositoryError>;

    /// Stores rules all-or-nothing.
    async fn insert_rules(&self, rules: &[EliminationRule]) -> Result<(), RepositoryError>;

    /// Replaces a rule.
    async fn update_rule(&self, rule: &EliminationRule) -> Result<(), RepositoryError>;

    /// Finds a rule.
    async fn find_rule(
        &self,
        organization_id: OrganizationId,
        rule_id: EliminationRuleId,
    ) -> Result<Option<EliminationRule>, RepositoryError>;

    /// Lists a group's rules ordered by priority.
    async fn list_rules(
        &self,
        organization_id: OrganizationId,
        group_id: ConsolidationGroupId,
    ) -> Result<Vec<EliminationRule>, RepositoryError>;

    /// Deletes a rule.
    async fn delete_rule(
        &self,
        organization_id: OrganizationId,
        rule_id: EliminationRuleId,
    ) -> Result<(), RepositoryError>;

    /// Returns true if any run of the organization posted an entry from the rule.
    async fn rule_has_entries(
        &self,
        organization_id: OrganizationId,
        rule_id: EliminationRuleId,
    ) -> Result<bool, RepositoryError>;

    /// Atomically checks for a blocking run of the same group and period, then inserts.
    ///
    /// With `force` set, only Pending and InProgress runs block.
    async fn insert_run(
        &self,
        run: &ConsolidationRun,
        force: bool,
    ) -> Result<RunInsertOutcome, RepositoryError>;

    /// Replaces a run if its stored version equals `run.version`, then bumps the stored version.
    async fn update_run(&self, run: &ConsolidationRun) -> Result<(), RepositoryError>;

    /// Finds a run.
    async fn find_run(
        &self,
        organization_id: OrganizationId,
        run_id: ConsolidationRunId,
    ) -> Result<Option<ConsolidationRun>, RepositoryError>;

    /// Lists runs, newest first.
    async fn list_runs(
        &self,
        organization_id: OrganizationId,
        filter: &RunFilter,
    ) -> Result<Vec<ConsolidationRun>, RepositoryError>;

    /// Most recent completed run of a group for a period, or of any period if none is given.
    async fn latest_completed_run(
        &self,
        organization_id: OrganizationId,
        group_id: ConsolidationGroupId,
        period: Option<FiscalPeriodRef>,
    ) -> Result<Option<ConsolidationRun>, RepositoryError>;

    /// Deletes a run.
    async fn delete_run(
        &self,
        organization_id: OrganizationId,
        run_id: ConsolidationRunId,
    ) -> Result<(), RepositoryError>;
}

/// Audited entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEntity {
    /// Consolidation group.
    ConsolidationGroup,
    /// Group membership.
    ConsolidationMember,
    /// Elimination rule.
    EliminationRule,
    /// Consolidation run.
    ConsolidationRun,
}

impl AuditEntity {
    /// Returns the snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConsolidationGroup => "consolidation_group",
            Self::ConsolidationMember => "consolidation_member",
            Self::EliminationRule => "elimination_rule",
            Self::ConsolidationRun => "consolidation_run",
        }
    }
}

/// Audit trail sink.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditLogService: Send + Sync {
    /// Records a creation.
    async fn log_create(
        &self,
        ctx: &TenantContext,
        entity: AuditEntity,
        entity_id: uuid::Uuid,
        snapshot: serde_json::Value,
    ) -> Result<(), RepositoryError>;

    /// Records a modification.
    async fn log_update(
        &self,
        ctx: &TenantContext,
        entity: AuditEntity,
        entity_id: uuid::Uuid,
        before: serde_json::Value,
        after: serde_json::Value,
    ) -> Result<(), RepositoryError>;

    /// Records a status change.
    async fn log_status_change(
        &self,
        ctx: &TenantContext,
        entity: AuditEntity,
        entity_id: uuid::Uuid,
        from: String,
        to: String,
    ) -> Result<(), RepositoryError>;

    /// Records a deletion.
    async fn log_delete(
        &self,
        ctx: &TenantContext,
        entity: AuditEntity,
        entity_id: uuid::Uuid,
    ) -> Result<(), RepositoryError>;
}
