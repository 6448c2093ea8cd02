//! Command and query surface of the consolidation subsystem.
//!
//! The service owns no state of its own: groups, rules and runs live behind
//! [`ConsolidationRepository`], and every call is scoped by a
//! [`TenantContext`].
//!
//! Audit policy: group, member and rule mutations persist first and audit
//! second. A failed audit write reverts the persisted change and fails with
//! [`ConsolidationError::AuditFailed`], so the log never records a change
//! that did not happen and no change goes unrecorded. Run status changes log
//! audit failures and carry on.

mod groups;
mod rules;
mod runs;
mod statements;


use std::sync::Arc;

use consolida_shared::config::ConsolidationConfig;
use consolida_shared::types::{AccountId, ConsolidationGroupId, ConsolidationRunId};
use serde::Serialize;
use tracing::{error, warn};

use super::error::ConsolidationError;
use super::group::ConsolidationGroup;
use super::repository::{
    AccountRepository, AuditEntity, AuditLogService, CompanyRepository, ConsolidationRepository,
    ExchangeRateRepository, RepositoryError, TenantContext,
};
use super::run::{ConsolidationRun, RunStatus};
use crate::reports::StatementCache;

/// Consolidation command/query service.
pub struct ConsolidationService {
    companies: Arc<dyn CompanyRepository>,
    accounts: Arc<dyn AccountRepository>,
    rates: Arc<dyn ExchangeRateRepository>,
    repository: Arc<dyn ConsolidationRepository>,
    audit: Arc<dyn AuditLogService>,
    config: ConsolidationConfig,
    statements: StatementCache,
}

impl ConsolidationService {
    /// Creates a service over the given collaborators.
    #[must_use]
    pub fn new(
        companies: Arc<dyn CompanyRepository>,
        accounts: Arc<dyn AccountRepository>,
        rates: Arc<dyn ExchangeRateRepository>,
        repository: Arc<dyn ConsolidationRepository>,
        audit: Arc<dyn AuditLogService>,
        config: ConsolidationConfig,
    ) -> Self {
        let statements =
            StatementCache::with_config(config.report_cache_capacity, config.report_cache_ttl_secs);
        Self {
            companies,
            accounts,
            rates,
            repository,
            audit,
            config,
            statements,
        }
    }

    async fn load_group(
        &self,
        ctx: &TenantContext,
        group_id: ConsolidationGroupId,
    ) -> Result<ConsolidationGroup, ConsolidationError> {
        self.repository
            .find_group(ctx.organization_id, group_id)
            .await?
            .ok_or(ConsolidationError::GroupNotFound(group_id))
    }

    async fn load_run(
        &self,
        ctx: &TenantContext,
        run_id: ConsolidationRunId,
    ) -> Result<ConsolidationRun, ConsolidationError> {
        self.repository
            .find_run(ctx.organization_id, run_id)
            .await?
            .ok_or(ConsolidationError::RunNotFound(run_id))
    }

    /// Persists a group and advances the local copy's version.
    async fn save_group(&self, group: &mut ConsolidationGroup) -> Result<(), ConsolidationError> {
        self.repository.update_group(group).await?;
        group.version += 1;
        Ok(())
    }

    /// Persists a changed group, then writes its audit record.
    ///
    /// If the audit write fails the stored group is put back to `previous`
    /// with a further versioned write, so stale copies stay rejected.
    async fn commit_group(
        &self,
        group: &mut ConsolidationGroup,
        previous: &ConsolidationGroup,
        audit: impl Future<Output = Result<(), RepositoryError>> + Send,
    ) -> Result<(), ConsolidationError> {
        self.save_group(group).await?;
        if let Err(e) = audit.await {
            let mut restored = previous.clone();
            restored.version = group.version;
            if let Err(revert) = self.repository.update_group(&restored).await {
                error!(
                    group_id = %group.id,
                    error = %revert,
                    "Failed to revert group change after audit failure"
                );
            }
            return Err(audit_failed(e));
        }
        Ok(())
    }

    /// Persists a run and advances the local copy's version.
    async fn save_run(&self, run: &mut ConsolidationRun) -> Result<(), ConsolidationError> {
        self.repository.update_run(run).await?;
        run.version += 1;
        Ok(())
    }

    /// Fails unless every account exists in the caller's organization.
    async fn ensure_accounts_exist(
        &self,
        ctx: &TenantContext,
        account_ids: impl IntoIterator<Item = AccountId>,
    ) -> Result<(), ConsolidationError> {
        for account_id in account_ids {
            if self
                .accounts
                .find_account(ctx.organization_id, account_id)
                .await?
                .is_none()
            {
                return Err(ConsolidationError::AccountNotFound(account_id));
            }
        }
        Ok(())
    }

    async fn audit_run_status(
        &self,
        ctx: &TenantContext,
        run: &ConsolidationRun,
        from: RunStatus,
    ) {
        if let Err(e) = self
            .audit
            .log_status_change(
                ctx,
                AuditEntity::ConsolidationRun,
                run.id.into_inner(),
                from.to_string(),
                run.status.to_string(),
            )
            .await
        {
            warn!(
                run_id = %run.id,
                from = %from,
                to = %run.status,
                error = %e,
                "Failed to audit run status change"
            );
        }
    }
}

fn audit_failed(err: RepositoryError) -> ConsolidationError {
    ConsolidationError::AuditFailed(err.to_string())
}

fn snapshot<T: Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or_default()
}
