//! In-memory repository implementations.
//!
//! Used by the service tests and by callers that embed the engine without a
//! database. All state sits behind a tokio `RwLock`, so run insertion checks
//! and inserts under one write guard.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use consolida_shared::types::{
    AccountId, CompanyId, ConsolidationGroupId, ConsolidationRunId, Currency, EliminationRuleId,
    OrganizationId, UserId,
};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use super::group::{ConsolidationGroup, GroupFilter};
use super::repository::{
    AccountRepository, AuditEntity, AuditLogService, CompanyRepository, ConsolidationRepository,
    ExchangeRateRepository, RepositoryError, RunInsertOutcome, TenantContext,
};
use super::rules::EliminationRule;
use super::run::{ConsolidationRun, FiscalPeriodRef, RunFilter, RunStatus};
use crate::currency::{ExchangeRate, RateTable};
use crate::ledger::{Account, Company, CompanyTrialBalance, TrialBalanceLine};

/// Companies and their trial balances.
#[derive(Default)]
pub struct InMemoryCompanyRepository {
    companies: RwLock<HashMap<CompanyId, Company>>,
    balances: RwLock<HashMap<CompanyId, Vec<(NaiveDate, CompanyTrialBalance)>>>,
}

impl InMemoryCompanyRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a company.
    pub async fn add_company(&self, company: Company) {
        self.companies.write().await.insert(company.id, company);
    }

    /// Registers a trial balance snapshot; lookups use the latest snapshot on or before the date.
    pub async fn add_trial_balance(&self, trial_balance: CompanyTrialBalance) {
        let mut balances = self.balances.write().await;
        let snapshots = balances.entry(trial_balance.company_id).or_default();
        snapshots.push((trial_balance.as_of, trial_balance));
        snapshots.sort_by_key(|(date, _)| *date);
    }
}

#[async_trait]
impl CompanyRepository for InMemoryCompanyRepository {
    async fn find_company(
        &self,
        organization_id: OrganizationId,
        company_id: CompanyId,
    ) -> Result<Option<Company>, RepositoryError> {
        Ok(self
            .companies
            .read()
            .await
            .get(&company_id)
            .filter(|c| c.organization_id == organization_id)
            .cloned())
    }

    async fn trial_balance(
        &self,
        organization_id: OrganizationId,
        company_id: CompanyId,
        as_of: NaiveDate,
    ) -> Result<CompanyTrialBalance, RepositoryError> {
        let company = self
            .find_company(organization_id, company_id)
            .await?
            .ok_or_else(|| RepositoryError::Database(format!("unknown company {company_id}")))?;

        let balances = self.balances.read().await;
        let snapshot = balances
            .get(&company_id)
            .and_then(|snapshots| snapshots.iter().rev().find(|(date, _)| *date <= as_of))
            .map(|(_, tb)| tb.clone());

        Ok(snapshot.map_or_else(
            || CompanyTrialBalance {
                company_id,
                currency: company.functional_currency,
                as_of,
                lines: Vec::<TrialBalanceLine>::new(),
            },
            |mut tb| {
                tb.as_of = as_of;
                tb
            },
        ))
    }
}

/// Chart of accounts.
#[derive(Default)]
pub struct InMemoryAccountRepository {
    accounts: RwLock<HashMap<AccountId, Account>>,
}

impl InMemoryAccountRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an account.
    pub async fn add_account(&self, account: Account) {
        self.accounts.write().await.insert(account.id, account);
    }
}

#[async_trait]
impl AccountRepository for InMemoryAccountRepository {
    async fn list_accounts(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<Account>, RepositoryError> {
        let mut accounts: Vec<Account> = self
            .accounts
            .read()
            .await
            .values()
            .filter(|a| a.organization_id == organization_id)
            .cloned()
            .collect();
        accounts.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(accounts)
    }

    async fn find_account(
        &self,
        organization_id: OrganizationId,
        account_id: AccountId,
    ) -> Result<Option<Account>, RepositoryError> {
        Ok(self
            .accounts
            .read()
            .await
            .get(&account_id)
            .filter(|a| a.organization_id == organization_id)
            .cloned())
    }
}

/// Exchange rates, shared by all organizations.
#[derive(Default)]
pub struct InMemoryExchangeRateRepository {
    table: RwLock<RateTable>,
}

impl InMemoryExchangeRateRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a rate.
    pub async fn add_rate(&self, rate: ExchangeRate) {
        self.table.write().await.push(rate);
    }
}

#[async_trait]
impl ExchangeRateRepository for InMemoryExchangeRateRepository {
    async fn closing_rate(
        &self,
        _organization_id: OrganizationId,
        from: Currency,
        to: Currency,
        date: NaiveDate,
    ) -> Result<Option<Decimal>, RepositoryError> {
        Ok(self.table.read().await.closing(from, to, date))
    }

    async fn average_rate(
        &self,
        _organization_id: OrganizationId,
        from: Currency,
        to: Currency,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<Decimal>, RepositoryError> {
        Ok(self.table.read().await.average(from, to, start, end))
    }
}

#[derive(Default)]
struct ConsolidationState {
    groups: HashMap<ConsolidationGroupId, ConsolidationGroup>,
    rules: HashMap<EliminationRuleId, EliminationRule>,
    runs: HashMap<ConsolidationRunId, ConsolidationRun>,
}

/// Groups, rules and runs.
#[derive(Default)]
pub struct InMemoryConsolidationRepository {
    state: RwLock<ConsolidationState>,
}

impl InMemoryConsolidationRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConsolidationRepository for InMemoryConsolidationRepository {
    async fn insert_group(&self, group: &ConsolidationGroup) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if state.groups.contains_key(&group.id) {
            return Err(RepositoryError::Conflict(format!("group {} exists", group.id)));
        }
        state.groups.insert(group.id, group.clone());
        Ok(())
    }

    async fn update_group(&self, group: &ConsolidationGroup) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        let stored = state
            .groups
            .get_mut(&group.id)
            .ok_or(RepositoryError::ConcurrentModification)?;
        if stored.version != group.version {
            return Err(RepositoryError::ConcurrentModification);
        }
        *stored = group.clone();
        stored.version += 1;
        Ok(())
    }

    async fn delete_group(
        &self,
        organization_id: OrganizationId,
        group_id: ConsolidationGroupId,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if state
            .groups
            .get(&group_id)
            .is_some_and(|g| g.organization_id == organization_id)
        {
            state.groups.remove(&group_id);
            state.rules.retain(|_, rule| rule.group_id != group_id);
        }
        Ok(())
    }

    async fn find_group(
        &self,
        organization_id: OrganizationId,
        group_id: ConsolidationGroupId,
    ) -> Result<Option<ConsolidationGroup>, RepositoryError> {
        Ok(self
            .state
            .read()
            .await
            .groups
            .get(&group_id)
            .filter(|g| g.organization_id == organization_id)
            .cloned())
    }

    async fn list_groups(
        &self,
        organization_id: OrganizationId,
        filter: &GroupFilter,
    ) -> Result<Vec<ConsolidationGroup>, RepositoryError> {
        let mut groups: Vec<ConsolidationGroup> = self
            .state
            .read()
            .await
            .groups
            .values()
            .filter(|g| g.organization_id == organization_id && filter.matches(g))
            .cloned()
            .collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(groups)
    }

    async fn insert_rules(&self, rules: &[EliminationRule]) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if let Some(existing) = rules.iter().find(|r| state.rules.contains_key(&r.id)) {
            return Err(RepositoryError::Conflict(format!("rule {} exists", existing.id)));
        }
        for rule in rules {
            state.rules.insert(rule.id, rule.clone());
        }
        Ok(())
    }

    async fn update_rule(&self, rule: &EliminationRule) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        let stored = state
            .rules
            .get_mut(&rule.id)
            .ok_or(RepositoryError::ConcurrentModification)?;
        *stored = rule.clone();
        Ok(())
    }

    async fn find_rule(
        &self,
        organization_id: OrganizationId,
        rule_id: EliminationRuleId,
    ) -> Result<Option<EliminationRule>, RepositoryError> {
        Ok(self
            .state
            .read()
            .await
            .rules
            .get(&rule_id)
            .filter(|r| r.organization_id == organization_id)
            .cloned())
    }

    async fn list_rules(
        &self,
        organization_id: OrganizationId,
        group_id: ConsolidationGroupId,
    ) -> Result<Vec<EliminationRule>, RepositoryError> {
        let mut rules: Vec<EliminationRule> = self
            .state
            .read()
            .await
            .rules
            .values()
            .filter(|r| r.organization_id == organization_id && r.group_id == group_id)
            .cloned()
            .collect();
        rules.sort_by_key(|r| (r.priority, r.id));
        Ok(rules)
    }

    async fn delete_rule(
        &self,
        organization_id: OrganizationId,
        rule_id: EliminationRuleId,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if state
            .rules
            .get(&rule_id)
            .is_some_and(|r| r.organization_id == organization_id)
        {
            state.rules.remove(&rule_id);
        }
        Ok(())
    }

    async fn rule_has_entries(
        &self,
        organization_id: OrganizationId,
        rule_id: EliminationRuleId,
    ) -> Result<bool, RepositoryError> {
        Ok(self
            .state
            .read()
            .await
            .runs
            .values()
            .any(|run| run.organization_id == organization_id && run.uses_rule(rule_id)))
    }

    async fn insert_run(
        &self,
        run: &ConsolidationRun,
        force: bool,
    ) -> Result<RunInsertOutcome, RepositoryError> {
        let mut state = self.state.write().await;
        let blocking = state.runs.values().find(|existing| {
            !force
                && existing.group_id == run.group_id
                && existing.period == run.period
                && existing.status.blocks_new_run()
        });
        if let Some(existing) = blocking {
            return Ok(RunInsertOutcome::Blocked(existing.id));
        }
        state.runs.insert(run.id, run.clone());
        Ok(RunInsertOutcome::Inserted)
    }

    async fn update_run(&self, run: &ConsolidationRun) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        let stored = state
            .runs
            .get_mut(&run.id)
            .ok_or(RepositoryError::ConcurrentModification)?;
        if stored.version != run.version {
            return Err(RepositoryError::ConcurrentModification);
        }
        *stored = run.clone();
        stored.version += 1;
        Ok(())
    }

    async fn find_run(
        &self,
        organization_id: OrganizationId,
        run_id: ConsolidationRunId,
    ) -> Result<Option<ConsolidationRun>, RepositoryError> {
        Ok(self
            .state
            .read()
            .await
            .runs
            .get(&run_id)
            .filter(|r| r.organization_id == organization_id)
            .cloned())
    }

    async fn list_runs(
        &self,
        organization_id: OrganizationId,
        filter: &RunFilter,
    ) -> Result<Vec<ConsolidationRun>, RepositoryError> {
        let mut runs: Vec<ConsolidationRun> = self
            .state
            .read()
            .await
            .runs
            .values()
            .filter(|r| r.organization_id == organization_id && filter.matches(r))
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.initiated_at.cmp(&a.initiated_at).then(b.id.cmp(&a.id)));
        Ok(runs)
    }

    async fn latest_completed_run(
        &self,
        organization_id: OrganizationId,
        group_id: ConsolidationGroupId,
        period: Option<FiscalPeriodRef>,
    ) -> Result<Option<ConsolidationRun>, RepositoryError> {
        Ok(self
            .state
            .read()
            .await
            .runs
            .values()
            .filter(|r| {
                r.organization_id == organization_id
                    && r.group_id == group_id
                    && r.status == RunStatus::Completed
                    && period.is_none_or(|p| r.period == p)
            })
            .max_by_key(|r| (r.completed_at, r.id))
            .cloned())
    }

    async fn delete_run(
        &self,
        organization_id: OrganizationId,
        run_id: ConsolidationRunId,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if state
            .runs
            .get(&run_id)
            .is_some_and(|r| r.organization_id == organization_id)
        {
            state.runs.remove(&run_id);
        }
        Ok(())
    }
}

/// One recorded audit event.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRecord {
    /// Organization.
    pub organization_id: OrganizationId,
    /// Acting user.
    pub user_id: UserId,
    /// Entity kind.
    pub entity: AuditEntity,
    /// Entity ID.
    pub entity_id: uuid::Uuid,
    /// "create", "update", "status_change" or "delete".
    pub action: &'static str,
    /// Event payload.
    pub detail: serde_json::Value,
    /// When the event was recorded.
    pub recorded_at: chrono::DateTime<Utc>,
}

/// Audit sink that keeps events in memory.
#[derive(Default)]
pub struct InMemoryAuditLog {
    records: RwLock<Vec<AuditRecord>>,
    failing: AtomicBool,
}

impl InMemoryAuditLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Recorded events, oldest first.
    pub async fn records(&self) -> Vec<AuditRecord> {
        self.records.read().await.clone()
    }

    async fn record(
        &self,
        ctx: &TenantContext,
        entity: AuditEntity,
        entity_id: uuid::Uuid,
        action: &'static str,
        detail: serde_json::Value,
    ) -> Result<(), RepositoryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RepositoryError::Database("audit store unavailable".to_string()));
        }
        self.records.write().await.push(AuditRecord {
            organization_id: ctx.organization_id,
            user_id: ctx.user_id,
            entity,
            entity_id,
            action,
            detail,
            recorded_at: Utc::now(),
        });
        Ok(())
    }
}

#[async_trait]
impl AuditLogService for InMemoryAuditLog {
    async fn log_create(
        &self,
        ctx: &TenantContext,
        entity: AuditEntity,
        entity_id: uuid::Uuid,
        snapshot: serde_json::Value,
    ) -> Result<(), RepositoryError> {
        self.record(ctx, entity, entity_id, "create", snapshot).await
    }

    async fn log_update(
        &self,
        ctx: &TenantContext,
        entity: AuditEntity,
        entity_id: uuid::Uuid,
        before: serde_json::Value,
        after: serde_json::Value,
    ) -> Result<(), RepositoryError> {
        let detail = serde_json::json!({ "before": before, "after": after });
        self.record(ctx, entity, entity_id, "update", detail).await
    }

    async fn log_status_change(
        &self,
        ctx: &TenantContext,
        entity: AuditEntity,
        entity_id: uuid::Uuid,
        from: String,
        to: String,
    ) -> Result<(), RepositoryError> {
        let detail = serde_json::json!({ "from": from, "to": to });
        self.record(ctx, entity, entity_id, "status_change", detail).await
    }

    async fn log_delete(
        &self,
        ctx: &TenantContext,
        entity: AuditEntity,
        entity_id: uuid::Uuid,
    ) -> Result<(), RepositoryError> {
        self.record(ctx, entity, entity_id, "delete", serde_json::Value::Null)
            .await
    }
}
