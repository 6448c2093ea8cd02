//! Groups, elimination rules and runs.
//!
//! Groups and runs use optimistic concurrency: an update only matches the
//! row whose `version` equals the caller's copy, and bumps it.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, DatabaseConnection, DbBackend,
    EntityTrait, FromQueryResult, QueryFilter, QueryOrder, QuerySelect, Set, Statement,
    TransactionTrait,
};
use serde_json::json;
use tracing::debug;

use consolida_core::consolidation::{
    ConsolidationGroup, ConsolidationRepository, ConsolidationRun, EliminationRule,
    FiscalPeriodRef, GroupFilter, RepositoryError, RunFilter, RunInsertOutcome, RunStatus,
};
use consolida_shared::types::{
    CompanyId, ConsolidationGroupId, ConsolidationRunId, EliminationRuleId, OrganizationId, UserId,
};

use super::{db_err, from_json, parse_column, to_json};
use crate::entities::{consolidation_groups, consolidation_runs, elimination_rules};

#[derive(Debug, FromQueryResult)]
struct UsageRow {
    used: bool,
}

/// Consolidation repository backed by Postgres.
#[derive(Debug, Clone)]
pub struct SqlConsolidationRepository {
    db: DatabaseConnection,
}

impl SqlConsolidationRepository {
    /// Creates a new consolidation repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ============================================================================
// Row mapping
// ============================================================================

fn group_to_active(
    group: &ConsolidationGroup,
) -> Result<consolidation_groups::ActiveModel, RepositoryError> {
    Ok(consolidation_groups::ActiveModel {
        id: Set(group.id.into_inner()),
        organization_id: Set(group.organization_id.into_inner()),
        name: Set(group.name.clone()),
        description: Set(group.description.clone()),
        reporting_currency: Set(group.reporting_currency.code().to_string()),
        consolidation_method: Set(group.consolidation_method.as_str().to_string()),
        parent_company_id: Set(group.parent_company_id.into_inner()),
        members: Set(to_json("members", &group.members)?),
        accounts: Set(to_json("accounts", &group.accounts)?),
        is_active: Set(group.is_active),
        version: Set(group.version),
        created_at: Set(group.created_at.into()),
        updated_at: Set(group.updated_at.into()),
    })
}

fn to_group(model: consolidation_groups::Model) -> Result<ConsolidationGroup, RepositoryError> {
    Ok(ConsolidationGroup {
        id: ConsolidationGroupId::from_uuid(model.id),
        organization_id: OrganizationId::from_uuid(model.organization_id),
        reporting_currency: parse_column("reporting_currency", &model.reporting_currency)?,
        consolidation_method: parse_column("consolidation_method", &model.consolidation_method)?,
        parent_company_id: CompanyId::from_uuid(model.parent_company_id),
        members: from_json("members", model.members)?,
        accounts: from_json("accounts", model.accounts)?,
        name: model.name,
        description: model.description,
        is_active: model.is_active,
        version: model.version,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

fn rule_to_active(
    rule: &EliminationRule,
) -> Result<elimination_rules::ActiveModel, RepositoryError> {
    Ok(elimination_rules::ActiveModel {
        id: Set(rule.id.into_inner()),
        organization_id: Set(rule.organization_id.into_inner()),
        group_id: Set(rule.group_id.into_inner()),
        name: Set(rule.name.clone()),
        description: Set(rule.description.clone()),
        elimination_type: Set(rule.elimination_type.as_str().to_string()),
        trigger_conditions: Set(to_json("trigger_conditions", &rule.trigger_conditions)?),
        source_account_ids: Set(to_json("source_account_ids", &rule.source_account_ids)?),
        target_account_ids: Set(to_json("target_account_ids", &rule.target_account_ids)?),
        debit_account_id: Set(rule.debit_account_id.into_inner()),
        credit_account_id: Set(rule.credit_account_id.into_inner()),
        is_automatic: Set(rule.is_automatic),
        priority: Set(rule.priority),
        is_active: Set(rule.is_active),
        created_at: Set(rule.created_at.into()),
        updated_at: Set(rule.updated_at.into()),
    })
}

fn to_rule(model: elimination_rules::Model) -> Result<EliminationRule, RepositoryError> {
    Ok(EliminationRule {
        id: EliminationRuleId::from_uuid(model.id),
        organization_id: OrganizationId::from_uuid(model.organization_id),
        group_id: ConsolidationGroupId::from_uuid(model.group_id),
        elimination_type: parse_column("elimination_type", &model.elimination_type)?,
        trigger_conditions: from_json("trigger_conditions", model.trigger_conditions)?,
        source_account_ids: from_json("source_account_ids", model.source_account_ids)?,
        target_account_ids: from_json("target_account_ids", model.target_account_ids)?,
        debit_account_id: model.debit_account_id.into(),
        credit_account_id: model.credit_account_id.into(),
        name: model.name,
        description: model.description,
        is_automatic: model.is_automatic,
        priority: model.priority,
        is_active: model.is_active,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

fn run_to_active(
    run: &ConsolidationRun,
) -> Result<consolidation_runs::ActiveModel, RepositoryError> {
    Ok(consolidation_runs::ActiveModel {
        id: Set(run.id.into_inner()),
        organization_id: Set(run.organization_id.into_inner()),
        group_id: Set(run.group_id.into_inner()),
        fiscal_year: Set(run.period.year),
        fiscal_period: Set(i16::from(run.period.period)),
        as_of_date: Set(run.as_of_date),
        status: Set(run.status.as_str().to_string()),
        options: Set(to_json("options", &run.options)?),
        steps: Set(to_json("steps", &run.steps)?),
        validation_result: Set(run
            .validation_result
            .as_ref()
            .map(|v| to_json("validation_result", v))
            .transpose()?),
        trial_balance: Set(run
            .consolidated_trial_balance
            .as_ref()
            .map(|tb| to_json("trial_balance", tb))
            .transpose()?),
        elimination_entries: Set(to_json("elimination_entries", &run.elimination_entries)?),
        proposed_eliminations: Set(to_json("proposed_eliminations", &run.proposed_eliminations)?),
        nci_adjustments: Set(to_json("nci_adjustments", &run.nci_adjustments)?),
        warnings: Set(to_json("warnings", &run.warnings)?),
        initiated_by: Set(run.initiated_by.into_inner()),
        initiated_at: Set(run.initiated_at.into()),
        started_at: Set(run.started_at.map(Into::into)),
        completed_at: Set(run.completed_at.map(Into::into)),
        total_duration_ms: Set(run.total_duration_ms),
        error_message: Set(run.error_message.clone()),
        version: Set(run.version),
    })
}

fn to_run(model: consolidation_runs::Model) -> Result<ConsolidationRun, RepositoryError> {
    let period = u8::try_from(model.fiscal_period)
        .ok()
        .and_then(|p| FiscalPeriodRef::new(model.fiscal_year, p).ok())
        .ok_or_else(|| {
            RepositoryError::Corrupt(format!(
                "fiscal period {}/{}",
                model.fiscal_year, model.fiscal_period
            ))
        })?;

    Ok(ConsolidationRun {
        id: ConsolidationRunId::from_uuid(model.id),
        organization_id: OrganizationId::from_uuid(model.organization_id),
        group_id: ConsolidationGroupId::from_uuid(model.group_id),
        period,
        as_of_date: model.as_of_date,
        status: parse_column("status", &model.status)?,
        steps: from_json("steps", model.steps)?,
        options: from_json("options", model.options)?,
        validation_result: model
            .validation_result
            .map(|v| from_json("validation_result", v))
            .transpose()?,
        consolidated_trial_balance: model
            .trial_balance
            .map(|tb| from_json("trial_balance", tb))
            .transpose()?,
        elimination_entries: from_json("elimination_entries", model.elimination_entries)?,
        proposed_eliminations: from_json("proposed_eliminations", model.proposed_eliminations)?,
        nci_adjustments: from_json("nci_adjustments", model.nci_adjustments)?,
        warnings: from_json("warnings", model.warnings)?,
        initiated_by: UserId::from_uuid(model.initiated_by),
        initiated_at: model.initiated_at.with_timezone(&Utc),
        started_at: model.started_at.map(|t| t.with_timezone(&Utc)),
        completed_at: model.completed_at.map(|t| t.with_timezone(&Utc)),
        total_duration_ms: model.total_duration_ms,
        error_message: model.error_message,
        version: model.version,
    })
}

/// Statuses that keep an unforced run of the same group and period from starting.
const BLOCKING_STATUSES: [&str; 3] = [
    RunStatus::Pending.as_str(),
    RunStatus::InProgress.as_str(),
    RunStatus::Completed.as_str(),
];

#[async_trait]
impl ConsolidationRepository for SqlConsolidationRepository {
    // ========================================================================
    // Groups
    // ========================================================================

    async fn insert_group(&self, group: &ConsolidationGroup) -> Result<(), RepositoryError> {
        group_to_active(group)?.insert(&self.db).await.map_err(db_err)?;
        Ok(())
    }

    async fn update_group(&self, group: &ConsolidationGroup) -> Result<(), RepositoryError> {
        let mut active = group_to_active(group)?;
        active.id = NotSet;
        active.version = NotSet;
        active.created_at = NotSet;

        let result = consolidation_groups::Entity::update_many()
            .set(active)
            .col_expr(
                consolidation_groups::Column::Version,
                Expr::col(consolidation_groups::Column::Version).add(1),
            )
            .filter(consolidation_groups::Column::Id.eq(group.id.into_inner()))
            .filter(
                consolidation_groups::Column::OrganizationId
                    .eq(group.organization_id.into_inner()),
            )
            .filter(consolidation_groups::Column::Version.eq(group.version))
            .exec(&self.db)
            .await
            .map_err(db_err)?;

        if result.rows_affected == 0 {
            return Err(RepositoryError::ConcurrentModification);
        }
        Ok(())
    }

    async fn delete_group(
        &self,
        organization_id: OrganizationId,
        group_id: ConsolidationGroupId,
    ) -> Result<(), RepositoryError> {
        // Rules go with the group through ON DELETE CASCADE
        consolidation_groups::Entity::delete_many()
            .filter(consolidation_groups::Column::Id.eq(group_id.into_inner()))
            .filter(consolidation_groups::Column::OrganizationId.eq(organization_id.into_inner()))
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn find_group(
        &self,
        organization_id: OrganizationId,
        group_id: ConsolidationGroupId,
    ) -> Result<Option<ConsolidationGroup>, RepositoryError> {
        consolidation_groups::Entity::find_by_id(group_id.into_inner())
            .filter(consolidation_groups::Column::OrganizationId.eq(organization_id.into_inner()))
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(to_group)
            .transpose()
    }

    async fn list_groups(
        &self,
        organization_id: OrganizationId,
        filter: &GroupFilter,
    ) -> Result<Vec<ConsolidationGroup>, RepositoryError> {
        let mut query = consolidation_groups::Entity::find()
            .filter(consolidation_groups::Column::OrganizationId.eq(organization_id.into_inner()));
        if let Some(is_active) = filter.is_active {
            query = query.filter(consolidation_groups::Column::IsActive.eq(is_active));
        }

        let models = query
            .order_by_asc(consolidation_groups::Column::Name)
            .order_by_asc(consolidation_groups::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;

        // Membership lives in JSONB; the company filter runs on the decoded group
        let mut groups = Vec::with_capacity(models.len());
        for model in models {
            let group = to_group(model)?;
            if filter.matches(&group) {
                groups.push(group);
            }
        }
        Ok(groups)
    }

    // ========================================================================
    // Elimination rules
    // ========================================================================

    async fn insert_rules(&self, rules: &[EliminationRule]) -> Result<(), RepositoryError> {
        let txn = self.db.begin().await.map_err(db_err)?;
        for rule in rules {
            rule_to_active(rule)?.insert(&txn).await.map_err(db_err)?;
        }
        txn.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn update_rule(&self, rule: &EliminationRule) -> Result<(), RepositoryError> {
        let mut active = rule_to_active(rule)?;
        active.id = NotSet;
        active.created_at = NotSet;

        let result = elimination_rules::Entity::update_many()
            .set(active)
            .filter(elimination_rules::Column::Id.eq(rule.id.into_inner()))
            .filter(elimination_rules::Column::OrganizationId.eq(rule.organization_id.into_inner()))
            .exec(&self.db)
            .await
            .map_err(db_err)?;

        if result.rows_affected == 0 {
            return Err(RepositoryError::ConcurrentModification);
        }
        Ok(())
    }

    async fn find_rule(
        &self,
        organization_id: OrganizationId,
        rule_id: EliminationRuleId,
    ) -> Result<Option<EliminationRule>, RepositoryError> {
        elimination_rules::Entity::find_by_id(rule_id.into_inner())
            .filter(elimination_rules::Column::OrganizationId.eq(organization_id.into_inner()))
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(to_rule)
            .transpose()
    }

    async fn list_rules(
        &self,
        organization_id: OrganizationId,
        group_id: ConsolidationGroupId,
    ) -> Result<Vec<EliminationRule>, RepositoryError> {
        elimination_rules::Entity::find()
            .filter(elimination_rules::Column::OrganizationId.eq(organization_id.into_inner()))
            .filter(elimination_rules::Column::GroupId.eq(group_id.into_inner()))
            .order_by_asc(elimination_rules::Column::Priority)
            .order_by_asc(elimination_rules::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(to_rule)
            .collect()
    }

    async fn delete_rule(
        &self,
        organization_id: OrganizationId,
        rule_id: EliminationRuleId,
    ) -> Result<(), RepositoryError> {
        elimination_rules::Entity::delete_many()
            .filter(elimination_rules::Column::Id.eq(rule_id.into_inner()))
            .filter(elimination_rules::Column::OrganizationId.eq(organization_id.into_inner()))
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn rule_has_entries(
        &self,
        organization_id: OrganizationId,
        rule_id: EliminationRuleId,
    ) -> Result<bool, RepositoryError> {
        let probe = json!([{ "rule_id": rule_id }]);
        let statement = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r"SELECT EXISTS (
                SELECT 1 FROM consolidation_runs
                WHERE organization_id = $1 AND elimination_entries @> $2
            ) AS used",
            [organization_id.into_inner().into(), probe.into()],
        );
        let row = UsageRow::find_by_statement(statement)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(row.is_some_and(|r| r.used))
    }

    // ========================================================================
    // Runs
    // ========================================================================

    async fn insert_run(
        &self,
        run: &ConsolidationRun,
        force: bool,
    ) -> Result<RunInsertOutcome, RepositoryError> {
        let txn = self.db.begin().await.map_err(db_err)?;

        // Serializes initiations for the group until commit
        let locked = consolidation_groups::Entity::find_by_id(run.group_id.into_inner())
            .filter(
                consolidation_groups::Column::OrganizationId.eq(run.organization_id.into_inner()),
            )
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(db_err)?;
        if locked.is_none() {
            return Err(RepositoryError::Database(format!(
                "unknown consolidation group {}",
                run.group_id
            )));
        }

        if !force {
            let blocking = consolidation_runs::Entity::find()
                .filter(consolidation_runs::Column::GroupId.eq(run.group_id.into_inner()))
                .filter(consolidation_runs::Column::FiscalYear.eq(run.period.year))
                .filter(consolidation_runs::Column::FiscalPeriod.eq(i16::from(run.period.period)))
                .filter(consolidation_runs::Column::Status.is_in(BLOCKING_STATUSES))
                .order_by_desc(consolidation_runs::Column::InitiatedAt)
                .one(&txn)
                .await
                .map_err(db_err)?;
            if let Some(existing) = blocking {
                debug!(
                    run_id = %existing.id,
                    status = %existing.status,
                    "Run blocked by existing run"
                );
                txn.rollback().await.map_err(db_err)?;
                return Ok(RunInsertOutcome::Blocked(existing.id.into()));
            }
        }

        run_to_active(run)?.insert(&txn).await.map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;
        Ok(RunInsertOutcome::Inserted)
    }

    async fn update_run(&self, run: &ConsolidationRun) -> Result<(), RepositoryError> {
        let mut active = run_to_active(run)?;
        active.id = NotSet;
        active.version = NotSet;

        let result = consolidation_runs::Entity::update_many()
            .set(active)
            .col_expr(
                consolidation_runs::Column::Version,
                Expr::col(consolidation_runs::Column::Version).add(1),
            )
            .filter(consolidation_runs::Column::Id.eq(run.id.into_inner()))
            .filter(consolidation_runs::Column::OrganizationId.eq(run.organization_id.into_inner()))
            .filter(consolidation_runs::Column::Version.eq(run.version))
            .exec(&self.db)
            .await
            .map_err(db_err)?;

        if result.rows_affected == 0 {
            return Err(RepositoryError::ConcurrentModification);
        }
        Ok(())
    }

    async fn find_run(
        &self,
        organization_id: OrganizationId,
        run_id: ConsolidationRunId,
    ) -> Result<Option<ConsolidationRun>, RepositoryError> {
        consolidation_runs::Entity::find_by_id(run_id.into_inner())
            .filter(consolidation_runs::Column::OrganizationId.eq(organization_id.into_inner()))
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(to_run)
            .transpose()
    }

    async fn list_runs(
        &self,
        organization_id: OrganizationId,
        filter: &RunFilter,
    ) -> Result<Vec<ConsolidationRun>, RepositoryError> {
        let mut query = consolidation_runs::Entity::find()
            .filter(consolidation_runs::Column::OrganizationId.eq(organization_id.into_inner()));
        if let Some(group_id) = filter.group_id {
            query = query.filter(consolidation_runs::Column::GroupId.eq(group_id.into_inner()));
        }
        if let Some(status) = filter.status {
            query = query.filter(consolidation_runs::Column::Status.eq(status.as_str()));
        }
        if let Some(year) = filter.year {
            query = query.filter(consolidation_runs::Column::FiscalYear.eq(year));
        }
        if let Some(period) = filter.period {
            query = query.filter(consolidation_runs::Column::FiscalPeriod.eq(i16::from(period)));
        }

        query
            .order_by_desc(consolidation_runs::Column::InitiatedAt)
            .order_by_desc(consolidation_runs::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(to_run)
            .collect()
    }

    async fn latest_completed_run(
        &self,
        organization_id: OrganizationId,
        group_id: ConsolidationGroupId,
        period: Option<FiscalPeriodRef>,
    ) -> Result<Option<ConsolidationRun>, RepositoryError> {
        let mut query = consolidation_runs::Entity::find()
            .filter(consolidation_runs::Column::OrganizationId.eq(organization_id.into_inner()))
            .filter(consolidation_runs::Column::GroupId.eq(group_id.into_inner()))
            .filter(consolidation_runs::Column::Status.eq(RunStatus::Completed.as_str()));
        if let Some(period) = period {
            query = query
                .filter(consolidation_runs::Column::FiscalYear.eq(period.year))
                .filter(consolidation_runs::Column::FiscalPeriod.eq(i16::from(period.period)));
        }

        query
            .order_by_desc(consolidation_runs::Column::CompletedAt)
            .order_by_desc(consolidation_runs::Column::Id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(to_run)
            .transpose()
    }

    async fn delete_run(
        &self,
        organization_id: OrganizationId,
        run_id: ConsolidationRunId,
    ) -> Result<(), RepositoryError> {
        consolidation_runs::Entity::delete_many()
            .filter(consolidation_runs::Column::Id.eq(run_id.into_inner()))
            .filter(consolidation_runs::Column::OrganizationId.eq(organization_id.into_inner()))
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}
