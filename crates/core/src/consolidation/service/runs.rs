//! Run lifecycle and pipeline execution.

use chrono::{Datelike, NaiveDate, Utc};
use consolida_shared::types::{
    ConsolidationGroupId, ConsolidationRunId, Currency, PageRequest, PageResponse,
};
use tracing::{debug, info, warn};

use super::ConsolidationService;
use crate::consolidation::elimination::EliminationEngine;
use crate::consolidation::error::ConsolidationError;
use crate::consolidation::group::ConsolidationGroup;
use crate::consolidation::ownership::ConsolidationMethod;
use crate::consolidation::pipeline::{
    AccountIndex, CompanyContribution, RunScope, TranslationRates, compute_nci_adjustments,
    validate,
};
use crate::consolidation::repository::{AuditEntity, RunInsertOutcome, TenantContext};
use crate::consolidation::run::{
    ConsolidationRun, FiscalPeriodRef, RunFilter, RunOptions, RunStatus, StepStatus, StepType,
};
use crate::consolidation::trial_balance::ConsolidatedTrialBalance;
use crate::ledger::BalanceMap;
use crate::reports::ReportError;

/// How a step ended.
enum StepOutcome {
    Completed(String),
    Skipped(String),
}

/// Whether the pipeline ran to the end.
enum PipelineOutcome {
    Finished,
    Cancelled(Box<ConsolidationRun>),
}

/// Working state carried between steps.
struct Execution {
    group: ConsolidationGroup,
    accounts: AccountIndex,
    scope: RunScope,
    contributions: Vec<CompanyContribution>,
}

impl ConsolidationService {
    /// Creates a pending run for a group and period.
    ///
    /// Without `force_regeneration`, any pending, in-progress or completed
    /// run of the same group and period blocks the new one. A forced run is
    /// always created.
    pub async fn initiate_run(
        &self,
        ctx: &TenantContext,
        group_id: ConsolidationGroupId,
        period: FiscalPeriodRef,
        as_of_date: Option<NaiveDate>,
        options: RunOptions,
    ) -> Result<ConsolidationRun, ConsolidationError> {
        let period = period.validate()?;
        let group = self.load_group(ctx, group_id).await?;
        if !group.is_active {
            return Err(ConsolidationError::GroupInactive(group_id));
        }
        let as_of_date = as_of_date
            .or_else(|| ConsolidationRun::default_as_of(period))
            .ok_or(ConsolidationError::InvalidPeriod {
                year: period.year,
                period: period.period,
            })?;

        let force = options.force_regeneration;
        let run = ConsolidationRun::new(
            ctx.organization_id,
            group_id,
            period,
            as_of_date,
            options,
            ctx.user_id,
            Utc::now(),
        );

        if let RunInsertOutcome::Blocked(existing) =
            self.repository.insert_run(&run, force).await?
        {
            return Err(ConsolidationError::RunAlreadyExists { existing });
        }

        if let Err(e) = self
            .audit
            .log_create(
                ctx,
                AuditEntity::ConsolidationRun,
                run.id.into_inner(),
                super::snapshot(&run),
            )
            .await
        {
            warn!(run_id = %run.id, error = %e, "Failed to audit run creation");
        }

        info!(
            run_id = %run.id,
            group_id = %group_id,
            period = %period,
            as_of = %as_of_date,
            "Consolidation run initiated"
        );
        Ok(run)
    }

    /// Executes a pending run through all five steps.
    ///
    /// A step that fails for a business reason fails the run, which is
    /// persisted and returned. Infrastructure errors are returned as errors
    /// after a best-effort attempt to mark the run failed. A run cancelled
    /// between steps stops and is returned as cancelled.
    pub async fn execute_run(
        &self,
        ctx: &TenantContext,
        run_id: ConsolidationRunId,
    ) -> Result<ConsolidationRun, ConsolidationError> {
        let mut run = self.load_run(ctx, run_id).await?;
        run.start(Utc::now())?;
        self.save_run(&mut run).await?;
        self.audit_run_status(ctx, &run, RunStatus::Pending).await;
        info!(run_id = %run.id, group_id = %run.group_id, "Consolidation run started");

        match self.execute_steps(ctx, &mut run).await {
            Ok(PipelineOutcome::Finished) => {
                self.audit_run_status(ctx, &run, RunStatus::InProgress).await;
                info!(
                    run_id = %run.id,
                    duration_ms = run.total_duration_ms.unwrap_or_default(),
                    entries = run.elimination_entries.len(),
                    "Consolidation run completed"
                );
                Ok(run)
            }
            Ok(PipelineOutcome::Cancelled(cancelled)) => {
                info!(run_id = %run_id, "Consolidation run halted after cancellation");
                Ok(*cancelled)
            }
            Err(err) if err.is_infrastructure() => {
                // A cancel landing mid-step shows up as a version conflict
                if matches!(err, ConsolidationError::ConcurrentModification)
                    && let Ok(stored) = self.load_run(ctx, run_id).await
                    && stored.status == RunStatus::Cancelled
                {
                    info!(run_id = %run_id, "Consolidation run halted after cancellation");
                    return Ok(stored);
                }
                warn!(run_id = %run_id, error = %err, "Consolidation run aborted");
                if let Err(e) = self.record_failure(ctx, run_id, &err).await {
                    warn!(run_id = %run_id, error = %e, "Failed to mark run as failed");
                }
                Err(err)
            }
            Err(err) => {
                warn!(run_id = %run_id, error = %err, "Consolidation run failed");
                Self::fail_in_place(&mut run, &err)?;
                self.save_run(&mut run).await?;
                self.audit_run_status(ctx, &run, RunStatus::InProgress).await;
                Ok(run)
            }
        }
    }

    /// Initiates and executes a run in one call.
    pub async fn run_consolidation(
        &self,
        ctx: &TenantContext,
        group_id: ConsolidationGroupId,
        period: FiscalPeriodRef,
        as_of_date: Option<NaiveDate>,
        options: RunOptions,
    ) -> Result<ConsolidationRun, ConsolidationError> {
        let run = self
            .initiate_run(ctx, group_id, period, as_of_date, options)
            .await?;
        self.execute_run(ctx, run.id).await
    }

    /// Cancels a pending or in-progress run.
    pub async fn cancel_run(
        &self,
        ctx: &TenantContext,
        run_id: ConsolidationRunId,
    ) -> Result<ConsolidationRun, ConsolidationError> {
        let mut run = self.load_run(ctx, run_id).await?;
        let from = run.status;
        run.cancel(Utc::now())?;
        self.save_run(&mut run).await?;
        self.audit_run_status(ctx, &run, from).await;

        info!(run_id = %run_id, from = %from, "Consolidation run cancelled");
        Ok(run)
    }

    /// Deletes a pending or failed run.
    pub async fn delete_run(
        &self,
        ctx: &TenantContext,
        run_id: ConsolidationRunId,
    ) -> Result<(), ConsolidationError> {
        let run = self.load_run(ctx, run_id).await?;
        run.ensure_deletable()?;
        self.repository
            .delete_run(ctx.organization_id, run_id)
            .await?;
        self.statements.invalidate_run(run_id);

        if let Err(e) = self
            .audit
            .log_delete(ctx, AuditEntity::ConsolidationRun, run_id.into_inner())
            .await
        {
            warn!(run_id = %run_id, error = %e, "Failed to audit run deletion");
        }

        info!(run_id = %run_id, "Consolidation run deleted");
        Ok(())
    }

    /// Fetches a run.
    pub async fn get_run(
        &self,
        ctx: &TenantContext,
        run_id: ConsolidationRunId,
    ) -> Result<ConsolidationRun, ConsolidationError> {
        self.load_run(ctx, run_id).await
    }

    /// Lists runs, newest first.
    pub async fn list_runs(
        &self,
        ctx: &TenantContext,
        filter: &RunFilter,
        page: &PageRequest,
    ) -> Result<PageResponse<ConsolidationRun>, ConsolidationError> {
        let runs = self.repository.list_runs(ctx.organization_id, filter).await?;
        Ok(page.paginate(runs))
    }

    /// Final balances of a completed run.
    pub async fn get_consolidated_trial_balance(
        &self,
        ctx: &TenantContext,
        run_id: ConsolidationRunId,
    ) -> Result<ConsolidatedTrialBalance, ConsolidationError> {
        let run = self.load_run(ctx, run_id).await?;
        if run.status != RunStatus::Completed {
            return Err(ReportError::RunNotCompleted {
                run_id,
                status: run.status,
            }
            .into());
        }
        run.consolidated_trial_balance
            .ok_or_else(|| ReportError::NoTrialBalance(run_id).into())
    }

    /// Most recent completed run of a group, optionally for one period.
    pub async fn latest_completed_run(
        &self,
        ctx: &TenantContext,
        group_id: ConsolidationGroupId,
        period: Option<FiscalPeriodRef>,
    ) -> Result<Option<ConsolidationRun>, ConsolidationError> {
        self.load_group(ctx, group_id).await?;
        Ok(self
            .repository
            .latest_completed_run(ctx.organization_id, group_id, period)
            .await?)
    }

    async fn execute_steps(
        &self,
        ctx: &TenantContext,
        run: &mut ConsolidationRun,
    ) -> Result<PipelineOutcome, ConsolidationError> {
        let group = self.load_group(ctx, run.group_id).await?;
        let currency = group.reporting_currency;
        let mut execution = Execution {
            accounts: AccountIndex::new(self.accounts.list_accounts(ctx.organization_id).await?),
            scope: RunScope::resolve(
                &group,
                run.as_of_date,
                run.options.include_equity_method_investments,
            ),
            contributions: Vec::new(),
            group,
        };

        for step in StepType::ALL {
            if let Some(cancelled) = self.begin_step(ctx, run, step).await? {
                return Ok(PipelineOutcome::Cancelled(Box::new(cancelled)));
            }
            let outcome = match step {
                StepType::CollectBalances => self.collect_balances(ctx, run, &mut execution).await?,
                StepType::TranslateCurrency => {
                    self.translate_currency(ctx, run, &mut execution).await?
                }
                StepType::EliminateIntercompany => {
                    self.eliminate_intercompany(ctx, run, &execution, currency).await?
                }
                StepType::ApplyNci => Self::apply_nci(run, &execution, currency)?,
                StepType::Validate => Self::validate_run(run, &execution, currency)?,
            };
            self.end_step(run, step, outcome).await?;
        }

        let trial_balance = Self::build_trial_balance(run, &execution, currency);
        trial_balance.ensure_balanced()?;
        run.complete(trial_balance, Utc::now())?;
        self.save_run(run).await?;
        Ok(PipelineOutcome::Finished)
    }

    /// Starts a step, unless the run was cancelled meanwhile.
    async fn begin_step(
        &self,
        ctx: &TenantContext,
        run: &mut ConsolidationRun,
        step: StepType,
    ) -> Result<Option<ConsolidationRun>, ConsolidationError> {
        let stored = self.load_run(ctx, run.id).await?;
        if stored.status == RunStatus::Cancelled {
            return Ok(Some(stored));
        }
        run.begin_step(step, Utc::now())?;
        self.save_run(run).await?;
        debug!(run_id = %run.id, step = %step, "Step started");
        Ok(None)
    }

    async fn end_step(
        &self,
        run: &mut ConsolidationRun,
        step: StepType,
        outcome: StepOutcome,
    ) -> Result<(), ConsolidationError> {
        let now = Utc::now();
        match outcome {
            StepOutcome::Completed(details) => {
                info!(run_id = %run.id, step = %step, details = %details, "Step completed");
                run.complete_step(step, details, now)?;
            }
            StepOutcome::Skipped(reason) => {
                info!(run_id = %run.id, step = %step, reason = %reason, "Step skipped");
                run.skip_step(step, reason, now)?;
            }
        }
        self.save_run(run).await
    }

    async fn collect_balances(
        &self,
        ctx: &TenantContext,
        run: &mut ConsolidationRun,
        execution: &mut Execution,
    ) -> Result<StepOutcome, ConsolidationError> {
        for company_id in &execution.scope.equity_method_excluded {
            run.warnings.push(format!(
                "Equity-method member {company_id} excluded by run options"
            ));
        }

        for member in &execution.scope.included {
            if self
                .companies
                .find_company(ctx.organization_id, member.company_id)
                .await?
                .is_none()
            {
                return Err(ConsolidationError::CompanyNotFound(member.company_id));
            }
            let trial_balance = self
                .companies
                .trial_balance(ctx.organization_id, member.company_id, run.as_of_date)
                .await?;
            execution.contributions.push(CompanyContribution::from_trial_balance(
                member,
                &trial_balance,
                &execution.accounts,
                &execution.group.accounts,
            )?);
        }

        Ok(StepOutcome::Completed(format!(
            "Collected balances of {} companies",
            execution.contributions.len()
        )))
    }

    async fn translate_currency(
        &self,
        ctx: &TenantContext,
        run: &ConsolidationRun,
        execution: &mut Execution,
    ) -> Result<StepOutcome, ConsolidationError> {
        let reporting = execution.group.reporting_currency;
        let foreign = execution
            .contributions
            .iter()
            .filter(|c| c.currency != reporting)
            .count();
        if foreign == 0 {
            return Ok(StepOutcome::Skipped(format!(
                "All companies report in {reporting}"
            )));
        }

        let year_start =
            NaiveDate::from_ymd_opt(run.as_of_date.year(), 1, 1).unwrap_or(run.as_of_date);
        let mut translated = Vec::with_capacity(execution.contributions.len());
        for contribution in &execution.contributions {
            if contribution.currency == reporting {
                translated.push(contribution.clone());
                continue;
            }
            let rates = self
                .translation_rates(
                    ctx,
                    contribution.currency,
                    reporting,
                    year_start,
                    run.as_of_date,
                )
                .await?;
            debug!(
                run_id = %run.id,
                company_id = %contribution.company_id,
                from = %contribution.currency,
                closing = %rates.closing,
                average = %rates.average,
                "Translating company balances"
            );
            translated.push(contribution.translate(
                reporting,
                rates,
                self.config.translation_precision,
                &execution.accounts,
                execution.group.accounts.translation_reserve_account_id,
            )?);
        }
        execution.contributions = translated;

        Ok(StepOutcome::Completed(format!(
            "Translated {foreign} companies into {reporting}"
        )))
    }

    async fn translation_rates(
        &self,
        ctx: &TenantContext,
        from: Currency,
        to: Currency,
        year_start: NaiveDate,
        as_of: NaiveDate,
    ) -> Result<TranslationRates, ConsolidationError> {
        let closing = self
            .rates
            .closing_rate(ctx.organization_id, from, to, as_of)
            .await?
            .ok_or(ConsolidationError::ExchangeRateNotFound { from, to })?;
        let average = self
            .rates
            .average_rate(ctx.organization_id, from, to, year_start, as_of)
            .await?
            .unwrap_or(closing);
        Ok(TranslationRates { closing, average })
    }

    async fn eliminate_intercompany(
        &self,
        ctx: &TenantContext,
        run: &mut ConsolidationRun,
        execution: &Execution,
        currency: Currency,
    ) -> Result<StepOutcome, ConsolidationError> {
        let rules: Vec<_> = self
            .repository
            .list_rules(ctx.organization_id, run.group_id)
            .await?
            .into_iter()
            .filter(|r| r.is_active)
            .collect();
        if rules.is_empty() {
            return Ok(StepOutcome::Skipped("No active elimination rules".to_string()));
        }

        let mut balances = BalanceMap::new();
        for contribution in &execution.contributions {
            balances.merge(&contribution.balances);
        }
        let outcome = EliminationEngine::evaluate(&rules, balances, currency);
        run.elimination_entries = outcome.entries;
        run.proposed_eliminations = outcome.proposals;

        Ok(StepOutcome::Completed(format!(
            "Evaluated {} rules: {} entries posted, {} proposed",
            rules.len(),
            run.elimination_entries.len(),
            run.proposed_eliminations.len()
        )))
    }

    fn apply_nci(
        run: &mut ConsolidationRun,
        execution: &Execution,
        currency: Currency,
    ) -> Result<StepOutcome, ConsolidationError> {
        let carries_nci = execution.contributions.iter().any(|c| {
            c.method == ConsolidationMethod::FullConsolidation
                && execution
                    .group
                    .member(c.company_id)
                    .is_some_and(|m| !m.non_controlling_interest_percentage.is_zero())
        });
        if !carries_nci {
            return Ok(StepOutcome::Skipped(
                "No member carries non-controlling interest".to_string(),
            ));
        }

        run.nci_adjustments = compute_nci_adjustments(
            &execution.group,
            &execution.contributions,
            &execution.accounts,
            currency,
        )?;
        Ok(StepOutcome::Completed(format!(
            "Posted {} NCI adjustments",
            run.nci_adjustments.len()
        )))
    }

    fn validate_run(
        run: &mut ConsolidationRun,
        execution: &Execution,
        currency: Currency,
    ) -> Result<StepOutcome, ConsolidationError> {
        if run.options.skip_validation {
            return Ok(StepOutcome::Skipped("Validation skipped by run options".to_string()));
        }

        let trial_balance = Self::build_trial_balance(run, execution, currency);
        let result = validate(
            &trial_balance,
            &execution.accounts,
            &run.proposed_eliminations,
            &execution.group,
            &execution.scope,
        );
        let passes = result.passes(&run.options);
        let (errors, warnings) = (result.errors.len(), result.warnings.len());
        run.validation_result = Some(result);

        if !passes {
            return Err(ConsolidationError::ValidationFailed { errors, warnings });
        }
        Ok(StepOutcome::Completed(format!(
            "Validation passed with {warnings} warning(s)"
        )))
    }

    fn build_trial_balance(
        run: &ConsolidationRun,
        execution: &Execution,
        currency: Currency,
    ) -> ConsolidatedTrialBalance {
        ConsolidatedTrialBalance::build(
            run.id,
            currency,
            &execution.contributions,
            &run.elimination_entries,
            &run.nci_adjustments,
        )
    }

    /// Fails the running step, or the run itself between steps.
    fn fail_in_place(
        run: &mut ConsolidationRun,
        err: &ConsolidationError,
    ) -> Result<(), ConsolidationError> {
        let now = Utc::now();
        let running = run
            .steps
            .iter()
            .find(|s| s.status == StepStatus::InProgress)
            .map(|s| s.step_type);
        match running {
            Some(step) => run.fail_step(step, err.to_string(), now),
            None => run.fail(err.to_string(), now),
        }
    }

    /// Marks the stored run failed after an infrastructure error.
    async fn record_failure(
        &self,
        ctx: &TenantContext,
        run_id: ConsolidationRunId,
        err: &ConsolidationError,
    ) -> Result<(), ConsolidationError> {
        let mut run = self.load_run(ctx, run_id).await?;
        if run.status != RunStatus::InProgress {
            return Ok(());
        }
        Self::fail_in_place(&mut run, err)?;
        self.save_run(&mut run).await?;
        self.audit_run_status(ctx, &run, RunStatus::InProgress).await;
        Ok(())
    }
}
