//! Consolidation run state machine.
//!
//! ```text
//! Pending ──start──> InProgress ──complete──> Completed
//!    │                   │
//!    │                   ├──fail──> Failed
//!    └──cancel──┬────────┘
//!               v
//!           Cancelled
//! ```
//!
//! Steps run in the fixed order of [`StepType::ALL`]. A step can only begin
//! once every earlier step is Completed or Skipped.

use chrono::{DateTime, NaiveDate, Utc};
use consolida_shared::types::{
    AccountId, CompanyId, ConsolidationGroupId, ConsolidationRunId, EliminationRuleId,
    OrganizationId, UserId,
};
use serde::{Deserialize, Serialize};

use super::elimination::{EliminationEntry, ProposedElimination};
use super::error::ConsolidationError;
use super::pipeline::NciAdjustment;
use super::trial_balance::ConsolidatedTrialBalance;

/// Run lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Created, not yet executing.
    Pending,
    /// Steps are executing.
    InProgress,
    /// All steps finished and the trial balance is final.
    Completed,
    /// A step failed.
    Failed,
    /// Cancelled by a user.
    Cancelled,
}

impl RunStatus {
    /// Terminal statuses never change again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Runs in these statuses prevent a new run for the same period.
    #[must_use]
    pub const fn blocks_new_run(self) -> bool {
        matches!(self, Self::Pending | Self::InProgress | Self::Completed)
    }

    /// Returns the snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Unknown run status: {s}")),
        }
    }
}

/// The five consolidation steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    /// Load and weight member trial balances.
    CollectBalances,
    /// Translate foreign balances to the reporting currency.
    TranslateCurrency,
    /// Apply elimination rules.
    EliminateIntercompany,
    /// Split out non-controlling interest.
    ApplyNci,
    /// Check the consolidated result.
    Validate,
}

impl StepType {
    /// Execution order.
    pub const ALL: [Self; 5] = [
        Self::CollectBalances,
        Self::TranslateCurrency,
        Self::EliminateIntercompany,
        Self::ApplyNci,
        Self::Validate,
    ];

    /// Returns the snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CollectBalances => "collect_balances",
            Self::TranslateCurrency => "translate_currency",
            Self::EliminateIntercompany => "eliminate_intercompany",
            Self::ApplyNci => "apply_nci",
            Self::Validate => "validate",
        }
    }
}

impl std::fmt::Display for StepType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Step status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Not started.
    Pending,
    /// Running.
    InProgress,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// Not applicable to this run.
    Skipped,
}

impl StepStatus {
    /// Completed or Skipped.
    #[must_use]
    pub const fn is_done(self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Progress record for one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidationRunStep {
    /// Which step.
    pub step_type: StepType,
    /// Current status.
    pub status: StepStatus,
    /// When the step began.
    pub started_at: Option<DateTime<Utc>>,
    /// When the step finished.
    pub completed_at: Option<DateTime<Utc>>,
    /// Short summary of what the step did, or why it was skipped.
    pub details: Option<String>,
    /// Failure reason.
    pub error_message: Option<String>,
}

impl ConsolidationRunStep {
    fn pending(step_type: StepType) -> Self {
        Self {
            step_type,
            status: StepStatus::Pending,
            started_at: None,
            completed_at: None,
            details: None,
            error_message: None,
        }
    }
}

/// Fiscal period a run consolidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FiscalPeriodRef {
    /// Fiscal year.
    pub year: i32,
    /// Period number; 13 is the year-end adjustment period.
    pub period: u8,
}

impl FiscalPeriodRef {
    /// Validates a period reference.
    pub fn new(year: i32, period: u8) -> Result<Self, ConsolidationError> {
        if !(1900..=9999).contains(&year) || !(1..=13).contains(&period) {
            return Err(ConsolidationError::InvalidPeriod { year, period });
        }
        Ok(Self { year, period })
    }

    /// Re-checks a deserialized reference.
    pub fn validate(self) -> Result<Self, ConsolidationError> {
        Self::new(self.year, self.period)
    }

    /// First day of the fiscal year, used for year-to-date averages.
    #[must_use]
    pub fn year_start(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, 1, 1)
    }
}

impl std::fmt::Display for FiscalPeriodRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-P{:02}", self.year, self.period)
    }
}

/// Run options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    /// Skip the Validate step. The zero-sum check still applies.
    #[serde(default)]
    pub skip_validation: bool,
    /// Complete even if validation produced warnings.
    #[serde(default)]
    pub continue_on_warnings: bool,
    /// Pick up equity-method members.
    #[serde(default = "default_true")]
    pub include_equity_method_investments: bool,
    /// Allow a new run even if one already exists for the period.
    #[serde(default)]
    pub force_regeneration: bool,
}

fn default_true() -> bool {
    true
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            skip_validation: false,
            continue_on_warnings: false,
            include_equity_method_investments: true,
            force_regeneration: false,
        }
    }
}

/// Severity-tagged finding of the Validate step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Machine-readable code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Account concerned, if any.
    pub account_id: Option<AccountId>,
    /// Company concerned, if any.
    pub company_id: Option<CompanyId>,
}

/// Outcome of the Validate step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// No errors were found.
    pub is_valid: bool,
    /// Blocking findings.
    pub errors: Vec<ValidationIssue>,
    /// Findings that block unless `continue_on_warnings` is set.
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Builds a result, deriving `is_valid`.
    #[must_use]
    pub fn new(errors: Vec<ValidationIssue>, warnings: Vec<ValidationIssue>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    /// Returns true if the run may complete under the given options.
    #[must_use]
    pub fn passes(&self, options: &RunOptions) -> bool {
        self.is_valid && (self.warnings.is_empty() || options.continue_on_warnings)
    }
}

/// A consolidation run for one group and period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidationRun {
    /// Run ID.
    pub id: ConsolidationRunId,
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// Consolidated group.
    pub group_id: ConsolidationGroupId,
    /// Fiscal period.
    pub period: FiscalPeriodRef,
    /// Balances are taken cumulatively up to this date.
    pub as_of_date: NaiveDate,
    /// Lifecycle status.
    pub status: RunStatus,
    /// Step progress, in execution order.
    pub steps: Vec<ConsolidationRunStep>,
    /// Options chosen at initiation.
    pub options: RunOptions,
    /// Validate step outcome.
    pub validation_result: Option<ValidationResult>,
    /// Final balances, set on completion.
    pub consolidated_trial_balance: Option<ConsolidatedTrialBalance>,
    /// Entries posted by automatic rules.
    pub elimination_entries: Vec<EliminationEntry>,
    /// Entries proposed by manual rules, awaiting review.
    pub proposed_eliminations: Vec<ProposedElimination>,
    /// Adjustments posted by the NCI step.
    pub nci_adjustments: Vec<NciAdjustment>,
    /// Non-fatal notes gathered during execution.
    pub warnings: Vec<String>,
    /// Who initiated the run.
    pub initiated_by: UserId,
    /// When the run was created.
    pub initiated_at: DateTime<Utc>,
    /// When execution began.
    pub started_at: Option<DateTime<Utc>>,
    /// When the run reached a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
    /// Wall time between start and terminal status.
    pub total_duration_ms: Option<i64>,
    /// Failure reason.
    pub error_message: Option<String>,
    /// Optimistic concurrency version.
    pub version: i64,
}

impl ConsolidationRun {
    /// Creates a pending run with all steps pending.
    #[must_use]
    pub fn new(
        organization_id: OrganizationId,
        group_id: ConsolidationGroupId,
        period: FiscalPeriodRef,
        as_of_date: NaiveDate,
        options: RunOptions,
        initiated_by: UserId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ConsolidationRunId::new(),
            organization_id,
            group_id,
            period,
            as_of_date,
            status: RunStatus::Pending,
            steps: StepType::ALL.into_iter().map(ConsolidationRunStep::pending).collect(),
            options,
            validation_result: None,
            consolidated_trial_balance: None,
            elimination_entries: Vec::new(),
            proposed_eliminations: Vec::new(),
            nci_adjustments: Vec::new(),
            warnings: Vec::new(),
            initiated_by,
            initiated_at: now,
            started_at: None,
            completed_at: None,
            total_duration_ms: None,
            error_message: None,
            version: 1,
        }
    }

    /// Default as-of date for a period when none is given: the last day of its month.
    ///
    /// Period 13 maps to December 31.
    #[must_use]
    pub fn default_as_of(period: FiscalPeriodRef) -> Option<NaiveDate> {
        let month = u32::from(period.period.min(12));
        let first_of_next = if month == 12 {
            NaiveDate::from_ymd_opt(period.year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(period.year, month + 1, 1)?
        };
        first_of_next.pred_opt()
    }

    /// Looks up a step.
    #[must_use]
    pub fn step(&self, step_type: StepType) -> Option<&ConsolidationRunStep> {
        self.steps.iter().find(|s| s.step_type == step_type)
    }

    /// Pending -> InProgress.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), ConsolidationError> {
        self.transition(RunStatus::Pending, RunStatus::InProgress)?;
        self.started_at = Some(now);
        Ok(())
    }

    /// Marks a step as running.
    pub fn begin_step(
        &mut self,
        step_type: StepType,
        now: DateTime<Utc>,
    ) -> Result<(), ConsolidationError> {
        if self.status != RunStatus::InProgress {
            return Err(ConsolidationError::InvalidRunTransition {
                from: self.status,
                to: RunStatus::InProgress,
            });
        }
        let position = self.step_position(step_type);
        let ready = self.steps[..position].iter().all(|s| s.status.is_done());
        let step = &mut self.steps[position];
        if !ready || step.status != StepStatus::Pending {
            return Err(ConsolidationError::InvalidStepTransition {
                step: step_type,
                status: step.status,
            });
        }
        step.status = StepStatus::InProgress;
        step.started_at = Some(now);
        Ok(())
    }

    /// Marks a running step as completed.
    pub fn complete_step(
        &mut self,
        step_type: StepType,
        details: String,
        now: DateTime<Utc>,
    ) -> Result<(), ConsolidationError> {
        self.finish_step(step_type, StepStatus::Completed, Some(details), None, now)
    }

    /// Marks a running step as skipped.
    pub fn skip_step(
        &mut self,
        step_type: StepType,
        reason: String,
        now: DateTime<Utc>,
    ) -> Result<(), ConsolidationError> {
        self.finish_step(step_type, StepStatus::Skipped, Some(reason), None, now)
    }

    /// Marks a step and the run as failed.
    pub fn fail_step(
        &mut self,
        step_type: StepType,
        message: String,
        now: DateTime<Utc>,
    ) -> Result<(), ConsolidationError> {
        self.finish_step(step_type, StepStatus::Failed, None, Some(message.clone()), now)?;
        self.fail(message, now)
    }

    /// InProgress -> Completed. Every step must be done.
    pub fn complete(
        &mut self,
        trial_balance: ConsolidatedTrialBalance,
        now: DateTime<Utc>,
    ) -> Result<(), ConsolidationError> {
        if let Some(step) = self.steps.iter().find(|s| !s.status.is_done()) {
            return Err(ConsolidationError::InvalidStepTransition {
                step: step.step_type,
                status: step.status,
            });
        }
        self.transition(RunStatus::InProgress, RunStatus::Completed)?;
        self.consolidated_trial_balance = Some(trial_balance);
        self.finish(now);
        Ok(())
    }

    /// InProgress -> Failed.
    pub fn fail(&mut self, message: String, now: DateTime<Utc>) -> Result<(), ConsolidationError> {
        self.transition(RunStatus::InProgress, RunStatus::Failed)?;
        self.error_message = Some(message);
        self.finish(now);
        Ok(())
    }

    /// Pending or InProgress -> Cancelled.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), ConsolidationError> {
        if !matches!(self.status, RunStatus::Pending | RunStatus::InProgress) {
            return Err(ConsolidationError::CannotCancel {
                run_id: self.id,
                status: self.status,
            });
        }
        self.status = RunStatus::Cancelled;
        self.finish(now);
        Ok(())
    }

    /// Only pending and failed runs may be deleted.
    pub fn ensure_deletable(&self) -> Result<(), ConsolidationError> {
        if matches!(self.status, RunStatus::Pending | RunStatus::Failed) {
            Ok(())
        } else {
            Err(ConsolidationError::CannotDelete {
                run_id: self.id,
                status: self.status,
            })
        }
    }

    /// Returns true if any posted entry came from the rule.
    #[must_use]
    pub fn uses_rule(&self, rule_id: EliminationRuleId) -> bool {
        self.elimination_entries.iter().any(|e| e.rule_id == rule_id)
    }

    fn step_position(&self, step_type: StepType) -> usize {
        StepType::ALL
            .iter()
            .position(|s| *s == step_type)
            .unwrap_or_default()
    }

    fn finish_step(
        &mut self,
        step_type: StepType,
        status: StepStatus,
        details: Option<String>,
        error_message: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), ConsolidationError> {
        let position = self.step_position(step_type);
        let step = &mut self.steps[position];
        if step.status != StepStatus::InProgress {
            return Err(ConsolidationError::InvalidStepTransition {
                step: step_type,
                status: step.status,
            });
        }
        step.status = status;
        step.completed_at = Some(now);
        step.details = details;
        step.error_message = error_message;
        Ok(())
    }

    fn transition(&mut self, from: RunStatus, to: RunStatus) -> Result<(), ConsolidationError> {
        if self.status != from {
            return Err(ConsolidationError::InvalidRunTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    fn finish(&mut self, now: DateTime<Utc>) {
        self.completed_at = Some(now);
        self.total_duration_ms = self
            .started_at
            .map(|started| (now - started).num_milliseconds());
    }
}

/// Filter for listing runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunFilter {
    /// Only runs of this group.
    pub group_id: Option<ConsolidationGroupId>,
    /// Only runs in this status.
    pub status: Option<RunStatus>,
    /// Only runs of this fiscal year.
    pub year: Option<i32>,
    /// Only runs of this fiscal period.
    pub period: Option<u8>,
}

impl RunFilter {
    /// Returns true if the run passes the filter.
    #[must_use]
    pub fn matches(&self, run: &ConsolidationRun) -> bool {
        self.group_id.is_none_or(|g| run.group_id == g)
            && self.status.is_none_or(|s| run.status == s)
            && self.year.is_none_or(|y| run.period.year == y)
            && self.period.is_none_or(|p| run.period.period == p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_run() -> ConsolidationRun {
        ConsolidationRun::new(
            OrganizationId::new(),
            ConsolidationGroupId::new(),
            FiscalPeriodRef::new(2025, 12).unwrap(),
            NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
            RunOptions::default(),
            UserId::new(),
            Utc::now(),
        )
    }

    fn trial_balance(run: &ConsolidationRun) -> ConsolidatedTrialBalance {
        ConsolidatedTrialBalance::empty(run.id, consolida_shared::types::Currency::Usd)
    }

    #[test]
    fn test_new_run_has_five_pending_steps() {
        let run = new_run();
        assert_eq!(run.status, RunStatus::Pending);
        assert_eq!(run.steps.len(), 5);
        assert!(run.steps.iter().all(|s| s.status == StepStatus::Pending));
        assert_eq!(run.steps[0].step_type, StepType::CollectBalances);
        assert_eq!(run.steps[4].step_type, StepType::Validate);
    }

    #[test]
    fn test_full_lifecycle_records_duration() {
        let mut run = new_run();
        let start = Utc::now();
        run.start(start).unwrap();
        for step in StepType::ALL {
            run.begin_step(step, start).unwrap();
            run.complete_step(step, "ok".into(), start).unwrap();
        }
        let tb = trial_balance(&run);
        run.complete(tb, start + Duration::milliseconds(1500)).unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.total_duration_ms, Some(1500));
        assert!(run.consolidated_trial_balance.is_some());
    }

    #[test]
    fn test_steps_must_run_in_order() {
        let mut run = new_run();
        run.start(Utc::now()).unwrap();
        let result = run.begin_step(StepType::TranslateCurrency, Utc::now());
        assert!(matches!(
            result,
            Err(ConsolidationError::InvalidStepTransition { step: StepType::TranslateCurrency, .. })
        ));
    }

    #[test]
    fn test_step_cannot_begin_twice() {
        let mut run = new_run();
        run.start(Utc::now()).unwrap();
        run.begin_step(StepType::CollectBalances, Utc::now()).unwrap();
        assert!(run.begin_step(StepType::CollectBalances, Utc::now()).is_err());
    }

    #[test]
    fn test_skipped_step_unblocks_next() {
        let mut run = new_run();
        run.start(Utc::now()).unwrap();
        run.begin_step(StepType::CollectBalances, Utc::now()).unwrap();
        run.complete_step(StepType::CollectBalances, "2 companies".into(), Utc::now()).unwrap();
        run.begin_step(StepType::TranslateCurrency, Utc::now()).unwrap();
        run.skip_step(StepType::TranslateCurrency, "single currency".into(), Utc::now())
            .unwrap();
        assert!(run.begin_step(StepType::EliminateIntercompany, Utc::now()).is_ok());
    }

    #[test]
    fn test_cannot_complete_with_pending_steps() {
        let mut run = new_run();
        run.start(Utc::now()).unwrap();
        let tb = trial_balance(&run);
        assert!(run.complete(tb, Utc::now()).is_err());
        assert_eq!(run.status, RunStatus::InProgress);
    }

    #[test]
    fn test_fail_step_fails_run() {
        let mut run = new_run();
        run.start(Utc::now()).unwrap();
        run.begin_step(StepType::CollectBalances, Utc::now()).unwrap();
        run.fail_step(StepType::CollectBalances, "boom".into(), Utc::now()).unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.error_message.as_deref(), Some("boom"));
        assert_eq!(run.steps[0].status, StepStatus::Failed);
        assert!(run.completed_at.is_some());
    }

    #[test]
    fn test_cancel_rules() {
        let mut pending = new_run();
        pending.cancel(Utc::now()).unwrap();
        assert_eq!(pending.status, RunStatus::Cancelled);
        assert!(pending.completed_at.is_some());
        assert_eq!(pending.total_duration_ms, None);
        assert!(matches!(
            pending.cancel(Utc::now()),
            Err(ConsolidationError::CannotCancel { .. })
        ));

        let mut running = new_run();
        running.start(Utc::now()).unwrap();
        running.cancel(Utc::now()).unwrap();
        assert_eq!(running.status, RunStatus::Cancelled);
        assert!(running.total_duration_ms.is_some());
    }

    #[test]
    fn test_delete_rules() {
        let run = new_run();
        assert!(run.ensure_deletable().is_ok());

        let mut running = new_run();
        running.start(Utc::now()).unwrap();
        assert!(matches!(
            running.ensure_deletable(),
            Err(ConsolidationError::CannotDelete { .. })
        ));
        running.fail("x".into(), Utc::now()).unwrap();
        assert!(running.ensure_deletable().is_ok());
    }

    #[test]
    fn test_start_requires_pending() {
        let mut run = new_run();
        run.start(Utc::now()).unwrap();
        assert!(matches!(
            run.start(Utc::now()),
            Err(ConsolidationError::InvalidRunTransition { .. })
        ));
    }

    #[test]
    fn test_period_validation() {
        assert!(FiscalPeriodRef::new(2025, 0).is_err());
        assert!(FiscalPeriodRef::new(2025, 14).is_err());
        assert!(FiscalPeriodRef::new(2025, 13).is_ok());
        assert_eq!(FiscalPeriodRef::new(2025, 3).unwrap().to_string(), "2025-P03");
    }

    #[test]
    fn test_default_as_of() {
        let feb = FiscalPeriodRef::new(2024, 2).unwrap();
        assert_eq!(
            ConsolidationRun::default_as_of(feb),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
        let adj = FiscalPeriodRef::new(2025, 13).unwrap();
        assert_eq!(
            ConsolidationRun::default_as_of(adj),
            NaiveDate::from_ymd_opt(2025, 12, 31)
        );
    }

    #[test]
    fn test_blocking_statuses() {
        assert!(RunStatus::Completed.blocks_new_run());
        assert!(RunStatus::InProgress.blocks_new_run());
        assert!(!RunStatus::Failed.blocks_new_run());
        assert!(!RunStatus::Cancelled.blocks_new_run());
    }

    #[test]
    fn test_filter_by_period() {
        let run = new_run();
        let same_year = RunFilter {
            year: Some(2025),
            ..RunFilter::default()
        };
        assert!(same_year.matches(&run));
        assert!(
            RunFilter {
                period: Some(12),
                ..same_year.clone()
            }
            .matches(&run)
        );
        assert!(
            !RunFilter {
                period: Some(11),
                ..same_year
            }
            .matches(&run)
        );
    }
}
