//! Multi-company consolidation.
//!
//! - `ownership` - Ownership percentages and consolidation methods
//! - `group` - The consolidation group aggregate and its members
//! - `rules` / `elimination` - Elimination rules and the engine applying them
//! - `run` - The run state machine
//! - `pipeline` - Balance collection, translation, NCI and validation
//! - `trial_balance` - The consolidated trial balance
//! - `service` - Commands and queries over the repository seams

pub mod elimination;
pub mod error;
pub mod group;
pub mod memory;
pub mod ownership;
pub mod pipeline;
pub mod repository;
pub mod rules;
pub mod run;
pub mod service;
pub mod trial_balance;

pub use elimination::{EliminationEngine, EliminationEntry, EliminationOutcome, ProposedElimination};
pub use error::ConsolidationError;
pub use group::{
    ConsolidationAccounts, ConsolidationGroup, ConsolidationMember, CreateGroupInput, GroupFilter,
    MemberInput, UpdateGroupInput, UpdateMemberInput,
};
pub use ownership::{ConsolidationMethod, Percentage, VieDetermination};
pub use pipeline::{AccountIndex, CompanyContribution, NciAdjustment, NciAdjustmentKind, RunScope};
pub use repository::{
    AccountRepository, AuditEntity, AuditLogService, CompanyRepository, ConsolidationRepository,
    ExchangeRateRepository, RepositoryError, RunInsertOutcome, TenantContext,
};
pub use rules::{
    CreateEliminationRuleInput, EliminationRule, EliminationType, TriggerCondition,
    UpdateEliminationRuleInput,
};
pub use run::{
    ConsolidationRun, ConsolidationRunStep, FiscalPeriodRef, RunFilter, RunOptions, RunStatus,
    StepStatus, StepType, ValidationIssue, ValidationResult,
};
pub use service::ConsolidationService;
pub use trial_balance::{ConsolidatedBalanceLine, ConsolidatedTrialBalance};
