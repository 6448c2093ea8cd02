//! Elimination rules.
//!
//! A rule watches a set of source accounts and, when their net balance
//! crosses a threshold, posts an offsetting debit/credit pair that removes
//! intra-group balances from the consolidated view.

use chrono::{DateTime, Utc};
use consolida_shared::types::{
    AccountId, ConsolidationGroupId, EliminationRuleId, OrganizationId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::ConsolidationError;
use crate::ledger::BalanceMap;

/// Kind of intra-group balance a rule removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EliminationType {
    /// Intercompany receivables against payables.
    IntercompanyReceivablePayable,
    /// Intercompany sales against purchases.
    IntercompanyRevenueExpense,
    /// Dividends paid within the group.
    IntercompanyDividends,
    /// Parent's investment against the subsidiary's equity.
    InvestmentInSubsidiary,
    /// Unrealized profit in inventory bought from group companies.
    UnrealizedProfitInventory,
    /// Unrealized profit on fixed assets transferred within the group.
    UnrealizedProfitFixedAssets,
}

impl EliminationType {
    /// Returns the snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IntercompanyReceivablePayable => "intercompany_receivable_payable",
            Self::IntercompanyRevenueExpense => "intercompany_revenue_expense",
            Self::IntercompanyDividends => "intercompany_dividends",
            Self::InvestmentInSubsidiary => "investment_in_subsidiary",
            Self::UnrealizedProfitInventory => "unrealized_profit_inventory",
            Self::UnrealizedProfitFixedAssets => "unrealized_profit_fixed_assets",
        }
    }
}

impl std::fmt::Display for EliminationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EliminationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "intercompany_receivable_payable" => Ok(Self::IntercompanyReceivablePayable),
            "intercompany_revenue_expense" => Ok(Self::IntercompanyRevenueExpense),
            "intercompany_dividends" => Ok(Self::IntercompanyDividends),
            "investment_in_subsidiary" => Ok(Self::InvestmentInSubsidiary),
            "unrealized_profit_inventory" => Ok(Self::UnrealizedProfitInventory),
            "unrealized_profit_fixed_assets" => Ok(Self::UnrealizedProfitFixedAssets),
            _ => Err(format!("Unknown elimination type: {s}")),
        }
    }
}

/// Fires when the net balance of its source accounts reaches a minimum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerCondition {
    /// What the condition matches.
    pub description: String,
    /// Accounts whose net balance is inspected.
    pub source_account_ids: Vec<AccountId>,
    /// Minimum absolute net balance for the condition to fire.
    #[serde(default)]
    pub min_amount: Decimal,
}

impl TriggerCondition {
    /// Returns the net signed balance of the source accounts if the condition fires.
    ///
    /// A zero net balance never fires.
    #[must_use]
    pub fn evaluate(&self, balances: &BalanceMap) -> Option<Decimal> {
        let net = balances.net_of(&self.source_account_ids);
        if net.is_zero() || net.abs() < self.min_amount {
            None
        } else {
            Some(net)
        }
    }
}

/// An elimination rule attached to a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EliminationRule {
    /// Rule ID.
    pub id: EliminationRuleId,
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// Group the rule belongs to.
    pub group_id: ConsolidationGroupId,
    /// Display name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// What the rule eliminates.
    pub elimination_type: EliminationType,
    /// Conditions evaluated in order.
    pub trigger_conditions: Vec<TriggerCondition>,
    /// Accounts the rule reads from, for reference and fallback triggering.
    pub source_account_ids: Vec<AccountId>,
    /// Accounts whose net balance caps the eliminated amount.
    pub target_account_ids: Vec<AccountId>,
    /// Account debited by the elimination.
    pub debit_account_id: AccountId,
    /// Account credited by the elimination.
    pub credit_account_id: AccountId,
    /// Automatic rules post entries, manual rules only propose them.
    pub is_automatic: bool,
    /// Lower runs first.
    pub priority: i32,
    /// Inactive rules are ignored by runs.
    pub is_active: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl EliminationRule {
    /// Builds a rule from input, validating its shape.
    pub fn create(
        organization_id: OrganizationId,
        group_id: ConsolidationGroupId,
        input: CreateEliminationRuleInput,
        now: DateTime<Utc>,
    ) -> Result<Self, ConsolidationError> {
        let rule = Self {
            id: EliminationRuleId::new(),
            organization_id,
            group_id,
            name: input.name.trim().to_string(),
            description: input.description,
            elimination_type: input.elimination_type,
            trigger_conditions: input.trigger_conditions,
            source_account_ids: input.source_account_ids,
            target_account_ids: input.target_account_ids,
            debit_account_id: input.debit_account_id,
            credit_account_id: input.credit_account_id,
            is_automatic: input.is_automatic,
            priority: input.priority,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        rule.validate()?;
        Ok(rule)
    }

    /// Applies a partial update and revalidates.
    pub fn apply_update(
        &mut self,
        input: UpdateEliminationRuleInput,
        now: DateTime<Utc>,
    ) -> Result<(), ConsolidationError> {
        if let Some(name) = input.name {
            self.name = name.trim().to_string();
        }
        if let Some(description) = input.description {
            self.description = description;
        }
        if let Some(conditions) = input.trigger_conditions {
            self.trigger_conditions = conditions;
        }
        if let Some(sources) = input.source_account_ids {
            self.source_account_ids = sources;
        }
        if let Some(targets) = input.target_account_ids {
            self.target_account_ids = targets;
        }
        if let Some(debit) = input.debit_account_id {
            self.debit_account_id = debit;
        }
        if let Some(credit) = input.credit_account_id {
            self.credit_account_id = credit;
        }
        if let Some(automatic) = input.is_automatic {
            self.is_automatic = automatic;
        }
        if let Some(priority) = input.priority {
            self.priority = priority;
        }
        if let Some(active) = input.is_active {
            self.is_active = active;
        }
        self.validate()?;
        self.updated_at = now;
        Ok(())
    }

    /// Conditions the engine evaluates.
    ///
    /// A rule without explicit conditions triggers on its own source
    /// accounts with no minimum.
    #[must_use]
    pub fn effective_conditions(&self) -> Vec<TriggerCondition> {
        if self.trigger_conditions.is_empty() {
            vec![TriggerCondition {
                description: self.name.clone(),
                source_account_ids: self.source_account_ids.clone(),
                min_amount: Decimal::ZERO,
            }]
        } else {
            self.trigger_conditions.clone()
        }
    }

    /// Every account the rule refers to.
    #[must_use]
    pub fn referenced_accounts(&self) -> Vec<AccountId> {
        let mut ids: Vec<AccountId> = self
            .trigger_conditions
            .iter()
            .flat_map(|c| c.source_account_ids.iter().copied())
            .chain(self.source_account_ids.iter().copied())
            .chain(self.target_account_ids.iter().copied())
            .chain([self.debit_account_id, self.credit_account_id])
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    fn validate(&self) -> Result<(), ConsolidationError> {
        if self.name.is_empty() {
            return Err(ConsolidationError::Validation(
                "rule name cannot be empty".to_string(),
            ));
        }
        if self.debit_account_id == self.credit_account_id {
            return Err(ConsolidationError::Validation(
                "debit and credit accounts must differ".to_string(),
            ));
        }
        if self.trigger_conditions.is_empty() && self.source_account_ids.is_empty() {
            return Err(ConsolidationError::Validation(
                "rule needs trigger conditions or source accounts".to_string(),
            ));
        }
        for condition in &self.trigger_conditions {
            if condition.source_account_ids.is_empty() {
                return Err(ConsolidationError::Validation(format!(
                    "trigger condition '{}' has no source accounts",
                    condition.description
                )));
            }
            if condition.min_amount.is_sign_negative() {
                return Err(ConsolidationError::Validation(format!(
                    "trigger condition '{}' has a negative minimum",
                    condition.description
                )));
            }
        }
        Ok(())
    }
}

/// Input for creating an elimination rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEliminationRuleInput {
    /// Display name.
    pub name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// What the rule eliminates.
    pub elimination_type: EliminationType,
    /// Conditions evaluated in order.
    #[serde(default)]
    pub trigger_conditions: Vec<TriggerCondition>,
    /// Source accounts.
    #[serde(default)]
    pub source_account_ids: Vec<AccountId>,
    /// Target accounts.
    #[serde(default)]
    pub target_account_ids: Vec<AccountId>,
    /// Debit side.
    pub debit_account_id: AccountId,
    /// Credit side.
    pub credit_account_id: AccountId,
    /// Post automatically.
    #[serde(default = "default_true")]
    pub is_automatic: bool,
    /// Evaluation order.
    #[serde(default)]
    pub priority: i32,
}

fn default_true() -> bool {
    true
}

/// Partial rule update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateEliminationRuleInput {
    /// New name.
    pub name: Option<String>,
    /// New description (`Some(None)` clears it).
    pub description: Option<Option<String>>,
    /// Replacement conditions.
    pub trigger_conditions: Option<Vec<TriggerCondition>>,
    /// Replacement source accounts.
    pub source_account_ids: Option<Vec<AccountId>>,
    /// Replacement target accounts.
    pub target_account_ids: Option<Vec<AccountId>>,
    /// New debit side.
    pub debit_account_id: Option<AccountId>,
    /// New credit side.
    pub credit_account_id: Option<AccountId>,
    /// New automatic flag.
    pub is_automatic: Option<bool>,
    /// New priority.
    pub priority: Option<i32>,
    /// Activate or deactivate.
    pub is_active: Option<bool>,
}
