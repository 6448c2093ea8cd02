//! Elimination rule engine.
//!
//! Rules are applied in ascending priority against a running balance map:
//! each automatic entry changes the balances the next rule sees. Manual
//! rules leave the balances untouched and only record a proposal.

use consolida_shared::types::{AccountId, Currency, EliminationEntryId, EliminationRuleId, Money};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::rules::{EliminationRule, EliminationType};
use crate::ledger::BalanceMap;

/// An elimination posted by an automatic rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EliminationEntry {
    /// Entry ID.
    pub id: EliminationEntryId,
    /// Rule that produced the entry.
    pub rule_id: EliminationRuleId,
    /// Rule's elimination type.
    pub elimination_type: EliminationType,
    /// Index of the trigger condition that fired.
    pub condition_index: usize,
    /// Account debited.
    pub debit_account_id: AccountId,
    /// Account credited.
    pub credit_account_id: AccountId,
    /// Positive amount in the reporting currency.
    pub amount: Money,
    /// Human-readable description.
    pub description: String,
}

/// An elimination a manual rule would post, awaiting review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedElimination {
    /// Rule that proposed the entry.
    pub rule_id: EliminationRuleId,
    /// Rule's elimination type.
    pub elimination_type: EliminationType,
    /// Index of the trigger condition that fired.
    pub condition_index: usize,
    /// Account to debit.
    pub debit_account_id: AccountId,
    /// Account to credit.
    pub credit_account_id: AccountId,
    /// Positive amount in the reporting currency.
    pub amount: Money,
    /// Human-readable description.
    pub description: String,
}

/// Result of evaluating a rule set.
#[derive(Debug, Clone, Default)]
pub struct EliminationOutcome {
    /// Entries posted by automatic rules.
    pub entries: Vec<EliminationEntry>,
    /// Proposals from manual rules.
    pub proposals: Vec<ProposedElimination>,
    /// Balances after the posted entries.
    pub balances: BalanceMap,
}

/// Stateless rule engine.
pub struct EliminationEngine;

impl EliminationEngine {
    /// Applies active rules to the pre-elimination balances.
    ///
    /// Rules run by ascending priority, ties broken by rule ID. For each
    /// condition that fires, the amount is the absolute net balance of the
    /// condition's sources, capped at the absolute net balance of the rule's
    /// targets when the rule declares any.
    #[must_use]
    pub fn evaluate(
        rules: &[EliminationRule],
        balances: BalanceMap,
        currency: Currency,
    ) -> EliminationOutcome {
        let mut ordered: Vec<&EliminationRule> = rules.iter().filter(|r| r.is_active).collect();
        ordered.sort_by_key(|r| (r.priority, r.id));

        let mut outcome = EliminationOutcome {
            balances,
            ..EliminationOutcome::default()
        };

        for rule in ordered {
            for (index, condition) in rule.effective_conditions().iter().enumerate() {
                let Some(net) = condition.evaluate(&outcome.balances) else {
                    continue;
                };
                let amount = Self::matched_amount(rule, net, &outcome.balances);
                if amount.is_zero() {
                    continue;
                }

                let description = format!("{}: {}", rule.name, condition.description);
                debug!(
                    rule_id = %rule.id,
                    condition = index,
                    amount = %amount,
                    automatic = rule.is_automatic,
                    "Elimination condition fired"
                );

                if rule.is_automatic {
                    outcome
                        .balances
                        .post(rule.debit_account_id, rule.credit_account_id, amount);
                    outcome.entries.push(EliminationEntry {
                        id: EliminationEntryId::new(),
                        rule_id: rule.id,
                        elimination_type: rule.elimination_type,
                        condition_index: index,
                        debit_account_id: rule.debit_account_id,
                        credit_account_id: rule.credit_account_id,
                        amount: Money::new(amount, currency),
                        description,
                    });
                } else {
                    outcome.proposals.push(ProposedElimination {
                        rule_id: rule.id,
                        elimination_type: rule.elimination_type,
                        condition_index: index,
                        debit_account_id: rule.debit_account_id,
                        credit_account_id: rule.credit_account_id,
                        amount: Money::new(amount, currency),
                        description,
                    });
                }
            }
        }

        outcome
    }

    fn matched_amount(rule: &EliminationRule, net: Decimal, balances: &BalanceMap) -> Decimal {
        let amount = net.abs();
        if rule.target_account_ids.is_empty() {
            amount
        } else {
            amount.min(balances.net_of(&rule.target_account_ids).abs())
        }
    }

    /// Applies posted entries to a balance map.
    pub fn apply(balances: &mut BalanceMap, entries: &[EliminationEntry]) {
        for entry in entries {
            balances.post(entry.debit_account_id, entry.credit_account_id, entry.amount.amount);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consolidation::rules::{CreateEliminationRuleInput, TriggerCondition};
    use chrono::Utc;
    use consolida_shared::types::{ConsolidationGroupId, OrganizationId};
    use rust_decimal_macros::dec;

    struct Chart {
        ic_receivable: AccountId,
        ic_payable: AccountId,
        ic_revenue: AccountId,
        ic_expense: AccountId,
        cash: AccountId,
    }

    impl Chart {
        fn new() -> Self {
            Self {
                ic_receivable: AccountId::new(),
                ic_payable: AccountId::new(),
                ic_revenue: AccountId::new(),
                ic_expense: AccountId::new(),
                cash: AccountId::new(),
            }
        }
    }

    fn rule(
        name: &str,
        sources: Vec<AccountId>,
        targets: Vec<AccountId>,
        debit: AccountId,
        credit: AccountId,
        priority: i32,
        automatic: bool,
    ) -> EliminationRule {
        EliminationRule::create(
            OrganizationId::new(),
            ConsolidationGroupId::new(),
            CreateEliminationRuleInput {
                name: name.to_string(),
                description: None,
                elimination_type: EliminationType::IntercompanyReceivablePayable,
                trigger_conditions: vec![TriggerCondition {
                    description: "sources".to_string(),
                    source_account_ids: sources,
                    min_amount: dec!(0.01),
                }],
                source_account_ids: vec![],
                target_account_ids: targets,
                debit_account_id: debit,
                credit_account_id: credit,
                is_automatic: automatic,
                priority,
            },
            Utc::now(),
        )
        .unwrap()
    }

    fn pre_balances(chart: &Chart) -> BalanceMap {
        [
            (chart.ic_receivable, dec!(10000)),
            (chart.ic_payable, dec!(-10000)),
            (chart.cash, dec!(5000)),
            (chart.ic_revenue, dec!(-5000)),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_receivable_payable_fully_eliminated() {
        let chart = Chart::new();
        let r = rule(
            "IC AR/AP",
            vec![chart.ic_receivable],
            vec![chart.ic_payable],
            chart.ic_payable,
            chart.ic_receivable,
            1,
            true,
        );

        let outcome = EliminationEngine::evaluate(&[r], pre_balances(&chart), Currency::Usd);

        assert_eq!(outcome.entries.len(), 1);
        assert_eq!(outcome.entries[0].amount.amount, dec!(10000));
        assert_eq!(outcome.balances.get(chart.ic_receivable), Decimal::ZERO);
        assert_eq!(outcome.balances.get(chart.ic_payable), Decimal::ZERO);
        assert_eq!(outcome.balances.total(), pre_balances(&chart).total());
    }

    #[test]
    fn test_amount_capped_by_targets() {
        let chart = Chart::new();
        let mut balances = pre_balances(&chart);
        balances.add(chart.ic_payable, dec!(4000)); // payable only 6000
        balances.add(chart.cash, dec!(-4000));

        let r = rule(
            "IC AR/AP",
            vec![chart.ic_receivable],
            vec![chart.ic_payable],
            chart.ic_payable,
            chart.ic_receivable,
            1,
            true,
        );
        let outcome = EliminationEngine::evaluate(&[r], balances, Currency::Usd);

        assert_eq!(outcome.entries[0].amount.amount, dec!(6000));
        assert_eq!(outcome.balances.get(chart.ic_receivable), dec!(4000));
        assert_eq!(outcome.balances.get(chart.ic_payable), Decimal::ZERO);
    }

    #[test]
    fn test_manual_rule_only_proposes() {
        let chart = Chart::new();
        let r = rule(
            "IC AR/AP",
            vec![chart.ic_receivable],
            vec![],
            chart.ic_payable,
            chart.ic_receivable,
            1,
            false,
        );
        let before = pre_balances(&chart);
        let outcome = EliminationEngine::evaluate(&[r], before.clone(), Currency::Usd);

        assert!(outcome.entries.is_empty());
        assert_eq!(outcome.proposals.len(), 1);
        assert_eq!(outcome.balances, before);
    }

    #[test]
    fn test_priority_order_and_sequential_balances() {
        let chart = Chart::new();
        // Both rules clear the receivable; the first one to run takes it all.
        let late = rule(
            "late",
            vec![chart.ic_receivable],
            vec![],
            chart.ic_payable,
            chart.ic_receivable,
            20,
            true,
        );
        let early = rule(
            "early",
            vec![chart.ic_receivable],
            vec![],
            chart.ic_payable,
            chart.ic_receivable,
            5,
            true,
        );
        let early_id = early.id;

        let outcome =
            EliminationEngine::evaluate(&[late, early], pre_balances(&chart), Currency::Usd);

        assert_eq!(outcome.entries.len(), 1);
        assert_eq!(outcome.entries[0].rule_id, early_id);
    }

    #[test]
    fn test_inactive_rules_ignored() {
        let chart = Chart::new();
        let mut r = rule(
            "IC AR/AP",
            vec![chart.ic_receivable],
            vec![],
            chart.ic_payable,
            chart.ic_receivable,
            1,
            true,
        );
        r.is_active = false;
        let outcome = EliminationEngine::evaluate(&[r], pre_balances(&chart), Currency::Usd);
        assert!(outcome.entries.is_empty());
    }

    #[test]
    fn test_zero_target_produces_no_entry() {
        let chart = Chart::new();
        let r = rule(
            "IC revenue/expense",
            vec![chart.ic_revenue],
            vec![chart.ic_expense],
            chart.ic_revenue,
            chart.ic_expense,
            1,
            true,
        );
        let outcome = EliminationEngine::evaluate(&[r], pre_balances(&chart), Currency::Usd);
        assert!(outcome.entries.is_empty());
        assert!(outcome.proposals.is_empty());
    }

    #[test]
    fn test_apply_replays_entries() {
        let chart = Chart::new();
        let r = rule(
            "IC AR/AP",
            vec![chart.ic_receivable],
            vec![chart.ic_payable],
            chart.ic_payable,
            chart.ic_receivable,
            1,
            true,
        );
        let outcome = EliminationEngine::evaluate(&[r], pre_balances(&chart), Currency::Usd);
        let mut replayed = pre_balances(&chart);
        EliminationEngine::apply(&mut replayed, &outcome.entries);
        assert_eq!(replayed, outcome.balances);
    }
}
