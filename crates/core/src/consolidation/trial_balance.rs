//! Consolidated trial balance builder.
//!
//! Each line keeps the three layers that produce its final balance:
//! weighted and translated company balances, eliminations, and NCI.

use consolida_shared::types::{AccountId, ConsolidationRunId, Currency};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::elimination::EliminationEntry;
use super::error::ConsolidationError;
use super::pipeline::{CompanyContribution, NciAdjustment};
use crate::ledger::BalanceMap;

/// One account of the consolidated trial balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidatedBalanceLine {
    /// The account.
    pub account_id: AccountId,
    /// Sum of company contributions.
    pub pre_elimination: Decimal,
    /// Net effect of elimination entries.
    pub eliminations: Decimal,
    /// Net effect of NCI adjustments.
    pub nci: Decimal,
    /// Final signed balance.
    pub balance: Decimal,
}

/// Final signed balances of a run, in the reporting currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidatedTrialBalance {
    /// Run that produced the balances.
    pub run_id: ConsolidationRunId,
    /// Reporting currency.
    pub currency: Currency,
    /// Non-zero lines, ordered by account ID.
    pub lines: Vec<ConsolidatedBalanceLine>,
    /// Sum of debit balances.
    pub total_debits: Decimal,
    /// Sum of credit balances, as a positive amount.
    pub total_credits: Decimal,
}

impl ConsolidatedTrialBalance {
    /// A trial balance with no lines.
    #[must_use]
    pub fn empty(run_id: ConsolidationRunId, currency: Currency) -> Self {
        Self {
            run_id,
            currency,
            lines: Vec::new(),
            total_debits: Decimal::ZERO,
            total_credits: Decimal::ZERO,
        }
    }

    /// Combines contributions, eliminations and NCI adjustments.
    #[must_use]
    pub fn build(
        run_id: ConsolidationRunId,
        currency: Currency,
        contributions: &[CompanyContribution],
        eliminations: &[EliminationEntry],
        nci_adjustments: &[NciAdjustment],
    ) -> Self {
        let mut pre = BalanceMap::new();
        for contribution in contributions {
            pre.merge(&contribution.balances);
        }

        let mut elim = BalanceMap::new();
        for entry in eliminations {
            elim.post(entry.debit_account_id, entry.credit_account_id, entry.amount.amount);
        }

        let mut nci_map = BalanceMap::new();
        for adjustment in nci_adjustments {
            nci_map.post(
                adjustment.debit_account_id,
                adjustment.credit_account_id,
                adjustment.amount.amount,
            );
        }

        let mut account_ids: Vec<AccountId> = pre
            .account_ids()
            .chain(elim.account_ids())
            .chain(nci_map.account_ids())
            .collect();
        account_ids.sort_unstable();
        account_ids.dedup();

        let lines: Vec<ConsolidatedBalanceLine> = account_ids
            .into_iter()
            .map(|account_id| {
                let pre_elimination = pre.get(account_id);
                let eliminations = elim.get(account_id);
                let nci = nci_map.get(account_id);
                ConsolidatedBalanceLine {
                    account_id,
                    pre_elimination,
                    eliminations,
                    nci,
                    balance: pre_elimination + eliminations + nci,
                }
            })
            .filter(|line| {
                !(line.pre_elimination.is_zero()
                    && line.eliminations.is_zero()
                    && line.nci.is_zero())
            })
            .collect();

        let balances = Self::collect_balances(&lines);
        Self {
            run_id,
            currency,
            lines,
            total_debits: balances.total_debits(),
            total_credits: balances.total_credits(),
        }
    }

    /// Final balance of an account (zero if absent).
    #[must_use]
    pub fn balance(&self, account_id: AccountId) -> Decimal {
        self.lines
            .iter()
            .find(|l| l.account_id == account_id)
            .map_or(Decimal::ZERO, |l| l.balance)
    }

    /// Final balances as a map.
    #[must_use]
    pub fn balances(&self) -> BalanceMap {
        Self::collect_balances(&self.lines)
    }

    /// Sum of all final balances.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.lines.iter().map(|l| l.balance).sum()
    }

    /// Returns true if balances sum to zero at the currency's minor units.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.currency.is_negligible(self.total())
    }

    /// Fails unless the trial balance is balanced.
    pub fn ensure_balanced(&self) -> Result<(), ConsolidationError> {
        if self.is_balanced() {
            Ok(())
        } else {
            Err(ConsolidationError::TrialBalanceNotBalanced {
                residual: self.total(),
            })
        }
    }

    /// Returns true if every balance is zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(|l| l.balance.is_zero())
    }

    fn collect_balances(lines: &[ConsolidatedBalanceLine]) -> BalanceMap {
        lines.iter().map(|l| (l.account_id, l.balance)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consolidation::ownership::ConsolidationMethod;
    use crate::consolidation::rules::EliminationType;
    use consolida_shared::types::{CompanyId, EliminationEntryId, EliminationRuleId, Money};
    use rust_decimal_macros::dec;

    fn contribution(balances: BalanceMap) -> CompanyContribution {
        CompanyContribution {
            company_id: CompanyId::new(),
            method: ConsolidationMethod::FullConsolidation,
            weight: Decimal::ONE,
            currency: Currency::Usd,
            balances,
            net_income: Decimal::ZERO,
        }
    }

    #[test]
    fn test_build_layers_add_up() {
        let receivable = AccountId::new();
        let payable = AccountId::new();
        let cash = AccountId::new();
        let equity = AccountId::new();

        let parent: BalanceMap = [(receivable, dec!(300)), (cash, dec!(700)), (equity, dec!(-1000))]
            .into_iter()
            .collect();
        let sub: BalanceMap = [(cash, dec!(300)), (payable, dec!(-300))].into_iter().collect();

        let entry = EliminationEntry {
            id: EliminationEntryId::new(),
            rule_id: EliminationRuleId::new(),
            elimination_type: EliminationType::IntercompanyReceivablePayable,
            condition_index: 0,
            debit_account_id: payable,
            credit_account_id: receivable,
            amount: Money::new(dec!(300), Currency::Usd),
            description: "IC".into(),
        };

        let tb = ConsolidatedTrialBalance::build(
            ConsolidationRunId::new(),
            Currency::Usd,
            &[contribution(parent), contribution(sub)],
            &[entry],
            &[],
        );

        assert!(tb.is_balanced());
        assert_eq!(tb.balance(cash), dec!(1000));
        assert_eq!(tb.balance(receivable), Decimal::ZERO);
        assert_eq!(tb.balance(payable), Decimal::ZERO);
        assert_eq!(tb.total_debits, dec!(1000));
        assert_eq!(tb.total_credits, dec!(1000));

        let line = tb.lines.iter().find(|l| l.account_id == receivable).unwrap();
        assert_eq!(line.pre_elimination, dec!(300));
        assert_eq!(line.eliminations, dec!(-300));
    }

    #[test]
    fn test_unbalanced_detected() {
        let tb = ConsolidatedTrialBalance::build(
            ConsolidationRunId::new(),
            Currency::Usd,
            &[contribution([(AccountId::new(), dec!(5))].into_iter().collect())],
            &[],
            &[],
        );
        assert!(!tb.is_balanced());
        assert!(matches!(
            tb.ensure_balanced(),
            Err(ConsolidationError::TrialBalanceNotBalanced { residual }) if residual == dec!(5)
        ));
    }

    #[test]
    fn test_empty_trial_balance() {
        let tb = ConsolidatedTrialBalance::empty(ConsolidationRunId::new(), Currency::Eur);
        assert!(tb.is_empty());
        assert!(tb.is_balanced());
    }
}
