//! Account balance calculations.
//!
//! Balances are carried signed: debit minus credit. A balanced set of
//! accounts therefore always sums to zero.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use consolida_shared::types::{AccountId, CompanyId, Currency};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Debit and credit totals for one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialBalanceLine {
    /// The account ID.
    pub account_id: AccountId,
    /// Total debit amount.
    pub debit: Decimal,
    /// Total credit amount.
    pub credit: Decimal,
}

impl TrialBalanceLine {
    /// Signed balance: debit minus credit.
    #[must_use]
    pub fn signed(&self) -> Decimal {
        self.debit - self.credit
    }
}

/// A company's trial balance in its functional currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyTrialBalance {
    /// The company.
    pub company_id: CompanyId,
    /// Functional currency of the amounts.
    pub currency: Currency,
    /// Cumulative balances up to and including this date.
    pub as_of: NaiveDate,
    /// Per-account totals.
    pub lines: Vec<TrialBalanceLine>,
}

impl CompanyTrialBalance {
    /// Collapses the lines into signed balances.
    #[must_use]
    pub fn signed_balances(&self) -> BalanceMap {
        let mut balances = BalanceMap::new();
        for line in &self.lines {
            balances.add(line.account_id, line.signed());
        }
        balances
    }

    /// Debits minus credits across all lines.
    #[must_use]
    pub fn residual(&self) -> Decimal {
        self.lines.iter().map(TrialBalanceLine::signed).sum()
    }

    /// Returns true if debits equal credits at the currency's minor units.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.currency.is_negligible(self.residual())
    }
}

/// Signed balances keyed by account.
///
/// Ordered so that iteration (and anything derived from it) is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BalanceMap {
    balances: BTreeMap<AccountId, Decimal>,
}

impl BalanceMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a signed amount to an account.
    pub fn add(&mut self, account_id: AccountId, amount: Decimal) {
        *self.balances.entry(account_id).or_insert(Decimal::ZERO) += amount;
    }

    /// Posts a debit/credit pair of equal amounts.
    pub fn post(
        &mut self,
        debit_account_id: AccountId,
        credit_account_id: AccountId,
        amount: Decimal,
    ) {
        self.add(debit_account_id, amount);
        self.add(credit_account_id, -amount);
    }

    /// Adds every balance of another map.
    pub fn merge(&mut self, other: &Self) {
        for (account_id, amount) in other.iter() {
            self.add(account_id, amount);
        }
    }

    /// Signed balance of an account (zero if absent).
    #[must_use]
    pub fn get(&self, account_id: AccountId) -> Decimal {
        self.balances.get(&account_id).copied().unwrap_or(Decimal::ZERO)
    }

    /// Net signed balance across a set of accounts.
    #[must_use]
    pub fn net_of(&self, account_ids: &[AccountId]) -> Decimal {
        account_ids.iter().map(|id| self.get(*id)).sum()
    }

    /// Sum of all balances. Zero for a balanced set.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.balances.values().copied().sum()
    }

    /// Sum of positive (debit) balances.
    #[must_use]
    pub fn total_debits(&self) -> Decimal {
        self.balances.values().filter(|v| v.is_sign_positive()).copied().sum()
    }

    /// Sum of negative (credit) balances, as a positive amount.
    #[must_use]
    pub fn total_credits(&self) -> Decimal {
        -self
            .balances
            .values()
            .filter(|v| v.is_sign_negative())
            .copied()
            .sum::<Decimal>()
    }

    /// Multiplies every balance by a factor.
    #[must_use]
    pub fn scaled(&self, factor: Decimal) -> Self {
        let balances = self
            .balances
            .iter()
            .map(|(id, amount)| (*id, *amount * factor))
            .collect();
        Self { balances }
    }

    /// Drops accounts whose balance is exactly zero.
    pub fn prune_zero(&mut self) {
        self.balances.retain(|_, amount| !amount.is_zero());
    }

    /// Iterates accounts in ID order.
    pub fn iter(&self) -> impl Iterator<Item = (AccountId, Decimal)> + '_ {
        self.balances.iter().map(|(id, amount)| (*id, *amount))
    }

    /// Account IDs with a balance entry.
    pub fn account_ids(&self) -> impl Iterator<Item = AccountId> + '_ {
        self.balances.keys().copied()
    }

    /// Number of accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.balances.len()
    }

    /// Returns true if no account has an entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }
}

impl FromIterator<(AccountId, Decimal)> for BalanceMap {
    fn from_iter<T: IntoIterator<Item = (AccountId, Decimal)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (account_id, amount) in iter {
            map.add(account_id, amount);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()
    }

    #[test]
    fn test_line_signed_balance() {
        let line = TrialBalanceLine {
            account_id: AccountId::new(),
            debit: dec!(100),
            credit: dec!(40),
        };
        assert_eq!(line.signed(), dec!(60));
    }

    #[test]
    fn test_company_trial_balance_is_balanced() {
        let cash = AccountId::new();
        let equity = AccountId::new();
        let tb = CompanyTrialBalance {
            company_id: CompanyId::new(),
            currency: Currency::Usd,
            as_of: date(),
            lines: vec![
                TrialBalanceLine { account_id: cash, debit: dec!(500), credit: dec!(0) },
                TrialBalanceLine { account_id: equity, debit: dec!(0), credit: dec!(500) },
            ],
        };
        assert!(tb.is_balanced());
        assert_eq!(tb.signed_balances().get(equity), dec!(-500));
    }

    #[test]
    fn test_company_trial_balance_detects_residual() {
        let tb = CompanyTrialBalance {
            company_id: CompanyId::new(),
            currency: Currency::Usd,
            as_of: date(),
            lines: vec![TrialBalanceLine {
                account_id: AccountId::new(),
                debit: dec!(10),
                credit: dec!(0),
            }],
        };
        assert!(!tb.is_balanced());
        assert_eq!(tb.residual(), dec!(10));
    }

    #[test]
    fn test_post_keeps_total_zero() {
        let a = AccountId::new();
        let b = AccountId::new();
        let mut map = BalanceMap::new();
        map.post(a, b, dec!(250.75));
        assert_eq!(map.get(a), dec!(250.75));
        assert_eq!(map.get(b), dec!(-250.75));
        assert_eq!(map.total(), Decimal::ZERO);
        assert_eq!(map.total_debits(), dec!(250.75));
        assert_eq!(map.total_credits(), dec!(250.75));
    }

    #[test]
    fn test_net_of_and_scaled() {
        let a = AccountId::new();
        let b = AccountId::new();
        let map: BalanceMap = [(a, dec!(100)), (b, dec!(-30))].into_iter().collect();
        assert_eq!(map.net_of(&[a, b]), dec!(70));
        assert_eq!(map.scaled(dec!(0.5)).get(a), dec!(50.0));
        assert_eq!(map.get(AccountId::new()), Decimal::ZERO);
    }

    #[test]
    fn test_prune_zero() {
        let a = AccountId::new();
        let b = AccountId::new();
        let mut map = BalanceMap::new();
        map.post(a, b, dec!(5));
        map.post(b, a, dec!(5));
        map.prune_zero();
        assert!(map.is_empty());
    }
}
