//! Pure computations behind the consolidation steps.
//!
//! The orchestrator in the service loads data through the repositories and
//! hands it to these functions. Nothing here performs I/O.

use std::collections::HashMap;

use chrono::NaiveDate;
use consolida_shared::types::{AccountId, CompanyId, Currency, Money};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::elimination::ProposedElimination;
use super::error::ConsolidationError;
use super::group::{ConsolidationAccounts, ConsolidationGroup};
use super::ownership::{ConsolidationMethod, Percentage};
use super::run::{ValidationIssue, ValidationResult};
use super::trial_balance::ConsolidatedTrialBalance;
use crate::currency::CurrencyService;
use crate::ledger::{Account, AccountType, BalanceMap, CompanyTrialBalance};

/// Chart of accounts indexed by ID.
#[derive(Debug, Clone, Default)]
pub struct AccountIndex {
    accounts: HashMap<AccountId, Account>,
}

impl AccountIndex {
    /// Indexes a chart of accounts.
    #[must_use]
    pub fn new(accounts: Vec<Account>) -> Self {
        Self {
            accounts: accounts.into_iter().map(|a| (a.id, a)).collect(),
        }
    }

    /// Looks up an account.
    #[must_use]
    pub fn get(&self, account_id: AccountId) -> Option<&Account> {
        self.accounts.get(&account_id)
    }

    /// Looks up an account or fails.
    pub fn require(&self, account_id: AccountId) -> Result<&Account, ConsolidationError> {
        self.get(account_id)
            .ok_or(ConsolidationError::AccountNotFound(account_id))
    }

    /// Net income of a balance set: revenue minus expenses.
    pub fn net_income(&self, balances: &BalanceMap) -> Result<Decimal, ConsolidationError> {
        let mut signed = Decimal::ZERO;
        for (account_id, amount) in balances.iter() {
            if self.require(account_id)?.account_type.is_income_statement() {
                signed += amount;
            }
        }
        Ok(-signed)
    }
}

/// A company as it enters a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberScope {
    /// The company.
    pub company_id: CompanyId,
    /// Method applied.
    pub method: ConsolidationMethod,
    /// Parent's ownership share.
    pub ownership: Percentage,
}

/// Which members of a group a run includes.
#[derive(Debug, Clone, Default)]
pub struct RunScope {
    /// Companies consolidated, parent first.
    pub included: Vec<MemberScope>,
    /// Members acquired after the as-of date.
    pub not_yet_acquired: Vec<CompanyId>,
    /// Equity-method members left out by the run options.
    pub equity_method_excluded: Vec<CompanyId>,
}

impl RunScope {
    /// Resolves the companies a run consolidates.
    #[must_use]
    pub fn resolve(
        group: &ConsolidationGroup,
        as_of: NaiveDate,
        include_equity_method: bool,
    ) -> Self {
        let mut scope = Self {
            included: vec![MemberScope {
                company_id: group.parent_company_id,
                method: ConsolidationMethod::FullConsolidation,
                ownership: Percentage::HUNDRED,
            }],
            ..Self::default()
        };
        for member in &group.members {
            if !member.is_acquired_by(as_of) {
                scope.not_yet_acquired.push(member.company_id);
                continue;
            }
            let method = member.effective_method(group.consolidation_method);
            if method == ConsolidationMethod::EquityMethod && !include_equity_method {
                scope.equity_method_excluded.push(member.company_id);
                continue;
            }
            scope.included.push(MemberScope {
                company_id: member.company_id,
                method,
                ownership: member.ownership_percentage,
            });
        }
        scope
    }
}

/// A company's weighted balances as they enter the consolidation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyContribution {
    /// The company.
    pub company_id: CompanyId,
    /// Method applied.
    pub method: ConsolidationMethod,
    /// Share of balances taken (1 for full consolidation).
    pub weight: Decimal,
    /// Currency of `balances`.
    pub currency: Currency,
    /// Weighted signed balances.
    pub balances: BalanceMap,
    /// Company's own net income before weighting, in `currency`.
    pub net_income: Decimal,
}

impl CompanyContribution {
    /// Weights a company's trial balance by its consolidation method.
    ///
    /// Equity-method members contribute only their share of net income as an
    /// investment (debit) and share-of-profit (credit) pair.
    pub fn from_trial_balance(
        scope: &MemberScope,
        trial_balance: &CompanyTrialBalance,
        accounts: &AccountIndex,
        group_accounts: &ConsolidationAccounts,
    ) -> Result<Self, ConsolidationError> {
        if !trial_balance.is_balanced() {
            return Err(ConsolidationError::CompanyTrialBalanceNotBalanced {
                company_id: scope.company_id,
                residual: trial_balance.residual(),
            });
        }
        let own = trial_balance.signed_balances();
        let net_income = accounts.net_income(&own)?;
        let ratio = scope.ownership.as_ratio();

        let (weight, balances) = match scope.method {
            ConsolidationMethod::FullConsolidation => (Decimal::ONE, own),
            ConsolidationMethod::ProportionalConsolidation => (ratio, own.scaled(ratio)),
            ConsolidationMethod::EquityMethod => {
                let investment = ConsolidationAccounts::require(
                    group_accounts.equity_method_investment_account_id,
                    "equity_method_investment",
                )?;
                let income = ConsolidationAccounts::require(
                    group_accounts.equity_method_income_account_id,
                    "equity_method_income",
                )?;
                let mut pickup = BalanceMap::new();
                let share = net_income * ratio;
                if !share.is_zero() {
                    pickup.post(investment, income, share);
                }
                (ratio, pickup)
            }
        };

        Ok(Self {
            company_id: scope.company_id,
            method: scope.method,
            weight,
            currency: trial_balance.currency,
            balances,
            net_income,
        })
    }

    /// Translates the contribution into the reporting currency.
    ///
    /// Balance sheet accounts use the closing rate, income statement accounts
    /// the average rate. Whatever the rate mix leaves unbalanced goes to the
    /// translation reserve.
    pub fn translate(
        &self,
        reporting_currency: Currency,
        rates: TranslationRates,
        precision: u32,
        accounts: &AccountIndex,
        translation_reserve: Option<AccountId>,
    ) -> Result<Self, ConsolidationError> {
        if self.currency == reporting_currency {
            return Ok(self.clone());
        }
        let mut translated = BalanceMap::new();
        for (account_id, amount) in self.balances.iter() {
            let rate = if accounts.require(account_id)?.account_type.is_income_statement() {
                rates.average
            } else {
                rates.closing
            };
            translated.add(account_id, CurrencyService::convert(amount, rate, precision));
        }

        let residual = translated.total();
        if !residual.is_zero() {
            let reserve =
                ConsolidationAccounts::require(translation_reserve, "translation_reserve")?;
            translated.add(reserve, -residual);
        }

        Ok(Self {
            company_id: self.company_id,
            method: self.method,
            weight: self.weight,
            currency: reporting_currency,
            balances: translated,
            net_income: CurrencyService::convert(self.net_income, rates.average, precision),
        })
    }
}

/// Rates used to translate one company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationRates {
    /// Rate on the as-of date.
    pub closing: Decimal,
    /// Year-to-date average rate.
    pub average: Decimal,
}

/// What an NCI adjustment moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NciAdjustmentKind {
    /// Minority share of the subsidiary's profit or loss.
    ProfitShare,
    /// Minority share of one of the subsidiary's equity accounts.
    EquityReclassification,
}

/// A posting that attributes part of a subsidiary to non-controlling interest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NciAdjustment {
    /// Subsidiary concerned.
    pub company_id: CompanyId,
    /// What is moved.
    pub kind: NciAdjustmentKind,
    /// Account debited.
    pub debit_account_id: AccountId,
    /// Account credited.
    pub credit_account_id: AccountId,
    /// Positive amount in the reporting currency.
    pub amount: Money,
    /// Human-readable description.
    pub description: String,
}

/// Computes NCI adjustments for fully consolidated members held below 100%.
///
/// For each such member:
/// - NCI% of its net income moves from the NCI profit share line to NCI equity;
/// - NCI% of each of its equity accounts is reclassified to NCI equity.
///
/// Together these put NCI% of the member's net assets in NCI equity.
pub fn compute_nci_adjustments(
    group: &ConsolidationGroup,
    contributions: &[CompanyContribution],
    accounts: &AccountIndex,
    currency: Currency,
) -> Result<Vec<NciAdjustment>, ConsolidationError> {
    let mut adjustments = Vec::new();

    for contribution in contributions {
        if contribution.method != ConsolidationMethod::FullConsolidation {
            continue;
        }
        let Some(member) = group.member(contribution.company_id) else {
            continue; // parent
        };
        let nci = member.non_controlling_interest_percentage;
        if nci.is_zero() {
            continue;
        }
        let ratio = nci.as_ratio();
        let nci_equity = ConsolidationAccounts::require(
            group.accounts.nci_equity_account_id,
            "nci_equity",
        )?;

        let profit_share = contribution.net_income * ratio;
        if !profit_share.is_zero() {
            let nci_profit = ConsolidationAccounts::require(
                group.accounts.nci_profit_share_account_id,
                "nci_profit_share",
            )?;
            let (debit, credit) = if profit_share.is_sign_positive() {
                (nci_profit, nci_equity)
            } else {
                (nci_equity, nci_profit)
            };
            adjustments.push(NciAdjustment {
                company_id: contribution.company_id,
                kind: NciAdjustmentKind::ProfitShare,
                debit_account_id: debit,
                credit_account_id: credit,
                amount: Money::new(profit_share.abs(), currency),
                description: format!("NCI {nci} share of net income"),
            });
        }

        for (account_id, signed) in contribution.balances.iter() {
            if account_id == nci_equity || signed.is_zero() {
                continue;
            }
            let account = accounts.require(account_id)?;
            if account.account_type != AccountType::Equity {
                continue;
            }
            // Equity carries credit balances; moving the NCI share of a credit
            // balance means debiting the account and crediting NCI equity.
            let share = -signed * ratio;
            let (debit, credit) = if share.is_sign_positive() {
                (account_id, nci_equity)
            } else {
                (nci_equity, account_id)
            };
            adjustments.push(NciAdjustment {
                company_id: contribution.company_id,
                kind: NciAdjustmentKind::EquityReclassification,
                debit_account_id: debit,
                credit_account_id: credit,
                amount: Money::new(share.abs(), currency),
                description: format!("NCI {nci} share of {}", account.name),
            });
        }
    }

    Ok(adjustments)
}

/// Validation codes.
pub mod issue {
    /// Consolidated trial balance does not sum to zero.
    pub const TRIAL_BALANCE_NOT_BALANCED: &str = "TRIAL_BALANCE_NOT_BALANCED";
    /// Intercompany account still carries a balance.
    pub const INTERCOMPANY_RESIDUAL: &str = "INTERCOMPANY_RESIDUAL";
    /// Manual rule proposed an entry nobody applied.
    pub const PENDING_MANUAL_ELIMINATION: &str = "PENDING_MANUAL_ELIMINATION";
    /// Fully consolidated without majority ownership or VIE support.
    pub const CONTROL_NOT_ESTABLISHED: &str = "CONTROL_NOT_ESTABLISHED";
    /// Member acquired after the as-of date.
    pub const MEMBER_NOT_YET_ACQUIRED: &str = "MEMBER_NOT_YET_ACQUIRED";
}

/// Checks a consolidated result.
#[must_use]
pub fn validate(
    trial_balance: &ConsolidatedTrialBalance,
    accounts: &AccountIndex,
    proposals: &[ProposedElimination],
    group: &ConsolidationGroup,
    scope: &RunScope,
) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if !trial_balance.is_balanced() {
        errors.push(ValidationIssue {
            code: issue::TRIAL_BALANCE_NOT_BALANCED.to_string(),
            message: format!(
                "Consolidated balances sum to {} instead of zero",
                trial_balance.total()
            ),
            account_id: None,
            company_id: None,
        });
    }

    for line in &trial_balance.lines {
        let Some(account) = accounts.get(line.account_id) else {
            continue;
        };
        if account.is_intercompany && !trial_balance.currency.is_negligible(line.balance) {
            warnings.push(ValidationIssue {
                code: issue::INTERCOMPANY_RESIDUAL.to_string(),
                message: format!(
                    "Intercompany account {} {} retains {} after elimination",
                    account.code, account.name, line.balance
                ),
                account_id: Some(account.id),
                company_id: None,
            });
        }
    }

    for proposal in proposals {
        warnings.push(ValidationIssue {
            code: issue::PENDING_MANUAL_ELIMINATION.to_string(),
            message: format!("Manual elimination pending review: {}", proposal.description),
            account_id: Some(proposal.debit_account_id),
            company_id: None,
        });
    }

    for included in &scope.included {
        let Some(member) = group.member(included.company_id) else {
            continue;
        };
        if included.method == ConsolidationMethod::FullConsolidation
            && !member.ownership_percentage.is_controlling()
            && !member.is_primary_beneficiary()
        {
            warnings.push(ValidationIssue {
                code: issue::CONTROL_NOT_ESTABLISHED.to_string(),
                message: format!(
                    "Company {} is fully consolidated at {} without a VIE determination",
                    member.company_id, member.ownership_percentage
                ),
                account_id: None,
                company_id: Some(member.company_id),
            });
        }
    }

    for company_id in &scope.not_yet_acquired {
        warnings.push(ValidationIssue {
            code: issue::MEMBER_NOT_YET_ACQUIRED.to_string(),
            message: format!(
                "Company {company_id} was acquired after the as-of date and is excluded"
            ),
            account_id: None,
            company_id: Some(*company_id),
        });
    }

    ValidationResult::new(errors, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consolidation::group::{CreateGroupInput, MemberInput};
    use crate::consolidation::ownership::VieDetermination;
    use crate::ledger::TrialBalanceLine;
    use chrono::Utc;
    use consolida_shared::types::{ConsolidationRunId, OrganizationId};
    use rust_decimal_macros::dec;

    struct Fixture {
        org: OrganizationId,
        cash: Account,
        share_capital: Account,
        retained: Account,
        revenue: Account,
        expense: Account,
        nci_equity: Account,
        nci_profit: Account,
        cta: Account,
        investment: Account,
        associate_income: Account,
    }

    fn account(org: OrganizationId, code: &str, account_type: AccountType) -> Account {
        Account {
            id: AccountId::new(),
            organization_id: org,
            code: code.to_string(),
            name: format!("Account {code}"),
            account_type,
            account_subtype: None,
            is_intercompany: false,
            is_cash_flow_relevant: false,
            cash_flow_category: None,
            is_active: true,
        }
    }

    impl Fixture {
        fn new() -> Self {
            let org = OrganizationId::new();
            Self {
                org,
                cash: account(org, "1000", AccountType::Asset),
                share_capital: account(org, "3000", AccountType::Equity),
                retained: account(org, "3100", AccountType::Equity),
                revenue: account(org, "4000", AccountType::Revenue),
                expense: account(org, "5000", AccountType::Expense),
                nci_equity: account(org, "3900", AccountType::Equity),
                nci_profit: account(org, "5900", AccountType::Expense),
                cta: account(org, "3800", AccountType::Equity),
                investment: account(org, "1500", AccountType::Asset),
                associate_income: account(org, "4500", AccountType::Revenue),
            }
        }

        fn index(&self) -> AccountIndex {
            AccountIndex::new(vec![
                self.cash.clone(),
                self.share_capital.clone(),
                self.retained.clone(),
                self.revenue.clone(),
                self.expense.clone(),
                self.nci_equity.clone(),
                self.nci_profit.clone(),
                self.cta.clone(),
                self.investment.clone(),
                self.associate_income.clone(),
            ])
        }

        fn group_accounts(&self) -> ConsolidationAccounts {
            ConsolidationAccounts {
                nci_equity_account_id: Some(self.nci_equity.id),
                nci_profit_share_account_id: Some(self.nci_profit.id),
                translation_reserve_account_id: Some(self.cta.id),
                equity_method_investment_account_id: Some(self.investment.id),
                equity_method_income_account_id: Some(self.associate_income.id),
            }
        }

        /// Cash 1000 = capital 600 + retained 200 + (revenue 500 - expense 300).
        fn subsidiary_tb(&self, company_id: CompanyId, currency: Currency) -> CompanyTrialBalance {
            let line = |account: &Account, debit: Decimal, credit: Decimal| TrialBalanceLine {
                account_id: account.id,
                debit,
                credit,
            };
            CompanyTrialBalance {
                company_id,
                currency,
                as_of: NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
                lines: vec![
                    line(&self.cash, dec!(1000), dec!(0)),
                    line(&self.share_capital, dec!(0), dec!(600)),
                    line(&self.retained, dec!(0), dec!(200)),
                    line(&self.revenue, dec!(0), dec!(500)),
                    line(&self.expense, dec!(300), dec!(0)),
                ],
            }
        }

        fn group(
            &self,
            sub: CompanyId,
            ownership: Decimal,
            vie: Option<VieDetermination>,
        ) -> ConsolidationGroup {
            ConsolidationGroup::create(
                self.org,
                CreateGroupInput {
                    name: "Group".into(),
                    description: None,
                    reporting_currency: Currency::Usd,
                    consolidation_method: ConsolidationMethod::FullConsolidation,
                    parent_company_id: CompanyId::new(),
                    members: vec![MemberInput {
                        company_id: sub,
                        ownership_percentage: ownership,
                        consolidation_method: None,
                        acquisition_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                        goodwill_amount: None,
                        vie_determination: vie,
                    }],
                    accounts: self.group_accounts(),
                },
                Utc::now(),
            )
            .unwrap()
        }
    }

    fn scope(
        company_id: CompanyId,
        method: ConsolidationMethod,
        ownership: Decimal,
    ) -> MemberScope {
        MemberScope {
            company_id,
            method,
            ownership: Percentage::new(ownership).unwrap(),
        }
    }

    #[test]
    fn test_net_income() {
        let f = Fixture::new();
        let tb = f.subsidiary_tb(CompanyId::new(), Currency::Usd);
        assert_eq!(f.index().net_income(&tb.signed_balances()).unwrap(), dec!(200));
    }

    #[test]
    fn test_full_consolidation_takes_all_balances() {
        let f = Fixture::new();
        let sub = CompanyId::new();
        let c = CompanyContribution::from_trial_balance(
            &scope(sub, ConsolidationMethod::FullConsolidation, dec!(80)),
            &f.subsidiary_tb(sub, Currency::Usd),
            &f.index(),
            &f.group_accounts(),
        )
        .unwrap();
        assert_eq!(c.weight, Decimal::ONE);
        assert_eq!(c.balances.get(f.cash.id), dec!(1000));
        assert_eq!(c.net_income, dec!(200));
    }

    #[test]
    fn test_proportional_weights_balances() {
        let f = Fixture::new();
        let sub = CompanyId::new();
        let c = CompanyContribution::from_trial_balance(
            &scope(sub, ConsolidationMethod::ProportionalConsolidation, dec!(40)),
            &f.subsidiary_tb(sub, Currency::Usd),
            &f.index(),
            &f.group_accounts(),
        )
        .unwrap();
        assert_eq!(c.balances.get(f.cash.id), dec!(400));
        assert_eq!(c.balances.get(f.revenue.id), dec!(-200));
        assert_eq!(c.balances.total(), Decimal::ZERO);
    }

    #[test]
    fn test_equity_method_picks_up_share_of_profit() {
        let f = Fixture::new();
        let sub = CompanyId::new();
        let c = CompanyContribution::from_trial_balance(
            &scope(sub, ConsolidationMethod::EquityMethod, dec!(30)),
            &f.subsidiary_tb(sub, Currency::Usd),
            &f.index(),
            &f.group_accounts(),
        )
        .unwrap();
        assert_eq!(c.balances.len(), 2);
        assert_eq!(c.balances.get(f.investment.id), dec!(60));
        assert_eq!(c.balances.get(f.associate_income.id), dec!(-60));
        assert_eq!(c.balances.get(f.cash.id), Decimal::ZERO);
    }

    #[test]
    fn test_equity_method_requires_accounts() {
        let f = Fixture::new();
        let sub = CompanyId::new();
        let result = CompanyContribution::from_trial_balance(
            &scope(sub, ConsolidationMethod::EquityMethod, dec!(30)),
            &f.subsidiary_tb(sub, Currency::Usd),
            &f.index(),
            &ConsolidationAccounts::default(),
        );
        assert!(matches!(
            result,
            Err(ConsolidationError::AccountNotConfigured { purpose: "equity_method_investment" })
        ));
    }

    #[test]
    fn test_unbalanced_company_rejected() {
        let f = Fixture::new();
        let sub = CompanyId::new();
        let mut tb = f.subsidiary_tb(sub, Currency::Usd);
        tb.lines[0].debit = dec!(1001);
        let result = CompanyContribution::from_trial_balance(
            &scope(sub, ConsolidationMethod::FullConsolidation, dec!(100)),
            &tb,
            &f.index(),
            &f.group_accounts(),
        );
        assert!(matches!(
            result,
            Err(ConsolidationError::CompanyTrialBalanceNotBalanced { .. })
        ));
    }

    #[test]
    fn test_translation_plugs_difference_to_reserve() {
        let f = Fixture::new();
        let sub = CompanyId::new();
        let c = CompanyContribution::from_trial_balance(
            &scope(sub, ConsolidationMethod::FullConsolidation, dec!(100)),
            &f.subsidiary_tb(sub, Currency::Eur),
            &f.index(),
            &f.group_accounts(),
        )
        .unwrap();
        let translated = c
            .translate(
                Currency::Usd,
                TranslationRates {
                    closing: dec!(1.2),
                    average: dec!(1.1),
                },
                4,
                &f.index(),
                Some(f.cta.id),
            )
            .unwrap();

        assert_eq!(translated.currency, Currency::Usd);
        assert_eq!(translated.balances.get(f.cash.id), dec!(1200));
        assert_eq!(translated.balances.get(f.revenue.id), dec!(-550));
        // 1200 - 720 - 240 - 550 + 330 = 20 of debit residual goes to the reserve
        assert_eq!(translated.balances.get(f.cta.id), dec!(-20));
        assert_eq!(translated.balances.total(), Decimal::ZERO);
        assert_eq!(translated.net_income, dec!(220));
    }

    #[test]
    fn test_translation_without_reserve_account_fails() {
        let f = Fixture::new();
        let sub = CompanyId::new();
        let c = CompanyContribution::from_trial_balance(
            &scope(sub, ConsolidationMethod::FullConsolidation, dec!(100)),
            &f.subsidiary_tb(sub, Currency::Eur),
            &f.index(),
            &f.group_accounts(),
        )
        .unwrap();
        let result = c.translate(
            Currency::Usd,
            TranslationRates {
                closing: dec!(1.2),
                average: dec!(1.1),
            },
            4,
            &f.index(),
            None,
        );
        assert!(matches!(
            result,
            Err(ConsolidationError::AccountNotConfigured { purpose: "translation_reserve" })
        ));
    }

    #[test]
    fn test_nci_adjustments_move_share_of_net_assets() {
        let f = Fixture::new();
        let sub = CompanyId::new();
        let group = f.group(sub, dec!(80), None);
        let c = CompanyContribution::from_trial_balance(
            &scope(sub, ConsolidationMethod::FullConsolidation, dec!(80)),
            &f.subsidiary_tb(sub, Currency::Usd),
            &f.index(),
            &group.accounts,
        )
        .unwrap();

        let adjustments =
            compute_nci_adjustments(&group, &[c.clone()], &f.index(), Currency::Usd).unwrap();
        let tb = ConsolidatedTrialBalance::build(
            ConsolidationRunId::new(),
            Currency::Usd,
            &[c],
            &[],
            &adjustments,
        );

        // 20% of net assets (1000) ends up in NCI equity
        assert_eq!(tb.balance(f.nci_equity.id), dec!(-200));
        assert_eq!(tb.balance(f.nci_profit.id), dec!(40));
        assert_eq!(tb.balance(f.share_capital.id), dec!(-480));
        assert_eq!(tb.balance(f.retained.id), dec!(-160));
        assert!(tb.is_balanced());
    }

    #[test]
    fn test_wholly_owned_has_no_nci() {
        let f = Fixture::new();
        let sub = CompanyId::new();
        let group = f.group(sub, dec!(100), None);
        let c = CompanyContribution::from_trial_balance(
            &scope(sub, ConsolidationMethod::FullConsolidation, dec!(100)),
            &f.subsidiary_tb(sub, Currency::Usd),
            &f.index(),
            &group.accounts,
        )
        .unwrap();
        assert!(compute_nci_adjustments(&group, &[c], &f.index(), Currency::Usd)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_scope_excludes_late_acquisitions_and_equity_method() {
        let f = Fixture::new();
        let sub = CompanyId::new();
        let mut group = f.group(sub, dec!(80), None);
        let early = NaiveDate::from_ymd_opt(2019, 12, 31).unwrap();
        let scope_early = RunScope::resolve(&group, early, true);
        assert_eq!(scope_early.included.len(), 1);
        assert_eq!(scope_early.not_yet_acquired, vec![sub]);

        group.members[0].consolidation_method = Some(ConsolidationMethod::EquityMethod);
        let late = NaiveDate::from_ymd_opt(2025, 12, 31).unwrap();
        let scope_late = RunScope::resolve(&group, late, false);
        assert_eq!(scope_late.equity_method_excluded, vec![sub]);
        assert_eq!(scope_late.included[0].company_id, group.parent_company_id);
    }

    #[test]
    fn test_validate_flags_control_without_vie() {
        let f = Fixture::new();
        let sub = CompanyId::new();
        let as_of = NaiveDate::from_ymd_opt(2025, 12, 31).unwrap();
        let tb = ConsolidatedTrialBalance::empty(ConsolidationRunId::new(), Currency::Usd);

        let minority = f.group(sub, dec!(45), None);
        let scope = RunScope::resolve(&minority, as_of, true);
        let result = validate(&tb, &f.index(), &[], &minority, &scope);
        assert!(result.is_valid);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].code, issue::CONTROL_NOT_ESTABLISHED);

        let vie = f.group(
            sub,
            dec!(45),
            Some(VieDetermination {
                is_primary_beneficiary: true,
                rationale: "Controls the activities that most affect performance".into(),
                assessed_on: as_of,
            }),
        );
        let result = validate(&tb, &f.index(), &[], &vie, &RunScope::resolve(&vie, as_of, true));
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_validate_flags_intercompany_residual() {
        let f = Fixture::new();
        let mut ic = account(f.org, "1300", AccountType::Asset);
        ic.is_intercompany = true;
        let index = AccountIndex::new(vec![ic.clone(), f.cash.clone()]);
        let group = f.group(CompanyId::new(), dec!(100), None);
        let contribution = CompanyContribution {
            company_id: group.parent_company_id,
            method: ConsolidationMethod::FullConsolidation,
            weight: Decimal::ONE,
            currency: Currency::Usd,
            balances: [(ic.id, dec!(50)), (f.cash.id, dec!(-50))].into_iter().collect(),
            net_income: Decimal::ZERO,
        };
        let tb = ConsolidatedTrialBalance::build(
            ConsolidationRunId::new(),
            Currency::Usd,
            &[contribution],
            &[],
            &[],
        );
        let as_of = NaiveDate::from_ymd_opt(2025, 12, 31).unwrap();
        let result = validate(&tb, &index, &[], &group, &RunScope::resolve(&group, as_of, true));
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].code, issue::INTERCOMPANY_RESIDUAL);
        assert_eq!(result.warnings[0].account_id, Some(ic.id));
    }
}
