//! Consolidated statement generation.
//!
//! All statements read the final balances of a completed run. Amounts are
//! shown in their natural sign: debit-normal accounts as the signed balance,
//! credit-normal accounts negated.

use consolida_shared::types::AccountId;
use rust_decimal::Decimal;

use super::error::ReportError;
use super::types::{
    CashFlowSection, ConsolidatedBalanceSheet, ConsolidatedCashFlowStatement,
    ConsolidatedEquityStatement, ConsolidatedIncomeStatement, EquityComponent, StatementHeader,
    StatementLine, StatementSection,
};
use crate::consolidation::group::{ConsolidationAccounts, ConsolidationGroup};
use crate::consolidation::pipeline::AccountIndex;
use crate::consolidation::run::{ConsolidationRun, RunStatus};
use crate::consolidation::trial_balance::ConsolidatedTrialBalance;
use crate::ledger::{Account, AccountType, CashFlowCategory, subtype};

const CURRENT_PERIOD_EARNINGS: &str = "Current period earnings";
const NON_CONTROLLING_INTEREST: &str = "Non-controlling interest";

/// Everything a statement is generated from.
pub struct StatementInput<'a> {
    /// Run identification.
    pub header: StatementHeader,
    /// Final balances.
    pub trial_balance: &'a ConsolidatedTrialBalance,
    /// Chart of accounts.
    pub accounts: &'a AccountIndex,
    /// Group consolidation accounts.
    pub group_accounts: &'a ConsolidationAccounts,
}

impl<'a> StatementInput<'a> {
    /// Builds the input from a completed run.
    pub fn from_run(
        run: &'a ConsolidationRun,
        group: &'a ConsolidationGroup,
        accounts: &'a AccountIndex,
    ) -> Result<Self, ReportError> {
        if run.status != RunStatus::Completed {
            return Err(ReportError::RunNotCompleted {
                run_id: run.id,
                status: run.status,
            });
        }
        let trial_balance = run
            .consolidated_trial_balance
            .as_ref()
            .ok_or(ReportError::NoTrialBalance(run.id))?;

        Ok(Self {
            header: StatementHeader {
                run_id: run.id,
                group_id: group.id,
                group_name: group.name.clone(),
                period: run.period,
                as_of: run.as_of_date,
                currency: trial_balance.currency,
            },
            trial_balance,
            accounts,
            group_accounts: &group.accounts,
        })
    }

    fn lines(&self) -> Result<Vec<(&'a Account, Decimal)>, ReportError> {
        self.trial_balance
            .lines
            .iter()
            .filter(|line| !line.balance.is_zero())
            .map(|line| {
                self.accounts
                    .get(line.account_id)
                    .map(|account| (account, line.balance))
                    .ok_or(ReportError::AccountNotFound(line.account_id))
            })
            .collect()
    }

    fn is_nci_equity(&self, account_id: AccountId) -> bool {
        self.group_accounts.nci_equity_account_id == Some(account_id)
    }

    fn is_nci_profit_share(&self, account_id: AccountId) -> bool {
        self.group_accounts.nci_profit_share_account_id == Some(account_id)
    }

    /// Signed balance of the NCI profit share account: the minority's share of profit.
    fn nci_share_of_profit(&self) -> Decimal {
        self.group_accounts
            .nci_profit_share_account_id
            .map_or(Decimal::ZERO, |id| self.trial_balance.balance(id))
    }

    /// Natural balance of the NCI equity account.
    fn nci_equity(&self) -> Decimal {
        self.group_accounts
            .nci_equity_account_id
            .map_or(Decimal::ZERO, |id| -self.trial_balance.balance(id))
    }

    /// Revenue minus expenses, excluding the NCI profit share line.
    fn net_income_before_nci(&self) -> Result<Decimal, ReportError> {
        Ok(self
            .lines()?
            .into_iter()
            .filter(|(account, _)| {
                account.account_type.is_income_statement() && !self.is_nci_profit_share(account.id)
            })
            .map(|(_, balance)| -balance)
            .sum())
    }
}

fn line(account: &Account, amount: Decimal) -> StatementLine {
    StatementLine {
        account_id: Some(account.id),
        code: Some(account.code.clone()),
        name: account.name.clone(),
        amount,
    }
}

fn synthesized(name: &str, amount: Decimal) -> StatementLine {
    StatementLine {
        account_id: None,
        code: None,
        name: name.to_string(),
        amount,
    }
}

/// Service for generating consolidated statements.
pub struct StatementService;

impl StatementService {
    /// Generates the consolidated balance sheet.
    ///
    /// Profit and loss balances appear as a single current period earnings
    /// line in parent equity; NCI equity is shown separately.
    ///
    /// # Errors
    ///
    /// Fails if assets differ from liabilities plus equity beyond the
    /// currency's minor units.
    pub fn balance_sheet(
        input: &StatementInput<'_>,
    ) -> Result<ConsolidatedBalanceSheet, ReportError> {
        let mut assets = StatementSection::default();
        let mut liabilities = StatementSection::default();
        let mut equity = StatementSection::default();
        let mut earnings = Decimal::ZERO;

        for (account, balance) in input.lines()? {
            let amount = account.account_type.normal_balance().natural(balance);
            match account.account_type {
                AccountType::Asset => assets.push(line(account, amount)),
                AccountType::Liability => liabilities.push(line(account, amount)),
                AccountType::Equity if input.is_nci_equity(account.id) => {}
                AccountType::Equity => equity.push(line(account, amount)),
                AccountType::Revenue | AccountType::Expense => earnings -= balance,
            }
        }
        assets.sort();
        liabilities.sort();
        equity.sort();
        if !earnings.is_zero() {
            equity.push(synthesized(CURRENT_PERIOD_EARNINGS, earnings));
        }

        let non_controlling_interest = input.nci_equity();
        let total_assets = assets.total;
        let total_liabilities = liabilities.total;
        let total_equity = equity.total + non_controlling_interest;
        let liabilities_and_equity = total_liabilities + total_equity;

        let difference = total_assets - liabilities_and_equity;
        if !input.header.currency.is_negligible(difference) {
            return Err(ReportError::BalanceSheetNotBalanced {
                assets: total_assets,
                liabilities_and_equity,
                difference,
            });
        }

        Ok(ConsolidatedBalanceSheet {
            header: input.header.clone(),
            assets,
            liabilities,
            equity,
            non_controlling_interest,
            total_assets,
            total_liabilities,
            total_equity,
            liabilities_and_equity,
        })
    }

    /// Generates the consolidated income statement.
    ///
    /// Expenses are split by subtype; anything without a COGS or operating
    /// subtype is reported as other. The NCI profit share line is not an
    /// expense: it becomes the NCI attribution.
    pub fn income_statement(
        input: &StatementInput<'_>,
    ) -> Result<ConsolidatedIncomeStatement, ReportError> {
        let mut revenue = StatementSection::default();
        let mut cost_of_goods_sold = StatementSection::default();
        let mut operating_expenses = StatementSection::default();
        let mut other_expenses = StatementSection::default();

        for (account, balance) in input.lines()? {
            match account.account_type {
                AccountType::Revenue => revenue.push(line(account, -balance)),
                AccountType::Expense if input.is_nci_profit_share(account.id) => {}
                AccountType::Expense if account.has_subtype(subtype::COST_OF_GOODS_SOLD) => {
                    cost_of_goods_sold.push(line(account, balance));
                }
                AccountType::Expense if account.has_subtype(subtype::OPERATING_EXPENSE) => {
                    operating_expenses.push(line(account, balance));
                }
                AccountType::Expense => other_expenses.push(line(account, balance)),
                _ => {}
            }
        }
        for section in [
            &mut revenue,
            &mut cost_of_goods_sold,
            &mut operating_expenses,
            &mut other_expenses,
        ] {
            section.sort();
        }

        let gross_profit = revenue.total - cost_of_goods_sold.total;
        let operating_income = gross_profit - operating_expenses.total;
        let net_income = operating_income - other_expenses.total;
        let attributable_to_nci = input.nci_share_of_profit();

        Ok(ConsolidatedIncomeStatement {
            header: input.header.clone(),
            revenue,
            cost_of_goods_sold,
            gross_profit,
            operating_expenses,
            operating_income,
            other_expenses,
            net_income,
            attributable_to_parent: net_income - attributable_to_nci,
            attributable_to_nci,
        })
    }

    /// Generates the consolidated cash flow statement.
    ///
    /// Starts from net income before the NCI split and adds the cash effect
    /// (negated signed balance) of every cash flow relevant non-cash balance
    /// sheet account. The NCI equity line excludes the minority's profit share,
    /// which net income already contains. The result is reconciled against
    /// the balance of cash accounts.
    pub fn cash_flow(
        input: &StatementInput<'_>,
    ) -> Result<ConsolidatedCashFlowStatement, ReportError> {
        let net_income = input.net_income_before_nci()?;
        let nci_share = input.nci_share_of_profit();

        let mut operating = StatementSection::default();
        let mut investing = StatementSection::default();
        let mut financing = StatementSection::default();
        let mut closing_cash = Decimal::ZERO;

        let mut lines = input.lines()?;
        // The profit share still has to be taken out of NCI equity when its balance nets to zero
        if let Some(nci_id) = input.group_accounts.nci_equity_account_id
            && !nci_share.is_zero()
            && lines.iter().all(|(account, _)| account.id != nci_id)
        {
            let account = input
                .accounts
                .get(nci_id)
                .ok_or(ReportError::AccountNotFound(nci_id))?;
            lines.push((account, Decimal::ZERO));
        }

        for (account, balance) in lines {
            if account.is_cash() {
                closing_cash += balance;
                continue;
            }
            if !account.account_type.is_balance_sheet() || !account.is_cash_flow_relevant {
                continue;
            }

            let mut effect = -balance;
            if input.is_nci_equity(account.id) {
                effect -= nci_share;
            }
            if effect.is_zero() {
                continue;
            }

            let section = match account.cash_flow_category.unwrap_or(CashFlowCategory::Operating) {
                CashFlowCategory::Operating => &mut operating,
                CashFlowCategory::Investing => &mut investing,
                CashFlowCategory::Financing => &mut financing,
            };
            section.push(line(account, effect));
        }

        let sections: Vec<CashFlowSection> = [
            (CashFlowCategory::Operating, operating),
            (CashFlowCategory::Investing, investing),
            (CashFlowCategory::Financing, financing),
        ]
        .into_iter()
        .map(|(category, mut section)| {
            section.sort();
            CashFlowSection { category, section }
        })
        .collect();

        let net_cash_flow = net_income + sections.iter().map(|s| s.section.total).sum::<Decimal>();
        let unreconciled_difference = closing_cash - net_cash_flow;

        Ok(ConsolidatedCashFlowStatement {
            header: input.header.clone(),
            net_income,
            sections,
            net_cash_flow,
            closing_cash,
            unreconciled_difference,
            is_reconciled: input.header.currency.is_negligible(unreconciled_difference),
        })
    }

    /// Generates the consolidated statement of changes in equity.
    pub fn equity_statement(
        input: &StatementInput<'_>,
    ) -> Result<ConsolidatedEquityStatement, ReportError> {
        let mut accounts: Vec<(&Account, Decimal)> = input
            .lines()?
            .into_iter()
            .filter(|(account, _)| {
                account.account_type == AccountType::Equity && !input.is_nci_equity(account.id)
            })
            .collect();
        accounts.sort_by(|a, b| a.0.code.cmp(&b.0.code));

        let mut components: Vec<EquityComponent> = accounts
            .into_iter()
            .map(|(account, balance)| EquityComponent {
                account_id: Some(account.id),
                name: account.name.clone(),
                balance: -balance,
                earnings: Decimal::ZERO,
                closing_balance: -balance,
            })
            .collect();

        let nci_share = input.nci_share_of_profit();
        let parent_earnings = input.net_income_before_nci()? - nci_share;
        components.push(EquityComponent {
            account_id: None,
            name: CURRENT_PERIOD_EARNINGS.to_string(),
            balance: Decimal::ZERO,
            earnings: parent_earnings,
            closing_balance: parent_earnings,
        });

        let nci_closing = input.nci_equity();
        let non_controlling_interest = EquityComponent {
            account_id: input.group_accounts.nci_equity_account_id,
            name: NON_CONTROLLING_INTEREST.to_string(),
            balance: nci_closing - nci_share,
            earnings: nci_share,
            closing_balance: nci_closing,
        };

        let total_parent_equity: Decimal = components.iter().map(|c| c.closing_balance).sum();

        Ok(ConsolidatedEquityStatement {
            header: input.header.clone(),
            components,
            total_parent_equity,
            total_equity: total_parent_equity + non_controlling_interest.closing_balance,
            non_controlling_interest,
        })
    }
}
