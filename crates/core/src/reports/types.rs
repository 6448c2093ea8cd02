//! Consolidated statement types.

use chrono::NaiveDate;
use consolida_shared::types::{AccountId, ConsolidationGroupId, ConsolidationRunId, Currency};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::consolidation::run::FiscalPeriodRef;
use crate::ledger::CashFlowCategory;

/// Which statement to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    /// Balance sheet.
    BalanceSheet,
    /// Income statement.
    IncomeStatement,
    /// Cash flow statement.
    CashFlow,
    /// Statement of changes in equity.
    Equity,
}

impl StatementKind {
    /// Returns the snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BalanceSheet => "balance_sheet",
            Self::IncomeStatement => "income_statement",
            Self::CashFlow => "cash_flow",
            Self::Equity => "equity",
        }
    }
}

/// Identifies the run a statement was generated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementHeader {
    /// Source run.
    pub run_id: ConsolidationRunId,
    /// Consolidated group.
    pub group_id: ConsolidationGroupId,
    /// Group name at generation time.
    pub group_name: String,
    /// Fiscal period.
    pub period: FiscalPeriodRef,
    /// Balance date.
    pub as_of: NaiveDate,
    /// Reporting currency.
    pub currency: Currency,
}

/// One line on a statement, in its natural sign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementLine {
    /// Source account; `None` for synthesized lines.
    pub account_id: Option<AccountId>,
    /// Account code.
    pub code: Option<String>,
    /// Display name.
    pub name: String,
    /// Amount.
    pub amount: Decimal,
}

/// A titled group of lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementSection {
    /// Section total.
    pub total: Decimal,
    /// Lines in account code order.
    pub lines: Vec<StatementLine>,
}

impl StatementSection {
    /// Appends a line and adds it to the total.
    pub fn push(&mut self, line: StatementLine) {
        self.total += line.amount;
        self.lines.push(line);
    }

    pub(crate) fn sort(&mut self) {
        self.lines.sort_by(|a, b| a.code.cmp(&b.code).then_with(|| a.name.cmp(&b.name)));
    }
}

/// Consolidated balance sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidatedBalanceSheet {
    /// Source run.
    pub header: StatementHeader,
    /// Asset accounts.
    pub assets: StatementSection,
    /// Liability accounts.
    pub liabilities: StatementSection,
    /// Equity attributable to the parent, including current period earnings.
    pub equity: StatementSection,
    /// Equity attributable to non-controlling interests.
    pub non_controlling_interest: Decimal,
    /// Total assets.
    pub total_assets: Decimal,
    /// Total liabilities.
    pub total_liabilities: Decimal,
    /// Parent equity plus NCI.
    pub total_equity: Decimal,
    /// Liabilities plus total equity.
    pub liabilities_and_equity: Decimal,
}

/// Consolidated income statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidatedIncomeStatement {
    /// Source run.
    pub header: StatementHeader,
    /// Revenue accounts.
    pub revenue: StatementSection,
    /// Cost of goods sold.
    pub cost_of_goods_sold: StatementSection,
    /// Revenue minus COGS.
    pub gross_profit: Decimal,
    /// Operating expenses.
    pub operating_expenses: StatementSection,
    /// Gross profit minus operating expenses.
    pub operating_income: Decimal,
    /// Other expenses.
    pub other_expenses: StatementSection,
    /// Consolidated net income before the NCI split.
    pub net_income: Decimal,
    /// Share attributable to the parent's owners.
    pub attributable_to_parent: Decimal,
    /// Share attributable to non-controlling interests.
    pub attributable_to_nci: Decimal,
}

/// One cash flow section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashFlowSection {
    /// Category.
    pub category: CashFlowCategory,
    /// Lines and total.
    pub section: StatementSection,
}

/// Consolidated cash flow statement (indirect method, cumulative to the as-of date).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidatedCashFlowStatement {
    /// Source run.
    pub header: StatementHeader,
    /// Consolidated net income.
    pub net_income: Decimal,
    /// Operating, investing and financing sections in that order.
    pub sections: Vec<CashFlowSection>,
    /// Net income plus all section totals.
    pub net_cash_flow: Decimal,
    /// Balance of cash accounts.
    pub closing_cash: Decimal,
    /// Closing cash minus net cash flow.
    pub unreconciled_difference: Decimal,
    /// True if the difference is negligible.
    pub is_reconciled: bool,
}

/// One column of the equity statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquityComponent {
    /// Source account; `None` for synthesized components.
    pub account_id: Option<AccountId>,
    /// Display name.
    pub name: String,
    /// Balance before current period earnings.
    pub balance: Decimal,
    /// Current period earnings allocated to the component.
    pub earnings: Decimal,
    /// Closing balance.
    pub closing_balance: Decimal,
}

/// Consolidated statement of changes in equity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidatedEquityStatement {
    /// Source run.
    pub header: StatementHeader,
    /// Parent equity components, with current period earnings last.
    pub components: Vec<EquityComponent>,
    /// Parent equity.
    pub total_parent_equity: Decimal,
    /// Non-controlling interests.
    pub non_controlling_interest: EquityComponent,
    /// Parent equity plus NCI.
    pub total_equity: Decimal,
}

/// Any generated statement, as stored in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "statement", rename_all = "snake_case")]
pub enum ConsolidatedStatement {
    /// Balance sheet.
    BalanceSheet(ConsolidatedBalanceSheet),
    /// Income statement.
    IncomeStatement(ConsolidatedIncomeStatement),
    /// Cash flow statement.
    CashFlow(ConsolidatedCashFlowStatement),
    /// Equity statement.
    Equity(ConsolidatedEquityStatement),
}

impl ConsolidatedStatement {
    /// The statement's kind.
    #[must_use]
    pub const fn kind(&self) -> StatementKind {
        match self {
            Self::BalanceSheet(_) => StatementKind::BalanceSheet,
            Self::IncomeStatement(_) => StatementKind::IncomeStatement,
            Self::CashFlow(_) => StatementKind::CashFlow,
            Self::Equity(_) => StatementKind::Equity,
        }
    }
}
