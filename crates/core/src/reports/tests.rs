//! Property-based tests for consolidated statements.

use chrono::NaiveDate;
use consolida_shared::types::{
    AccountId, ConsolidationGroupId, ConsolidationRunId, Currency, OrganizationId,
};
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::service::{StatementInput, StatementService};
use super::types::StatementHeader;
use crate::consolidation::group::ConsolidationAccounts;
use crate::consolidation::pipeline::AccountIndex;
use crate::consolidation::run::FiscalPeriodRef;
use crate::consolidation::trial_balance::{ConsolidatedBalanceLine, ConsolidatedTrialBalance};
use crate::ledger::{Account, AccountType, CashFlowCategory, subtype};

const TYPES: [AccountType; 5] = [
    AccountType::Asset,
    AccountType::Liability,
    AccountType::Equity,
    AccountType::Revenue,
    AccountType::Expense,
];

struct Generated {
    accounts: AccountIndex,
    group_accounts: ConsolidationAccounts,
    trial_balance: ConsolidatedTrialBalance,
}

fn account(code: usize, account_type: AccountType, account_subtype: Option<&str>) -> Account {
    Account {
        id: AccountId::new(),
        organization_id: OrganizationId::new(),
        code: format!("{code:04}"),
        name: format!("Account {code}"),
        account_type,
        account_subtype: account_subtype.map(str::to_string),
        is_intercompany: false,
        is_cash_flow_relevant: account_type.is_balance_sheet(),
        cash_flow_category: Some(match code % 3 {
            0 => CashFlowCategory::Operating,
            1 => CashFlowCategory::Investing,
            _ => CashFlowCategory::Financing,
        }),
        is_active: true,
    }
}

/// Builds a balanced trial balance: random lines plus NCI lines, with cash
/// absorbing the residual.
fn generate(entries: &[(usize, i64)], nci_equity: i64, nci_share: i64) -> Generated {
    let mut chart = Vec::new();
    let mut balances = Vec::new();

    for (i, (type_index, cents)) in entries.iter().enumerate() {
        let account_type = TYPES[*type_index % TYPES.len()];
        let account_subtype = match (account_type, i % 2) {
            (AccountType::Expense, 0) => Some(subtype::COST_OF_GOODS_SOLD),
            (AccountType::Expense, _) => Some(subtype::OPERATING_EXPENSE),
            _ => None,
        };
        let account = account(1000 + i, account_type, account_subtype);
        balances.push((account.id, Decimal::new(*cents, 2)));
        chart.push(account);
    }

    let nci_equity_account =
        account(3900, AccountType::Equity, Some(subtype::NON_CONTROLLING_INTEREST));
    let nci_share_account = account(6900, AccountType::Expense, None);
    balances.push((nci_equity_account.id, Decimal::new(nci_equity, 2)));
    balances.push((nci_share_account.id, Decimal::new(nci_share, 2)));

    let cash = account(1, AccountType::Asset, Some(subtype::CASH));
    let residual: Decimal = balances.iter().map(|(_, b)| *b).sum();
    balances.push((cash.id, -residual));

    let group_accounts = ConsolidationAccounts {
        nci_equity_account_id: Some(nci_equity_account.id),
        nci_profit_share_account_id: Some(nci_share_account.id),
        ..ConsolidationAccounts::default()
    };
    chart.push(nci_equity_account);
    chart.push(nci_share_account);
    chart.push(cash);

    let lines = balances
        .into_iter()
        .map(|(account_id, balance)| ConsolidatedBalanceLine {
            account_id,
            pre_elimination: balance,
            eliminations: Decimal::ZERO,
            nci: Decimal::ZERO,
            balance,
        })
        .collect();

    Generated {
        accounts: AccountIndex::new(chart),
        group_accounts,
        trial_balance: ConsolidatedTrialBalance {
            run_id: ConsolidationRunId::new(),
            currency: Currency::Usd,
            lines,
            total_debits: Decimal::ZERO,
            total_credits: Decimal::ZERO,
        },
    }
}

fn input(generated: &Generated) -> StatementInput<'_> {
    StatementInput {
        header: StatementHeader {
            run_id: generated.trial_balance.run_id,
            group_id: ConsolidationGroupId::new(),
            group_name: "Group".into(),
            period: FiscalPeriodRef { year: 2025, period: 6 },
            as_of: NaiveDate::from_ymd_opt(2025, 6, 30).unwrap(),
            currency: Currency::Usd,
        },
        trial_balance: &generated.trial_balance,
        accounts: &generated.accounts,
        group_accounts: &generated.group_accounts,
    }
}

fn entries() -> impl Strategy<Value = Vec<(usize, i64)>> {
    prop::collection::vec((0usize..5, -1_000_000i64..1_000_000), 0..25)
}

proptest! {
    /// Property 1: Balanced Trial Balance Yields Balanced Balance Sheet
    /// For any trial balance whose signed balances sum to zero, total assets
    /// SHALL equal liabilities plus parent equity plus NCI.
    #[test]
    fn prop_balance_sheet_balances(
        entries in entries(),
        nci_equity in -500_000i64..0,
        nci_share in -50_000i64..50_000,
    ) {
        let generated = generate(&entries, nci_equity, nci_share);
        let bs = StatementService::balance_sheet(&input(&generated)).unwrap();

        prop_assert_eq!(bs.total_assets, bs.liabilities_and_equity);
        prop_assert_eq!(bs.total_equity, bs.equity.total + bs.non_controlling_interest);
        prop_assert_eq!(bs.non_controlling_interest, Decimal::new(-nci_equity, 2));
    }

    /// Property 2: Net Income Splits Between Parent And NCI
    /// The parent and NCI attributions SHALL sum to consolidated net income,
    /// and the NCI attribution SHALL equal the NCI profit share balance.
    #[test]
    fn prop_income_statement_split(
        entries in entries(),
        nci_share in -50_000i64..50_000,
    ) {
        let generated = generate(&entries, -100_000, nci_share);
        let is = StatementService::income_statement(&input(&generated)).unwrap();

        prop_assert_eq!(is.attributable_to_parent + is.attributable_to_nci, is.net_income);
        prop_assert_eq!(is.attributable_to_nci, Decimal::new(nci_share, 2));
        prop_assert_eq!(
            is.net_income,
            is.revenue.total
                - is.cost_of_goods_sold.total
                - is.operating_expenses.total
                - is.other_expenses.total
        );
    }

    /// Property 3: Equity Statement Agrees With Balance Sheet
    /// Closing total equity SHALL equal balance sheet total equity.
    #[test]
    fn prop_equity_statement_matches_balance_sheet(
        entries in entries(),
        nci_equity in -500_000i64..0,
        nci_share in -50_000i64..50_000,
    ) {
        let generated = generate(&entries, nci_equity, nci_share);
        let input = input(&generated);
        let bs = StatementService::balance_sheet(&input).unwrap();
        let eq = StatementService::equity_statement(&input).unwrap();

        prop_assert_eq!(eq.total_equity, bs.total_equity);
        prop_assert_eq!(eq.non_controlling_interest.closing_balance, bs.non_controlling_interest);
    }

    /// Property 4: Cash Flow Reconciles When Every Account Is Classified
    /// If every non-cash balance sheet account is cash flow relevant, net
    /// cash flow SHALL equal the closing cash balance.
    #[test]
    fn prop_cash_flow_reconciles(
        entries in entries(),
        nci_equity in -500_000i64..500_000,
        nci_share in -50_000i64..50_000,
    ) {
        let generated = generate(&entries, nci_equity, nci_share);
        let cf = StatementService::cash_flow(&input(&generated)).unwrap();

        prop_assert!(cf.is_reconciled);
        prop_assert_eq!(cf.net_cash_flow, cf.closing_cash);
    }
}
