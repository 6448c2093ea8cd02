//! Chart of accounts shared by every company of an organization.

use consolida_shared::types::{AccountId, OrganizationId};
use serde::{Deserialize, Serialize};

/// Well-known account subtypes used for statement layout.
pub mod subtype {
    /// Cash and cash equivalents.
    pub const CASH: &str = "cash";
    /// Cost of goods sold.
    pub const COST_OF_GOODS_SOLD: &str = "cost_of_goods_sold";
    /// Operating expense.
    pub const OPERATING_EXPENSE: &str = "operating_expense";
    /// Retained earnings.
    pub const RETAINED_EARNINGS: &str = "retained_earnings";
    /// Share capital.
    pub const SHARE_CAPITAL: &str = "share_capital";
    /// Non-controlling interest equity.
    pub const NON_CONTROLLING_INTEREST: &str = "non_controlling_interest";
    /// Cumulative translation adjustment.
    pub const TRANSLATION_RESERVE: &str = "translation_reserve";
}

/// Account classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// Asset account.
    Asset,
    /// Liability account.
    Liability,
    /// Equity account.
    Equity,
    /// Revenue account.
    Revenue,
    /// Expense account.
    Expense,
}

/// Which side increases an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormalBalance {
    /// Asset, Expense.
    Debit,
    /// Liability, Equity, Revenue.
    Credit,
}

impl NormalBalance {
    /// Converts a signed (debit minus credit) balance into its natural presentation.
    #[must_use]
    pub fn natural(self, signed: rust_decimal::Decimal) -> rust_decimal::Decimal {
        match self {
            Self::Debit => signed,
            Self::Credit => -signed,
        }
    }
}

impl AccountType {
    /// Returns the normal balance side.
    #[must_use]
    pub const fn normal_balance(self) -> NormalBalance {
        match self {
            Self::Asset | Self::Expense => NormalBalance::Debit,
            Self::Liability | Self::Equity | Self::Revenue => NormalBalance::Credit,
        }
    }

    /// Balance sheet accounts are translated at the closing rate.
    #[must_use]
    pub const fn is_balance_sheet(self) -> bool {
        matches!(self, Self::Asset | Self::Liability | Self::Equity)
    }

    /// Income statement accounts roll into net income.
    #[must_use]
    pub const fn is_income_statement(self) -> bool {
        matches!(self, Self::Revenue | Self::Expense)
    }

    /// Returns the lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asset => "asset",
            Self::Liability => "liability",
            Self::Equity => "equity",
            Self::Revenue => "revenue",
            Self::Expense => "expense",
        }
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asset" => Ok(Self::Asset),
            "liability" => Ok(Self::Liability),
            "equity" => Ok(Self::Equity),
            "revenue" => Ok(Self::Revenue),
            "expense" => Ok(Self::Expense),
            _ => Err(format!("Unknown account type: {s}")),
        }
    }
}

/// Cash flow statement section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CashFlowCategory {
    /// Operating activities.
    Operating,
    /// Investing activities.
    Investing,
    /// Financing activities.
    Financing,
}

impl CashFlowCategory {
    /// Returns the snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Operating => "operating",
            Self::Investing => "investing",
            Self::Financing => "financing",
        }
    }
}

impl std::str::FromStr for CashFlowCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "operating" => Ok(Self::Operating),
            "investing" => Ok(Self::Investing),
            "financing" => Ok(Self::Financing),
            _ => Err(format!("Unknown cash flow category: {s}")),
        }
    }
}

/// An account in the organization's chart of accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Account ID.
    pub id: AccountId,
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// Account code (e.g. "1100").
    pub code: String,
    /// Display name.
    pub name: String,
    /// Classification.
    pub account_type: AccountType,
    /// Optional subtype used for statement layout.
    pub account_subtype: Option<String>,
    /// Marks intercompany receivable/payable/revenue/expense accounts.
    pub is_intercompany: bool,
    /// Non-cash balance sheet accounts whose movement appears on the cash flow statement.
    pub is_cash_flow_relevant: bool,
    /// Section for cash flow relevant accounts.
    pub cash_flow_category: Option<CashFlowCategory>,
    /// Inactive accounts may still carry balances.
    pub is_active: bool,
}

impl Account {
    /// Returns true if the account has the given subtype.
    #[must_use]
    pub fn has_subtype(&self, subtype: &str) -> bool {
        self.account_subtype.as_deref() == Some(subtype)
    }

    /// Returns true for cash and cash-equivalent accounts.
    #[must_use]
    pub fn is_cash(&self) -> bool {
        self.account_type == AccountType::Asset && self.has_subtype(subtype::CASH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use std::str::FromStr;

    #[rstest]
    #[case(AccountType::Asset, NormalBalance::Debit)]
    #[case(AccountType::Expense, NormalBalance::Debit)]
    #[case(AccountType::Liability, NormalBalance::Credit)]
    #[case(AccountType::Equity, NormalBalance::Credit)]
    #[case(AccountType::Revenue, NormalBalance::Credit)]
    fn test_normal_balance(#[case] account_type: AccountType, #[case] expected: NormalBalance) {
        assert_eq!(account_type.normal_balance(), expected);
    }

    #[test]
    fn test_natural_balance_flips_credit_accounts() {
        assert_eq!(NormalBalance::Debit.natural(dec!(150)), dec!(150));
        assert_eq!(NormalBalance::Credit.natural(dec!(-150)), dec!(150));
    }

    #[test]
    fn test_statement_classification() {
        assert!(AccountType::Equity.is_balance_sheet());
        assert!(!AccountType::Revenue.is_balance_sheet());
        assert!(AccountType::Expense.is_income_statement());
    }

    #[test]
    fn test_account_type_parse() {
        assert_eq!(AccountType::from_str("Liability").unwrap(), AccountType::Liability);
        assert!(AccountType::from_str("contra").is_err());
        assert_eq!(
            CashFlowCategory::from_str("investing").unwrap(),
            CashFlowCategory::Investing
        );
    }
}
