//! Ownership value objects.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::ConsolidationError;

/// A percentage between 0 and 100 with at most two decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Percentage(Decimal);

impl Percentage {
    /// 0%.
    pub const ZERO: Self = Self(Decimal::ZERO);
    /// 100%.
    pub const HUNDRED: Self = Self(Decimal::ONE_HUNDRED);

    /// Validates and wraps a percentage value.
    pub fn new(value: Decimal) -> Result<Self, ConsolidationError> {
        if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED || value.normalize().scale() > 2 {
            return Err(ConsolidationError::InvalidPercentage(value));
        }
        Ok(Self(value.normalize()))
    }

    /// The value in percent (e.g. 80 for 80%).
    #[must_use]
    pub const fn value(self) -> Decimal {
        self.0
    }

    /// The value as a ratio (e.g. 0.8 for 80%).
    #[must_use]
    pub fn as_ratio(self) -> Decimal {
        self.0 / Decimal::ONE_HUNDRED
    }

    /// 100 minus this percentage.
    #[must_use]
    pub fn complement(self) -> Self {
        Self(Decimal::ONE_HUNDRED - self.0)
    }

    /// Returns true for exactly 100%.
    #[must_use]
    pub fn is_full(self) -> bool {
        self.0 == Decimal::ONE_HUNDRED
    }

    /// Returns true for 0%.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// Returns true above 50%.
    #[must_use]
    pub fn is_controlling(self) -> bool {
        self.0 > Decimal::from(50)
    }
}

impl TryFrom<Decimal> for Percentage {
    type Error = ConsolidationError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Percentage> for Decimal {
    fn from(value: Percentage) -> Self {
        value.0
    }
}

impl std::fmt::Display for Percentage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// How a member's balances enter the consolidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsolidationMethod {
    /// 100% of balances, with non-controlling interest split out.
    FullConsolidation,
    /// Ownership share of each balance.
    ProportionalConsolidation,
    /// Single investment line and share of profit.
    EquityMethod,
}

impl ConsolidationMethod {
    /// Returns the snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FullConsolidation => "full_consolidation",
            Self::ProportionalConsolidation => "proportional_consolidation",
            Self::EquityMethod => "equity_method",
        }
    }
}

impl std::fmt::Display for ConsolidationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ConsolidationMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full_consolidation" => Ok(Self::FullConsolidation),
            "proportional_consolidation" => Ok(Self::ProportionalConsolidation),
            "equity_method" => Ok(Self::EquityMethod),
            _ => Err(format!("Unknown consolidation method: {s}")),
        }
    }
}

/// Variable interest entity assessment for a member.
///
/// A primary beneficiary is consolidated regardless of its voting interest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VieDetermination {
    /// Whether the group is the primary beneficiary.
    pub is_primary_beneficiary: bool,
    /// Basis for the conclusion.
    pub rationale: String,
    /// When the assessment was made.
    pub assessed_on: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use std::str::FromStr;

    #[rstest]
    #[case(dec!(0))]
    #[case(dec!(50.5))]
    #[case(dec!(80.25))]
    #[case(dec!(100))]
    #[case(dec!(75.000))]
    fn test_valid_percentages(#[case] value: Decimal) {
        assert!(Percentage::new(value).is_ok());
    }

    #[rstest]
    #[case(dec!(-0.01))]
    #[case(dec!(100.01))]
    #[case(dec!(33.333))]
    fn test_invalid_percentages(#[case] value: Decimal) {
        assert!(matches!(
            Percentage::new(value),
            Err(ConsolidationError::InvalidPercentage(_))
        ));
    }

    #[test]
    fn test_complement_and_ratio() {
        let p = Percentage::new(dec!(80)).unwrap();
        assert_eq!(p.complement().value(), dec!(20));
        assert_eq!(p.as_ratio(), dec!(0.8));
        assert!(p.is_controlling());
        assert!(!Percentage::new(dec!(50)).unwrap().is_controlling());
        assert!(Percentage::HUNDRED.complement().is_zero());
    }

    #[test]
    fn test_percentage_serde_validates() {
        let p: Percentage = serde_json::from_str("\"60.5\"").unwrap();
        assert_eq!(p.value(), dec!(60.5));
        assert!(serde_json::from_str::<Percentage>("\"120\"").is_err());
    }

    #[test]
    fn test_method_parse() {
        for method in [
            ConsolidationMethod::FullConsolidation,
            ConsolidationMethod::ProportionalConsolidation,
            ConsolidationMethod::EquityMethod,
        ] {
            assert_eq!(ConsolidationMethod::from_str(method.as_str()).unwrap(), method);
        }
        assert!(ConsolidationMethod::from_str("pooling").is_err());
    }
}
