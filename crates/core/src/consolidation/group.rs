//! Consolidation group aggregate.
//!
//! A group is a parent company plus member companies consolidated into one
//! reporting entity. The aggregate guards membership invariants; existence
//! checks against the company registry happen in the service.

use chrono::{DateTime, NaiveDate, Utc};
use consolida_shared::types::{
    AccountId, CompanyId, ConsolidationGroupId, Currency, OrganizationId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::ConsolidationError;
use super::ownership::{ConsolidationMethod, Percentage, VieDetermination};

/// A company's participation in a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidationMember {
    /// Member company.
    pub company_id: CompanyId,
    /// Parent's ownership share.
    pub ownership_percentage: Percentage,
    /// Always `100 - ownership_percentage`.
    pub non_controlling_interest_percentage: Percentage,
    /// Overrides the group's default method.
    pub consolidation_method: Option<ConsolidationMethod>,
    /// Date control was obtained.
    pub acquisition_date: NaiveDate,
    /// Goodwill recognized on acquisition.
    pub goodwill_amount: Option<Decimal>,
    /// VIE assessment, if one was made.
    pub vie_determination: Option<VieDetermination>,
}

impl ConsolidationMember {
    /// Builds a member from validated input.
    pub fn from_input(input: MemberInput) -> Result<Self, ConsolidationError> {
        let ownership = Percentage::new(input.ownership_percentage)?;
        if let Some(goodwill) = input.goodwill_amount
            && goodwill.is_sign_negative()
        {
            return Err(ConsolidationError::Validation(
                "goodwill_amount cannot be negative".to_string(),
            ));
        }
        Ok(Self {
            company_id: input.company_id,
            ownership_percentage: ownership,
            non_controlling_interest_percentage: ownership.complement(),
            consolidation_method: input.consolidation_method,
            acquisition_date: input.acquisition_date,
            goodwill_amount: input.goodwill_amount,
            vie_determination: input.vie_determination,
        })
    }

    /// The method actually applied, falling back to the group default.
    #[must_use]
    pub fn effective_method(&self, group_default: ConsolidationMethod) -> ConsolidationMethod {
        self.consolidation_method.unwrap_or(group_default)
    }

    /// Returns true if the member was acquired on or before the date.
    #[must_use]
    pub fn is_acquired_by(&self, as_of: NaiveDate) -> bool {
        self.acquisition_date <= as_of
    }

    /// Returns true if the VIE assessment designates the group as primary beneficiary.
    #[must_use]
    pub fn is_primary_beneficiary(&self) -> bool {
        self.vie_determination
            .as_ref()
            .is_some_and(|vie| vie.is_primary_beneficiary)
    }

    fn set_ownership(&mut self, ownership: Percentage) {
        self.ownership_percentage = ownership;
        self.non_controlling_interest_percentage = ownership.complement();
    }
}

/// Accounts a group posts its consolidation adjustments to.
///
/// Only the accounts a run actually needs must be present; a missing one
/// fails the step that needs it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidationAccounts {
    /// Equity line holding non-controlling interest.
    pub nci_equity_account_id: Option<AccountId>,
    /// Profit and loss line for the NCI share of profit.
    pub nci_profit_share_account_id: Option<AccountId>,
    /// Cumulative translation adjustment (equity).
    pub translation_reserve_account_id: Option<AccountId>,
    /// Investment in associates (asset).
    pub equity_method_investment_account_id: Option<AccountId>,
    /// Share of profit of associates (revenue).
    pub equity_method_income_account_id: Option<AccountId>,
}

impl ConsolidationAccounts {
    /// All configured account IDs.
    pub fn configured(&self) -> impl Iterator<Item = AccountId> + '_ {
        [
            self.nci_equity_account_id,
            self.nci_profit_share_account_id,
            self.translation_reserve_account_id,
            self.equity_method_investment_account_id,
            self.equity_method_income_account_id,
        ]
        .into_iter()
        .flatten()
    }

    /// Resolves an account or fails naming its purpose.
    pub fn require(
        account: Option<AccountId>,
        purpose: &'static str,
    ) -> Result<AccountId, ConsolidationError> {
        account.ok_or(ConsolidationError::AccountNotConfigured { purpose })
    }
}

/// The consolidation group aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidationGroup {
    /// Group ID.
    pub id: ConsolidationGroupId,
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// Display name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Currency of the consolidated statements.
    pub reporting_currency: Currency,
    /// Default method for members without an override.
    pub consolidation_method: ConsolidationMethod,
    /// Parent company, consolidated at 100%.
    pub parent_company_id: CompanyId,
    /// Member companies.
    pub members: Vec<ConsolidationMember>,
    /// Adjustment accounts.
    pub accounts: ConsolidationAccounts,
    /// Inactive groups accept no new runs.
    pub is_active: bool,
    /// Optimistic concurrency version.
    pub version: i64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl ConsolidationGroup {
    /// Creates a group, enforcing membership invariants.
    pub fn create(
        organization_id: OrganizationId,
        input: CreateGroupInput,
        now: DateTime<Utc>,
    ) -> Result<Self, ConsolidationError> {
        let name = validate_name(&input.name)?;
        let mut group = Self {
            id: ConsolidationGroupId::new(),
            organization_id,
            name,
            description: input.description,
            reporting_currency: input.reporting_currency,
            consolidation_method: input.consolidation_method,
            parent_company_id: input.parent_company_id,
            members: Vec::with_capacity(input.members.len()),
            accounts: input.accounts,
            is_active: true,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        for member in input.members {
            group.push_member(member)?;
        }
        Ok(group)
    }

    /// Looks up a member.
    #[must_use]
    pub fn member(&self, company_id: CompanyId) -> Option<&ConsolidationMember> {
        self.members.iter().find(|m| m.company_id == company_id)
    }

    /// Parent plus member company IDs.
    #[must_use]
    pub fn company_ids(&self) -> Vec<CompanyId> {
        std::iter::once(self.parent_company_id)
            .chain(self.members.iter().map(|m| m.company_id))
            .collect()
    }

    /// Adds a member.
    pub fn add_member(
        &mut self,
        input: MemberInput,
        now: DateTime<Utc>,
    ) -> Result<&ConsolidationMember, ConsolidationError> {
        self.push_member(input)?;
        self.updated_at = now;
        let index = self.members.len() - 1;
        Ok(&self.members[index])
    }

    /// Applies a partial update to a member.
    pub fn update_member(
        &mut self,
        company_id: CompanyId,
        input: UpdateMemberInput,
        now: DateTime<Utc>,
    ) -> Result<&ConsolidationMember, ConsolidationError> {
        let index = self
            .members
            .iter()
            .position(|m| m.company_id == company_id)
            .ok_or(ConsolidationError::MemberNotFound {
                group_id: self.id,
                company_id,
            })?;
        let member = &mut self.members[index];

        if let Some(ownership) = input.ownership_percentage {
            member.set_ownership(Percentage::new(ownership)?);
        }
        if let Some(method) = input.consolidation_method {
            member.consolidation_method = method;
        }
        if let Some(date) = input.acquisition_date {
            member.acquisition_date = date;
        }
        if let Some(goodwill) = input.goodwill_amount {
            if goodwill.is_some_and(|g| g.is_sign_negative()) {
                return Err(ConsolidationError::Validation(
                    "goodwill_amount cannot be negative".to_string(),
                ));
            }
            member.goodwill_amount = goodwill;
        }
        if let Some(vie) = input.vie_determination {
            member.vie_determination = vie;
        }
        self.updated_at = now;
        Ok(&self.members[index])
    }

    /// Removes a member, returning it.
    pub fn remove_member(
        &mut self,
        company_id: CompanyId,
        now: DateTime<Utc>,
    ) -> Result<ConsolidationMember, ConsolidationError> {
        let index = self
            .members
            .iter()
            .position(|m| m.company_id == company_id)
            .ok_or(ConsolidationError::MemberNotFound {
                group_id: self.id,
                company_id,
            })?;
        self.updated_at = now;
        Ok(self.members.remove(index))
    }

    /// Applies a partial update to the group's own fields.
    pub fn apply_update(
        &mut self,
        input: UpdateGroupInput,
        now: DateTime<Utc>,
    ) -> Result<(), ConsolidationError> {
        if let Some(name) = input.name {
            self.name = validate_name(&name)?;
        }
        if let Some(description) = input.description {
            self.description = description;
        }
        if let Some(currency) = input.reporting_currency {
            self.reporting_currency = currency;
        }
        if let Some(method) = input.consolidation_method {
            self.consolidation_method = method;
        }
        if let Some(accounts) = input.accounts {
            self.accounts = accounts;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Marks the group active. Returns false if it already was.
    pub fn activate(&mut self, now: DateTime<Utc>) -> bool {
        self.set_active(true, now)
    }

    /// Marks the group inactive. Returns false if it already was.
    pub fn deactivate(&mut self, now: DateTime<Utc>) -> bool {
        self.set_active(false, now)
    }

    fn set_active(&mut self, active: bool, now: DateTime<Utc>) -> bool {
        if self.is_active == active {
            return false;
        }
        self.is_active = active;
        self.updated_at = now;
        true
    }

    fn push_member(&mut self, input: MemberInput) -> Result<(), ConsolidationError> {
        if input.company_id == self.parent_company_id {
            return Err(ConsolidationError::ParentCannotBeMember(input.company_id));
        }
        if self.member(input.company_id).is_some() {
            return Err(ConsolidationError::AlreadyMember(input.company_id));
        }
        let member = ConsolidationMember::from_input(input)?;
        self.members.push(member);
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<String, ConsolidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ConsolidationError::Validation(
            "name cannot be empty".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

/// Member data supplied when creating a group or adding a member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberInput {
    /// Member company.
    pub company_id: CompanyId,
    /// Ownership percentage (0-100).
    pub ownership_percentage: Decimal,
    /// Method override.
    #[serde(default)]
    pub consolidation_method: Option<ConsolidationMethod>,
    /// Date control was obtained.
    pub acquisition_date: NaiveDate,
    /// Goodwill recognized on acquisition.
    #[serde(default)]
    pub goodwill_amount: Option<Decimal>,
    /// VIE assessment.
    #[serde(default)]
    pub vie_determination: Option<VieDetermination>,
}

/// Partial member update. `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateMemberInput {
    /// New ownership percentage.
    pub ownership_percentage: Option<Decimal>,
    /// New method override.
    pub consolidation_method: Option<Option<ConsolidationMethod>>,
    /// New acquisition date.
    pub acquisition_date: Option<NaiveDate>,
    /// New goodwill amount.
    pub goodwill_amount: Option<Option<Decimal>>,
    /// New VIE assessment.
    pub vie_determination: Option<Option<VieDetermination>>,
}

/// Input for creating a group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGroupInput {
    /// Display name.
    pub name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Reporting currency.
    pub reporting_currency: Currency,
    /// Default consolidation method.
    pub consolidation_method: ConsolidationMethod,
    /// Parent company.
    pub parent_company_id: CompanyId,
    /// Initial members.
    #[serde(default)]
    pub members: Vec<MemberInput>,
    /// Adjustment accounts.
    #[serde(default)]
    pub accounts: ConsolidationAccounts,
}

/// Partial group update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateGroupInput {
    /// New name.
    pub name: Option<String>,
    /// New description (`Some(None)` clears it).
    pub description: Option<Option<String>>,
    /// New reporting currency.
    pub reporting_currency: Option<Currency>,
    /// New default method.
    pub consolidation_method: Option<ConsolidationMethod>,
    /// Replacement adjustment accounts.
    pub accounts: Option<ConsolidationAccounts>,
}

impl UpdateGroupInput {
    /// Returns true if the update changes how balances are computed.
    #[must_use]
    pub fn changes_computation(&self, group: &ConsolidationGroup) -> bool {
        self.reporting_currency
            .is_some_and(|c| c != group.reporting_currency)
            || self
                .consolidation_method
                .is_some_and(|m| m != group.consolidation_method)
    }
}

/// Filter for listing groups.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupFilter {
    /// Only active (or inactive) groups.
    pub is_active: Option<bool>,
    /// Groups containing this company as parent or member.
    pub company_id: Option<CompanyId>,
}

impl GroupFilter {
    /// Returns true if the group passes the filter.
    #[must_use]
    pub fn matches(&self, group: &ConsolidationGroup) -> bool {
        self.is_active.is_none_or(|active| group.is_active == active)
            && self
                .company_id
                .is_none_or(|company| group.company_ids().contains(&company))
    }
}
