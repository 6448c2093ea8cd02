//! Companies and their cumulative trial balances.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult, QueryFilter, QueryOrder,
    QuerySelect,
};
use uuid::Uuid;

use consolida_core::consolidation::{CompanyRepository, RepositoryError};
use consolida_core::ledger::{Company, CompanyTrialBalance, TrialBalanceLine};
use consolida_shared::types::{AccountId, CompanyId, OrganizationId};

use super::{db_err, parse_column};
use crate::entities::{account_balances, companies};

#[derive(Debug, FromQueryResult)]
struct BalanceRow {
    account_id: Uuid,
    debit: Decimal,
    credit: Decimal,
}

/// Reads companies and sums their posted balances.
#[derive(Debug, Clone)]
pub struct SqlCompanyRepository {
    db: DatabaseConnection,
}

impl SqlCompanyRepository {
    /// Creates a new company repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn find_model(
        &self,
        organization_id: OrganizationId,
        company_id: CompanyId,
    ) -> Result<Option<companies::Model>, RepositoryError> {
        companies::Entity::find_by_id(company_id.into_inner())
            .filter(companies::Column::OrganizationId.eq(organization_id.into_inner()))
            .one(&self.db)
            .await
            .map_err(db_err)
    }
}

fn to_company(model: companies::Model) -> Result<Company, RepositoryError> {
    Ok(Company {
        id: CompanyId::from_uuid(model.id),
        organization_id: OrganizationId::from_uuid(model.organization_id),
        functional_currency: parse_column("functional_currency", &model.functional_currency)?,
        name: model.name,
        is_active: model.is_active,
    })
}

#[async_trait]
impl CompanyRepository for SqlCompanyRepository {
    async fn find_company(
        &self,
        organization_id: OrganizationId,
        company_id: CompanyId,
    ) -> Result<Option<Company>, RepositoryError> {
        self.find_model(organization_id, company_id)
            .await?
            .map(to_company)
            .transpose()
    }

    async fn trial_balance(
        &self,
        organization_id: OrganizationId,
        company_id: CompanyId,
        as_of: NaiveDate,
    ) -> Result<CompanyTrialBalance, RepositoryError> {
        let company = self
            .find_model(organization_id, company_id)
            .await?
            .ok_or_else(|| RepositoryError::Database(format!("unknown company {company_id}")))?;

        let rows = account_balances::Entity::find()
            .select_only()
            .column(account_balances::Column::AccountId)
            .column_as(account_balances::Column::Debit.sum(), "debit")
            .column_as(account_balances::Column::Credit.sum(), "credit")
            .filter(account_balances::Column::CompanyId.eq(company.id))
            .filter(account_balances::Column::BalanceDate.lte(as_of))
            .group_by(account_balances::Column::AccountId)
            .order_by_asc(account_balances::Column::AccountId)
            .into_model::<BalanceRow>()
            .all(&self.db)
            .await
            .map_err(db_err)?;

        Ok(CompanyTrialBalance {
            company_id,
            currency: parse_column("functional_currency", &company.functional_currency)?,
            as_of,
            lines: rows
                .into_iter()
                .map(|row| TrialBalanceLine {
                    account_id: AccountId::from_uuid(row.account_id),
                    debit: row.debit,
                    credit: row.credit,
                })
                .collect(),
        })
    }
}
