//! Organization chart of accounts.

use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};

use consolida_core::consolidation::{AccountRepository, RepositoryError};
use consolida_core::ledger::Account;
use consolida_shared::types::{AccountId, OrganizationId};

use super::{db_err, parse_column};
use crate::entities::accounts;

/// Reads the chart of accounts.
#[derive(Debug, Clone)]
pub struct SqlAccountRepository {
    db: DatabaseConnection,
}

impl SqlAccountRepository {
    /// Creates a new account repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn to_account(model: accounts::Model) -> Result<Account, RepositoryError> {
    Ok(Account {
        id: AccountId::from_uuid(model.id),
        organization_id: OrganizationId::from_uuid(model.organization_id),
        account_type: parse_column("account_type", &model.account_type)?,
        cash_flow_category: model
            .cash_flow_category
            .as_deref()
            .map(|c| parse_column("cash_flow_category", c))
            .transpose()?,
        code: model.code,
        name: model.name,
        account_subtype: model.account_subtype,
        is_intercompany: model.is_intercompany,
        is_cash_flow_relevant: model.is_cash_flow_relevant,
        is_active: model.is_active,
    })
}

#[async_trait]
impl AccountRepository for SqlAccountRepository {
    async fn list_accounts(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<Account>, RepositoryError> {
        accounts::Entity::find()
            .filter(accounts::Column::OrganizationId.eq(organization_id.into_inner()))
            .order_by_asc(accounts::Column::Code)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(to_account)
            .collect()
    }

    async fn find_account(
        &self,
        organization_id: OrganizationId,
        account_id: AccountId,
    ) -> Result<Option<Account>, RepositoryError> {
        accounts::Entity::find_by_id(account_id.into_inner())
            .filter(accounts::Column::OrganizationId.eq(organization_id.into_inner()))
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(to_account)
            .transpose()
    }
}
