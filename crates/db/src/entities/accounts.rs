//! `SeaORM` Entity for accounts table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub organization_id: Uuid,
    pub code: String,
    pub name: String,
    pub account_type: String,
    pub account_subtype: Option<String>,
    pub is_intercompany: bool,
    pub is_cash_flow_relevant: bool,
    pub cash_flow_category: Option<String>,
    pub is_active: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::account_balances::Entity")]
    AccountBalances,
}

impl Related<super::account_balances::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AccountBalances.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
