//! `SeaORM` Entity for consolidation_groups table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "consolidation_groups")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub reporting_currency: String,
    pub consolidation_method: String,
    pub parent_company_id: Uuid,
    #[sea_orm(column_type = "JsonBinary")]
    pub members: Json,
    #[sea_orm(column_type = "JsonBinary")]
    pub accounts: Json,
    pub is_active: bool,
    pub version: i64,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::elimination_rules::Entity")]
    EliminationRules,
    #[sea_orm(has_many = "super::consolidation_runs::Entity")]
    ConsolidationRuns,
}

impl Related<super::elimination_rules::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EliminationRules.def()
    }
}

impl Related<super::consolidation_runs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ConsolidationRuns.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
