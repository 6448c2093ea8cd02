//! `SeaORM` Entity for elimination_rules table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "elimination_rules")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub organization_id: Uuid,
    pub group_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub elimination_type: String,
    #[sea_orm(column_type = "JsonBinary")]
    pub trigger_conditions: Json,
    #[sea_orm(column_type = "JsonBinary")]
    pub source_account_ids: Json,
    #[sea_orm(column_type = "JsonBinary")]
    pub target_account_ids: Json,
    pub debit_account_id: Uuid,
    pub credit_account_id: Uuid,
    pub is_automatic: bool,
    pub priority: i32,
    pub is_active: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::consolidation_groups::Entity",
        from = "Column::GroupId",
        to = "super::consolidation_groups::Column::Id"
    )]
    ConsolidationGroups,
}

impl Related<super::consolidation_groups::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ConsolidationGroups.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
