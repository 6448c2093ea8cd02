//! `SeaORM` Entity for consolidation_runs table.
//!
//! Step progress and results are stored as JSONB documents.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "consolidation_runs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub organization_id: Uuid,
    pub group_id: Uuid,
    pub fiscal_year: i32,
    pub fiscal_period: i16,
    pub as_of_date: Date,
    pub status: String,
    #[sea_orm(column_type = "JsonBinary")]
    pub options: Json,
    #[sea_orm(column_type = "JsonBinary")]
    pub steps: Json,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub validation_result: Option<Json>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub trial_balance: Option<Json>,
    #[sea_orm(column_type = "JsonBinary")]
    pub elimination_entries: Json,
    #[sea_orm(column_type = "JsonBinary")]
    pub proposed_eliminations: Json,
    #[sea_orm(column_type = "JsonBinary")]
    pub nci_adjustments: Json,
    #[sea_orm(column_type = "JsonBinary")]
    pub warnings: Json,
    pub initiated_by: Uuid,
    pub initiated_at: DateTimeWithTimeZone,
    pub started_at: Option<DateTimeWithTimeZone>,
    pub completed_at: Option<DateTimeWithTimeZone>,
    pub total_duration_ms: Option<i64>,
    pub error_message: Option<String>,
    pub version: i64,
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
