//! Audit trail stored in `audit_logs`.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde_json::json;
use uuid::Uuid;

use consolida_core::consolidation::{AuditEntity, AuditLogService, RepositoryError, TenantContext};
use consolida_shared::types::OrganizationId;

use super::db_err;
use crate::entities::audit_logs;

/// Writes one row per audited event.
#[derive(Debug, Clone)]
pub struct SqlAuditLog {
    db: DatabaseConnection,
}

impl SqlAuditLog {
    /// Creates a new audit log.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Events recorded for one entity, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn history(
        &self,
        organization_id: OrganizationId,
        entity: AuditEntity,
        entity_id: Uuid,
    ) -> Result<Vec<audit_logs::Model>, RepositoryError> {
        audit_logs::Entity::find()
            .filter(audit_logs::Column::OrganizationId.eq(organization_id.into_inner()))
            .filter(audit_logs::Column::EntityType.eq(entity.as_str()))
            .filter(audit_logs::Column::EntityId.eq(entity_id))
            .order_by_asc(audit_logs::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(db_err)
    }

    async fn record(
        &self,
        ctx: &TenantContext,
        entity: AuditEntity,
        entity_id: Uuid,
        action: &str,
        detail: serde_json::Value,
    ) -> Result<(), RepositoryError> {
        audit_logs::ActiveModel {
            id: Set(Uuid::now_v7()),
            organization_id: Set(ctx.organization_id.into_inner()),
            user_id: Set(ctx.user_id.into_inner()),
            entity_type: Set(entity.as_str().to_string()),
            entity_id: Set(entity_id),
            action: Set(action.to_string()),
            detail: Set(detail),
            created_at: Set(Utc::now().into()),
        }
        .insert(&self.db)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

#[async_trait]
impl AuditLogService for SqlAuditLog {
    async fn log_create(
        &self,
        ctx: &TenantContext,
        entity: AuditEntity,
        entity_id: Uuid,
        snapshot: serde_json::Value,
    ) -> Result<(), RepositoryError> {
        self.record(ctx, entity, entity_id, "create", snapshot).await
    }

    async fn log_update(
        &self,
        ctx: &TenantContext,
        entity: AuditEntity,
        entity_id: Uuid,
        before: serde_json::Value,
        after: serde_json::Value,
    ) -> Result<(), RepositoryError> {
        let detail = json!({ "before": before, "after": after });
        self.record(ctx, entity, entity_id, "update", detail).await
    }

    async fn log_status_change(
        &self,
        ctx: &TenantContext,
        entity: AuditEntity,
        entity_id: Uuid,
        from: String,
        to: String,
    ) -> Result<(), RepositoryError> {
        let detail = json!({ "from": from, "to": to });
        self.record(ctx, entity, entity_id, "status_change", detail).await
    }

    async fn log_delete(
        &self,
        ctx: &TenantContext,
        entity: AuditEntity,
        entity_id: Uuid,
    ) -> Result<(), RepositoryError> {
        self.record(ctx, entity, entity_id, "delete", json!({}))
            .await
    }
}
