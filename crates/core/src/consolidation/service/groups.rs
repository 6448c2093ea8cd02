//! Group and membership commands.

use chrono::Utc;
use consolida_shared::types::{CompanyId, ConsolidationGroupId, PageRequest, PageResponse};
use tracing::{error, info};

use super::{ConsolidationService, audit_failed, snapshot};
use crate::consolidation::error::ConsolidationError;
use crate::consolidation::group::{
    ConsolidationGroup, ConsolidationMember, CreateGroupInput, GroupFilter, MemberInput,
    UpdateGroupInput, UpdateMemberInput,
};
use crate::consolidation::repository::{AuditEntity, TenantContext};
use crate::consolidation::run::{RunFilter, RunStatus};

impl ConsolidationService {
    /// Creates a group with its initial members.
    ///
    /// The parent and every member must be active companies of the caller's
    /// organization; configured consolidation accounts must exist.
    pub async fn create_group(
        &self,
        ctx: &TenantContext,
        input: CreateGroupInput,
    ) -> Result<ConsolidationGroup, ConsolidationError> {
        let parent = self
            .companies
            .find_company(ctx.organization_id, input.parent_company_id)
            .await?
            .ok_or(ConsolidationError::ParentCompanyNotFound(input.parent_company_id))?;
        if !parent.is_active {
            return Err(ConsolidationError::CompanyInactive(parent.id));
        }
        for member in &input.members {
            self.ensure_member_company(ctx, member.company_id).await?;
        }
        self.ensure_accounts_exist(ctx, input.accounts.configured().collect::<Vec<_>>())
            .await?;

        let group = ConsolidationGroup::create(ctx.organization_id, input, Utc::now())?;

        self.repository.insert_group(&group).await?;
        if let Err(e) = self
            .audit
            .log_create(
                ctx,
                AuditEntity::ConsolidationGroup,
                group.id.into_inner(),
                snapshot(&group),
            )
            .await
        {
            if let Err(revert) = self
                .repository
                .delete_group(ctx.organization_id, group.id)
                .await
            {
                error!(
                    group_id = %group.id,
                    error = %revert,
                    "Failed to remove group after audit failure"
                );
            }
            return Err(audit_failed(e));
        }

        info!(
            group_id = %group.id,
            members = group.members.len(),
            currency = %group.reporting_currency,
            "Consolidation group created"
        );
        Ok(group)
    }

    /// Applies a partial update to a group.
    ///
    /// Changing the reporting currency or default method is rejected while a
    /// run of the group is in progress.
    pub async fn update_group(
        &self,
        ctx: &TenantContext,
        group_id: ConsolidationGroupId,
        input: UpdateGroupInput,
    ) -> Result<ConsolidationGroup, ConsolidationError> {
        let mut group = self.load_group(ctx, group_id).await?;

        if input.changes_computation(&group) && self.has_active_run(ctx, group_id).await? {
            return Err(ConsolidationError::GroupHasActiveRun(group_id));
        }
        if let Some(accounts) = &input.accounts {
            self.ensure_accounts_exist(ctx, accounts.configured().collect::<Vec<_>>())
                .await?;
        }

        let previous = group.clone();
        group.apply_update(input, Utc::now())?;

        let audit = self.audit.log_update(
            ctx,
            AuditEntity::ConsolidationGroup,
            group_id.into_inner(),
            snapshot(&previous),
            snapshot(&group),
        );
        self.commit_group(&mut group, &previous, audit).await?;

        info!(group_id = %group_id, "Consolidation group updated");
        Ok(group)
    }

    /// Activates a group. Activating an active group is a no-op.
    pub async fn activate_group(
        &self,
        ctx: &TenantContext,
        group_id: ConsolidationGroupId,
    ) -> Result<ConsolidationGroup, ConsolidationError> {
        self.set_group_active(ctx, group_id, true).await
    }

    /// Deactivates a group. Runs already initiated are unaffected.
    pub async fn deactivate_group(
        &self,
        ctx: &TenantContext,
        group_id: ConsolidationGroupId,
    ) -> Result<ConsolidationGroup, ConsolidationError> {
        self.set_group_active(ctx, group_id, false).await
    }

    /// Deletes a group.
    ///
    /// Groups with completed runs are kept; otherwise the group is
    /// deactivated, which removes it from active use while preserving its
    /// history.
    pub async fn delete_group(
        &self,
        ctx: &TenantContext,
        group_id: ConsolidationGroupId,
    ) -> Result<(), ConsolidationError> {
        let mut group = self.load_group(ctx, group_id).await?;

        if self
            .repository
            .latest_completed_run(ctx.organization_id, group_id, None)
            .await?
            .is_some()
        {
            return Err(ConsolidationError::HasCompletedRuns(group_id));
        }

        let previous = group.clone();
        let audit =
            self.audit
                .log_delete(ctx, AuditEntity::ConsolidationGroup, group_id.into_inner());
        if group.deactivate(Utc::now()) {
            self.commit_group(&mut group, &previous, audit).await?;
        } else {
            audit.await.map_err(audit_failed)?;
        }

        info!(group_id = %group_id, "Consolidation group deleted (deactivated)");
        Ok(())
    }

    /// Adds a member company.
    pub async fn add_member(
        &self,
        ctx: &TenantContext,
        group_id: ConsolidationGroupId,
        input: MemberInput,
    ) -> Result<ConsolidationMember, ConsolidationError> {
        self.ensure_member_company(ctx, input.company_id).await?;
        let mut group = self.load_group(ctx, group_id).await?;

        let previous = group.clone();
        let member = group.add_member(input, Utc::now())?.clone();

        let audit = self.audit.log_create(
            ctx,
            AuditEntity::ConsolidationMember,
            member.company_id.into_inner(),
            snapshot(&member),
        );
        self.commit_group(&mut group, &previous, audit).await?;

        info!(
            group_id = %group_id,
            company_id = %member.company_id,
            ownership = %member.ownership_percentage,
            "Member added to consolidation group"
        );
        Ok(member)
    }

    /// Applies a partial update to a member. NCI follows ownership.
    pub async fn update_member(
        &self,
        ctx: &TenantContext,
        group_id: ConsolidationGroupId,
        company_id: CompanyId,
        input: UpdateMemberInput,
    ) -> Result<ConsolidationMember, ConsolidationError> {
        let mut group = self.load_group(ctx, group_id).await?;
        let before = group
            .member(company_id)
            .map(snapshot)
            .ok_or(ConsolidationError::MemberNotFound {
                group_id,
                company_id,
            })?;

        let previous = group.clone();
        let member = group.update_member(company_id, input, Utc::now())?.clone();

        let audit = self.audit.log_update(
            ctx,
            AuditEntity::ConsolidationMember,
            company_id.into_inner(),
            before,
            snapshot(&member),
        );
        self.commit_group(&mut group, &previous, audit).await?;

        info!(group_id = %group_id, company_id = %company_id, "Group member updated");
        Ok(member)
    }

    /// Removes a member company.
    pub async fn remove_member(
        &self,
        ctx: &TenantContext,
        group_id: ConsolidationGroupId,
        company_id: CompanyId,
    ) -> Result<(), ConsolidationError> {
        let mut group = self.load_group(ctx, group_id).await?;
        let previous = group.clone();
        group.remove_member(company_id, Utc::now())?;

        let audit =
            self.audit
                .log_delete(ctx, AuditEntity::ConsolidationMember, company_id.into_inner());
        self.commit_group(&mut group, &previous, audit).await?;

        info!(group_id = %group_id, company_id = %company_id, "Member removed from group");
        Ok(())
    }

    /// Fetches a group.
    pub async fn get_group(
        &self,
        ctx: &TenantContext,
        group_id: ConsolidationGroupId,
    ) -> Result<ConsolidationGroup, ConsolidationError> {
        self.load_group(ctx, group_id).await
    }

    /// Lists groups ordered by name.
    pub async fn list_groups(
        &self,
        ctx: &TenantContext,
        filter: &GroupFilter,
        page: &PageRequest,
    ) -> Result<PageResponse<ConsolidationGroup>, ConsolidationError> {
        let groups = self
            .repository
            .list_groups(ctx.organization_id, filter)
            .await?;
        Ok(page.paginate(groups))
    }

    async fn set_group_active(
        &self,
        ctx: &TenantContext,
        group_id: ConsolidationGroupId,
        active: bool,
    ) -> Result<ConsolidationGroup, ConsolidationError> {
        let mut group = self.load_group(ctx, group_id).await?;
        let previous = group.clone();
        let now = Utc::now();
        let changed = if active {
            group.activate(now)
        } else {
            group.deactivate(now)
        };
        if !changed {
            return Ok(group);
        }

        let (from, to) = if active {
            ("inactive", "active")
        } else {
            ("active", "inactive")
        };
        let audit = self.audit.log_status_change(
            ctx,
            AuditEntity::ConsolidationGroup,
            group_id.into_inner(),
            from.to_string(),
            to.to_string(),
        );
        self.commit_group(&mut group, &previous, audit).await?;

        info!(group_id = %group_id, active, "Consolidation group status changed");
        Ok(group)
    }

    async fn ensure_member_company(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
    ) -> Result<(), ConsolidationError> {
        let company = self
            .companies
            .find_company(ctx.organization_id, company_id)
            .await?
            .ok_or(ConsolidationError::CompanyNotFound(company_id))?;
        if !company.is_active {
            return Err(ConsolidationError::CompanyInactive(company_id));
        }
        Ok(())
    }

    async fn has_active_run(
        &self,
        ctx: &TenantContext,
        group_id: ConsolidationGroupId,
    ) -> Result<bool, ConsolidationError> {
        let filter = RunFilter {
            group_id: Some(group_id),
            status: Some(RunStatus::InProgress),
            ..RunFilter::default()
        };
        Ok(!self
            .repository
            .list_runs(ctx.organization_id, &filter)
            .await?
            .is_empty())
    }
}
