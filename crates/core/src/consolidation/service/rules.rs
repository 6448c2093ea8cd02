//! Elimination rule commands.

use chrono::Utc;
use consolida_shared::types::{ConsolidationGroupId, EliminationRuleId};
use tracing::{error, info, warn};

use super::{ConsolidationService, audit_failed, snapshot};
use crate::consolidation::error::ConsolidationError;
use crate::consolidation::repository::{AuditEntity, TenantContext};
use crate::consolidation::rules::{
    CreateEliminationRuleInput, EliminationRule, UpdateEliminationRuleInput,
};

impl ConsolidationService {
    /// Creates one elimination rule.
    pub async fn create_elimination_rule(
        &self,
        ctx: &TenantContext,
        group_id: ConsolidationGroupId,
        input: CreateEliminationRuleInput,
    ) -> Result<EliminationRule, ConsolidationError> {
        let mut rules = self
            .bulk_create_elimination_rules(ctx, vec![(group_id, input)])
            .await?;
        rules
            .pop()
            .ok_or_else(|| ConsolidationError::Validation("no rule created".to_string()))
    }

    /// Creates several rules, possibly for different groups, all or nothing.
    ///
    /// Every group and account is checked before anything is written.
    pub async fn bulk_create_elimination_rules(
        &self,
        ctx: &TenantContext,
        requests: Vec<(ConsolidationGroupId, CreateEliminationRuleInput)>,
    ) -> Result<Vec<EliminationRule>, ConsolidationError> {
        if requests.is_empty() {
            return Err(ConsolidationError::Validation(
                "at least one rule is required".to_string(),
            ));
        }

        let now = Utc::now();
        let mut rules = Vec::with_capacity(requests.len());
        for (group_id, input) in requests {
            self.load_group(ctx, group_id).await?;
            let rule = EliminationRule::create(ctx.organization_id, group_id, input, now)?;
            self.ensure_accounts_exist(ctx, rule.referenced_accounts())
                .await?;
            rules.push(rule);
        }

        self.repository.insert_rules(&rules).await?;
        for (audited, rule) in rules.iter().enumerate() {
            if let Err(e) = self
                .audit
                .log_create(
                    ctx,
                    AuditEntity::EliminationRule,
                    rule.id.into_inner(),
                    snapshot(rule),
                )
                .await
            {
                self.revert_rule_creation(ctx, &rules, audited).await;
                return Err(audit_failed(e));
            }
        }

        info!(count = rules.len(), "Elimination rules created");
        Ok(rules)
    }

    /// Applies a partial update to a rule.
    pub async fn update_elimination_rule(
        &self,
        ctx: &TenantContext,
        rule_id: EliminationRuleId,
        input: UpdateEliminationRuleInput,
    ) -> Result<EliminationRule, ConsolidationError> {
        let mut rule = self.load_rule(ctx, rule_id).await?;
        let previous = rule.clone();

        rule.apply_update(input, Utc::now())?;
        self.ensure_accounts_exist(ctx, rule.referenced_accounts())
            .await?;

        self.repository.update_rule(&rule).await?;
        if let Err(e) = self
            .audit
            .log_update(
                ctx,
                AuditEntity::EliminationRule,
                rule_id.into_inner(),
                snapshot(&previous),
                snapshot(&rule),
            )
            .await
        {
            if let Err(revert) = self.repository.update_rule(&previous).await {
                error!(rule_id = %rule_id, error = %revert, "Failed to revert rule update");
            }
            return Err(audit_failed(e));
        }

        info!(rule_id = %rule_id, "Elimination rule updated");
        Ok(rule)
    }

    /// Makes a rule take part in future runs.
    pub async fn activate_elimination_rule(
        &self,
        ctx: &TenantContext,
        rule_id: EliminationRuleId,
    ) -> Result<EliminationRule, ConsolidationError> {
        let input = UpdateEliminationRuleInput {
            is_active: Some(true),
            ..UpdateEliminationRuleInput::default()
        };
        self.update_elimination_rule(ctx, rule_id, input).await
    }

    /// Excludes a rule from future runs.
    pub async fn deactivate_elimination_rule(
        &self,
        ctx: &TenantContext,
        rule_id: EliminationRuleId,
    ) -> Result<EliminationRule, ConsolidationError> {
        let input = UpdateEliminationRuleInput {
            is_active: Some(false),
            ..UpdateEliminationRuleInput::default()
        };
        self.update_elimination_rule(ctx, rule_id, input).await
    }

    /// Changes a rule's evaluation order.
    pub async fn update_rule_priority(
        &self,
        ctx: &TenantContext,
        rule_id: EliminationRuleId,
        priority: i32,
    ) -> Result<EliminationRule, ConsolidationError> {
        let input = UpdateEliminationRuleInput {
            priority: Some(priority),
            ..UpdateEliminationRuleInput::default()
        };
        self.update_elimination_rule(ctx, rule_id, input).await
    }

    /// Deletes a rule that no run has posted entries from.
    pub async fn delete_elimination_rule(
        &self,
        ctx: &TenantContext,
        rule_id: EliminationRuleId,
    ) -> Result<(), ConsolidationError> {
        let rule = self.load_rule(ctx, rule_id).await?;
        if self
            .repository
            .rule_has_entries(ctx.organization_id, rule_id)
            .await?
        {
            return Err(ConsolidationError::RuleInUse(rule_id));
        }

        self.repository
            .delete_rule(ctx.organization_id, rule_id)
            .await?;
        if let Err(e) = self
            .audit
            .log_delete(ctx, AuditEntity::EliminationRule, rule_id.into_inner())
            .await
        {
            if let Err(revert) = self.repository.insert_rules(&[rule]).await {
                error!(rule_id = %rule_id, error = %revert, "Failed to restore deleted rule");
            }
            return Err(audit_failed(e));
        }

        info!(rule_id = %rule_id, "Elimination rule deleted");
        Ok(())
    }

    /// Lists a group's rules by ascending priority.
    pub async fn list_elimination_rules(
        &self,
        ctx: &TenantContext,
        group_id: ConsolidationGroupId,
    ) -> Result<Vec<EliminationRule>, ConsolidationError> {
        self.load_group(ctx, group_id).await?;
        Ok(self
            .repository
            .list_rules(ctx.organization_id, group_id)
            .await?)
    }

    /// Removes rules whose creation could not be fully audited. The first
    /// `audited` rules already have a create record, so each gets a matching
    /// delete record where the audit log accepts one.
    async fn revert_rule_creation(
        &self,
        ctx: &TenantContext,
        rules: &[EliminationRule],
        audited: usize,
    ) {
        for (index, rule) in rules.iter().enumerate() {
            if let Err(e) = self
                .repository
                .delete_rule(ctx.organization_id, rule.id)
                .await
            {
                error!(rule_id = %rule.id, error = %e, "Failed to remove unaudited rule");
                continue;
            }
            if index < audited
                && let Err(e) = self
                    .audit
                    .log_delete(ctx, AuditEntity::EliminationRule, rule.id.into_inner())
                    .await
            {
                warn!(rule_id = %rule.id, error = %e, "Failed to audit rule removal");
            }
        }
    }

    async fn load_rule(
        &self,
        ctx: &TenantContext,
        rule_id: EliminationRuleId,
    ) -> Result<EliminationRule, ConsolidationError> {
        self.repository
            .find_rule(ctx.organization_id, rule_id)
            .await?
            .ok_or(ConsolidationError::RuleNotFound(rule_id))
    }
}
