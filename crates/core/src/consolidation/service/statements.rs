//! Statement queries over completed runs.

use std::sync::Arc;

use consolida_shared::types::ConsolidationRunId;

use super::ConsolidationService;
use crate::consolidation::error::ConsolidationError;
use crate::consolidation::pipeline::AccountIndex;
use crate::consolidation::repository::TenantContext;
use crate::reports::{
    ConsolidatedBalanceSheet, ConsolidatedCashFlowStatement, ConsolidatedEquityStatement,
    ConsolidatedIncomeStatement, ConsolidatedStatement, StatementInput, StatementKind,
    StatementService,
};

impl ConsolidationService {
    /// Consolidated balance sheet of a completed run.
    pub async fn get_balance_sheet(
        &self,
        ctx: &TenantContext,
        run_id: ConsolidationRunId,
    ) -> Result<ConsolidatedBalanceSheet, ConsolidationError> {
        match self.statement(ctx, run_id, StatementKind::BalanceSheet).await?.as_ref() {
            ConsolidatedStatement::BalanceSheet(statement) => Ok(statement.clone()),
            other => Err(unexpected(other, StatementKind::BalanceSheet)),
        }
    }

    /// Consolidated income statement of a completed run.
    pub async fn get_income_statement(
        &self,
        ctx: &TenantContext,
        run_id: ConsolidationRunId,
    ) -> Result<ConsolidatedIncomeStatement, ConsolidationError> {
        match self.statement(ctx, run_id, StatementKind::IncomeStatement).await?.as_ref() {
            ConsolidatedStatement::IncomeStatement(statement) => Ok(statement.clone()),
            other => Err(unexpected(other, StatementKind::IncomeStatement)),
        }
    }

    /// Consolidated cash flow statement of a completed run.
    pub async fn get_cash_flow_statement(
        &self,
        ctx: &TenantContext,
        run_id: ConsolidationRunId,
    ) -> Result<ConsolidatedCashFlowStatement, ConsolidationError> {
        match self.statement(ctx, run_id, StatementKind::CashFlow).await?.as_ref() {
            ConsolidatedStatement::CashFlow(statement) => Ok(statement.clone()),
            other => Err(unexpected(other, StatementKind::CashFlow)),
        }
    }

    /// Consolidated statement of changes in equity of a completed run.
    pub async fn get_equity_statement(
        &self,
        ctx: &TenantContext,
        run_id: ConsolidationRunId,
    ) -> Result<ConsolidatedEquityStatement, ConsolidationError> {
        match self.statement(ctx, run_id, StatementKind::Equity).await?.as_ref() {
            ConsolidatedStatement::Equity(statement) => Ok(statement.clone()),
            other => Err(unexpected(other, StatementKind::Equity)),
        }
    }

    /// Generates a statement or serves it from the cache.
    ///
    /// The run is always loaded first so the cache never answers for a run
    /// outside the caller's organization.
    pub async fn statement(
        &self,
        ctx: &TenantContext,
        run_id: ConsolidationRunId,
        kind: StatementKind,
    ) -> Result<Arc<ConsolidatedStatement>, ConsolidationError> {
        let run = self.load_run(ctx, run_id).await?;
        if let Some(cached) = self.statements.get(run_id, kind) {
            return Ok(cached);
        }

        let group = self.load_group(ctx, run.group_id).await?;
        let accounts = AccountIndex::new(self.accounts.list_accounts(ctx.organization_id).await?);
        let input = StatementInput::from_run(&run, &group, &accounts)?;

        let statement = self.statements.get_or_generate(run_id, kind, || {
            Ok(match kind {
                StatementKind::BalanceSheet => {
                    ConsolidatedStatement::BalanceSheet(StatementService::balance_sheet(&input)?)
                }
                StatementKind::IncomeStatement => ConsolidatedStatement::IncomeStatement(
                    StatementService::income_statement(&input)?,
                ),
                StatementKind::CashFlow => {
                    ConsolidatedStatement::CashFlow(StatementService::cash_flow(&input)?)
                }
                StatementKind::Equity => {
                    ConsolidatedStatement::Equity(StatementService::equity_statement(&input)?)
                }
            })
        })?;
        Ok(statement)
    }
}

fn unexpected(statement: &ConsolidatedStatement, expected: StatementKind) -> ConsolidationError {
    ConsolidationError::Repository(format!(
        "cached {} found where {} was expected",
        statement.kind().as_str(),
        expected.as_str()
    ))
}
