//! Initial consolidation schema.
//!
//! Creates the ledger inputs read by runs (companies, accounts, balances,
//! exchange rates) and the consolidation tables (groups, rules, runs, audit).

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: LEDGER INPUTS
        // ============================================================
        db.execute_unprepared(COMPANIES_SQL).await?;
        db.execute_unprepared(ACCOUNTS_SQL).await?;
        db.execute_unprepared(ACCOUNT_BALANCES_SQL).await?;
        db.execute_unprepared(EXCHANGE_RATES_SQL).await?;

        // ============================================================
        // PART 2: CONSOLIDATION
        // ============================================================
        db.execute_unprepared(CONSOLIDATION_GROUPS_SQL).await?;
        db.execute_unprepared(ELIMINATION_RULES_SQL).await?;
        db.execute_unprepared(CONSOLIDATION_RUNS_SQL).await?;

        // ============================================================
        // PART 3: AUDIT
        // ============================================================
        db.execute_unprepared(AUDIT_LOGS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const COMPANIES_SQL: &str = r"
CREATE TABLE companies (
    id UUID PRIMARY KEY,
    organization_id UUID NOT NULL,
    name VARCHAR(255) NOT NULL,
    functional_currency CHAR(3) NOT NULL,
    is_active BOOLEAN NOT NULL DEFAULT true,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_companies_org ON companies(organization_id);
";

const ACCOUNTS_SQL: &str = r"
CREATE TABLE accounts (
    id UUID PRIMARY KEY,
    organization_id UUID NOT NULL,
    code VARCHAR(20) NOT NULL,
    name VARCHAR(255) NOT NULL,
    account_type VARCHAR(20) NOT NULL,
    account_subtype VARCHAR(50),
    is_intercompany BOOLEAN NOT NULL DEFAULT false,
    is_cash_flow_relevant BOOLEAN NOT NULL DEFAULT false,
    cash_flow_category VARCHAR(20),
    is_active BOOLEAN NOT NULL DEFAULT true,
    CONSTRAINT chk_account_type CHECK (
        account_type IN ('asset', 'liability', 'equity', 'revenue', 'expense')
    ),
    CONSTRAINT chk_cash_flow_category CHECK (
        cash_flow_category IS NULL
        OR cash_flow_category IN ('operating', 'investing', 'financing')
    ),
    UNIQUE (organization_id, code)
);
";

const ACCOUNT_BALANCES_SQL: &str = r"
CREATE TABLE account_balances (
    id UUID PRIMARY KEY,
    company_id UUID NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
    account_id UUID NOT NULL REFERENCES accounts(id),
    balance_date DATE NOT NULL,
    debit NUMERIC(19, 4) NOT NULL DEFAULT 0,
    credit NUMERIC(19, 4) NOT NULL DEFAULT 0,
    CONSTRAINT chk_balance_non_negative CHECK (debit >= 0 AND credit >= 0)
);

CREATE INDEX idx_account_balances_company_date ON account_balances(company_id, balance_date);
";

const EXCHANGE_RATES_SQL: &str = r"
CREATE TABLE exchange_rates (
    id UUID PRIMARY KEY,
    organization_id UUID NOT NULL,
    from_currency CHAR(3) NOT NULL,
    to_currency CHAR(3) NOT NULL,
    rate NUMERIC(19, 10) NOT NULL,
    effective_date DATE NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_rate_positive CHECK (rate > 0),
    CONSTRAINT chk_different_currencies CHECK (from_currency <> to_currency),
    UNIQUE (organization_id, from_currency, to_currency, effective_date)
);

CREATE INDEX idx_exchange_rates_lookup ON exchange_rates(organization_id, from_currency, to_currency, effective_date DESC);
";

const CONSOLIDATION_GROUPS_SQL: &str = r"
CREATE TABLE consolidation_groups (
    id UUID PRIMARY KEY,
    organization_id UUID NOT NULL,
    name VARCHAR(255) NOT NULL,
    description TEXT,
    reporting_currency CHAR(3) NOT NULL,
    consolidation_method VARCHAR(40) NOT NULL,
    parent_company_id UUID NOT NULL REFERENCES companies(id),
    members JSONB NOT NULL DEFAULT '[]',
    accounts JSONB NOT NULL DEFAULT '{}',
    is_active BOOLEAN NOT NULL DEFAULT true,
    version BIGINT NOT NULL DEFAULT 1,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_consolidation_groups_org ON consolidation_groups(organization_id);
";

const ELIMINATION_RULES_SQL: &str = r"
CREATE TABLE elimination_rules (
    id UUID PRIMARY KEY,
    organization_id UUID NOT NULL,
    group_id UUID NOT NULL REFERENCES consolidation_groups(id) ON DELETE CASCADE,
    name VARCHAR(255) NOT NULL,
    description TEXT,
    elimination_type VARCHAR(50) NOT NULL,
    trigger_conditions JSONB NOT NULL DEFAULT '[]',
    source_account_ids JSONB NOT NULL DEFAULT '[]',
    target_account_ids JSONB NOT NULL DEFAULT '[]',
    debit_account_id UUID NOT NULL REFERENCES accounts(id),
    credit_account_id UUID NOT NULL REFERENCES accounts(id),
    is_automatic BOOLEAN NOT NULL DEFAULT true,
    priority INTEGER NOT NULL DEFAULT 100,
    is_active BOOLEAN NOT NULL DEFAULT true,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_elimination_rules_group ON elimination_rules(group_id, priority);
";

const CONSOLIDATION_RUNS_SQL: &str = r"
CREATE TABLE consolidation_runs (
    id UUID PRIMARY KEY,
    organization_id UUID NOT NULL,
    group_id UUID NOT NULL REFERENCES consolidation_groups(id) ON DELETE CASCADE,
    fiscal_year INTEGER NOT NULL,
    fiscal_period SMALLINT NOT NULL,
    as_of_date DATE NOT NULL,
    status VARCHAR(20) NOT NULL,
    options JSONB NOT NULL,
    steps JSONB NOT NULL,
    validation_result JSONB,
    trial_balance JSONB,
    elimination_entries JSONB NOT NULL DEFAULT '[]',
    proposed_eliminations JSONB NOT NULL DEFAULT '[]',
    nci_adjustments JSONB NOT NULL DEFAULT '[]',
    warnings JSONB NOT NULL DEFAULT '[]',
    initiated_by UUID NOT NULL,
    initiated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    started_at TIMESTAMPTZ,
    completed_at TIMESTAMPTZ,
    total_duration_ms BIGINT,
    error_message TEXT,
    version BIGINT NOT NULL DEFAULT 1,
    CONSTRAINT chk_run_status CHECK (
        status IN ('pending', 'in_progress', 'completed', 'failed', 'cancelled')
    ),
    CONSTRAINT chk_fiscal_period CHECK (fiscal_period BETWEEN 1 AND 13)
);

CREATE INDEX idx_consolidation_runs_group_period
    ON consolidation_runs(group_id, fiscal_year, fiscal_period, status);
CREATE INDEX idx_consolidation_runs_entries
    ON consolidation_runs USING GIN (elimination_entries jsonb_path_ops);
";

const AUDIT_LOGS_SQL: &str = r"
CREATE TABLE audit_logs (
    id UUID PRIMARY KEY,
    organization_id UUID NOT NULL,
    user_id UUID NOT NULL,
    entity_type VARCHAR(50) NOT NULL,
    entity_id UUID NOT NULL,
    action VARCHAR(20) NOT NULL,
    detail JSONB NOT NULL DEFAULT '{}',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_audit_logs_entity ON audit_logs(organization_id, entity_type, entity_id);
";

const DROP_ALL_SQL: &str = r"
DROP TABLE IF EXISTS audit_logs;
DROP TABLE IF EXISTS consolidation_runs;
DROP TABLE IF EXISTS elimination_rules;
DROP TABLE IF EXISTS consolidation_groups;
DROP TABLE IF EXISTS exchange_rates;
DROP TABLE IF EXISTS account_balances;
DROP TABLE IF EXISTS accounts;
DROP TABLE IF EXISTS companies;
";
