//! Consolida command-line runner.
//!
//! Usage:
//!   consolidator run <org> <user> <group> <year> <period> [flags]
//!   consolidator statements <org> <user> <run>
//!   consolidator rate <org> <from> <to> <rate> <effective-date>
//!
//! Run flags: `--force`, `--continue-on-warnings`, `--skip-validation`,
//! `--exclude-equity-method`.

use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm_migration::MigratorTrait;
use serde_json::json;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use consolida_core::consolidation::{
    ConsolidationService, FiscalPeriodRef, RunOptions, RunStatus, TenantContext,
};
use consolida_core::currency::ExchangeRate;
use consolida_core::reports::StatementKind;
use consolida_db::migration::Migrator;
use consolida_db::{
    SqlAccountRepository, SqlAuditLog, SqlCompanyRepository, SqlConsolidationRepository,
    SqlExchangeRateRepository, connect,
};
use consolida_shared::config::LoggingConfig;
use consolida_shared::types::{ConsolidationRunId, Currency, OrganizationId};
use consolida_shared::{AppConfig, AppError};

const STATEMENTS: [StatementKind; 4] = [
    StatementKind::BalanceSheet,
    StatementKind::IncomeStatement,
    StatementKind::CashFlow,
    StatementKind::Equity,
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(&config.logging);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((command, rest)) = args.split_first() else {
        bail!("usage: consolidator <run|statements|rate> ...");
    };

    let db = connect(&config.database).await?;
    Migrator::up(&db, None).await?;
    info!("Connected to database");

    let rates = SqlExchangeRateRepository::new(db.clone());
    if command == "rate" {
        return store_rate(&rates, rest).await;
    }

    let service = ConsolidationService::new(
        Arc::new(SqlCompanyRepository::new(db.clone())),
        Arc::new(SqlAccountRepository::new(db.clone())),
        Arc::new(rates),
        Arc::new(SqlConsolidationRepository::new(db.clone())),
        Arc::new(SqlAuditLog::new(db)),
        config.consolidation,
    );

    match command.as_str() {
        "run" => run(&service, rest).await,
        "statements" => {
            let [org, user, run_id] = rest else {
                bail!("usage: consolidator statements <org> <user> <run>");
            };
            let ctx = TenantContext::new(org.parse()?, user.parse()?);
            print_statements(&service, &ctx, run_id.parse()?).await
        }
        other => bail!("unknown command: {other}"),
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    let registry = tracing_subscriber::registry().with(filter);
    if logging.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(service: &ConsolidationService, args: &[String]) -> anyhow::Result<()> {
    let (positional, flags): (Vec<&String>, Vec<&String>) =
        args.iter().partition(|a| !a.starts_with("--"));
    let [org, user, group, year, period] = positional.as_slice() else {
        bail!("usage: consolidator run <org> <user> <group> <year> <period> [flags]");
    };

    let options = parse_options(&flags)?;
    let ctx = TenantContext::new(org.parse()?, user.parse()?);
    let period = FiscalPeriodRef::new(year.parse()?, period.parse()?)?;
    let run = service
        .run_consolidation(&ctx, group.parse()?, period, None, options)
        .await
        .map_err(AppError::from)?;

    info!(run_id = %run.id, status = run.status.as_str(), "Consolidation run finished");
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "run_id": run.id,
            "status": run.status,
            "steps": run.steps,
            "warnings": run.warnings,
            "error_message": run.error_message,
            "total_duration_ms": run.total_duration_ms,
        }))?
    );

    if run.status == RunStatus::Completed {
        print_statements(service, &ctx, run.id).await?;
    }
    Ok(())
}

fn parse_options(flags: &[&String]) -> anyhow::Result<RunOptions> {
    let mut options = RunOptions::default();
    for flag in flags {
        match flag.as_str() {
            "--force" => options.force_regeneration = true,
            "--continue-on-warnings" => options.continue_on_warnings = true,
            "--skip-validation" => options.skip_validation = true,
            "--exclude-equity-method" => options.include_equity_method_investments = false,
            other => bail!("unknown flag: {other}"),
        }
    }
    Ok(options)
}

async fn print_statements(
    service: &ConsolidationService,
    ctx: &TenantContext,
    run_id: ConsolidationRunId,
) -> anyhow::Result<()> {
    for kind in STATEMENTS {
        let statement = service
            .statement(ctx, run_id, kind)
            .await
            .map_err(AppError::from)?;
        println!("{}", serde_json::to_string_pretty(statement.as_ref())?);
    }
    Ok(())
}

async fn store_rate(rates: &SqlExchangeRateRepository, args: &[String]) -> anyhow::Result<()> {
    let [org, from, to, rate, date] = args else {
        bail!("usage: consolidator rate <org> <from> <to> <rate> <effective-date>");
    };
    let organization_id: OrganizationId = org.parse()?;
    let from: Currency = from.parse().map_err(anyhow::Error::msg)?;
    let to: Currency = to.parse().map_err(anyhow::Error::msg)?;
    let rate: Decimal = rate.parse()?;
    let date: NaiveDate = date.parse()?;

    rates
        .upsert_rate(organization_id, &ExchangeRate::new(from, to, rate, date))
        .await?;
    info!(%from, %to, %rate, %date, "Exchange rate stored");
    Ok(())
}
