//! Database migration runner for Consolida.
//!
//! Usage:
//!   migrator up      - Run all pending migrations
//!   migrator down    - Rollback last migration
//!   migrator status  - Show migration status
//!   migrator fresh   - Drop all tables and re-run migrations
//!
//! The database URL comes from the application configuration
//! (`CONSOLIDA__DATABASE__URL` or `config/*.toml`).

use anyhow::{Context, bail};
use sea_orm_migration::MigratorTrait;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use consolida_db::{connect, migration::Migrator};
use consolida_shared::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db = connect(&config.database).await?;
    let command = std::env::args().nth(1).unwrap_or_else(|| "up".to_string());

    match command.as_str() {
        "up" => Migrator::up(&db, None).await?,
        "down" => Migrator::down(&db, Some(1)).await?,
        "status" => Migrator::status(&db).await?,
        "fresh" => Migrator::fresh(&db).await?,
        other => bail!("unknown command: {other} (expected up, down, status or fresh)"),
    }

    info!(command = %command, "Migration command finished");
    Ok(())
}
