//! SQL implementations of the consolidation repository traits.
//!
//! Repositories hide the `SeaORM` details from the core crate, which only
//! sees the traits in `consolida_core::consolidation::repository`.

pub mod account;
pub mod audit;
pub mod company;
pub mod consolidation;
pub mod exchange_rate;

pub use account::SqlAccountRepository;
pub use audit::SqlAuditLog;
pub use company::SqlCompanyRepository;
pub use consolidation::SqlConsolidationRepository;
pub use exchange_rate::SqlExchangeRateRepository;

use consolida_core::consolidation::RepositoryError;
use sea_orm::DbErr;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Maps a driver error onto the repository error.
pub(crate) fn db_err(err: DbErr) -> RepositoryError {
    RepositoryError::Database(err.to_string())
}

/// Parses a stored text column through `FromStr`.
pub(crate) fn parse_column<T>(column: &str, value: &str) -> Result<T, RepositoryError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| RepositoryError::Corrupt(format!("{column}: {e}")))
}

/// Decodes a JSONB column.
pub(crate) fn from_json<T: DeserializeOwned>(
    column: &str,
    value: serde_json::Value,
) -> Result<T, RepositoryError> {
    serde_json::from_value(value).map_err(|e| RepositoryError::Corrupt(format!("{column}: {e}")))
}

/// Encodes a value for a JSONB column.
pub(crate) fn to_json<T: Serialize>(
    column: &str,
    value: &T,
) -> Result<serde_json::Value, RepositoryError> {
    serde_json::to_value(value).map_err(|e| RepositoryError::Corrupt(format!("{column}: {e}")))
}
