//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Consolidation engine configuration.
    #[serde(default)]
    pub consolidation: ConsolidationConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Consolidation engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsolidationConfig {
    /// Decimal places kept on currency-translated balances.
    #[serde(default = "default_translation_precision")]
    pub translation_precision: u32,
    /// Maximum number of generated statements kept in memory.
    #[serde(default = "default_report_cache_capacity")]
    pub report_cache_capacity: u64,
    /// Time-to-live of a cached statement in seconds.
    #[serde(default = "default_report_cache_ttl")]
    pub report_cache_ttl_secs: u64,
}

fn default_translation_precision() -> u32 {
    4
}

fn default_report_cache_capacity() -> u64 {
    256
}

fn default_report_cache_ttl() -> u64 {
    600 // 10 minutes
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            translation_precision: default_translation_precision(),
            report_cache_capacity: default_report_cache_capacity(),
            report_cache_ttl_secs: default_report_cache_ttl(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_log_filter() -> String {
    "consolida=info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("CONSOLIDA").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_environment() {
        temp_env::with_vars(
            [
                ("CONSOLIDA__DATABASE__URL", Some("postgres://localhost/consolida")),
                ("CONSOLIDA__CONSOLIDATION__TRANSLATION_PRECISION", Some("6")),
                ("RUN_MODE", Some("test-no-such-file")),
            ],
            || {
                let config = AppConfig::load().unwrap();
                assert_eq!(config.database.url, "postgres://localhost/consolida");
                assert_eq!(config.database.max_connections, 10);
                assert_eq!(config.consolidation.translation_precision, 6);
                assert_eq!(config.consolidation.report_cache_capacity, 256);
                assert_eq!(config.logging.filter, "consolida=info");
                assert!(!config.logging.json);
            },
        );
    }

    #[test]
    fn test_missing_database_url_fails() {
        temp_env::with_vars(
            [
                ("CONSOLIDA__DATABASE__URL", None::<&str>),
                ("RUN_MODE", Some("test-no-such-file")),
            ],
            || {
                assert!(AppConfig::load().is_err());
            },
        );
    }
}
