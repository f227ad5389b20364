//! CLI configuration
//!
//! Layered, lowest priority first:
//!
//! 1. defaults in code
//! 2. `DATABASE_URL`, if set
//! 3. an optional TOML/YAML/JSON file passed with `--config`
//! 4. `PORTFOLIO_*` environment variables, nested keys split on `__`
//!    (e.g. `PORTFOLIO_ANALYTICS__EXPENSE_LOAD=0.2`)

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use core_kernel::CoreError;
use domain_analytics::AnalyticsConfig;
use domain_portfolio::PipelineConfig;
use infra_db::DatabaseConfig;

use crate::error::CliError;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "PORTFOLIO";

/// Database settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub statement_timeout_ms: u64,
    /// Apply pending migrations on startup
    pub run_migrations: bool,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/portfolio".to_string(),
            max_connections: 10,
            min_connections: 2,
            acquire_timeout_secs: 30,
            statement_timeout_ms: 30_000,
            run_migrations: true,
        }
    }
}

impl DatabaseSettings {
    pub fn to_database_config(&self) -> DatabaseConfig {
        DatabaseConfig::new(self.url.clone())
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .connect_timeout(Duration::from_secs(self.acquire_timeout_secs))
            .statement_timeout(Duration::from_millis(self.statement_timeout_ms))
    }
}

/// Log settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Filter used when `RUST_LOG` is not set
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseSettings,
    pub pipeline: PipelineConfig,
    pub analytics: AnalyticsConfig,
    pub log: LogSettings,
}

impl AppConfig {
    /// Loads configuration from the process environment and an optional file
    pub fn load(file: Option<&Path>) -> Result<Self, CliError> {
        let environment = config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true);
        Self::load_with(file, environment, std::env::var("DATABASE_URL").ok())
    }

    /// Loads configuration from explicit sources
    pub fn load_with(
        file: Option<&Path>,
        environment: config::Environment,
        database_url: Option<String>,
    ) -> Result<Self, CliError> {
        let mut builder = config::Config::builder();
        if let Some(url) = database_url {
            builder = builder.set_default("database.url", url)?;
        }
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config: AppConfig = builder.add_source(environment).build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every section
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Configuration` for an invalid section, or when the
    /// analytics currency differs from the currency the pipeline normalizes
    /// premiums into.
    pub fn validate(&self) -> Result<(), CoreError> {
        self.pipeline.validate()?;
        self.analytics.validate()?;

        let pipeline_currency = self.pipeline.exchange_rates.reporting();
        if self.analytics.reporting_currency != pipeline_currency {
            return Err(CoreError::configuration(format!(
                "analytics currency {} does not match pipeline reporting currency {}",
                self.analytics.reporting_currency, pipeline_currency
            )));
        }
        if self.database.statement_timeout_ms == 0 {
            return Err(CoreError::configuration("database statement timeout must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let source: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .source(Some(source))
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::load_with(None, env(&[]), None).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.analytics.context_budget, 4000);
        assert_eq!(config.pipeline.default_country, "BH");
    }

    #[test]
    fn test_environment_overrides_nested_keys() {
        let config = AppConfig::load_with(
            None,
            env(&[
                ("PORTFOLIO_ANALYTICS__EXPENSE_LOAD", "0.2"),
                ("PORTFOLIO_ANALYTICS__CONTEXT_BUDGET", "1200"),
                ("PORTFOLIO_PIPELINE__DEFAULT_COUNTRY", "SA"),
                ("PORTFOLIO_LOG__JSON", "true"),
            ]),
            None,
        )
        .unwrap();

        assert_eq!(config.analytics.expense_load, dec!(0.2));
        assert_eq!(config.analytics.context_budget, 1200);
        assert_eq!(config.pipeline.default_country, "SA");
        assert!(config.log.json);
    }

    #[test]
    fn test_database_url_fallback_is_overridden_by_prefixed_variable() {
        let fallback = AppConfig::load_with(None, env(&[]), Some("postgres://fallback/db".to_string())).unwrap();
        assert_eq!(fallback.database.url, "postgres://fallback/db");

        let explicit = AppConfig::load_with(
            None,
            env(&[("PORTFOLIO_DATABASE__URL", "postgres://explicit/db")]),
            Some("postgres://fallback/db".to_string()),
        )
        .unwrap();
        assert_eq!(explicit.database.url, "postgres://explicit/db");
    }

    #[test]
    fn test_invalid_section_is_rejected() {
        let err = AppConfig::load_with(
            None,
            env(&[("PORTFOLIO_ANALYTICS__CONTEXT_BUDGET", "10")]),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, CliError::Configuration(_)));
    }

    #[test]
    fn test_currency_mismatch_is_rejected() {
        let mut config = AppConfig::default();
        config.analytics.reporting_currency = core_kernel::Currency::SAR;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_database_settings_map_to_pool_config() {
        let settings = DatabaseSettings {
            statement_timeout_ms: 5_000,
            ..DatabaseSettings::default()
        };
        let config = settings.to_database_config();
        assert_eq!(config.statement_timeout_ms(), 5_000);
        assert_eq!(config.max_connections, 10);
    }
}
