//! Pipeline configuration
//!
//! Everything the normalizer and the upsert coordinator need beyond the row
//! itself. Validated once at startup; an invalid configuration is fatal and
//! never surfaces per request.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

use core_kernel::{CoreError, ExchangeRates};

use crate::aliases::AliasTable;
use crate::upsert::MergePolicy;
use crate::validator::DuplicateResolution;

/// Configuration for the ingestion pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Country code used when a row has no country column
    pub default_country: String,
    /// Rates into the reporting currency
    pub exchange_rates: ExchangeRates,
    /// chrono format tried when a date is not ISO formatted
    pub fallback_date_format: String,
    /// How repeated policy numbers inside one upload are handled
    pub duplicate_resolution: DuplicateResolution,
    /// Which columns an upload may overwrite on an existing policy
    pub merge_policy: MergePolicy,
    /// Header aliases per canonical field
    pub aliases: AliasTable,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_country: "BH".to_string(),
            exchange_rates: ExchangeRates::default(),
            fallback_date_format: "%m/%d/%Y".to_string(),
            duplicate_resolution: DuplicateResolution::LastWins,
            merge_policy: MergePolicy::RefreshTerms,
            aliases: AliasTable::default(),
        }
    }
}

impl PipelineConfig {
    pub fn with_default_country(mut self, country: impl Into<String>) -> Self {
        self.default_country = country.into();
        self
    }

    pub fn with_exchange_rates(mut self, rates: ExchangeRates) -> Self {
        self.exchange_rates = rates;
        self
    }

    pub fn with_fallback_date_format(mut self, format: impl Into<String>) -> Self {
        self.fallback_date_format = format.into();
        self
    }

    pub fn with_duplicate_resolution(mut self, resolution: DuplicateResolution) -> Self {
        self.duplicate_resolution = resolution;
        self
    }

    pub fn with_merge_policy(mut self, policy: MergePolicy) -> Self {
        self.merge_policy = policy;
        self
    }

    pub fn with_aliases(mut self, aliases: AliasTable) -> Self {
        self.aliases = aliases;
        self
    }

    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Configuration` if an alias list is empty, the
    /// default country is not a 2-3 letter code, an exchange rate is not
    /// positive, or the fallback date format cannot round-trip a date.
    pub fn validate(&self) -> Result<(), CoreError> {
        self.aliases.validate()?;

        let country = self.default_country.trim();
        let country_ok = (2..=3).contains(&country.len())
            && country.chars().all(|c| c.is_ascii_uppercase());
        if !country_ok {
            return Err(CoreError::configuration(format!(
                "default country '{}' is not an uppercase 2-3 letter code",
                self.default_country
            )));
        }

        self.exchange_rates
            .validate()
            .map_err(|e| CoreError::configuration(format!("exchange rates: {}", e)))?;

        if !date_format_round_trips(&self.fallback_date_format) {
            return Err(CoreError::configuration(format!(
                "fallback date format '{}' cannot represent a full calendar date",
                self.fallback_date_format
            )));
        }

        Ok(())
    }
}

fn date_format_round_trips(format: &str) -> bool {
    let Some(sample) = NaiveDate::from_ymd_opt(2024, 11, 28) else {
        return false;
    };
    let mut rendered = String::new();
    if write!(rendered, "{}", sample.format(format)).is_err() {
        return false;
    }
    NaiveDate::parse_from_str(&rendered, format).ok() == Some(sample)
}
