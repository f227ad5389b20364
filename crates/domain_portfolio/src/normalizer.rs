//! Schema Normalizer
//!
//! Maps one raw spreadsheet row onto a [`PolicyRecord`]. The mapping is a
//! pure function of the row, the tenant and the [`PipelineConfig`]: no
//! storage is touched and the same input always yields the same output.
//!
//! Leniency rules:
//!
//! - an unparsable premium is read as zero, a negative one is a defect
//! - an unparsable date is absent, never a defect
//! - missing country, type and status fall back to configured defaults

use chrono::{Duration, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use tracing::debug;

use core_kernel::{CoreError, Currency, MoneyError, TenantId};

use crate::aliases::CanonicalField;
use crate::config::PipelineConfig;
use crate::error::NormalizationDefect;
use crate::record::{InsuranceType, LineOfBusiness, PolicyRecord, PolicyStatus, RawRow};

/// Largest spreadsheet serial accepted as a date (9999-12-31)
const MAX_SERIAL_DATE: i64 = 2_958_465;

/// Country names that map to GCC codes
const GCC_COUNTRY_NAMES: &[(&str, &str)] = &[
    ("bahrain", "BH"),
    ("kingdom of bahrain", "BH"),
    ("saudi arabia", "SA"),
    ("kingdom of saudi arabia", "SA"),
    ("ksa", "SA"),
    ("united arab emirates", "AE"),
    ("uae", "AE"),
    ("kuwait", "KW"),
    ("oman", "OM"),
    ("sultanate of oman", "OM"),
    ("qatar", "QA"),
];

/// Normalizes raw rows into canonical policy records
#[derive(Debug, Clone)]
pub struct SchemaNormalizer {
    config: PipelineConfig,
}

impl SchemaNormalizer {
    /// Creates a normalizer, validating the configuration first
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Configuration` when the configuration is invalid.
    pub fn new(config: PipelineConfig) -> Result<Self, CoreError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Maps one row to a canonical record
    ///
    /// # Errors
    ///
    /// Returns the first [`NormalizationDefect`] found. Defects are checked in
    /// field order: policy number, premium, currency, dates, country,
    /// insurance type, status.
    pub fn normalize(&self, row: &RawRow, tenant_id: TenantId) -> Result<PolicyRecord, NormalizationDefect> {
        let policy_number = self
            .text(CanonicalField::PolicyNumber, row)
            .ok_or(NormalizationDefect::MissingPolicyNumber)?;

        let premium = self.premium(row)?;

        let effective_date = self.date(CanonicalField::EffectiveDate, row);
        let expiration_date = self.date(CanonicalField::ExpirationDate, row);
        if let (Some(effective), Some(expiration)) = (effective_date, expiration_date) {
            if expiration < effective {
                return Err(NormalizationDefect::ExpirationBeforeEffective { effective, expiration });
            }
        }

        let country = match self.text(CanonicalField::Country, row) {
            Some(value) => normalize_country(&value)?,
            None => self.config.default_country.trim().to_string(),
        };

        let insurance_type = match self.text(CanonicalField::InsuranceType, row) {
            Some(value) => parse_insurance_type(&value)?,
            None => InsuranceType::Conventional,
        };

        let status = match self.text(CanonicalField::Status, row) {
            Some(value) => parse_status(&value)?,
            None => PolicyStatus::Active,
        };

        let line_of_business = self
            .text(CanonicalField::LineOfBusiness, row)
            .map(|label| LineOfBusiness::from_label(&label))
            .unwrap_or_default();

        Ok(PolicyRecord {
            tenant_id,
            policy_number,
            insured_name: self.text(CanonicalField::InsuredName, row),
            premium,
            effective_date,
            expiration_date,
            line_of_business,
            country,
            insurance_type,
            status,
        })
    }

    fn text(&self, field: CanonicalField, row: &RawRow) -> Option<String> {
        self.config.aliases.resolve(field, row).and_then(cell_text)
    }

    fn premium(&self, row: &RawRow) -> Result<Decimal, NormalizationDefect> {
        let amount = match self.config.aliases.resolve(CanonicalField::Premium, row) {
            Some(value) => parse_amount(value).unwrap_or_else(|| {
                debug!(cell = %value, "Unparsable premium read as zero");
                Decimal::ZERO
            }),
            None => Decimal::ZERO,
        };

        if amount < Decimal::ZERO {
            return Err(NormalizationDefect::NegativePremium { value: amount });
        }

        let Some(code) = self.text(CanonicalField::Currency, row) else {
            return Ok(amount);
        };
        let unsupported = || NormalizationDefect::UnsupportedCurrency { currency: code.clone() };
        let currency = Currency::from_str(&code).map_err(|_| unsupported())?;
        self.config
            .exchange_rates
            .to_reporting(amount, currency)
            .map_err(|e| match e {
                MoneyError::Overflow { amount, .. } => NormalizationDefect::PremiumOutOfRange { value: amount },
                _ => unsupported(),
            })
    }

    fn date(&self, field: CanonicalField, row: &RawRow) -> Option<NaiveDate> {
        let value = self.config.aliases.resolve(field, row)?;
        let parsed = parse_date(value, &self.config.fallback_date_format);
        if parsed.is_none() {
            debug!(field = field.name(), cell = %value, "Unparsable date treated as absent");
        }
        parsed
    }
}

/// Renders a cell as trimmed text; integral numbers lose their decimal point
fn cell_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => i.to_string(),
            (_, Some(u), _) => u.to_string(),
            (_, _, Some(f)) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        other => other.to_string(),
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Parses a monetary cell
///
/// Accepts plain and scientific notation, thousands separators, underscores,
/// embedded whitespace, a leading `+` and accounting-style `(123)` negatives.
fn parse_amount(value: &Value) -> Option<Decimal> {
    let raw = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        _ => return None,
    };

    let mut cleaned: String = raw
        .chars()
        .filter(|c| *c != ',' && *c != '_' && !c.is_whitespace())
        .collect();

    let negated = cleaned.starts_with('(') && cleaned.ends_with(')') && cleaned.len() > 2;
    if negated {
        cleaned = cleaned[1..cleaned.len() - 1].to_string();
    }
    let digits = cleaned.strip_prefix('+').unwrap_or(&cleaned);
    if digits.is_empty() {
        return None;
    }

    let amount = Decimal::from_str(digits)
        .or_else(|_| Decimal::from_scientific(digits))
        .ok()?;
    Some(if negated { -amount } else { amount })
}

/// Parses a date cell: spreadsheet serial, ISO date or ISO datetime prefix,
/// then the configured fallback format
fn parse_date(value: &Value, fallback_format: &str) -> Option<NaiveDate> {
    match value {
        Value::Number(n) => {
            let serial = Decimal::from_str(&n.to_string())
                .ok()
                .or_else(|| n.as_f64().and_then(Decimal::from_f64_retain))?;
            serial_to_date(serial.floor().to_i64()?)
        }
        Value::String(s) => {
            let s = s.trim();
            match s.get(..10) {
                Some(prefix) if looks_iso(prefix) => NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok(),
                _ => NaiveDate::parse_from_str(s, fallback_format).ok(),
            }
        }
        _ => None,
    }
}

fn looks_iso(prefix: &str) -> bool {
    prefix.char_indices().all(|(i, c)| match i {
        4 | 7 => c == '-',
        _ => c.is_ascii_digit(),
    })
}

/// Days since 1899-12-30, the epoch spreadsheet applications count from
fn serial_to_date(serial: i64) -> Option<NaiveDate> {
    if !(1..=MAX_SERIAL_DATE).contains(&serial) {
        return None;
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_signed(Duration::days(serial))
}

fn normalize_country(value: &str) -> Result<String, NormalizationDefect> {
    let lowered = value.trim().to_lowercase();
    if let Some((_, code)) = GCC_COUNTRY_NAMES.iter().find(|(name, _)| *name == lowered) {
        return Ok((*code).to_string());
    }

    let code = lowered.to_ascii_uppercase();
    if (2..=3).contains(&code.len()) && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(code)
    } else {
        Err(NormalizationDefect::InvalidCountry {
            value: value.to_string(),
        })
    }
}

fn parse_insurance_type(value: &str) -> Result<InsuranceType, NormalizationDefect> {
    let lowered = value.trim().to_lowercase();
    if lowered.contains("takaful") {
        return Ok(InsuranceType::Takaful);
    }
    match lowered.as_str() {
        "conventional" | "traditional" => Ok(InsuranceType::Conventional),
        _ => Err(NormalizationDefect::UnknownInsuranceType {
            value: value.to_string(),
        }),
    }
}

fn parse_status(value: &str) -> Result<PolicyStatus, NormalizationDefect> {
    match value.trim().to_lowercase().as_str() {
        "active" | "in force" | "inforce" | "in-force" => Ok(PolicyStatus::Active),
        "expired" | "lapsed" => Ok(PolicyStatus::Expired),
        "cancelled" | "canceled" | "terminated" => Ok(PolicyStatus::Cancelled),
        _ => Err(NormalizationDefect::UnknownStatus {
            value: value.to_string(),
        }),
    }
}
