//! Alias-driven column resolution
//!
//! Insurers name their columns however their core system exports them.
//! Each canonical field carries an ordered list of accepted header names;
//! the first alias that matches a non-empty cell wins. Header matching is
//! case-insensitive and ignores surrounding whitespace.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use core_kernel::CoreError;

use crate::record::RawRow;

/// Fields of the canonical policy record that can be sourced from a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    PolicyNumber,
    InsuredName,
    Premium,
    Currency,
    EffectiveDate,
    ExpirationDate,
    LineOfBusiness,
    Country,
    InsuranceType,
    Status,
}

impl CanonicalField {
    pub fn all() -> &'static [CanonicalField] {
        &[
            CanonicalField::PolicyNumber,
            CanonicalField::InsuredName,
            CanonicalField::Premium,
            CanonicalField::Currency,
            CanonicalField::EffectiveDate,
            CanonicalField::ExpirationDate,
            CanonicalField::LineOfBusiness,
            CanonicalField::Country,
            CanonicalField::InsuranceType,
            CanonicalField::Status,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            CanonicalField::PolicyNumber => "policy_number",
            CanonicalField::InsuredName => "insured_name",
            CanonicalField::Premium => "premium",
            CanonicalField::Currency => "currency",
            CanonicalField::EffectiveDate => "effective_date",
            CanonicalField::ExpirationDate => "expiration_date",
            CanonicalField::LineOfBusiness => "line_of_business",
            CanonicalField::Country => "country",
            CanonicalField::InsuranceType => "insurance_type",
            CanonicalField::Status => "status",
        }
    }

    fn default_aliases(&self) -> &'static [&'static str] {
        match self {
            CanonicalField::PolicyNumber => &["Policy Number", "policy_number", "PolicyNo", "Policy No", "Policy #"],
            CanonicalField::InsuredName => &["Insured Name", "insured_name", "InsuredName", "Insured"],
            CanonicalField::Premium => &["Premium", "Gross Premium", "Written Premium", "GWP"],
            CanonicalField::Currency => &["Currency", "CCY", "Currency Code"],
            CanonicalField::EffectiveDate => &["Effective Date", "effective_date", "Inception Date", "Start Date"],
            CanonicalField::ExpirationDate => &["Expiration Date", "expiration_date", "Expiry Date", "End Date"],
            CanonicalField::LineOfBusiness => &["Line of Business", "line_of_business", "LOB", "Class"],
            CanonicalField::Country => &["Country", "Country Code"],
            CanonicalField::InsuranceType => &["Type", "insurance_type", "Insurance Type"],
            CanonicalField::Status => &["Status", "policy_status", "Policy Status"],
        }
    }
}

/// Ordered header aliases per canonical field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasTable {
    aliases: BTreeMap<CanonicalField, Vec<String>>,
}

impl AliasTable {
    /// Creates a table with no aliases; fails validation until every field is filled
    pub fn empty() -> Self {
        Self {
            aliases: BTreeMap::new(),
        }
    }

    /// Replaces the aliases for a field
    pub fn with_aliases<I, S>(mut self, field: CanonicalField, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases
            .insert(field, aliases.into_iter().map(Into::into).collect());
        self
    }

    /// Appends an alias with the lowest priority for a field
    pub fn add_alias(&mut self, field: CanonicalField, alias: impl Into<String>) {
        self.aliases.entry(field).or_default().push(alias.into());
    }

    /// Returns the aliases for a field in priority order
    pub fn aliases(&self, field: CanonicalField) -> &[String] {
        self.aliases.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Fails if any canonical field has no usable alias
    pub fn validate(&self) -> Result<(), CoreError> {
        for field in CanonicalField::all() {
            let usable = self
                .aliases(*field)
                .iter()
                .any(|alias| !alias.trim().is_empty());
            if !usable {
                return Err(CoreError::configuration(format!(
                    "alias list for '{}' is empty",
                    field.name()
                )));
            }
        }
        Ok(())
    }

    /// Finds the cell for a field: first alias in priority order whose column
    /// holds a non-empty value
    pub fn resolve<'r>(&self, field: CanonicalField, row: &'r RawRow) -> Option<&'r Value> {
        self.aliases(field).iter().find_map(|alias| {
            let wanted = normalize_header(alias);
            row.cells()
                .iter()
                .find(|(header, value)| normalize_header(header) == wanted && !is_blank(value))
                .map(|(_, value)| value)
        })
    }
}

impl Default for AliasTable {
    fn default() -> Self {
        CanonicalField::all()
            .iter()
            .fold(Self::empty(), |table, field| {
                table.with_aliases(*field, field.default_aliases().iter().copied())
            })
    }
}

fn normalize_header(header: &str) -> String {
    header.trim().to_lowercase()
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}
