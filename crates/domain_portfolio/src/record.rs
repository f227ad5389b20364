//! Canonical portfolio records and the raw rows they are built from

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use core_kernel::{ClaimRecordId, CoreError, TenantId};

/// One uploaded spreadsheet row: column headers mapped to untyped cells
///
/// Cells keep the file's column order. Values are JSON values because that
/// is what the spreadsheet decoding collaborator hands over: strings,
/// numbers, booleans or null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct RawRow {
    cells: Vec<(String, Value)>,
}

impl RawRow {
    /// Creates an empty row
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a cell, builder style
    pub fn with(mut self, header: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(header, value);
        self
    }

    /// Appends a cell
    pub fn push(&mut self, header: impl Into<String>, value: impl Into<Value>) {
        self.cells.push((header.into(), value.into()));
    }

    /// Returns the cells in column order
    pub fn cells(&self) -> &[(String, Value)] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            cells: iter
                .into_iter()
                .map(|(header, value)| (header.into(), value.into()))
                .collect(),
        }
    }
}

impl From<Map<String, Value>> for RawRow {
    fn from(map: Map<String, Value>) -> Self {
        map.into_iter().collect()
    }
}

impl From<RawRow> for Map<String, Value> {
    fn from(row: RawRow) -> Self {
        row.cells.into_iter().collect()
    }
}

/// Conventional or Shari'a-compliant cooperative cover
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsuranceType {
    #[default]
    Conventional,
    Takaful,
}

impl InsuranceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsuranceType::Conventional => "conventional",
            InsuranceType::Takaful => "takaful",
        }
    }
}

impl fmt::Display for InsuranceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InsuranceType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "conventional" => Ok(InsuranceType::Conventional),
            "takaful" => Ok(InsuranceType::Takaful),
            other => Err(CoreError::validation(format!("unknown insurance type '{}'", other))),
        }
    }
}

/// Policy lifecycle status
///
/// Records are never deleted; removal from the portfolio is a transition
/// to `Expired` or `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyStatus {
    #[default]
    Active,
    Expired,
    Cancelled,
}

impl PolicyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyStatus::Active => "active",
            PolicyStatus::Expired => "expired",
            PolicyStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for PolicyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(PolicyStatus::Active),
            "expired" => Ok(PolicyStatus::Expired),
            "cancelled" => Ok(PolicyStatus::Cancelled),
            other => Err(CoreError::validation(format!("unknown policy status '{}'", other))),
        }
    }
}

/// Line of business
///
/// A closed set of common GCC classes plus `Other` for insurer-specific
/// labels. Labels are matched case-insensitively with a few synonyms.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LineOfBusiness {
    Motor,
    Medical,
    Property,
    Marine,
    Engineering,
    Life,
    Liability,
    Energy,
    Aviation,
    Other(String),
    #[default]
    Unspecified,
}

impl LineOfBusiness {
    /// Maps a free-text label to a line of business
    pub fn from_label(label: &str) -> Self {
        let trimmed = label.trim();
        match trimmed.to_lowercase().as_str() {
            "" | "unspecified" => LineOfBusiness::Unspecified,
            "motor" | "auto" | "automobile" | "vehicle" => LineOfBusiness::Motor,
            "medical" | "health" | "healthcare" => LineOfBusiness::Medical,
            "property" | "fire" | "home" | "property & casualty" => LineOfBusiness::Property,
            "marine" | "cargo" | "hull" | "marine cargo" => LineOfBusiness::Marine,
            "engineering" | "construction" => LineOfBusiness::Engineering,
            "life" | "term life" | "family" => LineOfBusiness::Life,
            "liability" | "general liability" | "third party liability" => LineOfBusiness::Liability,
            "energy" | "oil & gas" => LineOfBusiness::Energy,
            "aviation" => LineOfBusiness::Aviation,
            _ => LineOfBusiness::Other(trimmed.to_string()),
        }
    }

    /// Returns the display label
    pub fn label(&self) -> &str {
        match self {
            LineOfBusiness::Motor => "Motor",
            LineOfBusiness::Medical => "Medical",
            LineOfBusiness::Property => "Property",
            LineOfBusiness::Marine => "Marine",
            LineOfBusiness::Engineering => "Engineering",
            LineOfBusiness::Life => "Life",
            LineOfBusiness::Liability => "Liability",
            LineOfBusiness::Energy => "Energy",
            LineOfBusiness::Aviation => "Aviation",
            LineOfBusiness::Other(label) => label,
            LineOfBusiness::Unspecified => "Unspecified",
        }
    }
}

impl fmt::Display for LineOfBusiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<String> for LineOfBusiness {
    fn from(label: String) -> Self {
        LineOfBusiness::from_label(&label)
    }
}

impl From<LineOfBusiness> for String {
    fn from(line: LineOfBusiness) -> Self {
        line.label().to_string()
    }
}

/// Canonical, storage-ready representation of one policy row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRecord {
    pub tenant_id: TenantId,
    /// Unique within the tenant; never empty
    pub policy_number: String,
    pub insured_name: Option<String>,
    /// Non-negative, in the pipeline's reporting currency
    pub premium: Decimal,
    pub effective_date: Option<NaiveDate>,
    pub expiration_date: Option<NaiveDate>,
    pub line_of_business: LineOfBusiness,
    /// Uppercase ISO-style country code
    pub country: String,
    pub insurance_type: InsuranceType,
    pub status: PolicyStatus,
}

impl PolicyRecord {
    /// Creates an active conventional record with only the required fields set
    pub fn new(
        tenant_id: TenantId,
        policy_number: impl Into<String>,
        premium: Decimal,
        country: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id,
            policy_number: policy_number.into(),
            insured_name: None,
            premium,
            effective_date: None,
            expiration_date: None,
            line_of_business: LineOfBusiness::Unspecified,
            country: country.into(),
            insurance_type: InsuranceType::Conventional,
            status: PolicyStatus::Active,
        }
    }

    /// Returns true if the policy counts towards portfolio aggregates
    pub fn is_active(&self) -> bool {
        self.status == PolicyStatus::Active
    }

    /// Returns true if the policy is a Takaful policy
    pub fn is_takaful(&self) -> bool {
        self.insurance_type == InsuranceType::Takaful
    }
}

/// A policy record as held by the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPolicy {
    pub record: PolicyRecord,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Claim status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
    #[default]
    Open,
    Closed,
    Reopened,
}

impl ClaimStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::Open => "open",
            ClaimStatus::Closed => "closed",
            ClaimStatus::Reopened => "reopened",
        }
    }
}

impl FromStr for ClaimStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(ClaimStatus::Open),
            "closed" => Ok(ClaimStatus::Closed),
            "reopened" => Ok(ClaimStatus::Reopened),
            other => Err(CoreError::validation(format!("unknown claim status '{}'", other))),
        }
    }
}

/// A loss event against a policy
///
/// The policy number is a soft reference: claims for unknown or inactive
/// policies are stored but ignored by aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub id: ClaimRecordId,
    pub tenant_id: TenantId,
    pub policy_number: String,
    pub paid_amount: Decimal,
    pub reserve_amount: Decimal,
    pub status: ClaimStatus,
}

impl ClaimRecord {
    /// Creates an open claim
    pub fn new(
        tenant_id: TenantId,
        policy_number: impl Into<String>,
        paid_amount: Decimal,
        reserve_amount: Decimal,
    ) -> Self {
        Self {
            id: ClaimRecordId::new_v7(),
            tenant_id,
            policy_number: policy_number.into(),
            paid_amount,
            reserve_amount,
            status: ClaimStatus::Open,
        }
    }

    /// Sets the claim status
    pub fn with_status(mut self, status: ClaimStatus) -> Self {
        self.status = status;
        self
    }

    /// Incurred loss: paid plus outstanding reserve, saturating at the decimal range
    pub fn incurred(&self) -> Decimal {
        self.paid_amount.saturating_add(self.reserve_amount)
    }

    /// Checks the amounts are non-negative and the policy reference is set
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.policy_number.trim().is_empty() {
            return Err(CoreError::validation("claim policy number is empty"));
        }
        if self.paid_amount < Decimal::ZERO || self.reserve_amount < Decimal::ZERO {
            return Err(CoreError::validation(format!(
                "claim {} has negative amounts (paid {}, reserve {})",
                self.id, self.paid_amount, self.reserve_amount
            )));
        }
        Ok(())
    }
}
