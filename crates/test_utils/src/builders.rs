//! Test Data Builders
//!
//! Builder patterns for constructing test data with sensible defaults.
//! Tests specify only the relevant fields and get defaults for everything
//! else.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;

use core_kernel::TenantId;
use domain_portfolio::{
    ClaimRecord, ClaimStatus, InsuranceType, LineOfBusiness, PolicyRecord, PolicyStatus, RawRow,
};

use crate::fixtures::TenantFixtures;

/// Builder for canonical policy records
///
/// Defaults: tenant `acme`, policy `P-1`, premium 1,500, Bahrain,
/// conventional, active.
#[derive(Debug, Clone)]
pub struct PolicyRecordBuilder {
    record: PolicyRecord,
}

impl Default for PolicyRecordBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyRecordBuilder {
    pub fn new() -> Self {
        Self {
            record: PolicyRecord::new(TenantFixtures::acme(), "P-1", dec!(1500), "BH"),
        }
    }

    pub fn tenant(mut self, tenant_id: TenantId) -> Self {
        self.record.tenant_id = tenant_id;
        self
    }

    pub fn policy_number(mut self, number: impl Into<String>) -> Self {
        self.record.policy_number = number.into();
        self
    }

    pub fn insured_name(mut self, name: impl Into<String>) -> Self {
        self.record.insured_name = Some(name.into());
        self
    }

    pub fn premium(mut self, premium: Decimal) -> Self {
        self.record.premium = premium;
        self
    }

    pub fn country(mut self, country: impl Into<String>) -> Self {
        self.record.country = country.into();
        self
    }

    pub fn line_of_business(mut self, line: LineOfBusiness) -> Self {
        self.record.line_of_business = line;
        self
    }

    pub fn takaful(mut self) -> Self {
        self.record.insurance_type = InsuranceType::Takaful;
        self
    }

    pub fn status(mut self, status: PolicyStatus) -> Self {
        self.record.status = status;
        self
    }

    /// Sets both ends of the term
    pub fn term(mut self, effective: NaiveDate, expiration: NaiveDate) -> Self {
        self.record.effective_date = Some(effective);
        self.record.expiration_date = Some(expiration);
        self
    }

    pub fn build(self) -> PolicyRecord {
        self.record
    }
}

/// Builder for claims
#[derive(Debug, Clone)]
pub struct ClaimRecordBuilder {
    claim: ClaimRecord,
}

impl ClaimRecordBuilder {
    /// Starts an open claim with zero amounts against `policy_number`
    pub fn against(policy_number: impl Into<String>) -> Self {
        Self {
            claim: ClaimRecord::new(TenantFixtures::acme(), policy_number, Decimal::ZERO, Decimal::ZERO),
        }
    }

    pub fn tenant(mut self, tenant_id: TenantId) -> Self {
        self.claim.tenant_id = tenant_id;
        self
    }

    pub fn paid(mut self, amount: Decimal) -> Self {
        self.claim.paid_amount = amount;
        self
    }

    pub fn reserve(mut self, amount: Decimal) -> Self {
        self.claim.reserve_amount = amount;
        self
    }

    pub fn status(mut self, status: ClaimStatus) -> Self {
        self.claim.status = status;
        self
    }

    pub fn build(self) -> ClaimRecord {
        self.claim
    }
}

/// Builder for raw upload rows using the default header spellings
#[derive(Debug, Clone, Default)]
pub struct RawRowBuilder {
    row: RawRow,
}

impl RawRowBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn policy_number(self, value: impl Into<Value>) -> Self {
        self.cell("Policy Number", value)
    }

    pub fn premium(self, value: impl Into<Value>) -> Self {
        self.cell("Premium", value)
    }

    pub fn currency(self, value: impl Into<Value>) -> Self {
        self.cell("Currency", value)
    }

    pub fn country(self, value: impl Into<Value>) -> Self {
        self.cell("Country", value)
    }

    pub fn effective_date(self, value: impl Into<Value>) -> Self {
        self.cell("Effective Date", value)
    }

    pub fn expiration_date(self, value: impl Into<Value>) -> Self {
        self.cell("Expiration Date", value)
    }

    pub fn insurance_type(self, value: impl Into<Value>) -> Self {
        self.cell("Type", value)
    }

    pub fn status(self, value: impl Into<Value>) -> Self {
        self.cell("Status", value)
    }

    pub fn line_of_business(self, value: impl Into<Value>) -> Self {
        self.cell("Line of Business", value)
    }

    /// Adds a cell under an arbitrary header
    pub fn cell(mut self, header: impl Into<String>, value: impl Into<Value>) -> Self {
        self.row.push(header, value);
        self
    }

    pub fn build(self) -> RawRow {
        self.row
    }
}
