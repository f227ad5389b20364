//! Portfolio domain errors
//!
//! Two tiers: [`NormalizationDefect`] rejects a single row and never stops
//! the batch; [`IngestError`] is a whole-batch failure raised by storage.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use core_kernel::{BatchId, PortError, TenantId};

use crate::ingest::BatchOutcome;
use crate::validator::RejectedRow;

/// Why a single row could not be normalized
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum NormalizationDefect {
    /// No policy number column, or the cell is blank
    #[error("Missing policy number")]
    MissingPolicyNumber,

    /// Premium parsed to a value below zero
    #[error("Negative premium: {value}")]
    NegativePremium { value: Decimal },

    /// Premium does not fit the decimal range once converted
    #[error("Premium out of range: {value}")]
    PremiumOutOfRange { value: Decimal },

    /// Currency code not recognized or without a configured rate
    #[error("Unsupported currency: {currency}")]
    UnsupportedCurrency { currency: String },

    /// Both dates parsed and the policy would end before it starts
    #[error("Expiration date {expiration} is before effective date {effective}")]
    ExpirationBeforeEffective {
        effective: NaiveDate,
        expiration: NaiveDate,
    },

    /// Country is neither a known name nor a 2-3 letter code
    #[error("Invalid country: {value}")]
    InvalidCountry { value: String },

    #[error("Unknown insurance type: {value}")]
    UnknownInsuranceType { value: String },

    #[error("Unknown policy status: {value}")]
    UnknownStatus { value: String },

    /// Strict duplicate mode only: a later row carries the same policy number
    #[error("Policy {policy_number} is superseded by row {kept_row}")]
    SupersededDuplicate {
        policy_number: String,
        kept_row: usize,
    },
}

impl NormalizationDefect {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            NormalizationDefect::MissingPolicyNumber => "missing_policy_number",
            NormalizationDefect::NegativePremium { .. } => "negative_premium",
            NormalizationDefect::PremiumOutOfRange { .. } => "premium_out_of_range",
            NormalizationDefect::UnsupportedCurrency { .. } => "unsupported_currency",
            NormalizationDefect::ExpirationBeforeEffective { .. } => "expiration_before_effective",
            NormalizationDefect::InvalidCountry { .. } => "invalid_country",
            NormalizationDefect::UnknownInsuranceType { .. } => "unknown_insurance_type",
            NormalizationDefect::UnknownStatus { .. } => "unknown_status",
            NormalizationDefect::SupersededDuplicate { .. } => "superseded_duplicate",
        }
    }
}

/// Batch-level ingestion failures
#[derive(Debug, Error)]
pub enum IngestError {
    /// The store failed while applying the batch; nothing was committed
    #[error("Storage failure for tenant {tenant_id}: {source}")]
    Storage {
        tenant_id: TenantId,
        #[source]
        source: PortError,
    },

    /// An upload was aborted by a storage failure; carries the row defects
    /// found before the transaction began
    #[error("Batch {batch_id} aborted, no rows were committed: {source}")]
    CommitAborted {
        batch_id: BatchId,
        tenant_id: TenantId,
        rejected: Vec<RejectedRow>,
        #[source]
        source: PortError,
    },

    /// A record addressed to another tenant reached the coordinator
    #[error("Policy {policy_number} belongs to tenant {found}, not {expected}")]
    TenantMismatch {
        expected: TenantId,
        found: TenantId,
        policy_number: String,
    },
}

impl IngestError {
    /// Returns true if resubmitting the whole batch may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            IngestError::Storage { source, .. } | IngestError::CommitAborted { source, .. } => {
                source.is_transient()
            }
            IngestError::TenantMismatch { .. } => false,
        }
    }

    /// Outcome reported to the caller for this failure
    pub fn outcome(&self) -> BatchOutcome {
        BatchOutcome::Aborted
    }
}
