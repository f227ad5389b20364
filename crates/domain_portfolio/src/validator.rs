//! Batch Validator
//!
//! Runs the normalizer over every row of an upload, partitions the results
//! into accepted records and rejected rows, and resolves repeated policy
//! numbers inside the upload. A defect on one row never affects another.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use core_kernel::TenantId;

use crate::error::NormalizationDefect;
use crate::normalizer::SchemaNormalizer;
use crate::record::{PolicyRecord, RawRow};

/// How repeated policy numbers within one upload are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateResolution {
    /// The last occurrence in file order wins; earlier ones are dropped
    #[default]
    LastWins,
    /// Earlier occurrences are reported as `SupersededDuplicate` defects
    Reject,
}

/// A row excluded from the upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRow {
    /// Zero-based position of the row in the upload
    pub row_index: usize,
    pub defect: NormalizationDefect,
}

/// Counts for one validated upload
///
/// `accepted + rejected + superseded == row_count` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    pub row_count: usize,
    pub accepted: usize,
    pub rejected: usize,
    /// Rows silently replaced by a later row with the same policy number
    pub superseded: usize,
}

/// Result of validating an upload
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    /// Records in the file order of their winning row; policy numbers are unique
    pub accepted: Vec<PolicyRecord>,
    /// Rejected rows in file order
    pub rejected: Vec<RejectedRow>,
    pub summary: BatchSummary,
}

impl BatchResult {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Validates whole uploads
#[derive(Debug, Clone)]
pub struct BatchValidator {
    normalizer: SchemaNormalizer,
    duplicates: DuplicateResolution,
}

impl BatchValidator {
    /// Creates a validator using the normalizer's configured duplicate policy
    pub fn new(normalizer: SchemaNormalizer) -> Self {
        let duplicates = normalizer.config().duplicate_resolution;
        Self {
            normalizer,
            duplicates,
        }
    }

    pub fn normalizer(&self) -> &SchemaNormalizer {
        &self.normalizer
    }

    /// Normalizes every row and partitions the results
    pub fn validate(&self, rows: &[RawRow], tenant_id: TenantId) -> BatchResult {
        let mut winners: HashMap<String, (usize, PolicyRecord)> = HashMap::new();
        let mut rejected = Vec::new();
        let mut superseded = 0usize;

        for (row_index, row) in rows.iter().enumerate() {
            let record = match self.normalizer.normalize(row, tenant_id) {
                Ok(record) => record,
                Err(defect) => {
                    debug!(row_index, code = defect.code(), %defect, "Row rejected");
                    rejected.push(RejectedRow { row_index, defect });
                    continue;
                }
            };

            let policy_number = record.policy_number.clone();
            if let Some((earlier_index, _)) = winners.insert(policy_number.clone(), (row_index, record)) {
                match self.duplicates {
                    DuplicateResolution::LastWins => {
                        debug!(
                            row_index = earlier_index,
                            kept_row = row_index,
                            policy_number = %policy_number,
                            "Row superseded by later duplicate"
                        );
                        superseded += 1;
                    }
                    DuplicateResolution::Reject => {
                        let defect = NormalizationDefect::SupersededDuplicate {
                            policy_number,
                            kept_row: row_index,
                        };
                        debug!(row_index = earlier_index, code = defect.code(), %defect, "Row rejected");
                        rejected.push(RejectedRow {
                            row_index: earlier_index,
                            defect,
                        });
                    }
                }
            }
        }

        let mut ordered: Vec<(usize, PolicyRecord)> = winners.into_values().collect();
        ordered.sort_by_key(|(row_index, _)| *row_index);
        let accepted: Vec<PolicyRecord> = ordered.into_iter().map(|(_, record)| record).collect();
        rejected.sort_by_key(|rejected| rejected.row_index);

        let summary = BatchSummary {
            row_count: rows.len(),
            accepted: accepted.len(),
            rejected: rejected.len(),
            superseded,
        };
        info!(
            tenant_id = %tenant_id,
            row_count = summary.row_count,
            accepted = summary.accepted,
            rejected = summary.rejected,
            superseded = summary.superseded,
            "Batch validated"
        );

        BatchResult {
            accepted,
            rejected,
            summary,
        }
    }
}
