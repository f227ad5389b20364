//! Ingestion service: validate an upload, then commit what survived

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use core_kernel::{BatchId, CoreError, TenantId};

use crate::config::PipelineConfig;
use crate::error::IngestError;
use crate::normalizer::SchemaNormalizer;
use crate::ports::PortfolioStore;
use crate::record::RawRow;
use crate::upsert::UpsertCoordinator;
use crate::validator::{BatchSummary, BatchValidator, RejectedRow};

/// Final state of an upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BatchOutcome {
    /// Every row was accepted and committed
    Committed,
    /// Accepted rows were committed; some rows were rejected
    PartiallyRejected,
    /// Storage failed; nothing from the upload was committed
    Aborted,
}

/// Response returned to the caller of an upload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadReport {
    pub batch_id: BatchId,
    pub tenant_id: TenantId,
    pub outcome: BatchOutcome,
    pub summary: BatchSummary,
    pub rejected: Vec<RejectedRow>,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl UploadReport {
    /// Number of distinct records sent to storage
    pub fn accepted(&self) -> usize {
        self.summary.accepted
    }
}

/// Runs uploads through validation and the upsert coordinator
#[derive(Clone)]
pub struct IngestionService {
    validator: BatchValidator,
    coordinator: UpsertCoordinator,
}

impl IngestionService {
    /// Creates the service
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Configuration` if the pipeline configuration is invalid.
    pub fn new(config: PipelineConfig, store: Arc<dyn PortfolioStore>) -> Result<Self, CoreError> {
        let merge_policy = config.merge_policy;
        let normalizer = SchemaNormalizer::new(config)?;
        Ok(Self {
            validator: BatchValidator::new(normalizer),
            coordinator: UpsertCoordinator::new(store, merge_policy),
        })
    }

    pub fn validator(&self) -> &BatchValidator {
        &self.validator
    }

    /// Ingests one upload for a tenant
    ///
    /// Row defects are reported in the returned report and never fail the
    /// call. An upload where every row is rejected still succeeds with
    /// `PartiallyRejected` and zero writes.
    ///
    /// # Errors
    ///
    /// Returns `IngestError::CommitAborted` when storage fails; the error
    /// carries the row defects found during validation.
    #[instrument(skip(self, rows), fields(row_count = rows.len()))]
    pub async fn ingest(&self, tenant_id: TenantId, rows: &[RawRow]) -> Result<UploadReport, IngestError> {
        let batch_id = BatchId::new_v7();
        let validated = self.validator.validate(rows, tenant_id);

        let committed = match self.coordinator.commit(&validated.accepted, tenant_id).await {
            Ok(committed) => committed,
            Err(IngestError::Storage { source, .. }) => {
                warn!(batch_id = %batch_id, error = %source, "Upload aborted");
                return Err(IngestError::CommitAborted {
                    batch_id,
                    tenant_id,
                    rejected: validated.rejected,
                    source,
                });
            }
            Err(other) => return Err(other),
        };

        let outcome = if validated.rejected.is_empty() {
            BatchOutcome::Committed
        } else {
            BatchOutcome::PartiallyRejected
        };
        info!(batch_id = %batch_id, ?outcome, "Upload processed");

        Ok(UploadReport {
            batch_id,
            tenant_id,
            outcome,
            summary: validated.summary,
            rejected: validated.rejected,
            inserted: committed.inserted,
            updated: committed.updated,
            unchanged: committed.unchanged,
        })
    }
}
