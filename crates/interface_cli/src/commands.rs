//! Command implementations
//!
//! [`PortfolioApp`] wires the domain services to one `PortfolioStore`. The
//! binary builds it over PostgreSQL; tests build it over the in-memory store.

use std::path::Path;
use std::sync::Arc;
use tracing::info;

use core_kernel::{HealthCheckResult, TenantId};
use domain_analytics::{AggregateSnapshot, AggregationEngine, ContextBuilder};
use domain_portfolio::{ClaimRecord, IngestionService, PortfolioStore, RawRow, StoredPolicy, UploadReport};

use crate::config::AppConfig;
use crate::error::CliError;

/// Domain services sharing one store
#[derive(Clone)]
pub struct PortfolioApp {
    store: Arc<dyn PortfolioStore>,
    ingestion: IngestionService,
    engine: AggregationEngine,
    context: ContextBuilder,
}

impl PortfolioApp {
    /// Builds the services from configuration
    ///
    /// # Errors
    ///
    /// Returns `CliError::Configuration` if a section is invalid.
    pub fn new(config: &AppConfig, store: Arc<dyn PortfolioStore>) -> Result<Self, CliError> {
        config.validate()?;
        Ok(Self {
            ingestion: IngestionService::new(config.pipeline.clone(), Arc::clone(&store))?,
            engine: AggregationEngine::new(Arc::clone(&store), config.analytics.clone())?,
            context: ContextBuilder::from_config(&config.analytics)?,
            store,
        })
    }

    /// Validates and commits one upload
    pub async fn ingest(&self, tenant_id: TenantId, rows: &[RawRow]) -> Result<UploadReport, CliError> {
        Ok(self.ingestion.ingest(tenant_id, rows).await?)
    }

    pub async fn snapshot(&self, tenant_id: TenantId) -> Result<AggregateSnapshot, CliError> {
        Ok(self.engine.compute_snapshot(tenant_id).await?)
    }

    /// Renders the bounded text context for the tenant
    pub async fn context(&self, tenant_id: TenantId) -> Result<String, CliError> {
        let snapshot = self.snapshot(tenant_id).await?;
        Ok(self.context.render(&snapshot))
    }

    /// Records a claim against a policy number
    pub async fn record_claim(&self, claim: ClaimRecord) -> Result<(), CliError> {
        let (tenant_id, policy_number) = (claim.tenant_id, claim.policy_number.clone());
        self.store.insert_claim(claim).await?;
        info!(%tenant_id, %policy_number, "Claim recorded");
        Ok(())
    }

    /// Stored policies of the tenant, any status
    pub async fn policies(&self, tenant_id: TenantId) -> Result<Vec<StoredPolicy>, CliError> {
        Ok(self.store.stored_policies(tenant_id).await?)
    }

    pub async fn health(&self) -> HealthCheckResult {
        self.store.health_check().await
    }
}

/// Reads an upload file: a JSON array of objects, one per spreadsheet row
pub fn read_upload(path: &Path) -> Result<Vec<RawRow>, CliError> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| CliError::InvalidUpload {
        path: path.to_path_buf(),
        source,
    })
}
