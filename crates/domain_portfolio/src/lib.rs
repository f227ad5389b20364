//! Portfolio Ingestion Domain
//!
//! This crate turns insurer spreadsheet exports into canonical policy records
//! and merges them into durable storage, one tenant and one upload at a time.
//!
//! # Pipeline
//!
//! ```text
//! raw rows -> SchemaNormalizer -> BatchValidator -> UpsertCoordinator -> PortfolioStore
//!             (per row, pure)     (partition +      (one transaction
//!                                  dedupe)           per batch)
//! ```
//!
//! Row-level defects never escalate: a bad row is reported and excluded
//! before the storage transaction begins. Storage failures abort the whole
//! batch and nothing from it becomes visible.
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_portfolio::{IngestionService, PipelineConfig, RawRow};
//!
//! let service = IngestionService::new(PipelineConfig::default(), store)?;
//! let rows = vec![
//!     RawRow::new()
//!         .with("Policy Number", "P-100")
//!         .with("Premium", "12,000")
//!         .with("Country", "SA"),
//! ];
//! let report = service.ingest(tenant_id, &rows).await?;
//! assert_eq!(report.inserted, 1);
//! ```

pub mod record;
pub mod aliases;
pub mod config;
pub mod normalizer;
pub mod validator;
pub mod ports;
pub mod upsert;
pub mod ingest;
pub mod error;

pub use record::{
    RawRow, PolicyRecord, StoredPolicy, ClaimRecord,
    InsuranceType, PolicyStatus, ClaimStatus, LineOfBusiness,
};
pub use aliases::{AliasTable, CanonicalField};
pub use config::PipelineConfig;
pub use normalizer::SchemaNormalizer;
pub use validator::{BatchValidator, BatchResult, BatchSummary, RejectedRow, DuplicateResolution};
pub use ports::{PortfolioStore, PortfolioTransaction, PortfolioView, UpsertOutcome};
pub use upsert::{UpsertCoordinator, CommitResult, MergePolicy};
pub use ingest::{IngestionService, UploadReport, BatchOutcome};
pub use error::{NormalizationDefect, IngestError};
#[cfg(any(test, feature = "mock"))]
pub use ports::mock::InMemoryPortfolioStore;
