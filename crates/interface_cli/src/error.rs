//! CLI error handling

use std::path::PathBuf;
use thiserror::Error;

use core_kernel::{CoreError, PortError};
use domain_analytics::AnalyticsError;
use domain_portfolio::IngestError;
use infra_db::DatabaseError;

/// CLI error types
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Invalid configuration: {0}")]
    Configuration(#[from] CoreError),

    #[error("Failed to load configuration: {0}")]
    ConfigSource(#[from] config::ConfigError),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The upload file is not a JSON array of objects
    #[error("Invalid upload file {path}: {source}")]
    InvalidUpload {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Analytics(#[from] AnalyticsError),

    #[error("Storage error: {0}")]
    Storage(#[from] PortError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}
