//! Portfolio Command Line Interface
//!
//! Runs the ingestion pipeline and the analytics engine against PostgreSQL.
//!
//! # Architecture
//!
//! - **Config**: layered configuration (`config` + `dotenvy`)
//! - **Commands**: [`PortfolioApp`] wiring the domain services to a store
//! - **Telemetry**: `tracing-subscriber` with env filter and optional JSON
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_cli::{AppConfig, PortfolioApp};
//!
//! let config = AppConfig::load(None)?;
//! let app = PortfolioApp::new(&config, store)?;
//! let report = app.ingest(tenant_id, &rows).await?;
//! ```

pub mod config;
pub mod error;
pub mod commands;
pub mod telemetry;

pub use config::{AppConfig, DatabaseSettings, LogSettings};
pub use error::CliError;
pub use commands::{read_upload, PortfolioApp};
pub use telemetry::init_tracing;
