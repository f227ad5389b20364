//! Domain Adapters
//!
//! Adapter implementations for domain ports, connecting domain interfaces to
//! the PostgreSQL database layer.
//!
//! # Usage
//!
//! ```rust,ignore
//! use infra_db::adapters::PostgresPortfolioStore;
//! use domain_portfolio::PortfolioStore;
//!
//! let store: Arc<dyn PortfolioStore> = Arc::new(PostgresPortfolioStore::new(pool, 30_000));
//! let view = store.load_portfolio(tenant_id).await?;
//! ```

pub mod portfolio;
pub mod query_log;

pub use portfolio::PostgresPortfolioStore;
pub use query_log::PostgresQueryLog;
