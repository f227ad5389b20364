//! Infrastructure Database Layer
//!
//! PostgreSQL storage for the portfolio pipeline using SQLx.
//!
//! # Architecture
//!
//! The crate follows the repository pattern. Repositories hold the SQL;
//! [`PostgresPortfolioStore`] implements the `domain_portfolio` storage port
//! on top of them and translates database errors into `PortError`s.
//! [`PostgresQueryLog`] does the same for the `domain_analytics` query log.
//!
//! # Guarantees
//!
//! - One upload is one database transaction; a failure rolls all of it back
//! - Uploads for the same tenant are serialized with a transaction-scoped
//!   advisory lock; different tenants proceed in parallel
//! - Snapshot reads run in a `REPEATABLE READ, READ ONLY` transaction so they
//!   never observe part of an upload
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresPortfolioStore};
//!
//! let config = DatabaseConfig::new("postgres://localhost/portfolio");
//! let pool = create_pool(&config).await?;
//! run_migrations(&pool).await?;
//! let store = PostgresPortfolioStore::new(pool, config.statement_timeout_ms());
//! ```

pub mod pool;
pub mod error;
pub mod repositories;
pub mod adapters;

pub use pool::{DatabasePool, DatabaseConfig, create_pool, run_migrations};
pub use error::DatabaseError;
pub use adapters::{PostgresPortfolioStore, PostgresQueryLog};
