//! Repository implementations for the portfolio and query log tables
//!
//! Repositories encapsulate SQL queries and map between database rows and
//! domain types. Write paths take a `PgConnection` so the caller owns the
//! transaction boundary.
//!
//! Queries are checked at runtime (`sqlx::query_as` with `FromRow`) so the
//! crate builds without a live database.

pub mod policy;
pub mod claims;
pub mod query_log;

pub use policy::{PolicyRepository, PolicyRow};
pub use claims::{ClaimsRepository, ClaimRow};
pub use query_log::{QueryLogRepository, QueryLogRow};
