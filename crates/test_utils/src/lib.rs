//! Test Utilities Crate
//!
//! Shared test infrastructure, fixtures, and helpers for the portfolio
//! workspace.
//!
//! # Modules
//!
//! - `fixtures`: the reference portfolio, fixed tenants and sample uploads
//! - `builders`: builders for records, claims and raw rows
//! - `database`: PostgreSQL testcontainer with migrations applied
//! - `assertions`: assertion helpers for portfolio types
//! - `generators`: proptest strategies and `fake` names

pub mod fixtures;
pub mod builders;
pub mod database;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use database::*;
pub use assertions::*;
pub use generators::*;
