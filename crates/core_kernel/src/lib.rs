//! Core Kernel - Foundational types shared by the portfolio crates
//!
//! This crate provides the building blocks used across the ingestion and
//! analytics modules:
//! - Strongly-typed identifiers for tenants, upload batches and claims
//! - Currencies and reporting-currency conversion with precise decimals
//! - Port infrastructure (errors, health checks) for storage and external collaborators

pub mod money;
pub mod identifiers;
pub mod error;
pub mod ports;

pub use money::{Currency, ExchangeRates, MoneyError};
pub use identifiers::{TenantId, BatchId, ClaimRecordId, QueryId};
pub use error::CoreError;
pub use ports::{
    PortError, DomainPort, HealthCheckable, HealthCheckResult, AdapterHealth,
};
