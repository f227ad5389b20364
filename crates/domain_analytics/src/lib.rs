//! Portfolio Analytics Domain
//!
//! Derives risk metrics from a tenant's stored portfolio and renders them as
//! a bounded text block for the question-answering collaborator.
//!
//! # Components
//!
//! - [`AggregationEngine`]: loss ratio, combined ratio and Takaful share,
//!   overall and sliced by country and line of business
//! - [`ContextBuilder`]: deterministic, size-bounded text rendering of a snapshot
//! - [`PortfolioAssistant`]: answers free-text questions through a
//!   [`CompletionService`] port and records each answer in a [`QueryLog`]
//!
//! All monetary values are in the reporting currency the portfolio was
//! normalized into at ingestion.

pub mod snapshot;
pub mod aggregation;
pub mod context;
pub mod assistant;
pub mod query_log;
pub mod error;

pub use snapshot::{AggregateSnapshot, DimensionAggregate};
pub use aggregation::{aggregate, AggregationEngine, AnalyticsConfig};
pub use context::ContextBuilder;
pub use assistant::{AssistantAnswer, CompletionService, PortfolioAssistant};
pub use query_log::{QueryLog, QueryLogEntry};
pub use error::AnalyticsError;
#[cfg(any(test, feature = "mock"))]
pub use assistant::mock::ScriptedCompletionService;
#[cfg(any(test, feature = "mock"))]
pub use query_log::mock::InMemoryQueryLog;
