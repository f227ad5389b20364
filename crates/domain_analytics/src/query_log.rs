//! Query Log Port
//!
//! Every answered assistant question is kept per tenant, together with the
//! response it got.
//!
//! # Adapters
//!
//! - **PostgreSQL**: `infra_db::PostgresQueryLog`
//! - **In-memory**: [`mock::InMemoryQueryLog`], behind the `mock` feature

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{DomainPort, PortError, QueryId, TenantId};

/// One answered question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryLogEntry {
    pub id: QueryId,
    pub tenant_id: TenantId,
    pub query: String,
    pub response: String,
    pub created_at: DateTime<Utc>,
}

impl QueryLogEntry {
    pub fn new(
        tenant_id: TenantId,
        query: impl Into<String>,
        response: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: QueryId::new_v7(),
            tenant_id,
            query: query.into(),
            response: response.into(),
            created_at,
        }
    }
}

/// The port trait for the query log
#[async_trait]
pub trait QueryLog: DomainPort {
    /// Appends an entry
    async fn record(&self, entry: &QueryLogEntry) -> Result<(), PortError>;

    /// Most recent entries of a tenant, newest first
    async fn recent(&self, tenant_id: TenantId, limit: usize) -> Result<Vec<QueryLogEntry>, PortError>;
}

/// In-memory query log for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use tokio::sync::Mutex;

    #[derive(Debug, Default)]
    pub struct InMemoryQueryLog {
        entries: Mutex<Vec<QueryLogEntry>>,
        failure: Mutex<Option<PortError>>,
    }

    impl InMemoryQueryLog {
        pub fn new() -> Self {
            Self::default()
        }

        /// Makes the next `record` call fail with `error`
        pub async fn fail_next(&self, error: PortError) {
            *self.failure.lock().await = Some(error);
        }

        pub async fn len(&self) -> usize {
            self.entries.lock().await.len()
        }
    }

    impl DomainPort for InMemoryQueryLog {}

    #[async_trait]
    impl QueryLog for InMemoryQueryLog {
        async fn record(&self, entry: &QueryLogEntry) -> Result<(), PortError> {
            if let Some(error) = self.failure.lock().await.take() {
                return Err(error);
            }
            self.entries.lock().await.push(entry.clone());
            Ok(())
        }

        async fn recent(&self, tenant_id: TenantId, limit: usize) -> Result<Vec<QueryLogEntry>, PortError> {
            let entries = self.entries.lock().await;
            Ok(entries
                .iter()
                .rev()
                .filter(|entry| entry.tenant_id == tenant_id)
                .take(limit)
                .cloned()
                .collect())
        }
    }
}
