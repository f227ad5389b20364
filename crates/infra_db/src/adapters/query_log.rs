//! PostgreSQL Query Log
//!
//! Implements the `QueryLog` port from `domain_analytics` on top of
//! [`QueryLogRepository`].

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tracing::{debug, instrument};

use core_kernel::{AdapterHealth, DomainPort, HealthCheckResult, HealthCheckable, PortError, TenantId};
use domain_analytics::{QueryLog, QueryLogEntry};

use crate::error::DatabaseError;
use crate::repositories::QueryLogRepository;

const ADAPTER_ID: &str = "postgres-query-log";

/// PostgreSQL-backed implementation of the QueryLog trait
#[derive(Debug, Clone)]
pub struct PostgresQueryLog {
    pool: PgPool,
    repository: QueryLogRepository,
    statement_timeout_ms: u64,
}

impl PostgresQueryLog {
    pub fn new(pool: PgPool, statement_timeout_ms: u64) -> Self {
        Self {
            repository: QueryLogRepository::new(pool.clone()),
            pool,
            statement_timeout_ms,
        }
    }

    fn port_error(&self, operation: &'static str) -> impl Fn(DatabaseError) -> PortError {
        let timeout_ms = self.statement_timeout_ms;
        move |e| e.into_port_error(operation, timeout_ms)
    }
}

impl DomainPort for PostgresQueryLog {}

#[async_trait]
impl HealthCheckable for PostgresQueryLog {
    async fn health_check(&self) -> HealthCheckResult {
        let start = std::time::Instant::now();
        let result = sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await;
        let latency_ms = start.elapsed().as_millis() as u64;

        let (status, message) = match result {
            Ok(_) => (AdapterHealth::Healthy, None),
            Err(e) => (AdapterHealth::Unhealthy, Some(format!("Database error: {}", e))),
        };
        HealthCheckResult {
            adapter_id: ADAPTER_ID.to_string(),
            status,
            latency_ms,
            message,
            checked_at: Utc::now(),
        }
    }
}

#[async_trait]
impl QueryLog for PostgresQueryLog {
    #[instrument(skip(self, entry), fields(query_id = %entry.id, tenant_id = %entry.tenant_id))]
    async fn record(&self, entry: &QueryLogEntry) -> Result<(), PortError> {
        self.repository
            .insert(entry)
            .await
            .map_err(self.port_error("record_query"))?;
        debug!("Query logged");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn recent(&self, tenant_id: TenantId, limit: usize) -> Result<Vec<QueryLogEntry>, PortError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = self
            .repository
            .recent(tenant_id, limit)
            .await
            .map_err(self.port_error("recent_queries"))?;
        Ok(rows.into_iter().map(QueryLogEntry::from).collect())
    }
}
