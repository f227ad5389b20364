//! Query log repository implementation

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use core_kernel::{QueryId, TenantId};
use domain_analytics::QueryLogEntry;

use crate::error::DatabaseError;

/// Repository for the append-only `query_log` table
#[derive(Debug, Clone)]
pub struct QueryLogRepository {
    pool: PgPool,
}

impl QueryLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Appends an entry
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::DuplicateEntry` if the query id already exists.
    pub async fn insert(&self, entry: &QueryLogEntry) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO query_log (query_id, tenant_id, query, response, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(*entry.id.as_uuid())
        .bind(*entry.tenant_id.as_uuid())
        .bind(&entry.query)
        .bind(&entry.response)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Newest entries of a tenant first
    pub async fn recent(&self, tenant_id: TenantId, limit: i64) -> Result<Vec<QueryLogRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, QueryLogRow>(
            r#"
            SELECT query_id, tenant_id, query, response, created_at
            FROM query_log
            WHERE tenant_id = $1
            ORDER BY created_at DESC, query_id DESC
            LIMIT $2
            "#,
        )
        .bind(*tenant_id.as_uuid())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

/// Database row representation of a logged query
#[derive(Debug, Clone, FromRow)]
pub struct QueryLogRow {
    pub query_id: Uuid,
    pub tenant_id: Uuid,
    pub query: String,
    pub response: String,
    pub created_at: DateTime<Utc>,
}

impl From<QueryLogRow> for QueryLogEntry {
    fn from(row: QueryLogRow) -> Self {
        QueryLogEntry {
            id: QueryId::from_uuid(row.query_id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            query: row.query,
            response: row.response,
            created_at: row.created_at,
        }
    }
}
