//! Claims repository implementation
//!
//! Claims reference policies by number only; there is no foreign key, so a
//! claim can be recorded before its policy is uploaded.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection, PgPool};
use std::str::FromStr;
use uuid::Uuid;

use core_kernel::{ClaimRecordId, TenantId};
use domain_portfolio::{ClaimRecord, ClaimStatus};

use crate::error::DatabaseError;

/// Repository for the `claims` table
#[derive(Debug, Clone)]
pub struct ClaimsRepository {
    pool: PgPool,
}

impl ClaimsRepository {
    /// Creates a new ClaimsRepository with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a claim
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::DuplicateEntry` if the claim id already exists
    /// and `DatabaseError::ConstraintViolation` for negative amounts.
    pub async fn insert(&self, claim: &ClaimRecord) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO claims (claim_id, tenant_id, policy_number, paid_amount, reserve_amount, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(*claim.id.as_uuid())
        .bind(*claim.tenant_id.as_uuid())
        .bind(&claim.policy_number)
        .bind(claim.paid_amount)
        .bind(claim.reserve_amount)
        .bind(claim.status.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Claims of a tenant in policy-number order, on the given connection
    pub async fn find_by_tenant(conn: &mut PgConnection, tenant_id: TenantId) -> Result<Vec<ClaimRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, ClaimRow>(
            r#"
            SELECT claim_id, tenant_id, policy_number, paid_amount, reserve_amount, status, created_at
            FROM claims
            WHERE tenant_id = $1
            ORDER BY policy_number, created_at, claim_id
            "#,
        )
        .bind(*tenant_id.as_uuid())
        .fetch_all(conn)
        .await?;

        Ok(rows)
    }
}

/// Database row representation of a claim
#[derive(Debug, Clone, FromRow)]
pub struct ClaimRow {
    pub claim_id: Uuid,
    pub tenant_id: Uuid,
    pub policy_number: String,
    pub paid_amount: Decimal,
    pub reserve_amount: Decimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<ClaimRow> for ClaimRecord {
    type Error = DatabaseError;

    fn try_from(row: ClaimRow) -> Result<Self, Self::Error> {
        let status =
            ClaimStatus::from_str(&row.status).map_err(|e| DatabaseError::SerializationError(e.to_string()))?;

        Ok(ClaimRecord {
            id: ClaimRecordId::from_uuid(row.claim_id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            policy_number: row.policy_number,
            paid_amount: row.paid_amount,
            reserve_amount: row.reserve_amount,
            status,
        })
    }
}
