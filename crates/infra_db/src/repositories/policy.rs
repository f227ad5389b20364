//! Policy repository implementation
//!
//! One row per (tenant, policy number). Uploads merge into existing rows
//! with `INSERT ... ON CONFLICT DO UPDATE`; the update only fires when an
//! updatable column actually differs, so re-submitting an unchanged record
//! leaves the row (including `updated_at`) untouched.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection, PgPool};
use std::str::FromStr;
use uuid::Uuid;

use core_kernel::TenantId;
use domain_portfolio::{
    InsuranceType, LineOfBusiness, MergePolicy, PolicyRecord, PolicyStatus, StoredPolicy, UpsertOutcome,
};

use crate::error::DatabaseError;

const SELECT_COLUMNS: &str = r#"
    SELECT
        tenant_id,
        policy_number,
        insured_name,
        premium,
        effective_date,
        expiration_date,
        line_of_business,
        country,
        insurance_type,
        status,
        created_at,
        updated_at
    FROM policies
"#;

// An incoming expiration before the stored effective date keeps the stored
// expiration, matching `MergePolicy::RefreshTerms`.
const UPSERT_REFRESH_TERMS: &str = r#"
    INSERT INTO policies (
        tenant_id, policy_number, insured_name, premium, effective_date, expiration_date,
        line_of_business, country, insurance_type, status, created_at, updated_at
    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
    ON CONFLICT (tenant_id, policy_number) DO UPDATE SET
        premium = EXCLUDED.premium,
        expiration_date = CASE
            WHEN EXCLUDED.expiration_date < policies.effective_date THEN policies.expiration_date
            ELSE EXCLUDED.expiration_date
        END,
        status = EXCLUDED.status,
        updated_at = EXCLUDED.updated_at
    WHERE (policies.premium, policies.expiration_date, policies.status)
        IS DISTINCT FROM (
            EXCLUDED.premium,
            CASE
                WHEN EXCLUDED.expiration_date < policies.effective_date THEN policies.expiration_date
                ELSE EXCLUDED.expiration_date
            END,
            EXCLUDED.status
        )
    RETURNING (xmax = 0) AS inserted
"#;

const UPSERT_FULL_OVERWRITE: &str = r#"
    INSERT INTO policies (
        tenant_id, policy_number, insured_name, premium, effective_date, expiration_date,
        line_of_business, country, insurance_type, status, created_at, updated_at
    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
    ON CONFLICT (tenant_id, policy_number) DO UPDATE SET
        insured_name = EXCLUDED.insured_name,
        premium = EXCLUDED.premium,
        effective_date = EXCLUDED.effective_date,
        expiration_date = EXCLUDED.expiration_date,
        line_of_business = EXCLUDED.line_of_business,
        country = EXCLUDED.country,
        insurance_type = EXCLUDED.insurance_type,
        status = EXCLUDED.status,
        updated_at = EXCLUDED.updated_at
    WHERE (policies.insured_name, policies.premium, policies.effective_date, policies.expiration_date,
           policies.line_of_business, policies.country, policies.insurance_type, policies.status)
        IS DISTINCT FROM (EXCLUDED.insured_name, EXCLUDED.premium, EXCLUDED.effective_date,
           EXCLUDED.expiration_date, EXCLUDED.line_of_business, EXCLUDED.country,
           EXCLUDED.insurance_type, EXCLUDED.status)
    RETURNING (xmax = 0) AS inserted
"#;

/// Repository for the `policies` table
///
/// Write methods take a connection so the caller decides the transaction
/// boundary; reads that need no transaction use the pool.
///
/// # Example
///
/// ```rust,ignore
/// use infra_db::repositories::PolicyRepository;
///
/// let mut tx = pool.begin().await?;
/// PolicyRepository::upsert(&mut tx, &record, MergePolicy::RefreshTerms, Utc::now()).await?;
/// tx.commit().await?;
/// ```
#[derive(Debug, Clone)]
pub struct PolicyRepository {
    pool: PgPool,
}

impl PolicyRepository {
    /// Creates a new PolicyRepository with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts or merges a policy on the given connection
    ///
    /// No row comes back when the conflict update was skipped because
    /// nothing changed; that is reported as `Unchanged`.
    pub async fn upsert(
        conn: &mut PgConnection,
        record: &PolicyRecord,
        merge_policy: MergePolicy,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome, DatabaseError> {
        let sql = match merge_policy {
            MergePolicy::RefreshTerms => UPSERT_REFRESH_TERMS,
            MergePolicy::FullOverwrite => UPSERT_FULL_OVERWRITE,
        };

        let inserted: Option<bool> = sqlx::query_scalar(sql)
            .bind(*record.tenant_id.as_uuid())
            .bind(&record.policy_number)
            .bind(&record.insured_name)
            .bind(record.premium)
            .bind(record.effective_date)
            .bind(record.expiration_date)
            .bind(record.line_of_business.label())
            .bind(&record.country)
            .bind(record.insurance_type.as_str())
            .bind(record.status.as_str())
            .bind(now)
            .fetch_optional(conn)
            .await?;

        Ok(match inserted {
            Some(true) => UpsertOutcome::Inserted,
            Some(false) => UpsertOutcome::Updated,
            None => UpsertOutcome::Unchanged,
        })
    }

    /// Active policies of a tenant in policy-number order
    pub async fn find_active(conn: &mut PgConnection, tenant_id: TenantId) -> Result<Vec<PolicyRow>, DatabaseError> {
        let sql = format!(
            "{} WHERE tenant_id = $1 AND status = 'active' ORDER BY policy_number",
            SELECT_COLUMNS
        );
        let rows = sqlx::query_as::<_, PolicyRow>(&sql)
            .bind(*tenant_id.as_uuid())
            .fetch_all(conn)
            .await?;
        Ok(rows)
    }

    /// Every policy of a tenant, any status, in policy-number order
    pub async fn find_by_tenant(&self, tenant_id: TenantId) -> Result<Vec<PolicyRow>, DatabaseError> {
        let sql = format!("{} WHERE tenant_id = $1 ORDER BY policy_number", SELECT_COLUMNS);
        let rows = sqlx::query_as::<_, PolicyRow>(&sql)
            .bind(*tenant_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}

/// Database row representation of a policy
#[derive(Debug, Clone, FromRow)]
pub struct PolicyRow {
    pub tenant_id: Uuid,
    pub policy_number: String,
    pub insured_name: Option<String>,
    pub premium: Decimal,
    pub effective_date: Option<NaiveDate>,
    pub expiration_date: Option<NaiveDate>,
    pub line_of_business: String,
    pub country: String,
    pub insurance_type: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PolicyRow {
    /// Maps the row onto the domain record
    pub fn into_record(self) -> Result<PolicyRecord, DatabaseError> {
        let insurance_type = InsuranceType::from_str(&self.insurance_type)
            .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;
        let status =
            PolicyStatus::from_str(&self.status).map_err(|e| DatabaseError::SerializationError(e.to_string()))?;

        Ok(PolicyRecord {
            tenant_id: TenantId::from_uuid(self.tenant_id),
            policy_number: self.policy_number,
            insured_name: self.insured_name,
            premium: self.premium,
            effective_date: self.effective_date,
            expiration_date: self.expiration_date,
            line_of_business: LineOfBusiness::from_label(&self.line_of_business),
            country: self.country,
            insurance_type,
            status,
        })
    }

    /// Maps the row onto the stored policy, keeping its timestamps
    pub fn into_stored(self) -> Result<StoredPolicy, DatabaseError> {
        let (created_at, updated_at) = (self.created_at, self.updated_at);
        Ok(StoredPolicy {
            record: self.into_record()?,
            created_at,
            updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn row(insurance_type: &str, status: &str) -> PolicyRow {
        PolicyRow {
            tenant_id: Uuid::new_v4(),
            policy_number: "P-1".to_string(),
            insured_name: None,
            premium: dec!(100),
            effective_date: None,
            expiration_date: None,
            line_of_business: "Trade Credit".to_string(),
            country: "BH".to_string(),
            insurance_type: insurance_type.to_string(),
            status: status.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_row_maps_to_record() {
        let record = row("takaful", "expired").into_record().unwrap();
        assert_eq!(record.insurance_type, InsuranceType::Takaful);
        assert_eq!(record.status, PolicyStatus::Expired);
        assert_eq!(record.line_of_business, LineOfBusiness::Other("Trade Credit".to_string()));
    }

    #[test]
    fn test_unknown_stored_value_is_serialization_error() {
        let err = row("mutual", "active").into_record().unwrap_err();
        assert!(matches!(err, DatabaseError::SerializationError(_)));
    }

    #[test]
    fn test_refresh_terms_sql_touches_only_updatable_columns() {
        let update_clause = UPSERT_REFRESH_TERMS
            .split("DO UPDATE SET")
            .nth(1)
            .and_then(|rest| rest.split("WHERE").next())
            .unwrap();
        for column in MergePolicy::RefreshTerms.updatable_fields() {
            assert!(update_clause.contains(&format!("{} = EXCLUDED.{}", column, column)));
        }
        assert!(!update_clause.contains("country"));
        assert!(!update_clause.contains("insured_name"));
    }
}
