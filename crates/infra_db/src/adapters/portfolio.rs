//! PostgreSQL Portfolio Store
//!
//! Implements the `PortfolioStore` port from `domain_portfolio` on top of
//! [`PolicyRepository`] and [`ClaimsRepository`].
//!
//! # Overview
//!
//! - `begin` opens a database transaction and takes a transaction-scoped
//!   advisory lock keyed by tenant, so uploads for one tenant queue behind
//!   each other while other tenants proceed
//! - `load_portfolio` reads policies and claims inside one
//!   `REPEATABLE READ, READ ONLY` transaction
//! - Errors are translated to `PortError`; statement timeouts surface as
//!   `PortError::Timeout` with the configured limit
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::adapters::PostgresPortfolioStore;
//! use domain_portfolio::{PortfolioStore, UpsertCoordinator, MergePolicy};
//! use std::sync::Arc;
//!
//! let store: Arc<dyn PortfolioStore> = Arc::new(PostgresPortfolioStore::new(pool, 30_000));
//! let coordinator = UpsertCoordinator::new(store, MergePolicy::RefreshTerms);
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, instrument};

use core_kernel::{AdapterHealth, DomainPort, HealthCheckResult, HealthCheckable, PortError, TenantId};
use domain_portfolio::{
    ClaimRecord, MergePolicy, PolicyRecord, PortfolioStore, PortfolioTransaction, PortfolioView, StoredPolicy,
    UpsertOutcome,
};

use crate::error::DatabaseError;
use crate::repositories::{ClaimsRepository, PolicyRepository};

const ADAPTER_ID: &str = "postgres-portfolio-store";

/// PostgreSQL-backed implementation of the PortfolioStore trait
///
/// # Error Handling
///
/// Database errors are translated to `PortError` variants:
/// - statement timeout or pool exhaustion -> `PortError::Timeout`
/// - connection failures -> `PortError::Connection`
/// - check constraint violations -> `PortError::Validation`
/// - other errors -> `PortError::Internal`
#[derive(Debug, Clone)]
pub struct PostgresPortfolioStore {
    pool: PgPool,
    policies: PolicyRepository,
    claims: ClaimsRepository,
    statement_timeout_ms: u64,
}

impl PostgresPortfolioStore {
    /// Creates a new store
    ///
    /// `statement_timeout_ms` should match the timeout the pool was created
    /// with; it is reported in `PortError::Timeout`.
    pub fn new(pool: PgPool, statement_timeout_ms: u64) -> Self {
        Self {
            policies: PolicyRepository::new(pool.clone()),
            claims: ClaimsRepository::new(pool.clone()),
            pool,
            statement_timeout_ms,
        }
    }

    /// Returns the underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn port_error(&self, operation: &'static str) -> impl Fn(DatabaseError) -> PortError {
        let timeout_ms = self.statement_timeout_ms;
        move |e| e.into_port_error(operation, timeout_ms)
    }
}

/// Advisory lock key for a tenant
fn tenant_lock_key(tenant_id: TenantId) -> i64 {
    let (high, low) = tenant_id.as_uuid().as_u64_pair();
    (high ^ low) as i64
}

/// Open write transaction for one tenant
struct PostgresTransaction {
    tx: Option<Transaction<'static, Postgres>>,
    tenant_id: TenantId,
    timeout_ms: u64,
}

impl PostgresTransaction {
    fn finished() -> PortError {
        PortError::internal("transaction already finished")
    }

    fn port_error(&self, operation: &'static str) -> impl Fn(DatabaseError) -> PortError {
        let timeout_ms = self.timeout_ms;
        move |e| e.into_port_error(operation, timeout_ms)
    }
}

#[async_trait]
impl PortfolioTransaction for PostgresTransaction {
    async fn upsert(
        &mut self,
        record: &PolicyRecord,
        merge_policy: MergePolicy,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome, PortError> {
        if record.tenant_id != self.tenant_id {
            return Err(PortError::validation(format!(
                "policy {} belongs to another tenant",
                record.policy_number
            )));
        }
        let to_port = self.port_error("upsert_policy");
        let tx = self.tx.as_mut().ok_or_else(Self::finished)?;

        let outcome = PolicyRepository::upsert(&mut **tx, record, merge_policy, now)
            .await
            .map_err(to_port)?;
        debug!(policy_number = %record.policy_number, ?outcome, "Policy upserted");
        Ok(outcome)
    }

    async fn commit(&mut self) -> Result<(), PortError> {
        let tx = self.tx.take().ok_or_else(Self::finished)?;
        tx.commit()
            .await
            .map_err(|e| DatabaseError::from(e).into_port_error("commit", self.timeout_ms))
    }

    async fn rollback(&mut self) -> Result<(), PortError> {
        let tx = self.tx.take().ok_or_else(Self::finished)?;
        tx.rollback()
            .await
            .map_err(|e| DatabaseError::from(e).into_port_error("rollback", self.timeout_ms))
    }
}

impl DomainPort for PostgresPortfolioStore {}

#[async_trait]
impl HealthCheckable for PostgresPortfolioStore {
    /// Performs a `SELECT 1` to verify the pool is operational
    async fn health_check(&self) -> HealthCheckResult {
        let start = std::time::Instant::now();

        let result = sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await;

        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(_) => HealthCheckResult {
                adapter_id: ADAPTER_ID.to_string(),
                status: AdapterHealth::Healthy,
                latency_ms,
                message: None,
                checked_at: Utc::now(),
            },
            Err(e) => HealthCheckResult {
                adapter_id: ADAPTER_ID.to_string(),
                status: AdapterHealth::Unhealthy,
                latency_ms,
                message: Some(format!("Database error: {}", e)),
                checked_at: Utc::now(),
            },
        }
    }
}

#[async_trait]
impl PortfolioStore for PostgresPortfolioStore {
    #[instrument(skip(self))]
    async fn begin(&self, tenant_id: TenantId) -> Result<Box<dyn PortfolioTransaction>, PortError> {
        let to_port = self.port_error("begin");
        let mut tx = self.pool.begin().await.map_err(|e| to_port(e.into()))?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(tenant_lock_key(tenant_id))
            .execute(&mut *tx)
            .await
            .map_err(|e| to_port(e.into()))?;
        debug!("Tenant write lock acquired");

        Ok(Box::new(PostgresTransaction {
            tx: Some(tx),
            tenant_id,
            timeout_ms: self.statement_timeout_ms,
        }))
    }

    #[instrument(skip(self))]
    async fn load_portfolio(&self, tenant_id: TenantId) -> Result<PortfolioView, PortError> {
        let to_port = self.port_error("load_portfolio");
        let mut tx = self.pool.begin().await.map_err(|e| to_port(e.into()))?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(|e| to_port(e.into()))?;

        let policy_rows = PolicyRepository::find_active(&mut tx, tenant_id)
            .await
            .map_err(&to_port)?;
        let claim_rows = ClaimsRepository::find_by_tenant(&mut tx, tenant_id)
            .await
            .map_err(&to_port)?;
        tx.commit().await.map_err(|e| to_port(e.into()))?;

        let policies = policy_rows
            .into_iter()
            .map(|row| row.into_record())
            .collect::<Result<Vec<_>, _>>()
            .map_err(&to_port)?;
        let claims = claim_rows
            .into_iter()
            .map(ClaimRecord::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map_err(&to_port)?;

        debug!(policies = policies.len(), claims = claims.len(), "Portfolio loaded");
        Ok(PortfolioView { policies, claims })
    }

    #[instrument(skip(self))]
    async fn stored_policies(&self, tenant_id: TenantId) -> Result<Vec<StoredPolicy>, PortError> {
        let to_port = self.port_error("stored_policies");
        self.policies
            .find_by_tenant(tenant_id)
            .await
            .map_err(&to_port)?
            .into_iter()
            .map(|row| row.into_stored())
            .collect::<Result<Vec<_>, _>>()
            .map_err(&to_port)
    }

    #[instrument(skip(self, claim), fields(tenant_id = %claim.tenant_id, policy_number = %claim.policy_number))]
    async fn insert_claim(&self, claim: ClaimRecord) -> Result<(), PortError> {
        claim
            .validate()
            .map_err(|e| PortError::validation(e.to_string()))?;
        self.claims
            .insert(&claim)
            .await
            .map_err(self.port_error("insert_claim"))
    }
}
