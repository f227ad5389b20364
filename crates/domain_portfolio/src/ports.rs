//! Portfolio Store Port
//!
//! Storage contract for the ingestion pipeline and the analytics engine.
//! The store owns the (tenant, policy number) uniqueness constraint and the
//! transaction boundary; the domain only decides what each row becomes.
//!
//! # Adapters
//!
//! - **PostgreSQL**: `infra_db::PostgresPortfolioStore`
//! - **In-memory**: [`mock::InMemoryPortfolioStore`], behind the `mock` feature
//!
//! # Usage
//!
//! ```rust,ignore
//! let mut tx = store.begin(tenant_id).await?;
//! for record in &batch {
//!     tx.upsert(record, MergePolicy::RefreshTerms, now).await?;
//! }
//! tx.commit().await?;
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{DomainPort, HealthCheckable, PortError, TenantId};

use crate::record::{ClaimRecord, PolicyRecord, StoredPolicy};
use crate::upsert::MergePolicy;

/// What a single upsert did to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    /// No record existed for the policy number
    Inserted,
    /// An existing record had at least one updatable field changed
    Updated,
    /// The incoming record matched the stored one; nothing was written
    Unchanged,
}

/// A consistent read of one tenant's portfolio
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PortfolioView {
    /// Active policies in policy-number order
    pub policies: Vec<PolicyRecord>,
    /// All claims of the tenant in policy-number order
    pub claims: Vec<ClaimRecord>,
}

/// An open write transaction scoped to one tenant
///
/// Nothing written through the transaction is visible to readers until
/// [`commit`](PortfolioTransaction::commit) succeeds. Dropping an unfinished
/// transaction discards its writes.
#[async_trait]
pub trait PortfolioTransaction: Send {
    /// Inserts the record or merges it into the stored one
    async fn upsert(
        &mut self,
        record: &PolicyRecord,
        merge_policy: MergePolicy,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome, PortError>;

    /// Makes every write of the transaction visible at once
    async fn commit(&mut self) -> Result<(), PortError>;

    /// Discards every write of the transaction
    async fn rollback(&mut self) -> Result<(), PortError>;
}

/// The port trait for portfolio storage
#[async_trait]
pub trait PortfolioStore: DomainPort + HealthCheckable {
    /// Opens a write transaction for the tenant
    ///
    /// Concurrent transactions for the same tenant are serialized by the
    /// store; transactions for different tenants do not wait on each other.
    async fn begin(&self, tenant_id: TenantId) -> Result<Box<dyn PortfolioTransaction>, PortError>;

    /// Reads active policies and claims in one consistent snapshot
    async fn load_portfolio(&self, tenant_id: TenantId) -> Result<PortfolioView, PortError>;

    /// Returns every stored policy of the tenant, any status, in policy-number order
    async fn stored_policies(&self, tenant_id: TenantId) -> Result<Vec<StoredPolicy>, PortError>;

    /// Stores a claim
    ///
    /// # Errors
    ///
    /// Returns `PortError::Validation` if the claim amounts are negative or
    /// the policy reference is empty.
    async fn insert_claim(&self, claim: ClaimRecord) -> Result<(), PortError>;
}

/// Applies a merge policy to a stored record, returning the outcome and the
/// record that should be stored afterwards
///
/// Shared by adapters that merge in application code.
pub fn merge_into(
    stored: Option<&PolicyRecord>,
    incoming: &PolicyRecord,
    merge_policy: MergePolicy,
) -> (UpsertOutcome, PolicyRecord) {
    match stored {
        None => (UpsertOutcome::Inserted, incoming.clone()),
        Some(existing) => {
            let merged = merge_policy.merge(existing, incoming);
            if &merged == existing {
                (UpsertOutcome::Unchanged, merged)
            } else {
                (UpsertOutcome::Updated, merged)
            }
        }
    }
}

/// In-memory implementation of PortfolioStore for testing
///
/// Each tenant's book sits behind its own async mutex. A transaction holds
/// the tenant's lock for its whole lifetime and writes to a staged copy that
/// replaces the book on commit.
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::{Mutex, OwnedMutexGuard};

    use core_kernel::{AdapterHealth, HealthCheckResult};

    #[derive(Debug, Clone, Default)]
    struct TenantBook {
        policies: BTreeMap<String, StoredPolicy>,
        claims: Vec<ClaimRecord>,
    }

    /// In-memory mock implementation of PortfolioStore
    #[derive(Debug, Clone, Default)]
    pub struct InMemoryPortfolioStore {
        tenants: Arc<Mutex<HashMap<TenantId, Arc<Mutex<TenantBook>>>>>,
        fail_on_upsert: Arc<AtomicUsize>,
    }

    impl InMemoryPortfolioStore {
        /// Creates an empty store
        pub fn new() -> Self {
            Self::default()
        }

        /// Makes the `nth` upsert (1-based) of the next transaction fail with a timeout
        pub fn fail_on_upsert(&self, nth: usize) {
            self.fail_on_upsert.store(nth, Ordering::SeqCst);
        }

        /// Returns the stored policy, if any
        pub async fn policy(&self, tenant_id: TenantId, policy_number: &str) -> Option<StoredPolicy> {
            let book = self.book(tenant_id).await;
            let book = book.lock().await;
            book.policies.get(policy_number).cloned()
        }

        async fn book(&self, tenant_id: TenantId) -> Arc<Mutex<TenantBook>> {
            let mut tenants = self.tenants.lock().await;
            Arc::clone(tenants.entry(tenant_id).or_default())
        }
    }

    struct InMemoryTransaction {
        tenant_id: TenantId,
        book: Option<OwnedMutexGuard<TenantBook>>,
        staged: TenantBook,
        upserts: usize,
        fail_on_upsert: usize,
    }

    impl InMemoryTransaction {
        fn finished() -> PortError {
            PortError::internal("transaction already finished")
        }
    }

    #[async_trait]
    impl PortfolioTransaction for InMemoryTransaction {
        async fn upsert(
            &mut self,
            record: &PolicyRecord,
            merge_policy: MergePolicy,
            now: DateTime<Utc>,
        ) -> Result<UpsertOutcome, PortError> {
            if self.book.is_none() {
                return Err(Self::finished());
            }
            if record.tenant_id != self.tenant_id {
                return Err(PortError::validation(format!(
                    "policy {} belongs to another tenant",
                    record.policy_number
                )));
            }

            self.upserts += 1;
            if self.upserts == self.fail_on_upsert {
                return Err(PortError::timeout("upsert_policy", 5_000));
            }

            let stored = self.staged.policies.get(&record.policy_number);
            let (outcome, merged) = merge_into(stored.map(|s| &s.record), record, merge_policy);
            match outcome {
                UpsertOutcome::Inserted => {
                    self.staged.policies.insert(
                        record.policy_number.clone(),
                        StoredPolicy {
                            record: merged,
                            created_at: now,
                            updated_at: now,
                        },
                    );
                }
                UpsertOutcome::Updated => {
                    if let Some(stored) = self.staged.policies.get_mut(&record.policy_number) {
                        stored.record = merged;
                        stored.updated_at = now;
                    }
                }
                UpsertOutcome::Unchanged => {}
            }
            Ok(outcome)
        }

        async fn commit(&mut self) -> Result<(), PortError> {
            let mut book = self.book.take().ok_or_else(Self::finished)?;
            *book = std::mem::take(&mut self.staged);
            Ok(())
        }

        async fn rollback(&mut self) -> Result<(), PortError> {
            self.book.take().ok_or_else(Self::finished)?;
            self.staged = TenantBook::default();
            Ok(())
        }
    }

    impl DomainPort for InMemoryPortfolioStore {}

    #[async_trait]
    impl HealthCheckable for InMemoryPortfolioStore {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult {
                adapter_id: "in-memory-portfolio-store".to_string(),
                status: AdapterHealth::Healthy,
                latency_ms: 0,
                message: Some("In-memory store always healthy".to_string()),
                checked_at: Utc::now(),
            }
        }
    }

    #[async_trait]
    impl PortfolioStore for InMemoryPortfolioStore {
        async fn begin(&self, tenant_id: TenantId) -> Result<Box<dyn PortfolioTransaction>, PortError> {
            let fail_on_upsert = self.fail_on_upsert.swap(0, Ordering::SeqCst);
            let book = self.book(tenant_id).await.lock_owned().await;
            let staged = book.clone();
            Ok(Box::new(InMemoryTransaction {
                tenant_id,
                book: Some(book),
                staged,
                upserts: 0,
                fail_on_upsert,
            }))
        }

        async fn load_portfolio(&self, tenant_id: TenantId) -> Result<PortfolioView, PortError> {
            let book = self.book(tenant_id).await;
            let book = book.lock().await;

            let policies = book
                .policies
                .values()
                .filter(|stored| stored.record.is_active())
                .map(|stored| stored.record.clone())
                .collect();
            let mut claims = book.claims.clone();
            claims.sort_by(|a, b| a.policy_number.cmp(&b.policy_number));

            Ok(PortfolioView { policies, claims })
        }

        async fn stored_policies(&self, tenant_id: TenantId) -> Result<Vec<StoredPolicy>, PortError> {
            let book = self.book(tenant_id).await;
            let book = book.lock().await;
            Ok(book.policies.values().cloned().collect())
        }

        async fn insert_claim(&self, claim: ClaimRecord) -> Result<(), PortError> {
            claim
                .validate()
                .map_err(|e| PortError::validation(e.to_string()))?;
            let book = self.book(claim.tenant_id).await;
            book.lock().await.claims.push(claim);
            Ok(())
        }
    }
}
