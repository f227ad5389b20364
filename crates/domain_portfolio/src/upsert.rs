//! Upsert Coordinator
//!
//! Applies a validated batch to the store inside a single transaction. Either
//! every record of the batch is merged or, on any storage failure, none is.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use core_kernel::TenantId;

use crate::error::IngestError;
use crate::ports::{PortfolioStore, UpsertOutcome};
use crate::record::PolicyRecord;

/// Which fields an upload may overwrite on an existing policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Premium, expiration date and status are refreshed; the rest of the
    /// stored record is kept. An incoming expiration earlier than the stored
    /// effective date would end the term before it starts, so the stored
    /// expiration is kept instead.
    #[default]
    RefreshTerms,
    /// Every descriptive field is replaced by the upload
    FullOverwrite,
}

impl MergePolicy {
    /// Returns the record to store when `incoming` is uploaded over `existing`
    pub fn merge(&self, existing: &PolicyRecord, incoming: &PolicyRecord) -> PolicyRecord {
        match self {
            MergePolicy::RefreshTerms => PolicyRecord {
                premium: incoming.premium,
                expiration_date: refreshed_expiration(existing, incoming),
                status: incoming.status,
                ..existing.clone()
            },
            MergePolicy::FullOverwrite => PolicyRecord {
                tenant_id: existing.tenant_id,
                policy_number: existing.policy_number.clone(),
                ..incoming.clone()
            },
        }
    }

    /// Names of the stored columns this policy may change
    pub fn updatable_fields(&self) -> &'static [&'static str] {
        match self {
            MergePolicy::RefreshTerms => &["premium", "expiration_date", "status"],
            MergePolicy::FullOverwrite => &[
                "insured_name",
                "premium",
                "effective_date",
                "expiration_date",
                "line_of_business",
                "country",
                "insurance_type",
                "status",
            ],
        }
    }
}

fn refreshed_expiration(existing: &PolicyRecord, incoming: &PolicyRecord) -> Option<NaiveDate> {
    match (existing.effective_date, incoming.expiration_date) {
        (Some(effective), Some(expiration)) if expiration < effective => {
            debug!(
                policy_number = %existing.policy_number,
                %effective,
                %expiration,
                "Incoming expiration precedes stored effective date, keeping stored term"
            );
            existing.expiration_date
        }
        _ => incoming.expiration_date,
    }
}

/// Counts of what a committed batch did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommitResult {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl CommitResult {
    fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Updated => self.updated += 1,
            UpsertOutcome::Unchanged => self.unchanged += 1,
        }
    }
}

/// Commits validated batches to the portfolio store
#[derive(Clone)]
pub struct UpsertCoordinator {
    store: Arc<dyn PortfolioStore>,
    merge_policy: MergePolicy,
}

impl UpsertCoordinator {
    pub fn new(store: Arc<dyn PortfolioStore>, merge_policy: MergePolicy) -> Self {
        Self { store, merge_policy }
    }

    pub fn merge_policy(&self) -> MergePolicy {
        self.merge_policy
    }

    /// Merges the batch into the tenant's portfolio in one transaction
    ///
    /// Records are applied in policy-number order so that concurrent commits
    /// for the same tenant take row locks in the same order. All records
    /// share one `updated_at` timestamp.
    ///
    /// # Errors
    ///
    /// - `IngestError::TenantMismatch` if a record belongs to another tenant;
    ///   raised before any transaction is opened
    /// - `IngestError::Storage` if the store fails; the transaction is rolled
    ///   back and nothing from the batch is visible
    #[instrument(skip(self, batch), fields(batch_size = batch.len()))]
    pub async fn commit(&self, batch: &[PolicyRecord], tenant_id: TenantId) -> Result<CommitResult, IngestError> {
        if let Some(foreign) = batch.iter().find(|r| r.tenant_id != tenant_id) {
            return Err(IngestError::TenantMismatch {
                expected: tenant_id,
                found: foreign.tenant_id,
                policy_number: foreign.policy_number.clone(),
            });
        }

        let mut result = CommitResult::default();
        if batch.is_empty() {
            return Ok(result);
        }

        let mut ordered: Vec<&PolicyRecord> = batch.iter().collect();
        ordered.sort_by(|a, b| a.policy_number.cmp(&b.policy_number));

        let storage = |source| IngestError::Storage { tenant_id, source };
        let now = Utc::now();
        let mut tx = self.store.begin(tenant_id).await.map_err(storage)?;

        for record in ordered {
            match tx.upsert(record, self.merge_policy, now).await {
                Ok(outcome) => result.record(outcome),
                Err(source) => {
                    warn!(
                        policy_number = %record.policy_number,
                        error = %source,
                        "Upsert failed, rolling back batch"
                    );
                    if let Err(rollback_error) = tx.rollback().await {
                        warn!(error = %rollback_error, "Rollback failed");
                    }
                    return Err(storage(source));
                }
            }
        }

        tx.commit().await.map_err(storage)?;

        info!(
            inserted = result.inserted,
            updated = result.updated,
            unchanged = result.unchanged,
            "Batch committed"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::mock::InMemoryPortfolioStore;
    use crate::record::{InsuranceType, LineOfBusiness, PolicyStatus};
    use core_kernel::PortError;
    use rust_decimal_macros::dec;

    fn coordinator(store: &InMemoryPortfolioStore) -> UpsertCoordinator {
        UpsertCoordinator::new(Arc::new(store.clone()), MergePolicy::RefreshTerms)
    }

    fn batch(tenant: TenantId, count: usize) -> Vec<PolicyRecord> {
        (1..=count)
            .map(|i| PolicyRecord::new(tenant, format!("P-{:03}", i), dec!(1000) * rust_decimal::Decimal::from(i), "BH"))
            .collect()
    }

    #[test]
    fn test_refresh_terms_keeps_descriptive_fields() {
        let tenant = TenantId::new();
        let mut existing = PolicyRecord::new(tenant, "P-1", dec!(100), "BH");
        existing.insured_name = Some("Gulf Trading".to_string());
        existing.line_of_business = LineOfBusiness::Marine;

        let mut incoming = PolicyRecord::new(tenant, "P-1", dec!(250), "SA");
        incoming.insurance_type = InsuranceType::Takaful;
        incoming.status = PolicyStatus::Expired;
        incoming.expiration_date = NaiveDate::from_ymd_opt(2025, 12, 31);

        let merged = MergePolicy::RefreshTerms.merge(&existing, &incoming);
        assert_eq!(merged.premium, dec!(250));
        assert_eq!(merged.status, PolicyStatus::Expired);
        assert_eq!(merged.expiration_date, incoming.expiration_date);
        assert_eq!(merged.country, "BH");
        assert_eq!(merged.insurance_type, InsuranceType::Conventional);
        assert_eq!(merged.insured_name.as_deref(), Some("Gulf Trading"));
        assert_eq!(merged.line_of_business, LineOfBusiness::Marine);

        let overwritten = MergePolicy::FullOverwrite.merge(&existing, &incoming);
        assert_eq!(overwritten.country, "SA");
        assert_eq!(overwritten.insured_name, None);
    }

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn test_refresh_terms_never_ends_term_before_it_starts() {
        let tenant = TenantId::new();
        let mut existing = PolicyRecord::new(tenant, "P-1", dec!(100), "BH");
        existing.effective_date = date(2024, 6, 1);
        existing.expiration_date = date(2025, 6, 1);

        let mut incoming = PolicyRecord::new(tenant, "P-1", dec!(120), "BH");
        incoming.effective_date = date(2024, 1, 1);
        incoming.expiration_date = date(2024, 3, 1);
        incoming.status = PolicyStatus::Expired;

        let merged = MergePolicy::RefreshTerms.merge(&existing, &incoming);
        assert_eq!(merged.effective_date, date(2024, 6, 1));
        assert_eq!(merged.expiration_date, date(2025, 6, 1));
        assert_eq!(merged.premium, dec!(120));
        assert_eq!(merged.status, PolicyStatus::Expired);

        // a later expiration, or a cleared one, is still taken
        incoming.expiration_date = date(2026, 6, 1);
        assert_eq!(MergePolicy::RefreshTerms.merge(&existing, &incoming).expiration_date, date(2026, 6, 1));
        incoming.expiration_date = None;
        assert_eq!(MergePolicy::RefreshTerms.merge(&existing, &incoming).expiration_date, None);
    }

    /// Re-uploading a term that ends before the stored start commits and keeps the stored term
    #[tokio::test]
    async fn test_backdated_expiration_keeps_stored_term() {
        let store = InMemoryPortfolioStore::new();
        let tenant = TenantId::new();
        let coordinator = coordinator(&store);

        let mut original = PolicyRecord::new(tenant, "P-1", dec!(100), "BH");
        original.effective_date = date(2024, 6, 1);
        original.expiration_date = date(2025, 6, 1);
        coordinator.commit(&[original], tenant).await.unwrap();

        let mut backdated = PolicyRecord::new(tenant, "P-1", dec!(100), "BH");
        backdated.effective_date = date(2024, 1, 1);
        backdated.expiration_date = date(2024, 3, 1);
        let result = coordinator.commit(std::slice::from_ref(&backdated), tenant).await.unwrap();
        assert_eq!(result, CommitResult { inserted: 0, updated: 0, unchanged: 1 });

        backdated.premium = dec!(150);
        let result = coordinator.commit(&[backdated], tenant).await.unwrap();
        assert_eq!(result.updated, 1);

        let stored = store.policy(tenant, "P-1").await.unwrap().record;
        assert_eq!(stored.premium, dec!(150));
        assert_eq!(stored.effective_date, date(2024, 6, 1));
        assert_eq!(stored.expiration_date, date(2025, 6, 1));
    }

    #[tokio::test]
    async fn test_failure_mid_batch_leaves_nothing_visible() {
        let store = InMemoryPortfolioStore::new();
        let tenant = TenantId::new();
        store.fail_on_upsert(7);

        let err = coordinator(&store).commit(&batch(tenant, 10), tenant).await.unwrap_err();

        assert!(matches!(err, IngestError::Storage { source: PortError::Timeout { .. }, .. }));
        assert!(err.is_retryable());
        assert!(store.stored_policies(tenant).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resubmission_is_a_no_op() {
        let store = InMemoryPortfolioStore::new();
        let tenant = TenantId::new();
        let records = batch(tenant, 3);
        let coordinator = coordinator(&store);

        let first = coordinator.commit(&records, tenant).await.unwrap();
        assert_eq!(first.inserted, 3);
        let before = store.stored_policies(tenant).await.unwrap();

        let second = coordinator.commit(&records, tenant).await.unwrap();
        assert_eq!(second, CommitResult { inserted: 0, updated: 0, unchanged: 3 });
        assert_eq!(store.stored_policies(tenant).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_update_refreshes_timestamp_but_not_created_at() {
        let store = InMemoryPortfolioStore::new();
        let tenant = TenantId::new();
        let coordinator = coordinator(&store);
        let mut record = PolicyRecord::new(tenant, "P-1", dec!(100), "BH");

        coordinator.commit(std::slice::from_ref(&record), tenant).await.unwrap();
        let original = store.policy(tenant, "P-1").await.unwrap();

        record.premium = dec!(175);
        let result = coordinator.commit(std::slice::from_ref(&record), tenant).await.unwrap();
        assert_eq!(result.updated, 1);

        let updated = store.policy(tenant, "P-1").await.unwrap();
        assert_eq!(updated.record.premium, dec!(175));
        assert_eq!(updated.created_at, original.created_at);
        assert!(updated.updated_at >= original.updated_at);
    }

    #[tokio::test]
    async fn test_empty_batch_opens_no_transaction() {
        let store = InMemoryPortfolioStore::new();
        let tenant = TenantId::new();
        store.fail_on_upsert(1);

        let result = coordinator(&store).commit(&[], tenant).await.unwrap();
        assert_eq!(result, CommitResult::default());

        // the armed failure is still waiting for the next real transaction
        let err = coordinator(&store).commit(&batch(tenant, 1), tenant).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn test_foreign_record_is_rejected_before_storage() {
        let store = InMemoryPortfolioStore::new();
        let tenant = TenantId::new();
        let mut records = batch(tenant, 2);
        records.push(PolicyRecord::new(TenantId::new(), "X-1", dec!(5), "BH"));

        let err = coordinator(&store).commit(&records, tenant).await.unwrap_err();
        assert!(matches!(err, IngestError::TenantMismatch { ref policy_number, .. } if policy_number == "X-1"));
        assert!(store.stored_policies(tenant).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_commits_for_one_tenant_serialize() {
        let store = InMemoryPortfolioStore::new();
        let tenant = TenantId::new();
        let coordinator = coordinator(&store);

        let left = batch(tenant, 20);
        let right: Vec<_> = left
            .iter()
            .rev()
            .map(|r| PolicyRecord { premium: r.premium + dec!(1), ..r.clone() })
            .collect();

        let (a, b) = tokio::join!(
            { let c = coordinator.clone(); async move { c.commit(&left, tenant).await } },
            { let c = coordinator.clone(); async move { c.commit(&right, tenant).await } },
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(a.inserted + b.inserted, 20);
        assert_eq!(a.updated + b.updated, 20);
        assert_eq!(store.stored_policies(tenant).await.unwrap().len(), 20);
    }
}
