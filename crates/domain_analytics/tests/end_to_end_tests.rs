//! Upload-to-context tests over the in-memory store
//!
//! # Test Organization
//!
//! - `reference_tests` - The worked reference portfolio end to end
//! - `atomicity_tests` - Aborted uploads never reach the snapshot
//! - `context_tests` - Context rendering from real snapshots
//! - `assistant_tests` - Question answering through a recording collaborator
//! - `property_tests` - Ratio bounds over generated portfolios

use async_trait::async_trait;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::{Arc, Mutex};

use core_kernel::{DomainPort, PortError, TenantId};
use domain_analytics::{
    aggregate, AggregationEngine, AnalyticsConfig, AnalyticsError, CompletionService, ContextBuilder,
    PortfolioAssistant, QueryLog, QueryLogEntry,
};
use domain_portfolio::{
    BatchOutcome, IngestError, IngestionService, InMemoryPortfolioStore, PipelineConfig, PortfolioStore,
    PortfolioView, RawRow,
};
use test_utils::{
    assert_decimal_in_range, claim_strategy, policy_batch_strategy, PortfolioFixtures, RawRowFixtures,
};

struct Harness {
    store: InMemoryPortfolioStore,
    ingestion: IngestionService,
    engine: AggregationEngine,
}

impl Harness {
    fn new() -> Self {
        let store = InMemoryPortfolioStore::new();
        let shared: Arc<dyn PortfolioStore> = Arc::new(store.clone());
        Self {
            ingestion: IngestionService::new(PipelineConfig::default(), Arc::clone(&shared)).unwrap(),
            engine: AggregationEngine::new(shared, AnalyticsConfig::default()).unwrap(),
            store,
        }
    }

    async fn load_reference(&self, tenant: TenantId) {
        let report = self
            .ingestion
            .ingest(tenant, &RawRowFixtures::reference_upload())
            .await
            .unwrap();
        assert_eq!(report.outcome, BatchOutcome::Committed);
        for claim in PortfolioFixtures::reference_claims(tenant) {
            self.store.insert_claim(claim).await.unwrap();
        }
    }
}

// ============================================================================
// REFERENCE PORTFOLIO
// ============================================================================

mod reference_tests {
    use super::*;

    /// 100,000 SA + 50,000 BH premium with 60,000 incurred gives 0.40 / 0.46
    #[tokio::test]
    async fn test_reference_ratios() {
        let harness = Harness::new();
        let tenant = TenantId::new();
        harness.load_reference(tenant).await;

        let snapshot = harness.engine.compute_snapshot(tenant).await.unwrap();

        assert_eq!(snapshot.policy_count, 2);
        assert_eq!(snapshot.total_premium, dec!(150000));
        assert_eq!(snapshot.incurred_losses, dec!(60000));
        assert_eq!(snapshot.loss_ratio, PortfolioFixtures::reference_loss_ratio());
        assert_eq!(snapshot.combined_ratio, PortfolioFixtures::reference_combined_ratio());
    }

    /// Breakdowns slice the same totals by country and line of business
    #[tokio::test]
    async fn test_reference_breakdowns() {
        let harness = Harness::new();
        let tenant = TenantId::new();
        harness.load_reference(tenant).await;

        let snapshot = harness.engine.compute_snapshot(tenant).await.unwrap();

        let sa = snapshot.country("SA").unwrap();
        assert_eq!(sa.loss_ratio, dec!(0.6));
        let bh = snapshot.country("BH").unwrap();
        assert_eq!(bh.loss_ratio, Decimal::ZERO);
        assert_eq!(bh.takaful_percentage, Decimal::ONE);

        assert_eq!(snapshot.line_of_business("Motor").unwrap().premium, dec!(100000));
        assert_eq!(snapshot.line_of_business("Medical").unwrap().premium, dec!(50000));

        let one_third = dec!(50000) / dec!(150000);
        assert_eq!(snapshot.takaful_percentage, one_third);
    }

    /// Re-submitting the same upload leaves the snapshot unchanged
    #[tokio::test]
    async fn test_resubmission_keeps_snapshot() {
        let harness = Harness::new();
        let tenant = TenantId::new();
        harness.load_reference(tenant).await;
        let before = harness.engine.compute_snapshot(tenant).await.unwrap();

        let report = harness
            .ingestion
            .ingest(tenant, &RawRowFixtures::reference_upload())
            .await
            .unwrap();
        assert_eq!(report.unchanged, 2);

        let after = harness.engine.compute_snapshot(tenant).await.unwrap();
        assert_eq!(before, after);
    }

    /// Another tenant's data never appears in a snapshot
    #[tokio::test]
    async fn test_snapshot_is_tenant_scoped() {
        let harness = Harness::new();
        harness.load_reference(TenantId::new()).await;

        let snapshot = harness.engine.compute_snapshot(TenantId::new()).await.unwrap();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.loss_ratio, Decimal::ZERO);
    }
}

// ============================================================================
// ATOMICITY
// ============================================================================

mod atomicity_tests {
    use super::*;

    /// A storage timeout on row 7 of 10 leaves the snapshot untouched
    #[tokio::test]
    async fn test_aborted_upload_is_invisible() {
        let harness = Harness::new();
        let tenant = TenantId::new();
        harness.load_reference(tenant).await;
        let before = harness.engine.compute_snapshot(tenant).await.unwrap();

        harness.store.fail_on_upsert(7);
        let err = harness
            .ingestion
            .ingest(tenant, &RawRowFixtures::ten_row_batch())
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::CommitAborted { .. }));
        assert!(err.is_retryable());

        let after = harness.engine.compute_snapshot(tenant).await.unwrap();
        assert_eq!(before, after);

        // the retry goes through once the store recovers
        let report = harness
            .ingestion
            .ingest(tenant, &RawRowFixtures::ten_row_batch())
            .await
            .unwrap();
        assert_eq!(report.inserted, 10);
        let retried = harness.engine.compute_snapshot(tenant).await.unwrap();
        assert_eq!(retried.policy_count, 12);
    }

    /// Rejected rows are excluded; the rest of the upload still lands
    #[tokio::test]
    async fn test_partially_rejected_upload() {
        let harness = Harness::new();
        let tenant = TenantId::new();
        let rows = vec![
            RawRowFixtures::p100(),
            RawRowFixtures::missing_policy_number(),
            RawRowFixtures::negative_premium(),
        ];

        let report = harness.ingestion.ingest(tenant, &rows).await.unwrap();
        assert_eq!(report.outcome, BatchOutcome::PartiallyRejected);
        assert_eq!(report.rejected.len(), 2);

        let snapshot = harness.engine.compute_snapshot(tenant).await.unwrap();
        assert_eq!(snapshot.policy_count, 1);
        assert_eq!(snapshot.total_premium, dec!(12000));
        assert_eq!(snapshot.country("SA").unwrap().policy_count, 1);
    }
}

// ============================================================================
// CONTEXT
// ============================================================================

mod context_tests {
    use super::*;

    /// The reference portfolio renders in full, entries in policy-number discovery order
    #[tokio::test]
    async fn test_reference_context() {
        let harness = Harness::new();
        let tenant = TenantId::new();
        harness.load_reference(tenant).await;
        let snapshot = harness.engine.compute_snapshot(tenant).await.unwrap();

        let text = ContextBuilder::new(4000).unwrap().render(&snapshot);

        assert!(text.starts_with("Portfolio Summary:\n- Total Policies: 2\n"));
        assert!(text.contains("- Total Premium: 150,000.00 USD"));
        assert!(text.contains("- Loss Ratio: 40.00%"));
        assert!(text.contains("- Combined Ratio: 46.00%"));
        assert!(text.contains("- Takaful Share: 33.33%"));
        assert!(text.contains(
            "By Country:\n- BH: 1 policies, 50,000.00 USD premium, loss ratio 0.00%, takaful 100.00%\n\
             - SA: 1 policies, 100,000.00 USD premium, loss ratio 60.00%, takaful 0.00%"
        ));
        assert!(text.contains("By Line of Business:\n- Medical:"));
        assert!(!text.contains("omitted"));
    }

    /// A large portfolio is cut down to the budget, lowest premium first
    #[tokio::test]
    async fn test_context_respects_budget() {
        let harness = Harness::new();
        let tenant = TenantId::new();
        let rows: Vec<RawRow> = (1..=40)
            .map(|i| {
                RawRow::new()
                    .with("Policy Number", format!("P-{}", i))
                    .with("Premium", i * 100)
                    .with("Country", format!("X{}", (b'A' + (i % 26) as u8) as char))
                    .with("Line of Business", format!("Line {}", i))
            })
            .collect();
        harness.ingestion.ingest(tenant, &rows).await.unwrap();
        let snapshot = harness.engine.compute_snapshot(tenant).await.unwrap();

        let builder = ContextBuilder::new(1200).unwrap();
        let text = builder.render(&snapshot);

        assert!(text.chars().count() <= 1200);
        assert!(text.contains("more omitted)"));
        // the biggest line survives, the smallest goes first
        assert!(text.contains("- Line 40:"));
        assert!(!text.contains("- Line 1:"));
        assert_eq!(text, builder.render(&snapshot), "rendering is deterministic");
    }
}

// ============================================================================
// ASSISTANT
// ============================================================================

mod assistant_tests {
    use super::*;

    /// Records prompts and answers with a fixed text
    #[derive(Default)]
    struct RecordingCompletion {
        prompts: Mutex<Vec<String>>,
    }

    impl DomainPort for RecordingCompletion {}

    #[async_trait]
    impl CompletionService for RecordingCompletion {
        async fn complete(&self, prompt: &str) -> Result<String, PortError> {
            if let Ok(mut prompts) = self.prompts.lock() {
                prompts.push(prompt.to_string());
            }
            Ok("Motor drives your loss ratio.".to_string())
        }
    }

    #[derive(Default)]
    struct VecQueryLog {
        entries: Mutex<Vec<QueryLogEntry>>,
    }

    impl DomainPort for VecQueryLog {}

    #[async_trait]
    impl QueryLog for VecQueryLog {
        async fn record(&self, entry: &QueryLogEntry) -> Result<(), PortError> {
            self.entries
                .lock()
                .map_err(|_| PortError::internal("poisoned"))?
                .push(entry.clone());
            Ok(())
        }

        async fn recent(&self, tenant_id: TenantId, limit: usize) -> Result<Vec<QueryLogEntry>, PortError> {
            let entries = self.entries.lock().map_err(|_| PortError::internal("poisoned"))?;
            Ok(entries
                .iter()
                .rev()
                .filter(|entry| entry.tenant_id == tenant_id)
                .take(limit)
                .cloned()
                .collect())
        }
    }

    #[tokio::test]
    async fn test_answer_uses_rendered_context() {
        let harness = Harness::new();
        let tenant = TenantId::new();
        harness.load_reference(tenant).await;
        let completion = Arc::new(RecordingCompletion::default());
        let query_log = Arc::new(VecQueryLog::default());
        let assistant = PortfolioAssistant::new(
            harness.engine.clone(),
            ContextBuilder::new(4000).unwrap(),
            completion.clone(),
            query_log.clone(),
        );

        let answer = assistant.answer(tenant, "Where are my losses?").await.unwrap();

        let logged = query_log.recent(tenant, 5).await.unwrap();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].query, "Where are my losses?");
        assert_eq!(logged[0].response, answer.response);

        assert_eq!(answer.response, "Motor drives your loss ratio.");
        assert_eq!(answer.snapshot.loss_ratio, dec!(0.4));
        let prompts = completion.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("- Loss Ratio: 40.00%"));
        assert!(prompts[0].contains("User Query: Where are my losses?"));
    }

    #[tokio::test]
    async fn test_empty_query() {
        let harness = Harness::new();
        let assistant = PortfolioAssistant::new(
            harness.engine.clone(),
            ContextBuilder::new(4000).unwrap(),
            Arc::new(RecordingCompletion::default()),
            Arc::new(VecQueryLog::default()),
        );
        let err = assistant.answer(TenantId::new(), "").await.unwrap_err();
        assert!(matches!(err, AnalyticsError::EmptyQuery));
    }
}

// ============================================================================
// PROPERTY TESTS
// ============================================================================

mod property_tests {
    use super::*;

    fn portfolio() -> impl Strategy<Value = PortfolioView> {
        let tenant = TenantId::new();
        policy_batch_strategy(tenant, 25).prop_flat_map(move |policies| {
            let numbers: Vec<String> = policies.iter().map(|p| p.policy_number.clone()).collect();
            let claims = if numbers.is_empty() {
                Just(Vec::new()).boxed()
            } else {
                proptest::collection::vec(claim_strategy(tenant, numbers), 0..10).boxed()
            };
            claims.prop_map(move |claims| PortfolioView {
                policies: policies.clone(),
                claims,
            })
        })
    }

    proptest! {
        /// Loss ratio is never negative and Takaful share stays within [0, 1]
        #[test]
        fn ratios_are_bounded(view in portfolio()) {
            let snapshot = aggregate(TenantId::new(), &view, &AnalyticsConfig::default());

            prop_assert!(snapshot.loss_ratio >= Decimal::ZERO);
            assert_decimal_in_range(snapshot.takaful_percentage, Decimal::ZERO, Decimal::ONE);
            if snapshot.total_premium.is_zero() {
                prop_assert_eq!(snapshot.loss_ratio, Decimal::ZERO);
                prop_assert_eq!(snapshot.takaful_percentage, Decimal::ZERO);
            }
        }

        /// Breakdowns partition the active portfolio
        #[test]
        fn breakdowns_sum_to_totals(view in portfolio()) {
            let snapshot = aggregate(TenantId::new(), &view, &AnalyticsConfig::default());

            let by_country: Decimal = snapshot.by_country.iter().map(|d| d.premium).sum();
            let by_line: Decimal = snapshot.by_line_of_business.iter().map(|d| d.premium).sum();
            let count: usize = snapshot.by_country.iter().map(|d| d.policy_count).sum();
            prop_assert_eq!(by_country, snapshot.total_premium);
            prop_assert_eq!(by_line, snapshot.total_premium);
            prop_assert_eq!(count, snapshot.policy_count);
        }

        /// Rendered context never exceeds its budget
        #[test]
        fn context_fits_budget(view in portfolio(), budget in 256usize..2_000) {
            let snapshot = aggregate(TenantId::new(), &view, &AnalyticsConfig::default());
            let text = ContextBuilder::new(budget).unwrap().render(&snapshot);
            prop_assert!(text.chars().count() <= budget);
        }
    }
}
