//! Aggregation Engine
//!
//! Computes portfolio risk metrics over a tenant's active policies:
//!
//! ```text
//! loss ratio     = incurred losses / premium          (0 when premium is 0)
//! combined ratio = loss ratio * (1 + expense load)
//! takaful share  = takaful premium / premium          (0 when premium is 0)
//! ```
//!
//! Incurred losses are paid plus reserve of every claim whose policy number
//! matches an active policy. Claims against unknown or inactive policies are
//! ignored.
//!
//! Sums and ratios saturate at the decimal range instead of overflowing, so
//! aggregation cannot fail on stored data.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

use core_kernel::{CoreError, Currency, TenantId};
use domain_portfolio::{PortfolioStore, PortfolioView};

use crate::error::AnalyticsError;
use crate::snapshot::{AggregateSnapshot, DimensionAggregate};

/// Smallest context budget that still fits the summary block
pub const MIN_CONTEXT_BUDGET: usize = 256;

/// Analytics configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Expense load applied as a multiplier on the loss ratio for the combined ratio
    pub expense_load: Decimal,
    /// Maximum length of the rendered context, in characters
    pub context_budget: usize,
    /// Currency the portfolio premiums were normalized into
    pub reporting_currency: Currency,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            expense_load: dec!(0.15),
            context_budget: 4000,
            reporting_currency: Currency::USD,
        }
    }
}

impl AnalyticsConfig {
    pub fn with_expense_load(mut self, expense_load: Decimal) -> Self {
        self.expense_load = expense_load;
        self
    }

    pub fn with_context_budget(mut self, context_budget: usize) -> Self {
        self.context_budget = context_budget;
        self
    }

    pub fn with_reporting_currency(mut self, currency: Currency) -> Self {
        self.reporting_currency = currency;
        self
    }

    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Configuration` for a negative expense load or a
    /// context budget below [`MIN_CONTEXT_BUDGET`].
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.expense_load < Decimal::ZERO {
            return Err(CoreError::configuration(format!(
                "expense load {} is negative",
                self.expense_load
            )));
        }
        if self.context_budget < MIN_CONTEXT_BUDGET {
            return Err(CoreError::configuration(format!(
                "context budget {} is below the minimum of {}",
                self.context_budget, MIN_CONTEXT_BUDGET
            )));
        }
        Ok(())
    }
}

/// Reads portfolios from the store and aggregates them
#[derive(Clone)]
pub struct AggregationEngine {
    store: Arc<dyn PortfolioStore>,
    config: AnalyticsConfig,
}

impl AggregationEngine {
    /// Creates an engine
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Configuration` if the configuration is invalid.
    pub fn new(store: Arc<dyn PortfolioStore>, config: AnalyticsConfig) -> Result<Self, CoreError> {
        config.validate()?;
        Ok(Self { store, config })
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// Computes the snapshot for a tenant from one consistent store read
    ///
    /// # Errors
    ///
    /// Returns `AnalyticsError::Storage` if the read fails. Missing data never
    /// fails: an empty portfolio yields an all-zero snapshot.
    #[instrument(skip(self))]
    pub async fn compute_snapshot(&self, tenant_id: TenantId) -> Result<AggregateSnapshot, AnalyticsError> {
        let view = self
            .store
            .load_portfolio(tenant_id)
            .await
            .map_err(|source| AnalyticsError::Storage { tenant_id, source })?;

        let snapshot = aggregate(tenant_id, &view, &self.config);
        debug!(
            policy_count = snapshot.policy_count,
            countries = snapshot.by_country.len(),
            lines = snapshot.by_line_of_business.len(),
            "Snapshot computed"
        );
        Ok(snapshot)
    }
}

#[derive(Default)]
struct Totals {
    policy_count: usize,
    premium: Decimal,
    incurred: Decimal,
    takaful_premium: Decimal,
}

impl Totals {
    fn add(&mut self, premium: Decimal, incurred: Decimal, takaful: bool) {
        self.policy_count += 1;
        self.premium = self.premium.saturating_add(premium);
        self.incurred = self.incurred.saturating_add(incurred);
        if takaful {
            self.takaful_premium = self.takaful_premium.saturating_add(premium);
        }
    }

    fn into_dimension(self, key: String) -> DimensionAggregate {
        DimensionAggregate {
            key,
            policy_count: self.policy_count,
            loss_ratio: ratio(self.incurred, self.premium),
            takaful_percentage: ratio(self.takaful_premium, self.premium),
            premium: self.premium,
            incurred_losses: self.incurred,
            takaful_premium: self.takaful_premium,
        }
    }
}

/// Groups totals by key, remembering the order keys were first seen
#[derive(Default)]
struct Breakdown {
    index: HashMap<String, usize>,
    entries: Vec<(String, Totals)>,
}

impl Breakdown {
    fn add(&mut self, key: &str, premium: Decimal, incurred: Decimal, takaful: bool) {
        let position = match self.index.get(key) {
            Some(position) => *position,
            None => {
                self.index.insert(key.to_string(), self.entries.len());
                self.entries.push((key.to_string(), Totals::default()));
                self.entries.len() - 1
            }
        };
        self.entries[position].1.add(premium, incurred, takaful);
    }

    fn finish(self) -> Vec<DimensionAggregate> {
        self.entries
            .into_iter()
            .map(|(key, totals)| totals.into_dimension(key))
            .collect()
    }
}

/// Zero over a zero denominator; saturates when the quotient is out of range
fn ratio(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator.is_zero() {
        return Decimal::ZERO;
    }
    numerator.checked_div(denominator).unwrap_or_else(|| {
        if numerator.is_sign_negative() != denominator.is_sign_negative() {
            Decimal::MIN
        } else {
            Decimal::MAX
        }
    })
}

/// Aggregates a portfolio view
///
/// Pure and deterministic: the result depends only on the view and the
/// configuration. Policies are visited in the order the view lists them.
pub fn aggregate(tenant_id: TenantId, view: &PortfolioView, config: &AnalyticsConfig) -> AggregateSnapshot {
    let mut incurred_by_policy: HashMap<&str, Decimal> = HashMap::new();
    for claim in &view.claims {
        let incurred = incurred_by_policy.entry(claim.policy_number.as_str()).or_default();
        *incurred = incurred.saturating_add(claim.incurred());
    }

    let mut totals = Totals::default();
    let mut by_country = Breakdown::default();
    let mut by_line = Breakdown::default();

    for policy in view.policies.iter().filter(|p| p.is_active()) {
        // a claim counts once even if the view repeats a policy number
        let incurred = incurred_by_policy
            .remove(policy.policy_number.as_str())
            .unwrap_or_default();
        let takaful = policy.is_takaful();

        totals.add(policy.premium, incurred, takaful);
        by_country.add(&policy.country, policy.premium, incurred, takaful);
        by_line.add(policy.line_of_business.label(), policy.premium, incurred, takaful);
    }

    let loss_ratio = ratio(totals.incurred, totals.premium);
    let average_premium = ratio(totals.premium, Decimal::from(totals.policy_count));

    AggregateSnapshot {
        tenant_id,
        currency: config.reporting_currency,
        policy_count: totals.policy_count,
        total_premium: totals.premium,
        average_premium,
        incurred_losses: totals.incurred,
        takaful_premium: totals.takaful_premium,
        loss_ratio,
        combined_ratio: loss_ratio.saturating_mul(Decimal::ONE.saturating_add(config.expense_load)),
        takaful_percentage: ratio(totals.takaful_premium, totals.premium),
        by_country: by_country.finish(),
        by_line_of_business: by_line.finish(),
    }
}
