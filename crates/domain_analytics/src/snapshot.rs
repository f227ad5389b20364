//! Aggregate snapshot types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{Currency, TenantId};

/// Metrics for one value of a breakdown dimension (a country or a line of business)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionAggregate {
    pub key: String,
    pub policy_count: usize,
    pub premium: Decimal,
    pub incurred_losses: Decimal,
    pub takaful_premium: Decimal,
    pub loss_ratio: Decimal,
    pub takaful_percentage: Decimal,
}

/// Immutable risk metrics for one tenant's active portfolio
///
/// Ratios are fractions (0.4 is 40%). Breakdowns keep the order in which
/// each key was first met while reading policies in policy-number order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateSnapshot {
    pub tenant_id: TenantId,
    /// Currency every amount is expressed in
    pub currency: Currency,
    pub policy_count: usize,
    pub total_premium: Decimal,
    pub average_premium: Decimal,
    pub incurred_losses: Decimal,
    pub takaful_premium: Decimal,
    pub loss_ratio: Decimal,
    pub combined_ratio: Decimal,
    pub takaful_percentage: Decimal,
    pub by_country: Vec<DimensionAggregate>,
    pub by_line_of_business: Vec<DimensionAggregate>,
}

impl AggregateSnapshot {
    /// Returns true when the tenant has no active policies
    pub fn is_empty(&self) -> bool {
        self.policy_count == 0
    }

    pub fn country(&self, key: &str) -> Option<&DimensionAggregate> {
        self.by_country.iter().find(|d| d.key == key)
    }

    pub fn line_of_business(&self, key: &str) -> Option<&DimensionAggregate> {
        self.by_line_of_business.iter().find(|d| d.key == key)
    }
}
