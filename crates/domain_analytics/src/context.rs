//! Context Builder
//!
//! Renders an [`AggregateSnapshot`] as plain text for the completion
//! collaborator. The layout is fixed (summary, countries, lines of business)
//! and breakdown entries keep the snapshot's order, so the same snapshot
//! always renders to the same text.
//!
//! Output never exceeds the configured character budget. When it would,
//! breakdown entries are dropped lowest premium first (on equal premium the
//! entry printed later goes first) and each shortened list ends with a
//! `- (N more omitted)` line. If the text is still too long once every entry
//! is gone, it is cut at the budget.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

use core_kernel::{CoreError, Currency};

use crate::aggregation::{AnalyticsConfig, MIN_CONTEXT_BUDGET};
use crate::snapshot::{AggregateSnapshot, DimensionAggregate};

/// Renders bounded text context from snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextBuilder {
    max_chars: usize,
}

impl ContextBuilder {
    /// Creates a builder with the given budget
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Configuration` if the budget is below
    /// [`MIN_CONTEXT_BUDGET`].
    pub fn new(max_chars: usize) -> Result<Self, CoreError> {
        if max_chars < MIN_CONTEXT_BUDGET {
            return Err(CoreError::configuration(format!(
                "context budget {} is below the minimum of {}",
                max_chars, MIN_CONTEXT_BUDGET
            )));
        }
        Ok(Self { max_chars })
    }

    pub fn from_config(config: &AnalyticsConfig) -> Result<Self, CoreError> {
        Self::new(config.context_budget)
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Renders the snapshot within the character budget
    pub fn render(&self, snapshot: &AggregateSnapshot) -> String {
        let lists = [&snapshot.by_country, &snapshot.by_line_of_business];
        let mut kept = [vec![true; lists[0].len()], vec![true; lists[1].len()]];

        let mut text = render_text(snapshot, &kept);
        for (list, index) in removal_order(&lists) {
            if text.chars().count() <= self.max_chars {
                return text;
            }
            kept[list][index] = false;
            text = render_text(snapshot, &kept);
        }

        match text.char_indices().nth(self.max_chars) {
            Some((cut, _)) => text[..cut].to_string(),
            None => text,
        }
    }
}

/// Entries in the order they are dropped: lowest premium first, and on a
/// tie the one printed later first
fn removal_order(lists: &[&Vec<DimensionAggregate>; 2]) -> Vec<(usize, usize)> {
    let mut entries: Vec<(usize, usize)> = lists
        .iter()
        .enumerate()
        .flat_map(|(list, entries)| (0..entries.len()).map(move |index| (list, index)))
        .collect();
    entries.sort_by(|a, b| {
        let premium_a = lists[a.0][a.1].premium;
        let premium_b = lists[b.0][b.1].premium;
        premium_a.cmp(&premium_b).then_with(|| b.cmp(a))
    });
    entries
}

fn render_text(snapshot: &AggregateSnapshot, kept: &[Vec<bool>; 2]) -> String {
    let currency = snapshot.currency;
    let mut lines = vec![
        "Portfolio Summary:".to_string(),
        format!("- Total Policies: {}", snapshot.policy_count),
        format!("- Total Premium: {}", money(snapshot.total_premium, currency)),
        format!("- Average Premium: {}", money(snapshot.average_premium, currency)),
        format!("- Incurred Losses: {}", money(snapshot.incurred_losses, currency)),
        format!("- Loss Ratio: {}", percent(snapshot.loss_ratio)),
        format!("- Combined Ratio: {}", percent(snapshot.combined_ratio)),
        format!("- Takaful Share: {}", percent(snapshot.takaful_percentage)),
    ];

    let sections = [
        ("By Country:", &snapshot.by_country),
        ("By Line of Business:", &snapshot.by_line_of_business),
    ];
    for ((title, entries), kept) in sections.into_iter().zip(kept) {
        lines.push(String::new());
        lines.push(title.to_string());

        if entries.is_empty() {
            lines.push("- none".to_string());
            continue;
        }
        for (entry, _) in entries.iter().zip(kept).filter(|(_, keep)| **keep) {
            lines.push(dimension_line(entry, currency));
        }
        let omitted = kept.iter().filter(|keep| !**keep).count();
        if omitted > 0 {
            lines.push(format!("- ({} more omitted)", omitted));
        }
    }

    lines.join("\n")
}

fn dimension_line(entry: &DimensionAggregate, currency: Currency) -> String {
    format!(
        "- {}: {} policies, {} premium, loss ratio {}, takaful {}",
        entry.key,
        entry.policy_count,
        money(entry.premium, currency),
        percent(entry.loss_ratio),
        percent(entry.takaful_percentage)
    )
}

/// `1234567.891` in USD renders as `1,234,567.89 USD`
fn money(amount: Decimal, currency: Currency) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let text = format!("{:.2}", rounded);
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text.as_str()),
    };
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("{}{}.{} {}", sign, grouped, fraction, currency)
}

fn percent(ratio: Decimal) -> String {
    let scaled = ratio
        .saturating_mul(dec!(100))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.2}%", scaled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::TenantId;

    fn dimension(key: &str, premium: Decimal) -> DimensionAggregate {
        DimensionAggregate {
            key: key.to_string(),
            policy_count: 1,
            premium,
            incurred_losses: Decimal::ZERO,
            takaful_premium: Decimal::ZERO,
            loss_ratio: Decimal::ZERO,
            takaful_percentage: Decimal::ZERO,
        }
    }

    fn snapshot(countries: Vec<DimensionAggregate>, lines: Vec<DimensionAggregate>) -> AggregateSnapshot {
        let total: Decimal = countries.iter().map(|d| d.premium).sum();
        AggregateSnapshot {
            tenant_id: TenantId::new(),
            currency: Currency::USD,
            policy_count: countries.len(),
            total_premium: total,
            average_premium: Decimal::ZERO,
            incurred_losses: Decimal::ZERO,
            takaful_premium: Decimal::ZERO,
            loss_ratio: Decimal::ZERO,
            combined_ratio: Decimal::ZERO,
            takaful_percentage: Decimal::ZERO,
            by_country: countries,
            by_line_of_business: lines,
        }
    }

    #[test]
    fn test_money_formatting() {
        assert_eq!(money(dec!(1234567.891), Currency::USD), "1,234,567.89 USD");
        assert_eq!(money(dec!(999), Currency::BHD), "999.00 BHD");
        assert_eq!(money(dec!(0.005), Currency::USD), "0.01 USD");
        assert_eq!(money(dec!(-1000), Currency::USD), "-1,000.00 USD");
        assert_eq!(money(Decimal::ZERO, Currency::SAR), "0.00 SAR");
    }

    #[test]
    fn test_percent_formatting() {
        assert_eq!(percent(dec!(0.4)), "40.00%");
        assert_eq!(percent(dec!(0.46)), "46.00%");
        assert_eq!(percent(Decimal::ONE / dec!(3)), "33.33%");
        assert_eq!(percent(dec!(1.5)), "150.00%");
    }

    #[test]
    fn test_saturated_values_render() {
        assert!(percent(Decimal::MAX).ends_with('%'));
        assert!(money(Decimal::MAX, Currency::USD).starts_with("79,228,162,514,264,337,593,543,950,335.00"));
    }

    #[test]
    fn test_removal_order_breaks_ties_by_later_position() {
        let countries = vec![dimension("SA", dec!(10)), dimension("BH", dec!(5))];
        let lines = vec![dimension("Motor", dec!(5)), dimension("Marine", dec!(20))];
        let order = removal_order(&[&countries, &lines]);
        assert_eq!(order, vec![(1, 0), (0, 1), (0, 0), (1, 1)]);
    }

    #[test]
    fn test_minimum_budget_enforced() {
        assert!(ContextBuilder::new(MIN_CONTEXT_BUDGET - 1).is_err());
        assert!(ContextBuilder::new(MIN_CONTEXT_BUDGET).is_ok());
    }

    #[test]
    fn test_hard_cut_respects_char_boundaries() {
        let builder = ContextBuilder { max_chars: 25 };
        let snapshot = snapshot(vec![dimension("Émirats", dec!(1))], vec![]);
        let text = builder.render(&snapshot);
        assert_eq!(text.chars().count(), 25);
        assert!(text.starts_with("Portfolio Summary:"));
    }

    #[test]
    fn test_empty_breakdowns_render_none() {
        let builder = ContextBuilder::new(4000).unwrap();
        let text = builder.render(&snapshot(vec![], vec![]));
        assert!(text.contains("By Country:\n- none"));
        assert!(text.contains("By Line of Business:\n- none"));
    }
}
