//! Property-Based Test Generators
//!
//! Provides proptest strategies for generating portfolio data that keeps the
//! canonical record invariants (non-empty policy number, non-negative
//! premium, uppercase country), plus `fake` helpers for realistic names.

use chrono::{Duration, NaiveDate};
use fake::faker::company::en::CompanyName;
use fake::Fake;
use proptest::prelude::*;
use rust_decimal::Decimal;

use core_kernel::{Currency, TenantId};
use domain_portfolio::{ClaimRecord, InsuranceType, LineOfBusiness, PolicyRecord, PolicyStatus, RawRow};

/// GCC country codes
pub const GCC_COUNTRIES: [&str; 6] = ["BH", "SA", "AE", "KW", "OM", "QA"];

/// Strategy for generating GCC currencies
pub fn gcc_currency_strategy() -> impl Strategy<Value = Currency> {
    prop_oneof![
        Just(Currency::BHD),
        Just(Currency::SAR),
        Just(Currency::AED),
        Just(Currency::KWD),
        Just(Currency::OMR),
        Just(Currency::QAR),
    ]
}

/// Strategy for non-negative premiums with two decimal places
pub fn premium_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..10_000_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy for non-negative claim amounts with two decimal places
pub fn claim_amount_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..1_000_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy for policy numbers like `MTR-004211`
pub fn policy_number_strategy() -> impl Strategy<Value = String> {
    "[A-Z]{1,3}-[0-9]{1,6}".prop_map(|s| s)
}

pub fn country_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(GCC_COUNTRIES.to_vec()).prop_map(|c| c.to_string())
}

pub fn insurance_type_strategy() -> impl Strategy<Value = InsuranceType> {
    prop_oneof![Just(InsuranceType::Conventional), Just(InsuranceType::Takaful)]
}

pub fn status_strategy() -> impl Strategy<Value = PolicyStatus> {
    prop_oneof![
        3 => Just(PolicyStatus::Active),
        1 => Just(PolicyStatus::Expired),
        1 => Just(PolicyStatus::Cancelled),
    ]
}

pub fn line_of_business_strategy() -> impl Strategy<Value = LineOfBusiness> {
    prop_oneof![
        Just(LineOfBusiness::Motor),
        Just(LineOfBusiness::Medical),
        Just(LineOfBusiness::Property),
        Just(LineOfBusiness::Marine),
        Just(LineOfBusiness::Engineering),
        Just(LineOfBusiness::Unspecified),
    ]
}

/// Strategy for a policy term starting in 2024
pub fn term_strategy() -> impl Strategy<Value = (NaiveDate, NaiveDate)> {
    (0i64..365i64, 30i64..1_100i64).prop_map(|(start_offset, length)| {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default();
        let start = base + Duration::days(start_offset);
        (start, start + Duration::days(length))
    })
}

/// Strategy for canonical records belonging to `tenant_id`
pub fn policy_record_strategy(tenant_id: TenantId) -> impl Strategy<Value = PolicyRecord> {
    (
        policy_number_strategy(),
        premium_strategy(),
        country_strategy(),
        insurance_type_strategy(),
        status_strategy(),
        line_of_business_strategy(),
        term_strategy(),
    )
        .prop_map(
            move |(number, premium, country, insurance_type, status, line_of_business, (effective, expiration))| {
                PolicyRecord {
                    tenant_id,
                    policy_number: number,
                    insured_name: None,
                    premium,
                    effective_date: Some(effective),
                    expiration_date: Some(expiration),
                    line_of_business,
                    country,
                    insurance_type,
                    status,
                }
            },
        )
}

/// Strategy for a batch with distinct policy numbers
pub fn policy_batch_strategy(tenant_id: TenantId, max_len: usize) -> impl Strategy<Value = Vec<PolicyRecord>> {
    proptest::collection::vec(policy_record_strategy(tenant_id), 0..=max_len).prop_map(|records| {
        let mut seen = std::collections::HashSet::new();
        records
            .into_iter()
            .filter(|r| seen.insert(r.policy_number.clone()))
            .collect()
    })
}

/// Strategy for claims against the given policy numbers
pub fn claim_strategy(tenant_id: TenantId, policy_numbers: Vec<String>) -> impl Strategy<Value = ClaimRecord> {
    (
        prop::sample::select(policy_numbers),
        claim_amount_strategy(),
        claim_amount_strategy(),
    )
        .prop_map(move |(number, paid, reserve)| ClaimRecord::new(tenant_id, number, paid, reserve))
}

/// Strategy for raw rows as a spreadsheet export would produce them
///
/// Premiums are rendered with thousands separators to exercise amount parsing.
pub fn raw_row_strategy() -> impl Strategy<Value = RawRow> {
    (policy_number_strategy(), premium_strategy(), country_strategy()).prop_map(|(number, premium, country)| {
        RawRow::new()
            .with("Policy Number", number)
            .with("Premium", with_thousands_separators(premium))
            .with("Country", country)
    })
}

/// Renders `1234567.5` as `1,234,567.50`
pub fn with_thousands_separators(amount: Decimal) -> String {
    let text = format!("{:.2}", amount);
    let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), "00"));
    let mut grouped = String::new();
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("{}.{}", grouped, fraction)
}

/// A plausible insured name
pub fn fake_insured_name() -> String {
    CompanyName().fake()
}
