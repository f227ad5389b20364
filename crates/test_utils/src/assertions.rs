//! Custom Test Assertions
//!
//! Assertion helpers for portfolio types that give more meaningful failure
//! messages than plain `assert_eq!`.

use rust_decimal::Decimal;

use domain_portfolio::{PolicyRecord, StoredPolicy, UploadReport};

/// Asserts that a decimal value is within a range
pub fn assert_decimal_in_range(value: Decimal, min: Decimal, max: Decimal) {
    assert!(
        value >= min && value <= max,
        "Decimal {} is not in range [{}, {}]",
        value,
        min,
        max
    );
}

/// Asserts that a decimal value is approximately equal to another
pub fn assert_decimal_approx_eq(actual: Decimal, expected: Decimal, tolerance: Decimal) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= tolerance,
        "Decimals differ by more than tolerance: actual={}, expected={}, diff={}, tolerance={}",
        actual,
        expected,
        diff,
        tolerance
    );
}

/// Asserts the write counts of an upload report
pub fn assert_report_counts(report: &UploadReport, inserted: usize, updated: usize, unchanged: usize) {
    assert_eq!(
        (report.inserted, report.updated, report.unchanged),
        (inserted, updated, unchanged),
        "Unexpected (inserted, updated, unchanged) for batch {} with outcome {:?}",
        report.batch_id,
        report.outcome
    );
}

/// Asserts two stored portfolios hold the same records, ignoring timestamps
pub fn assert_same_records(actual: &[StoredPolicy], expected: &[StoredPolicy]) {
    let records = |policies: &[StoredPolicy]| -> Vec<PolicyRecord> {
        policies.iter().map(|p| p.record.clone()).collect()
    };
    assert_eq!(records(actual), records(expected), "Stored records differ");
}

/// Asserts that every policy number appears at most once
pub fn assert_unique_policy_numbers(policies: &[StoredPolicy]) {
    let mut seen = std::collections::HashSet::new();
    for policy in policies {
        assert!(
            seen.insert(&policy.record.policy_number),
            "Policy number {} is stored more than once",
            policy.record.policy_number
        );
    }
}

/// Asserts that a result is Ok and returns the value
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("{}: {:?}", $msg, e),
        }
    };
}

/// Asserts that a result is Err and returns the error
#[macro_export]
macro_rules! assert_err {
    ($result:expr) => {
        match $result {
            Ok(value) => panic!("Expected Err, got Ok: {:?}", value),
            Err(e) => e,
        }
    };
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(value) => panic!("{}: got Ok({:?})", $msg, value),
            Err(e) => e,
        }
    };
}

/// Asserts that an error matches a specific variant
#[macro_export]
macro_rules! assert_err_variant {
    ($result:expr, $pattern:pat) => {
        match $result {
            Ok(value) => panic!("Expected Err matching {}, got Ok({:?})", stringify!($pattern), value),
            Err(ref e) => {
                assert!(
                    matches!(e, $pattern),
                    "Error {:?} does not match pattern {}",
                    e,
                    stringify!($pattern)
                );
            }
        }
    };
}
