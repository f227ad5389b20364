//! Schema Normalizer and Batch Validator Tests
//!
//! # Test Organization
//!
//! - `alias_tests` - Header resolution across export dialects
//! - `field_tests` - Per-field parsing and defaults
//! - `defect_tests` - Hard row defects
//! - `batch_tests` - Whole-upload partitioning and duplicates
//! - `property_tests` - proptest invariants over generated rows

use chrono::NaiveDate;
use core_kernel::{Currency, ExchangeRates, TenantId};
use domain_portfolio::{
    AliasTable, BatchValidator, CanonicalField, DuplicateResolution, InsuranceType,
    LineOfBusiness, NormalizationDefect, PipelineConfig, PolicyStatus, RawRow, SchemaNormalizer,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;

fn normalizer() -> SchemaNormalizer {
    SchemaNormalizer::new(PipelineConfig::default()).expect("default config is valid")
}

// ============================================================================
// ALIAS TESTS
// ============================================================================

mod alias_tests {
    use super::*;

    /// Verifies snake_case exports resolve through the default aliases
    #[test]
    fn test_snake_case_export() {
        let row: RawRow = serde_json::from_value(json!({
            "policy_number": "SNK-1",
            "premium": 900,
            "effective_date": "2024-01-01",
            "expiration_date": "2024-12-31",
            "line_of_business": "motor",
            "country": "ae",
            "insurance_type": "takaful"
        }))
        .unwrap();

        let record = normalizer().normalize(&row, TenantId::new()).unwrap();

        assert_eq!(record.policy_number, "SNK-1");
        assert_eq!(record.premium, dec!(900));
        assert_eq!(record.country, "AE");
        assert_eq!(record.line_of_business, LineOfBusiness::Motor);
        assert_eq!(record.insurance_type, InsuranceType::Takaful);
        assert_eq!(record.effective_date, NaiveDate::from_ymd_opt(2024, 1, 1));
    }

    /// Verifies a custom alias table replaces the default header names
    #[test]
    fn test_custom_alias_table() {
        let aliases = AliasTable::default().with_aliases(CanonicalField::PolicyNumber, ["Contract Ref"]);
        let normalizer = SchemaNormalizer::new(PipelineConfig::default().with_aliases(aliases)).unwrap();

        let row = RawRow::new().with("Contract Ref", "CR-7").with("Premium", "10");
        assert_eq!(normalizer.normalize(&row, TenantId::new()).unwrap().policy_number, "CR-7");

        let old_header = RawRow::new().with("Policy Number", "P-1");
        assert_eq!(
            normalizer.normalize(&old_header, TenantId::new()),
            Err(NormalizationDefect::MissingPolicyNumber)
        );
    }

    /// Verifies an empty alias list is refused at startup
    #[test]
    fn test_empty_alias_list_is_fatal() {
        let aliases = AliasTable::default().with_aliases(CanonicalField::Country, Vec::<String>::new());
        let err = SchemaNormalizer::new(PipelineConfig::default().with_aliases(aliases)).unwrap_err();
        assert!(err.is_fatal());
    }

    /// Verifies that of two columns for the same field, the earlier one in the file wins
    #[test]
    fn test_repeated_header_resolves_in_file_order() {
        let row: RawRow = serde_json::from_str(
            r#"{"Policy Number": "ORD-1", "premium": "200", "Premium": "100"}"#,
        )
        .unwrap();

        let record = normalizer().normalize(&row, TenantId::new()).unwrap();

        assert_eq!(record.premium, dec!(200));
    }
}

// ============================================================================
// FIELD TESTS
// ============================================================================

mod field_tests {
    use super::*;

    /// Verifies defaults for absent optional columns
    #[test]
    fn test_defaults() {
        let row = RawRow::new().with("Policy Number", "P-1");
        let record = normalizer().normalize(&row, TenantId::new()).unwrap();

        assert_eq!(record.premium, Decimal::ZERO);
        assert_eq!(record.country, "BH");
        assert_eq!(record.insurance_type, InsuranceType::Conventional);
        assert_eq!(record.status, PolicyStatus::Active);
        assert_eq!(record.line_of_business, LineOfBusiness::Unspecified);
        assert_eq!(record.insured_name, None);
        assert_eq!(record.effective_date, None);
    }

    /// Verifies the configured default country is used
    #[test]
    fn test_configured_default_country() {
        let normalizer = SchemaNormalizer::new(PipelineConfig::default().with_default_country("KW")).unwrap();
        let record = normalizer
            .normalize(&RawRow::new().with("Policy Number", "P-1"), TenantId::new())
            .unwrap();
        assert_eq!(record.country, "KW");
    }

    /// Verifies an unparsable premium is read as zero rather than rejected
    #[test]
    fn test_unparsable_premium_is_zero() {
        let row = RawRow::new().with("Policy Number", "P-1").with("Premium", "TBC");
        assert_eq!(normalizer().normalize(&row, TenantId::new()).unwrap().premium, Decimal::ZERO);
    }

    /// Verifies currency symbols are not stripped: only separators are
    #[test]
    fn test_currency_symbol_premium_is_zero() {
        let symbol = RawRow::new().with("Policy Number", "P-1").with("Premium", "$12,000");
        let plain = RawRow::new().with("Policy Number", "P-2").with("Premium", " 12,000 ");
        assert_eq!(normalizer().normalize(&symbol, TenantId::new()).unwrap().premium, Decimal::ZERO);
        assert_eq!(normalizer().normalize(&plain, TenantId::new()).unwrap().premium, dec!(12000));
    }

    /// Verifies numeric policy numbers are stringified without a decimal point
    #[test]
    fn test_numeric_policy_number() {
        let row = RawRow::new().with("PolicyNo", json!(100245.0)).with("Premium", 1);
        assert_eq!(normalizer().normalize(&row, TenantId::new()).unwrap().policy_number, "100245");
    }

    /// Verifies an unparsable date is absent and does not reject the row
    #[test]
    fn test_unparsable_date_is_absent() {
        let row = RawRow::new()
            .with("Policy Number", "P-1")
            .with("Effective Date", "next Tuesday")
            .with("Expiration Date", "2025-06-30");
        let record = normalizer().normalize(&row, TenantId::new()).unwrap();
        assert_eq!(record.effective_date, None);
        assert_eq!(record.expiration_date, NaiveDate::from_ymd_opt(2025, 6, 30));
    }

    /// Verifies spreadsheet serial dates are converted
    #[test]
    fn test_serial_dates() {
        let row = RawRow::new()
            .with("Policy Number", "P-1")
            .with("Inception Date", 45292)
            .with("Expiry Date", 45657);
        let record = normalizer().normalize(&row, TenantId::new()).unwrap();
        assert_eq!(record.effective_date, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(record.expiration_date, NaiveDate::from_ymd_opt(2024, 12, 31));
    }

    /// Verifies premiums are converted into a non-USD reporting currency
    #[test]
    fn test_reporting_currency_conversion() {
        let config = PipelineConfig::default().with_exchange_rates(ExchangeRates::gcc_pegs(Currency::BHD));
        let normalizer = SchemaNormalizer::new(config).unwrap();

        let row = RawRow::new()
            .with("Policy Number", "P-1")
            .with("Premium", "1,000")
            .with("Currency", "USD");
        assert_eq!(normalizer.normalize(&row, TenantId::new()).unwrap().premium, dec!(376));

        let same = RawRow::new()
            .with("Policy Number", "P-2")
            .with("Premium", "123.4567891")
            .with("Currency", "BHD");
        assert_eq!(normalizer.normalize(&same, TenantId::new()).unwrap().premium, dec!(123.4567891));
    }
}

// ============================================================================
// DEFECT TESTS
// ============================================================================

mod defect_tests {
    use super::*;

    /// Verifies each hard defect is reported with its code
    #[test]
    fn test_hard_defects() {
        let cases = vec![
            (RawRow::new().with("Premium", "10"), "missing_policy_number"),
            (RawRow::new().with("Policy Number", "").with("Premium", "10"), "missing_policy_number"),
            (RawRow::new().with("Policy Number", "P").with("Premium", "-10"), "negative_premium"),
            (RawRow::new().with("Policy Number", "P").with("Currency", "XAU"), "unsupported_currency"),
            (RawRow::new().with("Policy Number", "P").with("Country", "Atlantis"), "invalid_country"),
            (RawRow::new().with("Policy Number", "P").with("Type", "mutual"), "unknown_insurance_type"),
            (RawRow::new().with("Policy Number", "P").with("Status", "pending"), "unknown_status"),
            (
                RawRow::new()
                    .with("Policy Number", "P")
                    .with("Effective Date", "2024-06-01")
                    .with("Expiration Date", "2024-05-31"),
                "expiration_before_effective",
            ),
        ];

        for (row, code) in cases {
            let defect = normalizer().normalize(&row, TenantId::new()).unwrap_err();
            assert_eq!(defect.code(), code, "row {:?}", row);
        }
    }

    /// Verifies a premium too large to convert rejects only its own row
    #[test]
    fn test_premium_out_of_range_rejects_one_row() {
        let validator = BatchValidator::new(normalizer());
        let rows = vec![
            RawRow::new().with("Policy Number", "P-1").with("Premium", "1000").with("Currency", "KWD"),
            RawRow::new()
                .with("Policy Number", "P-2")
                .with("Premium", "70,000,000,000,000,000,000,000,000,000")
                .with("Currency", "KWD"),
            RawRow::new().with("Policy Number", "P-3").with("Premium", "79228162514264337593543950335"),
        ];

        let result = validator.validate(&rows, TenantId::new());

        assert_eq!(result.summary.accepted, 2);
        assert_eq!(result.rejected.len(), 1);
        assert_eq!(result.rejected[0].defect.code(), "premium_out_of_range");
        assert_eq!(result.accepted[1].premium, Decimal::MAX);
    }

    /// Verifies exponents past the decimal range are read leniently as zero
    #[test]
    fn test_huge_scientific_premium_is_not_a_panic() {
        let row = RawRow::new().with("Policy Number", "P-1").with("Premium", "9e40");
        assert_eq!(normalizer().normalize(&row, TenantId::new()).unwrap().premium, Decimal::ZERO);
    }

    /// Verifies a policy that starts and ends on the same day is accepted
    #[test]
    fn test_same_day_term_is_accepted() {
        let row = RawRow::new()
            .with("Policy Number", "P")
            .with("Effective Date", "2024-06-01")
            .with("Expiration Date", "06/01/2024");
        assert!(normalizer().normalize(&row, TenantId::new()).is_ok());
    }
}

// ============================================================================
// BATCH TESTS
// ============================================================================

mod batch_tests {
    use super::*;

    /// Verifies the later duplicate's premium wins by default
    #[test]
    fn test_duplicate_later_row_wins() {
        let validator = BatchValidator::new(normalizer());
        let rows = vec![
            RawRow::new().with("Policy Number", "P-1").with("Premium", "100"),
            RawRow::new().with("Policy Number", "P-1").with("Premium", "200"),
        ];

        let result = validator.validate(&rows, TenantId::new());

        assert_eq!(result.accepted.len(), 1);
        assert_eq!(result.accepted[0].premium, dec!(200));
        assert_eq!(result.summary.superseded, 1);
    }

    /// Verifies the summary counts always add up to the row count
    #[test]
    fn test_summary_counts_add_up() {
        let config = PipelineConfig::default().with_duplicate_resolution(DuplicateResolution::Reject);
        let validator = BatchValidator::new(SchemaNormalizer::new(config).unwrap());
        let rows = vec![
            RawRow::new().with("Policy Number", "P-1").with("Premium", "1"),
            RawRow::new().with("Policy Number", "P-1").with("Premium", "2"),
            RawRow::new().with("Premium", "3"),
            RawRow::new().with("Policy Number", "P-2").with("Premium", "4"),
        ];

        let summary = validator.validate(&rows, TenantId::new()).summary;
        assert_eq!(summary.row_count, 4);
        assert_eq!(summary.accepted + summary.rejected + summary.superseded, summary.row_count);
        assert_eq!(summary.rejected, 2);
    }
}

// ============================================================================
// PROPERTY TESTS
// ============================================================================

mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn thousands(amount: u64) -> String {
        let digits = amount.to_string();
        let mut out = String::new();
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                out.push(',');
            }
            out.push(c);
        }
        out
    }

    proptest! {
        /// A non-empty policy number with a non-negative premium is always
        /// accepted and the premium is kept exactly
        #[test]
        fn valid_rows_are_accepted_exactly(
            number in "[A-Z]{1,3}-[0-9]{1,6}",
            units in 0u64..10_000_000_000u64,
            cents in 0u64..100u64,
        ) {
            let text = format!("{}.{:02}", thousands(units), cents);
            let row = RawRow::new().with("Policy Number", number.clone()).with("Premium", text);
            let record = normalizer().normalize(&row, TenantId::new()).unwrap();

            let expected = Decimal::from(units) + Decimal::new(cents as i64, 2);
            prop_assert_eq!(record.premium, expected);
            prop_assert_eq!(record.policy_number, number);
        }

        /// Blank policy numbers are always a defect regardless of other cells
        #[test]
        fn blank_policy_number_is_rejected(
            blank in "[ \t]{0,4}",
            premium in 0u32..1_000_000u32,
        ) {
            let row = RawRow::new().with("Policy Number", blank).with("Premium", premium);
            prop_assert_eq!(
                normalizer().normalize(&row, TenantId::new()),
                Err(NormalizationDefect::MissingPolicyNumber)
            );
        }

        /// Any digit string in any supported currency normalizes or is
        /// rejected with a defect; it never panics
        #[test]
        fn extreme_premiums_never_panic(
            digits in "[0-9]{1,29}",
            currency in prop::sample::select(Currency::all().to_vec()),
        ) {
            let row = RawRow::new()
                .with("Policy Number", "P-1")
                .with("Premium", digits)
                .with("Currency", currency.code());
            match normalizer().normalize(&row, TenantId::new()) {
                Ok(record) => prop_assert!(record.premium >= Decimal::ZERO),
                Err(defect) => {
                    let expected_defect = matches!(
                        defect,
                        NormalizationDefect::PremiumOutOfRange { .. } | NormalizationDefect::UnsupportedCurrency { .. }
                    );
                    prop_assert!(expected_defect);
                }
            }
        }

        /// Normalization is deterministic
        #[test]
        fn normalization_is_deterministic(premium in "[0-9,]{0,12}", country in "[A-Za-z]{2}") {
            let row = RawRow::new()
                .with("Policy Number", "P-1")
                .with("Premium", premium)
                .with("Country", country);
            let tenant = TenantId::new();
            prop_assert_eq!(normalizer().normalize(&row, tenant), normalizer().normalize(&row, tenant));
        }
    }
}
