//! Pre-built Test Fixtures
//!
//! Ready-to-use uploads, records and claims. The reference portfolio is the
//! worked example used throughout the test suite:
//!
//! | policy | country | premium | claims (paid + reserve) |
//! |--------|---------|---------|-------------------------|
//! | SA-001 | SA      | 100,000 | 40,000 + 20,000         |
//! | BH-001 | BH      |  50,000 | none                    |
//!
//! giving a loss ratio of 0.40 and, with the default 0.15 expense load, a
//! combined ratio of 0.46.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use core_kernel::TenantId;
use domain_portfolio::{ClaimRecord, InsuranceType, LineOfBusiness, PolicyRecord, RawRow};

/// Fixture for tenant identifiers
pub struct TenantFixtures;

impl TenantFixtures {
    /// A fixed tenant, stable across runs
    pub fn acme() -> TenantId {
        TenantId::from_uuid(Uuid::from_u128(0x0190_c5d2_0000_7000_8000_0000_0000_0001))
    }

    /// A second fixed tenant for isolation tests
    pub fn globex() -> TenantId {
        TenantId::from_uuid(Uuid::from_u128(0x0190_c5d2_0000_7000_8000_0000_0000_0002))
    }
}

/// Fixture for raw upload rows
pub struct RawRowFixtures;

impl RawRowFixtures {
    /// `{"Policy Number": "P-100", "Premium": "12,000", "Country": "SA"}`
    pub fn p100() -> RawRow {
        RawRow::new()
            .with("Policy Number", "P-100")
            .with("Premium", "12,000")
            .with("Country", "SA")
    }

    /// A fully populated row using alternative header spellings
    pub fn fully_populated() -> RawRow {
        RawRow::new()
            .with("PolicyNo", "MTR-2024-0042")
            .with("Insured", "Gulf Logistics W.L.L.")
            .with("Gross Premium", 8_750.5)
            .with("CCY", "BHD")
            .with("Inception Date", "2024-01-01")
            .with("Expiry Date", "2024-12-31")
            .with("LOB", "Auto")
            .with("Country", "Bahrain")
            .with("Insurance Type", "Takaful")
            .with("Policy Status", "In Force")
    }

    /// A row without a policy number
    pub fn missing_policy_number() -> RawRow {
        RawRow::new().with("Premium", "500").with("Country", "BH")
    }

    /// A row with a negative premium
    pub fn negative_premium() -> RawRow {
        RawRow::new()
            .with("Policy Number", "NEG-1")
            .with("Premium", "-250")
            .with("Country", "BH")
    }

    /// The reference portfolio as an upload
    pub fn reference_upload() -> Vec<RawRow> {
        vec![
            RawRow::new()
                .with("Policy Number", "SA-001")
                .with("Premium", "100,000")
                .with("Country", "SA")
                .with("Line of Business", "Motor"),
            RawRow::new()
                .with("Policy Number", "BH-001")
                .with("Premium", "50,000")
                .with("Country", "BH")
                .with("Line of Business", "Medical")
                .with("Type", "Takaful"),
        ]
    }

    /// Ten valid rows `B-01` to `B-10` with premiums 1,000 to 10,000
    pub fn ten_row_batch() -> Vec<RawRow> {
        (1..=10)
            .map(|i| {
                RawRow::new()
                    .with("Policy Number", format!("B-{:02}", i))
                    .with("Premium", i * 1_000)
                    .with("Country", "KW")
            })
            .collect()
    }
}

/// Fixture for canonical records and claims
pub struct PortfolioFixtures;

impl PortfolioFixtures {
    /// The reference portfolio's policies
    pub fn reference_policies(tenant_id: TenantId) -> Vec<PolicyRecord> {
        let mut sa = PolicyRecord::new(tenant_id, "SA-001", dec!(100000), "SA");
        sa.line_of_business = LineOfBusiness::Motor;

        let mut bh = PolicyRecord::new(tenant_id, "BH-001", dec!(50000), "BH");
        bh.line_of_business = LineOfBusiness::Medical;
        bh.insurance_type = InsuranceType::Takaful;

        vec![sa, bh]
    }

    /// The reference portfolio's claims: 60,000 incurred against SA-001
    pub fn reference_claims(tenant_id: TenantId) -> Vec<ClaimRecord> {
        vec![ClaimRecord::new(tenant_id, "SA-001", dec!(40000), dec!(20000))]
    }

    pub fn reference_loss_ratio() -> Decimal {
        dec!(0.40)
    }

    pub fn reference_combined_ratio() -> Decimal {
        dec!(0.46)
    }
}
