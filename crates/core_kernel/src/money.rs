//! Currencies and reporting-currency conversion
//!
//! Uploaded premiums arrive in whatever currency the insurer books in. All
//! aggregates are computed in a single reporting currency, so every amount
//! passes through [`ExchangeRates::to_reporting`] during normalization.
//! Amounts use rust_decimal for precise arithmetic without floating-point errors.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Currency codes following ISO 4217
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    USD,
    EUR,
    GBP,
    BHD,
    SAR,
    AED,
    KWD,
    OMR,
    QAR,
}

impl Currency {
    /// Returns the number of decimal places for this currency
    pub fn decimal_places(&self) -> u32 {
        match self {
            Currency::BHD | Currency::KWD | Currency::OMR => 3,
            _ => 2,
        }
    }

    /// Returns the ISO 4217 code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
            Currency::BHD => "BHD",
            Currency::SAR => "SAR",
            Currency::AED => "AED",
            Currency::KWD => "KWD",
            Currency::OMR => "OMR",
            Currency::QAR => "QAR",
        }
    }

    /// All supported currencies
    pub fn all() -> &'static [Currency] {
        &[
            Currency::USD,
            Currency::EUR,
            Currency::GBP,
            Currency::BHD,
            Currency::SAR,
            Currency::AED,
            Currency::KWD,
            Currency::OMR,
            Currency::QAR,
        ]
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Currency {
    type Err = MoneyError;

    /// Parses an ISO code, ignoring case and surrounding whitespace
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();
        Currency::all()
            .iter()
            .copied()
            .find(|c| c.code() == code)
            .ok_or_else(|| MoneyError::UnsupportedCurrency(s.trim().to_string()))
    }
}

/// Errors that can occur during money operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    #[error("No exchange rate configured for {0}")]
    MissingRate(Currency),

    #[error("Invalid exchange rate for {currency}: {rate}")]
    InvalidRate { currency: Currency, rate: Decimal },

    /// The converted amount does not fit in a decimal
    #[error("Converting {amount} {from} overflows")]
    Overflow { amount: Decimal, from: Currency },
}

/// Exchange rate table used to normalize amounts into the reporting currency
///
/// Rates are held as USD per one unit of each currency; conversions between
/// two non-USD currencies go through the USD cross rate. Converted amounts are
/// rounded to 4 decimal places. Amounts already in the reporting currency are
/// returned untouched.
///
/// # Example
///
/// ```rust
/// use core_kernel::{Currency, ExchangeRates};
/// use rust_decimal_macros::dec;
///
/// let rates = ExchangeRates::gcc_pegs(Currency::USD);
/// let usd = rates.to_reporting(dec!(3750), Currency::SAR).unwrap();
/// assert_eq!(usd, dec!(1000));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRates {
    reporting: Currency,
    usd_per_unit: BTreeMap<Currency, Decimal>,
}

impl ExchangeRates {
    /// Creates an empty table; only the reporting currency itself converts
    pub fn new(reporting: Currency) -> Self {
        let mut usd_per_unit = BTreeMap::new();
        usd_per_unit.insert(Currency::USD, dec!(1));
        Self {
            reporting,
            usd_per_unit,
        }
    }

    /// Creates a table seeded with the GCC central-bank USD pegs
    pub fn gcc_pegs(reporting: Currency) -> Self {
        Self::new(reporting)
            .with_rate(Currency::BHD, dec!(1) / dec!(0.376))
            .with_rate(Currency::SAR, dec!(1) / dec!(3.75))
            .with_rate(Currency::AED, dec!(1) / dec!(3.6725))
            .with_rate(Currency::OMR, dec!(1) / dec!(0.3845))
            .with_rate(Currency::QAR, dec!(1) / dec!(3.64))
            // KWD floats against a basket; override in config
            .with_rate(Currency::KWD, dec!(3.25))
    }

    /// Sets the USD value of one unit of `currency`
    pub fn with_rate(mut self, currency: Currency, usd_per_unit: Decimal) -> Self {
        self.usd_per_unit.insert(currency, usd_per_unit);
        self
    }

    /// Returns the reporting currency
    pub fn reporting(&self) -> Currency {
        self.reporting
    }

    /// Checks that every configured rate is positive and the reporting
    /// currency itself is priced
    pub fn validate(&self) -> Result<(), MoneyError> {
        for (currency, rate) in &self.usd_per_unit {
            if *rate <= Decimal::ZERO {
                return Err(MoneyError::InvalidRate {
                    currency: *currency,
                    rate: *rate,
                });
            }
        }
        if !self.usd_per_unit.contains_key(&self.reporting) {
            return Err(MoneyError::MissingRate(self.reporting));
        }
        Ok(())
    }

    /// Converts an amount in `from` into the reporting currency
    ///
    /// # Errors
    ///
    /// Returns `MissingRate` or `InvalidRate` when either side is not priced,
    /// and `Overflow` when the converted amount exceeds the decimal range.
    pub fn to_reporting(&self, amount: Decimal, from: Currency) -> Result<Decimal, MoneyError> {
        if from == self.reporting {
            return Ok(amount);
        }

        let from_rate = self.rate(from)?;
        let to_rate = self.rate(self.reporting)?;
        amount
            .checked_mul(from_rate)
            .and_then(|usd| usd.checked_div(to_rate))
            .map(|converted| converted.round_dp(4))
            .ok_or(MoneyError::Overflow { amount, from })
    }

    fn rate(&self, currency: Currency) -> Result<Decimal, MoneyError> {
        match self.usd_per_unit.get(&currency) {
            Some(rate) if *rate > Decimal::ZERO => Ok(*rate),
            Some(rate) => Err(MoneyError::InvalidRate {
                currency,
                rate: *rate,
            }),
            None => Err(MoneyError::MissingRate(currency)),
        }
    }
}

impl Default for ExchangeRates {
    fn default() -> Self {
        Self::gcc_pegs(Currency::USD)
    }
}
