//! Type-safe money representation using decimal arithmetic.
//!
//! Prices travel through the system as decimals in the currency's standard
//! unit (dollars, not cents). The payment provider wants integer amounts in
//! the smallest currency unit, so every conversion goes through
//! [`Money::to_minor_units`], which rounds half away from zero:
//! `45.995 USD` becomes `4600` cents and `-0.005 USD` becomes `-1`.

use core::fmt;
use core::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Errors that can occur when converting money amounts.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// The amount does not fit in an `i64` once scaled to minor units.
    #[error("amount {0} is out of range for minor units")]
    Overflow(Decimal),
    /// The currency code is not supported.
    #[error("unsupported currency code: {0}")]
    UnsupportedCurrency(String),
}

/// A monetary amount with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// Amount in the currency's standard unit (e.g., dollars, not cents).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Money {
    /// Create a new amount.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// Create an amount from minor units (e.g., `4599` cents → `45.99`).
    #[must_use]
    pub fn from_minor_units(minor: i64, currency_code: CurrencyCode) -> Self {
        Self {
            amount: Decimal::new(minor, currency_code.minor_unit_exponent()),
            currency_code,
        }
    }

    /// Convert to the smallest currency unit, rounding half away from zero.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] if the scaled amount does not fit in
    /// an `i64`.
    pub fn to_minor_units(&self) -> Result<i64, MoneyError> {
        let scale = Decimal::from(10_i64.pow(self.currency_code.minor_unit_exponent()));
        self.amount
            .checked_mul(scale)
            .map(|scaled| scaled.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
            .and_then(|rounded| rounded.to_i64())
            .ok_or(MoneyError::Overflow(self.amount))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dp = self.currency_code.minor_unit_exponent();
        write!(
            f,
            "{} {}",
            self.amount
                .round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero),
            self.currency_code
        )
    }
}

/// ISO 4217 currency codes accepted for checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
    GBP,
    CAD,
    AUD,
    /// Zero-decimal currency.
    JPY,
}

impl CurrencyCode {
    /// Number of decimal places between the standard and the minor unit.
    #[must_use]
    pub const fn minor_unit_exponent(self) -> u32 {
        match self {
            Self::JPY => 0,
            Self::USD | Self::EUR | Self::GBP | Self::CAD | Self::AUD => 2,
        }
    }

    /// Lowercase code as the payment provider expects it.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::USD => "usd",
            Self::EUR => "eur",
            Self::GBP => "gbp",
            Self::CAD => "cad",
            Self::AUD => "aud",
            Self::JPY => "jpy",
        }
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_ascii_uppercase())
    }
}

impl FromStr for CurrencyCode {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "usd" => Ok(Self::USD),
            "eur" => Ok(Self::EUR),
            "gbp" => Ok(Self::GBP),
            "cad" => Ok(Self::CAD),
            "aud" => Ok(Self::AUD),
            "jpy" => Ok(Self::JPY),
            other => Err(MoneyError::UnsupportedCurrency(other.to_string())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn usd(amount: Decimal) -> Money {
        Money::new(amount, CurrencyCode::USD)
    }

    #[test]
    fn test_to_minor_units_exact() {
        assert_eq!(usd(Decimal::new(4599, 2)).to_minor_units().unwrap(), 4599);
        assert_eq!(usd(Decimal::new(10, 0)).to_minor_units().unwrap(), 1000);
    }

    #[test]
    fn test_to_minor_units_rounds_half_away_from_zero() {
        // 45.995 -> 4599.5 -> 4600
        assert_eq!(usd(Decimal::new(45995, 3)).to_minor_units().unwrap(), 4600);
        // 45.994 -> 4599.4 -> 4599
        assert_eq!(usd(Decimal::new(45994, 3)).to_minor_units().unwrap(), 4599);
        // 0.125 -> 12.5 -> 13 (banker's rounding would give 12)
        assert_eq!(usd(Decimal::new(125, 3)).to_minor_units().unwrap(), 13);
        // -0.005 -> -0.5 -> -1
        assert_eq!(usd(Decimal::new(-5, 3)).to_minor_units().unwrap(), -1);
    }

    #[test]
    fn test_zero_decimal_currency() {
        let yen = Money::new(Decimal::new(15005, 1), CurrencyCode::JPY);
        assert_eq!(yen.to_minor_units().unwrap(), 1501);
    }

    #[test]
    fn test_overflow() {
        let huge = usd(Decimal::MAX);
        assert!(matches!(huge.to_minor_units(), Err(MoneyError::Overflow(_))));
    }

    #[test]
    fn test_from_minor_units() {
        let money = Money::from_minor_units(4599, CurrencyCode::USD);
        assert_eq!(money.amount, Decimal::new(4599, 2));
        assert_eq!(money.to_string(), "45.99 USD");
    }

    #[test]
    fn test_currency_parse() {
        assert_eq!("USD".parse::<CurrencyCode>().unwrap(), CurrencyCode::USD);
        assert_eq!(" eur ".parse::<CurrencyCode>().unwrap(), CurrencyCode::EUR);
        assert!("xyz".parse::<CurrencyCode>().is_err());
        assert_eq!(serde_json::to_string(&CurrencyCode::GBP).unwrap(), "\"gbp\"");
    }
}
