//! Type-safe money representation using decimal arithmetic.
//!
//! Catalog prices are stored in the currency's standard unit (dollars, cedis)
//! as [`Decimal`]. Payment providers want integer minor units (cents,
//! pesewas), so conversion lives here with the rounding rule in one place.

use core::fmt;
use core::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// An amount with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// Amount in the currency's standard unit (e.g., dollars, not cents).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency: CurrencyCode,
}

impl Money {
    /// Create a new amount.
    #[must_use]
    pub const fn new(amount: Decimal, currency: CurrencyCode) -> Self {
        Self { amount, currency }
    }

    /// Format for display, e.g. `₵90.00`.
    #[must_use]
    pub fn display(&self) -> String {
        format!("{}{:.2}", self.currency.symbol(), self.amount)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// Round a standard-unit amount to cents, half away from zero.
#[must_use]
pub fn round_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert a standard-unit amount to integer minor units (x100, rounded).
///
/// Returns `None` if the result does not fit in an `i64`.
#[must_use]
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

/// Error returned when parsing an unsupported currency code.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unsupported currency code: {0}")]
pub struct UnknownCurrency(pub String);

/// ISO 4217 currency codes accepted by the storefront and its providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    USD,
    GHS,
    NGN,
    ZAR,
    KES,
    EUR,
    GBP,
    CAD,
    AUD,
}

impl CurrencyCode {
    /// Display symbol used in receipts and order history.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::USD | Self::CAD | Self::AUD => "$",
            Self::GHS => "₵",
            Self::NGN => "₦",
            Self::ZAR => "R",
            Self::KES => "KSh",
            Self::EUR => "€",
            Self::GBP => "£",
        }
    }

    /// Upper-case ISO code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::USD => "USD",
            Self::GHS => "GHS",
            Self::NGN => "NGN",
            Self::ZAR => "ZAR",
            Self::KES => "KES",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
            Self::CAD => "CAD",
            Self::AUD => "AUD",
        }
    }

    /// Lower-case ISO code, as the card network expects it.
    #[must_use]
    pub fn code_lowercase(&self) -> String {
        self.code().to_ascii_lowercase()
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for CurrencyCode {
    type Err = UnknownCurrency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USD" => Ok(Self::USD),
            "GHS" => Ok(Self::GHS),
            "NGN" => Ok(Self::NGN),
            "ZAR" => Ok(Self::ZAR),
            "KES" => Ok(Self::KES),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            "CAD" => Ok(Self::CAD),
            "AUD" => Ok(Self::AUD),
            _ => Err(UnknownCurrency(s.to_string())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn test_symbols_for_display() {
        assert_eq!(CurrencyCode::GHS.symbol(), "₵");
        assert_eq!(CurrencyCode::NGN.symbol(), "₦");
        assert_eq!(CurrencyCode::USD.symbol(), "$");
    }

    #[test]
    fn test_money_display_two_places() {
        let money = Money::new(Decimal::new(90, 0), CurrencyCode::GHS);
        assert_eq!(money.display(), "₵90.00");
    }

    #[test]
    fn test_minor_units_rounds_half_away_from_zero() {
        assert_eq!(to_minor_units(Decimal::new(1999, 2)), Some(1999));
        assert_eq!(to_minor_units(Decimal::new(10_005, 3)), Some(1001));
        assert_eq!(to_minor_units(Decimal::new(50, 0)), Some(5000));
    }

    #[test]
    fn test_parse_currency_case_insensitive() {
        assert_eq!("ghs".parse::<CurrencyCode>().unwrap(), CurrencyCode::GHS);
        assert!("XYZ".parse::<CurrencyCode>().is_err());
    }
}
