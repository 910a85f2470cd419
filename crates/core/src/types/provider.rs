//! Payment provider and billing cycle tags.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when parsing an unknown provider name.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown payment provider: {0}")]
pub struct UnknownProvider(pub String);

/// The two payment providers the storefront integrates with.
///
/// Stored on orders and subscription records so webhook handling can route
/// by provider without the order engine ever branching on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentProvider {
    /// Card-network processor (Stripe).
    Stripe,
    /// Regional mobile-money and card processor (Paystack).
    Paystack,
}

impl PaymentProvider {
    /// Stable machine name, used in URLs and database columns.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Stripe => "stripe",
            Self::Paystack => "paystack",
        }
    }

    /// Name shown to customers on receipts.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Stripe => "Stripe",
            Self::Paystack => "Paystack",
        }
    }
}

impl fmt::Display for PaymentProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentProvider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stripe" => Ok(Self::Stripe),
            "paystack" => Ok(Self::Paystack),
            _ => Err(UnknownProvider(s.to_string())),
        }
    }
}

/// Membership billing cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingCycle {
    Monthly,
    Annual,
}

impl BillingCycle {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Annual => "annual",
        }
    }
}

impl fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
