//! Status enums for orders, subscriptions and customers.
//!
//! # Order state machine
//!
//! ```text
//! pending --(provider confirms payment)--> paid
//! pending --(provider reports expiry/cancel)--> cancelled
//! paid --(operator)--> processing --(operator)--> shipped --(operator)--> delivered
//! paid|processing|shipped --(operator, refund)--> refunded
//! ```
//!
//! `cancelled`, `delivered` and `refunded` are terminal.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use super::provider::PaymentProvider;

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Paid,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 7] = [
        Self::Pending,
        Self::Paid,
        Self::Processing,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
        Self::Refunded,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }

    /// No code path leaves a terminal status.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Delivered | Self::Refunded)
    }

    /// Transitions driven by a payment provider webhook.
    #[must_use]
    pub const fn allows_provider_transition(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Paid | Self::Cancelled)
        )
    }

    /// Transitions an operator may apply by hand (fulfilment and refunds).
    #[must_use]
    pub const fn allows_operator_transition(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Paid, Self::Processing)
                | (Self::Processing, Self::Shipped)
                | (Self::Shipped, Self::Delivered)
                | (Self::Paid | Self::Processing | Self::Shipped, Self::Refunded)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("invalid order status: {s}"))
    }
}

/// Subscription status, kept verbatim from the issuing provider.
///
/// Stripe reports `active`, `trialing`, `past_due`, `canceled`, ...; Paystack
/// reports `active`, `non-renewing`, `cancelled`, ... The storefront never
/// translates these, it only asks whether a status grants member perks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionStatus(String);

impl SubscriptionStatus {
    pub const ACTIVE: &'static str = "active";
    pub const TRIALING: &'static str = "trialing";
    pub const NON_RENEWING: &'static str = "non-renewing";
    pub const CANCELLED: &'static str = "cancelled";
    pub const CANCELED: &'static str = "canceled";

    #[must_use]
    pub fn new(status: impl Into<String>) -> Self {
        Self(status.into())
    }

    #[must_use]
    pub fn active() -> Self {
        Self::new(Self::ACTIVE)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this status grants member perks for a record issued by `provider`.
    ///
    /// `active` and `trialing` entitle everywhere. Paystack's `non-renewing`
    /// still runs to the end of the paid period, so it entitles too.
    #[must_use]
    pub fn is_entitling(&self, provider: PaymentProvider) -> bool {
        match self.0.as_str() {
            Self::ACTIVE | Self::TRIALING => true,
            Self::NON_RENEWING => provider == PaymentProvider::Paystack,
            _ => false,
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubscriptionStatus {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Customer role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CustomerRole {
    #[default]
    Customer,
    Admin,
    Collaborator,
}

impl CustomerRole {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Admin => "admin",
            Self::Collaborator => "collaborator",
        }
    }
}

impl fmt::Display for CustomerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CustomerRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "admin" => Ok(Self::Admin),
            "collaborator" => Ok(Self::Collaborator),
            _ => Err(format!("invalid customer role: {s}")),
        }
    }
}
