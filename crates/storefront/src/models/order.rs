//! Order domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use streetmerch_core::{
    CatalogItemId, CurrencyCode, CustomerId, Email, Money, OrderId, OrderStatus, PaymentProvider,
};

/// A line item captured at order creation.
///
/// Snapshots are immutable and independent of later catalog edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineSnapshot {
    pub item_id: CatalogItemId,
    pub name: String,
    /// Unit price actually charged (after any member discount).
    pub unit_price: Decimal,
    pub quantity: u32,
    /// Chosen size or variant, `None` when the item has no variants.
    #[serde(default)]
    pub variant: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl LineSnapshot {
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Sum of `unit_price * quantity` across lines.
#[must_use]
pub fn lines_total(lines: &[LineSnapshot]) -> Decimal {
    lines.iter().map(LineSnapshot::line_total).sum()
}

/// Shipping address as collected by the provider or the checkout form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub name: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    /// ISO 3166-1 alpha-2 country code.
    pub country: String,
}

/// Payment correlation block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInfo {
    pub provider: PaymentProvider,
    /// Checkout session id (Stripe) or transaction reference (Paystack).
    pub reference: String,
    /// Payment intent (Stripe) or transaction id (Paystack), set once paid.
    pub charge_id: Option<String>,
}

/// A customer order. Never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: Option<CustomerId>,
    pub guest_email: Option<Email>,
    pub lines: Vec<LineSnapshot>,
    pub status: OrderStatus,
    pub total: Decimal,
    pub currency: CurrencyCode,
    pub shipping_address: Option<ShippingAddress>,
    pub payment: Option<PaymentInfo>,
    pub tracking_number: Option<String>,
    pub admin_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Last eight characters of the id, uppercased.
    #[must_use]
    pub fn short_id(&self) -> String {
        self.id.short_id()
    }

    #[must_use]
    pub const fn total_money(&self) -> Money {
        Money::new(self.total, self.currency)
    }

    #[must_use]
    pub const fn provider(&self) -> Option<PaymentProvider> {
        match &self.payment {
            Some(payment) => Some(payment.provider),
            None => None,
        }
    }

    /// Whether this order was checked out under `(provider, reference)`.
    #[must_use]
    pub fn carries_reference(&self, provider: PaymentProvider, reference: &str) -> bool {
        self.payment
            .as_ref()
            .is_some_and(|p| p.provider == provider && p.reference == reference)
    }
}

/// A new pending order ready to insert.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_id: Option<CustomerId>,
    pub guest_email: Option<Email>,
    pub lines: Vec<LineSnapshot>,
    pub total: Decimal,
    pub currency: CurrencyCode,
    pub shipping_address: Option<ShippingAddress>,
    pub payment: PaymentInfo,
}

/// Outcome of a provider-driven compare-and-set on a pending order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderTransition {
    /// The order was pending and has now moved. Side effects should run.
    Transitioned(Order),
    /// The order exists but had already left `pending`. Nothing changed.
    Unchanged(Order),
    /// No order carries this provider reference.
    NotFound,
}

/// Operator edit of an order's fulfilment state.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub admin_note: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(price: i64, quantity: u32) -> LineSnapshot {
        LineSnapshot {
            item_id: CatalogItemId::new(1),
            name: "Box Logo Hoodie".to_string(),
            unit_price: Decimal::new(price, 2),
            quantity,
            variant: Some("M".to_string()),
            image_url: None,
        }
    }

    #[test]
    fn test_lines_total() {
        let lines = vec![line(5000, 2), line(1250, 1)];
        assert_eq!(lines_total(&lines), Decimal::new(11250, 2));
        assert_eq!(lines_total(&[]), Decimal::ZERO);
    }

    #[test]
    fn test_line_snapshot_deserialize_defaults() {
        let json = r#"{"item_id":3,"name":"Sticker","unit_price":"4.00","quantity":5}"#;
        let line: LineSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(line.variant, None);
        assert_eq!(line.line_total(), Decimal::new(2000, 2));
    }
}
