//! Order engine.
//!
//! Orders are created `pending` from a validated cart and only ever move
//! along the state machine in [`OrderStatus`]. Inventory is not touched at
//! creation: a checkout that is never completed must not hold stock. Stock
//! goes down exactly once, on the `pending -> paid` compare-and-set driven
//! by a verified provider webhook, and is floored at zero.

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, instrument, warn};

use streetmerch_core::{
    CatalogItemId, CurrencyCode, CustomerId, Email, OrderId, OrderStatus, PaymentProvider,
};

use crate::config::PricePolicy;
use crate::db::{CatalogRepository, OrderRepository, Repositories};
use crate::models::order::lines_total;
use crate::models::{
    LineSnapshot, NewOrder, Order, PaymentInfo, ProviderTransition, ShippingAddress, StatusUpdate,
};

use super::CommerceError;

/// One line of the shopper's cart, as posted by the client.
#[derive(Debug, Clone, Deserialize)]
pub struct CartLine {
    pub item_id: CatalogItemId,
    #[serde(default)]
    pub variant: Option<String>,
    pub quantity: u32,
    /// Unit price the shopper was shown.
    #[serde(default)]
    pub unit_price: Option<Decimal>,
}

/// Everything needed to record a pending order once the provider session
/// exists.
#[derive(Debug, Clone)]
pub struct PendingOrder {
    pub customer_id: Option<CustomerId>,
    pub guest_email: Option<Email>,
    /// Lines at the prices actually charged.
    pub lines: Vec<LineSnapshot>,
    /// Falls back to the configured default currency.
    pub currency: Option<CurrencyCode>,
    pub shipping_address: Option<ShippingAddress>,
    pub payment: PaymentInfo,
}

pub struct OrderEngine<'a> {
    catalog: &'a dyn CatalogRepository,
    orders: &'a dyn OrderRepository,
    price_policy: PricePolicy,
    default_currency: CurrencyCode,
}

impl<'a> OrderEngine<'a> {
    #[must_use]
    pub fn new(
        repos: &'a Repositories,
        price_policy: PricePolicy,
        default_currency: CurrencyCode,
    ) -> Self {
        Self {
            catalog: repos.catalog.as_ref(),
            orders: repos.orders.as_ref(),
            price_policy,
            default_currency,
        }
    }

    // =========================================================================
    // Order creation
    // =========================================================================

    /// Check a cart against the live catalog and snapshot it at list price.
    ///
    /// Lines are checked in order and the first failure wins. Nothing is
    /// written and no stock is reserved.
    ///
    /// # Errors
    ///
    /// - `CommerceError::Validation` for an empty cart, a zero quantity, or
    ///   (under [`PricePolicy::VerifyCatalog`]) a stale price
    /// - `CommerceError::NotFound` if an item does not exist
    /// - `CommerceError::ItemUnavailable` if an item is inactive
    /// - `CommerceError::InsufficientInventory` with the available count
    /// - `CommerceError::ExclusiveAccessDenied` if a members-only item is in
    ///   the cart and the caller has no verified identity
    #[instrument(skip(self, cart), fields(lines = cart.len()))]
    pub async fn validate_cart(
        &self,
        cart: &[CartLine],
        verified_identity: bool,
    ) -> Result<Vec<LineSnapshot>, CommerceError> {
        if cart.is_empty() {
            return Err(CommerceError::Validation("Your cart is empty".to_owned()));
        }

        let mut snapshots = Vec::with_capacity(cart.len());
        for line in cart {
            if line.quantity == 0 {
                return Err(CommerceError::Validation(
                    "Quantity must be at least 1".to_owned(),
                ));
            }

            let item = self
                .catalog
                .get(line.item_id)
                .await?
                .ok_or_else(|| CommerceError::NotFound(format!("Catalog item {}", line.item_id)))?;

            if !item.active {
                return Err(CommerceError::ItemUnavailable { name: item.name });
            }
            if i64::from(item.inventory) < i64::from(line.quantity) {
                return Err(CommerceError::InsufficientInventory {
                    name: item.name,
                    available: item.inventory,
                });
            }
            if item.exclusive && !verified_identity {
                return Err(CommerceError::ExclusiveAccessDenied { name: item.name });
            }

            let unit_price = match (self.price_policy, line.unit_price) {
                (PricePolicy::TrustCart, Some(price)) => price,
                (PricePolicy::VerifyCatalog, Some(price)) if price != item.price => {
                    return Err(CommerceError::Validation(format!(
                        "The price of {} has changed. Refresh your cart and try again.",
                        item.name
                    )));
                }
                _ => item.price,
            };

            snapshots.push(LineSnapshot {
                item_id: item.id,
                name: item.name,
                unit_price,
                quantity: line.quantity,
                variant: line.variant.clone().filter(|v| !v.is_empty()),
                image_url: item.image_url,
            });
        }
        Ok(snapshots)
    }

    /// Record a pending order. The total is the sum of the line snapshots.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Validation` if neither a customer nor a guest
    /// email identifies the buyer.
    #[instrument(skip(self, pending), fields(provider = %pending.payment.provider))]
    pub async fn create_pending(&self, pending: PendingOrder) -> Result<Order, CommerceError> {
        if pending.customer_id.is_none() && pending.guest_email.is_none() {
            return Err(CommerceError::Validation(
                "An email address is required to place an order".to_owned(),
            ));
        }
        if pending.lines.is_empty() {
            return Err(CommerceError::Validation("Your cart is empty".to_owned()));
        }

        let order = self
            .orders
            .insert(NewOrder {
                customer_id: pending.customer_id,
                total: lines_total(&pending.lines),
                lines: pending.lines,
                guest_email: pending.guest_email,
                currency: pending.currency.unwrap_or(self.default_currency),
                shipping_address: pending.shipping_address,
                payment: pending.payment,
            })
            .await?;

        info!(order_id = %order.id, total = %order.total, "Pending order created");
        Ok(order)
    }

    // =========================================================================
    // Provider-driven transitions
    // =========================================================================

    /// Move the order for `reference` from `pending` to `paid` and take its
    /// lines out of inventory.
    ///
    /// Safe to call any number of times for the same reference: only the call
    /// that wins the compare-and-set decrements stock, and later calls return
    /// [`ProviderTransition::Unchanged`]. The status change and the stock
    /// change commit together, so a failed call leaves the order `pending`
    /// for the provider's retry.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Repository` on database failure.
    #[instrument(skip(self, charge_id))]
    pub async fn mark_paid_by_reference(
        &self,
        provider: PaymentProvider,
        reference: &str,
        charge_id: Option<&str>,
    ) -> Result<ProviderTransition, CommerceError> {
        let outcome = self
            .orders
            .settle_paid_by_reference(provider, reference, charge_id)
            .await?;

        match &outcome {
            ProviderTransition::Transitioned(order) => {
                info!(order_id = %order.id, lines = order.lines.len(), "Order marked paid, inventory decremented");
            }
            ProviderTransition::Unchanged(order) => {
                info!(order_id = %order.id, status = %order.status, "Order already settled, payment event ignored");
            }
            ProviderTransition::NotFound => {
                warn!(provider = %provider, reference, "No order for payment reference");
            }
        }
        Ok(outcome)
    }

    /// Move the order for `reference` from `pending` to `cancelled`. Nothing
    /// was reserved, so inventory is untouched.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Repository` on database failure.
    #[instrument(skip(self))]
    pub async fn mark_cancelled_by_reference(
        &self,
        provider: PaymentProvider,
        reference: &str,
    ) -> Result<ProviderTransition, CommerceError> {
        let outcome = self
            .orders
            .cancel_by_reference(provider, reference)
            .await?;

        match &outcome {
            ProviderTransition::Transitioned(order) => {
                info!(order_id = %order.id, "Order cancelled by provider");
            }
            ProviderTransition::Unchanged(order) => {
                info!(order_id = %order.id, status = %order.status, "Cancellation ignored, order not pending");
            }
            ProviderTransition::NotFound => {
                warn!(provider = %provider, reference, "No order for cancelled session");
            }
        }
        Ok(outcome)
    }

    // =========================================================================
    // Operator edits and reads
    // =========================================================================

    /// Apply an operator fulfilment or refund transition.
    ///
    /// Re-submitting the current status only updates tracking and note, and
    /// only while the order is in fulfilment. Pending and terminal orders
    /// take no operator edits.
    ///
    /// # Errors
    ///
    /// - `CommerceError::NotFound` if the order does not exist
    /// - `CommerceError::InvalidTransition` if the state machine forbids it
    /// - `CommerceError::Conflict` if the order changed status concurrently
    #[instrument(skip(self, update), fields(to = %update.status))]
    pub async fn update_status(
        &self,
        id: OrderId,
        update: StatusUpdate,
    ) -> Result<Order, CommerceError> {
        let current = self.get(id).await?;
        let allowed = if current.status == update.status {
            current.status != OrderStatus::Pending && !current.status.is_terminal()
        } else {
            current.status.allows_operator_transition(update.status)
        };
        if !allowed {
            return Err(CommerceError::InvalidTransition {
                from: current.status,
                to: update.status,
            });
        }

        let updated = self
            .orders
            .update_status(id, current.status, &update)
            .await?
            .ok_or_else(|| {
                CommerceError::Conflict(format!(
                    "Order {} changed while it was being updated. Reload and try again.",
                    current.short_id()
                ))
            })?;

        info!(order_id = %id, from = %current.status, to = %updated.status, "Order status updated");
        Ok(updated)
    }

    /// # Errors
    ///
    /// Returns `CommerceError::NotFound` if the order does not exist.
    pub async fn get(&self, id: OrderId) -> Result<Order, CommerceError> {
        self.orders
            .get(id)
            .await?
            .ok_or_else(|| CommerceError::NotFound("Order".to_owned()))
    }

    /// A customer's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Repository` on database failure.
    pub async fn list_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<Order>, CommerceError> {
        Ok(self.orders.list_for_customer(customer_id).await?)
    }
}
