//! Hosted checkout orchestration.
//!
//! A one-time checkout runs in this order: validate the cart, work out member
//! pricing, open the provider session, then record the pending order under
//! the session's reference. A rejected cart therefore creates no order and
//! never reaches the provider.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use streetmerch_core::{BillingCycle, CurrencyCode, Email, OrderId, PaymentProvider};

use crate::config::StorefrontConfig;
use crate::db::Repositories;
use crate::models::{Identity, PaymentInfo, ShippingAddress};
use crate::payments::{
    CheckoutSession, OneTimeCheckout, Payments, PortalSession, SubscriptionCheckout,
};

use super::{
    CartLine, CommerceError, CustomerDirectory, MembershipStatus, OrderEngine, PendingOrder,
    SubscriptionLedger,
};

/// Body of `POST /api/checkout/{provider}`.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub lines: Vec<CartLine>,
    /// Required when the shopper is not signed in.
    #[serde(default)]
    pub guest_email: Option<Email>,
    #[serde(default)]
    pub shipping_address: Option<ShippingAddress>,
    #[serde(default)]
    pub currency: Option<CurrencyCode>,
}

/// Where to send the shopper, and the order waiting for the webhook.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResponse {
    pub order_id: OrderId,
    pub provider: PaymentProvider,
    pub reference: String,
    pub url: String,
    pub member_discount: bool,
}

pub struct CheckoutService<'a> {
    repos: &'a Repositories,
    payments: &'a Payments,
    config: &'a StorefrontConfig,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(
        repos: &'a Repositories,
        payments: &'a Payments,
        config: &'a StorefrontConfig,
    ) -> Self {
        Self {
            repos,
            payments,
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn engine(&self) -> OrderEngine<'a> {
        OrderEngine::new(
            self.repos,
            self.config.price_policy,
            self.config.default_currency,
        )
    }

    /// Create an order and the provider checkout that will pay for it.
    ///
    /// # Errors
    ///
    /// Any cart rejection from [`OrderEngine::validate_cart`],
    /// `CommerceError::Validation` if no email identifies a guest buyer, and
    /// provider configuration or API failures from the adapter.
    #[instrument(skip(self, identity, request), fields(provider = %provider, signed_in = identity.is_some()))]
    pub async fn one_time(
        &self,
        provider: PaymentProvider,
        identity: Option<&Identity>,
        request: CheckoutRequest,
    ) -> Result<CheckoutResponse, CommerceError> {
        let engine = self.engine();
        let customer = match identity {
            Some(identity) => Some(CustomerDirectory::new(self.repos).ensure(identity).await?),
            None => None,
        };

        let lines = engine
            .validate_cart(&request.lines, customer.is_some())
            .await?;

        let guest_email = if customer.is_some() {
            None
        } else {
            Some(request.guest_email.ok_or_else(|| {
                CommerceError::Validation("An email address is required to check out".to_owned())
            })?)
        };

        let member_discount = match &customer {
            Some(customer) => SubscriptionLedger::new(self.repos).is_entitled(customer).await?,
            None => false,
        };

        let checkout = OneTimeCheckout {
            lines,
            member_discount,
            customer_email: customer
                .as_ref()
                .map(|c| c.email.clone())
                .or_else(|| guest_email.clone()),
            success_url: self.url("/checkout/success"),
            cancel_url: self.url("/cart"),
        };

        let session = self
            .payments
            .adapter(provider)
            .create_one_time_checkout(&checkout)
            .await?;

        let order = engine
            .create_pending(PendingOrder {
                customer_id: customer.as_ref().map(|c| c.id),
                guest_email,
                lines: checkout.charged_lines(),
                currency: request.currency,
                shipping_address: request.shipping_address,
                payment: PaymentInfo {
                    provider,
                    reference: session.reference.clone(),
                    charge_id: None,
                },
            })
            .await?;

        info!(order_id = %order.id, member_discount, "Checkout session opened");
        Ok(CheckoutResponse {
            order_id: order.id,
            provider,
            reference: session.reference,
            url: session.url,
            member_discount,
        })
    }

    /// Open a membership checkout for a signed-in customer.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Configuration` if the provider has no plan for
    /// `cycle`.
    #[instrument(skip(self, identity), fields(provider = %provider, cycle = %cycle))]
    pub async fn subscription(
        &self,
        provider: PaymentProvider,
        identity: &Identity,
        cycle: BillingCycle,
    ) -> Result<CheckoutSession, CommerceError> {
        let customer = CustomerDirectory::new(self.repos).ensure(identity).await?;
        let request = SubscriptionCheckout {
            cycle,
            email: customer.email,
            subject: customer.subject,
            success_url: self.url("/checkout/success"),
            cancel_url: self.url("/membership"),
        };
        self.payments
            .adapter(provider)
            .create_subscription_checkout(&request)
            .await
    }

    /// Open the provider's self-service page for the customer's membership.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::NotFound` if the customer holds no subscription
    /// with `provider`.
    #[instrument(skip(self, identity), fields(provider = %provider))]
    pub async fn portal(
        &self,
        provider: PaymentProvider,
        identity: &Identity,
    ) -> Result<PortalSession, CommerceError> {
        let customer = CustomerDirectory::new(self.repos).ensure(identity).await?;
        let request = SubscriptionLedger::new(self.repos)
            .portal_request(&customer, provider, self.url("/account"))
            .await?;
        self.payments
            .adapter(provider)
            .create_portal_session(&request)
            .await
    }

    /// Cancel one of the customer's card-network subscriptions, immediately
    /// or at the end of the paid period.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::NotFound` if the subscription is not the
    /// customer's, and provider failures from the adapter.
    #[instrument(skip(self, identity))]
    pub async fn cancel_membership(
        &self,
        identity: &Identity,
        subscription_id: &str,
        immediately: bool,
    ) -> Result<MembershipStatus, CommerceError> {
        let customer = CustomerDirectory::new(self.repos).ensure(identity).await?;
        let ledger = SubscriptionLedger::new(self.repos);
        let record = ledger
            .owned_record(&customer, PaymentProvider::Stripe, subscription_id)
            .await?;

        let state = self
            .payments
            .adapter(PaymentProvider::Stripe)
            .cancel_subscription(&record.subscription_id, !immediately)
            .await?;
        ledger.apply_state(&record, state).await?;
        info!(customer_id = %customer.id, "Membership cancelled");
        ledger.status(&customer).await
    }

    /// Withdraw a pending cancel-at-period-end.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::NotFound` if the subscription is not the
    /// customer's and `CommerceError::Conflict` if it is not set to cancel.
    #[instrument(skip(self, identity))]
    pub async fn reactivate_membership(
        &self,
        identity: &Identity,
        subscription_id: &str,
    ) -> Result<MembershipStatus, CommerceError> {
        let customer = CustomerDirectory::new(self.repos).ensure(identity).await?;
        let ledger = SubscriptionLedger::new(self.repos);
        let record = ledger
            .owned_record(&customer, PaymentProvider::Stripe, subscription_id)
            .await?;
        if !record.cancel_at_period_end {
            return Err(CommerceError::Conflict(
                "Subscription is not set to cancel".to_owned(),
            ));
        }

        let state = self
            .payments
            .adapter(PaymentProvider::Stripe)
            .reactivate_subscription(&record.subscription_id)
            .await?;
        ledger.apply_state(&record, state).await?;
        info!(customer_id = %customer.id, "Membership reactivated");
        ledger.status(&customer).await
    }
}
