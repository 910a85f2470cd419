//! Payment provider adapters.
//!
//! Two providers sit behind one contract:
//!
//! - [`stripe`] - card network, form-encoded REST API, `stripe-signature` webhooks
//! - [`paystack`] - regional mobile-money and card processor, JSON API,
//!   `x-paystack-signature` webhooks
//!
//! [`PaymentAdapter`] is a tagged enum rather than a trait object: the set of
//! providers is closed and the variant is selected by the provider name
//! stored on each order and subscription record.
//!
//! Webhook handling is split into three stages that can be tested on their
//! own: signature verification over the raw body, parsing into the provider's
//! event shape, and a pure mapping to a [`WebhookIntent`]. Applying the
//! intent is the job of `crate::services::webhooks`.

pub mod intent;
pub mod paystack;
pub mod stripe;

use rust_decimal::Decimal;
use serde::Serialize;

use streetmerch_core::{BillingCycle, Email, PaymentProvider, SubscriptionStatus, round_cents};

use crate::config::StorefrontConfig;
use crate::models::LineSnapshot;
use crate::services::CommerceError;

pub use intent::{SubscriptionEvent, VerifiedEvent, WebhookAck, WebhookIntent};
pub use paystack::PaystackAdapter;
pub use stripe::StripeAdapter;

/// Metadata tag on one-time checkouts, so charge events for memberships are
/// never mistaken for orders.
pub const CHECKOUT_SOURCE: &str = "streetmerch-website";

/// Metadata tag on membership checkouts.
pub const MEMBERSHIP_SOURCE: &str = "streetmerch-membership";

/// Members pay 90% of the listed unit price.
pub const MEMBER_DISCOUNT_MULTIPLIER: Decimal = Decimal::from_parts(9, 0, 0, false, 1);

/// Unit price after the member discount, rounded to cents.
#[must_use]
pub fn member_price(unit_price: Decimal) -> Decimal {
    round_cents(unit_price * MEMBER_DISCOUNT_MULTIPLIER)
}

/// A one-time purchase to open a hosted checkout for.
#[derive(Debug, Clone)]
pub struct OneTimeCheckout {
    /// Lines at list price.
    pub lines: Vec<LineSnapshot>,
    /// The buyer is a signed-in, currently entitled member.
    pub member_discount: bool,
    pub customer_email: Option<Email>,
    pub success_url: String,
    pub cancel_url: String,
}

impl OneTimeCheckout {
    /// Lines with the unit prices that will actually be charged.
    #[must_use]
    pub fn charged_lines(&self) -> Vec<LineSnapshot> {
        self.lines
            .iter()
            .map(|line| {
                let mut line = line.clone();
                if self.member_discount {
                    line.unit_price = member_price(line.unit_price);
                }
                line
            })
            .collect()
    }

    #[must_use]
    pub fn charged_total(&self) -> Decimal {
        crate::models::order::lines_total(&self.charged_lines())
    }
}

/// A membership checkout for a signed-in customer.
#[derive(Debug, Clone)]
pub struct SubscriptionCheckout {
    pub cycle: BillingCycle,
    pub email: Email,
    /// Identity provider subject, echoed back in provider metadata.
    pub subject: String,
    pub success_url: String,
    pub cancel_url: String,
}

/// What the provider needs to open a self-service management page.
#[derive(Debug, Clone)]
pub struct PortalRequest {
    /// Provider customer id (Stripe billing portal).
    pub provider_customer_id: Option<String>,
    /// Provider subscription id (Paystack management link).
    pub subscription_id: Option<String>,
    pub return_url: String,
}

/// A hosted checkout the customer is redirected to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutSession {
    pub provider: PaymentProvider,
    /// Correlation id later echoed by the provider's webhook.
    pub reference: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortalSession {
    pub url: String,
}

/// A subscription as the provider reports it after a management call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionState {
    pub subscription_id: String,
    pub status: SubscriptionStatus,
    pub cancel_at_period_end: bool,
}

/// One provider, selected by [`PaymentProvider`].
#[derive(Clone)]
pub enum PaymentAdapter {
    Stripe(StripeAdapter),
    Paystack(PaystackAdapter),
}

impl PaymentAdapter {
    #[must_use]
    pub const fn provider(&self) -> PaymentProvider {
        match self {
            Self::Stripe(_) => PaymentProvider::Stripe,
            Self::Paystack(_) => PaymentProvider::Paystack,
        }
    }

    /// Name of the header carrying the webhook signature.
    #[must_use]
    pub const fn signature_header(&self) -> &'static str {
        match self {
            Self::Stripe(_) => stripe::SIGNATURE_HEADER,
            Self::Paystack(_) => paystack::SIGNATURE_HEADER,
        }
    }

    /// Open a hosted checkout for a one-time purchase.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Configuration` before any network call if the
    /// provider credentials are missing, and `CommerceError::PaymentProvider`
    /// if the provider rejects the request.
    pub async fn create_one_time_checkout(
        &self,
        request: &OneTimeCheckout,
    ) -> Result<CheckoutSession, CommerceError> {
        match self {
            Self::Stripe(adapter) => adapter.create_one_time_checkout(request).await,
            Self::Paystack(adapter) => adapter.create_one_time_checkout(request).await,
        }
    }

    /// Open a hosted membership checkout.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Configuration` if the plan for `request.cycle`
    /// is not configured.
    pub async fn create_subscription_checkout(
        &self,
        request: &SubscriptionCheckout,
    ) -> Result<CheckoutSession, CommerceError> {
        match self {
            Self::Stripe(adapter) => adapter.create_subscription_checkout(request).await,
            Self::Paystack(adapter) => adapter.create_subscription_checkout(request).await,
        }
    }

    /// Open the provider's subscription management page.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::NotFound` if the request lacks the id the
    /// provider needs.
    pub async fn create_portal_session(
        &self,
        request: &PortalRequest,
    ) -> Result<PortalSession, CommerceError> {
        match self {
            Self::Stripe(adapter) => adapter.create_portal_session(request).await,
            Self::Paystack(adapter) => adapter.create_portal_session(request).await,
        }
    }

    /// Cancel a subscription now or at the end of its current period.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Validation` for Paystack, whose memberships are
    /// cancelled from the management link it emails.
    pub async fn cancel_subscription(
        &self,
        subscription_id: &str,
        at_period_end: bool,
    ) -> Result<SubscriptionState, CommerceError> {
        match self {
            Self::Stripe(adapter) => {
                adapter
                    .cancel_subscription(subscription_id, at_period_end)
                    .await
            }
            Self::Paystack(_) => Err(managed_by_link()),
        }
    }

    /// Keep a subscription that was set to cancel at period end.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Validation` for Paystack.
    pub async fn reactivate_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionState, CommerceError> {
        match self {
            Self::Stripe(adapter) => adapter.reactivate_subscription(subscription_id).await,
            Self::Paystack(_) => Err(managed_by_link()),
        }
    }

    /// Verify a webhook's signature over the raw body, then parse it.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::InvalidSignature` before looking at the payload
    /// if the signature does not match, and `CommerceError::MalformedPayload`
    /// if a verified body cannot be parsed.
    pub fn verify_webhook(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<VerifiedEvent, CommerceError> {
        match self {
            Self::Stripe(adapter) => adapter.verify_webhook(body, signature),
            Self::Paystack(adapter) => adapter.verify_webhook(body, signature),
        }
    }
}

fn managed_by_link() -> CommerceError {
    CommerceError::Validation(
        "Paystack memberships are managed from the link in the subscription email".to_owned(),
    )
}

/// Both adapters, built once at startup from configuration.
#[derive(Clone)]
pub struct Payments {
    stripe: PaymentAdapter,
    paystack: PaymentAdapter,
}

impl Payments {
    /// Build both adapters.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn from_config(config: &StorefrontConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("streetmerch/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(20))
            .build()?;

        Ok(Self {
            stripe: PaymentAdapter::Stripe(StripeAdapter::new(
                client.clone(),
                config.stripe.clone(),
            )),
            paystack: PaymentAdapter::Paystack(PaystackAdapter::new(
                client,
                config.paystack.clone(),
            )),
        })
    }

    #[must_use]
    pub const fn adapter(&self, provider: PaymentProvider) -> &PaymentAdapter {
        match provider {
            PaymentProvider::Stripe => &self.stripe,
            PaymentProvider::Paystack => &self.paystack,
        }
    }
}
