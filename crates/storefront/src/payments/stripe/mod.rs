//! Stripe (card network) adapter.
//!
//! Talks to the REST API directly with form-encoded requests. Amounts are in
//! cents of the configured currency.

mod webhook;

pub use webhook::{SIGNATURE_HEADER, TIMESTAMP_TOLERANCE_SECS, intent_for, verify_signature};

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, instrument};

use streetmerch_core::{PaymentProvider, SubscriptionStatus, to_minor_units};

use super::{
    CHECKOUT_SOURCE, CheckoutSession, MEMBERSHIP_SOURCE, OneTimeCheckout, PortalRequest,
    PortalSession, SubscriptionCheckout, SubscriptionState, VerifiedEvent,
};
use crate::config::StripeConfig;
use crate::services::CommerceError;

/// Countries Stripe may collect a shipping address for.
pub const ALLOWED_SHIPPING_COUNTRIES: &[&str] =
    &["US", "CA", "GB", "AU", "DE", "FR", "NG", "GH", "ZA"];

const PROVIDER: PaymentProvider = PaymentProvider::Stripe;

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PortalResponse {
    url: String,
}

#[derive(Debug, Deserialize)]
struct SubscriptionResponse {
    id: String,
    status: String,
    #[serde(default)]
    cancel_at_period_end: bool,
}

impl From<SubscriptionResponse> for SubscriptionState {
    fn from(response: SubscriptionResponse) -> Self {
        Self {
            subscription_id: response.id,
            status: SubscriptionStatus::new(response.status),
            cancel_at_period_end: response.cancel_at_period_end,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Stripe API client.
#[derive(Clone)]
pub struct StripeAdapter {
    client: reqwest::Client,
    config: StripeConfig,
}

impl StripeAdapter {
    #[must_use]
    pub const fn new(client: reqwest::Client, config: StripeConfig) -> Self {
        Self { client, config }
    }

    fn secret_key(&self) -> Result<&SecretString, CommerceError> {
        self.config
            .secret_key
            .as_ref()
            .ok_or_else(|| CommerceError::missing_env("STRIPE_SECRET_KEY", "Stripe"))
    }

    /// Create a `mode=payment` checkout session.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Configuration` if `STRIPE_SECRET_KEY` is unset.
    #[instrument(skip(self, request), fields(lines = request.lines.len()))]
    pub async fn create_one_time_checkout(
        &self,
        request: &OneTimeCheckout,
    ) -> Result<CheckoutSession, CommerceError> {
        let secret = self.secret_key()?;
        let params = one_time_params(request, &self.config.currency.code_lowercase())?;
        self.create_session(secret, &params).await
    }

    /// Create a `mode=subscription` checkout session for a membership plan.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Configuration` if the secret key or the price
    /// id for the billing cycle is unset.
    #[instrument(skip(self, request), fields(cycle = %request.cycle))]
    pub async fn create_subscription_checkout(
        &self,
        request: &SubscriptionCheckout,
    ) -> Result<CheckoutSession, CommerceError> {
        let secret = self.secret_key()?;
        let price_id = self.config.price_id(request.cycle).ok_or_else(|| {
            let key = format!("STRIPE_{}_PRICE_ID", request.cycle.as_str().to_uppercase());
            CommerceError::missing_env(&key, &format!("Stripe {} price", request.cycle))
        })?;

        let params = vec![
            ("mode".to_owned(), "subscription".to_owned()),
            ("line_items[0][price]".to_owned(), price_id.to_owned()),
            ("line_items[0][quantity]".to_owned(), "1".to_owned()),
            ("success_url".to_owned(), request.success_url.clone()),
            ("cancel_url".to_owned(), request.cancel_url.clone()),
            ("customer_email".to_owned(), request.email.to_string()),
            ("metadata[source]".to_owned(), MEMBERSHIP_SOURCE.to_owned()),
            ("metadata[customer_subject]".to_owned(), request.subject.clone()),
            (
                "subscription_data[metadata][email]".to_owned(),
                request.email.to_string(),
            ),
            (
                "subscription_data[metadata][customer_subject]".to_owned(),
                request.subject.clone(),
            ),
        ];
        self.create_session(secret, &params).await
    }

    /// Create a billing portal session for a Stripe customer.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::NotFound` if no Stripe customer id is known.
    #[instrument(skip(self, request))]
    pub async fn create_portal_session(
        &self,
        request: &PortalRequest,
    ) -> Result<PortalSession, CommerceError> {
        let secret = self.secret_key()?;
        let customer = request
            .provider_customer_id
            .as_deref()
            .ok_or_else(|| CommerceError::NotFound("Stripe customer".to_owned()))?;

        let params = [("customer", customer), ("return_url", request.return_url.as_str())];
        let response = self
            .client
            .post(format!("{}/v1/billing_portal/sessions", self.config.api_base))
            .bearer_auth(secret.expose_secret())
            .form(&params)
            .send()
            .await
            .map_err(|e| CommerceError::provider(PROVIDER, e.to_string()))?;

        let portal: PortalResponse = read_response(response).await?;
        Ok(PortalSession { url: portal.url })
    }

    /// End a subscription.
    ///
    /// With `at_period_end` the subscription keeps running until the current
    /// period closes. Otherwise it is deleted and ends now.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::PaymentProvider` if Stripe rejects the call.
    #[instrument(skip(self))]
    pub async fn cancel_subscription(
        &self,
        subscription_id: &str,
        at_period_end: bool,
    ) -> Result<SubscriptionState, CommerceError> {
        let secret = self.secret_key()?;
        let url = subscription_url(&self.config.api_base, subscription_id)?;
        let request = if at_period_end {
            self.client
                .post(url)
                .form(&[("cancel_at_period_end", "true")])
        } else {
            self.client.delete(url)
        };

        let response = request
            .bearer_auth(secret.expose_secret())
            .send()
            .await
            .map_err(|e| CommerceError::provider(PROVIDER, e.to_string()))?;
        let subscription: SubscriptionResponse = read_response(response).await?;
        debug!(status = %subscription.status, "Stripe subscription cancelled");
        Ok(subscription.into())
    }

    /// Undo a pending cancel-at-period-end.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::PaymentProvider` if Stripe rejects the call.
    #[instrument(skip(self))]
    pub async fn reactivate_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionState, CommerceError> {
        let secret = self.secret_key()?;
        let response = self
            .client
            .post(subscription_url(&self.config.api_base, subscription_id)?)
            .bearer_auth(secret.expose_secret())
            .form(&[("cancel_at_period_end", "false")])
            .send()
            .await
            .map_err(|e| CommerceError::provider(PROVIDER, e.to_string()))?;
        let subscription: SubscriptionResponse = read_response(response).await?;
        debug!(status = %subscription.status, "Stripe subscription reactivated");
        Ok(subscription.into())
    }

    /// Verify the `stripe-signature` header and map the event to an intent.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Configuration` if `STRIPE_WEBHOOK_SECRET` is
    /// unset, `CommerceError::InvalidSignature` on mismatch.
    pub fn verify_webhook(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<VerifiedEvent, CommerceError> {
        let secret = self.config.webhook_secret.as_ref().ok_or_else(|| {
            CommerceError::missing_env("STRIPE_WEBHOOK_SECRET", "Stripe webhook signing")
        })?;
        let header = signature.ok_or(CommerceError::InvalidSignature)?;
        verify_signature(header, body, secret.expose_secret().as_bytes(), now_unix())?;
        webhook::parse(body)
    }

    async fn create_session(
        &self,
        secret: &SecretString,
        params: &[(String, String)],
    ) -> Result<CheckoutSession, CommerceError> {
        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.config.api_base))
            .bearer_auth(secret.expose_secret())
            .form(params)
            .send()
            .await
            .map_err(|e| CommerceError::provider(PROVIDER, e.to_string()))?;

        let session: SessionResponse = read_response(response).await?;
        let url = session
            .url
            .ok_or_else(|| CommerceError::provider(PROVIDER, "checkout session has no url"))?;

        debug!(reference = %session.id, "Stripe checkout session created");
        Ok(CheckoutSession {
            provider: PROVIDER,
            reference: session.id,
            url,
        })
    }
}

/// Endpoint for one subscription. Ids are interpolated into the path, so
/// only Stripe's own id alphabet is accepted.
fn subscription_url(api_base: &str, subscription_id: &str) -> Result<String, CommerceError> {
    if subscription_id.is_empty()
        || !subscription_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(CommerceError::Validation(format!(
            "'{subscription_id}' is not a Stripe subscription id"
        )));
    }
    Ok(format!("{api_base}/v1/subscriptions/{subscription_id}"))
}

/// Form parameters for a one-time checkout session.
fn one_time_params(
    request: &OneTimeCheckout,
    currency: &str,
) -> Result<Vec<(String, String)>, CommerceError> {
    let mut params = vec![
        ("mode".to_owned(), "payment".to_owned()),
        ("payment_method_types[0]".to_owned(), "card".to_owned()),
        (
            "success_url".to_owned(),
            format!("{}?session_id={{CHECKOUT_SESSION_ID}}", request.success_url),
        ),
        ("cancel_url".to_owned(), request.cancel_url.clone()),
        ("metadata[source]".to_owned(), CHECKOUT_SOURCE.to_owned()),
    ];

    for (i, line) in request.charged_lines().iter().enumerate() {
        let unit_amount = to_minor_units(line.unit_price).ok_or_else(|| {
            CommerceError::Validation(format!("price of {} is out of range", line.name))
        })?;
        let prefix = format!("line_items[{i}]");
        params.push((format!("{prefix}[price_data][currency]"), currency.to_owned()));
        params.push((
            format!("{prefix}[price_data][product_data][name]"),
            line.name.clone(),
        ));
        if let Some(image) = &line.image_url {
            params.push((
                format!("{prefix}[price_data][product_data][images][0]"),
                image.clone(),
            ));
        }
        params.push((
            format!("{prefix}[price_data][product_data][metadata][item_id]"),
            line.item_id.to_string(),
        ));
        if let Some(variant) = &line.variant {
            params.push((
                format!("{prefix}[price_data][product_data][metadata][variant]"),
                variant.clone(),
            ));
        }
        params.push((
            format!("{prefix}[price_data][unit_amount]"),
            unit_amount.to_string(),
        ));
        params.push((format!("{prefix}[quantity]"), line.quantity.to_string()));
    }

    for (i, country) in ALLOWED_SHIPPING_COUNTRIES.iter().enumerate() {
        params.push((
            format!("shipping_address_collection[allowed_countries][{i}]"),
            (*country).to_owned(),
        ));
    }

    if let Some(email) = &request.customer_email {
        params.push(("customer_email".to_owned(), email.to_string()));
    }
    if request.member_discount {
        params.push(("metadata[member_discount]".to_owned(), "10%".to_owned()));
    }

    Ok(params)
}

async fn read_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, CommerceError> {
    let status = response.status();
    if !status.is_success() {
        let message = match response.json::<ErrorEnvelope>().await {
            Ok(envelope) => envelope
                .error
                .message
                .unwrap_or_else(|| format!("request failed with status {status}")),
            Err(_) => format!("request failed with status {status}"),
        };
        return Err(CommerceError::provider(PROVIDER, message));
    }
    response
        .json()
        .await
        .map_err(|e| CommerceError::provider(PROVIDER, format!("unreadable response: {e}")))
}

fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use streetmerch_core::{CatalogItemId, Email};

    use super::*;
    use crate::models::LineSnapshot;

    fn request(member_discount: bool) -> OneTimeCheckout {
        OneTimeCheckout {
            lines: vec![LineSnapshot {
                item_id: CatalogItemId::new(7),
                name: "Sherpa Hoodie".to_string(),
                unit_price: Decimal::from(100),
                quantity: 1,
                variant: Some("L".to_string()),
                image_url: Some("https://cdn.test/hoodie.png".to_string()),
            }],
            member_discount,
            customer_email: Some(Email::parse("buyer@example.com").unwrap()),
            success_url: "https://shop.test/checkout/success".to_string(),
            cancel_url: "https://shop.test/cart".to_string(),
        }
    }

    fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_one_time_params_use_discounted_unit_amount() {
        let params = one_time_params(&request(true), "usd").unwrap();
        assert_eq!(
            param(&params, "line_items[0][price_data][unit_amount]"),
            Some("9000")
        );
        assert_eq!(param(&params, "metadata[member_discount]"), Some("10%"));

        let params = one_time_params(&request(false), "usd").unwrap();
        assert_eq!(
            param(&params, "line_items[0][price_data][unit_amount]"),
            Some("10000")
        );
    }

    #[test]
    fn test_one_time_params_carry_session_placeholder_and_countries() {
        let params = one_time_params(&request(false), "usd").unwrap();
        assert_eq!(
            param(&params, "success_url"),
            Some("https://shop.test/checkout/success?session_id={CHECKOUT_SESSION_ID}")
        );
        assert_eq!(
            param(&params, "shipping_address_collection[allowed_countries][5]"),
            Some("FR")
        );
        assert_eq!(
            param(&params, "line_items[0][price_data][product_data][metadata][variant]"),
            Some("L")
        );
        assert_eq!(param(&params, "metadata[source]"), Some(CHECKOUT_SOURCE));
    }

    #[test]
    fn test_subscription_url_rejects_path_characters() {
        assert_eq!(
            subscription_url("https://api.stripe.test", "sub_1Nx2").unwrap(),
            "https://api.stripe.test/v1/subscriptions/sub_1Nx2"
        );
        for bad in ["", "sub_1/../customers", "sub 1", "sub_1?expand=x"] {
            assert!(matches!(
                subscription_url("https://api.stripe.test", bad),
                Err(CommerceError::Validation(_))
            ));
        }
    }
}
