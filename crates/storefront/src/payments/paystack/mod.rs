//! Paystack (regional processor) adapter.
//!
//! Paystack charges one amount per transaction in the smallest unit of the
//! settlement currency (pesewas for GHS, kobo for NGN). Site prices are
//! converted with `PAYSTACK_USD_RATE` before that.

mod webhook;

pub use webhook::{SIGNATURE_HEADER, intent_for, verify_signature};

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, instrument};

use streetmerch_core::{PaymentProvider, to_minor_units};

use super::{
    CHECKOUT_SOURCE, CheckoutSession, MEMBERSHIP_SOURCE, OneTimeCheckout, PortalRequest,
    PortalSession, SubscriptionCheckout, VerifiedEvent,
};
use crate::config::PaystackConfig;
use crate::services::CommerceError;

const PROVIDER: PaymentProvider = PaymentProvider::Paystack;

/// Every Paystack response is wrapped in this envelope.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: bool,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    authorization_url: String,
    reference: String,
}

#[derive(Debug, Deserialize)]
struct ManageLinkData {
    link: String,
}

/// Convert a site-currency amount to Paystack minor units.
#[must_use]
pub fn paystack_amount(total: Decimal, usd_rate: Decimal) -> Option<i64> {
    to_minor_units(total * usd_rate)
}

/// Paystack API client.
#[derive(Clone)]
pub struct PaystackAdapter {
    client: reqwest::Client,
    config: PaystackConfig,
}

impl PaystackAdapter {
    #[must_use]
    pub const fn new(client: reqwest::Client, config: PaystackConfig) -> Self {
        Self { client, config }
    }

    fn secret_key(&self) -> Result<&SecretString, CommerceError> {
        self.config
            .secret_key
            .as_ref()
            .ok_or_else(|| CommerceError::missing_env("PAYSTACK_SECRET_KEY", "Paystack"))
    }

    /// Initialize a one-time transaction for the whole cart.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Validation` if no customer email is known,
    /// since Paystack cannot open a transaction without one.
    #[instrument(skip(self, request), fields(lines = request.lines.len()))]
    pub async fn create_one_time_checkout(
        &self,
        request: &OneTimeCheckout,
    ) -> Result<CheckoutSession, CommerceError> {
        let secret = self.secret_key()?;
        let body = self.one_time_body(request)?;
        self.initialize(secret, &body).await
    }

    fn one_time_body(&self, request: &OneTimeCheckout) -> Result<serde_json::Value, CommerceError> {
        let email = request.customer_email.as_ref().ok_or_else(|| {
            CommerceError::Validation("Customer email is required for Paystack checkout".to_owned())
        })?;
        let amount = paystack_amount(request.charged_total(), self.config.usd_rate)
            .ok_or_else(|| CommerceError::Validation("order total is out of range".to_owned()))?;

        let items: Vec<serde_json::Value> = request
            .lines
            .iter()
            .map(|line| {
                json!({
                    "id": line.item_id,
                    "name": line.name,
                    "qty": line.quantity,
                    "variant": line.variant,
                })
            })
            .collect();

        let mut metadata = json!({
            "source": CHECKOUT_SOURCE,
            "cancel_action": request.cancel_url,
            "items": items,
        });
        if request.member_discount {
            metadata["custom_fields"] = json!([{
                "display_name": "Member Discount",
                "variable_name": "member_discount",
                "value": "10% off applied",
            }]);
        }

        Ok(json!({
            "email": email,
            "amount": amount,
            "currency": self.config.currency.code(),
            "callback_url": format!("{}?provider=paystack", request.success_url),
            "metadata": metadata,
        }))
    }

    /// Initialize a transaction on a membership plan.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Configuration` if the plan code for the billing
    /// cycle is unset.
    #[instrument(skip(self, request), fields(cycle = %request.cycle))]
    pub async fn create_subscription_checkout(
        &self,
        request: &SubscriptionCheckout,
    ) -> Result<CheckoutSession, CommerceError> {
        let secret = self.secret_key()?;
        let plan = self.config.plan_code(request.cycle).ok_or_else(|| {
            let key = format!("PAYSTACK_{}_PLAN_CODE", request.cycle.as_str().to_uppercase());
            CommerceError::Configuration(format!(
                "{key} is not set. Create a plan in the Paystack Dashboard under Products > Plans, \
                 then set {key} to its plan code and restart."
            ))
        })?;

        let body = json!({
            "email": request.email,
            "plan": plan,
            "callback_url": format!("{}?provider=paystack&type=subscription", request.success_url),
            "metadata": {
                "source": MEMBERSHIP_SOURCE,
                "customer_subject": request.subject,
                "cancel_action": request.cancel_url,
            },
        });
        self.initialize(secret, &body).await
    }

    /// Fetch the hosted management link for a subscription.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::NotFound` if no subscription code is known.
    #[instrument(skip(self, request))]
    pub async fn create_portal_session(
        &self,
        request: &PortalRequest,
    ) -> Result<PortalSession, CommerceError> {
        let secret = self.secret_key()?;
        let code = request
            .subscription_id
            .as_deref()
            .ok_or_else(|| CommerceError::NotFound("Paystack subscription".to_owned()))?;

        let response = self
            .client
            .get(format!(
                "{}/subscription/{code}/manage/link",
                self.config.api_base
            ))
            .bearer_auth(secret.expose_secret())
            .send()
            .await
            .map_err(|e| CommerceError::provider(PROVIDER, e.to_string()))?;

        let data: ManageLinkData = read_envelope(response).await?;
        Ok(PortalSession { url: data.link })
    }

    /// Verify the `x-paystack-signature` header and map the event to an intent.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::InvalidSignature` on mismatch.
    pub fn verify_webhook(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<VerifiedEvent, CommerceError> {
        let secret = self.secret_key()?;
        let signature = signature.ok_or(CommerceError::InvalidSignature)?;
        verify_signature(signature, body, secret.expose_secret().as_bytes())?;
        webhook::parse(body)
    }

    async fn initialize(
        &self,
        secret: &SecretString,
        body: &serde_json::Value,
    ) -> Result<CheckoutSession, CommerceError> {
        let response = self
            .client
            .post(format!("{}/transaction/initialize", self.config.api_base))
            .bearer_auth(secret.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| CommerceError::provider(PROVIDER, e.to_string()))?;

        let data: InitializeData = read_envelope(response).await?;
        debug!(reference = %data.reference, "Paystack transaction initialized");
        Ok(CheckoutSession {
            provider: PROVIDER,
            reference: data.reference,
            url: data.authorization_url,
        })
    }
}

async fn read_envelope<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, CommerceError> {
    let status = response.status();
    let envelope: Envelope<T> = response.json().await.map_err(|e| {
        CommerceError::provider(PROVIDER, format!("unreadable response ({status}): {e}"))
    })?;

    match envelope {
        Envelope {
            status: true,
            data: Some(data),
            ..
        } => Ok(data),
        Envelope { message, .. } => Err(CommerceError::provider(
            PROVIDER,
            message.unwrap_or_else(|| "Paystack initialization failed".to_owned()),
        )),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use streetmerch_core::{CatalogItemId, CurrencyCode, Email};

    use super::*;
    use crate::models::LineSnapshot;

    fn adapter(usd_rate: Decimal) -> PaystackAdapter {
        PaystackAdapter::new(
            reqwest::Client::new(),
            PaystackConfig {
                api_base: "http://127.0.0.1:9".to_string(),
                secret_key: None,
                currency: CurrencyCode::GHS,
                usd_rate,
                monthly_plan_code: None,
                annual_plan_code: None,
            },
        )
    }

    fn request(email: Option<&str>, member_discount: bool) -> OneTimeCheckout {
        OneTimeCheckout {
            lines: vec![LineSnapshot {
                item_id: CatalogItemId::new(4),
                name: "Dad Cap".to_string(),
                unit_price: Decimal::new(2500, 2),
                quantity: 2,
                variant: None,
                image_url: None,
            }],
            member_discount,
            customer_email: email.map(|e| Email::parse(e).unwrap()),
            success_url: "https://shop.test/checkout/success".to_string(),
            cancel_url: "https://shop.test/cart".to_string(),
        }
    }

    #[test]
    fn test_paystack_amount_converts_and_rounds() {
        assert_eq!(paystack_amount(Decimal::from(50), Decimal::ONE), Some(5000));
        assert_eq!(
            paystack_amount(Decimal::new(1999, 2), Decimal::new(155, 1)),
            Some(30985)
        );
    }

    #[test]
    fn test_one_time_body_applies_rate_and_discount() {
        let body = adapter(Decimal::new(155, 1))
            .one_time_body(&request(Some("buyer@example.com"), true))
            .unwrap();
        // 2 x 22.50 = 45.00, x 15.5 = 697.50 GHS
        assert_eq!(body["amount"], 69750);
        assert_eq!(body["currency"], "GHS");
        assert_eq!(body["metadata"]["source"], CHECKOUT_SOURCE);
        assert_eq!(body["metadata"]["custom_fields"][0]["variable_name"], "member_discount");
        assert_eq!(
            body["callback_url"],
            "https://shop.test/checkout/success?provider=paystack"
        );
    }

    #[test]
    fn test_one_time_body_requires_email() {
        let err = adapter(Decimal::ONE)
            .one_time_body(&request(None, false))
            .unwrap_err();
        assert!(matches!(err, CommerceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_missing_secret_fails_before_network() {
        let err = adapter(Decimal::ONE)
            .create_one_time_checkout(&request(Some("buyer@example.com"), false))
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::Configuration(_)));
    }
}
