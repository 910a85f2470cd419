//! Paystack webhook verification and event mapping.
//!
//! `x-paystack-signature` is the hex HMAC-SHA512 of the raw body keyed with
//! the account's secret key.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha512;

use streetmerch_core::{Email, PaymentProvider, SubscriptionStatus};

use crate::payments::{CHECKOUT_SOURCE, SubscriptionEvent, VerifiedEvent, WebhookIntent};
use crate::services::CommerceError;

pub const SIGNATURE_HEADER: &str = "x-paystack-signature";

/// Check an `x-paystack-signature` header against the raw body.
///
/// # Errors
///
/// Returns `CommerceError::InvalidSignature` if the header is not hex or does
/// not match.
pub fn verify_signature(signature: &str, body: &[u8], secret: &[u8]) -> Result<(), CommerceError> {
    let expected = hex::decode(signature.trim()).map_err(|_| CommerceError::InvalidSignature)?;
    let mut mac =
        Hmac::<Sha512>::new_from_slice(secret).map_err(|_| CommerceError::InvalidSignature)?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| CommerceError::InvalidSignature)
}

// =============================================================================
// Event shapes
// =============================================================================

#[derive(Debug, Deserialize)]
struct PaystackEvent {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct Customer {
    email: Option<String>,
    customer_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Plan {
    plan_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChargeData {
    reference: String,
    id: Option<serde_json::Value>,
    /// Paystack sends an object, an empty string or null here.
    #[serde(default)]
    metadata: serde_json::Value,
    customer: Option<Customer>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionData {
    subscription_code: Option<String>,
    customer: Option<Customer>,
    plan: Option<Plan>,
}

#[derive(Debug, Deserialize)]
struct InvoiceData {
    subscription: Option<SubscriptionData>,
    customer: Option<Customer>,
}

fn data<T: serde::de::DeserializeOwned>(value: &serde_json::Value) -> Result<T, CommerceError> {
    T::deserialize(value).map_err(|e| CommerceError::MalformedPayload(e.to_string()))
}

fn email(customer: Option<&Customer>) -> Option<Email> {
    customer
        .and_then(|c| c.email.as_deref())
        .and_then(|e| Email::parse(e).ok())
}

fn active_subscription(
    code: String,
    customer: Option<&Customer>,
    plan: Option<Plan>,
) -> WebhookIntent {
    WebhookIntent::UpsertSubscription(SubscriptionEvent {
        subscription_id: code,
        provider_customer_id: customer.and_then(|c| c.customer_code.clone()),
        plan_id: plan.and_then(|p| p.plan_code),
        status: SubscriptionStatus::active(),
        cancel_at_period_end: false,
        email: email(customer),
    })
}

/// Parse a verified body into an event and its intent.
pub(super) fn parse(body: &[u8]) -> Result<VerifiedEvent, CommerceError> {
    let event: PaystackEvent =
        serde_json::from_slice(body).map_err(|e| CommerceError::MalformedPayload(e.to_string()))?;
    let intent = intent_for(&event.event, &event.data)?;
    Ok(VerifiedEvent {
        provider: PaymentProvider::Paystack,
        event_type: event.event,
        intent,
    })
}

/// Map a Paystack event name and its `data` to an intent.
///
/// # Errors
///
/// Returns `CommerceError::MalformedPayload` if a recognised event's data is
/// missing required fields.
pub fn intent_for(event: &str, value: &serde_json::Value) -> Result<WebhookIntent, CommerceError> {
    match event {
        "charge.success" => {
            let charge: ChargeData = data(value)?;
            let source = charge.metadata.get("source").and_then(|s| s.as_str());
            if source != Some(CHECKOUT_SOURCE) {
                return Ok(WebhookIntent::Ignore {
                    reason: "charge did not come from a storefront checkout",
                });
            }
            let charge_id = charge.id.map(|id| match id {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            });
            Ok(WebhookIntent::MarkPaid {
                customer_email: email(charge.customer.as_ref()),
                reference: charge.reference,
                charge_id,
            })
        }
        "subscription.create" => {
            let sub: SubscriptionData = data(value)?;
            let code = sub.subscription_code.ok_or_else(|| {
                CommerceError::MalformedPayload("subscription_code missing".to_owned())
            })?;
            Ok(active_subscription(code, sub.customer.as_ref(), sub.plan))
        }
        "invoice.payment_success" => {
            let invoice: InvoiceData = data(value)?;
            let Some(sub) = invoice.subscription else {
                return Ok(WebhookIntent::Ignore {
                    reason: "invoice is not for a subscription",
                });
            };
            let Some(code) = sub.subscription_code else {
                return Ok(WebhookIntent::Ignore {
                    reason: "invoice subscription has no code",
                });
            };
            let customer = invoice.customer.or(sub.customer);
            Ok(active_subscription(code, customer.as_ref(), sub.plan))
        }
        "subscription.disable" | "subscription.not_renew" => {
            let sub: SubscriptionData = data(value)?;
            let Some(subscription_id) = sub.subscription_code else {
                return Ok(WebhookIntent::Ignore {
                    reason: "subscription event has no code",
                });
            };
            let status = if event == "subscription.disable" {
                SubscriptionStatus::CANCELLED
            } else {
                SubscriptionStatus::NON_RENEWING
            };
            Ok(WebhookIntent::SetSubscriptionStatus {
                subscription_id,
                status: SubscriptionStatus::new(status),
            })
        }
        _ => Ok(WebhookIntent::Ignore {
            reason: "unhandled event type",
        }),
    }
}
