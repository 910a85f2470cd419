//! Stripe webhook verification and event mapping.
//!
//! The `stripe-signature` header looks like `t=1700000000,v1=<hex>,v1=<hex>`.
//! Each `v1` is an HMAC-SHA256 of `"{t}.{raw body}"` keyed with the endpoint's
//! signing secret. Any matching `v1` is accepted so secrets can be rolled.

use std::collections::HashMap;

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::debug;

use streetmerch_core::{Email, PaymentProvider, SubscriptionStatus};

use crate::payments::{SubscriptionEvent, VerifiedEvent, WebhookIntent};
use crate::services::CommerceError;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Maximum age of a signed timestamp.
pub const TIMESTAMP_TOLERANCE_SECS: i64 = 300;

/// Check a `stripe-signature` header against the raw body.
///
/// # Errors
///
/// Returns `CommerceError::InvalidSignature` if the header is malformed, the
/// timestamp is outside the tolerance, or no `v1` signature matches.
pub fn verify_signature(
    header: &str,
    body: &[u8],
    secret: &[u8],
    now: i64,
) -> Result<(), CommerceError> {
    let mut timestamp: Option<&str> = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(CommerceError::InvalidSignature)?;
    let ts: i64 = timestamp
        .parse()
        .map_err(|_| CommerceError::InvalidSignature)?;
    if (now - ts).abs() > TIMESTAMP_TOLERANCE_SECS {
        debug!(ts, now, "Stripe signature timestamp outside tolerance");
        return Err(CommerceError::InvalidSignature);
    }

    let matched = signatures.iter().any(|candidate| {
        let Ok(expected) = hex::decode(candidate) else {
            return false;
        };
        let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret) else {
            return false;
        };
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(body);
        // verify_slice compares in constant time
        mac.verify_slice(&expected).is_ok()
    });

    if matched {
        Ok(())
    } else {
        Err(CommerceError::InvalidSignature)
    }
}

// =============================================================================
// Event shapes
// =============================================================================

#[derive(Debug, Deserialize)]
struct StripeEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct CheckoutSessionObject {
    id: String,
    mode: Option<String>,
    payment_status: Option<String>,
    payment_intent: Option<String>,
    customer_email: Option<String>,
    customer_details: Option<CustomerDetails>,
}

#[derive(Debug, Deserialize)]
struct CustomerDetails {
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct List<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct PricedItem {
    price: Option<Price>,
}

#[derive(Debug, Deserialize)]
struct Price {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SubscriptionObject {
    id: String,
    customer: Option<String>,
    status: String,
    #[serde(default)]
    cancel_at_period_end: bool,
    #[serde(default)]
    metadata: HashMap<String, String>,
    items: Option<List<PricedItem>>,
}

#[derive(Debug, Deserialize)]
struct InvoiceObject {
    subscription: Option<String>,
    parent: Option<InvoiceParent>,
    customer: Option<String>,
    customer_email: Option<String>,
    lines: Option<List<PricedItem>>,
}

/// Newer API versions move the subscription id under `parent`.
#[derive(Debug, Deserialize)]
struct InvoiceParent {
    subscription_details: Option<SubscriptionDetails>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionDetails {
    subscription: Option<String>,
}

fn object<T: serde::de::DeserializeOwned>(value: &serde_json::Value) -> Result<T, CommerceError> {
    T::deserialize(value).map_err(|e| CommerceError::MalformedPayload(e.to_string()))
}

fn first_price(list: Option<List<PricedItem>>) -> Option<String> {
    list?.data.into_iter().find_map(|item| item.price).map(|p| p.id)
}

fn email(raw: Option<String>) -> Option<Email> {
    raw.and_then(|e| Email::parse(&e).ok())
}

/// Parse a verified body into an event and its intent.
pub(super) fn parse(body: &[u8]) -> Result<VerifiedEvent, CommerceError> {
    let event: StripeEvent =
        serde_json::from_slice(body).map_err(|e| CommerceError::MalformedPayload(e.to_string()))?;
    let intent = intent_for(&event.event_type, &event.data.object)?;
    Ok(VerifiedEvent {
        provider: PaymentProvider::Stripe,
        event_type: event.event_type,
        intent,
    })
}

/// Map a Stripe event type and its `data.object` to an intent.
///
/// # Errors
///
/// Returns `CommerceError::MalformedPayload` if a recognised event's object
/// is missing required fields.
pub fn intent_for(
    event_type: &str,
    object_value: &serde_json::Value,
) -> Result<WebhookIntent, CommerceError> {
    match event_type {
        "checkout.session.completed" | "checkout.session.async_payment_succeeded" => {
            let session: CheckoutSessionObject = object(object_value)?;
            if session.mode.as_deref() == Some("subscription") {
                return Ok(WebhookIntent::Ignore {
                    reason: "membership checkout, tracked through subscription events",
                });
            }
            if session.payment_status.as_deref() == Some("unpaid") {
                return Ok(WebhookIntent::Ignore {
                    reason: "awaiting asynchronous payment",
                });
            }
            let customer_email = email(
                session
                    .customer_details
                    .and_then(|d| d.email)
                    .or(session.customer_email),
            );
            Ok(WebhookIntent::MarkPaid {
                reference: session.id,
                charge_id: session.payment_intent,
                customer_email,
            })
        }
        "checkout.session.expired" | "checkout.session.async_payment_failed" => {
            let session: CheckoutSessionObject = object(object_value)?;
            if session.mode.as_deref() == Some("subscription") {
                return Ok(WebhookIntent::Ignore {
                    reason: "membership checkout, tracked through subscription events",
                });
            }
            Ok(WebhookIntent::MarkCancelled {
                reference: session.id,
            })
        }
        "customer.subscription.created" | "customer.subscription.updated" => {
            let mut sub: SubscriptionObject = object(object_value)?;
            Ok(WebhookIntent::UpsertSubscription(SubscriptionEvent {
                email: email(sub.metadata.remove("email")),
                plan_id: first_price(sub.items),
                subscription_id: sub.id,
                provider_customer_id: sub.customer,
                status: SubscriptionStatus::new(sub.status),
                cancel_at_period_end: sub.cancel_at_period_end,
            }))
        }
        "customer.subscription.deleted" => {
            let sub: SubscriptionObject = object(object_value)?;
            Ok(WebhookIntent::SetSubscriptionStatus {
                subscription_id: sub.id,
                status: SubscriptionStatus::new(SubscriptionStatus::CANCELED),
            })
        }
        "invoice.paid" | "invoice.payment_succeeded" => {
            let invoice: InvoiceObject = object(object_value)?;
            let subscription_id = invoice.subscription.or_else(|| {
                invoice
                    .parent
                    .and_then(|p| p.subscription_details)
                    .and_then(|d| d.subscription)
            });
            let Some(subscription_id) = subscription_id else {
                return Ok(WebhookIntent::Ignore {
                    reason: "invoice is not for a subscription",
                });
            };
            Ok(WebhookIntent::UpsertSubscription(SubscriptionEvent {
                subscription_id,
                provider_customer_id: invoice.customer,
                plan_id: first_price(invoice.lines),
                status: SubscriptionStatus::active(),
                cancel_at_period_end: false,
                email: email(invoice.customer_email),
            }))
        }
        _ => Ok(WebhookIntent::Ignore {
            reason: "unhandled event type",
        }),
    }
}
