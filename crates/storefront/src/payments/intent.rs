//! What a verified webhook asks the storefront to do.

use serde::Serialize;

use streetmerch_core::{Email, PaymentProvider, SubscriptionStatus};

/// A subscription state report from a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionEvent {
    pub subscription_id: String,
    pub provider_customer_id: Option<String>,
    pub plan_id: Option<String>,
    pub status: SubscriptionStatus,
    pub cancel_at_period_end: bool,
    pub email: Option<Email>,
}

/// Closed set of effects a webhook can have.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookIntent {
    /// A one-time checkout was paid.
    MarkPaid {
        reference: String,
        charge_id: Option<String>,
        /// Email the provider collected, the last-resort notification address.
        customer_email: Option<Email>,
    },
    /// A one-time checkout expired or failed.
    MarkCancelled { reference: String },
    /// A subscription was created, renewed or changed.
    UpsertSubscription(SubscriptionEvent),
    /// A subscription changed status without carrying its full state.
    SetSubscriptionStatus {
        subscription_id: String,
        status: SubscriptionStatus,
    },
    /// Acknowledged, no state change.
    Ignore { reason: &'static str },
}

impl WebhookIntent {
    /// Short label for logs and acknowledgements.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::MarkPaid { .. } => "mark_paid",
            Self::MarkCancelled { .. } => "mark_cancelled",
            Self::UpsertSubscription(_) => "upsert_subscription",
            Self::SetSubscriptionStatus { .. } => "set_subscription_status",
            Self::Ignore { .. } => "ignore",
        }
    }
}

/// A webhook whose signature checked out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedEvent {
    pub provider: PaymentProvider,
    /// Provider event type, echoed in the acknowledgement.
    pub event_type: String,
    pub intent: WebhookIntent,
}

/// Body returned to the provider for every handled or ignored event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
}

impl WebhookAck {
    /// Stripe acknowledgements carry `type`, Paystack ones carry `event`.
    #[must_use]
    pub fn for_event(provider: PaymentProvider, event_type: String) -> Self {
        match provider {
            PaymentProvider::Stripe => Self {
                received: true,
                event: None,
                event_type: Some(event_type),
            },
            PaymentProvider::Paystack => Self {
                received: true,
                event: Some(event_type),
                event_type: None,
            },
        }
    }
}
