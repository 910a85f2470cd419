//! Subscription ledger records.

use chrono::{DateTime, Utc};
use serde::Serialize;

use streetmerch_core::{
    CustomerId, Email, PaymentProvider, SubscriptionRecordId, SubscriptionStatus,
};

/// One row per external subscription object.
///
/// `(provider, subscription_id)` is unique. A record may exist before the
/// customer it belongs to signs in, in which case only `email` is set and
/// `customer_id` is filled in later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionRecord {
    pub id: SubscriptionRecordId,
    pub provider: PaymentProvider,
    pub subscription_id: String,
    pub provider_customer_id: Option<String>,
    pub plan_id: Option<String>,
    pub status: SubscriptionStatus,
    /// Stripe only: the subscription ends at the close of the current period.
    pub cancel_at_period_end: bool,
    pub customer_id: Option<CustomerId>,
    pub email: Option<Email>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionRecord {
    #[must_use]
    pub fn is_entitling(&self) -> bool {
        self.status.is_entitling(self.provider)
    }
}

/// Insert-or-patch request for the ledger.
///
/// On an existing record the status, `cancel_at_period_end` and timestamp are
/// overwritten; ids and ownership are only filled in where still unset.
#[derive(Debug, Clone)]
pub struct SubscriptionUpsert {
    pub provider: PaymentProvider,
    pub subscription_id: String,
    pub provider_customer_id: Option<String>,
    pub plan_id: Option<String>,
    pub status: SubscriptionStatus,
    pub cancel_at_period_end: bool,
    pub email: Option<Email>,
    pub customer_id: Option<CustomerId>,
}
