//! Subscription ledger.
//!
//! One record per provider subscription object. Webhooks may arrive before
//! the customer has ever signed in, so records carry the email they were
//! bought with and are linked to a customer whenever one is found.
//!
//! Entitlement is read fresh from the store on every call. A customer is a
//! member if any of their records, from either provider, has an entitling
//! status.

use serde::Serialize;
use tracing::{info, instrument, warn};

use streetmerch_core::{PaymentProvider, SubscriptionStatus};

use crate::db::{CustomerRepository, Repositories, SubscriptionRepository};
use crate::models::{Customer, SubscriptionRecord, SubscriptionUpsert};
use crate::payments::{PortalRequest, SubscriptionEvent, SubscriptionState};

use super::CommerceError;

/// Membership summary for the signed-in customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MembershipStatus {
    pub entitled: bool,
    /// Provider whose portal manages the membership, if any.
    pub provider: Option<PaymentProvider>,
    pub status: Option<SubscriptionStatus>,
    pub cancel_at_period_end: bool,
}

/// Reads and writes against subscription records.
pub struct SubscriptionLedger<'a> {
    subscriptions: &'a dyn SubscriptionRepository,
    customers: &'a dyn CustomerRepository,
}

impl<'a> SubscriptionLedger<'a> {
    #[must_use]
    pub fn new(repos: &'a Repositories) -> Self {
        Self {
            subscriptions: repos.subscriptions.as_ref(),
            customers: repos.customers.as_ref(),
        }
    }

    /// Insert or patch the record for `(provider, event.subscription_id)`.
    ///
    /// New records are linked to an existing customer by email when one
    /// exists. For card-network records the provider customer id is also
    /// copied onto the customer so the billing portal can be opened later.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Repository` on database failure.
    #[instrument(skip(self, event), fields(subscription_id = %event.subscription_id, status = %event.status))]
    pub async fn upsert(
        &self,
        provider: PaymentProvider,
        event: SubscriptionEvent,
    ) -> Result<SubscriptionRecord, CommerceError> {
        let customer = match &event.email {
            Some(email) => self.customers.find_by_email(email).await?,
            None => None,
        };

        let record = self
            .subscriptions
            .upsert(SubscriptionUpsert {
                provider,
                subscription_id: event.subscription_id,
                provider_customer_id: event.provider_customer_id,
                plan_id: event.plan_id,
                status: event.status,
                cancel_at_period_end: event.cancel_at_period_end,
                email: event.email,
                customer_id: customer.as_ref().map(|c| c.id),
            })
            .await?;

        if provider == PaymentProvider::Stripe
            && let (Some(customer), Some(provider_customer_id)) =
                (&customer, record.provider_customer_id.as_deref())
            && customer.provider_customer_id.as_deref() != Some(provider_customer_id)
        {
            self.customers
                .set_provider_customer_id(customer.id, provider_customer_id)
                .await?;
        }

        info!(
            provider = %provider,
            linked = record.customer_id.is_some(),
            "Subscription record upserted"
        );
        Ok(record)
    }

    /// Patch the status of a known record. Unknown ids are logged and
    /// ignored, since they may belong to test data or a deleted customer.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Repository` on database failure.
    #[instrument(skip(self))]
    pub async fn set_status(
        &self,
        provider: PaymentProvider,
        subscription_id: &str,
        status: &SubscriptionStatus,
    ) -> Result<Option<SubscriptionRecord>, CommerceError> {
        let record = self
            .subscriptions
            .set_status(provider, subscription_id, status)
            .await?;
        if record.is_none() {
            warn!(provider = %provider, subscription_id, "Status update for unknown subscription");
        }
        Ok(record)
    }

    /// Every record belonging to the customer, by link or by email.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Repository` on database failure.
    pub async fn records_for(
        &self,
        customer: &Customer,
    ) -> Result<Vec<SubscriptionRecord>, CommerceError> {
        Ok(self
            .subscriptions
            .list_for_customer(customer.id, &customer.email)
            .await?)
    }

    /// The customer's own record for `(provider, subscription_id)`.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::NotFound` when the record does not exist or
    /// belongs to someone else.
    pub async fn owned_record(
        &self,
        customer: &Customer,
        provider: PaymentProvider,
        subscription_id: &str,
    ) -> Result<SubscriptionRecord, CommerceError> {
        self.records_for(customer)
            .await?
            .into_iter()
            .find(|r| r.provider == provider && r.subscription_id == subscription_id)
            .ok_or_else(|| {
                CommerceError::NotFound(format!("{} subscription", provider.display_name()))
            })
    }

    /// Write back what the provider reported after a management call, so
    /// entitlement changes before the matching webhook arrives.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Repository` on database failure.
    #[instrument(skip(self, record), fields(subscription_id = %record.subscription_id, status = %state.status))]
    pub async fn apply_state(
        &self,
        record: &SubscriptionRecord,
        state: SubscriptionState,
    ) -> Result<SubscriptionRecord, CommerceError> {
        let updated = self
            .subscriptions
            .upsert(SubscriptionUpsert {
                provider: record.provider,
                subscription_id: record.subscription_id.clone(),
                provider_customer_id: record.provider_customer_id.clone(),
                plan_id: record.plan_id.clone(),
                status: state.status,
                cancel_at_period_end: state.cancel_at_period_end,
                email: record.email.clone(),
                customer_id: record.customer_id,
            })
            .await?;
        info!(
            provider = %updated.provider,
            cancel_at_period_end = updated.cancel_at_period_end,
            "Subscription record updated from provider"
        );
        Ok(updated)
    }

    /// Whether the customer currently receives member perks.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Repository` on database failure.
    pub async fn is_entitled(&self, customer: &Customer) -> Result<bool, CommerceError> {
        Ok(self
            .records_for(customer)
            .await?
            .iter()
            .any(SubscriptionRecord::is_entitling))
    }

    /// Entitlement plus the record a "manage membership" button should open.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Repository` on database failure.
    pub async fn status(&self, customer: &Customer) -> Result<MembershipStatus, CommerceError> {
        let records = self.records_for(customer).await?;
        let managing = management_record(&records);
        Ok(MembershipStatus {
            entitled: records.iter().any(SubscriptionRecord::is_entitling),
            provider: managing.map(|r| r.provider),
            status: managing.map(|r| r.status.clone()),
            cancel_at_period_end: managing.is_some_and(|r| r.cancel_at_period_end),
        })
    }

    /// What `provider` needs to open its self-service page for this customer.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::NotFound` if the customer holds nothing the
    /// provider can manage.
    pub async fn portal_request(
        &self,
        customer: &Customer,
        provider: PaymentProvider,
        return_url: String,
    ) -> Result<PortalRequest, CommerceError> {
        let records = self.records_for(customer).await?;
        let mut own: Vec<&SubscriptionRecord> =
            records.iter().filter(|r| r.provider == provider).collect();
        own.sort_by_key(|r| (!r.is_entitling(), std::cmp::Reverse(r.updated_at)));
        let latest = own.first();

        let request = match provider {
            PaymentProvider::Stripe => PortalRequest {
                provider_customer_id: customer
                    .provider_customer_id
                    .clone()
                    .or_else(|| latest.and_then(|r| r.provider_customer_id.clone())),
                subscription_id: None,
                return_url,
            },
            PaymentProvider::Paystack => PortalRequest {
                provider_customer_id: None,
                subscription_id: latest.map(|r| r.subscription_id.clone()),
                return_url,
            },
        };

        if request.provider_customer_id.is_none() && request.subscription_id.is_none() {
            return Err(CommerceError::NotFound(format!(
                "{} subscription",
                provider.display_name()
            )));
        }
        Ok(request)
    }
}

/// The entitling record whose provider should manage the membership.
///
/// A committed card-network subscription wins, then a regional-processor one,
/// then a card-network subscription that is set to cancel at period end.
#[must_use]
pub fn management_record(records: &[SubscriptionRecord]) -> Option<&SubscriptionRecord> {
    let entitling = || records.iter().filter(|r| r.is_entitling());
    entitling()
        .find(|r| r.provider == PaymentProvider::Stripe && !r.cancel_at_period_end)
        .or_else(|| entitling().find(|r| r.provider == PaymentProvider::Paystack))
        .or_else(|| entitling().find(|r| r.provider == PaymentProvider::Stripe))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use streetmerch_core::Email;

    use super::*;
    use crate::models::Identity;
    use crate::services::CustomerDirectory;

    async fn customer(repos: &Repositories, email: &str) -> Customer {
        CustomerDirectory::new(repos)
            .ensure(&Identity {
                subject: format!("sub|{email}"),
                email: Email::parse(email).unwrap(),
                name: None,
            })
            .await
            .unwrap()
    }

    fn event(id: &str, email: &str, status: &str, cancel_at_period_end: bool) -> SubscriptionEvent {
        SubscriptionEvent {
            subscription_id: id.to_string(),
            provider_customer_id: Some(format!("cus_{id}")),
            plan_id: None,
            status: SubscriptionStatus::new(status),
            cancel_at_period_end,
            email: Some(Email::parse(email).unwrap()),
        }
    }

    #[tokio::test]
    async fn test_paystack_only_member_is_entitled() {
        let repos = Repositories::in_memory();
        let ledger = SubscriptionLedger::new(&repos);
        let member = customer(&repos, "ama@example.com").await;

        ledger
            .upsert(
                PaymentProvider::Paystack,
                event("SUB_1", "ama@example.com", "active", false),
            )
            .await
            .unwrap();
        assert!(ledger.is_entitled(&member).await.unwrap());
    }

    #[tokio::test]
    async fn test_cancelled_stripe_only_is_not_entitled() {
        let repos = Repositories::in_memory();
        let ledger = SubscriptionLedger::new(&repos);
        let member = customer(&repos, "kofi@example.com").await;

        ledger
            .upsert(
                PaymentProvider::Stripe,
                event("sub_1", "kofi@example.com", "active", false),
            )
            .await
            .unwrap();
        ledger
            .set_status(
                PaymentProvider::Stripe,
                "sub_1",
                &SubscriptionStatus::new("canceled"),
            )
            .await
            .unwrap();
        assert!(!ledger.is_entitled(&member).await.unwrap());
    }

    #[tokio::test]
    async fn test_cancel_at_period_end_stays_entitled() {
        let repos = Repositories::in_memory();
        let ledger = SubscriptionLedger::new(&repos);
        let member = customer(&repos, "yaw@example.com").await;

        ledger
            .upsert(
                PaymentProvider::Stripe,
                event("sub_2", "yaw@example.com", "active", true),
            )
            .await
            .unwrap();
        let status = ledger.status(&member).await.unwrap();
        assert!(status.entitled);
        assert!(status.cancel_at_period_end);
        assert_eq!(status.provider, Some(PaymentProvider::Stripe));
    }

    #[tokio::test]
    async fn test_entitlement_found_by_email_before_link() {
        let repos = Repositories::in_memory();
        let ledger = SubscriptionLedger::new(&repos);
        let member = customer(&repos, "efua@example.com").await;

        // Record written with a different case and no customer link.
        repos
            .subscriptions
            .upsert(SubscriptionUpsert {
                provider: PaymentProvider::Paystack,
                subscription_id: "SUB_email".to_string(),
                provider_customer_id: None,
                plan_id: None,
                status: SubscriptionStatus::new("non-renewing"),
                cancel_at_period_end: false,
                email: Some(Email::parse("EFUA@example.com").unwrap()),
                customer_id: None,
            })
            .await
            .unwrap();
        assert!(ledger.is_entitled(&member).await.unwrap());
    }

    #[tokio::test]
    async fn test_set_status_unknown_is_noop() {
        let repos = Repositories::in_memory();
        let ledger = SubscriptionLedger::new(&repos);
        let result = ledger
            .set_status(
                PaymentProvider::Paystack,
                "SUB_missing",
                &SubscriptionStatus::new("cancelled"),
            )
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_stripe_upsert_records_provider_customer_id() {
        let repos = Repositories::in_memory();
        let ledger = SubscriptionLedger::new(&repos);
        let member = customer(&repos, "abena@example.com").await;

        ledger
            .upsert(
                PaymentProvider::Stripe,
                event("sub_3", "abena@example.com", "active", false),
            )
            .await
            .unwrap();
        let reloaded = repos.customers.get(member.id).await.unwrap().unwrap();
        assert_eq!(reloaded.provider_customer_id.as_deref(), Some("cus_sub_3"));

        let request = ledger
            .portal_request(
                &reloaded,
                PaymentProvider::Stripe,
                "https://shop.test/account".to_string(),
            )
            .await
            .unwrap();
        assert_eq!(request.provider_customer_id.as_deref(), Some("cus_sub_3"));
    }

    #[tokio::test]
    async fn test_portal_request_without_records_is_not_found() {
        let repos = Repositories::in_memory();
        let member = customer(&repos, "nobody@example.com").await;
        let err = SubscriptionLedger::new(&repos)
            .portal_request(
                &member,
                PaymentProvider::Paystack,
                "https://shop.test/account".to_string(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_owned_record_hides_other_customers() {
        let repos = Repositories::in_memory();
        let ledger = SubscriptionLedger::new(&repos);
        let owner = customer(&repos, "kwame@example.com").await;
        let stranger = customer(&repos, "stranger@example.com").await;
        ledger
            .upsert(
                PaymentProvider::Stripe,
                event("sub_4", "kwame@example.com", "active", false),
            )
            .await
            .unwrap();

        let record = ledger
            .owned_record(&owner, PaymentProvider::Stripe, "sub_4")
            .await
            .unwrap();
        assert_eq!(record.subscription_id, "sub_4");

        let err = ledger
            .owned_record(&stranger, PaymentProvider::Stripe, "sub_4")
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::NotFound(_)));
        let err = ledger
            .owned_record(&owner, PaymentProvider::Paystack, "sub_4")
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_apply_state_patches_status_and_flag() {
        let repos = Repositories::in_memory();
        let ledger = SubscriptionLedger::new(&repos);
        let member = customer(&repos, "esi@example.com").await;
        let record = ledger
            .upsert(
                PaymentProvider::Stripe,
                event("sub_5", "esi@example.com", "active", false),
            )
            .await
            .unwrap();

        let updated = ledger
            .apply_state(
                &record,
                SubscriptionState {
                    subscription_id: "sub_5".to_string(),
                    status: SubscriptionStatus::active(),
                    cancel_at_period_end: true,
                },
            )
            .await
            .unwrap();
        assert!(updated.cancel_at_period_end);
        assert_eq!(updated.provider_customer_id.as_deref(), Some("cus_sub_5"));
        assert!(ledger.is_entitled(&member).await.unwrap());

        ledger
            .apply_state(
                &updated,
                SubscriptionState {
                    subscription_id: "sub_5".to_string(),
                    status: SubscriptionStatus::new("canceled"),
                    cancel_at_period_end: false,
                },
            )
            .await
            .unwrap();
        assert!(!ledger.is_entitled(&member).await.unwrap());
    }

    #[test]
    fn test_management_prefers_committed_stripe() {
        let now = chrono::Utc::now();
        let record = |provider, cancel| SubscriptionRecord {
            id: streetmerch_core::SubscriptionRecordId::new(1),
            provider,
            subscription_id: "x".to_string(),
            provider_customer_id: None,
            plan_id: None,
            status: SubscriptionStatus::active(),
            cancel_at_period_end: cancel,
            customer_id: None,
            email: None,
            created_at: now,
            updated_at: now,
        };

        let records = vec![
            record(PaymentProvider::Stripe, true),
            record(PaymentProvider::Paystack, false),
        ];
        assert_eq!(
            management_record(&records).map(|r| r.provider),
            Some(PaymentProvider::Paystack)
        );

        let records = vec![
            record(PaymentProvider::Paystack, false),
            record(PaymentProvider::Stripe, false),
        ];
        assert_eq!(
            management_record(&records).map(|r| r.provider),
            Some(PaymentProvider::Stripe)
        );

        let records = vec![record(PaymentProvider::Stripe, true)];
        assert_eq!(
            management_record(&records).map(|r| r.provider),
            Some(PaymentProvider::Stripe)
        );
    }
}
