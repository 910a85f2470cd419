//! Inbound payment webhooks.
//!
//! The adapter verifies the signature over the raw body and maps the event to
//! a [`WebhookIntent`]. This service applies the intent. Business no-ops
//! (unknown reference, order already paid, unknown subscription) are logged
//! and acknowledged so the provider stops retrying; only signature and
//! payload failures reach the caller as errors.

use tracing::{info, instrument, warn};

use streetmerch_core::PaymentProvider;

use crate::config::StorefrontConfig;
use crate::db::Repositories;
use crate::models::ProviderTransition;
use crate::payments::{Payments, WebhookAck, WebhookIntent};

use super::{
    CommerceError, NotificationDispatcher, OrderEngine, OrderNotifier, SubscriptionLedger,
};

pub struct WebhookService<'a> {
    repos: &'a Repositories,
    payments: &'a Payments,
    notifier: Option<&'a dyn OrderNotifier>,
    config: &'a StorefrontConfig,
}

impl<'a> WebhookService<'a> {
    #[must_use]
    pub const fn new(
        repos: &'a Repositories,
        payments: &'a Payments,
        notifier: Option<&'a dyn OrderNotifier>,
        config: &'a StorefrontConfig,
    ) -> Self {
        Self {
            repos,
            payments,
            notifier,
            config,
        }
    }

    /// Verify, parse and apply one delivery.
    ///
    /// # Errors
    ///
    /// - `CommerceError::InvalidSignature` if the signature is missing or
    ///   wrong. Nothing is read from the payload in that case.
    /// - `CommerceError::MalformedPayload` if a verified body cannot be parsed
    /// - `CommerceError::Configuration` if the provider's secret is unset
    /// - `CommerceError::Repository` on database failure, so the provider
    ///   retries later
    #[instrument(skip(self, body, signature), fields(provider = %provider, bytes = body.len()))]
    pub async fn handle(
        &self,
        provider: PaymentProvider,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookAck, CommerceError> {
        let event = self
            .payments
            .adapter(provider)
            .verify_webhook(body, signature)
            .inspect_err(|e| warn!(error = %e, "Webhook rejected"))?;

        info!(
            event_type = %event.event_type,
            intent = event.intent.label(),
            "Webhook verified"
        );
        self.apply(provider, event.intent).await?;
        Ok(WebhookAck::for_event(provider, event.event_type))
    }

    /// Apply an intent from `provider`.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Repository` on database failure.
    pub async fn apply(
        &self,
        provider: PaymentProvider,
        intent: WebhookIntent,
    ) -> Result<(), CommerceError> {
        let engine = OrderEngine::new(
            self.repos,
            self.config.price_policy,
            self.config.default_currency,
        );
        let ledger = SubscriptionLedger::new(self.repos);

        match intent {
            WebhookIntent::MarkPaid {
                reference,
                charge_id,
                customer_email,
            } => {
                let outcome = engine
                    .mark_paid_by_reference(provider, &reference, charge_id.as_deref())
                    .await?;
                if let ProviderTransition::Transitioned(order) = outcome {
                    NotificationDispatcher::new(self.notifier, self.repos)
                        .order_paid(&order, customer_email.as_ref())
                        .await;
                }
            }
            WebhookIntent::MarkCancelled { reference } => {
                engine
                    .mark_cancelled_by_reference(provider, &reference)
                    .await?;
            }
            WebhookIntent::UpsertSubscription(event) => {
                ledger.upsert(provider, event).await?;
            }
            WebhookIntent::SetSubscriptionStatus {
                subscription_id,
                status,
            } => {
                ledger
                    .set_status(provider, &subscription_id, &status)
                    .await?;
            }
            WebhookIntent::Ignore { reason } => {
                info!(reason, "Webhook acknowledged without changes");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use hmac::{Hmac, Mac};
    use rust_decimal::Decimal;
    use secrecy::SecretString;
    use serde_json::json;
    use sha2::Sha512;

    use streetmerch_core::{CatalogCategory, Email, OrderStatus};

    use super::*;
    use crate::models::{CatalogItem, NewCatalogItem, Order, PaymentInfo};
    use crate::payments::CHECKOUT_SOURCE;
    use crate::services::{NotificationError, OrderConfirmation, PendingOrder};

    const PAYSTACK_SECRET: &str = "sk_test_9f8e7d6c5b4a39281706f5e4d3c2b1a0";

    #[derive(Default)]
    struct Recording {
        sent: Mutex<Vec<OrderConfirmation>>,
    }

    #[async_trait]
    impl OrderNotifier for Recording {
        async fn send_order_confirmation(
            &self,
            confirmation: &OrderConfirmation,
        ) -> Result<(), NotificationError> {
            self.sent.lock().unwrap().push(confirmation.clone());
            Ok(())
        }
    }

    struct Fixture {
        repos: Repositories,
        payments: Payments,
        config: StorefrontConfig,
        notifier: Recording,
    }

    impl Fixture {
        fn new() -> Self {
            let mut config = StorefrontConfig::local("https://shop.test");
            config.paystack.secret_key = Some(SecretString::from(PAYSTACK_SECRET));
            Self {
                repos: Repositories::in_memory(),
                payments: Payments::from_config(&config).unwrap(),
                config,
                notifier: Recording::default(),
            }
        }

        fn service(&self) -> WebhookService<'_> {
            WebhookService::new(
                &self.repos,
                &self.payments,
                Some(&self.notifier),
                &self.config,
            )
        }

        async fn item(&self, inventory: i32) -> CatalogItem {
            self.repos
                .catalog
                .create(NewCatalogItem {
                    name: "Sherpa Hoodie".to_string(),
                    description: None,
                    price: Decimal::from(50),
                    image_url: None,
                    category: CatalogCategory::Hoodie,
                    sizes: vec![],
                    inventory,
                    featured: false,
                    exclusive: false,
                })
                .await
                .unwrap()
        }

        async fn pending(&self, item: &CatalogItem, reference: &str) -> Order {
            let engine = OrderEngine::new(
                &self.repos,
                self.config.price_policy,
                self.config.default_currency,
            );
            let lines = engine
                .validate_cart(
                    &[crate::services::CartLine {
                        item_id: item.id,
                        variant: None,
                        quantity: 1,
                        unit_price: None,
                    }],
                    false,
                )
                .await
                .unwrap();
            engine
                .create_pending(PendingOrder {
                    customer_id: None,
                    guest_email: Some(Email::parse("guest@example.com").unwrap()),
                    lines,
                    currency: None,
                    shipping_address: None,
                    payment: PaymentInfo {
                        provider: PaymentProvider::Paystack,
                        reference: reference.to_string(),
                        charge_id: None,
                    },
                })
                .await
                .unwrap()
        }

        async fn order(&self, id: streetmerch_core::OrderId) -> Order {
            self.repos.orders.get(id).await.unwrap().unwrap()
        }

        async fn inventory(&self, item: &CatalogItem) -> i32 {
            self.repos.catalog.get(item.id).await.unwrap().unwrap().inventory
        }
    }

    fn sign(body: &[u8]) -> String {
        let mut mac = Hmac::<Sha512>::new_from_slice(PAYSTACK_SECRET.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    fn charge_success(reference: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "event": "charge.success",
            "data": {
                "id": 302_961,
                "reference": reference,
                "metadata": {"source": CHECKOUT_SOURCE},
                "customer": {"email": "payer@example.com"}
            }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_paid_webhook_replay_is_idempotent() {
        let fx = Fixture::new();
        let item = fx.item(3).await;
        let order = fx.pending(&item, "ref_1").await;
        let body = charge_success("ref_1");
        let signature = sign(&body);

        for _ in 0..2 {
            let ack = fx
                .service()
                .handle(PaymentProvider::Paystack, &body, Some(&signature))
                .await
                .unwrap();
            assert_eq!(ack.event.as_deref(), Some("charge.success"));
        }

        let order = fx.order(order.id).await;
        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(
            order.payment.unwrap().charge_id.as_deref(),
            Some("302961")
        );
        assert_eq!(fx.inventory(&item).await, 2);

        let sent = fx.notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient.as_str(), "guest@example.com");
        assert_eq!(sent[0].order.total, Decimal::from(50));
    }

    #[tokio::test]
    async fn test_tampered_body_changes_nothing() {
        let fx = Fixture::new();
        let item = fx.item(3).await;
        let order = fx.pending(&item, "ref_real").await;

        let signature = sign(&charge_success("ref_other"));
        let tampered = charge_success("ref_real");
        let err = fx
            .service()
            .handle(PaymentProvider::Paystack, &tampered, Some(&signature))
            .await
            .unwrap_err();

        assert!(matches!(err, CommerceError::InvalidSignature));
        assert_eq!(fx.order(order.id).await.status, OrderStatus::Pending);
        assert_eq!(fx.inventory(&item).await, 3);
        assert!(fx.notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_signature_rejected() {
        let fx = Fixture::new();
        let err = fx
            .service()
            .handle(PaymentProvider::Paystack, &charge_success("ref"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::InvalidSignature));
    }

    #[tokio::test]
    async fn test_unmatched_reference_is_acknowledged() {
        let fx = Fixture::new();
        let body = charge_success("ref_unknown");
        let ack = fx
            .service()
            .handle(PaymentProvider::Paystack, &body, Some(&sign(&body)))
            .await
            .unwrap();
        assert!(ack.received);
    }

    #[tokio::test]
    async fn test_malformed_verified_body() {
        let fx = Fixture::new();
        let body = b"not json";
        let err = fx
            .service()
            .handle(PaymentProvider::Paystack, body, Some(&sign(body)))
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::MalformedPayload(_)));
    }

    #[tokio::test]
    async fn test_subscription_lifecycle() {
        let fixture = Fixture::new();
        let fx = &fixture;
        let deliver = |body: serde_json::Value| {
            let body = serde_json::to_vec(&body).unwrap();
            let signature = sign(&body);
            async move {
                fx.service()
                    .handle(PaymentProvider::Paystack, &body, Some(&signature))
                    .await
                    .unwrap()
            }
        };

        deliver(json!({
            "event": "subscription.create",
            "data": {
                "subscription_code": "SUB_life",
                "customer": {"email": "member@example.com", "customer_code": "CUS_1"},
                "plan": {"plan_code": "PLN_1"}
            }
        }))
        .await;
        deliver(json!({
            "event": "subscription.not_renew",
            "data": {"subscription_code": "SUB_life"}
        }))
        .await;

        let email = Email::parse("member@example.com").unwrap();
        let records = fx
            .repos
            .subscriptions
            .list_for_customer(streetmerch_core::CustomerId::new(0), &email)
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status.as_str(), "non-renewing");
        assert!(records[0].is_entitling());

        deliver(json!({
            "event": "subscription.disable",
            "data": {"subscription_code": "SUB_life"}
        }))
        .await;
        let records = fx
            .repos
            .subscriptions
            .list_for_customer(streetmerch_core::CustomerId::new(0), &email)
            .await
            .unwrap();
        assert!(!records[0].is_entitling());
    }
}
