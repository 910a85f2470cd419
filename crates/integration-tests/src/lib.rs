//! Integration test support for the Streetmerch storefront.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p streetmerch-integration-tests
//! ```
//!
//! No database or network access is needed. [`TestApp`] builds the full
//! router over the in-memory store, and [`FakeProvider`] serves the Stripe and
//! Paystack endpoints the adapters call on an ephemeral local port.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{Method, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::{Value, json};
use sha2::{Sha256, Sha512};
use tower::ServiceExt;

use streetmerch_core::{CatalogCategory, Email, PaymentProvider, SubscriptionStatus};
use streetmerch_storefront::config::StorefrontConfig;
use streetmerch_storefront::db::{MemoryStore, Repositories};
use streetmerch_storefront::models::{CatalogItem, NewCatalogItem, SubscriptionUpsert};
use streetmerch_storefront::payments::Payments;
use streetmerch_storefront::services::{NotificationError, OrderConfirmation, OrderNotifier};
use streetmerch_storefront::state::AppState;

pub const STRIPE_SECRET_KEY: &str = "sk_test_51Nq8vLkR2mXw7pZt4yHc";
pub const STRIPE_WEBHOOK_SECRET: &str = "whsec_3kT9mQ2vX8nR5wL1pZ7yB4cF";
pub const PAYSTACK_SECRET_KEY: &str = "sk_test_7d1f0c9e8b2a4f6d3c5e9a1b";
pub const ADMIN_PASSWORD: &str = "drop-day-7Hq2kP9x";

// =============================================================================
// Fake payment provider
// =============================================================================

/// One request received by the fake provider.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub method: Method,
    pub path: String,
    pub body: String,
}

impl ProviderRequest {
    /// Decoded form field (Stripe requests are form-encoded).
    #[must_use]
    pub fn form_field(&self, key: &str) -> Option<String> {
        url::form_urlencoded::parse(self.body.as_bytes())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    /// Parsed JSON body (Paystack requests are JSON).
    #[must_use]
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

/// Stripe subscription object after an update or delete.
fn fake_subscription(subscription_id: &str, request: &ProviderRequest) -> Response {
    let (status, cancel_at_period_end) = if request.method == Method::DELETE {
        ("canceled", false)
    } else {
        (
            "active",
            request.form_field("cancel_at_period_end").as_deref() == Some("true"),
        )
    };
    Json(json!({
        "id": subscription_id,
        "object": "subscription",
        "status": status,
        "cancel_at_period_end": cancel_at_period_end,
    }))
    .into_response()
}

/// Stand-in for both providers' REST APIs.
#[derive(Clone, Default)]
pub struct FakeProvider {
    requests: Arc<Mutex<Vec<ProviderRequest>>>,
    counter: Arc<AtomicUsize>,
    base_url: String,
}

impl FakeProvider {
    /// Serve on an ephemeral port.
    pub async fn spawn() -> Self {
        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        let fake = Self {
            base_url: format!("http://{addr}"),
            ..Self::default()
        };

        let router = Router::new()
            .fallback(fake_endpoint)
            .with_state(fake.clone());
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        fake
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn fake_endpoint(
    State(fake): State<FakeProvider>,
    method: Method,
    uri: Uri,
    body: String,
) -> Response {
    let n = fake.counter.fetch_add(1, Ordering::SeqCst) + 1;
    let path = uri.path().to_owned();
    let request = ProviderRequest {
        method: method.clone(),
        path: path.clone(),
        body,
    };
    fake.requests.lock().unwrap().push(request.clone());

    if let Some(subscription_id) = path.strip_prefix("/v1/subscriptions/") {
        return fake_subscription(subscription_id, &request);
    }

    match path.as_str() {
        "/v1/checkout/sessions" => Json(json!({
            "id": format!("cs_test_{n}"),
            "url": format!("https://checkout.stripe.test/c/pay/cs_test_{n}"),
        }))
        .into_response(),
        "/v1/billing_portal/sessions" => Json(json!({
            "url": format!("https://billing.stripe.test/p/session/{n}"),
        }))
        .into_response(),
        "/transaction/initialize" => Json(json!({
            "status": true,
            "message": "Authorization URL created",
            "data": {
                "authorization_url": format!("https://checkout.paystack.test/{n}"),
                "access_code": format!("ac_{n}"),
                "reference": format!("ps_ref_{n}"),
            }
        }))
        .into_response(),
        _ => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": {"message": format!("no fake for {path}")}})),
        )
            .into_response(),
    }
}

// =============================================================================
// Notifier
// =============================================================================

/// Records confirmations instead of sending them.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<OrderConfirmation>>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn sent(&self) -> Vec<OrderConfirmation> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl OrderNotifier for RecordingNotifier {
    async fn send_order_confirmation(
        &self,
        confirmation: &OrderConfirmation,
    ) -> Result<(), NotificationError> {
        self.sent.lock().unwrap().push(confirmation.clone());
        Ok(())
    }
}

// =============================================================================
// Application under test
// =============================================================================

/// A signed-in shopper, as forwarded by the identity provider.
#[derive(Debug, Clone, Copy)]
pub struct Shopper<'a> {
    pub subject: &'a str,
    pub email: &'a str,
}

/// Full storefront router over the in-memory store.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub repos: Repositories,
    pub provider: FakeProvider,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    /// Spawn with a config tweak applied on top of the test defaults.
    pub async fn spawn_with(tweak: impl FnOnce(&mut StorefrontConfig)) -> Self {
        let provider = FakeProvider::spawn().await;

        let mut config = StorefrontConfig::local("https://shop.test");
        config.stripe.api_base = provider.base_url().to_owned();
        config.stripe.secret_key = Some(SecretString::from(STRIPE_SECRET_KEY));
        config.stripe.webhook_secret = Some(SecretString::from(STRIPE_WEBHOOK_SECRET));
        config.stripe.monthly_price_id = Some("price_monthly_test".to_owned());
        config.paystack.api_base = provider.base_url().to_owned();
        config.paystack.secret_key = Some(SecretString::from(PAYSTACK_SECRET_KEY));
        config.admin.password = Some(SecretString::from(ADMIN_PASSWORD));
        tweak(&mut config);

        let store = Arc::new(MemoryStore::new());
        let repos = Repositories::from_memory(store.clone());
        let payments = Payments::from_config(&config).unwrap();
        let notifier = Arc::new(RecordingNotifier::default());
        let state = AppState::new(
            config,
            repos.clone(),
            payments,
            Some(notifier.clone() as Arc<dyn OrderNotifier>),
        );

        Self {
            router: streetmerch_storefront::app(state),
            store,
            repos,
            provider,
            notifier,
        }
    }

    /// Add an active item straight to the catalog.
    pub async fn seed_item(
        &self,
        name: &str,
        price: i64,
        inventory: i32,
        exclusive: bool,
    ) -> CatalogItem {
        self.repos
            .catalog
            .create(NewCatalogItem {
                name: name.to_owned(),
                description: None,
                price: Decimal::from(price),
                image_url: None,
                category: if exclusive {
                    CatalogCategory::Limited
                } else {
                    CatalogCategory::Hoodie
                },
                sizes: vec!["M".to_owned(), "L".to_owned()],
                inventory,
                featured: false,
                exclusive,
            })
            .await
            .unwrap()
    }

    /// Record a subscription as if a provider webhook had reported it, and
    /// return its provider id.
    pub async fn seed_subscription(
        &self,
        provider: PaymentProvider,
        email: &str,
        status: &str,
    ) -> String {
        let handle: String = email.chars().filter(char::is_ascii_alphanumeric).collect();
        let subscription_id = format!("sub_{handle}");
        self.repos
            .subscriptions
            .upsert(SubscriptionUpsert {
                provider,
                subscription_id: subscription_id.clone(),
                provider_customer_id: Some(format!("cus_{handle}")),
                plan_id: None,
                status: SubscriptionStatus::new(status),
                cancel_at_period_end: false,
                email: Some(Email::parse(email).unwrap()),
                customer_id: None,
            })
            .await
            .unwrap();
        subscription_id
    }

    pub async fn inventory(&self, item: &CatalogItem) -> i32 {
        self.repos
            .catalog
            .get(item.id)
            .await
            .unwrap()
            .unwrap()
            .inventory
    }

    /// Send a request and return status plus JSON body (`Null` if empty).
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, shopper: Option<Shopper<'_>>) -> (StatusCode, Value) {
        self.send(request(Method::GET, uri, shopper, &[], None))
            .await
    }

    pub async fn post(
        &self,
        uri: &str,
        shopper: Option<Shopper<'_>>,
        body: Value,
    ) -> (StatusCode, Value) {
        self.send(request(Method::POST, uri, shopper, &[], Some(body)))
            .await
    }

    /// Admin request with the correct password.
    pub async fn admin(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.send(request(
            method,
            uri,
            None,
            &[("x-admin-password", ADMIN_PASSWORD)],
            body,
        ))
        .await
    }

    /// Deliver a correctly signed Stripe event.
    pub async fn stripe_webhook(&self, event: &Value) -> (StatusCode, Value) {
        let body = serde_json::to_vec(event).unwrap();
        let signature = stripe_signature(&body, STRIPE_WEBHOOK_SECRET);
        self.webhook("stripe", "stripe-signature", &signature, body)
            .await
    }

    /// Deliver a correctly signed Paystack event.
    pub async fn paystack_webhook(&self, event: &Value) -> (StatusCode, Value) {
        let body = serde_json::to_vec(event).unwrap();
        let signature = paystack_signature(&body, PAYSTACK_SECRET_KEY);
        self.webhook("paystack", "x-paystack-signature", &signature, body)
            .await
    }

    /// Deliver raw bytes with an arbitrary signature header.
    pub async fn webhook(
        &self,
        provider: &str,
        header: &str,
        signature: &str,
        body: Vec<u8>,
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(format!("/webhooks/{provider}"))
            .header("content-type", "application/json")
            .header(header, signature)
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }
}

/// Build a JSON request, with identity headers for `shopper`.
#[must_use]
pub fn request(
    method: Method,
    uri: &str,
    shopper: Option<Shopper<'_>>,
    headers: &[(&str, &str)],
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(shopper) = shopper {
        builder = builder
            .header("x-auth-subject", shopper.subject)
            .header("x-auth-email", shopper.email);
    }
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// `stripe-signature` header value for `body`, timestamped now.
#[must_use]
pub fn stripe_signature(body: &[u8], secret: &str) -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    format!(
        "t={timestamp},v1={}",
        hex::encode(mac.finalize().into_bytes())
    )
}

/// `x-paystack-signature` header value for `body`.
#[must_use]
pub fn paystack_signature(body: &[u8], secret: &str) -> String {
    let mut mac = Hmac::<Sha512>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// A one-line cart body for `POST /api/checkout/{provider}`.
#[must_use]
pub fn cart(item: &CatalogItem, quantity: u32, guest_email: Option<&str>) -> Value {
    let mut body = json!({
        "lines": [{"item_id": item.id, "variant": "M", "quantity": quantity}],
    });
    if let Some(email) = guest_email {
        body["guest_email"] = json!(email);
    }
    body
}

/// Stripe `checkout.session.completed` for `session_id`.
#[must_use]
pub fn stripe_completed(session_id: &str, email: &str) -> Value {
    json!({
        "id": "evt_completed",
        "type": "checkout.session.completed",
        "data": {"object": {
            "id": session_id,
            "object": "checkout.session",
            "mode": "payment",
            "payment_status": "paid",
            "payment_intent": "pi_3Qx7",
            "customer_details": {"email": email}
        }}
    })
}

/// Stripe `checkout.session.expired` for `session_id`.
#[must_use]
pub fn stripe_expired(session_id: &str) -> Value {
    json!({
        "id": "evt_expired",
        "type": "checkout.session.expired",
        "data": {"object": {
            "id": session_id,
            "object": "checkout.session",
            "mode": "payment",
            "payment_status": "unpaid"
        }}
    })
}
