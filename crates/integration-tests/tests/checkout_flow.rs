//! End-to-end checkout: cart -> hosted checkout -> signed webhook -> order.
//!
//! Every test drives the real router and the real payment adapters. Only the
//! provider's REST API is faked.

use rust_decimal::Decimal;
use serde_json::{Value, json};

use streetmerch_core::{OrderId, OrderStatus, PaymentProvider};
use streetmerch_integration_tests::{
    STRIPE_WEBHOOK_SECRET, Shopper, TestApp, cart, stripe_completed, stripe_expired,
    stripe_signature,
};

const MEMBER: Shopper<'static> = Shopper {
    subject: "auth0|member-1",
    email: "ama@example.com",
};

fn decimal(value: &Value) -> Decimal {
    value.as_str().unwrap().parse().unwrap()
}

async fn order_status(app: &TestApp, id: &Value) -> OrderStatus {
    let id: OrderId = id.as_str().unwrap().parse().unwrap();
    app.repos.orders.get(id).await.unwrap().unwrap().status
}

// =============================================================================
// Card network (Stripe)
// =============================================================================

#[tokio::test]
async fn test_stripe_checkout_paid_by_webhook() {
    let app = TestApp::spawn().await;
    let item = app.seed_item("Box Logo Hoodie", 50, 5, false).await;

    let (status, checkout) = app
        .post(
            "/api/checkout/stripe",
            None,
            cart(&item, 1, Some("guest@example.com")),
        )
        .await;
    assert_eq!(status, 200, "{checkout}");
    assert_eq!(checkout["provider"], "stripe");
    assert_eq!(checkout["member_discount"], false);
    let session_id = checkout["reference"].as_str().unwrap().to_owned();
    assert!(checkout["url"].as_str().unwrap().contains(&session_id));
    assert_eq!(
        order_status(&app, &checkout["order_id"]).await,
        OrderStatus::Pending
    );

    let (status, ack) = app
        .stripe_webhook(&stripe_completed(&session_id, "guest@example.com"))
        .await;
    assert_eq!(status, 200);
    assert_eq!(
        ack,
        json!({"received": true, "type": "checkout.session.completed"})
    );

    assert_eq!(
        order_status(&app, &checkout["order_id"]).await,
        OrderStatus::Paid
    );
    assert_eq!(app.inventory(&item).await, 4);

    let sent = app.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient.as_str(), "guest@example.com");
    assert_eq!(sent[0].order.total, Decimal::from(50));
    assert_eq!(sent[0].order.provider(), Some(PaymentProvider::Stripe));
}

#[tokio::test]
async fn test_stripe_session_expired_cancels_order() {
    let app = TestApp::spawn().await;
    let item = app.seed_item("Box Logo Hoodie", 50, 5, false).await;

    let (_, checkout) = app
        .post(
            "/api/checkout/stripe",
            None,
            cart(&item, 1, Some("guest@example.com")),
        )
        .await;
    let session_id = checkout["reference"].as_str().unwrap();

    let (status, _) = app.stripe_webhook(&stripe_expired(session_id)).await;
    assert_eq!(status, 200);

    assert_eq!(
        order_status(&app, &checkout["order_id"]).await,
        OrderStatus::Cancelled
    );
    assert_eq!(app.inventory(&item).await, 5);
    assert!(app.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_exclusive_item_rejected_for_anonymous_shopper() {
    let app = TestApp::spawn().await;
    let item = app.seed_item("Members Drop Jacket", 120, 10, true).await;

    let (status, body) = app
        .post(
            "/api/checkout/stripe",
            None,
            cart(&item, 1, Some("guest@example.com")),
        )
        .await;

    assert_eq!(status, 403);
    assert_eq!(
        body["error"],
        "Members Drop Jacket is reserved for members. Sign in to buy it."
    );
    assert_eq!(app.store.order_count(), 0);
    assert!(app.provider.requests().is_empty());
}

#[tokio::test]
async fn test_member_pays_discounted_price() {
    let app = TestApp::spawn().await;
    let item = app.seed_item("Heavyweight Tee", 100, 5, false).await;
    app.seed_subscription(PaymentProvider::Paystack, MEMBER.email, "active")
        .await;

    let (status, checkout) = app
        .post("/api/checkout/stripe", Some(MEMBER), cart(&item, 1, None))
        .await;
    assert_eq!(status, 200, "{checkout}");
    assert_eq!(checkout["member_discount"], true);

    let requests = app.provider.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0]
            .form_field("line_items[0][price_data][unit_amount]")
            .as_deref(),
        Some("9000")
    );
    assert_eq!(
        requests[0].form_field("customer_email").as_deref(),
        Some(MEMBER.email)
    );

    let (_, order) = app
        .get(
            &format!("/api/orders/{}", checkout["order_id"].as_str().unwrap()),
            Some(MEMBER),
        )
        .await;
    assert_eq!(decimal(&order["total"]), Decimal::from(90));
    assert_eq!(decimal(&order["lines"][0]["unit_price"]), Decimal::from(90));
}

#[tokio::test]
async fn test_webhook_replay_decrements_once() {
    let app = TestApp::spawn().await;
    let item = app.seed_item("Box Logo Hoodie", 50, 5, false).await;
    let (_, checkout) = app
        .post("/api/checkout/stripe", None, cart(&item, 2, Some("g@example.com")))
        .await;
    let event = stripe_completed(checkout["reference"].as_str().unwrap(), "g@example.com");

    for _ in 0..3 {
        let (status, _) = app.stripe_webhook(&event).await;
        assert_eq!(status, 200);
    }

    assert_eq!(app.inventory(&item).await, 3);
    assert_eq!(app.notifier.sent().len(), 1);
}

#[tokio::test]
async fn test_oversold_item_floors_at_zero() {
    let app = TestApp::spawn().await;
    let item = app.seed_item("Last Two Cap", 30, 2, false).await;

    let mut sessions = Vec::new();
    for email in ["a@example.com", "b@example.com"] {
        let (status, checkout) = app
            .post("/api/checkout/stripe", None, cart(&item, 2, Some(email)))
            .await;
        assert_eq!(status, 200);
        sessions.push((checkout["reference"].as_str().unwrap().to_owned(), email));
    }

    for (session_id, email) in &sessions {
        app.stripe_webhook(&stripe_completed(session_id, email))
            .await;
    }

    assert_eq!(app.inventory(&item).await, 0);
    assert_eq!(app.notifier.sent().len(), 2);
}

#[tokio::test]
async fn test_tampered_webhook_rejected_without_changes() {
    let app = TestApp::spawn().await;
    let item = app.seed_item("Box Logo Hoodie", 50, 5, false).await;
    let (_, checkout) = app
        .post("/api/checkout/stripe", None, cart(&item, 1, Some("g@example.com")))
        .await;
    let session_id = checkout["reference"].as_str().unwrap();

    let original = serde_json::to_vec(&stripe_expired(session_id)).unwrap();
    let signature = stripe_signature(&original, STRIPE_WEBHOOK_SECRET);
    let tampered = serde_json::to_vec(&stripe_completed(session_id, "g@example.com")).unwrap();

    let (status, body) = app
        .webhook("stripe", "stripe-signature", &signature, tampered)
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "invalid webhook signature");

    assert_eq!(
        order_status(&app, &checkout["order_id"]).await,
        OrderStatus::Pending
    );
    assert_eq!(app.inventory(&item).await, 5);
    assert!(app.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_unknown_session_is_acknowledged() {
    let app = TestApp::spawn().await;
    let (status, ack) = app
        .stripe_webhook(&stripe_completed("cs_test_unknown", "g@example.com"))
        .await;
    assert_eq!(status, 200);
    assert_eq!(ack["received"], true);
}

#[tokio::test]
async fn test_stale_cart_price_rejected() {
    let app = TestApp::spawn().await;
    let item = app.seed_item("Box Logo Hoodie", 50, 5, false).await;

    let (status, body) = app
        .post(
            "/api/checkout/stripe",
            None,
            json!({
                "lines": [{"item_id": item.id, "quantity": 1, "unit_price": "1.00"}],
                "guest_email": "g@example.com"
            }),
        )
        .await;
    assert_eq!(status, 400);
    assert!(body["error"].as_str().unwrap().contains("has changed"));
    assert_eq!(app.store.order_count(), 0);
}

#[tokio::test]
async fn test_guest_needs_email() {
    let app = TestApp::spawn().await;
    let item = app.seed_item("Box Logo Hoodie", 50, 5, false).await;

    let (status, _) = app
        .post("/api/checkout/stripe", None, cart(&item, 1, None))
        .await;
    assert_eq!(status, 400);
    assert!(app.provider.requests().is_empty());
}

// =============================================================================
// Regional processor (Paystack)
// =============================================================================

#[tokio::test]
async fn test_paystack_checkout_paid_by_charge_event() {
    let app = TestApp::spawn().await;
    let item = app.seed_item("Box Logo Hoodie", 50, 5, false).await;

    let (status, checkout) = app
        .post(
            "/api/checkout/paystack",
            None,
            cart(&item, 1, Some("kwame@example.com")),
        )
        .await;
    assert_eq!(status, 200, "{checkout}");
    let reference = checkout["reference"].as_str().unwrap().to_owned();

    let initialize = app.provider.requests().remove(0);
    assert_eq!(initialize.path, "/transaction/initialize");
    assert_eq!(initialize.json()["amount"], 5000);
    assert_eq!(initialize.json()["email"], "kwame@example.com");

    let (status, ack) = app
        .paystack_webhook(&json!({
            "event": "charge.success",
            "data": {
                "id": 4_099_260_516_u64,
                "reference": reference,
                "metadata": {"source": "streetmerch-website"},
                "customer": {"email": "kwame@example.com"}
            }
        }))
        .await;
    assert_eq!(status, 200);
    assert_eq!(ack, json!({"received": true, "event": "charge.success"}));

    assert_eq!(
        order_status(&app, &checkout["order_id"]).await,
        OrderStatus::Paid
    );
    assert_eq!(app.inventory(&item).await, 4);
}

#[tokio::test]
async fn test_paystack_membership_charge_leaves_orders_alone() {
    let app = TestApp::spawn().await;
    let item = app.seed_item("Box Logo Hoodie", 50, 5, false).await;
    let (_, checkout) = app
        .post(
            "/api/checkout/paystack",
            None,
            cart(&item, 1, Some("kwame@example.com")),
        )
        .await;

    let (status, _) = app
        .paystack_webhook(&json!({
            "event": "charge.success",
            "data": {
                "id": 1,
                "reference": checkout["reference"],
                "metadata": {"source": "streetmerch-membership"},
                "customer": {"email": "kwame@example.com"}
            }
        }))
        .await;
    assert_eq!(status, 200);
    assert_eq!(
        order_status(&app, &checkout["order_id"]).await,
        OrderStatus::Pending
    );
}

#[tokio::test]
async fn test_paystack_bad_signature() {
    let app = TestApp::spawn().await;
    let (status, _) = app
        .webhook(
            "paystack",
            "x-paystack-signature",
            "00ff",
            br#"{"event":"charge.success","data":{}}"#.to_vec(),
        )
        .await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_unknown_provider_is_not_found() {
    let app = TestApp::spawn().await;
    let (status, _) = app
        .webhook("paypal", "x-signature", "sig", b"{}".to_vec())
        .await;
    assert_eq!(status, 404);
}
