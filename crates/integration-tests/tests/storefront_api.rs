//! Storefront API: catalog, customers, orders, membership and admin routes.

use axum::http::Method;
use serde_json::json;

use streetmerch_core::{CatalogItemId, PaymentProvider};
use streetmerch_integration_tests::{
    ADMIN_PASSWORD, ProviderRequest, Shopper, TestApp, cart, request, stripe_completed,
};

const KOFI: Shopper<'static> = Shopper {
    subject: "auth0|kofi",
    email: "kofi@example.com",
};

const STRANGER: Shopper<'static> = Shopper {
    subject: "auth0|stranger",
    email: "stranger@example.com",
};

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoints() {
    let app = TestApp::spawn().await;
    let (status, body) = app.get("/health", None).await;
    assert_eq!(status, 200);
    assert_eq!(body, "ok");

    let (status, _) = app.get("/health/ready", None).await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let app = TestApp::spawn().await;
    let response = tower::ServiceExt::oneshot(
        app.router.clone(),
        request(Method::GET, "/health", None, &[("x-request-id", "lb-42")], None),
    )
    .await
    .unwrap();
    assert_eq!(response.headers()["x-request-id"], "lb-42");
}

// =============================================================================
// Catalog
// =============================================================================

#[tokio::test]
async fn test_catalog_lists_limited_first_and_hides_inactive() {
    let app = TestApp::spawn().await;
    let hoodie = app.seed_item("Box Logo Hoodie", 65, 10, false).await;
    let drop = app.seed_item("Members Drop Jacket", 150, 3, true).await;
    let retired = app.seed_item("Retired Tee", 25, 0, false).await;

    let (status, _) = app
        .admin(
            Method::POST,
            &format!("/admin/catalog/{}/deactivate", retired.id),
            None,
        )
        .await;
    assert_eq!(status, 200);

    let (status, items) = app.get("/api/catalog", None).await;
    assert_eq!(status, 200);
    let names: Vec<&str> = items
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec![drop.name.as_str(), hoodie.name.as_str()]);

    let (status, items) = app.get("/api/catalog?category=hoodie", None).await;
    assert_eq!(status, 200);
    assert_eq!(items.as_array().unwrap().len(), 1);

    let (status, _) = app
        .get(&format!("/api/catalog/{}", retired.id), None)
        .await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_featured_catalog() {
    let app = TestApp::spawn().await;
    app.seed_item("Plain Cap", 20, 10, false).await;
    let (status, created) = app
        .admin(
            Method::POST,
            "/admin/catalog",
            Some(json!({
                "name": "Box Logo Hoodie",
                "price": "65.00",
                "category": "hoodie",
                "inventory": 10,
                "featured": true
            })),
        )
        .await;
    assert_eq!(status, 201, "{created}");

    let (_, featured) = app.get("/api/catalog/featured", None).await;
    let featured = featured.as_array().unwrap();
    assert_eq!(featured.len(), 1);
    assert_eq!(featured[0]["name"], "Box Logo Hoodie");
}

// =============================================================================
// Admin gate
// =============================================================================

#[tokio::test]
async fn test_admin_requires_password() {
    let app = TestApp::spawn().await;
    let body = json!({"name": "Cap", "price": "20", "category": "cap", "inventory": 1});

    let (status, _) = app
        .send(request(
            Method::POST,
            "/admin/catalog",
            None,
            &[],
            Some(body.clone()),
        ))
        .await;
    assert_eq!(status, 401);

    let (status, _) = app
        .send(request(
            Method::POST,
            "/admin/catalog",
            None,
            &[("x-admin-password", "guess")],
            Some(body),
        ))
        .await;
    assert_eq!(status, 401);
    assert!(app.repos.catalog.get(CatalogItemId::new(1)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_admin_email_gate() {
    let app = TestApp::spawn_with(|config| {
        config.admin.email = Some("owner@example.com".to_owned());
    })
    .await;
    let body = json!({"name": "Cap", "price": "20", "category": "cap", "inventory": 1});
    let password = ("x-admin-password", ADMIN_PASSWORD);

    let (status, _) = app
        .send(request(
            Method::POST,
            "/admin/catalog",
            Some(KOFI),
            &[password],
            Some(body.clone()),
        ))
        .await;
    assert_eq!(status, 403);

    let owner = Shopper {
        subject: "auth0|owner",
        email: "owner@example.com",
    };
    let (status, _) = app
        .send(request(
            Method::POST,
            "/admin/catalog",
            Some(owner),
            &[password],
            Some(body),
        ))
        .await;
    assert_eq!(status, 201);
}

#[tokio::test]
async fn test_admin_validation() {
    let app = TestApp::spawn().await;
    let (status, body) = app
        .admin(
            Method::POST,
            "/admin/catalog",
            Some(json!({"name": "  ", "price": "20", "category": "cap", "inventory": 1})),
        )
        .await;
    assert_eq!(status, 400, "{body}");

    let item = app.seed_item("Box Logo Hoodie", 65, 10, false).await;
    let (status, updated) = app
        .admin(
            Method::PUT,
            &format!("/admin/catalog/{}", item.id),
            Some(json!({"price": "70.00", "inventory": 12})),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(updated["inventory"], 12);
    assert_eq!(app.inventory(&item).await, 12);
}

// =============================================================================
// Customers and orders
// =============================================================================

#[tokio::test]
async fn test_customer_created_on_first_sign_in() {
    let app = TestApp::spawn().await;
    let (status, customer) = app.post("/api/customers/me", Some(KOFI), json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(customer["email"], KOFI.email);
    assert_eq!(customer["role"], "customer");

    let (_, again) = app.post("/api/customers/me", Some(KOFI), json!({})).await;
    assert_eq!(again["id"], customer["id"]);

    let (status, _) = app.post("/api/customers/me", None, json!({})).await;
    assert_eq!(status, 401);
}

#[tokio::test]
async fn test_orders_visible_to_owner_only() {
    let app = TestApp::spawn().await;
    let item = app.seed_item("Box Logo Hoodie", 50, 5, false).await;
    let (status, checkout) = app
        .post("/api/checkout/stripe", Some(KOFI), cart(&item, 1, None))
        .await;
    assert_eq!(status, 200);
    let order_uri = format!("/api/orders/{}", checkout["order_id"].as_str().unwrap());

    let (status, orders) = app.get("/api/orders", Some(KOFI)).await;
    assert_eq!(status, 200);
    assert_eq!(orders.as_array().unwrap().len(), 1);
    assert_eq!(orders[0]["status"], "pending");
    assert_eq!(orders[0]["display_total"], "$50.00");
    assert_eq!(orders[0]["short_id"].as_str().unwrap().len(), 8);

    let (status, _) = app.get(&order_uri, Some(KOFI)).await;
    assert_eq!(status, 200);
    let (status, _) = app.get(&order_uri, Some(STRANGER)).await;
    assert_eq!(status, 404);
    let (status, _) = app.get(&order_uri, None).await;
    assert_eq!(status, 401);
    let (status, _) = app.admin(Method::GET, &order_uri, None).await;
    assert_eq!(status, 200);

    let (_, stranger_orders) = app.get("/api/orders", Some(STRANGER)).await;
    assert!(stranger_orders.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_operator_fulfilment() {
    let app = TestApp::spawn().await;
    let item = app.seed_item("Box Logo Hoodie", 50, 5, false).await;
    let (_, checkout) = app
        .post("/api/checkout/stripe", None, cart(&item, 1, Some("g@example.com")))
        .await;
    let status_uri = format!(
        "/admin/orders/{}/status",
        checkout["order_id"].as_str().unwrap()
    );

    // Pending orders belong to the provider until paid.
    let (status, _) = app
        .admin(Method::POST, &status_uri, Some(json!({"status": "shipped"})))
        .await;
    assert_eq!(status, 409);

    app.stripe_webhook(&stripe_completed(
        checkout["reference"].as_str().unwrap(),
        "g@example.com",
    ))
    .await;

    let (status, order) = app
        .admin(
            Method::POST,
            &status_uri,
            Some(json!({"status": "processing"})),
        )
        .await;
    assert_eq!(status, 200, "{order}");
    let (status, order) = app
        .admin(
            Method::POST,
            &status_uri,
            Some(json!({"status": "shipped", "tracking_number": "1Z999AA10123456784"})),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(order["status"], "shipped");
    assert_eq!(order["tracking_number"], "1Z999AA10123456784");

    let (status, _) = app
        .admin(Method::POST, "/admin/orders/not-a-uuid/status", Some(json!({"status": "paid"})))
        .await;
    assert_eq!(status, 404);
}

// =============================================================================
// Membership
// =============================================================================

#[tokio::test]
async fn test_membership_status_union() {
    let app = TestApp::spawn().await;

    let (status, body) = app.get("/api/subscriptions/status", Some(KOFI)).await;
    assert_eq!(status, 200);
    assert_eq!(body["entitled"], false);

    app.seed_subscription(PaymentProvider::Stripe, KOFI.email, "canceled")
        .await;
    let (_, body) = app.get("/api/subscriptions/status", Some(KOFI)).await;
    assert_eq!(body["entitled"], false);

    app.seed_subscription(PaymentProvider::Paystack, KOFI.email, "active")
        .await;
    let (_, body) = app.get("/api/subscriptions/status", Some(KOFI)).await;
    assert_eq!(body["entitled"], true);
    assert_eq!(body["provider"], "paystack");

    let (status, _) = app.get("/api/subscriptions/status", None).await;
    assert_eq!(status, 401);
}

#[tokio::test]
async fn test_membership_checkout_and_portal() {
    let app = TestApp::spawn().await;

    let (status, session) = app
        .post(
            "/api/subscriptions/checkout/stripe",
            Some(KOFI),
            json!({"cycle": "monthly"}),
        )
        .await;
    assert_eq!(status, 200, "{session}");
    assert!(session["url"].as_str().unwrap().starts_with("https://checkout.stripe.test"));

    let (status, body) = app
        .post(
            "/api/subscriptions/checkout/stripe",
            Some(KOFI),
            json!({"cycle": "annual"}),
        )
        .await;
    assert_eq!(status, 503);
    assert!(body["error"].as_str().unwrap().contains("STRIPE_ANNUAL_PRICE_ID"));

    let (status, _) = app
        .post("/api/subscriptions/portal/stripe", Some(KOFI), json!({}))
        .await;
    assert_eq!(status, 404);

    app.seed_subscription(PaymentProvider::Stripe, KOFI.email, "active")
        .await;
    let (status, portal) = app
        .post("/api/subscriptions/portal/stripe", Some(KOFI), json!({}))
        .await;
    assert_eq!(status, 200, "{portal}");
    assert!(portal["url"].as_str().unwrap().starts_with("https://billing.stripe.test"));
}

fn subscription_calls(app: &TestApp) -> Vec<ProviderRequest> {
    app.provider
        .requests()
        .into_iter()
        .filter(|r| r.path.starts_with("/v1/subscriptions/"))
        .collect()
}

#[tokio::test]
async fn test_membership_cancel_at_period_end_then_reactivate() {
    let app = TestApp::spawn().await;
    let id = app
        .seed_subscription(PaymentProvider::Stripe, KOFI.email, "active")
        .await;
    let cancel_uri = format!("/api/subscriptions/stripe/{id}/cancel");
    let reactivate_uri = format!("/api/subscriptions/stripe/{id}/reactivate");

    // Nothing to undo yet.
    let (status, _) = app.post(&reactivate_uri, Some(KOFI), json!({})).await;
    assert_eq!(status, 409);
    assert!(subscription_calls(&app).is_empty());

    let (status, body) = app.post(&cancel_uri, Some(KOFI), json!({})).await;
    assert_eq!(status, 200, "{body}");
    assert_eq!(body["entitled"], true);
    assert_eq!(body["cancel_at_period_end"], true);

    let calls = subscription_calls(&app);
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, Method::POST);
    assert_eq!(calls[0].path, format!("/v1/subscriptions/{id}"));
    assert_eq!(
        calls[0].form_field("cancel_at_period_end").as_deref(),
        Some("true")
    );

    let (status, body) = app.post(&reactivate_uri, Some(KOFI), json!({})).await;
    assert_eq!(status, 200, "{body}");
    assert_eq!(body["entitled"], true);
    assert_eq!(body["cancel_at_period_end"], false);

    let calls = subscription_calls(&app);
    assert_eq!(calls.len(), 2);
    assert_eq!(
        calls[1].form_field("cancel_at_period_end").as_deref(),
        Some("false")
    );
}

#[tokio::test]
async fn test_membership_cancel_immediately_ends_entitlement() {
    let app = TestApp::spawn().await;
    let id = app
        .seed_subscription(PaymentProvider::Stripe, KOFI.email, "active")
        .await;

    let (status, body) = app
        .post(
            &format!("/api/subscriptions/stripe/{id}/cancel"),
            Some(KOFI),
            json!({"immediately": true}),
        )
        .await;
    assert_eq!(status, 200, "{body}");
    assert_eq!(body["entitled"], false);

    let calls = subscription_calls(&app);
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, Method::DELETE);

    let (_, body) = app.get("/api/subscriptions/status", Some(KOFI)).await;
    assert_eq!(body["entitled"], false);
}

#[tokio::test]
async fn test_membership_cancel_is_owner_only() {
    let app = TestApp::spawn().await;
    let id = app
        .seed_subscription(PaymentProvider::Stripe, KOFI.email, "active")
        .await;
    let cancel_uri = format!("/api/subscriptions/stripe/{id}/cancel");

    let (status, _) = app.post(&cancel_uri, Some(STRANGER), json!({})).await;
    assert_eq!(status, 404);
    let (status, _) = app
        .post(
            &format!("/api/subscriptions/stripe/{id}/reactivate"),
            Some(STRANGER),
            json!({}),
        )
        .await;
    assert_eq!(status, 404);
    let (status, _) = app.post(&cancel_uri, None, json!({})).await;
    assert_eq!(status, 401);
    assert!(subscription_calls(&app).is_empty());

    // A Paystack record is not reachable through the card-network routes.
    let paystack = app
        .seed_subscription(PaymentProvider::Paystack, STRANGER.email, "active")
        .await;
    let (status, _) = app
        .post(
            &format!("/api/subscriptions/stripe/{paystack}/cancel"),
            Some(STRANGER),
            json!({}),
        )
        .await;
    assert_eq!(status, 404);

    let (_, body) = app.get("/api/subscriptions/status", Some(KOFI)).await;
    assert_eq!(body["entitled"], true);
    assert_eq!(body["cancel_at_period_end"], false);
}
