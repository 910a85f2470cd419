//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET   /health                                - Liveness
//! GET   /health/ready                          - Readiness (database ping)
//!
//! # Catalog
//! GET   /api/catalog                           - Active items (category, featured_only)
//! GET   /api/catalog/featured                  - Featured items
//! GET   /api/catalog/{id}                      - One active item
//!
//! # Checkout and membership
//! POST  /api/checkout/{provider}               - Create pending order + hosted checkout
//! POST  /api/subscriptions/checkout/{provider} - Membership checkout (signed in)
//! POST  /api/subscriptions/portal/{provider}   - Manage membership (signed in)
//! GET   /api/subscriptions/status              - Entitlement (signed in)
//! POST  /api/subscriptions/stripe/{id}/cancel  - Cancel now or at period end
//! POST  /api/subscriptions/stripe/{id}/reactivate - Undo cancel at period end
//!
//! # Customer
//! POST  /api/customers/me                      - Ensure the customer record
//! GET   /api/orders                            - My orders
//! GET   /api/orders/{id}                       - One order (owner or admin)
//!
//! # Provider callbacks
//! POST  /webhooks/{provider}                   - Signed webhook delivery
//!
//! # Admin (x-admin-password)
//! POST  /admin/catalog                         - Create item
//! PUT   /admin/catalog/{id}                    - Update item
//! POST  /admin/catalog/{id}/deactivate         - Soft-deactivate item
//! POST  /admin/orders/{id}/status              - Operator status edit
//! ```
//!
//! `{provider}` is `stripe` or `paystack`.

pub mod admin;
pub mod catalog;
pub mod checkout;
pub mod customers;
pub mod health;
pub mod orders;
pub mod subscriptions;
pub mod webhooks;

use axum::{
    Router,
    routing::{get, post, put},
};

use streetmerch_core::PaymentProvider;

use crate::error::AppError;
use crate::services::CommerceError;
use crate::state::AppState;

/// Parse the `{provider}` path segment. Unknown providers are a 404.
pub(crate) fn parse_provider(segment: &str) -> Result<PaymentProvider, AppError> {
    segment
        .parse()
        .map_err(|_| CommerceError::NotFound(format!("Payment provider '{segment}'")).into())
}

/// Create the catalog routes router.
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(catalog::index))
        .route("/featured", get(catalog::featured))
        .route("/{id}", get(catalog::show))
}

/// Create the membership routes router.
pub fn subscription_routes() -> Router<AppState> {
    Router::new()
        .route("/checkout/{provider}", post(subscriptions::checkout))
        .route("/portal/{provider}", post(subscriptions::portal))
        .route("/status", get(subscriptions::status))
        .route("/stripe/{subscription_id}/cancel", post(subscriptions::cancel))
        .route(
            "/stripe/{subscription_id}/reactivate",
            post(subscriptions::reactivate),
        )
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/{id}", get(orders::show))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/catalog", post(admin::create_item))
        .route("/catalog/{id}", put(admin::update_item))
        .route("/catalog/{id}/deactivate", post(admin::deactivate_item))
        .route("/orders/{id}/status", post(admin::update_order_status))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api/catalog", catalog_routes())
        .route("/api/checkout/{provider}", post(checkout::create))
        .nest("/api/subscriptions", subscription_routes())
        .route("/api/customers/me", post(customers::me))
        .nest("/api/orders", order_routes())
        .route("/webhooks/{provider}", post(webhooks::receive))
        .nest("/admin", admin_routes())
}
