//! Streetmerch storefront library.
//!
//! Order engine, payment adapters, subscription ledger, notification
//! dispatch and the axum HTTP surface. The binary in `main.rs` wires these to
//! `PostgreSQL`; tests wire them to the in-memory store.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod payments;
pub mod routes;
pub mod services;
pub mod state;

use axum::{Router, body::Body, http::Request, middleware as axum_middleware};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use state::AppState;

/// Build the full application router, layers included.
#[must_use]
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::routes())
        .layer(CorsLayer::permissive())
        .layer(axum_middleware::from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
