//! One-time checkout.

use axum::{
    Json,
    extract::{Path, State},
};

use crate::error::{Result, add_breadcrumb};
use crate::middleware::OptionalIdentity;
use crate::services::{CheckoutRequest, CheckoutResponse};
use crate::state::AppState;

use super::parse_provider;

/// Validate the cart, open the provider checkout and record the pending
/// order. The shopper is sent to `url`; the order is paid by webhook.
///
/// POST /api/checkout/{provider}
pub async fn create(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    OptionalIdentity(identity): OptionalIdentity,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>> {
    let provider = parse_provider(&provider)?;
    add_breadcrumb(
        "checkout",
        "Checkout requested",
        Some(&[("provider", provider.as_str())]),
    );

    let response = state
        .checkout()
        .one_time(provider, identity.as_ref(), request)
        .await?;
    Ok(Json(response))
}
