//! Membership route handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;

use streetmerch_core::BillingCycle;

use crate::error::Result;
use crate::middleware::RequireIdentity;
use crate::payments::{CheckoutSession, PortalSession};
use crate::services::MembershipStatus;
use crate::state::AppState;

use super::parse_provider;

/// Body of a membership checkout.
#[derive(Debug, Deserialize)]
pub struct SubscriptionCheckoutRequest {
    pub cycle: BillingCycle,
}

/// Body of a membership cancellation.
#[derive(Debug, Deserialize)]
pub struct CancelMembershipRequest {
    /// End now instead of at the close of the paid period.
    #[serde(default)]
    pub immediately: bool,
}

/// POST /api/subscriptions/checkout/{provider}
pub async fn checkout(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    RequireIdentity(identity): RequireIdentity,
    Json(request): Json<SubscriptionCheckoutRequest>,
) -> Result<Json<CheckoutSession>> {
    let provider = parse_provider(&provider)?;
    let session = state
        .checkout()
        .subscription(provider, &identity, request.cycle)
        .await?;
    Ok(Json(session))
}

/// POST /api/subscriptions/portal/{provider}
pub async fn portal(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    RequireIdentity(identity): RequireIdentity,
) -> Result<Json<PortalSession>> {
    let provider = parse_provider(&provider)?;
    Ok(Json(state.checkout().portal(provider, &identity).await?))
}

/// GET /api/subscriptions/status
pub async fn status(
    State(state): State<AppState>,
    RequireIdentity(identity): RequireIdentity,
) -> Result<Json<MembershipStatus>> {
    let customer = state.customers().ensure(&identity).await?;
    Ok(Json(state.ledger().status(&customer).await?))
}

/// POST /api/subscriptions/stripe/{subscription_id}/cancel
pub async fn cancel(
    State(state): State<AppState>,
    Path(subscription_id): Path<String>,
    RequireIdentity(identity): RequireIdentity,
    Json(request): Json<CancelMembershipRequest>,
) -> Result<Json<MembershipStatus>> {
    let status = state
        .checkout()
        .cancel_membership(&identity, &subscription_id, request.immediately)
        .await?;
    Ok(Json(status))
}

/// POST /api/subscriptions/stripe/{subscription_id}/reactivate
pub async fn reactivate(
    State(state): State<AppState>,
    Path(subscription_id): Path<String>,
    RequireIdentity(identity): RequireIdentity,
) -> Result<Json<MembershipStatus>> {
    let status = state
        .checkout()
        .reactivate_membership(&identity, &subscription_id)
        .await?;
    Ok(Json(status))
}
