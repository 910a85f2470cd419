//! Customer record for the signed-in caller.

use axum::{Json, extract::State};

use crate::error::Result;
use crate::middleware::RequireIdentity;
use crate::models::Customer;
use crate::state::AppState;

/// Create the customer on first sign-in, or refresh their display name.
///
/// POST /api/customers/me
pub async fn me(
    State(state): State<AppState>,
    RequireIdentity(identity): RequireIdentity,
) -> Result<Json<Customer>> {
    Ok(Json(state.customers().ensure(&identity).await?))
}
