//! Order reads for the signed-in customer.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;

use streetmerch_core::OrderId;

use crate::error::{AppError, Result};
use crate::middleware::{AdminAccess, OptionalIdentity, RequireIdentity};
use crate::models::{Customer, Order};
use crate::services::CommerceError;
use crate::state::AppState;

/// An order with its display helpers.
#[derive(Debug, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub short_id: String,
    pub currency_symbol: &'static str,
    pub display_total: String,
}

impl From<Order> for OrderView {
    fn from(order: Order) -> Self {
        Self {
            short_id: order.short_id(),
            currency_symbol: order.currency.symbol(),
            display_total: order.total_money().display(),
            order,
        }
    }
}

fn owns(order: &Order, customer: &Customer) -> bool {
    order.customer_id == Some(customer.id) || order.guest_email.as_ref() == Some(&customer.email)
}

/// GET /api/orders
pub async fn index(
    State(state): State<AppState>,
    RequireIdentity(identity): RequireIdentity,
) -> Result<Json<Vec<OrderView>>> {
    let customer = state.customers().ensure(&identity).await?;
    let orders = state.orders().list_for_customer(customer.id).await?;
    Ok(Json(orders.into_iter().map(OrderView::from).collect()))
}

/// One order, for its owner or an admin. Anyone else gets a 404.
///
/// GET /api/orders/{id}
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
    OptionalIdentity(identity): OptionalIdentity,
    AdminAccess(is_admin): AdminAccess,
) -> Result<Json<OrderView>> {
    if identity.is_none() && !is_admin {
        return Err(AppError::Unauthorized("Sign in to continue".to_owned()));
    }

    let not_found = || AppError::from(CommerceError::NotFound("Order".to_owned()));
    let id: OrderId = id.parse().map_err(|_| not_found())?;
    let order = state.orders().get(id).await?;

    if !is_admin {
        let Some(identity) = identity else {
            return Err(not_found());
        };
        let customer = state.customers().ensure(&identity).await?;
        if !owns(&order, &customer) {
            return Err(not_found());
        }
    }

    Ok(Json(order.into()))
}
