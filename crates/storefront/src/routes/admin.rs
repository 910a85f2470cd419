//! Content management and operator routes.
//!
//! Every handler here takes [`RequireAdmin`].

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use streetmerch_core::{CatalogItemId, OrderId};

use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{CatalogItem, CatalogItemUpdate, NewCatalogItem, StatusUpdate};
use crate::services::CommerceError;
use crate::state::AppState;

use super::orders::OrderView;

/// POST /admin/catalog
pub async fn create_item(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Json(item): Json<NewCatalogItem>,
) -> Result<(StatusCode, Json<CatalogItem>)> {
    let item = state.catalog().create(item).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// PUT /admin/catalog/{id}
pub async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    _admin: RequireAdmin,
    Json(update): Json<CatalogItemUpdate>,
) -> Result<Json<CatalogItem>> {
    let item = state
        .catalog()
        .update(CatalogItemId::new(id), update)
        .await?;
    Ok(Json(item))
}

/// POST /admin/catalog/{id}/deactivate
pub async fn deactivate_item(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    _admin: RequireAdmin,
) -> Result<Json<CatalogItem>> {
    Ok(Json(
        state.catalog().deactivate(CatalogItemId::new(id)).await?,
    ))
}

/// Operator status edit, with optional tracking number and note.
///
/// POST /admin/orders/{id}/status
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    _admin: RequireAdmin,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<OrderView>> {
    let id: OrderId = id
        .parse()
        .map_err(|_| AppError::from(CommerceError::NotFound("Order".to_owned())))?;
    let order = state.orders().update_status(id, update).await?;
    Ok(Json(order.into()))
}
