//! Catalog route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};

use streetmerch_core::CatalogItemId;

use crate::error::Result;
use crate::models::{CatalogFilter, CatalogItem};
use crate::state::AppState;

/// List active items.
///
/// GET /api/catalog?category=hoodie&featured_only=true
pub async fn index(
    State(state): State<AppState>,
    Query(filter): Query<CatalogFilter>,
) -> Result<Json<Vec<CatalogItem>>> {
    Ok(Json(state.catalog().list(filter).await?))
}

/// GET /api/catalog/featured
pub async fn featured(State(state): State<AppState>) -> Result<Json<Vec<CatalogItem>>> {
    Ok(Json(state.catalog().featured().await?))
}

/// GET /api/catalog/{id}
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<CatalogItem>> {
    Ok(Json(state.catalog().get(CatalogItemId::new(id)).await?))
}
