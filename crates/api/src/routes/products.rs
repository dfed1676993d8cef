//! Catalog routes.
//!
//! Public reads see active products only. Admin routes manage the catalog,
//! including inactive products and stock levels.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;

use storekeep_core::ProductId;

use crate::db::Store;
use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::models::{NewProduct, Product};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StockUpdate {
    pub stock_quantity: i32,
}

/// GET /products
///
/// # Errors
///
/// 500 if the store fails.
pub async fn index<S: Store>(State(state): State<AppState<S>>) -> Result<Json<Vec<Product>>> {
    Ok(Json(state.catalog().list_products(false).await?))
}

/// GET /products/{id}
///
/// # Errors
///
/// 404 for unknown or inactive products.
pub async fn show<S: Store>(
    State(state): State<AppState<S>>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    Ok(Json(state.catalog().get_product(id, false).await?))
}

/// GET /admin/products
///
/// # Errors
///
/// 500 if the store fails.
pub async fn admin_index<S: Store>(
    State(state): State<AppState<S>>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<Vec<Product>>> {
    Ok(Json(state.catalog().list_products(true).await?))
}

/// POST /admin/products
///
/// # Errors
///
/// 400 for invalid fields, 409 for a duplicate sku.
pub async fn create<S: Store>(
    State(state): State<AppState<S>>,
    RequireAdmin(_): RequireAdmin,
    Json(body): Json<NewProduct>,
) -> Result<(StatusCode, Json<Product>)> {
    let product = state.catalog().create_product(body).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// PUT /admin/products/{id}
///
/// # Errors
///
/// 400 for invalid fields, 404 for an unknown product, 409 for a duplicate sku.
pub async fn update<S: Store>(
    State(state): State<AppState<S>>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(body): Json<NewProduct>,
) -> Result<Json<Product>> {
    Ok(Json(state.catalog().update_product(id, body).await?))
}

/// PUT /admin/products/{id}/stock
///
/// # Errors
///
/// 400 for a negative quantity, 404 for an unknown product.
pub async fn set_stock<S: Store>(
    State(state): State<AppState<S>>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(body): Json<StockUpdate>,
) -> Result<Json<Product>> {
    Ok(Json(state.catalog().set_stock(id, body.stock_quantity).await?))
}

/// DELETE /admin/products/{id}
///
/// # Errors
///
/// 404 for an unknown product, 409 if orders reference it.
pub async fn delete<S: Store>(
    State(state): State<AppState<S>>,
    RequireAdmin(_): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<StatusCode> {
    state.catalog().delete_product(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
