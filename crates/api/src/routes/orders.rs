//! Order placement, history and fulfilment.
//!
//! Every customer route is scoped to the token's user: another user's order
//! answers 403, an unknown one 404.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;

use storekeep_core::{AddressId, OrderId, OrderLineId};

use crate::db::Store;
use crate::error::Result;
use crate::middleware::{RequireAdmin, RequireAuth};
use crate::models::{Order, OrderLine};
use crate::services::orders::pricing::LineRequest;
use crate::services::orders::{OrderDetails, PlaceOrderRequest, PlaceOrderResult, StatusUpdate};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PlaceOrderBody {
    pub address_id: AddressId,
    pub items: Vec<LineRequest>,
}

/// POST /orders
///
/// # Errors
///
/// 400 for an empty order or bad quantity, 404 for an unknown product or
/// address, 409 for unavailable products or insufficient stock.
pub async fn place<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(claims): RequireAuth,
    Json(body): Json<PlaceOrderBody>,
) -> Result<(StatusCode, Json<PlaceOrderResult>)> {
    let placed = state
        .orders()
        .place_order(PlaceOrderRequest {
            user_id: claims.sub,
            address_id: body.address_id,
            items: body.items,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(placed)))
}

/// GET /orders
///
/// # Errors
///
/// 500 if the store fails.
pub async fn index<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(claims): RequireAuth,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(state.orders().list_orders(claims.sub).await?))
}

/// GET /orders/{id}
///
/// # Errors
///
/// 404 or 403 as described in the module docs.
pub async fn show<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(claims): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetails>> {
    Ok(Json(state.orders().get_order(id, claims.sub).await?))
}

/// POST /orders/{id}/cancel
///
/// # Errors
///
/// 409 unless the order is still pending.
pub async fn cancel<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(claims): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    Ok(Json(state.orders().cancel_order(id, claims.sub).await?))
}

/// GET /orders/{id}/items
///
/// # Errors
///
/// 404 or 403 as described in the module docs.
pub async fn items<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(claims): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<Vec<OrderLine>>> {
    Ok(Json(state.orders().list_items(id, claims.sub).await?))
}

/// GET /orders/{id}/items/{item_id}
///
/// # Errors
///
/// 404 if the line is not part of this order.
pub async fn item<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(claims): RequireAuth,
    Path((id, item_id)): Path<(OrderId, OrderLineId)>,
) -> Result<Json<OrderLine>> {
    Ok(Json(state.orders().get_item(id, item_id, claims.sub).await?))
}

/// GET /items
///
/// # Errors
///
/// 500 if the store fails.
pub async fn user_items<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(claims): RequireAuth,
) -> Result<Json<Vec<OrderLine>>> {
    Ok(Json(state.orders().list_user_items(claims.sub).await?))
}

/// PUT /admin/orders/{id}/status
///
/// # Errors
///
/// 404 for an unknown order, 409 for a transition the lifecycle forbids.
pub async fn update_status<S: Store>(
    State(state): State<AppState<S>>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
    Json(body): Json<StatusUpdate>,
) -> Result<Json<Order>> {
    let order = state.orders().update_order_status(id, body.status).await?;
    tracing::info!(
        admin_id = %admin.sub,
        order_id = %id,
        status = %order.status,
        "Admin updated order"
    );
    Ok(Json(order))
}
