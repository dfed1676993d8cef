//! Shipping addresses of the authenticated user.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use storekeep_core::AddressId;

use crate::db::Store;
use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::Address;
use crate::services::addresses::AddressInput;
use crate::state::AppState;

/// POST /addresses
///
/// # Errors
///
/// 400 for missing fields.
pub async fn create<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(claims): RequireAuth,
    Json(body): Json<AddressInput>,
) -> Result<(StatusCode, Json<Address>)> {
    let address = state.addresses().add_address(claims.sub, body).await?;
    Ok((StatusCode::CREATED, Json(address)))
}

/// GET /addresses
///
/// # Errors
///
/// 500 if the store fails.
pub async fn index<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(claims): RequireAuth,
) -> Result<Json<Vec<Address>>> {
    Ok(Json(state.addresses().list_addresses(claims.sub).await?))
}

/// GET /addresses/default
///
/// # Errors
///
/// 404 if the user has no default address.
pub async fn default<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(claims): RequireAuth,
) -> Result<Json<Address>> {
    Ok(Json(state.addresses().get_default(claims.sub).await?))
}

/// PUT /addresses/{id}/default
///
/// # Errors
///
/// 404 for an unknown address, 403 for another user's.
pub async fn set_default<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(claims): RequireAuth,
    Path(id): Path<AddressId>,
) -> Result<Json<Address>> {
    Ok(Json(state.addresses().set_default(claims.sub, id).await?))
}

/// DELETE /addresses/{id}
///
/// # Errors
///
/// 404 for an unknown address, 403 for another user's, 409 if orders ship to it.
pub async fn delete<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(claims): RequireAuth,
    Path(id): Path<AddressId>,
) -> Result<StatusCode> {
    state.addresses().delete_address(claims.sub, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
