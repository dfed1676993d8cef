//! Account management and admin session control.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;

use storekeep_core::{SessionId, UserId};

use crate::db::Store;
use crate::error::{AppError, Result};
use crate::middleware::{RequireAdmin, RequireAuth};
use crate::models::User;
use crate::services::AuthError;
use crate::services::auth::Claims;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

fn require_self(claims: &Claims, id: UserId) -> Result<()> {
    if claims.sub == id {
        Ok(())
    } else {
        Err(AppError::Forbidden("not your account".to_owned()))
    }
}

/// GET /users/{id} (self or admin)
///
/// # Errors
///
/// 403 for another user's profile, 404 if the account is gone.
pub async fn show<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(claims): RequireAuth,
    Path(id): Path<UserId>,
) -> Result<Json<User>> {
    if !claims.adm {
        require_self(&claims, id)?;
    }
    Ok(Json(state.auth().get_profile(id).await?))
}

/// PUT /users/{id}
///
/// # Errors
///
/// 400 for invalid input, 403 for another user, 409 if the email is taken.
pub async fn update<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(claims): RequireAuth,
    Path(id): Path<UserId>,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<User>> {
    require_self(&claims, id)?;
    let user = state
        .auth()
        .update_profile(id, &body.name, &body.email)
        .await?;
    Ok(Json(user))
}

/// PUT /users/{id}/password
///
/// # Errors
///
/// 401 if the current password is wrong, 400 if the new one is too weak.
pub async fn change_password<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(claims): RequireAuth,
    Path(id): Path<UserId>,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<StatusCode> {
    require_self(&claims, id)?;
    state
        .auth()
        .change_password(id, &body.current_password, &body.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /users/{id}
///
/// # Errors
///
/// 403 for another user, 404 if the account is already gone.
pub async fn delete<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(claims): RequireAuth,
    Path(id): Path<UserId>,
) -> Result<StatusCode> {
    require_self(&claims, id)?;
    state.auth().delete_account(id, claims.sid).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /admin/users
///
/// # Errors
///
/// 500 if the store fails.
pub async fn list<S: Store>(
    State(state): State<AppState<S>>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<Vec<User>>> {
    Ok(Json(state.auth().list_users().await?))
}

/// POST /admin/sessions/{id}/revoke
///
/// # Errors
///
/// 404 if there is no such session.
pub async fn revoke_session<S: Store>(
    State(state): State<AppState<S>>,
    RequireAdmin(admin): RequireAdmin,
    Path(session_id): Path<SessionId>,
) -> Result<StatusCode> {
    state
        .auth()
        .revoke_session(session_id)
        .await
        .map_err(|e| match e {
            AuthError::SessionNotFound => AppError::NotFound(format!("session {session_id}")),
            other => other.into(),
        })?;
    tracing::info!(admin_id = %admin.sub, %session_id, "Admin revoked session");
    Ok(StatusCode::NO_CONTENT)
}
