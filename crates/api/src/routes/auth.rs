//! Registration, login and token refresh.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;

use crate::db::Store;
use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::User;
use crate::services::auth::{LoginResult, RefreshResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Create a customer account.
///
/// POST /auth/register
///
/// # Errors
///
/// 400 for invalid input, 409 if the email is taken.
pub async fn register<S: Store>(
    State(state): State<AppState<S>>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>)> {
    let user = state
        .auth()
        .register(&body.name, &body.email, &body.password)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Exchange credentials for an access/refresh token pair.
///
/// POST /auth/login
///
/// # Errors
///
/// 401 for an unknown email or wrong password.
pub async fn login<S: Store>(
    State(state): State<AppState<S>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResult>> {
    let login = state.auth().login(&body.email, &body.password).await?;
    Ok(Json(login))
}

/// Mint a new access token.
///
/// POST /auth/refresh
///
/// # Errors
///
/// 401 if the refresh token or its session is no longer valid.
pub async fn refresh<S: Store>(
    State(state): State<AppState<S>>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<RefreshResult>> {
    let refreshed = state.auth().refresh(&body.refresh_token).await?;
    Ok(Json(refreshed))
}

/// End the caller's session.
///
/// POST /auth/logout
///
/// # Errors
///
/// 500 if the store fails.
pub async fn logout<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(claims): RequireAuth,
) -> Result<StatusCode> {
    state.auth().logout(claims.sid).await?;
    Ok(StatusCode::NO_CONTENT)
}
