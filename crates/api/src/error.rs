//! Unified error handling with Sentry integration.
//!
//! Domain errors carry no HTTP knowledge. [`AppError`] maps them to status
//! codes at the transport boundary and captures server errors to Sentry
//! before responding. All route handlers return `Result<T, AppError>`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::orders::pricing::PricingError;
use crate::services::{AddressError, AuthError, CatalogError, OrderError};

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Address(#[from] AddressError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing or invalid bearer token.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated, but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(err) => auth_status(err),
            Self::Order(err) => order_status(err),
            Self::Catalog(err) => match err {
                CatalogError::InvalidProduct(_) => StatusCode::BAD_REQUEST,
                CatalogError::ProductNotFound => StatusCode::NOT_FOUND,
                CatalogError::SkuTaken | CatalogError::ProductInUse => StatusCode::CONFLICT,
                CatalogError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Address(err) => match err {
                AddressError::InvalidAddress(_) => StatusCode::BAD_REQUEST,
                AddressError::AddressNotFound | AddressError::NoDefaultAddress => {
                    StatusCode::NOT_FOUND
                }
                AddressError::NotAddressOwner => StatusCode::FORBIDDEN,
                AddressError::AddressInUse => StatusCode::CONFLICT,
                AddressError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

const fn auth_status(err: &AuthError) -> StatusCode {
    match err {
        AuthError::InvalidEmail(_) | AuthError::WeakPassword(_) | AuthError::InvalidName(_) => {
            StatusCode::BAD_REQUEST
        }
        AuthError::InvalidCredentials
        | AuthError::Token(_)
        | AuthError::SessionNotFound
        | AuthError::SessionRevoked
        | AuthError::SessionExpired
        | AuthError::InvalidSession => StatusCode::UNAUTHORIZED,
        AuthError::UserNotFound => StatusCode::NOT_FOUND,
        AuthError::EmailTaken => StatusCode::CONFLICT,
        AuthError::Repository(_) | AuthError::PasswordHash => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

const fn order_status(err: &OrderError) -> StatusCode {
    match err {
        OrderError::Pricing(pricing) => match pricing {
            PricingError::EmptyOrder
            | PricingError::InvalidQuantity { .. }
            | PricingError::AmountOverflow => StatusCode::BAD_REQUEST,
            PricingError::ProductNotFound(_) => StatusCode::NOT_FOUND,
            PricingError::ProductUnavailable(_) | PricingError::InsufficientStock { .. } => {
                StatusCode::CONFLICT
            }
        },
        OrderError::OrderNotFound | OrderError::AddressNotFound | OrderError::LineNotFound => {
            StatusCode::NOT_FOUND
        }
        OrderError::NotOrderOwner | OrderError::NotAddressOwner => StatusCode::FORBIDDEN,
        OrderError::CannotCancelOrder(_) | OrderError::InvalidTransition { .. } => {
            StatusCode::CONFLICT
        }
        OrderError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry and keep details out of the body
        let message = if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from an authenticated token.
///
/// Called by the auth extractors so errors are associated with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use storekeep_core::{OrderStatus, ProductId};

    use super::*;
    use crate::services::auth::TokenError;

    fn status_of(err: impl Into<AppError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_order_error_status_codes() {
        assert_eq!(
            status_of(OrderError::Pricing(PricingError::EmptyOrder)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(OrderError::Pricing(PricingError::InsufficientStock {
                product_id: ProductId::new_v4(),
                requested: 2,
                available: 1,
            })),
            StatusCode::CONFLICT
        );
        assert_eq!(status_of(OrderError::OrderNotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_of(OrderError::NotOrderOwner), StatusCode::FORBIDDEN);
        assert_eq!(
            status_of(OrderError::CannotCancelOrder(OrderStatus::Paid)),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_auth_error_status_codes() {
        assert_eq!(status_of(AuthError::InvalidCredentials), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(AuthError::SessionRevoked), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(AuthError::Token(TokenError::Expired)), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(AuthError::EmailTaken), StatusCode::CONFLICT);
        assert_eq!(
            status_of(AuthError::WeakPassword("too short".to_string())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_not_found_and_forbidden_stay_distinct() {
        assert_eq!(status_of(AddressError::AddressNotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_of(AddressError::NotAddressOwner), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_server_errors_hide_details() {
        let response =
            AppError::Internal("connection refused on 10.0.0.5".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Internal server error");
    }

    #[tokio::test]
    async fn test_client_errors_explain() {
        let response = AppError::from(CatalogError::SkuTaken).into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "a product with this sku already exists");
    }
}
