//! Bearer-token extractors.
//!
//! Handlers opt into authentication by taking [`RequireAuth`] or
//! [`RequireAdmin`] as an argument. Both read `Authorization: Bearer <token>`,
//! verify the access token and (when revocation is enforced) its session,
//! then hand the verified [`Claims`] to the handler.
//!
//! ```rust,ignore
//! async fn whoami(RequireAuth(claims): RequireAuth) -> String {
//!     claims.email.to_string()
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};

use crate::db::{RepositoryError, Store};
use crate::error::{AppError, set_sentry_user};
use crate::services::AuthError;
use crate::services::auth::Claims;
use crate::state::AppState;

/// Extractor that requires a valid access token.
pub struct RequireAuth(pub Claims);

/// Extractor that requires a valid access token with the admin flag.
pub struct RequireAdmin(pub Claims);

/// Error returned when a request cannot be authenticated.
#[derive(Debug)]
pub enum AuthRejection {
    /// Missing, malformed, or rejected token.
    Unauthorized(&'static str),
    /// Valid token without the admin flag.
    Forbidden,
    /// The session lookup itself failed.
    Internal(RepositoryError),
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthorized(reason) => AppError::Unauthorized(reason.to_owned()),
            Self::Forbidden => AppError::Forbidden("admin access required".to_owned()),
            Self::Internal(err) => AppError::Database(err),
        }
        .into_response()
    }
}

impl<S: Store> FromRequestParts<AppState<S>> for RequireAuth {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or(AuthRejection::Unauthorized("missing or malformed bearer token"))?;

        match state.auth().authenticate(token).await {
            Ok(claims) => {
                set_sentry_user(&claims.sub, Some(claims.email.as_str()));
                Ok(Self(claims))
            }
            Err(AuthError::Repository(err)) => Err(AuthRejection::Internal(err)),
            Err(err) => {
                tracing::debug!(error = %err, "Bearer token rejected");
                Err(AuthRejection::Unauthorized("invalid or expired token"))
            }
        }
    }
}

impl<S: Store> FromRequestParts<AppState<S>> for RequireAdmin {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S>,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(claims) = RequireAuth::from_request_parts(parts, state).await?;
        if !claims.adm {
            tracing::warn!(user_id = %claims.sub, "Non-admin attempted admin route");
            return Err(AuthRejection::Forbidden);
        }
        Ok(Self(claims))
    }
}

/// Pull the token out of an `Authorization` header.
///
/// The value must be exactly two whitespace-separated fields, the first of
/// which is the `Bearer` scheme (case-insensitive).
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let mut fields = value.split_whitespace();
    let (scheme, token) = (fields.next()?, fields.next()?);
    if fields.next().is_some() || !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_extracted() {
        assert_eq!(bearer_token(&headers("Bearer abc.def.ghi")), Some("abc.def.ghi"));
        assert_eq!(bearer_token(&headers("bearer   abc")), Some("abc"));
    }

    #[test]
    fn test_bearer_token_rejects_malformed() {
        assert_eq!(bearer_token(&HeaderMap::new()), None);
        assert_eq!(bearer_token(&headers("Bearer")), None);
        assert_eq!(bearer_token(&headers("Basic dXNlcjpwYXNz")), None);
        assert_eq!(bearer_token(&headers("Bearer abc extra")), None);
    }
}
