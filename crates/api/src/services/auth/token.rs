//! Signed bearer tokens.
//!
//! Tokens are HS256 JWTs. One symmetric key signs and verifies every token;
//! rotating it invalidates all outstanding sessions.

use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use storekeep_core::{Email, SessionId, UserId};

const ALGORITHM: Algorithm = Algorithm::HS256;

/// Token verification failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// Not a well-formed JWT carrying our claims.
    #[error("malformed token")]
    Malformed,

    #[error("unsupported token algorithm")]
    UnsupportedAlgorithm,

    #[error("invalid token signature")]
    InvalidSignature,

    #[error("token expired")]
    Expired,

    #[error("failed to encode token: {0}")]
    Encoding(String),

    #[error("invalid signing key")]
    InvalidKey,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                Self::UnsupportedAlgorithm
            }
            ErrorKind::InvalidKeyFormat => Self::InvalidKey,
            _ => Self::Malformed,
        }
    }
}

/// Claims carried by both access and refresh tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Session shared by the access/refresh pair.
    pub sid: SessionId,
    /// User id.
    pub sub: UserId,
    pub email: Email,
    /// Admin flag.
    pub adm: bool,
    /// Unique token id.
    pub jti: Uuid,
    /// Issued-at, unix seconds.
    pub iat: i64,
    /// Expires-at, unix seconds.
    pub exp: i64,
}

impl Claims {
    /// Claims for a token issued at `now` that lives for `ttl`.
    #[must_use]
    pub fn new(
        sid: SessionId,
        sub: UserId,
        email: Email,
        adm: bool,
        now: DateTime<Utc>,
        ttl: TimeDelta,
    ) -> Self {
        Self {
            sid,
            sub,
            email,
            adm,
            jti: Uuid::new_v4(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }

    /// Same identity, fresh `jti`, new lifetime.
    #[must_use]
    pub fn reissue(&self, now: DateTime<Utc>, ttl: TimeDelta) -> Self {
        Self::new(self.sid, self.sub, self.email.clone(), self.adm, now, ttl)
    }

    /// Expiry as a timestamp.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// Signs and verifies tokens with one shared HMAC key.
#[derive(Clone)]
pub struct TokenCodec {
    key: SecretString,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl TokenCodec {
    #[must_use]
    pub const fn new(key: SecretString) -> Self {
        Self { key }
    }

    fn validation() -> Validation {
        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        validation
    }

    /// Sign `claims` into a compact token.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Encoding` if the claims cannot be serialised.
    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        let key = EncodingKey::from_secret(self.key.expose_secret().as_bytes());
        jsonwebtoken::encode(&Header::new(ALGORITHM), claims, &key)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Verify a token's signature and expiry against the current time.
    ///
    /// # Errors
    ///
    /// Returns a [`TokenError`] describing the first check that failed.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify a token's signature and expiry against `now`.
    ///
    /// A token is expired from the second named by `exp` onwards.
    ///
    /// # Errors
    ///
    /// Returns a [`TokenError`] describing the first check that failed.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let key = DecodingKey::from_secret(self.key.expose_secret().as_bytes());
        let claims = jsonwebtoken::decode::<Claims>(token, &key, &Self::validation())?.claims;
        if now.timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}
