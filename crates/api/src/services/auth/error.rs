//! Authentication and session error types.

use thiserror::Error;

use super::token::TokenError;
use crate::db::RepositoryError;

/// Errors that can occur during account and session operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] storekeep_core::EmailError),

    /// Invalid credentials (wrong password or user not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("user not found")]
    UserNotFound,

    /// Another account already uses the email.
    #[error("an account with this email already exists")]
    EmailTaken,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    #[error("invalid name: {0}")]
    InvalidName(String),

    /// Token failed signature, expiry or format checks.
    #[error("invalid token: {0}")]
    Token(#[from] TokenError),

    /// No session row for the token's session id.
    #[error("session not found")]
    SessionNotFound,

    #[error("session has been revoked")]
    SessionRevoked,

    #[error("session has expired")]
    SessionExpired,

    /// The token does not match what the session recorded.
    #[error("invalid session")]
    InvalidSession,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
