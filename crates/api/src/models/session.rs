//! Server-side session records.

use chrono::{DateTime, Utc};

use storekeep_core::{Email, SessionId};

/// Binds one refresh token to a revocable, expirable identity window.
///
/// Access tokens carry the same [`SessionId`] so the session can be checked
/// (or revoked) without touching the tokens themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: SessionId,
    pub email: Email,
    pub refresh_token: String,
    pub is_revoked: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Whether the session's window has closed at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whether the session can still back a token at `now`.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_revoked && !self.is_expired_at(now)
    }
}
