//! User account types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use storekeep_core::{Email, UserId};

/// A registered account.
///
/// The password digest is deliberately not part of this type; it is only
/// read through [`crate::db::UserStore::get_credentials`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Login email (unique).
    pub email: Email,
    /// Display name.
    pub name: String,
    /// Whether the account may use admin routes.
    pub is_admin: bool,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

/// Input for creating a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: Email,
    pub name: String,
    pub password_hash: String,
    pub is_admin: bool,
}
