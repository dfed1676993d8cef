//! Accounts and sessions.
//!
//! A login creates one server-side [`Session`] and two tokens that both carry
//! its id: a long-lived refresh token (stored on the session) and a
//! short-lived access token. Refresh mints new access tokens for the same
//! session until it is revoked, deleted (logout) or expires.

mod error;
pub mod password;
pub mod token;

pub use error::AuthError;
pub use token::{Claims, TokenCodec, TokenError};

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tracing::instrument;

use storekeep_core::{Email, SessionId, UserId};

use crate::db::{RepositoryError, SessionStore, UserStore};
use crate::models::{NewUser, Session, User};

/// Maximum display name length.
const MAX_NAME_LENGTH: usize = 100;

/// Token lifetimes and gate policy, built from configuration at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Access token lifetime.
    pub access_ttl: TimeDelta,
    /// Refresh token (and session) lifetime.
    pub refresh_ttl: TimeDelta,
    /// Whether the auth gate checks the session behind every access token.
    pub enforce_revocation: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            access_ttl: TimeDelta::minutes(15),
            refresh_ttl: TimeDelta::days(7),
            enforce_revocation: true,
        }
    }
}

/// Tokens and profile returned by a successful login.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResult {
    pub session_id: SessionId,
    pub access_token: String,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_token_expires_at: DateTime<Utc>,
    pub user: User,
}

/// A fresh access token for an existing session.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshResult {
    pub session_id: SessionId,
    pub access_token: String,
    pub access_token_expires_at: DateTime<Utc>,
}

/// Account and session service.
pub struct AuthService<'a, S> {
    store: &'a S,
    tokens: &'a TokenCodec,
    settings: SessionSettings,
}

impl<'a, S> AuthService<'a, S>
where
    S: UserStore + SessionStore,
{
    /// Create a new auth service.
    #[must_use]
    pub const fn new(store: &'a S, tokens: &'a TokenCodec, settings: SessionSettings) -> Self {
        Self {
            store,
            tokens,
            settings,
        }
    }

    // =========================================================================
    // Accounts
    // =========================================================================

    /// Register a regular (non-admin) account.
    ///
    /// # Errors
    ///
    /// Returns `InvalidEmail`, `InvalidName`, `WeakPassword`, or `EmailTaken`.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        self.create_account(name, email, password, false).await
    }

    /// Create an account with an explicit admin flag.
    ///
    /// # Errors
    ///
    /// Returns `InvalidEmail`, `InvalidName`, `WeakPassword`, or `EmailTaken`.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn create_account(
        &self,
        name: &str,
        email: &str,
        password: &str,
        is_admin: bool,
    ) -> Result<User, AuthError> {
        let email = Email::parse(email)?;
        let name = validate_name(name)?;
        password::validate_password(password)?;
        let password_hash = password::hash_password(password)?;

        let user = self
            .store
            .create_user(NewUser {
                email,
                name,
                password_hash,
                is_admin,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::EmailTaken,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, is_admin, "Account created");
        Ok(user)
    }

    /// # Errors
    ///
    /// Returns `UserNotFound` if the account does not exist.
    pub async fn get_profile(&self, user_id: UserId) -> Result<User, AuthError> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Change name and email.
    ///
    /// # Errors
    ///
    /// Returns `InvalidEmail`, `InvalidName`, `UserNotFound`, or `EmailTaken`.
    #[instrument(skip(self))]
    pub async fn update_profile(
        &self,
        user_id: UserId,
        name: &str,
        email: &str,
    ) -> Result<User, AuthError> {
        let email = Email::parse(email)?;
        let name = validate_name(name)?;

        self.store
            .update_user(user_id, &name, &email)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::UserNotFound,
                RepositoryError::Conflict(_) => AuthError::EmailTaken,
                other => AuthError::Repository(other),
            })
    }

    /// Replace the password after verifying the current one.
    ///
    /// # Errors
    ///
    /// Returns `UserNotFound`, `InvalidCredentials` if `current` is wrong, or
    /// `WeakPassword` if `new` is too short.
    #[instrument(skip(self, current, new))]
    pub async fn change_password(
        &self,
        user_id: UserId,
        current: &str,
        new: &str,
    ) -> Result<(), AuthError> {
        let hash = self
            .store
            .get_password_hash(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        password::verify_password(current, &hash)?;
        password::validate_password(new)?;

        let new_hash = password::hash_password(new)?;
        self.store.set_password_hash(user_id, &new_hash).await?;
        tracing::info!(%user_id, "Password changed");
        Ok(())
    }

    /// Delete an account.
    ///
    /// The caller's session is removed; every other session of the account is
    /// revoked together with the user row.
    ///
    /// # Errors
    ///
    /// Returns `UserNotFound` if the account does not exist.
    #[instrument(skip(self))]
    pub async fn delete_account(
        &self,
        user_id: UserId,
        session_id: SessionId,
    ) -> Result<(), AuthError> {
        self.store.revoke_session(session_id).await?;
        self.store.delete_session(session_id).await?;
        if !self.store.delete_user(user_id).await? {
            return Err(AuthError::UserNotFound);
        }
        tracing::info!(%user_id, "Account deleted");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the store fails.
    pub async fn list_users(&self) -> Result<Vec<User>, AuthError> {
        Ok(self.store.list_users().await?)
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Check credentials and open a session.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCredentials` if the email is unknown or the password
    /// is wrong (indistinguishably), `InvalidEmail` if it cannot be parsed.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResult, AuthError> {
        let email = Email::parse(email)?;
        let Some((user, password_hash)) = self.store.get_credentials(&email).await? else {
            return Err(password::reject_unknown_account(password));
        };
        password::verify_password(password, &password_hash)?;

        let now = Utc::now();
        let session_id = SessionId::new_v4();

        let refresh_claims = Claims::new(
            session_id,
            user.id,
            user.email.clone(),
            user.is_admin,
            now,
            self.settings.refresh_ttl,
        );
        let refresh_token = self.tokens.sign(&refresh_claims)?;

        let access_claims = refresh_claims.reissue(now, self.settings.access_ttl);
        let access_token = self.tokens.sign(&access_claims)?;

        let session = Session {
            id: session_id,
            email: user.email.clone(),
            refresh_token: refresh_token.clone(),
            is_revoked: false,
            created_at: now,
            expires_at: refresh_claims.expires_at(),
        };
        self.store.create_session(&session).await?;

        tracing::info!(user_id = %user.id, %session_id, "Session created");

        Ok(LoginResult {
            session_id,
            access_token,
            access_token_expires_at: access_claims.expires_at(),
            refresh_token,
            refresh_token_expires_at: session.expires_at,
            user,
        })
    }

    /// Mint a new access token from a refresh token.
    ///
    /// The refresh token and session are left unchanged.
    ///
    /// # Errors
    ///
    /// Returns `Token` if the token fails verification, `SessionNotFound`,
    /// `SessionRevoked`, `SessionExpired`, or `InvalidSession` if the token
    /// is not the one the session was created with.
    #[instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshResult, AuthError> {
        let claims = self.tokens.verify(refresh_token)?;
        let session = self
            .store
            .get_session(claims.sid)
            .await?
            .ok_or(AuthError::SessionNotFound)?;

        let now = Utc::now();
        if session.is_revoked {
            tracing::warn!(session_id = %session.id, "Refresh on revoked session");
            return Err(AuthError::SessionRevoked);
        }
        if session.is_expired_at(now) {
            return Err(AuthError::SessionExpired);
        }
        if session.email != claims.email || session.refresh_token != refresh_token {
            tracing::warn!(session_id = %session.id, "Refresh token does not match session");
            return Err(AuthError::InvalidSession);
        }

        let access_claims = claims.reissue(now, self.settings.access_ttl);
        let access_token = self.tokens.sign(&access_claims)?;

        Ok(RefreshResult {
            session_id: session.id,
            access_token,
            access_token_expires_at: access_claims.expires_at(),
        })
    }

    /// End a session. Deleting an absent session is not an error.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the store fails.
    #[instrument(skip(self))]
    pub async fn logout(&self, session_id: SessionId) -> Result<(), AuthError> {
        if self.store.delete_session(session_id).await? {
            tracing::info!(%session_id, "Session ended");
        }
        Ok(())
    }

    /// Flag a session revoked without deleting it.
    ///
    /// # Errors
    ///
    /// Returns `SessionNotFound` if there is no such session.
    #[instrument(skip(self))]
    pub async fn revoke_session(&self, session_id: SessionId) -> Result<(), AuthError> {
        if !self.store.revoke_session(session_id).await? {
            return Err(AuthError::SessionNotFound);
        }
        tracing::info!(%session_id, "Session revoked");
        Ok(())
    }

    /// Delete every session past its expiry.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the store fails.
    pub async fn purge_expired_sessions(&self) -> Result<u64, AuthError> {
        let purged = self.store.purge_expired_sessions(Utc::now()).await?;
        if purged > 0 {
            tracing::info!(purged, "Expired sessions purged");
        }
        Ok(purged)
    }

    /// Verify an access token for the auth gate.
    ///
    /// With `enforce_revocation` on, the token's session must also exist and
    /// be neither revoked nor expired.
    ///
    /// # Errors
    ///
    /// Returns `Token`, `SessionNotFound`, `SessionRevoked`, or `SessionExpired`.
    pub async fn authenticate(&self, access_token: &str) -> Result<Claims, AuthError> {
        let claims = self.tokens.verify(access_token)?;
        if self.settings.enforce_revocation {
            let session = self
                .store
                .get_session(claims.sid)
                .await?
                .ok_or(AuthError::SessionNotFound)?;
            if session.is_revoked {
                return Err(AuthError::SessionRevoked);
            }
            if session.is_expired_at(Utc::now()) {
                return Err(AuthError::SessionExpired);
            }
        }
        Ok(claims)
    }
}

fn validate_name(name: &str) -> Result<String, AuthError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AuthError::InvalidName("name cannot be empty".to_owned()));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(AuthError::InvalidName(format!(
            "name must be at most {MAX_NAME_LENGTH} characters"
        )));
    }
    Ok(name.to_owned())
}
