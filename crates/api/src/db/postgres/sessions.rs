//! `sessions` table.

use chrono::{DateTime, Utc};

use storekeep_core::{Email, SessionId};

use super::{PgStore, corrupt};
use crate::db::{RepositoryError, SessionStore, unique_violation};
use crate::models::Session;

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: SessionId,
    email: String,
    refresh_token: String,
    is_revoked: bool,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for Session {
    type Error = RepositoryError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            email: Email::parse(&row.email).map_err(|e| corrupt("email", e))?,
            refresh_token: row.refresh_token,
            is_revoked: row.is_revoked,
            created_at: row.created_at,
            expires_at: row.expires_at,
        })
    }
}

impl SessionStore for PgStore {
    async fn create_session(&self, session: &Session) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO sessions (id, email, refresh_token, is_revoked, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(session.id)
        .bind(&session.email)
        .bind(&session.refresh_token)
        .bind(session.is_revoked)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "session already exists"))?;
        Ok(())
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<Session>, RepositoryError> {
        sqlx::query_as::<_, SessionRow>(
            r"
            SELECT id, email, refresh_token, is_revoked, created_at, expires_at
            FROM sessions
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(Session::try_from)
        .transpose()
    }

    async fn revoke_session(&self, id: SessionId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE sessions SET is_revoked = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_session(&self, id: SessionId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
