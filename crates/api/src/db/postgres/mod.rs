//! `PostgreSQL` store.
//!
//! All queries are runtime-checked (`sqlx::query_as` + `bind`) against the
//! schema in `crates/api/migrations/`. Row types live next to the queries
//! that produce them and are converted into domain models with
//! [`RepositoryError::DataCorruption`] on invalid data.

use sqlx::PgPool;

use super::{RepositoryError, Store};

mod addresses;
mod orders;
mod products;
mod sessions;
mod users;

/// Store backed by a `PostgreSQL` pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl Store for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn corrupt(what: &str, e: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::DataCorruption(format!("invalid {what} in database: {e}"))
}
