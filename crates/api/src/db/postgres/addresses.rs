//! `addresses` table.

use storekeep_core::{AddressId, UserId};

use super::PgStore;
use crate::db::{AddressStore, RepositoryError, still_referenced};
use crate::models::{Address, NewAddress};

#[derive(sqlx::FromRow)]
struct AddressRow {
    id: AddressId,
    user_id: UserId,
    line1: String,
    city: String,
    province: String,
    postal_code: String,
    country: String,
    is_default: bool,
}

impl From<AddressRow> for Address {
    fn from(row: AddressRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            line1: row.line1,
            city: row.city,
            province: row.province,
            postal_code: row.postal_code,
            country: row.country,
            is_default: row.is_default,
        }
    }
}

impl AddressStore for PgStore {
    async fn create_address(&self, address: NewAddress) -> Result<Address, RepositoryError> {
        let row = sqlx::query_as::<_, AddressRow>(
            r"
            INSERT INTO addresses (id, user_id, line1, city, province, postal_code, country)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, user_id, line1, city, province, postal_code, country, is_default
            ",
        )
        .bind(AddressId::new_v4())
        .bind(address.user_id)
        .bind(&address.line1)
        .bind(&address.city)
        .bind(&address.province)
        .bind(&address.postal_code)
        .bind(&address.country)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn get_address(&self, id: AddressId) -> Result<Option<Address>, RepositoryError> {
        let row = sqlx::query_as::<_, AddressRow>(
            r"
            SELECT id, user_id, line1, city, province, postal_code, country, is_default
            FROM addresses
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn list_addresses(&self, user_id: UserId) -> Result<Vec<Address>, RepositoryError> {
        let rows = sqlx::query_as::<_, AddressRow>(
            r"
            SELECT id, user_id, line1, city, province, postal_code, country, is_default
            FROM addresses
            WHERE user_id = $1
            ORDER BY is_default DESC, id
            ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_default_address(
        &self,
        user_id: UserId,
    ) -> Result<Option<Address>, RepositoryError> {
        let row = sqlx::query_as::<_, AddressRow>(
            r"
            SELECT id, user_id, line1, city, province, postal_code, country, is_default
            FROM addresses
            WHERE user_id = $1 AND is_default
            ",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn set_default_address(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Row-lock the user's whole address set so concurrent toggles serialize.
        let owned = sqlx::query_scalar::<_, AddressId>(
            "SELECT id FROM addresses WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await?;

        if !owned.contains(&id) {
            return Err(RepositoryError::NotFound);
        }

        // Unset first: the partial unique index allows one default per user.
        sqlx::query(
            r"
            UPDATE addresses SET is_default = FALSE
            WHERE user_id = $1 AND is_default AND id <> $2
            ",
        )
        .bind(user_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, AddressRow>(
            r"
            UPDATE addresses SET is_default = TRUE
            WHERE id = $1
            RETURNING id, user_id, line1, city, province, postal_code, country, is_default
            ",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    async fn delete_address(&self, id: AddressId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM addresses WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| still_referenced(e, "address is referenced by orders"))?;
        Ok(result.rows_affected() > 0)
    }
}
