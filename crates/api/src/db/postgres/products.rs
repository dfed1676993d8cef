//! `products` table.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use storekeep_core::{Money, ProductId};

use super::{PgStore, corrupt};
use crate::db::{ProductStore, RepositoryError, still_referenced, unique_violation};
use crate::models::{NewProduct, Product};

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    sku: String,
    name: String,
    description: String,
    price: Decimal,
    stock_quantity: i32,
    active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            sku: row.sku,
            name: row.name,
            description: row.description,
            price: Money::new(row.price).map_err(|e| corrupt("price", e))?,
            stock_quantity: row.stock_quantity,
            active: row.active,
            created_at: row.created_at,
        })
    }
}

fn into_products(rows: Vec<ProductRow>) -> Result<Vec<Product>, RepositoryError> {
    rows.into_iter().map(Product::try_from).collect()
}

impl ProductStore for PgStore {
    async fn create_product(&self, product: NewProduct) -> Result<Product, RepositoryError> {
        sqlx::query_as::<_, ProductRow>(
            r"
            INSERT INTO products (id, sku, name, description, price, stock_quantity, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, sku, name, description, price, stock_quantity, active, created_at
            ",
        )
        .bind(ProductId::new_v4())
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.stock_quantity)
        .bind(product.active)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "sku already exists"))?
        .try_into()
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, sku, name, description, price, stock_quantity, active, created_at
            FROM products
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(Product::try_from)
        .transpose()
    }

    async fn get_product_by_sku(&self, sku: &str) -> Result<Option<Product>, RepositoryError> {
        sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, sku, name, description, price, stock_quantity, active, created_at
            FROM products
            WHERE sku = $1
            ",
        )
        .bind(sku)
        .fetch_optional(&self.pool)
        .await?
        .map(Product::try_from)
        .transpose()
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let ids: Vec<Uuid> = ids.iter().map(ProductId::as_uuid).collect();
        let rows = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, sku, name, description, price, stock_quantity, active, created_at
            FROM products
            WHERE id = ANY($1)
            ",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;
        into_products(rows)
    }

    async fn list_products(&self, active_only: bool) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, sku, name, description, price, stock_quantity, active, created_at
            FROM products
            WHERE active OR NOT $1
            ORDER BY name, id
            ",
        )
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;
        into_products(rows)
    }

    async fn update_product(
        &self,
        id: ProductId,
        product: NewProduct,
    ) -> Result<Product, RepositoryError> {
        sqlx::query_as::<_, ProductRow>(
            r"
            UPDATE products
            SET sku = $2, name = $3, description = $4, price = $5,
                stock_quantity = $6, active = $7
            WHERE id = $1
            RETURNING id, sku, name, description, price, stock_quantity, active, created_at
            ",
        )
        .bind(id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.stock_quantity)
        .bind(product.active)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "sku already exists"))?
        .ok_or(RepositoryError::NotFound)?
        .try_into()
    }

    async fn update_stock(
        &self,
        id: ProductId,
        stock_quantity: i32,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE products SET stock_quantity = $2 WHERE id = $1")
            .bind(id)
            .bind(stock_quantity)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| still_referenced(e, "product is referenced by orders"))?;
        Ok(result.rows_affected() > 0)
    }
}
