//! `orders` and `order_lines` tables.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use storekeep_core::{AddressId, Money, OrderId, OrderLineId, OrderStatus, ProductId, UserId};

use super::{PgStore, corrupt};
use crate::db::{OrderStore, RepositoryError, still_referenced};
use crate::models::{NewOrder, Order, OrderLine};

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    address_id: AddressId,
    status: OrderStatus,
    total_amount: Decimal,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            address_id: row.address_id,
            status: row.status,
            total_amount: Money::new(row.total_amount).map_err(|e| corrupt("total", e))?,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderLineRow {
    id: OrderLineId,
    order_id: OrderId,
    product_id: ProductId,
    quantity: i32,
    unit_price: Decimal,
}

impl TryFrom<OrderLineRow> for OrderLine {
    type Error = RepositoryError;

    fn try_from(row: OrderLineRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            quantity: u32::try_from(row.quantity).map_err(|e| corrupt("quantity", e))?,
            unit_price: Money::new(row.unit_price).map_err(|e| corrupt("unit price", e))?,
        })
    }
}

fn into_lines(rows: Vec<OrderLineRow>) -> Result<Vec<OrderLine>, RepositoryError> {
    rows.into_iter().map(OrderLine::try_from).collect()
}

impl OrderStore for PgStore {
    async fn place_order(
        &self,
        order: NewOrder,
    ) -> Result<(Order, Vec<OrderLine>), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Guarded decrement per product, in id order. A zero-row update means
        // another order took the stock first; dropping `tx` rolls back.
        for (product_id, requested) in order.quantities_by_product() {
            let requested = i32::try_from(requested)
                .map_err(|_| RepositoryError::StockExhausted(product_id))?;
            let result = sqlx::query(
                r"
                UPDATE products SET stock_quantity = stock_quantity - $2
                WHERE id = $1 AND stock_quantity >= $2
                ",
            )
            .bind(product_id)
            .bind(requested)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(RepositoryError::StockExhausted(product_id));
            }
        }

        let created: Order = sqlx::query_as::<_, OrderRow>(
            r"
            INSERT INTO orders (id, user_id, address_id, status, total_amount)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, address_id, status, total_amount, created_at
            ",
        )
        .bind(OrderId::new_v4())
        .bind(order.user_id)
        .bind(order.address_id)
        .bind(OrderStatus::Pending)
        .bind(order.total_amount)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| still_referenced(e, "user or address no longer exists"))?
        .try_into()?;

        let mut lines = Vec::with_capacity(order.lines.len());
        for (position, line) in order.lines.iter().enumerate() {
            let position = i32::try_from(position)
                .map_err(|_| RepositoryError::Conflict("too many order lines".to_owned()))?;
            let quantity = i32::try_from(line.quantity)
                .map_err(|_| RepositoryError::StockExhausted(line.product_id))?;
            let row = sqlx::query_as::<_, OrderLineRow>(
                r"
                INSERT INTO order_lines (id, order_id, product_id, position, quantity, unit_price)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING id, order_id, product_id, quantity, unit_price
                ",
            )
            .bind(OrderLineId::new_v4())
            .bind(created.id)
            .bind(line.product_id)
            .bind(position)
            .bind(quantity)
            .bind(line.unit_price)
            .fetch_one(&mut *tx)
            .await?;
            lines.push(row.try_into()?);
        }

        tx.commit().await?;
        Ok((created, lines))
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, user_id, address_id, status, total_amount, created_at
            FROM orders
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(Order::try_from)
        .transpose()
    }

    async fn list_orders_by_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, user_id, address_id, status, total_amount, created_at
            FROM orders
            WHERE user_id = $1
            ORDER BY created_at DESC, id
            ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Order::try_from)
        .collect()
    }

    async fn transition_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Option<Order>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let Some(row) = sqlx::query_as::<_, OrderRow>(
            r"
            UPDATE orders SET status = $3
            WHERE id = $1 AND status = $2
            RETURNING id, user_id, address_id, status, total_amount, created_at
            ",
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .fetch_optional(&mut *tx)
        .await?
        else {
            return Ok(None);
        };

        if to == OrderStatus::Cancelled {
            sqlx::query(
                r"
                UPDATE products p
                SET stock_quantity = p.stock_quantity + l.quantity
                FROM (
                    SELECT product_id, SUM(quantity)::INTEGER AS quantity
                    FROM order_lines
                    WHERE order_id = $1
                    GROUP BY product_id
                ) l
                WHERE p.id = l.product_id
                ",
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        row.try_into().map(Some)
    }

    async fn list_lines_by_order(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<OrderLine>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderLineRow>(
            r"
            SELECT id, order_id, product_id, quantity, unit_price
            FROM order_lines
            WHERE order_id = $1
            ORDER BY position
            ",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;
        into_lines(rows)
    }

    async fn list_lines_by_user(&self, user_id: UserId) -> Result<Vec<OrderLine>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderLineRow>(
            r"
            SELECT l.id, l.order_id, l.product_id, l.quantity, l.unit_price
            FROM order_lines l
            JOIN orders o ON o.id = l.order_id
            WHERE o.user_id = $1
            ORDER BY o.created_at DESC, l.order_id, l.position
            ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        into_lines(rows)
    }

    async fn get_line(&self, id: OrderLineId) -> Result<Option<OrderLine>, RepositoryError> {
        sqlx::query_as::<_, OrderLineRow>(
            r"
            SELECT id, order_id, product_id, quantity, unit_price
            FROM order_lines
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(OrderLine::try_from)
        .transpose()
    }
}
