//! Order lifecycle.
//!
//! [`OrderService`] owns the order state machine: placement (validate, price,
//! then consume stock and create the order and its lines as one unit),
//! customer cancellation, and admin status transitions. Reads are scoped to
//! the owning user.

mod error;
pub mod pricing;

pub use error::OrderError;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use storekeep_core::{AddressId, Money, OrderId, OrderLineId, OrderStatus, ProductId, UserId};

use self::pricing::{LineRequest, PricingError};
use crate::db::{AddressStore, OrderStore, ProductStore, RepositoryError};
use crate::models::{NewOrder, Order, OrderLine};

/// Input to [`OrderService::place_order`].
#[derive(Debug, Clone)]
pub struct PlaceOrderRequest {
    pub user_id: UserId,
    pub address_id: AddressId,
    pub items: Vec<LineRequest>,
}

/// Summary of a newly placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaceOrderResult {
    pub order_id: OrderId,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// An order together with its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderLine>,
}

/// Body of an admin status change.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
}

/// Order workflow service.
pub struct OrderService<'a, S> {
    store: &'a S,
}

impl<'a, S> OrderService<'a, S>
where
    S: OrderStore + ProductStore + AddressStore,
{
    /// Create a new order service.
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Validate, price and place an order.
    ///
    /// Nothing is written unless every line validates. Stock is re-checked
    /// by the store's guarded decrement in the same transaction that creates
    /// the order, so two concurrent orders cannot both take the last units.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Pricing` for validation failures (including
    /// insufficient stock lost to a concurrent order), `AddressNotFound` /
    /// `NotAddressOwner` for a bad shipping address, or
    /// `OrderError::Repository` if the store fails.
    #[instrument(
        skip(self, request),
        fields(user_id = %request.user_id, items = request.items.len())
    )]
    pub async fn place_order(
        &self,
        request: PlaceOrderRequest,
    ) -> Result<PlaceOrderResult, OrderError> {
        pricing::check_request(&request.items)?;

        let address = self
            .store
            .get_address(request.address_id)
            .await?
            .ok_or(OrderError::AddressNotFound)?;
        if address.user_id != request.user_id {
            return Err(OrderError::NotAddressOwner);
        }

        let mut ids: Vec<ProductId> = request.items.iter().map(|i| i.product_id).collect();
        ids.sort_unstable();
        ids.dedup();
        let products = self.store.get_products(&ids).await?;

        let priced = pricing::validate_and_price(&request.items, |id| {
            products.iter().find(|p| p.id == id)
        })?;

        let new_order = NewOrder {
            user_id: request.user_id,
            address_id: request.address_id,
            total_amount: priced.total,
            lines: priced.lines,
        };
        let requested = new_order.quantities_by_product();

        let (order, lines) = match self.store.place_order(new_order).await {
            Ok(created) => created,
            Err(RepositoryError::StockExhausted(product_id)) => {
                return Err(self.lost_stock_race(product_id, &requested).await);
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            order_id = %order.id,
            total = %order.total_amount,
            lines = lines.len(),
            "Order placed"
        );

        Ok(PlaceOrderResult {
            order_id: order.id,
            total_amount: order.total_amount,
            status: order.status,
            created_at: order.created_at,
        })
    }

    /// Explain a failed guarded decrement: the stock went to a concurrent
    /// order, or the product was deleted after pricing.
    async fn lost_stock_race(
        &self,
        product_id: ProductId,
        requested: &[(ProductId, u32)],
    ) -> OrderError {
        let requested = requested
            .iter()
            .find(|(id, _)| *id == product_id)
            .map_or(0, |(_, qty)| *qty);
        let available = match self.store.get_product(product_id).await {
            Ok(Some(product)) => product.stock_quantity,
            Ok(None) => {
                tracing::warn!(%product_id, "Product removed while placing order");
                return OrderError::Pricing(PricingError::ProductNotFound(product_id));
            }
            Err(e) => return e.into(),
        };
        tracing::warn!(%product_id, requested, available, "Stock taken by a concurrent order");
        OrderError::Pricing(PricingError::InsufficientStock {
            product_id,
            requested,
            available,
        })
    }

    /// Cancel a pending order on behalf of its owner and return its stock.
    ///
    /// # Errors
    ///
    /// Returns `OrderNotFound`, `NotOrderOwner`, or `CannotCancelOrder` if the
    /// order is not (or is no longer) pending.
    #[instrument(skip(self))]
    pub async fn cancel_order(
        &self,
        order_id: OrderId,
        user_id: UserId,
    ) -> Result<Order, OrderError> {
        let order = self.owned_order(order_id, user_id).await?;
        if order.status != OrderStatus::Pending {
            return Err(OrderError::CannotCancelOrder(order.status));
        }

        match self
            .store
            .transition_status(order_id, OrderStatus::Pending, OrderStatus::Cancelled)
            .await?
        {
            Some(cancelled) => {
                tracing::info!(%order_id, "Order cancelled");
                Ok(cancelled)
            }
            None => {
                let current = self.current_status(order_id).await?;
                Err(OrderError::CannotCancelOrder(current))
            }
        }
    }

    /// Load an order with its lines, for its owner.
    ///
    /// # Errors
    ///
    /// Returns `OrderNotFound` or `NotOrderOwner`.
    #[instrument(skip(self))]
    pub async fn get_order(
        &self,
        order_id: OrderId,
        user_id: UserId,
    ) -> Result<OrderDetails, OrderError> {
        let order = self.owned_order(order_id, user_id).await?;
        let items = self.store.list_lines_by_order(order_id).await?;
        Ok(OrderDetails { order, items })
    }

    /// List a user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the store fails.
    pub async fn list_orders(&self, user_id: UserId) -> Result<Vec<Order>, OrderError> {
        Ok(self.store.list_orders_by_user(user_id).await?)
    }

    /// Move an order to `to` (admin).
    ///
    /// Cancelling through this path returns stock exactly like a customer
    /// cancellation.
    ///
    /// # Errors
    ///
    /// Returns `OrderNotFound`, or `InvalidTransition` if the transition table
    /// forbids the change (checked against the status actually replaced).
    #[instrument(skip(self))]
    pub async fn update_order_status(
        &self,
        order_id: OrderId,
        to: OrderStatus,
    ) -> Result<Order, OrderError> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(OrderError::OrderNotFound)?;
        let from = order.status;
        if !from.can_transition_to(to) {
            return Err(OrderError::InvalidTransition { from, to });
        }

        match self.store.transition_status(order_id, from, to).await? {
            Some(updated) => {
                tracing::info!(%order_id, %from, %to, "Order status changed");
                Ok(updated)
            }
            None => {
                let current = self.current_status(order_id).await?;
                Err(OrderError::InvalidTransition { from: current, to })
            }
        }
    }

    /// List the lines of an order, for its owner.
    ///
    /// # Errors
    ///
    /// Returns `OrderNotFound` or `NotOrderOwner`.
    pub async fn list_items(
        &self,
        order_id: OrderId,
        user_id: UserId,
    ) -> Result<Vec<OrderLine>, OrderError> {
        self.owned_order(order_id, user_id).await?;
        Ok(self.store.list_lines_by_order(order_id).await?)
    }

    /// Get one line of an order, for its owner.
    ///
    /// # Errors
    ///
    /// Returns `OrderNotFound`, `NotOrderOwner`, or `LineNotFound` if the line
    /// does not exist or belongs to a different order.
    pub async fn get_item(
        &self,
        order_id: OrderId,
        line_id: OrderLineId,
        user_id: UserId,
    ) -> Result<OrderLine, OrderError> {
        self.owned_order(order_id, user_id).await?;
        self.store
            .get_line(line_id)
            .await?
            .filter(|line| line.order_id == order_id)
            .ok_or(OrderError::LineNotFound)
    }

    /// Every line across all of a user's orders.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the store fails.
    pub async fn list_user_items(&self, user_id: UserId) -> Result<Vec<OrderLine>, OrderError> {
        Ok(self.store.list_lines_by_user(user_id).await?)
    }

    async fn owned_order(&self, order_id: OrderId, user_id: UserId) -> Result<Order, OrderError> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(OrderError::OrderNotFound)?;
        if order.user_id != user_id {
            return Err(OrderError::NotOrderOwner);
        }
        Ok(order)
    }

    async fn current_status(&self, order_id: OrderId) -> Result<OrderStatus, OrderError> {
        self.store
            .get_order(order_id)
            .await?
            .map(|o| o.status)
            .ok_or(OrderError::OrderNotFound)
    }
}
