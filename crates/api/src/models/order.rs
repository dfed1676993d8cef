//! Order and order line types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use storekeep_core::{AddressId, Money, OrderId, OrderLineId, OrderStatus, ProductId, UserId};

use crate::services::orders::pricing::PricedLine;

/// A placed order.
///
/// Only `status` changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub address_id: AddressId,
    pub status: OrderStatus,
    /// Sum of `unit_price * quantity` over the order's lines.
    pub total_amount: Money,
    pub created_at: DateTime<Utc>,
}

/// One product line of an order. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderLine {
    pub id: OrderLineId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    /// Price captured when the order was placed.
    pub unit_price: Money,
}

/// Everything the store needs to create an order and its lines as one unit.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub address_id: AddressId,
    pub total_amount: Money,
    pub lines: Vec<PricedLine>,
}

impl NewOrder {
    /// Requested units per product, ordered by product id.
    ///
    /// Stores decrement stock in this order so concurrent placements lock
    /// product rows in a consistent sequence.
    #[must_use]
    pub fn quantities_by_product(&self) -> Vec<(ProductId, u32)> {
        let mut totals = std::collections::BTreeMap::<ProductId, u32>::new();
        for line in &self.lines {
            let entry = totals.entry(line.product_id).or_default();
            *entry = entry.saturating_add(line.quantity);
        }
        totals.into_iter().collect()
    }
}
