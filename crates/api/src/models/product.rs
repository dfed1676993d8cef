//! Catalog product types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storekeep_core::{Money, ProductId};

/// A sellable product.
///
/// `price` and `stock_quantity` are written by catalog administration and by
/// order placement (stock only); orders never re-read `price` after the
/// snapshot is taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub id: ProductId,
    /// Stock keeping unit (unique).
    pub sku: String,
    pub name: String,
    pub description: String,
    /// Current unit price.
    pub price: Money,
    /// Sellable units on hand. Never negative.
    pub stock_quantity: i32,
    /// Inactive products are hidden from the public catalog and cannot be ordered.
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for creating or replacing a product's editable fields.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Money,
    pub stock_quantity: i32,
    #[serde(default = "default_active")]
    pub active: bool,
}

const fn default_active() -> bool {
    true
}
