//! Pricing and stock validation.
//!
//! Pure logic over an injected product lookup: no store access, no side
//! effects. [`validate_and_price`] either prices every requested line from the
//! products' current prices or names the first line that cannot be ordered.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use storekeep_core::{Money, ProductId};

use crate::models::Product;

/// Why a set of requested lines cannot be priced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PricingError {
    #[error("order must contain at least one item")]
    EmptyOrder,

    #[error("quantity must be positive (product {product_id}, got {quantity})")]
    InvalidQuantity {
        product_id: ProductId,
        quantity: i64,
    },

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("product {0} is not available")]
    ProductUnavailable(ProductId),

    #[error(
        "insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: i32,
    },

    #[error("order total overflow")]
    AmountOverflow,
}

/// One requested line, as submitted by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRequest {
    pub product_id: ProductId,
    /// Signed so non-positive input reaches validation instead of failing
    /// deserialisation.
    pub quantity: i64,
}

/// A validated line with its price snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PricedLine {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

/// Validated lines plus their total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedOrder {
    pub lines: Vec<PricedLine>,
    pub total: Money,
}

/// Reject empty requests and non-positive quantities.
///
/// Needs no product data, so callers run it before touching any store.
///
/// # Errors
///
/// Returns [`PricingError::EmptyOrder`] or [`PricingError::InvalidQuantity`].
pub fn check_request(items: &[LineRequest]) -> Result<(), PricingError> {
    if items.is_empty() {
        return Err(PricingError::EmptyOrder);
    }
    for item in items {
        positive_quantity(item)?;
    }
    Ok(())
}

fn positive_quantity(item: &LineRequest) -> Result<u32, PricingError> {
    u32::try_from(item.quantity)
        .ok()
        .filter(|&q| q > 0)
        .ok_or(PricingError::InvalidQuantity {
            product_id: item.product_id,
            quantity: item.quantity,
        })
}

/// Validate requested lines against current products and price them.
///
/// Lines are checked in request order. Stock is compared against the running
/// sum of everything requested for the same product, so splitting a quantity
/// across duplicate lines cannot bypass the check. Each unit price is read
/// once from `lookup` and never again.
///
/// ```
/// use storekeep_api::services::orders::pricing::{PricingError, validate_and_price};
///
/// assert_eq!(validate_and_price(&[], |_| None), Err(PricingError::EmptyOrder));
/// ```
///
/// # Errors
///
/// Returns the first [`PricingError`] encountered.
pub fn validate_and_price<'p, F>(
    items: &[LineRequest],
    lookup: F,
) -> Result<PricedOrder, PricingError>
where
    F: Fn(ProductId) -> Option<&'p Product>,
{
    if items.is_empty() {
        return Err(PricingError::EmptyOrder);
    }

    let mut requested_so_far: HashMap<ProductId, u32> = HashMap::new();
    let mut lines = Vec::with_capacity(items.len());
    let mut total = Money::ZERO;

    for item in items {
        let quantity = positive_quantity(item)?;
        let product =
            lookup(item.product_id).ok_or(PricingError::ProductNotFound(item.product_id))?;
        if !product.active {
            return Err(PricingError::ProductUnavailable(product.id));
        }

        let requested = requested_so_far.entry(product.id).or_default();
        *requested = requested.saturating_add(quantity);
        let enough = i64::from(*requested) <= i64::from(product.stock_quantity);
        if !enough {
            return Err(PricingError::InsufficientStock {
                product_id: product.id,
                requested: *requested,
                available: product.stock_quantity,
            });
        }

        let unit_price = product.price;
        let subtotal = unit_price
            .checked_mul_quantity(quantity)
            .map_err(|_| PricingError::AmountOverflow)?;
        total = total
            .checked_add(subtotal)
            .ok()
            .filter(|total| *total <= Money::MAX_TOTAL)
            .ok_or(PricingError::AmountOverflow)?;

        lines.push(PricedLine {
            product_id: product.id,
            quantity,
            unit_price,
        });
    }

    Ok(PricedOrder { lines, total })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::*;

    fn product(price: &str, stock: i32) -> Product {
        Product {
            id: ProductId::new_v4(),
            sku: "SKU".to_owned(),
            name: "Thing".to_owned(),
            description: String::new(),
            price: Money::new(Decimal::from_str(price).unwrap()).unwrap(),
            stock_quantity: stock,
            active: true,
            created_at: Utc::now(),
        }
    }

    fn catalog<'a>(products: &'a [Product]) -> impl Fn(ProductId) -> Option<&'a Product> + 'a {
        move |id| products.iter().find(|p| p.id == id)
    }

    fn line(p: &Product, quantity: i64) -> LineRequest {
        LineRequest {
            product_id: p.id,
            quantity,
        }
    }

    #[test]
    fn test_empty_order_is_rejected() {
        assert_eq!(
            validate_and_price(&[], catalog(&[])),
            Err(PricingError::EmptyOrder)
        );
        assert_eq!(check_request(&[]), Err(PricingError::EmptyOrder));
    }

    #[test]
    fn test_non_positive_quantity_is_rejected() {
        let p = product("10.00", 5);
        for quantity in [0, -1, i64::MIN] {
            let err = validate_and_price(&[line(&p, quantity)], catalog(&[p.clone()])).unwrap_err();
            assert_eq!(
                err,
                PricingError::InvalidQuantity {
                    product_id: p.id,
                    quantity
                }
            );
        }
    }

    #[test]
    fn test_check_request_needs_no_products() {
        let p = product("1.00", 0);
        assert!(check_request(&[line(&p, 2)]).is_ok());
        assert!(matches!(
            check_request(&[line(&p, 2), line(&p, 0)]),
            Err(PricingError::InvalidQuantity { .. })
        ));
    }

    #[test]
    fn test_unknown_product() {
        let p = product("10.00", 5);
        let err = validate_and_price(&[line(&p, 1)], catalog(&[])).unwrap_err();
        assert_eq!(err, PricingError::ProductNotFound(p.id));
    }

    #[test]
    fn test_inactive_product() {
        let mut p = product("10.00", 5);
        p.active = false;
        let err = validate_and_price(&[line(&p, 1)], catalog(&[p.clone()])).unwrap_err();
        assert_eq!(err, PricingError::ProductUnavailable(p.id));
    }

    #[test]
    fn test_insufficient_stock() {
        let p = product("10.00", 5);
        let err = validate_and_price(&[line(&p, 6)], catalog(&[p.clone()])).unwrap_err();
        assert_eq!(
            err,
            PricingError::InsufficientStock {
                product_id: p.id,
                requested: 6,
                available: 5
            }
        );
    }

    #[test]
    fn test_duplicate_lines_are_summed_against_stock() {
        let p = product("10.00", 5);
        let items = [line(&p, 3), line(&p, 3)];
        let err = validate_and_price(&items, catalog(&[p.clone()])).unwrap_err();
        assert!(matches!(err, PricingError::InsufficientStock { requested: 6, .. }));
    }

    #[test]
    fn test_exact_stock_is_enough() {
        let p = product("10.00", 5);
        let priced = validate_and_price(&[line(&p, 5)], catalog(&[p.clone()])).unwrap();
        assert_eq!(priced.total.to_string(), "50.00");
    }

    #[test]
    fn test_total_is_exact_sum_of_lines() {
        let a = product("0.10", 100);
        let b = product("0.20", 100);
        let c = product("19.99", 100);
        let products = [a.clone(), b.clone(), c.clone()];
        let items = [line(&a, 3), line(&b, 7), line(&c, 2)];
        let priced = validate_and_price(&items, catalog(&products)).unwrap();

        assert_eq!(priced.total.to_string(), "41.68");
        let resummed = priced.lines.iter().fold(Money::ZERO, |acc, l| {
            acc.checked_add(l.unit_price.checked_mul_quantity(l.quantity).unwrap())
                .unwrap()
        });
        assert_eq!(resummed, priced.total);
    }

    #[test]
    fn test_lines_keep_request_order_and_snapshot_price() {
        let a = product("2.50", 10);
        let b = product("4.00", 10);
        let products = [a.clone(), b.clone()];
        let priced = validate_and_price(&[line(&b, 1), line(&a, 2)], catalog(&products)).unwrap();

        assert_eq!(priced.lines[0].product_id, b.id);
        assert_eq!(priced.lines[0].unit_price, b.price);
        assert_eq!(priced.lines[1].product_id, a.id);
        assert_eq!(priced.lines[1].quantity, 2);
    }

    #[test]
    fn test_overflow_is_reported() {
        let mut huge = product("1.00", i32::MAX);
        huge.price = Money::new(Decimal::MAX).unwrap();
        let err = validate_and_price(&[line(&huge, 2)], catalog(&[huge.clone()])).unwrap_err();
        assert_eq!(err, PricingError::AmountOverflow);
    }

    #[test]
    fn test_total_beyond_storable_range_is_rejected() {
        let pricey = product("9999999999.99", 1000);
        let products = [pricey.clone()];
        let err = validate_and_price(&[line(&pricey, 101)], catalog(&products)).unwrap_err();
        assert_eq!(err, PricingError::AmountOverflow);

        let priced = validate_and_price(&[line(&pricey, 100)], catalog(&products)).unwrap();
        assert_eq!(priced.total, Money::MAX_TOTAL);
    }
}
