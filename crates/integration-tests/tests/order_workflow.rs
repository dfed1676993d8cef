//! Order placement, cancellation and fulfilment scenarios.

#![allow(clippy::unwrap_used)]

use std::str::FromStr;

use rust_decimal::Decimal;

use storekeep_api::db::{OrderStore, Store};
use storekeep_api::models::Product;
use storekeep_api::services::OrderError;
use storekeep_api::services::orders::PlaceOrderRequest;
use storekeep_api::services::orders::pricing::{LineRequest, PricingError};
use storekeep_core::{Money, OrderStatus};
use storekeep_integration_tests::{TestContext, unique};

fn money(s: &str) -> Money {
    Money::new(Decimal::from_str(s).unwrap()).unwrap()
}

fn line(product: &Product, quantity: i64) -> LineRequest {
    LineRequest {
        product_id: product.id,
        quantity,
    }
}

// =============================================================================
// Placement
// =============================================================================

#[tokio::test]
async fn test_place_then_cancel_scenario() {
    let ctx = TestContext::new();
    let user = ctx.customer("scenario@example.com").await;
    let address = ctx.address(&user).await;
    let product = ctx.product("P", money("10.00"), 5).await;

    let placed = ctx
        .orders()
        .place_order(PlaceOrderRequest {
            user_id: user.id,
            address_id: address.id,
            items: vec![LineRequest {
                product_id: product.id,
                quantity: 3,
            }],
        })
        .await
        .unwrap();
    assert_eq!(placed.total_amount, money("30.00"));
    assert_eq!(placed.status, OrderStatus::Pending);

    let details = ctx.orders().get_order(placed.order_id, user.id).await.unwrap();
    assert_eq!(details.items.len(), 1);
    assert_eq!(details.items[0].unit_price, money("10.00"));
    assert_eq!(details.items[0].quantity, 3);
    assert_eq!(ctx.stock(&product).await, 2);

    let cancelled = ctx.orders().cancel_order(placed.order_id, user.id).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(ctx.stock(&product).await, 5);

    let again = ctx.orders().cancel_order(placed.order_id, user.id).await;
    assert!(matches!(
        again,
        Err(OrderError::CannotCancelOrder(OrderStatus::Cancelled))
    ));
    assert_eq!(ctx.stock(&product).await, 5);
}

#[tokio::test]
async fn test_total_equals_sum_of_lines() {
    let ctx = TestContext::new();
    let user = ctx.customer("sum@example.com").await;
    let address = ctx.address(&user).await;
    let a = ctx.product("A", money("0.10"), 100).await;
    let b = ctx.product("B", money("0.20"), 100).await;
    let c = ctx.product("C", money("19.99"), 100).await;

    let placed = ctx
        .orders()
        .place_order(PlaceOrderRequest {
            user_id: user.id,
            address_id: address.id,
            items: vec![
                line(&a, 7),
                line(&b, 3),
                line(&c, 2),
                line(&a, 1),
            ],
        })
        .await
        .unwrap();

    let lines = ctx.store.list_lines_by_order(placed.order_id).await.unwrap();
    assert_eq!(lines.len(), 4);
    let sum = lines.iter().fold(Money::ZERO, |acc, line| {
        acc.checked_add(line.unit_price.checked_mul_quantity(line.quantity).unwrap())
            .unwrap()
    });
    assert_eq!(sum, placed.total_amount);
    assert_eq!(placed.total_amount, money("41.38"));
    assert_eq!(ctx.stock(&a).await, 92);
}

#[tokio::test]
async fn test_rejected_orders_write_nothing() {
    let ctx = TestContext::new();
    let user = ctx.customer("rejected@example.com").await;
    let address = ctx.address(&user).await;
    let product = ctx.product("R", money("5.00"), 4).await;
    let request = |items: Vec<LineRequest>| PlaceOrderRequest {
        user_id: user.id,
        address_id: address.id,
        items,
    };

    let empty = ctx.orders().place_order(request(vec![])).await;
    assert!(matches!(empty, Err(OrderError::Pricing(PricingError::EmptyOrder))));

    for quantity in [0, -2] {
        let result = ctx
            .orders()
            .place_order(request(vec![
                line(&product, 1),
                line(&product, quantity),
            ]))
            .await;
        assert!(matches!(
            result,
            Err(OrderError::Pricing(PricingError::InvalidQuantity { .. }))
        ));
    }

    let greedy = ctx
        .orders()
        .place_order(request(vec![LineRequest {
            product_id: product.id,
            quantity: 5,
        }]))
        .await;
    assert!(greedy.as_ref().is_err_and(OrderError::is_insufficient_stock));

    assert!(ctx.store.list_orders_by_user(user.id).await.unwrap().is_empty());
    assert!(ctx.store.list_lines_by_user(user.id).await.unwrap().is_empty());
    assert_eq!(ctx.stock(&product).await, 4);
}

#[tokio::test]
async fn test_price_snapshot_survives_catalog_change() {
    let ctx = TestContext::new();
    let user = ctx.customer("snapshot@example.com").await;
    let address = ctx.address(&user).await;
    let product = ctx.product("S", money("8.00"), 10).await;

    let placed = ctx
        .orders()
        .place_order(PlaceOrderRequest {
            user_id: user.id,
            address_id: address.id,
            items: vec![line(&product, 2)],
        })
        .await
        .unwrap();

    let catalog = storekeep_api::services::CatalogService::new(&ctx.store);
    let mut edited = storekeep_api::models::NewProduct {
        sku: product.sku.clone(),
        name: product.name.clone(),
        description: String::new(),
        price: money("99.00"),
        stock_quantity: 8,
        active: true,
    };
    catalog.update_product(product.id, edited.clone()).await.unwrap();
    edited.active = false;
    catalog.update_product(product.id, edited).await.unwrap();

    let details = ctx.orders().get_order(placed.order_id, user.id).await.unwrap();
    assert_eq!(details.order.total_amount, money("16.00"));
    assert_eq!(details.items[0].unit_price, money("8.00"));
}

// =============================================================================
// Concurrency
// =============================================================================

/// Two buyers race for the last five units with five each.
async fn race_for_last_units<S: Store>(ctx: TestContext<S>) {
    let product = ctx.product(&unique("LAST-FIVE"), money("10.00"), 5).await;

    let mut buyers = Vec::new();
    for _ in 0..2 {
        let user = ctx.customer(&format!("{}@example.com", unique("racer"))).await;
        let address = ctx.address(&user).await;
        buyers.push((user, address));
    }

    let product_id = product.id;
    let handles: Vec<_> = buyers
        .into_iter()
        .map(|(user, address)| {
            let ctx = ctx.clone();
            tokio::spawn(async move {
                ctx.orders()
                    .place_order(PlaceOrderRequest {
                        user_id: user.id,
                        address_id: address.id,
                        items: vec![LineRequest {
                            product_id,
                            quantity: 5,
                        }],
                    })
                    .await
            })
        })
        .collect();

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(e) => assert!(e.is_insufficient_stock(), "unexpected error: {e}"),
        }
    }

    assert_eq!(succeeded, 1);
    assert_eq!(ctx.stock(&product).await, 0);
}

/// Four cancels of one pending order; exactly one wins and restocks.
async fn race_to_cancel<S: Store>(ctx: TestContext<S>) {
    let user = ctx
        .customer(&format!("{}@example.com", unique("double-cancel")))
        .await;
    let address = ctx.address(&user).await;
    let product = ctx.product(&unique("DC"), money("3.00"), 6).await;

    let placed = ctx
        .orders()
        .place_order(PlaceOrderRequest {
            user_id: user.id,
            address_id: address.id,
            items: vec![LineRequest {
                product_id: product.id,
                quantity: 4,
            }],
        })
        .await
        .unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let ctx = ctx.clone();
            let order_id = placed.order_id;
            let user_id = user.id;
            tokio::spawn(async move { ctx.orders().cancel_order(order_id, user_id).await })
        })
        .collect();

    let mut succeeded = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            succeeded += 1;
        }
    }

    assert_eq!(succeeded, 1);
    assert_eq!(ctx.stock(&product).await, 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_orders_cannot_oversell() {
    race_for_last_units(TestContext::new()).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_cancels_restock_once() {
    race_to_cancel(TestContext::new()).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires STOREKEEP_DATABASE_URL"]
async fn test_postgres_concurrent_orders_cannot_oversell() {
    let Some(ctx) = TestContext::postgres().await else {
        return;
    };
    for _ in 0..10 {
        race_for_last_units(ctx.clone()).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires STOREKEEP_DATABASE_URL"]
async fn test_postgres_concurrent_cancels_restock_once() {
    let Some(ctx) = TestContext::postgres().await else {
        return;
    };
    for _ in 0..10 {
        race_to_cancel(ctx.clone()).await;
    }
}

// =============================================================================
// Fulfilment
// =============================================================================

#[tokio::test]
async fn test_admin_lifecycle_and_customer_cancel_window() {
    let ctx = TestContext::new();
    let user = ctx.customer("fulfil@example.com").await;
    let address = ctx.address(&user).await;
    let product = ctx.product("F", money("12.00"), 3).await;

    let placed = ctx
        .orders()
        .place_order(PlaceOrderRequest {
            user_id: user.id,
            address_id: address.id,
            items: vec![line(&product, 1)],
        })
        .await
        .unwrap();
    let id = placed.order_id;

    assert!(matches!(
        ctx.orders().update_order_status(id, OrderStatus::Shipped).await,
        Err(OrderError::InvalidTransition {
            from: OrderStatus::Pending,
            to: OrderStatus::Shipped
        })
    ));

    ctx.orders().update_order_status(id, OrderStatus::Paid).await.unwrap();
    assert!(matches!(
        ctx.orders().cancel_order(id, user.id).await,
        Err(OrderError::CannotCancelOrder(OrderStatus::Paid))
    ));

    let shipped = ctx.orders().update_order_status(id, OrderStatus::Shipped).await.unwrap();
    assert_eq!(shipped.status, OrderStatus::Shipped);
    assert!(ctx.orders().update_order_status(id, OrderStatus::Cancelled).await.is_err());
    assert_eq!(ctx.stock(&product).await, 2);
}

#[tokio::test]
async fn test_orders_are_scoped_to_their_owner() {
    let ctx = TestContext::new();
    let owner = ctx.customer("owner@example.com").await;
    let other = ctx.customer("other@example.com").await;
    let address = ctx.address(&owner).await;
    let product = ctx.product("O", money("1.00"), 10).await;

    let foreign_address = ctx
        .orders()
        .place_order(PlaceOrderRequest {
            user_id: other.id,
            address_id: address.id,
            items: vec![line(&product, 1)],
        })
        .await;
    assert!(matches!(foreign_address, Err(OrderError::NotAddressOwner)));

    let placed = ctx
        .orders()
        .place_order(PlaceOrderRequest {
            user_id: owner.id,
            address_id: address.id,
            items: vec![line(&product, 1)],
        })
        .await
        .unwrap();

    assert!(matches!(
        ctx.orders().get_order(placed.order_id, other.id).await,
        Err(OrderError::NotOrderOwner)
    ));
    assert!(matches!(
        ctx.orders().cancel_order(placed.order_id, other.id).await,
        Err(OrderError::NotOrderOwner)
    ));
    assert!(ctx.orders().list_user_items(other.id).await.unwrap().is_empty());
    assert_eq!(ctx.orders().list_user_items(owner.id).await.unwrap().len(), 1);
}
