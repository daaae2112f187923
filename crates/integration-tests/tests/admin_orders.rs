//! Admin order management against a real database.
//!
//! Run with: `cargo test -p storehouse-integration-tests -- --ignored`

#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;
use sqlx::PgPool;
use storehouse_admin::db::{OrderRepository as AdminOrders, StatusChangeError};
use storehouse_core::{OrderId, OrderStatus, VariantId};
use storehouse_integration_tests::{
    create_address, create_customer, create_product, inventory, pool, shipping,
};
use storehouse_storefront::db::{CartRepository, CheckoutRequest, OrderRepository};

async fn place_order(pool: &PgPool, variant: VariantId, quantity: i32) -> OrderId {
    let customer = create_customer(pool).await;
    let address = create_address(pool, customer).await;
    CartRepository::new(pool)
        .add_item(customer, variant, quantity)
        .await
        .unwrap();

    let request = CheckoutRequest {
        address_id: address.id,
        coupon_code: None,
    };
    OrderRepository::new(pool)
        .checkout(customer, &request, &shipping())
        .await
        .unwrap()
        .id
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_cancel_restocks_inventory() {
    let pool = pool().await;
    let (_, variant) = create_product(&pool, Decimal::TEN, 8).await;
    let order = place_order(&pool, variant, 3).await;
    assert_eq!(inventory(&pool, variant).await, 5);

    let detail = AdminOrders::new(&pool)
        .update_status(order, OrderStatus::Cancelled)
        .await
        .unwrap();

    assert_eq!(detail.status, OrderStatus::Cancelled);
    assert!(detail.allowed_transitions.is_empty());
    assert_eq!(inventory(&pool, variant).await, 8);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_lifecycle_moves_forward_only() {
    let pool = pool().await;
    let (_, variant) = create_product(&pool, Decimal::TEN, 8).await;
    let order = place_order(&pool, variant, 1).await;
    let orders = AdminOrders::new(&pool);

    for next in [OrderStatus::Processing, OrderStatus::Shipped, OrderStatus::Delivered] {
        let detail = orders.update_status(order, next).await.unwrap();
        assert_eq!(detail.status, next);
    }

    let result = orders.update_status(order, OrderStatus::Cancelled).await;
    assert!(matches!(
        result,
        Err(StatusChangeError::InvalidTransition {
            from: OrderStatus::Delivered,
            to: OrderStatus::Cancelled,
        })
    ));
    assert_eq!(inventory(&pool, variant).await, 7);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_unknown_order() {
    let pool = pool().await;
    let result = AdminOrders::new(&pool)
        .update_status(OrderId::new(i32::MAX), OrderStatus::Processing)
        .await;
    assert!(matches!(result, Err(StatusChangeError::NotFound)));
}
