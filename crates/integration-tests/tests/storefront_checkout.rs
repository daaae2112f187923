//! Checkout against a real database.
//!
//! Run with: `cargo test -p storehouse-integration-tests -- --ignored`

#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;
use storehouse_core::{CouponError, Money, OrderStatus};
use storehouse_integration_tests::{
    create_address, create_coupon, create_customer, create_product, inventory, pool, shipping,
};
use storehouse_storefront::db::{CartRepository, CheckoutError, CheckoutRequest, OrderRepository};

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_checkout_places_order() {
    let pool = pool().await;
    let customer = create_customer(&pool).await;
    let address = create_address(&pool, customer).await;
    let (_, variant) = create_product(&pool, Decimal::new(2000, 2), 5).await;

    CartRepository::new(&pool)
        .add_item(customer, variant, 2)
        .await
        .unwrap();

    let request = CheckoutRequest {
        address_id: address.id,
        coupon_code: None,
    };
    let order = OrderRepository::new(&pool)
        .checkout(customer, &request, &shipping())
        .await
        .unwrap();

    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.subtotal, Money::from_cents(4000));
    assert_eq!(order.shipping, Money::from_cents(500));
    assert_eq!(order.total, Money::from_cents(4500));
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.shipping_address.city, "Springfield");

    assert_eq!(inventory(&pool, variant).await, 3);
    assert!(CartRepository::new(&pool).get(customer).await.unwrap().items.is_empty());
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_checkout_empty_cart() {
    let pool = pool().await;
    let customer = create_customer(&pool).await;
    let address = create_address(&pool, customer).await;

    let request = CheckoutRequest {
        address_id: address.id,
        coupon_code: None,
    };
    let result = OrderRepository::new(&pool)
        .checkout(customer, &request, &shipping())
        .await;
    assert!(matches!(result, Err(CheckoutError::EmptyCart)));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_insufficient_stock_writes_nothing() {
    let pool = pool().await;
    let customer = create_customer(&pool).await;
    let address = create_address(&pool, customer).await;
    let (_, plenty) = create_product(&pool, Decimal::TEN, 10).await;
    let (_, scarce) = create_product(&pool, Decimal::TEN, 1).await;

    let carts = CartRepository::new(&pool);
    carts.add_item(customer, plenty, 2).await.unwrap();
    carts.add_item(customer, scarce, 2).await.unwrap();

    let request = CheckoutRequest {
        address_id: address.id,
        coupon_code: None,
    };
    let result = OrderRepository::new(&pool)
        .checkout(customer, &request, &shipping())
        .await;

    assert!(matches!(result, Err(CheckoutError::InsufficientStock { .. })));
    assert_eq!(inventory(&pool, plenty).await, 10);
    assert_eq!(inventory(&pool, scarce).await, 1);
    assert_eq!(carts.get(customer).await.unwrap().items.len(), 2);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_coupon_usage_limit() {
    let pool = pool().await;
    let (_, code) = create_coupon(&pool, Some(1)).await;
    let (_, variant) = create_product(&pool, Decimal::new(10000, 2), 10).await;

    let mut results = Vec::new();
    for _ in 0..2 {
        let customer = create_customer(&pool).await;
        let address = create_address(&pool, customer).await;
        CartRepository::new(&pool)
            .add_item(customer, variant, 1)
            .await
            .unwrap();

        let request = CheckoutRequest {
            address_id: address.id,
            coupon_code: Some(code.to_lowercase()),
        };
        results.push(
            OrderRepository::new(&pool)
                .checkout(customer, &request, &shipping())
                .await,
        );
    }

    let first = results.remove(0).unwrap();
    assert_eq!(first.discount, Money::from_cents(1000));
    assert_eq!(first.total, Money::from_cents(9000));
    assert!(matches!(
        results.remove(0),
        Err(CheckoutError::Coupon(CouponError::UsageLimitReached))
    ));
    assert_eq!(inventory(&pool, variant).await, 9);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_unknown_coupon() {
    let pool = pool().await;
    let customer = create_customer(&pool).await;
    let address = create_address(&pool, customer).await;
    let (_, variant) = create_product(&pool, Decimal::TEN, 10).await;
    CartRepository::new(&pool)
        .add_item(customer, variant, 1)
        .await
        .unwrap();

    let request = CheckoutRequest {
        address_id: address.id,
        coupon_code: Some("NO-SUCH-CODE".to_string()),
    };
    let result = OrderRepository::new(&pool)
        .checkout(customer, &request, &shipping())
        .await;
    assert!(matches!(result, Err(CheckoutError::CouponNotFound)));
    assert_eq!(inventory(&pool, variant).await, 10);
}
