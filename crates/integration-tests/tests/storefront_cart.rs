//! Cart and favorites against a real database.
//!
//! Run with: `cargo test -p storehouse-integration-tests -- --ignored`

#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;
use storehouse_core::{MAX_FAVORITES, Money};
use storehouse_integration_tests::{create_customer, create_product, pool};
use storehouse_storefront::db::{CartRepository, FavoriteOutcome, FavoriteRepository, RepositoryError};

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_adding_same_variant_sums_quantities() {
    let pool = pool().await;
    let customer = create_customer(&pool).await;
    let (_, variant) = create_product(&pool, Decimal::new(1250, 2), 10).await;
    let carts = CartRepository::new(&pool);

    carts.add_item(customer, variant, 2).await.unwrap();
    let cart = carts.add_item(customer, variant, 3).await.unwrap();

    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 5);
    assert_eq!(cart.item_count, 5);
    assert_eq!(cart.subtotal, Money::from_cents(6250));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_quantity_zero_removes_line() {
    let pool = pool().await;
    let customer = create_customer(&pool).await;
    let (_, variant) = create_product(&pool, Decimal::new(500, 2), 10).await;
    let carts = CartRepository::new(&pool);

    let cart = carts.add_item(customer, variant, 1).await.unwrap();
    let line = cart.items[0].id;

    let cart = carts.set_quantity(customer, line, 0).await.unwrap();
    assert!(cart.items.is_empty());
    assert_eq!(cart.subtotal, Money::ZERO);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_other_customers_line_is_not_found() {
    let pool = pool().await;
    let owner = create_customer(&pool).await;
    let stranger = create_customer(&pool).await;
    let (_, variant) = create_product(&pool, Decimal::new(500, 2), 10).await;
    let carts = CartRepository::new(&pool);

    let line = carts.add_item(owner, variant, 1).await.unwrap().items[0].id;

    let result = carts.remove_item(stranger, line).await;
    assert!(matches!(result, Err(RepositoryError::NotFound)));
    assert_eq!(carts.get(owner).await.unwrap().items.len(), 1);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_favorites_capped() {
    let pool = pool().await;
    let customer = create_customer(&pool).await;
    let favorites = FavoriteRepository::new(&pool);

    for _ in 0..MAX_FAVORITES {
        let (product, _) = create_product(&pool, Decimal::ONE, 1).await;
        let outcome = favorites.add(customer, product).await.unwrap();
        assert!(matches!(outcome, FavoriteOutcome::Added(_)));
    }

    let (extra, _) = create_product(&pool, Decimal::ONE, 1).await;
    let outcome = favorites.add(customer, extra).await.unwrap();
    assert!(matches!(outcome, FavoriteOutcome::LimitReached));
    assert_eq!(favorites.count(customer).await.unwrap(), MAX_FAVORITES);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_refavoriting_is_idempotent() {
    let pool = pool().await;
    let customer = create_customer(&pool).await;
    let (product, _) = create_product(&pool, Decimal::ONE, 1).await;
    let favorites = FavoriteRepository::new(&pool);

    favorites.add(customer, product).await.unwrap();
    let outcome = favorites.add(customer, product).await.unwrap();

    assert!(matches!(outcome, FavoriteOutcome::Existing(_)));
    assert_eq!(favorites.count(customer).await.unwrap(), 1);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_concurrent_favorites_respect_cap() {
    let pool = pool().await;
    let customer = create_customer(&pool).await;

    let mut products = Vec::new();
    for _ in 0..(MAX_FAVORITES + 5) {
        products.push(create_product(&pool, Decimal::ONE, 1).await.0);
    }

    let tasks: Vec<_> = products
        .into_iter()
        .map(|product| {
            let pool = pool.clone();
            tokio::spawn(async move { FavoriteRepository::new(&pool).add(customer, product).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let count = FavoriteRepository::new(&pool).count(customer).await.unwrap();
    assert_eq!(count, MAX_FAVORITES);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_withdrawn_product_marked_unavailable() {
    let pool = pool().await;
    let customer = create_customer(&pool).await;
    let (product, variant) = create_product(&pool, Decimal::TEN, 10).await;
    let carts = CartRepository::new(&pool);
    carts.add_item(customer, variant, 1).await.unwrap();

    sqlx::query("UPDATE shop.product SET is_active = FALSE WHERE id = $1")
        .bind(product)
        .execute(&pool)
        .await
        .unwrap();

    let cart = carts.get(customer).await.unwrap();
    assert!(!cart.items[0].available);
    assert_eq!(
        cart.unavailable_line().map(|l| l.product_id),
        Some(product)
    );
}
