//! Integration test fixtures for Storehouse.
//!
//! # Running Tests
//!
//! ```bash
//! # Point at a scratch database; migrations are applied on connect
//! export DATABASE_URL=postgres://localhost/storehouse_test
//!
//! # Run the ignored database tests
//! cargo test -p storehouse-integration-tests -- --ignored
//! ```
//!
//! Every fixture uses fresh random names, so tests can share one database
//! and run in parallel.

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::missing_panics_doc)]

use rust_decimal::Decimal;
use sqlx::PgPool;
use storehouse_core::{CategoryId, CouponId, CustomerId, Money, ProductId, VariantId};
use storehouse_storefront::config::ShippingConfig;
use storehouse_storefront::db::AddressRepository;
use storehouse_storefront::models::{Address, AddressInput};
use uuid::Uuid;

/// Connect to `DATABASE_URL` and bring the schema up to date.
pub async fn pool() -> PgPool {
    let _ = dotenvy::dotenv();
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPool::connect(&url)
        .await
        .expect("Failed to connect to database");
    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

/// Short random suffix for unique names.
#[must_use]
pub fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

/// Flat $5 shipping, free from $50.
#[must_use]
pub fn shipping() -> ShippingConfig {
    ShippingConfig {
        flat_rate: Money::from_cents(500),
        free_threshold: Some(Money::from_cents(5000)),
    }
}

/// Insert a customer with the `customer` role.
pub async fn create_customer(pool: &PgPool) -> CustomerId {
    let external_id = unique("user");
    sqlx::query_scalar(
        "INSERT INTO shop.customer (external_id, email, first_name) \
         VALUES ($1, $2, 'Test') RETURNING id",
    )
    .bind(&external_id)
    .bind(format!("{external_id}@example.com"))
    .fetch_one(pool)
    .await
    .expect("Failed to insert customer")
}

/// Insert an active product with one variant.
pub async fn create_product(pool: &PgPool, price: Decimal, inventory: i32) -> (ProductId, VariantId) {
    let slug = unique("product");
    let product_id: ProductId = sqlx::query_scalar(
        "INSERT INTO shop.product (name, slug, base_price) VALUES ($1, $1, $2) RETURNING id",
    )
    .bind(&slug)
    .bind(price)
    .fetch_one(pool)
    .await
    .expect("Failed to insert product");

    let variant_id: VariantId = sqlx::query_scalar(
        "INSERT INTO shop.product_variant (product_id, sku, size, price, inventory) \
         VALUES ($1, $2, 'M', $3, $4) RETURNING id",
    )
    .bind(product_id)
    .bind(slug.to_uppercase())
    .bind(price)
    .bind(inventory)
    .fetch_one(pool)
    .await
    .expect("Failed to insert variant");

    (product_id, variant_id)
}

/// Current stock of a variant.
pub async fn inventory(pool: &PgPool, variant_id: VariantId) -> i32 {
    sqlx::query_scalar("SELECT inventory FROM shop.product_variant WHERE id = $1")
        .bind(variant_id)
        .fetch_one(pool)
        .await
        .expect("Failed to read inventory")
}

/// Give the customer a default shipping address.
pub async fn create_address(pool: &PgPool, customer_id: CustomerId) -> Address {
    let input = AddressInput {
        full_name: "Test Customer".to_string(),
        line1: "1 Market St".to_string(),
        line2: None,
        city: "Springfield".to_string(),
        state: "OR".to_string(),
        postal_code: "97477".to_string(),
        country: "US".to_string(),
        phone: None,
        is_default: true,
    };
    AddressRepository::new(pool)
        .create(customer_id, &input)
        .await
        .expect("Failed to insert address")
}

/// Insert a top-level category.
pub async fn create_category(pool: &PgPool) -> CategoryId {
    let slug = unique("category");
    sqlx::query_scalar("INSERT INTO shop.category (name, slug) VALUES ($1, $1) RETURNING id")
        .bind(&slug)
        .fetch_one(pool)
        .await
        .expect("Failed to insert category")
}

/// Map a product into a category.
pub async fn link_category(pool: &PgPool, product_id: ProductId, category_id: CategoryId, primary: bool) {
    sqlx::query(
        "INSERT INTO shop.product_category (product_id, category_id, is_primary) VALUES ($1, $2, $3)",
    )
    .bind(product_id)
    .bind(category_id)
    .bind(primary)
    .execute(pool)
    .await
    .expect("Failed to link category");
}

/// Insert an active 10% coupon with an optional usage limit; returns its code.
pub async fn create_coupon(pool: &PgPool, usage_limit: Option<i32>) -> (CouponId, String) {
    let code = Uuid::new_v4().simple().to_string().to_uppercase();
    let id = sqlx::query_scalar(
        "INSERT INTO shop.coupon (code, coupon_type, value, usage_limit) \
         VALUES ($1, 'percentage', 10, $2) RETURNING id",
    )
    .bind(&code)
    .bind(usage_limit)
    .fetch_one(pool)
    .await
    .expect("Failed to insert coupon");
    (id, code)
}
