//! Database operations for the storefront.
//!
//! # Schema: `shop`
//!
//! The storefront reads the catalog and owns the customer-facing tables:
//!
//! - `customer` - Local mirror of identity-provider users
//! - `address` - Shipping addresses
//! - `cart` / `cart_item` - One cart per customer
//! - `favorite` - Saved products (capped per customer)
//! - `orders` / `order_item` - Placed orders
//!
//! # Migrations
//!
//! Migrations live in the workspace `migrations/` directory and run via:
//! ```bash
//! cargo run -p storehouse-cli -- migrate
//! ```

pub mod addresses;
pub mod carts;
pub mod catalog;
pub mod coupons;
pub mod customers;
pub mod favorites;
pub mod orders;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use addresses::AddressRepository;
pub use carts::CartRepository;
pub use catalog::{CatalogRepository, ProductFilter, ProductSort};
pub use coupons::CouponRepository;
pub use customers::{CustomerProfile, CustomerRepository};
pub use favorites::{FavoriteOutcome, FavoriteRepository};
pub use orders::{CheckoutError, CheckoutRequest, OrderRepository};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique-constraint violation to `Conflict`, anything else to `Database`.
    pub(crate) fn from_unique(e: sqlx::Error, message: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return Self::Conflict(message.to_owned());
        }
        Self::Database(e)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
