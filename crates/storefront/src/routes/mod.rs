//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                        - Liveness
//! GET    /health/ready                  - Readiness (database ping)
//!
//! # Catalog (public)
//! GET    /api/products                  - Product listing (filters, sort, pagination)
//! GET    /api/products/{slug}           - Product detail
//! GET    /api/categories                - Category list (cached)
//!
//! # Cart
//! GET    /api/cart                      - Current cart
//! DELETE /api/cart                      - Empty the cart
//! POST   /api/cart/items                - Add variant (quantities accumulate)
//! PATCH  /api/cart/items/{id}           - Set quantity (0 removes)
//! DELETE /api/cart/items/{id}           - Remove line
//!
//! # Favorites
//! GET    /api/favorites                 - List
//! POST   /api/favorites                 - Add (capped per customer)
//! DELETE /api/favorites/{productId}     - Remove
//!
//! # Addresses
//! GET    /api/addresses                 - List
//! POST   /api/addresses                 - Create
//! GET    /api/addresses/{id}            - Show
//! PUT    /api/addresses/{id}            - Update
//! DELETE /api/addresses/{id}            - Delete
//! POST   /api/addresses/{id}/default    - Make default
//!
//! # Checkout (strict rate limit)
//! POST   /api/coupons/validate          - Coupon preview
//! POST   /api/checkout                  - Place order
//! GET    /api/orders                    - Order history
//! GET    /api/orders/{id}               - Order detail
//!
//! # Webhooks (strict rate limit)
//! POST   /api/webhooks/identity         - Identity-provider user events
//! ```

pub mod addresses;
pub mod cart;
pub mod checkout;
pub mod favorites;
pub mod orders;
pub mod products;
pub mod webhooks;

use axum::{
    Router,
    routing::{delete, get, patch, post},
};

use crate::middleware::{api_rate_limiter, checkout_rate_limiter, webhook_rate_limiter};
use crate::state::AppState;

/// Catalog routes.
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(products::index))
        .route("/products/{slug}", get(products::show))
        .route("/categories", get(products::categories))
}

/// Cart routes.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/items", post(cart::add_item))
        .route(
            "/items/{id}",
            patch(cart::update_item).delete(cart::remove_item),
        )
}

/// Favorites routes.
pub fn favorite_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(favorites::index).post(favorites::add))
        .route("/{product_id}", delete(favorites::remove))
}

/// Address book routes.
pub fn address_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(addresses::index).post(addresses::create))
        .route(
            "/{id}",
            get(addresses::show)
                .put(addresses::update)
                .delete(addresses::delete),
        )
        .route("/{id}/default", post(addresses::set_default))
}

/// Order history routes.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/{id}", get(orders::show))
}

/// Create the `/api` router with rate limits applied per group.
pub fn api_routes() -> Router<AppState> {
    let checkout = Router::new()
        .route("/checkout", post(checkout::checkout))
        .route("/coupons/validate", post(checkout::validate_coupon))
        .layer(checkout_rate_limiter());

    let webhooks = Router::new()
        .route("/webhooks/identity", post(webhooks::identity))
        .layer(webhook_rate_limiter());

    let general = Router::new()
        .merge(catalog_routes())
        .nest("/cart", cart_routes())
        .nest("/favorites", favorite_routes())
        .nest("/addresses", address_routes())
        .nest("/orders", order_routes())
        .layer(api_rate_limiter());

    Router::new().merge(general).merge(checkout).merge(webhooks)
}
