//! HTTP route handlers for admin.
//!
//! Every route under `/api` takes the [`RequireAdmin`](crate::middleware::RequireAdmin)
//! extractor.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                          - Liveness
//! GET    /health/ready                    - Readiness (database ping)
//!
//! GET    /api/dashboard                   - Store summary
//!
//! # Users
//! GET    /api/users                       - List (search, role filter)
//! GET    /api/users/{id}                  - Detail with recent orders
//! PATCH  /api/users/{id}/role             - Grant/revoke admin
//! DELETE /api/users/{id}                  - Delete (not yourself)
//!
//! # Coupons
//! GET    /api/coupons                     - List (active filter)
//! POST   /api/coupons                     - Create
//! GET    /api/coupons/{id}                - Detail
//! PUT    /api/coupons/{id}                - Replace
//! DELETE /api/coupons/{id}                - Delete
//! PATCH  /api/coupons/{id}/active         - Switch on/off
//!
//! # Orders
//! GET    /api/orders                      - List (status, customerId filters)
//! GET    /api/orders/{id}                 - Detail with items and customer
//! PATCH  /api/orders/{id}/status          - Lifecycle transition
//!
//! # Categories
//! GET    /api/categories                  - List with product counts
//! POST   /api/categories                  - Create
//! PUT    /api/categories/{id}             - Update
//! DELETE /api/categories/{id}             - Delete (?force=true to unlink products)
//! POST   /api/categories/{id}/products    - Bulk assign products
//! POST   /api/categories/{id}/reassign    - Move all products to another category
//! ```

pub mod categories;
pub mod coupons;
pub mod dashboard;
pub mod orders;
pub mod users;

use axum::{
    Router,
    routing::{get, patch, post, put},
};

use crate::state::AppState;

/// User management routes.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(users::index))
        .route("/{id}", get(users::show).delete(users::delete))
        .route("/{id}/role", patch(users::set_role))
}

/// Coupon management routes.
pub fn coupon_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(coupons::index).post(coupons::create))
        .route(
            "/{id}",
            get(coupons::show)
                .put(coupons::update)
                .delete(coupons::delete),
        )
        .route("/{id}/active", patch(coupons::set_active))
}

/// Order management routes.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/{id}", get(orders::show))
        .route("/{id}/status", patch(orders::update_status))
}

/// Category management routes.
pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(categories::index).post(categories::create))
        .route(
            "/{id}",
            put(categories::update).delete(categories::delete),
        )
        .route("/{id}/products", post(categories::assign_products))
        .route("/{id}/reassign", post(categories::reassign))
}

/// All `/api` routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard::summary))
        .nest("/users", user_routes())
        .nest("/coupons", coupon_routes())
        .nest("/orders", order_routes())
        .nest("/categories", category_routes())
}
