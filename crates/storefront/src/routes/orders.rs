//! Order history route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use tracing::instrument;

use storehouse_core::{ApiResponse, OrderId, PageRequest, Paginated};

use crate::db::OrderRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireCustomer;
use crate::models::{Order, OrderSummary};
use crate::state::AppState;

/// The customer's orders, newest first.
///
/// `GET /api/orders?page&limit`
#[instrument(skip(state, customer))]
pub async fn index(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    Query(page): Query<PageRequest>,
) -> Result<Json<Paginated<OrderSummary>>> {
    let (orders, total) = OrderRepository::new(state.pool())
        .list_for_customer(customer.id, page)
        .await?;
    Ok(Json(Paginated::new(orders, total, page)))
}

/// One of the customer's orders with its items.
///
/// `GET /api/orders/{id}`
#[instrument(skip(state, customer))]
pub async fn show(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    Path(id): Path<OrderId>,
) -> Result<Json<ApiResponse<Order>>> {
    let order = OrderRepository::new(state.pool())
        .get_for_customer(customer.id, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;
    Ok(Json(ApiResponse::ok(order)))
}
