//! Order management handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::instrument;

use storehouse_core::{ApiResponse, OrderId, OrderStatus, PageRequest, Paginated};

use crate::db::{OrderFilter, OrderRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{AdminOrderSummary, OrderDetail};
use crate::state::AppState;

/// Body of `PATCH /api/orders/{id}/status`.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

/// Order list.
///
/// `GET /api/orders?page&limit&status&customerId`
#[instrument(skip(state, _admin))]
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(page): Query<PageRequest>,
    Query(filter): Query<OrderFilter>,
) -> Result<Json<Paginated<AdminOrderSummary>>> {
    let (orders, total) = OrderRepository::new(state.pool())
        .list(&filter, page)
        .await?;
    Ok(Json(Paginated::new(orders, total, page)))
}

/// Order detail with items and customer.
///
/// `GET /api/orders/{id}`
#[instrument(skip(state, _admin))]
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<OrderId>,
) -> Result<Json<ApiResponse<OrderDetail>>> {
    let order = OrderRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;
    Ok(Json(ApiResponse::ok(order)))
}

/// Advance or cancel an order.
///
/// `PATCH /api/orders/{id}/status`
#[instrument(skip(state, admin), fields(admin_id = %admin.id, status = %body.status))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<ApiResponse<OrderDetail>>> {
    let order = OrderRepository::new(state.pool())
        .update_status(id, body.status)
        .await?;

    tracing::info!(order_id = %id, status = %order.status, "Order status updated");
    Ok(Json(ApiResponse::ok(order)))
}
