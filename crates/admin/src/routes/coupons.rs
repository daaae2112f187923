//! Coupon management handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use storehouse_core::{ApiResponse, Coupon, CouponId, PageRequest, Paginated};

use crate::db::{CouponFilter, CouponInput, CouponRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// Body of `PATCH /api/coupons/{id}/active`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetActiveRequest {
    pub is_active: bool,
}

fn not_found() -> AppError {
    AppError::NotFound("Coupon not found".to_string())
}

/// Coupon list.
///
/// `GET /api/coupons?page&limit&active`
#[instrument(skip(state, _admin))]
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(page): Query<PageRequest>,
    Query(filter): Query<CouponFilter>,
) -> Result<Json<Paginated<Coupon>>> {
    let (coupons, total) = CouponRepository::new(state.pool())
        .list(filter, page)
        .await?;
    Ok(Json(Paginated::new(coupons, total, page)))
}

/// Create a coupon.
///
/// `POST /api/coupons`
#[instrument(skip(state, _admin, body), fields(code = %body.code))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Json(body): Json<CouponInput>,
) -> Result<(StatusCode, Json<ApiResponse<Coupon>>)> {
    let input = body.validated()?;
    let coupon = CouponRepository::new(state.pool()).create(&input).await?;

    tracing::info!(coupon_id = %coupon.id, code = %coupon.code, "Coupon created");
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(coupon))))
}

/// Coupon detail.
///
/// `GET /api/coupons/{id}`
#[instrument(skip(state, _admin))]
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<CouponId>,
) -> Result<Json<ApiResponse<Coupon>>> {
    let coupon = CouponRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(ApiResponse::ok(coupon)))
}

/// Replace a coupon's definition.
///
/// `PUT /api/coupons/{id}`
#[instrument(skip(state, _admin, body))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<CouponId>,
    Json(body): Json<CouponInput>,
) -> Result<Json<ApiResponse<Coupon>>> {
    let input = body.validated()?;
    let coupon = CouponRepository::new(state.pool())
        .update(id, &input)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(ApiResponse::ok(coupon)))
}

/// Switch a coupon on or off.
///
/// `PATCH /api/coupons/{id}/active`
#[instrument(skip(state, _admin))]
pub async fn set_active(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<CouponId>,
    Json(body): Json<SetActiveRequest>,
) -> Result<Json<ApiResponse<Coupon>>> {
    let coupon = CouponRepository::new(state.pool())
        .set_active(id, body.is_active)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(ApiResponse::ok(coupon)))
}

/// Delete a coupon.
///
/// `DELETE /api/coupons/{id}`
#[instrument(skip(state, _admin))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<CouponId>,
) -> Result<StatusCode> {
    if !CouponRepository::new(state.pool()).delete(id).await? {
        return Err(not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}
