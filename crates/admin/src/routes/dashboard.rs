//! Dashboard handler.

use axum::{Json, extract::State};
use tracing::instrument;

use storehouse_core::ApiResponse;

use crate::db::DashboardRepository;
use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::models::DashboardSummary;
use crate::state::AppState;

/// Store summary.
///
/// `GET /api/dashboard`
#[instrument(skip(state, _admin))]
pub async fn summary(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<ApiResponse<DashboardSummary>>> {
    let summary = DashboardRepository::new(state.pool()).summary().await?;
    Ok(Json(ApiResponse::ok(summary)))
}
