//! Category management handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use storehouse_core::{ApiResponse, CategoryId, ProductId};

use crate::db::CategoryRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{CategoryInput, CategoryWithCount, ReassignOutcome};
use crate::state::AppState;

/// Largest number of products accepted in one assignment.
pub const MAX_ASSIGN_BATCH: usize = 500;

/// Query string of `DELETE /api/categories/{id}`.
#[derive(Debug, Default, Deserialize)]
pub struct DeleteQuery {
    #[serde(default)]
    pub force: bool,
}

/// Body of `POST /api/categories/{id}/products`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignProductsRequest {
    pub product_ids: Vec<ProductId>,
    #[serde(default)]
    pub primary: bool,
}

/// Response of `POST /api/categories/{id}/products`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignProductsResponse {
    /// Mappings that did not exist before.
    pub assigned: u64,
    pub category: CategoryWithCount,
}

/// Body of `POST /api/categories/{id}/reassign`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReassignRequest {
    pub target_id: CategoryId,
}

fn validated(input: CategoryInput) -> Result<CategoryInput> {
    input.normalized().map_err(AppError::BadRequest)
}

/// Category list with product counts.
///
/// `GET /api/categories`
#[instrument(skip(state, _admin))]
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<ApiResponse<Vec<CategoryWithCount>>>> {
    let categories = CategoryRepository::new(state.pool()).list().await?;
    Ok(Json(ApiResponse::ok(categories)))
}

/// Create a category.
///
/// `POST /api/categories`
#[instrument(skip(state, _admin, body))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Json(body): Json<CategoryInput>,
) -> Result<(StatusCode, Json<ApiResponse<CategoryWithCount>>)> {
    let input = validated(body)?;
    let category = CategoryRepository::new(state.pool()).create(&input).await?;

    tracing::info!(category_id = %category.id, slug = %category.slug, "Category created");
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(category))))
}

/// Replace a category's fields.
///
/// `PUT /api/categories/{id}`
#[instrument(skip(state, _admin, body))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<CategoryId>,
    Json(body): Json<CategoryInput>,
) -> Result<Json<ApiResponse<CategoryWithCount>>> {
    let input = validated(body)?;
    let category = CategoryRepository::new(state.pool())
        .update(id, &input)
        .await?;
    Ok(Json(ApiResponse::ok(category)))
}

/// Delete a category; `?force=true` also unlinks its products.
///
/// `DELETE /api/categories/{id}`
#[instrument(skip(state, _admin))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<CategoryId>,
    Query(query): Query<DeleteQuery>,
) -> Result<StatusCode> {
    let unlinked = CategoryRepository::new(state.pool())
        .delete(id, query.force)
        .await?;

    tracing::info!(category_id = %id, unlinked, "Category deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Map products to a category.
///
/// `POST /api/categories/{id}/products`
#[instrument(skip(state, _admin, body), fields(count = body.product_ids.len(), primary = body.primary))]
pub async fn assign_products(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<CategoryId>,
    Json(body): Json<AssignProductsRequest>,
) -> Result<Json<ApiResponse<AssignProductsResponse>>> {
    if body.product_ids.is_empty() {
        return Err(AppError::BadRequest("productIds must not be empty".to_string()));
    }
    if body.product_ids.len() > MAX_ASSIGN_BATCH {
        return Err(AppError::BadRequest(format!(
            "at most {MAX_ASSIGN_BATCH} products per request"
        )));
    }

    let repo = CategoryRepository::new(state.pool());
    let assigned = repo
        .assign_products(id, &body.product_ids, body.primary)
        .await?;
    let category = repo
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;

    Ok(Json(ApiResponse::ok(AssignProductsResponse {
        assigned,
        category,
    })))
}

/// Move every product of a category to another one.
///
/// `POST /api/categories/{id}/reassign`
#[instrument(skip(state, _admin))]
pub async fn reassign(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<CategoryId>,
    Json(body): Json<ReassignRequest>,
) -> Result<Json<ApiResponse<ReassignOutcome>>> {
    let outcome = CategoryRepository::new(state.pool())
        .reassign(id, body.target_id)
        .await?;

    tracing::info!(
        from = %id,
        to = %body.target_id,
        moved = outcome.moved,
        merged = outcome.merged,
        "Category products reassigned"
    );
    Ok(Json(ApiResponse::ok(outcome)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_body() {
        let body: AssignProductsRequest =
            serde_json::from_str(r#"{"productIds": [3, 1, 3]}"#).unwrap();
        assert_eq!(body.product_ids.len(), 3);
        assert!(!body.primary);
    }

    #[test]
    fn test_reassign_body() {
        let body: ReassignRequest = serde_json::from_str(r#"{"targetId": 9}"#).unwrap();
        assert_eq!(body.target_id, CategoryId::new(9));
    }
}
