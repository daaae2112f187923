//! Catalog route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use tracing::instrument;

use storehouse_core::{ApiResponse, PageRequest, Paginated};

use crate::db::{CatalogRepository, ProductFilter};
use crate::error::{AppError, Result};
use crate::models::{Category, ProductDetail, ProductSummary};
use crate::state::AppState;

/// Product listing.
///
/// `GET /api/products?page&limit&category&search&minPrice&maxPrice&sort`
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(page): Query<PageRequest>,
    Query(filter): Query<ProductFilter>,
) -> Result<Json<Paginated<ProductSummary>>> {
    if let (Some(min), Some(max)) = (filter.min_price, filter.max_price) {
        if min > max {
            return Err(AppError::BadRequest(
                "minPrice must not exceed maxPrice".to_string(),
            ));
        }
    }

    let (products, total) = CatalogRepository::new(state.pool())
        .list_products(&filter, page)
        .await?;

    Ok(Json(Paginated::new(products, total, page)))
}

/// Product detail with variants and categories.
///
/// `GET /api/products/{slug}`
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<ProductDetail>>> {
    let product = CatalogRepository::new(state.pool())
        .get_product_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    Ok(Json(ApiResponse::ok(product)))
}

/// Category list, served from the catalog cache.
///
/// `GET /api/categories`
#[instrument(skip(state))]
pub async fn categories(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<Category>>>> {
    let categories = state.catalog().categories(state.pool()).await?;
    Ok(Json(ApiResponse::ok(categories.as_ref().clone())))
}
