//! Favorites route handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use storehouse_core::{ApiResponse, MAX_FAVORITES, ProductId};

use crate::db::{FavoriteOutcome, FavoriteRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireCustomer;
use crate::models::FavoriteProduct;
use crate::state::AppState;

/// Add-favorite request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddFavoriteRequest {
    pub product_id: ProductId,
}

/// Favorited products, newest first.
///
/// `GET /api/favorites`
#[instrument(skip(state, customer))]
pub async fn index(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
) -> Result<Json<ApiResponse<Vec<FavoriteProduct>>>> {
    let favorites = FavoriteRepository::new(state.pool()).list(customer.id).await?;
    Ok(Json(ApiResponse::ok(favorites)))
}

/// Favorite a product.
///
/// `POST /api/favorites`
///
/// - 201 with the new favorite
/// - 200 with the existing row if the product was already a favorite
/// - 400 once the customer holds [`MAX_FAVORITES`]
#[instrument(skip(state, customer), fields(product_id = %body.product_id))]
pub async fn add(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    Json(body): Json<AddFavoriteRequest>,
) -> Result<(StatusCode, Json<ApiResponse<FavoriteProduct>>)> {
    match FavoriteRepository::new(state.pool())
        .add(customer.id, body.product_id)
        .await?
    {
        FavoriteOutcome::Added(favorite) => {
            Ok((StatusCode::CREATED, Json(ApiResponse::ok(favorite))))
        }
        FavoriteOutcome::Existing(favorite) => Ok((StatusCode::OK, Json(ApiResponse::ok(favorite)))),
        FavoriteOutcome::LimitReached => {
            tracing::info!(limit = MAX_FAVORITES, "Favorites limit reached");
            Err(AppError::BadRequest("favorites limit reached".to_string()))
        }
    }
}

/// Unfavorite a product.
///
/// `DELETE /api/favorites/{productId}`
#[instrument(skip(state, customer))]
pub async fn remove(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    Path(product_id): Path<ProductId>,
) -> Result<StatusCode> {
    let removed = FavoriteRepository::new(state.pool())
        .remove(customer.id, product_id)
        .await?;

    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("Favorite not found".to_string()))
    }
}
