//! Cart route handlers.
//!
//! Every mutation responds with the full cart so clients can re-render
//! without a second request.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use storehouse_core::{ApiResponse, CartItemId, VariantId};

use crate::db::CartRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireCustomer;
use crate::models::Cart;
use crate::state::AppState;

/// Largest quantity accepted in a single add or update.
pub const MAX_QUANTITY_PER_REQUEST: i32 = 99;

const fn default_quantity() -> i32 {
    1
}

/// Add-to-cart request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub variant_id: VariantId,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

/// Quantity update request body.
#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i32,
}

/// Current cart.
///
/// `GET /api/cart`
#[instrument(skip(state, customer))]
pub async fn show(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
) -> Result<Json<ApiResponse<Cart>>> {
    let cart = CartRepository::new(state.pool()).get(customer.id).await?;
    Ok(Json(ApiResponse::ok(cart)))
}

/// Add a variant; quantities accumulate if it is already in the cart.
///
/// `POST /api/cart/items`
#[instrument(skip(state, customer), fields(variant_id = %body.variant_id, quantity = body.quantity))]
pub async fn add_item(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    Json(body): Json<AddItemRequest>,
) -> Result<Json<ApiResponse<Cart>>> {
    if !(1..=MAX_QUANTITY_PER_REQUEST).contains(&body.quantity) {
        return Err(AppError::BadRequest(format!(
            "quantity must be between 1 and {MAX_QUANTITY_PER_REQUEST}"
        )));
    }

    let cart = CartRepository::new(state.pool())
        .add_item(customer.id, body.variant_id, body.quantity)
        .await?;

    Ok(Json(ApiResponse::ok(cart)))
}

/// Set a line's quantity; zero removes the line.
///
/// `PATCH /api/cart/items/{id}`
#[instrument(skip(state, customer))]
pub async fn update_item(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    Path(item_id): Path<CartItemId>,
    Json(body): Json<UpdateQuantityRequest>,
) -> Result<Json<ApiResponse<Cart>>> {
    if !(0..=MAX_QUANTITY_PER_REQUEST).contains(&body.quantity) {
        return Err(AppError::BadRequest(format!(
            "quantity must be between 0 and {MAX_QUANTITY_PER_REQUEST}"
        )));
    }

    let cart = CartRepository::new(state.pool())
        .set_quantity(customer.id, item_id, body.quantity)
        .await?;

    Ok(Json(ApiResponse::ok(cart)))
}

/// Remove a line.
///
/// `DELETE /api/cart/items/{id}`
#[instrument(skip(state, customer))]
pub async fn remove_item(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    Path(item_id): Path<CartItemId>,
) -> Result<Json<ApiResponse<Cart>>> {
    let cart = CartRepository::new(state.pool())
        .remove_item(customer.id, item_id)
        .await?;
    Ok(Json(ApiResponse::ok(cart)))
}

/// Empty the cart.
///
/// `DELETE /api/cart`
#[instrument(skip(state, customer))]
pub async fn clear(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
) -> Result<StatusCode> {
    CartRepository::new(state.pool()).clear(customer.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_add_item_quantity_defaults_to_one() {
        let body: AddItemRequest = serde_json::from_str(r#"{"variantId": 7}"#).unwrap();
        assert_eq!(body.variant_id, VariantId::new(7));
        assert_eq!(body.quantity, 1);
    }
}
