//! Address book route handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::instrument;

use storehouse_core::{AddressId, ApiResponse};

use crate::db::AddressRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireCustomer;
use crate::models::{Address, AddressInput};
use crate::state::AppState;

/// `GET /api/addresses`
#[instrument(skip(state, customer))]
pub async fn index(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
) -> Result<Json<ApiResponse<Vec<Address>>>> {
    let addresses = AddressRepository::new(state.pool()).list(customer.id).await?;
    Ok(Json(ApiResponse::ok(addresses)))
}

/// `POST /api/addresses`
#[instrument(skip(state, customer, input))]
pub async fn create(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    Json(input): Json<AddressInput>,
) -> Result<(StatusCode, Json<ApiResponse<Address>>)> {
    let input = input.normalized().map_err(AppError::BadRequest)?;
    let address = AddressRepository::new(state.pool())
        .create(customer.id, &input)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(address))))
}

/// `GET /api/addresses/{id}`
#[instrument(skip(state, customer))]
pub async fn show(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    Path(id): Path<AddressId>,
) -> Result<Json<ApiResponse<Address>>> {
    let address = AddressRepository::new(state.pool())
        .get(customer.id, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Address not found".to_string()))?;
    Ok(Json(ApiResponse::ok(address)))
}

/// `PUT /api/addresses/{id}`
#[instrument(skip(state, customer, input))]
pub async fn update(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    Path(id): Path<AddressId>,
    Json(input): Json<AddressInput>,
) -> Result<Json<ApiResponse<Address>>> {
    let input = input.normalized().map_err(AppError::BadRequest)?;
    let address = AddressRepository::new(state.pool())
        .update(customer.id, id, &input)
        .await?;
    Ok(Json(ApiResponse::ok(address)))
}

/// `POST /api/addresses/{id}/default`
#[instrument(skip(state, customer))]
pub async fn set_default(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    Path(id): Path<AddressId>,
) -> Result<Json<ApiResponse<Address>>> {
    let address = AddressRepository::new(state.pool())
        .set_default(customer.id, id)
        .await?;
    Ok(Json(ApiResponse::ok(address)))
}

/// `DELETE /api/addresses/{id}`
#[instrument(skip(state, customer))]
pub async fn delete(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    Path(id): Path<AddressId>,
) -> Result<StatusCode> {
    AddressRepository::new(state.pool())
        .delete(customer.id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
