//! User management handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use storehouse_core::{ApiResponse, CustomerId, CustomerRole, PageRequest, Paginated};

use crate::db::{UserFilter, UserRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{Customer, CustomerDetail, CustomerSummary};
use crate::state::AppState;

/// Role change request body.
#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: CustomerRole,
}

/// User list.
///
/// `GET /api/users?page&limit&search&role`
#[instrument(skip(state, _admin))]
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(page): Query<PageRequest>,
    Query(filter): Query<UserFilter>,
) -> Result<Json<Paginated<CustomerSummary>>> {
    let (users, total) = UserRepository::new(state.pool())
        .list(&filter, page)
        .await?;
    Ok(Json(Paginated::new(users, total, page)))
}

/// User detail with recent orders.
///
/// `GET /api/users/{id}`
#[instrument(skip(state, _admin))]
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<CustomerId>,
) -> Result<Json<ApiResponse<CustomerDetail>>> {
    let user = UserRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(Json(ApiResponse::ok(user)))
}

/// Grant or revoke the admin role.
///
/// Admins cannot change their own role, so the last admin cannot lock
/// everyone out by accident.
///
/// `PATCH /api/users/{id}/role`
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn set_role(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CustomerId>,
    Json(body): Json<SetRoleRequest>,
) -> Result<Json<ApiResponse<Customer>>> {
    if id == admin.id {
        return Err(AppError::BadRequest(
            "You cannot change your own role".to_string(),
        ));
    }

    let user = UserRepository::new(state.pool())
        .set_role(id, body.role)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    tracing::info!(user_id = %id, role = %body.role, "User role changed");
    Ok(Json(ApiResponse::ok(user)))
}

/// Delete a user and their carts, favorites, addresses and orders.
///
/// `DELETE /api/users/{id}`
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CustomerId>,
) -> Result<StatusCode> {
    if id == admin.id {
        return Err(AppError::BadRequest(
            "You cannot delete your own account".to_string(),
        ));
    }

    if !UserRepository::new(state.pool()).delete(id).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    tracing::info!(user_id = %id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_set_role_body() {
        let body: SetRoleRequest = serde_json::from_str(r#"{"role": "admin"}"#).unwrap();
        assert_eq!(body.role, CustomerRole::Admin);
        assert!(serde_json::from_str::<SetRoleRequest>(r#"{"role": "owner"}"#).is_err());
    }
}
