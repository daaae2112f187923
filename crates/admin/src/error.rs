//! Unified error handling for admin.
//!
//! Errors render as the same `{ success, data, error }` envelope the
//! storefront uses, so one client library can talk to both APIs.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use storehouse_core::{ApiResponse, CouponError, identity::IdentityError};
use thiserror::Error;

use crate::db::{CategoryError, RepositoryError, StatusChangeError};

/// Application-level error type for the admin API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Session token could not be verified.
    #[error("Unauthorized: {0}")]
    Identity(#[from] IdentityError),

    /// Coupon definition rejected.
    #[error("{0}")]
    Coupon(#[from] CouponError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User lacks permission.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request conflicts with current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(RepositoryError::Conflict(_)) | Self::Conflict(_) => {
                StatusCode::CONFLICT
            }
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Identity(_) | Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Coupon(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    // Don't expose internal error details to clients
    fn client_message(&self) -> String {
        match self {
            Self::Database(RepositoryError::NotFound) => "Not found".to_string(),
            Self::Database(RepositoryError::Conflict(msg)) => msg.clone(),
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Identity(_) => "Authentication required".to_string(),
            Self::Coupon(err) => err.to_string(),
            Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::BadRequest(msg)
            | Self::Conflict(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Admin request error"
            );
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Admin request rejected");
        }

        (status, Json(ApiResponse::err(self.client_message()))).into_response()
    }
}

impl From<StatusChangeError> for AppError {
    fn from(err: StatusChangeError) -> Self {
        match err {
            StatusChangeError::NotFound => Self::NotFound("Order not found".to_string()),
            e @ StatusChangeError::InvalidTransition { .. } => Self::BadRequest(e.to_string()),
            StatusChangeError::Repository(e) => Self::Database(e),
        }
    }
}

impl From<CategoryError> for AppError {
    fn from(err: CategoryError) -> Self {
        match err {
            CategoryError::NotFound => Self::NotFound("Category not found".to_string()),
            e @ CategoryError::HasProducts(_) => Self::Conflict(capitalize(&e.to_string())),
            e @ (CategoryError::ParentNotFound
            | CategoryError::Cycle
            | CategoryError::SameTarget
            | CategoryError::UnknownProducts(_)) => Self::BadRequest(capitalize(&e.to_string())),
            CategoryError::Repository(e) => Self::Database(e),
        }
    }
}

fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context for the signed-in admin.
pub fn set_sentry_user(customer_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(customer_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use storehouse_core::OrderStatus;

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("order-123".to_string());
        assert_eq!(err.to_string(), "Not found: order-123");

        let err = AppError::Forbidden("admin role required".to_string());
        assert_eq!(err.to_string(), "Forbidden: admin role required");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Conflict("test".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(AppError::Database(RepositoryError::Conflict(
                "Coupon code already exists".to_string()
            ))),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Coupon(CouponError::InvalidRule("x".to_string()))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Identity(IdentityError::MissingToken)),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_status_change_error_mapping() {
        assert_eq!(
            get_status(StatusChangeError::NotFound.into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(
                StatusChangeError::InvalidTransition {
                    from: OrderStatus::Delivered,
                    to: OrderStatus::Pending,
                }
                .into()
            ),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_category_error_mapping() {
        assert_eq!(
            get_status(CategoryError::HasProducts(3).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(get_status(CategoryError::Cycle.into()), StatusCode::BAD_REQUEST);
        assert_eq!(
            get_status(CategoryError::NotFound.into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(capitalize("category has 3 products"), "Category has 3 products");
    }

    #[tokio::test]
    async fn test_conflict_message_reaches_client() {
        let response = AppError::Database(RepositoryError::Conflict(
            "Category has 3 products".to_string(),
        ))
        .into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Category has 3 products");
    }
}
