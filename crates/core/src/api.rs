//! JSON response envelope for single-resource and mutation endpoints.

use serde::{Deserialize, Serialize};

/// `{ "success": bool, "data": T | null, "error": string | null }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the request succeeded.
    pub success: bool,
    /// Payload on success.
    pub data: Option<T>,
    /// Human-readable message on failure.
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Successful response carrying `data`.
    #[must_use]
    pub const fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    /// Failed response with a message.
    #[must_use]
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_shape() {
        let json = serde_json::to_value(ApiResponse::ok(5)).unwrap();
        assert_eq!(json, serde_json::json!({"success": true, "data": 5, "error": null}));
    }

    #[test]
    fn test_err_shape() {
        let json = serde_json::to_value(ApiResponse::err("nope")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"success": false, "data": null, "error": "nope"})
        );
    }
}
