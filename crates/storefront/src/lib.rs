//! Storehouse storefront library.
//!
//! The customer-facing JSON API: catalog, cart, favorites, addresses,
//! checkout and order history, plus the identity-provider webhook that
//! provisions customers. The binary in `main.rs` only loads configuration,
//! installs tracing and serves [`app`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use std::time::Duration;

use axum::{
    Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::from_fn,
    response::Response,
    routing::get,
};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::middleware::{request_id_middleware, security_headers_middleware};
use crate::state::AppState;

/// Build the storefront router with its full middleware stack.
pub fn app(state: AppState) -> Router {
    let trace = TraceLayer::new_for_http()
        .make_span_with(|request: &Request| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                status = tracing::field::Empty,
                latency_ms = tracing::field::Empty,
                request_id = tracing::field::Empty,
                customer_id = tracing::field::Empty,
            )
        })
        .on_response(|response: &Response, latency: Duration, span: &Span| {
            span.record("status", response.status().as_u16());
            span.record(
                "latency_ms",
                u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
            );
            DefaultOnResponse::default().on_response(response, latency, span);
        });

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api", routes::api_routes())
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(trace)
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, header};
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;
    use storehouse_core::Money;
    use storehouse_core::identity::testing::{TEST_PUBLIC_KEY_PEM, claims_for, sign_untrusted};
    use tower::ServiceExt;

    use super::*;
    use crate::config::{IdentityConfig, ShippingConfig, StorefrontConfig};
    use crate::services::webhook::{
        ID_HEADER, SIGNATURE_HEADER, TIMESTAMP_HEADER, WebhookVerifier,
    };

    const WEBHOOK_SECRET: &str = "whsec_MfKQ9r8GKYqrTwjUPD8ILPZIo2LaLaSw";

    fn test_config() -> StorefrontConfig {
        StorefrontConfig {
            database_url: SecretString::from("postgres://unused@localhost/unused"),
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 3000,
            identity: IdentityConfig {
                jwt_public_key: TEST_PUBLIC_KEY_PEM.to_owned(),
                issuer: None,
                authorized_parties: Vec::new(),
                webhook_secret: SecretString::from(WEBHOOK_SECRET),
            },
            shipping: ShippingConfig {
                flat_rate: Money::from_cents(500),
                free_threshold: None,
            },
            catalog_cache_ttl: Duration::from_secs(60),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        }
    }

    // Requests below never reach the database, so the pool never connects
    fn test_app() -> Router {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://unused@localhost/unused")
            .unwrap();
        app(AppState::new(test_config(), pool).unwrap())
    }

    fn request(method: &str, uri: &str) -> axum::http::request::Builder {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", "203.0.113.9")
    }

    async fn error_message(response: axum::response::Response) -> String {
        let body = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        json["error"].as_str().unwrap().to_owned()
    }

    #[tokio::test]
    async fn test_health() {
        let response = test_app()
            .oneshot(request("GET", "/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(
            response.headers()[header::X_CONTENT_TYPE_OPTIONS],
            "nosniff"
        );
    }

    #[tokio::test]
    async fn test_cart_requires_token() {
        let response = test_app()
            .oneshot(request("GET", "/api/cart").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(error_message(response).await, "Authentication required");
    }

    #[tokio::test]
    async fn test_untrusted_token_rejected() {
        let token = sign_untrusted(&claims_for("user_mallory"));
        let response = test_app()
            .oneshot(
                request("GET", "/api/favorites")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_webhook_with_invalid_signature_is_bad_request() {
        let body = r#"{"type":"user.created","data":{"id":"user_1"}}"#;
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let response = test_app()
            .oneshot(
                request("POST", "/api/webhooks/identity")
                    .header(ID_HEADER, "msg_1")
                    .header(TIMESTAMP_HEADER, &timestamp)
                    .header(SIGNATURE_HEADER, "v1,aW52YWxpZCBzaWduYXR1cmU=")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_message(response).await, "Invalid webhook");
    }

    #[tokio::test]
    async fn test_webhook_signed_for_other_body_is_bad_request() {
        let verifier = WebhookVerifier::from_secret(WEBHOOK_SECRET).unwrap();
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = verifier
            .sign("msg_2", &timestamp, br#"{"type":"user.deleted","data":{"id":"user_1"}}"#)
            .unwrap();
        let response = test_app()
            .oneshot(
                request("POST", "/api/webhooks/identity")
                    .header(ID_HEADER, "msg_2")
                    .header(TIMESTAMP_HEADER, &timestamp)
                    .header(SIGNATURE_HEADER, signature)
                    .body(Body::from(r#"{"type":"user.deleted","data":{"id":"user_2"}}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_webhook_user_without_email_is_acknowledged() {
        let verifier = WebhookVerifier::from_secret(WEBHOOK_SECRET).unwrap();
        let timestamp = chrono::Utc::now().timestamp().to_string();
        for event in ["user.created", "user.updated"] {
            let body = format!(
                r#"{{"type":"{event}","data":{{"id":"user_3","email_addresses":[]}}}}"#
            );
            let signature = verifier
                .sign("msg_3", &timestamp, body.as_bytes())
                .unwrap();
            let response = test_app()
                .oneshot(
                    request("POST", "/api/webhooks/identity")
                        .header(ID_HEADER, "msg_3")
                        .header(TIMESTAMP_HEADER, &timestamp)
                        .header(SIGNATURE_HEADER, signature)
                        .body(Body::from(body))
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{event}");

            let body = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
            let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(json["data"]["action"], "ignored", "{event}");
        }
    }

    #[tokio::test]
    async fn test_webhook_missing_headers_is_bad_request() {
        let response = test_app()
            .oneshot(
                request("POST", "/api/webhooks/identity")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
