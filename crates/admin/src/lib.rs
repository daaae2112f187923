//! Storehouse admin library.
//!
//! The internal management API: users, coupons, orders, categories and a
//! dashboard summary. Callers authenticate with the identity provider like
//! customers do; only accounts holding the `admin` role get past
//! [`middleware::RequireAdmin`].
//!
//! # Security
//!
//! Binds to 127.0.0.1 by default. Put it behind a private network or enable
//! TLS with `ADMIN_TLS_CERT` / `ADMIN_TLS_KEY`.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;

use std::time::Duration;

use axum::{
    Router,
    extract::{Request, State},
    http::{HeaderName, HeaderValue, Method, StatusCode, header},
    middleware::from_fn,
    response::Response,
    routing::get,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::middleware::request_id::REQUEST_ID_HEADER;
use crate::middleware::request_id_middleware;
use crate::state::AppState;

/// CORS policy for the dashboard front-end at `origin`.
fn cors_layer(origin: HeaderValue) -> CorsLayer {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);
    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, request_id.clone()])
        .expose_headers([request_id])
        .allow_credentials(true)
        .max_age(Duration::from_secs(600))
}

/// Build the admin router with its full middleware stack.
pub fn app(state: AppState) -> Router {
    let cors_origin = state.config().cors_origin.clone();

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

    let router = Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api", routes::api_routes())
        .layer(from_fn(request_id_middleware))
        .layer(trace);

    // No CORS headers at all unless a dashboard origin is configured
    let router = match cors_origin {
        Some(origin) => router.layer(cors_layer(origin)),
        None => router,
    };

    router
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
/// Verifies database connectivity before returning OK.
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
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;
    use storehouse_core::identity::testing::{TEST_PUBLIC_KEY_PEM, claims_for, sign_untrusted};
    use tower::ServiceExt;

    use super::*;
    use crate::config::{AdminConfig, IdentityConfig};

    const DASHBOARD_ORIGIN: &str = "https://admin.shop.example";

    fn test_config(cors_origin: Option<&'static str>) -> AdminConfig {
        AdminConfig {
            database_url: SecretString::from("postgres://unused@localhost/unused"),
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 3001,
            identity: IdentityConfig {
                jwt_public_key: TEST_PUBLIC_KEY_PEM.to_owned(),
                issuer: None,
                authorized_parties: Vec::new(),
            },
            cors_origin: cors_origin.map(HeaderValue::from_static),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
            tls: None,
        }
    }

    // Requests below never reach the database, so the pool never connects
    fn test_app(cors_origin: Option<&'static str>) -> Router {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://unused@localhost/unused")
            .unwrap();
        app(AppState::new(test_config(cors_origin), pool).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let response = test_app(None)
            .oneshot(axum::http::Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn test_api_requires_token() {
        for uri in ["/api/dashboard", "/api/users", "/api/coupons", "/api/orders/1"] {
            let response = test_app(None)
                .oneshot(axum::http::Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");

            let body = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
            let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(json["error"], "Authentication required");
        }
    }

    #[tokio::test]
    async fn test_untrusted_token_rejected() {
        let token = sign_untrusted(&claims_for("user_staff"));
        let response = test_app(None)
            .oneshot(
                axum::http::Request::builder()
                    .uri("/api/categories")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_cors_preflight_for_configured_origin() {
        let response = test_app(Some(DASHBOARD_ORIGIN))
            .oneshot(
                axum::http::Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/coupons")
                    .header(header::ORIGIN, DASHBOARD_ORIGIN)
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            DASHBOARD_ORIGIN
        );
    }

    #[tokio::test]
    async fn test_no_cors_headers_without_origin() {
        let response = test_app(None)
            .oneshot(
                axum::http::Request::builder()
                    .uri("/health")
                    .header(header::ORIGIN, "https://evil.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(
            !response
                .headers()
                .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        );
    }
}
