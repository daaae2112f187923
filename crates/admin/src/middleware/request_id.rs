//! Request ID middleware.
//!
//! Reuses a well-formed `x-request-id` from the dashboard front-end or proxy,
//! otherwise generates a UUID v4. The ID lands on the tracing span, the
//! Sentry scope and the response.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Span;
use uuid::Uuid;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

fn upstream_id(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .filter(|id| {
            (1..=128).contains(&id.len())
                && id
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b':'))
        })
}

/// Middleware that ensures every request has a request ID.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id =
        upstream_id(&request).map_or_else(|| Uuid::new_v4().to_string(), str::to_owned);

    Span::current().record("request_id", &request_id);
    sentry::configure_scope(|scope| scope.set_tag("request_id", &request_id));

    let Ok(value) = HeaderValue::from_str(&request_id) else {
        return next.run(request).await;
    };
    request.headers_mut().insert(REQUEST_ID_HEADER, value.clone());

    let mut response = next.run(request).await;
    response.headers_mut().insert(REQUEST_ID_HEADER, value);
    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request_with(id: &str) -> Request {
        Request::builder()
            .header(REQUEST_ID_HEADER, id)
            .body(axum::body::Body::empty())
            .unwrap()
    }

    #[test]
    fn test_upstream_id_kept_when_sane() {
        let request = request_with("dash-4f1c2b");
        assert_eq!(upstream_id(&request), Some("dash-4f1c2b"));
    }

    #[test]
    fn test_upstream_id_rejected() {
        assert_eq!(upstream_id(&request_with("two words")), None);
        assert_eq!(upstream_id(&request_with(&"a".repeat(129))), None);
    }
}
