//! Authentication extractors.
//!
//! Customers sign in with the identity provider. Each request carries the
//! provider's session token, either as a bearer token or in the `__session`
//! cookie; [`RequireCustomer`] verifies it and loads the local customer row.

use axum::{
    extract::FromRequestParts,
    http::{
        HeaderMap,
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
    },
};
use tracing::Span;

use storehouse_core::identity::{
    IdentityError, SessionClaims, SessionVerifier, extract_session_token,
};

use crate::db::CustomerRepository;
use crate::error::{AppError, set_sentry_user};
use crate::models::Customer;
use crate::state::AppState;

/// Extractor that requires an authenticated customer.
///
/// - no token, or a token that fails verification: 401
/// - valid token but no local customer row yet: 404
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireCustomer(customer): RequireCustomer,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", customer.display_name())
/// }
/// ```
pub struct RequireCustomer(pub Customer);

impl FromRequestParts<AppState> for RequireCustomer {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let claims = verify_session(&parts.headers, state.sessions())?;

        let customer = CustomerRepository::new(state.pool())
            .get_by_external_id(&claims.sub)
            .await?
            .ok_or_else(|| AppError::NotFound("Customer not found".to_string()))?;

        Span::current().record("customer_id", customer.id.as_i32());
        set_sentry_user(&customer.id, Some(customer.email.as_str()));

        Ok(Self(customer))
    }
}

/// Verify the session token carried by a request.
///
/// # Errors
///
/// Returns `IdentityError::MissingToken` if there is no token, otherwise the
/// verifier's error.
pub fn verify_session(
    headers: &HeaderMap,
    verifier: &SessionVerifier,
) -> Result<SessionClaims, IdentityError> {
    let authorization = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());

    // HTTP/2 clients may split cookies across several headers
    let cookies = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect::<Vec<_>>()
        .join("; ");
    let cookie = (!cookies.is_empty()).then_some(cookies.as_str());

    let token = extract_session_token(authorization, cookie).ok_or(IdentityError::MissingToken)?;
    verifier.verify(token)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;
    use storehouse_core::identity::testing::{TEST_PUBLIC_KEY_PEM, claims_for, sign};

    use super::*;

    fn verifier() -> SessionVerifier {
        SessionVerifier::from_pem(TEST_PUBLIC_KEY_PEM.as_bytes(), None, Vec::new()).unwrap()
    }

    #[test]
    fn test_missing_token() {
        assert!(matches!(
            verify_session(&HeaderMap::new(), &verifier()),
            Err(IdentityError::MissingToken)
        ));
    }

    #[test]
    fn test_bearer_token() {
        let token = sign(&claims_for("user_bearer"));
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        assert_eq!(verify_session(&headers, &verifier()).unwrap().sub, "user_bearer");
    }

    #[test]
    fn test_session_cookie_across_split_headers() {
        let token = sign(&claims_for("user_cookie"));
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("theme=dark"));
        headers.append(
            COOKIE,
            HeaderValue::from_str(&format!("__session={token}")).unwrap(),
        );
        assert_eq!(verify_session(&headers, &verifier()).unwrap().sub, "user_cookie");
    }

    #[test]
    fn test_garbage_token() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer not.a.jwt"));
        assert!(matches!(
            verify_session(&headers, &verifier()),
            Err(IdentityError::Invalid(_))
        ));
    }
}
