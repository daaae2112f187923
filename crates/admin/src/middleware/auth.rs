//! Admin authorization.
//!
//! Staff sign in with the same identity provider as customers. A session
//! token only proves who the caller is; admin rights come from the `admin`
//! role on the local customer row, which is granted with
//! `storehouse admin grant --email`.

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

use crate::db::UserRepository;
use crate::error::{AppError, set_sentry_user};
use crate::models::Customer;
use crate::state::AppState;

/// Extractor that requires a signed-in admin.
///
/// - no token, or a token that fails verification: 401
/// - verified, but no local account or not an admin: 403
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAdmin(admin): RequireAdmin) -> impl IntoResponse {
///     format!("Hello, {}!", admin.email)
/// }
/// ```
pub struct RequireAdmin(pub Customer);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let claims = verify_session(&parts.headers, state.sessions())?;

        let customer = UserRepository::new(state.pool())
            .get_by_external_id(&claims.sub)
            .await?
            .filter(Customer::is_admin)
            .ok_or_else(|| {
                tracing::warn!(subject = %claims.sub, "Non-admin attempted admin access");
                AppError::Forbidden("Admin access required".to_string())
            })?;

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
    let cookies = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect::<Vec<_>>()
        .join("; ");

    extract_session_token(authorization, (!cookies.is_empty()).then_some(cookies.as_str()))
        .ok_or(IdentityError::MissingToken)
        .and_then(|token| verifier.verify(token))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;
    use storehouse_core::identity::testing::{
        TEST_PUBLIC_KEY_PEM, claims_for, sign, sign_untrusted,
    };

    use super::*;

    fn verifier() -> SessionVerifier {
        SessionVerifier::from_pem(TEST_PUBLIC_KEY_PEM.as_bytes(), None, Vec::new()).unwrap()
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn test_valid_token() {
        let headers = bearer(&sign(&claims_for("user_staff")));
        assert_eq!(verify_session(&headers, &verifier()).unwrap().sub, "user_staff");
    }

    #[test]
    fn test_token_from_other_key_rejected() {
        let headers = bearer(&sign_untrusted(&claims_for("user_staff")));
        assert!(verify_session(&headers, &verifier()).is_err());
    }

    #[test]
    fn test_missing_token() {
        assert!(matches!(
            verify_session(&HeaderMap::new(), &verifier()),
            Err(IdentityError::MissingToken)
        ));
    }
}
