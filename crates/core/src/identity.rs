//! Identity-provider session tokens.
//!
//! Sign-in, sign-up and session management are handled entirely by the
//! external identity provider. The browser forwards the provider's short-lived
//! session token (an RS256 JWT) either as `Authorization: Bearer <token>` or
//! in the `__session` cookie; both binaries verify it offline against the
//! provider's PEM public key and use `sub` to find the local customer row.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Cookie the identity provider's front-end SDK writes the session token to.
pub const SESSION_COOKIE_NAME: &str = "__session";

/// Clock skew tolerated on `exp` / `nbf`, in seconds.
const LEEWAY_SECS: u64 = 60;

/// Errors verifying a session token.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The configured public key could not be parsed.
    #[error("invalid identity public key: {0}")]
    InvalidKey(String),
    /// No token on the request.
    #[error("missing session token")]
    MissingToken,
    /// Token is past its expiry.
    #[error("session token expired")]
    Expired,
    /// Token was issued for a front-end origin we do not serve.
    #[error("session token issued for unauthorized party")]
    UnauthorizedParty,
    /// Signature, issuer, or structure is invalid.
    #[error("invalid session token: {0}")]
    Invalid(String),
}

/// Claims carried by a provider session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Provider user ID; matches `customer.external_id`.
    pub sub: String,
    /// Expiry (seconds since epoch).
    pub exp: i64,
    /// Not-before (seconds since epoch).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    /// Issued-at (seconds since epoch).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Issuer (the provider's frontend API URL).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// Authorized party: origin of the front-end that requested the token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azp: Option<String>,
    /// Provider session ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    /// Primary email, present when the provider's token template adds it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Verifies provider session tokens.
#[derive(Clone)]
pub struct SessionVerifier {
    key: DecodingKey,
    validation: Validation,
    authorized_parties: Vec<String>,
}

impl std::fmt::Debug for SessionVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionVerifier")
            .field("issuer", &self.validation.iss)
            .field("authorized_parties", &self.authorized_parties)
            .finish_non_exhaustive()
    }
}

impl SessionVerifier {
    /// Build a verifier from the provider's PEM-encoded RSA public key.
    ///
    /// `issuer`, when set, must match the token's `iss`. When
    /// `authorized_parties` is non-empty, tokens carrying an `azp` claim must
    /// name one of them.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::InvalidKey`] if the PEM cannot be parsed.
    pub fn from_pem(
        pem: &[u8],
        issuer: Option<&str>,
        authorized_parties: Vec<String>,
    ) -> Result<Self, IdentityError> {
        let key =
            DecodingKey::from_rsa_pem(pem).map_err(|e| IdentityError::InvalidKey(e.to_string()))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = LEEWAY_SECS;
        validation.validate_nbf = true;
        validation.validate_aud = false;
        if let Some(iss) = issuer {
            validation.set_issuer(&[iss]);
        }

        Ok(Self {
            key,
            validation,
            authorized_parties,
        })
    }

    /// Verify a token and return its claims.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError`] if the token is expired, not yet valid,
    /// signed by another key, issued by another issuer, or issued for an
    /// unauthorized party.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, IdentityError> {
        let data = jsonwebtoken::decode::<SessionClaims>(token, &self.key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => IdentityError::Expired,
                _ => IdentityError::Invalid(e.to_string()),
            })?;

        let claims = data.claims;
        if let Some(azp) = claims.azp.as_deref()
            && !self.authorized_parties.is_empty()
            && !self.authorized_parties.iter().any(|p| p == azp)
        {
            return Err(IdentityError::UnauthorizedParty);
        }

        if claims.sub.is_empty() {
            return Err(IdentityError::Invalid("empty subject".to_owned()));
        }

        Ok(claims)
    }
}

/// Pull the session token from request headers.
///
/// A bearer `Authorization` header wins over the `__session` cookie.
#[must_use]
pub fn extract_session_token<'a>(
    authorization: Option<&'a str>,
    cookie: Option<&'a str>,
) -> Option<&'a str> {
    if let Some(token) = authorization
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        return Some(token);
    }

    cookie?
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE_NAME)
        .map(|(_, value)| value.trim())
        .filter(|t| !t.is_empty())
}

/// Token signing for tests in this and downstream crates.
#[cfg(any(test, feature = "test-support"))]
#[allow(clippy::expect_used, clippy::missing_panics_doc)]
pub mod testing {
    use jsonwebtoken::{EncodingKey, Header};

    use super::{Algorithm, SessionClaims};

    /// Public half of the test signing key.
    pub const TEST_PUBLIC_KEY_PEM: &str =
        include_str!("../tests/fixtures/identity_test_key.pub.pem");

    const TEST_PRIVATE_KEY_PEM: &str = include_str!("../tests/fixtures/identity_test_key.pem");
    const UNTRUSTED_PRIVATE_KEY_PEM: &str =
        include_str!("../tests/fixtures/identity_other_key.pem");

    /// Claims for `sub`, valid for the next hour.
    #[must_use]
    pub fn claims_for(sub: &str) -> SessionClaims {
        let now = chrono::Utc::now().timestamp();
        SessionClaims {
            sub: sub.to_owned(),
            exp: now + 3600,
            nbf: Some(now - 5),
            iat: Some(now - 5),
            iss: None,
            azp: None,
            sid: Some("sess_test".to_owned()),
            email: None,
        }
    }

    /// Sign claims with the test key.
    #[must_use]
    pub fn sign(claims: &SessionClaims) -> String {
        sign_with(claims, TEST_PRIVATE_KEY_PEM)
    }

    /// Sign claims with a key the verifier does not trust.
    #[must_use]
    pub fn sign_untrusted(claims: &SessionClaims) -> String {
        sign_with(claims, UNTRUSTED_PRIVATE_KEY_PEM)
    }

    fn sign_with(claims: &SessionClaims, pem: &str) -> String {
        let key = EncodingKey::from_rsa_pem(pem.as_bytes()).expect("test key is valid PEM");
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), claims, &key)
            .expect("test claims serialize")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::testing::{TEST_PUBLIC_KEY_PEM, claims_for, sign, sign_untrusted};
    use super::*;

    fn verifier() -> SessionVerifier {
        SessionVerifier::from_pem(TEST_PUBLIC_KEY_PEM.as_bytes(), None, Vec::new()).unwrap()
    }

    #[test]
    fn test_verify_valid_token() {
        let token = sign(&claims_for("user_2abc"));
        let claims = verifier().verify(&token).unwrap();
        assert_eq!(claims.sub, "user_2abc");
    }

    #[test]
    fn test_reject_untrusted_signature() {
        let token = sign_untrusted(&claims_for("user_2abc"));
        assert!(matches!(
            verifier().verify(&token),
            Err(IdentityError::Invalid(_))
        ));
    }

    #[test]
    fn test_reject_expired() {
        let mut claims = claims_for("user_2abc");
        claims.exp = chrono::Utc::now().timestamp() - 3600;
        let token = sign(&claims);
        assert!(matches!(verifier().verify(&token), Err(IdentityError::Expired)));
    }

    #[test]
    fn test_reject_not_yet_valid() {
        let mut claims = claims_for("user_2abc");
        claims.nbf = Some(chrono::Utc::now().timestamp() + 3600);
        let token = sign(&claims);
        assert!(verifier().verify(&token).is_err());
    }

    #[test]
    fn test_issuer_checked_when_configured() {
        let v = SessionVerifier::from_pem(
            TEST_PUBLIC_KEY_PEM.as_bytes(),
            Some("https://clerk.shop.example"),
            Vec::new(),
        )
        .unwrap();

        let mut claims = claims_for("user_1");
        claims.iss = Some("https://evil.example".to_owned());
        assert!(v.verify(&sign(&claims)).is_err());

        claims.iss = Some("https://clerk.shop.example".to_owned());
        assert!(v.verify(&sign(&claims)).is_ok());
    }

    #[test]
    fn test_authorized_parties() {
        let v = SessionVerifier::from_pem(
            TEST_PUBLIC_KEY_PEM.as_bytes(),
            None,
            vec!["https://shop.example".to_owned()],
        )
        .unwrap();

        let mut claims = claims_for("user_1");
        claims.azp = Some("https://phish.example".to_owned());
        assert!(matches!(
            v.verify(&sign(&claims)),
            Err(IdentityError::UnauthorizedParty)
        ));

        claims.azp = Some("https://shop.example".to_owned());
        assert!(v.verify(&sign(&claims)).is_ok());
    }

    #[test]
    fn test_invalid_pem() {
        assert!(matches!(
            SessionVerifier::from_pem(b"not a key", None, Vec::new()),
            Err(IdentityError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_extract_bearer_preferred() {
        assert_eq!(
            extract_session_token(Some("Bearer abc"), Some("__session=xyz")),
            Some("abc")
        );
    }

    #[test]
    fn test_extract_from_cookie() {
        assert_eq!(
            extract_session_token(None, Some("theme=dark; __session=xyz; other=1")),
            Some("xyz")
        );
        assert_eq!(extract_session_token(Some("Basic Zm9v"), Some("a=b")), None);
        assert_eq!(extract_session_token(None, Some("__session=")), None);
        assert_eq!(extract_session_token(None, None), None);
    }
}
