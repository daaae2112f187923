//! Identity-provider webhook verification and event parsing.
//!
//! The provider signs each delivery with HMAC-SHA256 using a per-endpoint
//! secret (`whsec_<base64 key>`). Three headers accompany the body:
//!
//! - `svix-id` - unique message ID
//! - `svix-timestamp` - seconds since the epoch
//! - `svix-signature` - space-separated `v1,<base64 signature>` entries
//!
//! The signed content is `{id}.{timestamp}.{body}`. Deliveries older or newer
//! than [`TIMESTAMP_TOLERANCE_SECS`] are rejected to stop replays.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretSlice};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;

use storehouse_core::Email;

use crate::config::WEBHOOK_SECRET_PREFIX;
use crate::db::customers::CustomerProfile;

/// Header carrying the message ID.
pub const ID_HEADER: &str = "svix-id";
/// Header carrying the send timestamp.
pub const TIMESTAMP_HEADER: &str = "svix-timestamp";
/// Header carrying the signature list.
pub const SIGNATURE_HEADER: &str = "svix-signature";

/// Maximum clock difference accepted between sender and receiver.
pub const TIMESTAMP_TOLERANCE_SECS: i64 = 300;

type HmacSha256 = Hmac<Sha256>;

/// Errors verifying or parsing a webhook delivery.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// A required signature header is absent.
    #[error("missing header: {0}")]
    MissingHeader(&'static str),

    /// The timestamp header is not an integer.
    #[error("invalid timestamp")]
    InvalidTimestamp,

    /// The timestamp is outside the tolerance window.
    #[error("timestamp outside tolerance")]
    TimestampOutOfTolerance,

    /// No signature in the header matches.
    #[error("signature mismatch")]
    InvalidSignature,

    /// The configured secret is malformed.
    #[error("invalid webhook secret: {0}")]
    InvalidSecret(String),

    /// The body is not a recognizable event.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

/// Signature headers of a delivery.
#[derive(Debug, Clone, Copy)]
pub struct SignatureHeaders<'a> {
    pub id: &'a str,
    pub timestamp: &'a str,
    pub signature: &'a str,
}

/// Verifies webhook signatures.
pub struct WebhookVerifier {
    key: SecretSlice<u8>,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl WebhookVerifier {
    /// Build a verifier from a `whsec_`-prefixed secret.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::InvalidSecret`] if the prefix is missing or the
    /// key is not valid base64.
    pub fn from_secret(secret: &str) -> Result<Self, WebhookError> {
        let encoded = secret
            .strip_prefix(WEBHOOK_SECRET_PREFIX)
            .ok_or_else(|| WebhookError::InvalidSecret("missing whsec_ prefix".to_owned()))?;
        let key = BASE64
            .decode(encoded)
            .map_err(|e| WebhookError::InvalidSecret(e.to_string()))?;
        if key.is_empty() {
            return Err(WebhookError::InvalidSecret("empty key".to_owned()));
        }
        Ok(Self {
            key: SecretSlice::from(key),
        })
    }

    fn mac(&self, id: &str, timestamp: &str, body: &[u8]) -> Result<HmacSha256, WebhookError> {
        let mut mac = HmacSha256::new_from_slice(self.key.expose_secret())
            .map_err(|e| WebhookError::InvalidSecret(e.to_string()))?;
        mac.update(id.as_bytes());
        mac.update(b".");
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(body);
        Ok(mac)
    }

    /// Verify a delivery against the current time.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError`] if the timestamp is stale or no signature matches.
    pub fn verify(&self, headers: SignatureHeaders<'_>, body: &[u8]) -> Result<(), WebhookError> {
        self.verify_at(headers, body, chrono::Utc::now().timestamp())
    }

    /// Verify a delivery as of `now` (seconds since the epoch).
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError`] if the timestamp is stale or no signature matches.
    pub fn verify_at(
        &self,
        headers: SignatureHeaders<'_>,
        body: &[u8],
        now: i64,
    ) -> Result<(), WebhookError> {
        let ts: i64 = headers
            .timestamp
            .trim()
            .parse()
            .map_err(|_| WebhookError::InvalidTimestamp)?;

        if now.abs_diff(ts) > TIMESTAMP_TOLERANCE_SECS.unsigned_abs() {
            return Err(WebhookError::TimestampOutOfTolerance);
        }

        let mac = self.mac(headers.id, headers.timestamp, body)?;

        // Each entry is `<version>,<base64>`; only v1 is defined
        let matched = headers
            .signature
            .split_whitespace()
            .filter_map(|entry| entry.split_once(','))
            .filter(|(version, _)| *version == "v1")
            .filter_map(|(_, sig)| BASE64.decode(sig).ok())
            .any(|candidate| mac.clone().verify_slice(&candidate).is_ok());

        if !matched {
            return Err(WebhookError::InvalidSignature);
        }

        debug!(message_id = headers.id, "Webhook signature verified");
        Ok(())
    }

    /// Produce the `v1,<base64>` signature for a delivery.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::InvalidSecret`] if the key cannot seed the MAC.
    pub fn sign(&self, id: &str, timestamp: &str, body: &[u8]) -> Result<String, WebhookError> {
        let tag = self.mac(id, timestamp, body)?.finalize().into_bytes();
        Ok(format!("v1,{}", BASE64.encode(tag)))
    }
}

// =============================================================================
// Events
// =============================================================================

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    event_type: String,
    data: serde_json::Value,
}

/// An email entry on a provider user.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailAddress {
    pub id: String,
    pub email_address: String,
}

/// User object carried by `user.created` and `user.updated`.
#[derive(Debug, Clone, Deserialize)]
pub struct UserData {
    pub id: String,
    #[serde(default)]
    pub email_addresses: Vec<EmailAddress>,
    #[serde(default)]
    pub primary_email_address_id: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl UserData {
    /// Map the provider user to local profile fields.
    ///
    /// Uses the primary email, falling back to the first listed.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::InvalidPayload`] if the user has no valid email.
    pub fn profile(&self) -> Result<CustomerProfile, WebhookError> {
        let address = self
            .primary_email_address_id
            .as_deref()
            .and_then(|primary| self.email_addresses.iter().find(|e| e.id == primary))
            .or_else(|| self.email_addresses.first())
            .ok_or_else(|| WebhookError::InvalidPayload("user has no email address".to_owned()))?;

        let email = Email::parse(&address.email_address)
            .map_err(|e| WebhookError::InvalidPayload(format!("invalid email: {e}")))?;

        Ok(CustomerProfile {
            external_id: self.id.clone(),
            email,
            first_name: non_blank(self.first_name.as_deref()),
            last_name: non_blank(self.last_name.as_deref()),
            image_url: non_blank(self.image_url.as_deref()),
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

#[derive(Debug, Deserialize)]
struct DeletedData {
    id: Option<String>,
}

/// A parsed identity-provider event.
#[derive(Debug, Clone)]
pub enum IdentityEvent {
    UserCreated(UserData),
    UserUpdated(UserData),
    UserDeleted { id: String },
    /// An event type this service does not handle.
    Other(String),
}

impl IdentityEvent {
    /// Parse a verified webhook body.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::InvalidPayload`] if the body is not an event
    /// or a handled event is missing required fields.
    pub fn parse(body: &[u8]) -> Result<Self, WebhookError> {
        let envelope: Envelope =
            serde_json::from_slice(body).map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;

        let user = |data: serde_json::Value| {
            serde_json::from_value::<UserData>(data)
                .map_err(|e| WebhookError::InvalidPayload(e.to_string()))
        };

        match envelope.event_type.as_str() {
            "user.created" => Ok(Self::UserCreated(user(envelope.data)?)),
            "user.updated" => Ok(Self::UserUpdated(user(envelope.data)?)),
            "user.deleted" => {
                let data: DeletedData = serde_json::from_value(envelope.data)
                    .map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;
                let id = data
                    .id
                    .filter(|id| !id.is_empty())
                    .ok_or_else(|| WebhookError::InvalidPayload("deleted user has no id".to_owned()))?;
                Ok(Self::UserDeleted { id })
            }
            _ => Ok(Self::Other(envelope.event_type)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_MfKQ9r8GKYqrTwjUPD8ILPZIo2LaLaSw";
    const NOW: i64 = 1_760_000_000;

    fn verifier() -> WebhookVerifier {
        WebhookVerifier::from_secret(SECRET).unwrap()
    }

    fn headers<'a>(timestamp: &'a str, signature: &'a str) -> SignatureHeaders<'a> {
        SignatureHeaders {
            id: "msg_2abc",
            timestamp,
            signature,
        }
    }

    #[test]
    fn test_valid_signature() {
        let v = verifier();
        let ts = NOW.to_string();
        let body = br#"{"type":"user.created","data":{}}"#;
        let sig = v.sign("msg_2abc", &ts, body).unwrap();
        assert!(v.verify_at(headers(&ts, &sig), body, NOW).is_ok());
    }

    #[test]
    fn test_any_listed_signature_may_match() {
        let v = verifier();
        let ts = NOW.to_string();
        let body = b"{}";
        let sig = v.sign("msg_2abc", &ts, body).unwrap();
        let list = format!("v1,AAAA v2,ignored {sig}");
        assert!(v.verify_at(headers(&ts, &list), body, NOW).is_ok());
    }

    #[test]
    fn test_tampered_body_rejected() {
        let v = verifier();
        let ts = NOW.to_string();
        let sig = v.sign("msg_2abc", &ts, b"original").unwrap();
        assert!(matches!(
            v.verify_at(headers(&ts, &sig), b"tampered", NOW),
            Err(WebhookError::InvalidSignature)
        ));
    }

    #[test]
    fn test_signature_from_other_secret_rejected() {
        let other = WebhookVerifier::from_secret("whsec_dGhpcyBpcyBhbm90aGVyIGtleQ==").unwrap();
        let ts = NOW.to_string();
        let sig = other.sign("msg_2abc", &ts, b"{}").unwrap();
        assert!(matches!(
            verifier().verify_at(headers(&ts, &sig), b"{}", NOW),
            Err(WebhookError::InvalidSignature)
        ));
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let v = verifier();
        let ts = (NOW - 600).to_string();
        let sig = v.sign("msg_2abc", &ts, b"{}").unwrap();
        assert!(matches!(
            v.verify_at(headers(&ts, &sig), b"{}", NOW),
            Err(WebhookError::TimestampOutOfTolerance)
        ));
    }

    #[test]
    fn test_extreme_timestamps_rejected() {
        let v = verifier();
        for ts in ["-9223372036854775808", "9223372036854775807"] {
            let sig = v.sign("msg_2abc", ts, b"{}").unwrap();
            assert!(
                matches!(
                    v.verify_at(headers(ts, &sig), b"{}", NOW),
                    Err(WebhookError::TimestampOutOfTolerance)
                ),
                "{ts}"
            );
        }
    }

    #[test]
    fn test_malformed_headers_rejected() {
        let v = verifier();
        assert!(matches!(
            v.verify_at(headers("yesterday", "v1,abc"), b"{}", NOW),
            Err(WebhookError::InvalidTimestamp)
        ));
        let ts = NOW.to_string();
        assert!(matches!(
            v.verify_at(headers(&ts, "garbage"), b"{}", NOW),
            Err(WebhookError::InvalidSignature)
        ));
    }

    #[test]
    fn test_secret_requires_prefix() {
        assert!(WebhookVerifier::from_secret("MfKQ9r8GKYqrTwjUPD8ILPZIo2LaLaSw").is_err());
        assert!(WebhookVerifier::from_secret("whsec_!!!").is_err());
    }

    #[test]
    fn test_parse_user_created_uses_primary_email() {
        let body = serde_json::json!({
            "type": "user.created",
            "object": "event",
            "data": {
                "id": "user_29w83sxmDNGwOuEthce5gg56FcC",
                "email_addresses": [
                    {"id": "idn_a", "email_address": "old@example.com"},
                    {"id": "idn_b", "email_address": "Primary@Example.com"}
                ],
                "primary_email_address_id": "idn_b",
                "first_name": "Ada",
                "last_name": "",
                "image_url": null
            }
        });
        let event = IdentityEvent::parse(body.to_string().as_bytes()).unwrap();
        let IdentityEvent::UserCreated(user) = event else {
            panic!("expected user.created");
        };
        let profile = user.profile().unwrap();
        assert_eq!(profile.external_id, "user_29w83sxmDNGwOuEthce5gg56FcC");
        assert_eq!(profile.email.as_str(), "primary@example.com");
        assert_eq!(profile.first_name.as_deref(), Some("Ada"));
        assert_eq!(profile.last_name, None);
    }

    #[test]
    fn test_parse_user_without_email_fails_profile() {
        let body = br#"{"type":"user.created","data":{"id":"user_1","email_addresses":[]}}"#;
        let IdentityEvent::UserCreated(user) = IdentityEvent::parse(body).unwrap() else {
            panic!("expected user.created");
        };
        assert!(matches!(user.profile(), Err(WebhookError::InvalidPayload(_))));
    }

    #[test]
    fn test_parse_user_deleted() {
        let body = br#"{"type":"user.deleted","data":{"id":"user_1","deleted":true,"object":"user"}}"#;
        assert!(matches!(
            IdentityEvent::parse(body).unwrap(),
            IdentityEvent::UserDeleted { id } if id == "user_1"
        ));
    }

    #[test]
    fn test_parse_other_event() {
        let body = br#"{"type":"session.created","data":{"id":"sess_1"}}"#;
        assert!(matches!(
            IdentityEvent::parse(body).unwrap(),
            IdentityEvent::Other(t) if t == "session.created"
        ));
    }

    #[test]
    fn test_parse_rejects_non_event() {
        assert!(IdentityEvent::parse(b"not json").is_err());
    }
}
