//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `IDENTITY_JWT_PUBLIC_KEY` - PEM public key used to verify session tokens
//! - `IDENTITY_WEBHOOK_SECRET` - `whsec_`-prefixed webhook signing secret
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `IDENTITY_ISSUER` - Expected `iss` claim
//! - `IDENTITY_AUTHORIZED_PARTIES` - Comma-separated allowed `azp` origins
//! - `SHIPPING_FLAT_RATE` - Shipping charged per order (default: 5.00)
//! - `FREE_SHIPPING_THRESHOLD` - Subtotal at which shipping becomes free
//! - `CATALOG_CACHE_TTL_SECS` - Category list cache lifetime (default: 60)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.1)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use storehouse_core::Money;
use thiserror::Error;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Prefix the identity provider puts on webhook signing secrets.
pub const WEBHOOK_SECRET_PREFIX: &str = "whsec_";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "put-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Identity provider settings
    pub identity: IdentityConfig,
    /// Shipping pricing
    pub shipping: ShippingConfig,
    /// Category list cache lifetime
    pub catalog_cache_ttl: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Fraction of errors sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions traced
    pub sentry_traces_sample_rate: f32,
}

/// Identity provider configuration.
///
/// Implements `Debug` manually to redact the webhook secret.
#[derive(Clone)]
pub struct IdentityConfig {
    /// PEM-encoded RSA public key for session tokens
    pub jwt_public_key: String,
    /// Expected token issuer
    pub issuer: Option<String>,
    /// Allowed `azp` origins (empty = any)
    pub authorized_parties: Vec<String>,
    /// Webhook signing secret (`whsec_...`)
    pub webhook_secret: SecretString,
}

impl std::fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("jwt_public_key", &"[PEM]")
            .field("issuer", &self.issuer)
            .field("authorized_parties", &self.authorized_parties)
            .field("webhook_secret", &"[REDACTED]")
            .finish()
    }
}

/// Shipping pricing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShippingConfig {
    /// Charged on every order below the threshold
    pub flat_rate: Money,
    /// Subtotal from which shipping is free
    pub free_threshold: Option<Money>,
}

impl ShippingConfig {
    /// Shipping charged for a cart with the given subtotal.
    ///
    /// An empty cart ships nothing and costs nothing.
    #[must_use]
    pub fn cost_for(&self, subtotal: Money) -> Money {
        if subtotal.is_zero() {
            return Money::ZERO;
        }
        match self.free_threshold {
            Some(threshold) if subtotal >= threshold => Money::ZERO,
            _ => self.flat_rate,
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host = parse_env("STOREFRONT_HOST", "127.0.0.1")?;
        let port = parse_env("STOREFRONT_PORT", "3000")?;

        let identity = IdentityConfig::from_env()?;
        let shipping = ShippingConfig::from_env()?;
        let cache_secs: u64 = parse_env("CATALOG_CACHE_TTL_SECS", "60")?;

        Ok(Self {
            database_url,
            host,
            port,
            identity,
            shipping,
            catalog_cache_ttl: Duration::from_secs(cache_secs),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env("SENTRY_TRACES_SAMPLE_RATE", "0.1")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl IdentityConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let webhook_secret = get_required_env("IDENTITY_WEBHOOK_SECRET")?;
        validate_webhook_secret(&webhook_secret, "IDENTITY_WEBHOOK_SECRET")?;

        Ok(Self {
            jwt_public_key: get_required_env("IDENTITY_JWT_PUBLIC_KEY")?.replace("\\n", "\n"),
            issuer: get_optional_env("IDENTITY_ISSUER"),
            authorized_parties: split_list(
                &get_optional_env("IDENTITY_AUTHORIZED_PARTIES").unwrap_or_default(),
            ),
            webhook_secret: SecretString::from(webhook_secret),
        })
    }

    /// Webhook secret exposed for building the verifier.
    #[must_use]
    pub fn webhook_secret(&self) -> &str {
        self.webhook_secret.expose_secret()
    }
}

impl ShippingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let flat_rate = parse_money("SHIPPING_FLAT_RATE", Some("5.00"))?
            .ok_or_else(|| ConfigError::MissingEnvVar("SHIPPING_FLAT_RATE".to_owned()))?;
        let free_threshold = parse_money("FREE_SHIPPING_THRESHOLD", None)?;
        Ok(Self {
            flat_rate,
            free_threshold,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    std::env::var(primary_key)
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable (empty counts as unset).
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse an environment variable, using `default` when unset.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse a non-negative decimal amount.
fn parse_money(key: &str, default: Option<&str>) -> Result<Option<Money>, ConfigError> {
    let Some(raw) = get_optional_env(key).or_else(|| default.map(str::to_owned)) else {
        return Ok(None);
    };
    let amount = raw
        .trim()
        .parse::<Decimal>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if amount.is_sign_negative() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must not be negative".to_owned(),
        ));
    }
    Ok(Some(Money::new(amount)))
}

/// Split a comma-separated list, dropping blanks.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate the webhook signing secret's shape and strength.
fn validate_webhook_secret(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let Some(body) = secret.strip_prefix(WEBHOOK_SECRET_PREFIX) else {
        return Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            format!("must start with '{WEBHOOK_SECRET_PREFIX}'"),
        ));
    };

    let lower = body.to_lowercase();
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(body);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.01);
        assert!(shannon_entropy("aB3$xY9!mK2@nL5#") > 3.3);
    }

    #[test]
    fn test_webhook_secret_requires_prefix() {
        let result = validate_webhook_secret("MfKQ9r8GKYqrTwjUPD8ILPZIo2LaLaSw", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InvalidEnvVar(_, _))));
    }

    #[test]
    fn test_webhook_secret_placeholder() {
        let result = validate_webhook_secret("whsec_your-secret-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_webhook_secret_low_entropy() {
        let result = validate_webhook_secret("whsec_aaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_webhook_secret_valid() {
        assert!(validate_webhook_secret("whsec_MfKQ9r8GKYqrTwjUPD8ILPZIo2LaLaSw", "TEST_VAR").is_ok());
    }

    #[test]
    fn test_shipping_cost() {
        let shipping = ShippingConfig {
            flat_rate: Money::from_cents(500),
            free_threshold: Some(Money::from_cents(5000)),
        };
        assert_eq!(shipping.cost_for(Money::ZERO), Money::ZERO);
        assert_eq!(shipping.cost_for(Money::from_cents(4999)), Money::from_cents(500));
        assert_eq!(shipping.cost_for(Money::from_cents(5000)), Money::ZERO);

        let always = ShippingConfig {
            free_threshold: None,
            ..shipping
        };
        assert_eq!(always.cost_for(Money::from_cents(100_000)), Money::from_cents(500));
    }

    #[test]
    fn test_split_list() {
        assert_eq!(
            split_list(" https://a.example, ,https://b.example "),
            vec!["https://a.example".to_owned(), "https://b.example".to_owned()]
        );
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_identity_config_debug_redacts_secret() {
        let config = IdentityConfig {
            jwt_public_key: "-----BEGIN PUBLIC KEY-----".to_owned(),
            issuer: Some("https://clerk.shop.example".to_owned()),
            authorized_parties: Vec::new(),
            webhook_secret: SecretString::from("whsec_super_sensitive_value"),
        };
        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("clerk.shop.example"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_sensitive_value"));
    }
}
