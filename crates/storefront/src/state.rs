//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;
use storehouse_core::identity::{IdentityError, SessionVerifier};

use crate::config::StorefrontConfig;
use crate::services::catalog::CatalogCache;
use crate::services::webhook::{WebhookError, WebhookVerifier};

/// Error building application state from configuration.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("identity configuration: {0}")]
    Identity(#[from] IdentityError),
    #[error("webhook configuration: {0}")]
    Webhook(#[from] WebhookError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    sessions: SessionVerifier,
    webhooks: WebhookVerifier,
    catalog: CatalogCache,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `pool` - `PostgreSQL` connection pool
    ///
    /// # Errors
    ///
    /// Returns an error if the identity public key or webhook secret is invalid.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let sessions = SessionVerifier::from_pem(
            config.identity.jwt_public_key.as_bytes(),
            config.identity.issuer.as_deref(),
            config.identity.authorized_parties.clone(),
        )?;
        let webhooks = WebhookVerifier::from_secret(config.identity.webhook_secret())?;
        let catalog = CatalogCache::new(config.catalog_cache_ttl);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                sessions,
                webhooks,
                catalog,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Session token verifier.
    #[must_use]
    pub fn sessions(&self) -> &SessionVerifier {
        &self.inner.sessions
    }

    /// Webhook signature verifier.
    #[must_use]
    pub fn webhooks(&self) -> &WebhookVerifier {
        &self.inner.webhooks
    }

    /// Catalog cache.
    #[must_use]
    pub fn catalog(&self) -> &CatalogCache {
        &self.inner.catalog
    }
}
