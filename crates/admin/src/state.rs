//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;
use storehouse_core::identity::{IdentityError, SessionVerifier};

use crate::config::AdminConfig;

/// Application state shared across all handlers.
///
/// Cheaply cloneable; everything lives behind one `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AdminConfig,
    pool: PgPool,
    sessions: SessionVerifier,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the identity public key cannot be parsed.
    pub fn new(config: AdminConfig, pool: PgPool) -> Result<Self, IdentityError> {
        let sessions = SessionVerifier::from_pem(
            config.identity.jwt_public_key.as_bytes(),
            config.identity.issuer.as_deref(),
            config.identity.authorized_parties.clone(),
        )?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                sessions,
            }),
        })
    }

    /// Get a reference to the admin configuration.
    #[must_use]
    pub fn config(&self) -> &AdminConfig {
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
}
