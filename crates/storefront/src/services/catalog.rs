//! In-memory cache for catalog reads that every page needs.
//!
//! Categories change rarely and are requested on every page load, so the list
//! is cached via `moka` for the configured TTL.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;
use tracing::{debug, instrument};

use crate::db::{CatalogRepository, RepositoryError};
use crate::models::Category;

/// Cache key.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
enum CacheKey {
    Categories,
}

/// Cached catalog lookups.
#[derive(Clone)]
pub struct CatalogCache {
    categories: Cache<CacheKey, Arc<Vec<Category>>>,
}

impl CatalogCache {
    /// Create a cache whose entries expire after `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        let categories = Cache::builder()
            .max_capacity(16)
            .time_to_live(ttl)
            .build();
        Self { categories }
    }

    /// All categories, from cache when fresh.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the cache is cold and the query fails.
    #[instrument(skip_all)]
    pub async fn categories(&self, pool: &PgPool) -> Result<Arc<Vec<Category>>, RepositoryError> {
        if let Some(categories) = self.categories.get(&CacheKey::Categories).await {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let categories = Arc::new(CatalogRepository::new(pool).list_categories().await?);
        self.categories
            .insert(CacheKey::Categories, Arc::clone(&categories))
            .await;
        Ok(categories)
    }

    /// Drop cached entries.
    pub fn invalidate(&self) {
        self.categories.invalidate_all();
    }
}

impl std::fmt::Debug for CatalogCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogCache")
            .field("entries", &self.categories.entry_count())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use storehouse_core::CategoryId;

    #[tokio::test]
    async fn test_cached_categories_served_without_database() {
        let cache = CatalogCache::new(Duration::from_secs(60));
        let cached = Arc::new(vec![Category {
            id: CategoryId::new(1),
            name: "Shirts".to_owned(),
            slug: "shirts".to_owned(),
            description: None,
            parent_id: None,
        }]);
        cache
            .categories
            .insert(CacheKey::Categories, Arc::clone(&cached))
            .await;

        // Never connects: the lookup must be answered from the cache
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://unused@localhost/unused")
            .unwrap();
        let categories = cache.categories(&pool).await.unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].slug, "shirts");
    }
}
