//! Favorites repository.
//!
//! A customer may keep at most [`MAX_FAVORITES`] favorites. The count check
//! and the insert run in one transaction that first locks the customer's row,
//! so concurrent adds for the same customer are serialized and cannot push
//! the count past the cap.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use storehouse_core::{CustomerId, FavoriteId, MAX_FAVORITES, Money, ProductId};

use super::RepositoryError;
use crate::models::FavoriteProduct;

/// Result of adding a favorite.
#[derive(Debug, Clone)]
pub enum FavoriteOutcome {
    /// A new favorite was stored.
    Added(FavoriteProduct),
    /// The product was already a favorite; nothing changed.
    Existing(FavoriteProduct),
    /// The customer already has the maximum number of favorites.
    LimitReached,
}

#[derive(Debug, sqlx::FromRow)]
struct FavoriteRow {
    id: i32,
    product_id: i32,
    name: String,
    slug: String,
    image_url: Option<String>,
    base_price: Money,
    created_at: DateTime<Utc>,
}

impl From<FavoriteRow> for FavoriteProduct {
    fn from(row: FavoriteRow) -> Self {
        Self {
            id: FavoriteId::new(row.id),
            product_id: ProductId::new(row.product_id),
            name: row.name,
            slug: row.slug,
            image_url: row.image_url,
            base_price: row.base_price,
            created_at: row.created_at,
        }
    }
}

async fn fetch_favorite(
    conn: &mut PgConnection,
    customer_id: CustomerId,
    product_id: ProductId,
) -> Result<Option<FavoriteProduct>, RepositoryError> {
    let row = sqlx::query_as::<_, FavoriteRow>(
        r"
        SELECT f.id, f.product_id, p.name, p.slug, p.image_url, p.base_price, f.created_at
        FROM shop.favorite f
        JOIN shop.product p ON p.id = f.product_id
        WHERE f.customer_id = $1 AND f.product_id = $2
        ",
    )
    .bind(customer_id)
    .bind(product_id)
    .fetch_optional(conn)
    .await?;

    Ok(row.map(Into::into))
}

/// Repository for customer favorites.
pub struct FavoriteRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> FavoriteRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List the customer's favorites, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, customer_id: CustomerId) -> Result<Vec<FavoriteProduct>, RepositoryError> {
        let rows = sqlx::query_as::<_, FavoriteRow>(
            r"
            SELECT f.id, f.product_id, p.name, p.slug, p.image_url, p.base_price, f.created_at
            FROM shop.favorite f
            JOIN shop.product p ON p.id = f.product_id
            WHERE f.customer_id = $1
            ORDER BY f.created_at DESC, f.id DESC
            ",
        )
        .bind(customer_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Add a product to the customer's favorites, enforcing the cap.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the customer or an active product does not exist.
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn add(
        &self,
        customer_id: CustomerId,
        product_id: ProductId,
    ) -> Result<FavoriteOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT id FROM shop.customer WHERE id = $1 FOR UPDATE")
            .bind(customer_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        let active: Option<bool> =
            sqlx::query_scalar("SELECT is_active FROM shop.product WHERE id = $1")
                .bind(product_id)
                .fetch_optional(&mut *tx)
                .await?;
        if active != Some(true) {
            return Err(RepositoryError::NotFound);
        }

        if let Some(existing) = fetch_favorite(&mut tx, customer_id, product_id).await? {
            return Ok(FavoriteOutcome::Existing(existing));
        }

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM shop.favorite WHERE customer_id = $1")
                .bind(customer_id)
                .fetch_one(&mut *tx)
                .await?;
        if count >= MAX_FAVORITES {
            return Ok(FavoriteOutcome::LimitReached);
        }

        sqlx::query("INSERT INTO shop.favorite (customer_id, product_id) VALUES ($1, $2)")
            .bind(customer_id)
            .bind(product_id)
            .execute(&mut *tx)
            .await?;

        let favorite = fetch_favorite(&mut tx, customer_id, product_id)
            .await?
            .ok_or_else(|| {
                RepositoryError::DataCorruption("favorite missing after insert".to_owned())
            })?;

        tx.commit().await?;
        Ok(FavoriteOutcome::Added(favorite))
    }

    /// Remove a product from the customer's favorites.
    ///
    /// Returns `true` if it was a favorite.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn remove(
        &self,
        customer_id: CustomerId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM shop.favorite WHERE customer_id = $1 AND product_id = $2")
                .bind(customer_id)
                .bind(product_id)
                .execute(self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Number of favorites the customer has.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self, customer_id: CustomerId) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM shop.favorite WHERE customer_id = $1")
            .bind(customer_id)
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}
