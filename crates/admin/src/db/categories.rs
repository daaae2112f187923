//! Category tree administration.
//!
//! Product mappings live in `product_category`, where each product has at
//! most one primary category (enforced by a partial unique index). Bulk
//! operations run in one transaction so a failure leaves no half-moved
//! products behind.

use sqlx::{PgConnection, PgPool};
use thiserror::Error;

use storehouse_core::{CategoryId, ProductId};

use super::RepositoryError;
use crate::models::{CategoryInput, CategoryWithCount, ReassignOutcome};

/// Reasons a category change is refused.
#[derive(Debug, Error)]
pub enum CategoryError {
    #[error("category not found")]
    NotFound,

    #[error("parent category not found")]
    ParentNotFound,

    #[error("a category cannot be nested under itself or its descendants")]
    Cycle,

    #[error("source and target category must differ")]
    SameTarget,

    /// Deleting would unlink products and `force` was not given.
    #[error("category has {0} products")]
    HasProducts(i64),

    #[error("unknown product ids: {0:?}")]
    UnknownProducts(Vec<i32>),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for CategoryError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

const DUPLICATE_SLUG: &str = "Category slug already exists";

const CATEGORY_WITH_COUNT: &str = r"
    SELECT c.id, c.name, c.slug, c.description, c.parent_id,
           COUNT(pc.product_id) AS product_count
    FROM shop.category c
    LEFT JOIN shop.product_category pc ON pc.category_id = c.id
";

async fn exists(conn: &mut PgConnection, id: CategoryId) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM shop.category WHERE id = $1)")
        .bind(id)
        .fetch_one(conn)
        .await
}

/// Whether `candidate` is `id` itself or one of its descendants.
async fn is_self_or_descendant(
    conn: &mut PgConnection,
    id: CategoryId,
    candidate: CategoryId,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(
        r"
        WITH RECURSIVE ancestors AS (
            SELECT id, parent_id FROM shop.category WHERE id = $1
            UNION
            SELECT c.id, c.parent_id
            FROM shop.category c
            JOIN ancestors a ON c.id = a.parent_id
        )
        SELECT EXISTS (SELECT 1 FROM ancestors WHERE id = $2)
        ",
    )
    .bind(candidate)
    .bind(id)
    .fetch_one(conn)
    .await
}

/// Repository for category administration.
pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    /// Create a new category repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All categories with product counts, by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<CategoryWithCount>, RepositoryError> {
        let categories = sqlx::query_as::<_, CategoryWithCount>(&format!(
            "{CATEGORY_WITH_COUNT} GROUP BY c.id ORDER BY c.name, c.id"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(categories)
    }

    /// One category with its product count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CategoryId) -> Result<Option<CategoryWithCount>, RepositoryError> {
        let category = sqlx::query_as::<_, CategoryWithCount>(&format!(
            "{CATEGORY_WITH_COUNT} WHERE c.id = $1 GROUP BY c.id"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(category)
    }

    /// Create a category from normalized input.
    ///
    /// # Errors
    ///
    /// Returns `CategoryError::ParentNotFound` for an unknown parent and
    /// `RepositoryError::Conflict` (wrapped) for a duplicate slug.
    pub async fn create(&self, input: &CategoryInput) -> Result<CategoryWithCount, CategoryError> {
        let mut tx = self.pool.begin().await?;

        if let Some(parent_id) = input.parent_id
            && !exists(&mut tx, parent_id).await?
        {
            return Err(CategoryError::ParentNotFound);
        }

        let id: CategoryId = sqlx::query_scalar(
            r"
            INSERT INTO shop.category (name, slug, description, parent_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            ",
        )
        .bind(&input.name)
        .bind(input.slug())
        .bind(input.description.as_deref())
        .bind(input.parent_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_unique(e, DUPLICATE_SLUG))?;

        tx.commit().await?;

        self.get(id).await?.ok_or(CategoryError::NotFound)
    }

    /// Replace a category's fields.
    ///
    /// Moving a category under a parent holds a table lock for the rest of
    /// the transaction, so two concurrent moves cannot close a loop.
    ///
    /// # Errors
    ///
    /// Returns `CategoryError::NotFound`, `CategoryError::ParentNotFound`,
    /// `CategoryError::Cycle`, or a wrapped `RepositoryError::Conflict` for
    /// a duplicate slug.
    pub async fn update(
        &self,
        id: CategoryId,
        input: &CategoryInput,
    ) -> Result<CategoryWithCount, CategoryError> {
        let mut tx = self.pool.begin().await?;

        // Re-parenting reads the ancestor chain, so tree edits must not interleave
        if input.parent_id.is_some() {
            sqlx::query("LOCK TABLE shop.category IN SHARE ROW EXCLUSIVE MODE")
                .execute(&mut *tx)
                .await?;
        }

        let locked: Option<CategoryId> =
            sqlx::query_scalar("SELECT id FROM shop.category WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            return Err(CategoryError::NotFound);
        }

        if let Some(parent_id) = input.parent_id {
            if !exists(&mut tx, parent_id).await? {
                return Err(CategoryError::ParentNotFound);
            }
            if is_self_or_descendant(&mut tx, id, parent_id).await? {
                return Err(CategoryError::Cycle);
            }
        }

        sqlx::query(
            r"
            UPDATE shop.category
            SET name = $2, slug = $3, description = $4, parent_id = $5, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(&input.name)
        .bind(input.slug())
        .bind(input.description.as_deref())
        .bind(input.parent_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_unique(e, DUPLICATE_SLUG))?;

        tx.commit().await?;

        self.get(id).await?.ok_or(CategoryError::NotFound)
    }

    /// Delete a category. Child categories move to the top level.
    ///
    /// Returns the number of product mappings removed.
    ///
    /// # Errors
    ///
    /// Returns `CategoryError::HasProducts` if products are mapped to the
    /// category and `force` is false, `CategoryError::NotFound` if it does
    /// not exist.
    pub async fn delete(&self, id: CategoryId, force: bool) -> Result<i64, CategoryError> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<CategoryId> =
            sqlx::query_scalar("SELECT id FROM shop.category WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            return Err(CategoryError::NotFound);
        }

        let product_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM shop.product_category WHERE category_id = $1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if product_count > 0 && !force {
            return Err(CategoryError::HasProducts(product_count));
        }

        sqlx::query("DELETE FROM shop.category WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(product_count)
    }

    /// Map products to a category.
    ///
    /// Products already in the category are left as they are. With
    /// `primary`, the category becomes the primary one of every listed
    /// product and their previous primary mappings are demoted.
    ///
    /// Returns the number of new mappings.
    ///
    /// # Errors
    ///
    /// Returns `CategoryError::NotFound` for an unknown category and
    /// `CategoryError::UnknownProducts` if any product ID does not exist;
    /// nothing is written in either case.
    pub async fn assign_products(
        &self,
        id: CategoryId,
        product_ids: &[ProductId],
        primary: bool,
    ) -> Result<u64, CategoryError> {
        let mut ids: Vec<i32> = product_ids.iter().map(|p| p.as_i32()).collect();
        ids.sort_unstable();
        ids.dedup();

        let mut tx = self.pool.begin().await?;

        let locked: Option<CategoryId> =
            sqlx::query_scalar("SELECT id FROM shop.category WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            return Err(CategoryError::NotFound);
        }

        let found: Vec<i32> =
            sqlx::query_scalar("SELECT id FROM shop.product WHERE id = ANY($1) ORDER BY id")
                .bind(&ids)
                .fetch_all(&mut *tx)
                .await?;
        if found.len() != ids.len() {
            let missing = ids.iter().copied().filter(|i| !found.contains(i)).collect();
            return Err(CategoryError::UnknownProducts(missing));
        }

        let inserted = sqlx::query(
            r"
            INSERT INTO shop.product_category (product_id, category_id, is_primary)
            SELECT product_id, $2, FALSE FROM UNNEST($1::INTEGER[]) AS t(product_id)
            ON CONFLICT (product_id, category_id) DO NOTHING
            ",
        )
        .bind(&ids)
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if primary {
            // Demote first: the one-primary index is checked row by row
            sqlx::query(
                r"
                UPDATE shop.product_category SET is_primary = FALSE
                WHERE product_id = ANY($1) AND category_id <> $2 AND is_primary
                ",
            )
            .bind(&ids)
            .bind(id)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                r"
                UPDATE shop.product_category SET is_primary = TRUE
                WHERE product_id = ANY($1) AND category_id = $2
                ",
            )
            .bind(&ids)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// Move every product mapping from `from` to `target`.
    ///
    /// Primary flags travel with the mapping. Products already in `target`
    /// keep a single mapping, which is primary if either one was.
    ///
    /// # Errors
    ///
    /// Returns `CategoryError::SameTarget` if both IDs are equal and
    /// `CategoryError::NotFound` if either category does not exist.
    pub async fn reassign(
        &self,
        from: CategoryId,
        target: CategoryId,
    ) -> Result<ReassignOutcome, CategoryError> {
        if from == target {
            return Err(CategoryError::SameTarget);
        }

        let mut tx = self.pool.begin().await?;

        // Lock both rows in ID order
        let locked: Vec<CategoryId> = sqlx::query_scalar(
            "SELECT id FROM shop.category WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        )
        .bind(vec![from.as_i32(), target.as_i32()])
        .fetch_all(&mut *tx)
        .await?;
        if locked.len() != 2 {
            return Err(CategoryError::NotFound);
        }

        let moved: Vec<(i32, bool)> = sqlx::query_as(
            r"
            DELETE FROM shop.product_category
            WHERE category_id = $1
            RETURNING product_id, is_primary
            ",
        )
        .bind(from)
        .fetch_all(&mut *tx)
        .await?;

        let (product_ids, primaries): (Vec<i32>, Vec<bool>) = moved.into_iter().unzip();

        let inserted: Vec<bool> = sqlx::query_scalar(
            r"
            INSERT INTO shop.product_category (product_id, category_id, is_primary)
            SELECT product_id, $3, is_primary
            FROM UNNEST($1::INTEGER[], $2::BOOLEAN[]) AS t(product_id, is_primary)
            ON CONFLICT (product_id, category_id)
            DO UPDATE SET is_primary = product_category.is_primary OR EXCLUDED.is_primary
            RETURNING (xmax = 0) AS inserted
            ",
        )
        .bind(&product_ids)
        .bind(&primaries)
        .bind(target)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let moved = inserted.iter().filter(|fresh| **fresh).count() as u64;
        Ok(ReassignOutcome {
            moved,
            merged: inserted.len() as u64 - moved,
        })
    }
}
