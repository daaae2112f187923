//! Catalog queries: categories, product listings and product pages.
//!
//! The catalog is read-only from the storefront. Inactive products are hidden
//! from every query here.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;

use storehouse_core::{CategoryId, Money, PageRequest, ProductId, VariantId};

use super::RepositoryError;
use crate::models::{
    Category, CategoryRef, ProductCategory, ProductDetail, ProductSummary, Variant,
};

/// Listing order for `GET /api/products`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Name,
}

impl ProductSort {
    const fn order_by(self) -> &'static str {
        match self {
            Self::Newest => "s.created_at DESC, s.id DESC",
            Self::PriceAsc => "s.min_price ASC, s.id ASC",
            Self::PriceDesc => "s.min_price DESC, s.id DESC",
            Self::Name => "s.name ASC, s.id ASC",
        }
    }
}

/// Product listing filters, parsed from the query string.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductFilter {
    /// Category slug; products in its direct subcategories match too.
    pub category: Option<String>,
    /// Case-insensitive match on name or description.
    pub search: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    #[serde(default)]
    pub sort: ProductSort,
}

impl ProductFilter {
    fn category(&self) -> Option<&str> {
        self.category.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    fn search_pattern(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(like_pattern)
    }
}

/// Build an `ILIKE` substring pattern with wildcards in the input escaped.
fn like_pattern(input: &str) -> String {
    let escaped = input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

// Active products with their price and stock aggregates.
// $1 category slug, $2 search pattern, $3 min price, $4 max price.
const FILTERED_PRODUCTS: &str = r"
    WITH s AS (
        SELECT p.id, p.name, p.slug, p.description, p.image_url, p.base_price, p.created_at,
               COALESCE(MIN(v.price), p.base_price) AS min_price,
               COALESCE(SUM(v.inventory), 0)::BIGINT AS total_inventory
        FROM shop.product p
        LEFT JOIN shop.product_variant v ON v.product_id = p.id
        WHERE p.is_active
          AND ($1::TEXT IS NULL OR EXISTS (
                SELECT 1
                FROM shop.product_category pc
                JOIN shop.category c ON c.id = pc.category_id
                LEFT JOIN shop.category parent ON parent.id = c.parent_id
                WHERE pc.product_id = p.id AND (c.slug = $1 OR parent.slug = $1)))
          AND ($2::TEXT IS NULL OR p.name ILIKE $2 OR p.description ILIKE $2)
        GROUP BY p.id
    )
";

const PRICE_BOUNDS: &str =
    "($3::NUMERIC IS NULL OR s.min_price >= $3) AND ($4::NUMERIC IS NULL OR s.min_price <= $4)";

#[derive(Debug, sqlx::FromRow)]
struct ProductSummaryRow {
    id: i32,
    name: String,
    slug: String,
    description: Option<String>,
    image_url: Option<String>,
    base_price: Money,
    min_price: Money,
    total_inventory: i64,
    created_at: DateTime<Utc>,
    primary_category_id: Option<i32>,
    primary_category_name: Option<String>,
    primary_category_slug: Option<String>,
}

impl From<ProductSummaryRow> for ProductSummary {
    fn from(row: ProductSummaryRow) -> Self {
        let primary_category = match (
            row.primary_category_id,
            row.primary_category_name,
            row.primary_category_slug,
        ) {
            (Some(id), Some(name), Some(slug)) => Some(CategoryRef {
                id: CategoryId::new(id),
                name,
                slug,
            }),
            _ => None,
        };

        Self {
            id: ProductId::new(row.id),
            name: row.name,
            slug: row.slug,
            description: row.description,
            image_url: row.image_url,
            base_price: row.base_price,
            min_price: row.min_price,
            total_inventory: row.total_inventory,
            primary_category,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: i32,
    name: String,
    slug: String,
    description: Option<String>,
    parent_id: Option<i32>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: CategoryId::new(row.id),
            name: row.name,
            slug: row.slug,
            description: row.description,
            parent_id: row.parent_id.map(CategoryId::new),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    name: String,
    slug: String,
    description: Option<String>,
    image_url: Option<String>,
    base_price: Money,
}

#[derive(Debug, sqlx::FromRow)]
struct VariantRow {
    id: i32,
    sku: String,
    size: Option<String>,
    color: Option<String>,
    material: Option<String>,
    price: Money,
    inventory: i32,
}

impl From<VariantRow> for Variant {
    fn from(row: VariantRow) -> Self {
        Self {
            id: VariantId::new(row.id),
            sku: row.sku,
            size: row.size,
            color: row.color,
            material: row.material,
            price: row.price,
            inventory: row.inventory,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductCategoryRow {
    id: i32,
    name: String,
    slug: String,
    is_primary: bool,
}

/// Repository for catalog reads.
pub struct CatalogRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CatalogRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List all categories, parents before children, alphabetical within a level.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            r"
            SELECT id, name, slug, description, parent_id
            FROM shop.category
            ORDER BY parent_id NULLS FIRST, name
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// List one page of products matching `filter`.
    ///
    /// Returns the page and the total number of matching products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_products(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> Result<(Vec<ProductSummary>, i64), RepositoryError> {
        let category = filter.category();
        let search = filter.search_pattern();

        let total: i64 = sqlx::query_scalar(&format!(
            "{FILTERED_PRODUCTS} SELECT COUNT(*) FROM s WHERE {PRICE_BOUNDS}"
        ))
        .bind(category)
        .bind(search.as_deref())
        .bind(filter.min_price)
        .bind(filter.max_price)
        .fetch_one(self.pool)
        .await?;

        let rows = sqlx::query_as::<_, ProductSummaryRow>(&format!(
            "{FILTERED_PRODUCTS}
            SELECT s.id, s.name, s.slug, s.description, s.image_url, s.base_price,
                   s.min_price, s.total_inventory, s.created_at,
                   c.id AS primary_category_id,
                   c.name AS primary_category_name,
                   c.slug AS primary_category_slug
            FROM s
            LEFT JOIN shop.product_category pc ON pc.product_id = s.id AND pc.is_primary
            LEFT JOIN shop.category c ON c.id = pc.category_id
            WHERE {PRICE_BOUNDS}
            ORDER BY {order_by}
            LIMIT $5 OFFSET $6",
            order_by = filter.sort.order_by()
        ))
        .bind(category)
        .bind(search.as_deref())
        .bind(filter.min_price)
        .bind(filter.max_price)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    /// Get an active product with its variants and categories.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_product_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<ProductDetail>, RepositoryError> {
        let Some(product) = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, slug, description, image_url, base_price
            FROM shop.product
            WHERE slug = $1 AND is_active
            ",
        )
        .bind(slug)
        .fetch_optional(self.pool)
        .await?
        else {
            return Ok(None);
        };

        let variants = sqlx::query_as::<_, VariantRow>(
            r"
            SELECT id, sku, size, color, material, price, inventory
            FROM shop.product_variant
            WHERE product_id = $1
            ORDER BY price, id
            ",
        )
        .bind(product.id)
        .fetch_all(self.pool)
        .await?;

        let categories = sqlx::query_as::<_, ProductCategoryRow>(
            r"
            SELECT c.id, c.name, c.slug, pc.is_primary
            FROM shop.product_category pc
            JOIN shop.category c ON c.id = pc.category_id
            WHERE pc.product_id = $1
            ORDER BY pc.is_primary DESC, c.name
            ",
        )
        .bind(product.id)
        .fetch_all(self.pool)
        .await?;

        Ok(Some(ProductDetail {
            id: ProductId::new(product.id),
            name: product.name,
            slug: product.slug,
            description: product.description,
            image_url: product.image_url,
            base_price: product.base_price,
            variants: variants.into_iter().map(Into::into).collect(),
            categories: categories
                .into_iter()
                .map(|row| ProductCategory {
                    id: CategoryId::new(row.id),
                    name: row.name,
                    slug: row.slug,
                    is_primary: row.is_primary,
                })
                .collect(),
        }))
    }

    /// Whether an active product exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn product_is_active(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let active: Option<bool> =
            sqlx::query_scalar("SELECT is_active FROM shop.product WHERE id = $1")
                .bind(id)
                .fetch_optional(self.pool)
                .await?;
        Ok(active.unwrap_or(false))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("linen"), "%linen%");
        assert_eq!(like_pattern("100%_off"), "%100\\%\\_off%");
    }

    #[test]
    fn test_filter_ignores_blank_values() {
        let filter = ProductFilter {
            category: Some("  ".to_owned()),
            search: Some(String::new()),
            ..ProductFilter::default()
        };
        assert_eq!(filter.category(), None);
        assert_eq!(filter.search_pattern(), None);
    }

    #[test]
    fn test_sort_parses_snake_case() {
        let sort: ProductSort = serde_json::from_str("\"price_desc\"").unwrap();
        assert_eq!(sort, ProductSort::PriceDesc);
        assert_eq!(ProductSort::default(), ProductSort::Newest);
    }
}
