//! Catalog domain types: categories, products, variants and favorites.

use chrono::{DateTime, Utc};
use serde::Serialize;

use storehouse_core::{CategoryId, FavoriteId, Money, ProductId, VariantId};

/// A catalog category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub parent_id: Option<CategoryId>,
}

/// Short category reference embedded in product listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRef {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
}

/// A category a product belongs to, with its primary flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductCategory {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub is_primary: bool,
}

/// Product as shown in listings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub base_price: Money,
    /// Lowest variant price, or the base price when there are no variants.
    pub min_price: Money,
    /// Stock summed over all variants.
    pub total_inventory: i64,
    pub primary_category: Option<CategoryRef>,
    pub created_at: DateTime<Utc>,
}

/// A purchasable size/color/material combination of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub id: VariantId,
    pub sku: String,
    pub size: Option<String>,
    pub color: Option<String>,
    pub material: Option<String>,
    pub price: Money,
    pub inventory: i32,
}

impl Variant {
    /// Human-readable option label, e.g. `"M / Blue"`.
    #[must_use]
    pub fn label(&self) -> String {
        variant_label(
            self.size.as_deref(),
            self.color.as_deref(),
            self.material.as_deref(),
            &self.sku,
        )
    }
}

/// Join the variant options that are set; fall back to the SKU.
#[must_use]
pub fn variant_label(
    size: Option<&str>,
    color: Option<&str>,
    material: Option<&str>,
    sku: &str,
) -> String {
    let parts: Vec<&str> = [size, color, material]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if parts.is_empty() {
        sku.to_owned()
    } else {
        parts.join(" / ")
    }
}

/// Product page: the product with its variants and categories.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetail {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub base_price: Money,
    pub variants: Vec<Variant>,
    pub categories: Vec<ProductCategory>,
}

/// A product the customer saved.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteProduct {
    pub id: FavoriteId,
    pub product_id: ProductId,
    pub name: String,
    pub slug: String,
    pub image_url: Option<String>,
    pub base_price: Money,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_label() {
        assert_eq!(variant_label(Some("M"), Some("Blue"), None, "TEE-M-BLU"), "M / Blue");
        assert_eq!(variant_label(None, Some(" "), None, "TEE-ONE"), "TEE-ONE");
        assert_eq!(
            variant_label(Some("L"), Some("Black"), Some("Linen"), "X"),
            "L / Black / Linen"
        );
    }
}
