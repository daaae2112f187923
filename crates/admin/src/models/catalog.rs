//! Category management types.

use serde::{Deserialize, Serialize};

use storehouse_core::CategoryId;

/// A category with the number of products mapped to it.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CategoryWithCount {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub parent_id: Option<CategoryId>,
    pub product_count: i64,
}

/// Create/update body for a category.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryInput {
    pub name: String,
    /// Derived from `name` when absent.
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parent_id: Option<CategoryId>,
}

impl CategoryInput {
    /// Trim fields and settle the slug.
    ///
    /// # Errors
    ///
    /// Returns a message if the name is blank or the slug is empty after
    /// normalization.
    pub fn normalized(self) -> Result<Self, String> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err("name is required".to_string());
        }

        let slug = slugify(self.slug.as_deref().unwrap_or(&name));
        if slug.is_empty() {
            return Err("slug must contain letters or digits".to_string());
        }

        Ok(Self {
            name,
            slug: Some(slug),
            description: self
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            parent_id: self.parent_id,
        })
    }

    /// The slug after [`Self::normalized`].
    #[must_use]
    pub fn slug(&self) -> &str {
        self.slug.as_deref().unwrap_or_default()
    }
}

/// Result of moving every product from one category to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReassignOutcome {
    /// Mappings moved to the target category.
    pub moved: u64,
    /// Mappings dropped because the product was already in the target.
    pub merged: u64,
}

/// Lower-case, hyphen-separated URL slug.
///
/// ```
/// use storehouse_admin::models::slugify;
///
/// assert_eq!(slugify("  Summer Tees & Tanks "), "summer-tees-tanks");
/// ```
#[must_use]
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hoodies"), "hoodies");
        assert_eq!(slugify("Hats -- Caps"), "hats-caps");
        assert_eq!(slugify("--Sale--"), "sale");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_input_derives_slug_from_name() {
        let input = CategoryInput {
            name: "  New Arrivals ".to_string(),
            slug: None,
            description: Some("   ".to_string()),
            parent_id: None,
        }
        .normalized()
        .unwrap();
        assert_eq!(input.name, "New Arrivals");
        assert_eq!(input.slug(), "new-arrivals");
        assert_eq!(input.description, None);
    }

    #[test]
    fn test_input_rejects_blank_name() {
        let input = CategoryInput {
            name: " ".to_string(),
            slug: Some("x".to_string()),
            description: None,
            parent_id: None,
        };
        assert!(input.normalized().is_err());
    }
}
