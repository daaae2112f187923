//! Coupon administration.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;

use storehouse_core::coupon::{normalize_code, validate_rule};
use storehouse_core::{Coupon, CouponError, CouponId, CouponRule, CouponType, Money, PageRequest};

use super::RepositoryError;

/// Longest accepted coupon code.
pub const MAX_CODE_LEN: usize = 50;

const COUPON_COLUMNS: &str = "id, code, description, coupon_type, value, min_purchase, \
     max_discount, usage_limit, usage_count, is_active, starts_at, expires_at, created_at, \
     updated_at";

const DUPLICATE_CODE: &str = "Coupon code already exists";

/// Query-string filters for the coupon list.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct CouponFilter {
    pub active: Option<bool>,
}

const fn default_active() -> bool {
    true
}

/// Create/replace body for a coupon.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponInput {
    pub code: String,
    #[serde(default)]
    pub description: Option<String>,
    pub coupon_type: CouponType,
    #[serde(default)]
    pub value: Decimal,
    #[serde(default)]
    pub min_purchase: Option<Money>,
    #[serde(default)]
    pub max_discount: Option<Money>,
    #[serde(default)]
    pub usage_limit: Option<i32>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl CouponInput {
    /// Pricing part of the input.
    #[must_use]
    pub const fn rule(&self) -> CouponRule {
        CouponRule {
            coupon_type: self.coupon_type,
            value: self.value,
            min_purchase: self.min_purchase,
            max_discount: self.max_discount,
        }
    }

    /// Validate the definition and normalize the code.
    ///
    /// Free-shipping coupons store a zero value.
    ///
    /// # Errors
    ///
    /// Returns [`CouponError::InvalidRule`] describing the first problem.
    pub fn validated(mut self) -> Result<Self, CouponError> {
        self.code = normalize_code(&self.code);
        if self.code.is_empty() {
            return Err(CouponError::InvalidRule("code is required".to_owned()));
        }
        if self.code.len() > MAX_CODE_LEN {
            return Err(CouponError::InvalidRule(format!(
                "code must be at most {MAX_CODE_LEN} characters"
            )));
        }
        if !self
            .code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(CouponError::InvalidRule(
                "code may only contain letters, digits, '-' and '_'".to_owned(),
            ));
        }

        validate_rule(&self.rule())?;

        if self.usage_limit.is_some_and(|limit| limit < 1) {
            return Err(CouponError::InvalidRule(
                "usage limit must be at least 1".to_owned(),
            ));
        }
        if let (Some(start), Some(end)) = (self.starts_at, self.expires_at)
            && start >= end
        {
            return Err(CouponError::InvalidRule(
                "expiresAt must be after startsAt".to_owned(),
            ));
        }

        if self.coupon_type == CouponType::FreeShipping {
            self.value = Decimal::ZERO;
        }
        self.description = self
            .description
            .map(|d| d.trim().to_owned())
            .filter(|d| !d.is_empty());

        Ok(self)
    }
}

/// Repository for coupon administration.
pub struct CouponRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CouponRepository<'a> {
    /// Create a new coupon repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List one page of coupons, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(
        &self,
        filter: CouponFilter,
        page: PageRequest,
    ) -> Result<(Vec<Coupon>, i64), RepositoryError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM shop.coupon WHERE ($1::BOOLEAN IS NULL OR is_active = $1)",
        )
        .bind(filter.active)
        .fetch_one(self.pool)
        .await?;

        let coupons = sqlx::query_as::<_, Coupon>(&format!(
            r"
            SELECT {COUPON_COLUMNS} FROM shop.coupon
            WHERE ($1::BOOLEAN IS NULL OR is_active = $1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(filter.active)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        Ok((coupons, total))
    }

    /// Get a coupon by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CouponId) -> Result<Option<Coupon>, RepositoryError> {
        let coupon = sqlx::query_as::<_, Coupon>(&format!(
            "SELECT {COUPON_COLUMNS} FROM shop.coupon WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(coupon)
    }

    /// Create a coupon from validated input.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the code is taken.
    /// Returns `RepositoryError::Database` for other failures.
    pub async fn create(&self, input: &CouponInput) -> Result<Coupon, RepositoryError> {
        sqlx::query_as::<_, Coupon>(&format!(
            r"
            INSERT INTO shop.coupon
                (code, description, coupon_type, value, min_purchase, max_discount,
                 usage_limit, is_active, starts_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {COUPON_COLUMNS}
            "
        ))
        .bind(&input.code)
        .bind(input.description.as_deref())
        .bind(input.coupon_type)
        .bind(input.value)
        .bind(input.min_purchase)
        .bind(input.max_discount)
        .bind(input.usage_limit)
        .bind(input.is_active)
        .bind(input.starts_at)
        .bind(input.expires_at)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, DUPLICATE_CODE))
    }

    /// Replace a coupon's definition. The usage count is kept.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the new code is taken.
    /// Returns `RepositoryError::Database` for other failures.
    pub async fn update(
        &self,
        id: CouponId,
        input: &CouponInput,
    ) -> Result<Option<Coupon>, RepositoryError> {
        sqlx::query_as::<_, Coupon>(&format!(
            r"
            UPDATE shop.coupon
            SET code = $2, description = $3, coupon_type = $4, value = $5,
                min_purchase = $6, max_discount = $7, usage_limit = $8, is_active = $9,
                starts_at = $10, expires_at = $11, updated_at = NOW()
            WHERE id = $1
            RETURNING {COUPON_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&input.code)
        .bind(input.description.as_deref())
        .bind(input.coupon_type)
        .bind(input.value)
        .bind(input.min_purchase)
        .bind(input.max_discount)
        .bind(input.usage_limit)
        .bind(input.is_active)
        .bind(input.starts_at)
        .bind(input.expires_at)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, DUPLICATE_CODE))
    }

    /// Switch a coupon on or off.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_active(
        &self,
        id: CouponId,
        is_active: bool,
    ) -> Result<Option<Coupon>, RepositoryError> {
        let coupon = sqlx::query_as::<_, Coupon>(&format!(
            r"
            UPDATE shop.coupon SET is_active = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {COUPON_COLUMNS}
            "
        ))
        .bind(id)
        .bind(is_active)
        .fetch_optional(self.pool)
        .await?;
        Ok(coupon)
    }

    /// Delete a coupon. Orders keep their amounts and lose the reference.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: CouponId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.coupon WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn input(json: &str) -> CouponInput {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_code_is_uppercased() {
        let coupon = input(r#"{"code": " summer-10 ", "couponType": "percentage", "value": "10"}"#)
            .validated()
            .unwrap();
        assert_eq!(coupon.code, "SUMMER-10");
        assert!(coupon.is_active);
    }

    #[test]
    fn test_free_shipping_value_is_zeroed() {
        let coupon = input(r#"{"code": "SHIPFREE", "couponType": "free_shipping", "value": "7"}"#)
            .validated()
            .unwrap();
        assert_eq!(coupon.value, Decimal::ZERO);
    }

    #[test]
    fn test_rejects_bad_definitions() {
        let cases = [
            r#"{"code": "  ", "couponType": "percentage", "value": "10"}"#,
            r#"{"code": "TEN OFF", "couponType": "percentage", "value": "10"}"#,
            r#"{"code": "HALF", "couponType": "percentage", "value": "150"}"#,
            r#"{"code": "FIVE", "couponType": "fixed_amount", "value": "0"}"#,
            r#"{"code": "ONCE", "couponType": "fixed_amount", "value": "5", "usageLimit": 0}"#,
        ];
        for case in cases {
            assert!(
                matches!(input(case).validated(), Err(CouponError::InvalidRule(_))),
                "accepted {case}"
            );
        }
    }

    #[test]
    fn test_rejects_inverted_window() {
        let mut coupon = input(r#"{"code": "LATE", "couponType": "fixed_amount", "value": "5"}"#);
        let now = Utc::now();
        coupon.starts_at = Some(now);
        coupon.expires_at = Some(now - Duration::days(1));
        assert!(coupon.validated().is_err());
    }
}
