//! Coupon lookups and redemption.

use sqlx::{PgConnection, PgPool};

use storehouse_core::{Coupon, CouponId};

use super::RepositoryError;

const COUPON_BY_CODE: &str = r"
    SELECT id, code, description, coupon_type, value, min_purchase, max_discount,
           usage_limit, usage_count, is_active, starts_at, expires_at, created_at, updated_at
    FROM shop.coupon
    WHERE UPPER(code) = UPPER($1)
";

/// Look up a coupon by code on an open connection, locking it for update.
pub(crate) async fn lock_by_code(
    conn: &mut PgConnection,
    code: &str,
) -> Result<Option<Coupon>, RepositoryError> {
    let coupon = sqlx::query_as::<_, Coupon>(&format!("{COUPON_BY_CODE} FOR UPDATE"))
        .bind(code)
        .fetch_optional(conn)
        .await?;
    Ok(coupon)
}

/// Consume one use of a coupon.
///
/// The usage limit and validity window are re-checked in the `UPDATE`
/// predicate, so two checkouts racing for the last use cannot both win.
/// Returns `false` if the coupon could not be redeemed.
pub(crate) async fn redeem(
    conn: &mut PgConnection,
    id: CouponId,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE shop.coupon
        SET usage_count = usage_count + 1, updated_at = NOW()
        WHERE id = $1
          AND is_active
          AND (usage_limit IS NULL OR usage_count < usage_limit)
          AND (starts_at IS NULL OR starts_at <= NOW())
          AND (expires_at IS NULL OR expires_at > NOW())
        ",
    )
    .bind(id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Repository for storefront coupon reads.
pub struct CouponRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CouponRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a coupon by its code (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_code(&self, code: &str) -> Result<Option<Coupon>, RepositoryError> {
        let coupon = sqlx::query_as::<_, Coupon>(COUPON_BY_CODE)
            .bind(code)
            .fetch_optional(self.pool)
            .await?;
        Ok(coupon)
    }
}
