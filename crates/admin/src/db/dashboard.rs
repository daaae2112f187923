//! Dashboard aggregates.

use sqlx::PgPool;

use storehouse_core::{Money, OrderStatus};

use super::{RepositoryError, orders};
use crate::models::DashboardSummary;
use crate::models::dashboard::status_counts;

const RECENT_ORDER_COUNT: i64 = 5;

/// Repository for the dashboard summary.
pub struct DashboardRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DashboardRepository<'a> {
    /// Create a new dashboard repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store-wide counts, revenue and the latest orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn summary(&self) -> Result<DashboardSummary, RepositoryError> {
        let (customer_count, product_count): (i64, i64) = sqlx::query_as(
            r"
            SELECT (SELECT COUNT(*) FROM shop.customer),
                   (SELECT COUNT(*) FROM shop.product)
            ",
        )
        .fetch_one(self.pool)
        .await?;

        let by_status: Vec<(OrderStatus, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM shop.orders GROUP BY status")
                .fetch_all(self.pool)
                .await?;

        let revenue: Money = sqlx::query_scalar(
            "SELECT COALESCE(SUM(total), 0) FROM shop.orders WHERE status <> 'cancelled'",
        )
        .fetch_one(self.pool)
        .await?;

        let recent_orders = orders::recent(self.pool, None, RECENT_ORDER_COUNT).await?;

        Ok(DashboardSummary {
            customer_count,
            product_count,
            orders_by_status: status_counts(&by_status),
            revenue,
            recent_orders,
        })
    }
}
