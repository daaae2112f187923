//! Order administration.
//!
//! Status changes follow [`OrderStatus::can_transition_to`]. Cancelling an
//! order puts its units back on the shelf in the same transaction that
//! flips the status, so stock and status never disagree.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use thiserror::Error;

use storehouse_core::{
    CouponId, CustomerId, Email, Money, OrderId, OrderItemId, OrderStatus, PageRequest, VariantId,
};

use super::RepositoryError;
use crate::models::order::next_statuses;
use crate::models::{AdminOrderSummary, CustomerRef, OrderDetail, OrderItem, ShippingAddress};

/// Reasons a status change is refused.
#[derive(Debug, Error)]
pub enum StatusChangeError {
    #[error("order not found")]
    NotFound,

    #[error("cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for StatusChangeError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

/// Query-string filters for the order list.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub customer_id: Option<CustomerId>,
}

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct OrderSummaryRow {
    id: i32,
    customer_id: i32,
    customer_email: String,
    status: OrderStatus,
    total: Money,
    item_count: i64,
    created_at: DateTime<Utc>,
}

impl From<OrderSummaryRow> for AdminOrderSummary {
    fn from(row: OrderSummaryRow) -> Self {
        Self {
            id: OrderId::new(row.id),
            customer_id: CustomerId::new(row.customer_id),
            customer_email: row.customer_email,
            status: row.status,
            total: row.total,
            item_count: row.item_count,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderDetailRow {
    id: i32,
    status: OrderStatus,
    subtotal: Money,
    discount: Money,
    shipping: Money,
    total: Money,
    coupon_id: Option<i32>,
    coupon_code: Option<String>,
    ship_full_name: String,
    ship_line1: String,
    ship_line2: Option<String>,
    ship_city: String,
    ship_state: String,
    ship_postal_code: String,
    ship_country: String,
    ship_phone: Option<String>,
    customer_id: i32,
    customer_email: String,
    customer_first_name: Option<String>,
    customer_last_name: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderDetailRow {
    fn into_detail(self, items: Vec<OrderItem>) -> Result<OrderDetail, RepositoryError> {
        let email = Email::parse(&self.customer_email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(OrderDetail {
            id: OrderId::new(self.id),
            status: self.status,
            subtotal: self.subtotal,
            discount: self.discount,
            shipping: self.shipping,
            total: self.total,
            coupon_id: self.coupon_id.map(CouponId::new),
            coupon_code: self.coupon_code,
            shipping_address: ShippingAddress {
                full_name: self.ship_full_name,
                line1: self.ship_line1,
                line2: self.ship_line2,
                city: self.ship_city,
                state: self.ship_state,
                postal_code: self.ship_postal_code,
                country: self.ship_country,
                phone: self.ship_phone,
            },
            customer: CustomerRef {
                id: CustomerId::new(self.customer_id),
                email,
                first_name: self.customer_first_name,
                last_name: self.customer_last_name,
            },
            items,
            allowed_transitions: next_statuses(self.status),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: i32,
    variant_id: Option<i32>,
    product_name: String,
    variant_label: String,
    unit_price: Money,
    quantity: i32,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: OrderItemId::new(row.id),
            variant_id: row.variant_id.map(VariantId::new),
            line_total: row.unit_price.times(row.quantity),
            product_name: row.product_name,
            variant_label: row.variant_label,
            unit_price: row.unit_price,
            quantity: row.quantity,
        }
    }
}

/// Order list columns; joined with the customer for the email.
pub(crate) const ORDER_SUMMARY_SELECT: &str = r"
    SELECT o.id, o.customer_id, c.email AS customer_email, o.status, o.total, o.created_at,
           COALESCE((SELECT SUM(oi.quantity) FROM shop.order_item oi
                     WHERE oi.order_id = o.id), 0)::BIGINT AS item_count
    FROM shop.orders o
    JOIN shop.customer c ON c.id = o.customer_id
";

/// Most recent orders, optionally for one customer.
pub(crate) async fn recent(
    pool: &PgPool,
    customer_id: Option<CustomerId>,
    limit: i64,
) -> Result<Vec<AdminOrderSummary>, RepositoryError> {
    let rows = sqlx::query_as::<_, OrderSummaryRow>(&format!(
        "{ORDER_SUMMARY_SELECT}
         WHERE ($1::INTEGER IS NULL OR o.customer_id = $1)
         ORDER BY o.created_at DESC, o.id DESC
         LIMIT $2"
    ))
    .bind(customer_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

/// Put the units of an order's lines back into stock.
///
/// Lines whose variant has since been deleted are skipped.
async fn restock(conn: &mut PgConnection, id: OrderId) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r"
        UPDATE shop.product_variant v
        SET inventory = v.inventory + returned.quantity, updated_at = NOW()
        FROM (
            SELECT variant_id, SUM(quantity)::INTEGER AS quantity
            FROM shop.order_item
            WHERE order_id = $1 AND variant_id IS NOT NULL
            GROUP BY variant_id
        ) AS returned
        WHERE v.id = returned.variant_id
        ",
    )
    .bind(id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for order administration.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List one page of orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(
        &self,
        filter: &OrderFilter,
        page: PageRequest,
    ) -> Result<(Vec<AdminOrderSummary>, i64), RepositoryError> {
        let total: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*) FROM shop.orders o
            WHERE ($1::shop.order_status IS NULL OR o.status = $1)
              AND ($2::INTEGER IS NULL OR o.customer_id = $2)
            ",
        )
        .bind(filter.status)
        .bind(filter.customer_id)
        .fetch_one(self.pool)
        .await?;

        let rows = sqlx::query_as::<_, OrderSummaryRow>(&format!(
            "{ORDER_SUMMARY_SELECT}
             WHERE ($1::shop.order_status IS NULL OR o.status = $1)
               AND ($2::INTEGER IS NULL OR o.customer_id = $2)
             ORDER BY o.created_at DESC, o.id DESC
             LIMIT $3 OFFSET $4"
        ))
        .bind(filter.status)
        .bind(filter.customer_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    /// Get an order with its items and customer.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    /// Returns `RepositoryError::DataCorruption` if the customer email is invalid.
    pub async fn get(&self, id: OrderId) -> Result<Option<OrderDetail>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderDetailRow>(
            r"
            SELECT o.id, o.status, o.subtotal, o.discount, o.shipping, o.total,
                   o.coupon_id, cp.code AS coupon_code,
                   o.ship_full_name, o.ship_line1, o.ship_line2, o.ship_city, o.ship_state,
                   o.ship_postal_code, o.ship_country, o.ship_phone,
                   c.id AS customer_id, c.email AS customer_email,
                   c.first_name AS customer_first_name, c.last_name AS customer_last_name,
                   o.created_at, o.updated_at
            FROM shop.orders o
            JOIN shop.customer c ON c.id = o.customer_id
            LEFT JOIN shop.coupon cp ON cp.id = o.coupon_id
            WHERE o.id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, OrderItemRow>(
            r"
            SELECT id, variant_id, product_name, variant_label, unit_price, quantity
            FROM shop.order_item
            WHERE order_id = $1
            ORDER BY id
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        row.into_detail(items.into_iter().map(Into::into).collect())
            .map(Some)
    }

    /// Move an order to `next`.
    ///
    /// The order row is locked while the transition is checked. Moving to
    /// `cancelled` restocks every line in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns `StatusChangeError::NotFound` if the order does not exist,
    /// `StatusChangeError::InvalidTransition` if the lifecycle forbids the
    /// move, or `StatusChangeError::Repository` if a query fails.
    pub async fn update_status(
        &self,
        id: OrderId,
        next: OrderStatus,
    ) -> Result<OrderDetail, StatusChangeError> {
        let mut tx = self.pool.begin().await?;

        let current: Option<OrderStatus> =
            sqlx::query_scalar("SELECT status FROM shop.orders WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let current = current.ok_or(StatusChangeError::NotFound)?;

        if !current.can_transition_to(next) {
            return Err(StatusChangeError::InvalidTransition {
                from: current,
                to: next,
            });
        }

        if next == OrderStatus::Cancelled {
            let restocked = restock(&mut tx, id).await?;
            tracing::info!(order_id = %id, variants = restocked, "Restocked cancelled order");
        }

        sqlx::query("UPDATE shop.orders SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(next)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.get(id).await?.ok_or(StatusChangeError::NotFound)
    }
}
