//! Order repository and the checkout transaction.
//!
//! Checkout turns the customer's cart into an order in one transaction:
//!
//! 1. Lock the cart lines and load their variants
//! 2. Decrement inventory (`inventory >= quantity` in the predicate)
//! 3. Price the order, redeeming the coupon atomically if one was given
//! 4. Insert the order, its items and the shipping address snapshot
//! 5. Empty the cart
//!
//! Any failure rolls the whole thing back.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use thiserror::Error;

use storehouse_core::{
    AddressId, CouponError, CouponId, CustomerId, Money, OrderId, OrderItemId, OrderStatus,
    PageRequest, VariantId,
};

use super::RepositoryError;
use super::{addresses, carts, coupons};
use crate::config::ShippingConfig;
use crate::models::catalog::variant_label;
use crate::models::{Order, OrderItem, OrderSummary, ShippingAddress};
use crate::services::checkout::Quote;

/// Reasons checkout can fail.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("address not found")]
    AddressNotFound,

    #[error("coupon not found")]
    CouponNotFound,

    #[error(transparent)]
    Coupon(#[from] CouponError),

    /// A variant has fewer units in stock than the cart asks for.
    #[error("insufficient stock for {sku}")]
    InsufficientStock { sku: String },

    /// A product in the cart has been withdrawn from sale.
    #[error("{name} is no longer available")]
    Unavailable { name: String },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for CheckoutError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    customer_id: i32,
    status: OrderStatus,
    subtotal: Money,
    discount: Money,
    shipping: Money,
    total: Money,
    coupon_id: Option<i32>,
    ship_full_name: String,
    ship_line1: String,
    ship_line2: Option<String>,
    ship_city: String,
    ship_state: String,
    ship_postal_code: String,
    ship_country: String,
    ship_phone: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Order {
        Order {
            id: OrderId::new(self.id),
            customer_id: CustomerId::new(self.customer_id),
            status: self.status,
            subtotal: self.subtotal,
            discount: self.discount,
            shipping: self.shipping,
            total: self.total,
            coupon_id: self.coupon_id.map(CouponId::new),
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
            items,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
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

#[derive(Debug, sqlx::FromRow)]
struct OrderSummaryRow {
    id: i32,
    status: OrderStatus,
    total: Money,
    item_count: i64,
    created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct CheckoutLineRow {
    variant_id: i32,
    quantity: i32,
    sku: String,
    size: Option<String>,
    color: Option<String>,
    material: Option<String>,
    price: Money,
    product_name: String,
    is_active: bool,
}

const ORDER_COLUMNS: &str = "id, customer_id, status, subtotal, discount, shipping, total, \
     coupon_id, ship_full_name, ship_line1, ship_line2, ship_city, ship_state, \
     ship_postal_code, ship_country, ship_phone, created_at, updated_at";

async fn fetch_items(
    conn: &mut PgConnection,
    order_id: i32,
) -> Result<Vec<OrderItem>, RepositoryError> {
    let rows = sqlx::query_as::<_, OrderItemRow>(
        r"
        SELECT id, variant_id, product_name, variant_label, unit_price, quantity
        FROM shop.order_item
        WHERE order_id = $1
        ORDER BY id
        ",
    )
    .bind(order_id)
    .fetch_all(conn)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

// =============================================================================
// Repository
// =============================================================================

/// Checkout input.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub address_id: AddressId,
    pub coupon_code: Option<String>,
}

/// Repository for customer orders.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List one page of the customer's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_for_customer(
        &self,
        customer_id: CustomerId,
        page: PageRequest,
    ) -> Result<(Vec<OrderSummary>, i64), RepositoryError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM shop.orders WHERE customer_id = $1")
            .bind(customer_id)
            .fetch_one(self.pool)
            .await?;

        let rows = sqlx::query_as::<_, OrderSummaryRow>(
            r"
            SELECT o.id, o.status, o.total, o.created_at,
                   COALESCE((SELECT SUM(oi.quantity) FROM shop.order_item oi
                             WHERE oi.order_id = o.id), 0)::BIGINT AS item_count
            FROM shop.orders o
            WHERE o.customer_id = $1
            ORDER BY o.created_at DESC, o.id DESC
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(customer_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let orders = rows
            .into_iter()
            .map(|row| OrderSummary {
                id: OrderId::new(row.id),
                status: row.status,
                total: row.total,
                item_count: row.item_count,
                created_at: row.created_at,
            })
            .collect();

        Ok((orders, total))
    }

    /// Get one of the customer's orders with its items.
    ///
    /// Orders of other customers are reported as absent.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_for_customer(
        &self,
        customer_id: CustomerId,
        id: OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;

        let Some(row) = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.orders WHERE id = $1 AND customer_id = $2"
        ))
        .bind(id)
        .bind(customer_id)
        .fetch_optional(&mut *conn)
        .await?
        else {
            return Ok(None);
        };

        let items = fetch_items(&mut conn, row.id).await?;
        Ok(Some(row.into_order(items)))
    }

    /// Place an order from the customer's cart.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError`] describing why the order could not be placed;
    /// nothing is written in that case.
    pub async fn checkout(
        &self,
        customer_id: CustomerId,
        request: &CheckoutRequest,
        shipping: &ShippingConfig,
    ) -> Result<Order, CheckoutError> {
        let mut tx = self.pool.begin().await?;

        let address = addresses::fetch_owned(&mut tx, customer_id, request.address_id)
            .await?
            .ok_or(CheckoutError::AddressNotFound)?;

        // Variant order keeps lock acquisition consistent across checkouts
        let lines = sqlx::query_as::<_, CheckoutLineRow>(
            r"
            SELECT ci.variant_id, ci.quantity, v.sku, v.size, v.color, v.material, v.price,
                   p.name AS product_name, p.is_active
            FROM shop.cart c
            JOIN shop.cart_item ci ON ci.cart_id = c.id
            JOIN shop.product_variant v ON v.id = ci.variant_id
            JOIN shop.product p ON p.id = v.product_id
            WHERE c.customer_id = $1
            ORDER BY ci.variant_id
            FOR UPDATE OF ci
            ",
        )
        .bind(customer_id)
        .fetch_all(&mut *tx)
        .await?;

        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        for line in &lines {
            if !line.is_active {
                return Err(CheckoutError::Unavailable {
                    name: line.product_name.clone(),
                });
            }

            let updated = sqlx::query(
                r"
                UPDATE shop.product_variant
                SET inventory = inventory - $2, updated_at = NOW()
                WHERE id = $1 AND inventory >= $2
                ",
            )
            .bind(line.variant_id)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                return Err(CheckoutError::InsufficientStock {
                    sku: line.sku.clone(),
                });
            }
        }

        let subtotal: Money = lines.iter().map(|l| l.price.times(l.quantity)).sum();

        let (quote, coupon_id) = match request.coupon_code.as_deref() {
            Some(code) => {
                let coupon = coupons::lock_by_code(&mut tx, code)
                    .await?
                    .ok_or(CheckoutError::CouponNotFound)?;
                let quote = Quote::with_coupon(subtotal, shipping, &coupon, Utc::now())?;
                if !coupons::redeem(&mut tx, coupon.id).await? {
                    return Err(CouponError::UsageLimitReached.into());
                }
                (quote, Some(coupon.id))
            }
            None => (Quote::compute(subtotal, shipping, None), None),
        };

        let snapshot = ShippingAddress::from(&address);
        let order = sqlx::query_as::<_, OrderRow>(&format!(
            "INSERT INTO shop.orders \
                 (customer_id, status, subtotal, discount, shipping, total, coupon_id, \
                  ship_full_name, ship_line1, ship_line2, ship_city, ship_state, \
                  ship_postal_code, ship_country, ship_phone) \
             VALUES ($1, 'pending', $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(customer_id)
        .bind(quote.subtotal)
        .bind(quote.discount)
        .bind(quote.shipping)
        .bind(quote.total)
        .bind(coupon_id)
        .bind(&snapshot.full_name)
        .bind(&snapshot.line1)
        .bind(snapshot.line2.as_deref())
        .bind(&snapshot.city)
        .bind(&snapshot.state)
        .bind(&snapshot.postal_code)
        .bind(&snapshot.country)
        .bind(snapshot.phone.as_deref())
        .fetch_one(&mut *tx)
        .await?;

        for line in &lines {
            sqlx::query(
                r"
                INSERT INTO shop.order_item
                    (order_id, variant_id, product_name, variant_label, unit_price, quantity)
                VALUES ($1, $2, $3, $4, $5, $6)
                ",
            )
            .bind(order.id)
            .bind(line.variant_id)
            .bind(&line.product_name)
            .bind(variant_label(
                line.size.as_deref(),
                line.color.as_deref(),
                line.material.as_deref(),
                &line.sku,
            ))
            .bind(line.price)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;
        }

        carts::clear_cart(&mut tx, customer_id).await?;

        let items = fetch_items(&mut tx, order.id).await?;
        tx.commit().await?;

        tracing::info!(
            order_id = order.id,
            customer_id = %customer_id,
            total = %quote.total,
            "Order placed"
        );

        Ok(order.into_order(items))
    }
}
