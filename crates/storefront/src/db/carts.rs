//! Cart repository.
//!
//! Each customer has at most one cart, created lazily on the first add. Adding
//! a variant that is already in the cart accumulates its quantity; the cart
//! upsert and the line upsert run in one transaction.

use sqlx::{PgConnection, PgPool};

use storehouse_core::{CartId, CartItemId, CustomerId, Money, ProductId, VariantId};

use super::RepositoryError;
use crate::models::catalog::variant_label;
use crate::models::{Cart, CartLine};

#[derive(Debug, sqlx::FromRow)]
struct CartLineRow {
    id: i32,
    variant_id: i32,
    product_id: i32,
    product_name: String,
    product_slug: String,
    image_url: Option<String>,
    sku: String,
    size: Option<String>,
    color: Option<String>,
    material: Option<String>,
    price: Money,
    quantity: i32,
    inventory: i32,
    available: bool,
}

impl From<CartLineRow> for CartLine {
    fn from(row: CartLineRow) -> Self {
        Self {
            id: CartItemId::new(row.id),
            variant_id: VariantId::new(row.variant_id),
            product_id: ProductId::new(row.product_id),
            variant_label: variant_label(
                row.size.as_deref(),
                row.color.as_deref(),
                row.material.as_deref(),
                &row.sku,
            ),
            product_name: row.product_name,
            product_slug: row.product_slug,
            image_url: row.image_url,
            sku: row.sku,
            unit_price: row.price,
            quantity: row.quantity,
            line_total: row.price.times(row.quantity),
            inventory: row.inventory,
            available: row.available,
        }
    }
}

/// Load the customer's cart on an open connection.
pub(crate) async fn fetch_cart(
    conn: &mut PgConnection,
    customer_id: CustomerId,
) -> Result<Cart, RepositoryError> {
    let Some(cart_id) = sqlx::query_scalar::<_, i32>("SELECT id FROM shop.cart WHERE customer_id = $1")
        .bind(customer_id)
        .fetch_optional(&mut *conn)
        .await?
    else {
        return Ok(Cart::empty());
    };

    let rows = sqlx::query_as::<_, CartLineRow>(
        r"
        SELECT ci.id, ci.variant_id, p.id AS product_id, p.name AS product_name,
               p.slug AS product_slug, p.image_url, v.sku, v.size, v.color, v.material,
               v.price, ci.quantity, v.inventory, p.is_active AS available
        FROM shop.cart_item ci
        JOIN shop.product_variant v ON v.id = ci.variant_id
        JOIN shop.product p ON p.id = v.product_id
        WHERE ci.cart_id = $1
        ORDER BY ci.created_at, ci.id
        ",
    )
    .bind(cart_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Cart::from_lines(
        CartId::new(cart_id),
        rows.into_iter().map(Into::into).collect(),
    ))
}

/// Repository for cart operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get the customer's cart (empty if they have none yet).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get(&self, customer_id: CustomerId) -> Result<Cart, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch_cart(&mut conn, customer_id).await
    }

    /// Add `quantity` of a variant to the customer's cart.
    ///
    /// Creates the cart if needed. If the variant is already in the cart the
    /// quantities are summed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the variant does not exist or its product is inactive.
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn add_item(
        &self,
        customer_id: CustomerId,
        variant_id: VariantId,
        quantity: i32,
    ) -> Result<Cart, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let purchasable: Option<bool> = sqlx::query_scalar(
            r"
            SELECT p.is_active
            FROM shop.product_variant v
            JOIN shop.product p ON p.id = v.product_id
            WHERE v.id = $1
            ",
        )
        .bind(variant_id)
        .fetch_optional(&mut *tx)
        .await?;
        if purchasable != Some(true) {
            return Err(RepositoryError::NotFound);
        }

        let cart_id: i32 = sqlx::query_scalar(
            r"
            INSERT INTO shop.cart (customer_id)
            VALUES ($1)
            ON CONFLICT (customer_id) DO UPDATE SET updated_at = NOW()
            RETURNING id
            ",
        )
        .bind(customer_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r"
            INSERT INTO shop.cart_item (cart_id, variant_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (cart_id, variant_id) DO UPDATE
                SET quantity = shop.cart_item.quantity + EXCLUDED.quantity,
                    updated_at = NOW()
            ",
        )
        .bind(cart_id)
        .bind(variant_id)
        .bind(quantity)
        .execute(&mut *tx)
        .await?;

        let cart = fetch_cart(&mut tx, customer_id).await?;
        tx.commit().await?;
        Ok(cart)
    }

    /// Set the quantity of a cart line; zero removes it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line is not in the customer's cart.
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn set_quantity(
        &self,
        customer_id: CustomerId,
        item_id: CartItemId,
        quantity: i32,
    ) -> Result<Cart, RepositoryError> {
        if quantity == 0 {
            return self.remove_item(customer_id, item_id).await;
        }

        let result = sqlx::query(
            r"
            UPDATE shop.cart_item ci
            SET quantity = $3, updated_at = NOW()
            FROM shop.cart c
            WHERE ci.id = $1 AND ci.cart_id = c.id AND c.customer_id = $2
            ",
        )
        .bind(item_id)
        .bind(customer_id)
        .bind(quantity)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get(customer_id).await
    }

    /// Remove a line from the customer's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line is not in the customer's cart.
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn remove_item(
        &self,
        customer_id: CustomerId,
        item_id: CartItemId,
    ) -> Result<Cart, RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM shop.cart_item ci
            USING shop.cart c
            WHERE ci.id = $1 AND ci.cart_id = c.id AND c.customer_id = $2
            ",
        )
        .bind(item_id)
        .bind(customer_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get(customer_id).await
    }

    /// Remove every line from the customer's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear(&self, customer_id: CustomerId) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        clear_cart(&mut conn, customer_id).await
    }
}

/// Delete all lines of the customer's cart on an open connection.
pub(crate) async fn clear_cart(
    conn: &mut PgConnection,
    customer_id: CustomerId,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        DELETE FROM shop.cart_item ci
        USING shop.cart c
        WHERE ci.cart_id = c.id AND c.customer_id = $1
        ",
    )
    .bind(customer_id)
    .execute(conn)
    .await?;
    Ok(())
}
