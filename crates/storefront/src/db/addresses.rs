//! Address repository.
//!
//! A customer has at most one default address (enforced by a partial unique
//! index). Every write that makes an address the default clears the previous
//! default in the same transaction.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use storehouse_core::{AddressId, CustomerId};

use super::RepositoryError;
use crate::models::{Address, AddressInput};

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct AddressRow {
    id: i32,
    customer_id: i32,
    full_name: String,
    line1: String,
    line2: Option<String>,
    city: String,
    state: String,
    postal_code: String,
    country: String,
    phone: Option<String>,
    is_default: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AddressRow> for Address {
    fn from(row: AddressRow) -> Self {
        Self {
            id: AddressId::new(row.id),
            customer_id: CustomerId::new(row.customer_id),
            full_name: row.full_name,
            line1: row.line1,
            line2: row.line2,
            city: row.city,
            state: row.state,
            postal_code: row.postal_code,
            country: row.country,
            phone: row.phone,
            is_default: row.is_default,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const ADDRESS_COLUMNS: &str = "id, customer_id, full_name, line1, line2, city, state, \
     postal_code, country, phone, is_default, created_at, updated_at";

/// Fetch one of the customer's addresses on an open connection.
pub(crate) async fn fetch_owned(
    conn: &mut PgConnection,
    customer_id: CustomerId,
    id: AddressId,
) -> Result<Option<Address>, RepositoryError> {
    let row = sqlx::query_as::<_, AddressRow>(&format!(
        "SELECT {ADDRESS_COLUMNS} FROM shop.address WHERE id = $1 AND customer_id = $2"
    ))
    .bind(id)
    .bind(customer_id)
    .fetch_optional(conn)
    .await?;

    Ok(row.map(Into::into))
}

async fn clear_default(
    conn: &mut PgConnection,
    customer_id: CustomerId,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "UPDATE shop.address SET is_default = FALSE, updated_at = NOW() \
         WHERE customer_id = $1 AND is_default",
    )
    .bind(customer_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Repository for customer addresses.
pub struct AddressRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AddressRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List the customer's addresses, default first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, customer_id: CustomerId) -> Result<Vec<Address>, RepositoryError> {
        let rows = sqlx::query_as::<_, AddressRow>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM shop.address WHERE customer_id = $1 \
             ORDER BY is_default DESC, created_at DESC, id DESC"
        ))
        .bind(customer_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get one of the customer's addresses.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        customer_id: CustomerId,
        id: AddressId,
    ) -> Result<Option<Address>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch_owned(&mut conn, customer_id, id).await
    }

    /// Create an address. The customer's first address becomes the default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(
        &self,
        customer_id: CustomerId,
        input: &AddressInput,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Serializes concurrent "first address" inserts for one customer
        sqlx::query("SELECT id FROM shop.customer WHERE id = $1 FOR UPDATE")
            .bind(customer_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        let has_any: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM shop.address WHERE customer_id = $1)")
                .bind(customer_id)
                .fetch_one(&mut *tx)
                .await?;

        let is_default = input.is_default || !has_any;
        if is_default {
            clear_default(&mut tx, customer_id).await?;
        }

        let row = sqlx::query_as::<_, AddressRow>(&format!(
            "INSERT INTO shop.address \
                 (customer_id, full_name, line1, line2, city, state, postal_code, country, phone, is_default) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {ADDRESS_COLUMNS}"
        ))
        .bind(customer_id)
        .bind(&input.full_name)
        .bind(&input.line1)
        .bind(input.line2.as_deref())
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.postal_code)
        .bind(&input.country)
        .bind(input.phone.as_deref())
        .bind(is_default)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    /// Replace an address's fields.
    ///
    /// `is_default = true` moves the default here; `false` never unsets the
    /// current default, so a customer with addresses always has one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address does not belong to the customer.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn update(
        &self,
        customer_id: CustomerId,
        id: AddressId,
        input: &AddressInput,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        fetch_owned(&mut tx, customer_id, id)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        if input.is_default {
            clear_default(&mut tx, customer_id).await?;
        }

        let row = sqlx::query_as::<_, AddressRow>(&format!(
            "UPDATE shop.address \
             SET full_name = $3, line1 = $4, line2 = $5, city = $6, state = $7, \
                 postal_code = $8, country = $9, phone = $10, \
                 is_default = is_default OR $11, updated_at = NOW() \
             WHERE id = $1 AND customer_id = $2 \
             RETURNING {ADDRESS_COLUMNS}"
        ))
        .bind(id)
        .bind(customer_id)
        .bind(&input.full_name)
        .bind(&input.line1)
        .bind(input.line2.as_deref())
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.postal_code)
        .bind(&input.country)
        .bind(input.phone.as_deref())
        .bind(input.is_default)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    /// Make an address the customer's default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address does not belong to the customer.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_default(
        &self,
        customer_id: CustomerId,
        id: AddressId,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        fetch_owned(&mut tx, customer_id, id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        clear_default(&mut tx, customer_id).await?;

        let row = sqlx::query_as::<_, AddressRow>(&format!(
            "UPDATE shop.address SET is_default = TRUE, updated_at = NOW() \
             WHERE id = $1 RETURNING {ADDRESS_COLUMNS}"
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    /// Delete an address. If it was the default, the most recently created
    /// remaining address takes over.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address does not belong to the customer.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, customer_id: CustomerId, id: AddressId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let was_default: bool = sqlx::query_scalar(
            "DELETE FROM shop.address WHERE id = $1 AND customer_id = $2 RETURNING is_default",
        )
        .bind(id)
        .bind(customer_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        if was_default {
            sqlx::query(
                "UPDATE shop.address SET is_default = TRUE, updated_at = NOW() \
                 WHERE id = (SELECT id FROM shop.address WHERE customer_id = $1 \
                             ORDER BY created_at DESC, id DESC LIMIT 1)",
            )
            .bind(customer_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
