//! Customer repository.
//!
//! Customer rows are created and kept in sync by identity-provider webhooks;
//! request handlers only look them up by the session token's subject.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use storehouse_core::{CustomerId, CustomerRole, Email};

use super::RepositoryError;
use crate::models::Customer;

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: i32,
    external_id: String,
    email: String,
    first_name: Option<String>,
    last_name: Option<String>,
    image_url: Option<String>,
    role: CustomerRole,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = RepositoryError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: CustomerId::new(row.id),
            external_id: row.external_id,
            email,
            first_name: row.first_name,
            last_name: row.last_name,
            image_url: row.image_url,
            role: row.role,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Profile fields the identity provider owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerProfile {
    pub external_id: String,
    pub email: Email,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub image_url: Option<String>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for customer database operations.
pub struct CustomerRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CustomerRepository<'a> {
    /// Create a new customer repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a customer by identity-provider user ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the data is invalid.
    pub async fn get_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query_as::<_, CustomerRow>(
            r"
            SELECT id, external_id, email, first_name, last_name, image_url,
                   role, created_at, updated_at
            FROM shop.customer
            WHERE external_id = $1
            ",
        )
        .bind(external_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Create a customer from an identity-provider profile.
    ///
    /// Idempotent on `external_id`: a redelivered "user created" event
    /// refreshes the existing row instead of failing. Returns the customer and
    /// whether the row was newly inserted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if another customer already uses the email.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create_from_profile(
        &self,
        profile: &CustomerProfile,
    ) -> Result<(Customer, bool), RepositoryError> {
        #[derive(sqlx::FromRow)]
        struct Inserted {
            #[sqlx(flatten)]
            customer: CustomerRow,
            inserted: bool,
        }

        let row = sqlx::query_as::<_, Inserted>(
            r"
            INSERT INTO shop.customer (external_id, email, first_name, last_name, image_url)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (external_id) DO UPDATE
                SET email = EXCLUDED.email,
                    first_name = EXCLUDED.first_name,
                    last_name = EXCLUDED.last_name,
                    image_url = EXCLUDED.image_url,
                    updated_at = NOW()
            RETURNING id, external_id, email, first_name, last_name, image_url,
                      role, created_at, updated_at, (xmax = 0) AS inserted
            ",
        )
        .bind(&profile.external_id)
        .bind(profile.email.as_str())
        .bind(profile.first_name.as_deref())
        .bind(profile.last_name.as_deref())
        .bind(profile.image_url.as_deref())
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "email already in use"))?;

        Ok((row.customer.try_into()?, row.inserted))
    }

    /// Update profile fields of an existing customer.
    ///
    /// Returns `None` if no customer has this external ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if another customer already uses the email.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn update_profile(
        &self,
        profile: &CustomerProfile,
    ) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query_as::<_, CustomerRow>(
            r"
            UPDATE shop.customer
            SET email = $2, first_name = $3, last_name = $4, image_url = $5, updated_at = NOW()
            WHERE external_id = $1
            RETURNING id, external_id, email, first_name, last_name, image_url,
                      role, created_at, updated_at
            ",
        )
        .bind(&profile.external_id)
        .bind(profile.email.as_str())
        .bind(profile.first_name.as_deref())
        .bind(profile.last_name.as_deref())
        .bind(profile.image_url.as_deref())
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "email already in use"))?;

        row.map(TryInto::try_into).transpose()
    }

    /// Delete a customer and, by cascade, their cart, favorites, addresses
    /// and orders.
    ///
    /// Returns `true` if a row was deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete_by_external_id(&self, external_id: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.customer WHERE external_id = $1")
            .bind(external_id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
