//! Customer account administration.
//!
//! Accounts are created by identity-provider webhooks; staff can only
//! inspect them, change their role, or delete them.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;

use storehouse_core::{CustomerId, CustomerRole, Email, Money, PageRequest};

use super::{RepositoryError, like_pattern, orders};
use crate::models::{Customer, CustomerDetail, CustomerSummary};

/// Orders shown on the user detail view.
const RECENT_ORDER_COUNT: i64 = 5;

/// Query-string filters for the user list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserFilter {
    /// Substring of email, first name or last name.
    pub search: Option<String>,
    pub role: Option<CustomerRole>,
}

impl UserFilter {
    fn search_pattern(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(like_pattern)
    }
}

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

#[derive(Debug, sqlx::FromRow)]
struct CustomerStatsRow {
    #[sqlx(flatten)]
    customer: CustomerRow,
    order_count: i64,
    total_spent: Money,
}

const CUSTOMER_COLUMNS: &str = "c.id, c.external_id, c.email, c.first_name, c.last_name, \
     c.image_url, c.role, c.created_at, c.updated_at";

// Search and role predicates; $1 pattern, $2 role.
const USER_FILTER: &str = r"
    ($1::TEXT IS NULL
        OR c.email ILIKE $1
        OR c.first_name ILIKE $1
        OR c.last_name ILIKE $1
        OR CONCAT_WS(' ', c.first_name, c.last_name) ILIKE $1)
    AND ($2::shop.customer_role IS NULL OR c.role = $2)
";

// =============================================================================
// Repository
// =============================================================================

/// Repository for customer account administration.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Look up a customer by identity-provider user ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored email is invalid.
    pub async fn get_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM shop.customer c WHERE c.external_id = $1"
        ))
        .bind(external_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// List one page of customers, newest first, with their order counts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored email is invalid.
    pub async fn list(
        &self,
        filter: &UserFilter,
        page: PageRequest,
    ) -> Result<(Vec<CustomerSummary>, i64), RepositoryError> {
        let pattern = filter.search_pattern();

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM shop.customer c WHERE {USER_FILTER}"
        ))
        .bind(pattern.as_deref())
        .bind(filter.role)
        .fetch_one(self.pool)
        .await?;

        let rows = sqlx::query_as::<_, CustomerStatsRow>(&format!(
            r"
            SELECT {CUSTOMER_COLUMNS},
                   COUNT(o.id) AS order_count,
                   COALESCE(SUM(o.total) FILTER (WHERE o.status <> 'cancelled'), 0) AS total_spent
            FROM shop.customer c
            LEFT JOIN shop.orders o ON o.customer_id = c.id
            WHERE {USER_FILTER}
            GROUP BY c.id
            ORDER BY c.created_at DESC, c.id DESC
            LIMIT $3 OFFSET $4
            "
        ))
        .bind(pattern.as_deref())
        .bind(filter.role)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let customers = rows
            .into_iter()
            .map(|row| {
                Ok(CustomerSummary {
                    customer: row.customer.try_into()?,
                    order_count: row.order_count,
                })
            })
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        Ok((customers, total))
    }

    /// Get a customer with order statistics and recent orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored email is invalid.
    pub async fn get(&self, id: CustomerId) -> Result<Option<CustomerDetail>, RepositoryError> {
        let row = sqlx::query_as::<_, CustomerStatsRow>(&format!(
            r"
            SELECT {CUSTOMER_COLUMNS},
                   COUNT(o.id) AS order_count,
                   COALESCE(SUM(o.total) FILTER (WHERE o.status <> 'cancelled'), 0) AS total_spent
            FROM shop.customer c
            LEFT JOIN shop.orders o ON o.customer_id = c.id
            WHERE c.id = $1
            GROUP BY c.id
            "
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let recent_orders = orders::recent(self.pool, Some(id), RECENT_ORDER_COUNT).await?;

        Ok(Some(CustomerDetail {
            customer: row.customer.try_into()?,
            order_count: row.order_count,
            total_spent: row.total_spent,
            recent_orders,
        }))
    }

    /// Change a customer's role.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored email is invalid.
    pub async fn set_role(
        &self,
        id: CustomerId,
        role: CustomerRole,
    ) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query_as::<_, CustomerRow>(&format!(
            r"
            UPDATE shop.customer c SET role = $2, updated_at = NOW()
            WHERE c.id = $1
            RETURNING {CUSTOMER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(role)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Delete a customer and everything that cascades from it.
    ///
    /// Returns `false` if the customer did not exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: CustomerId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.customer WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_search_is_ignored() {
        let filter = UserFilter {
            search: Some("   ".to_string()),
            role: None,
        };
        assert_eq!(filter.search_pattern(), None);

        let filter = UserFilter {
            search: Some(" jane ".to_string()),
            role: Some(CustomerRole::Admin),
        };
        assert_eq!(filter.search_pattern().as_deref(), Some("%jane%"));
    }
}
