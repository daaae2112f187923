//! Admin role management.
//!
//! Accounts are created by the identity-provider webhook, so these commands
//! only flip the role of a customer that already exists.

use sqlx::PgPool;
use storehouse_core::{CustomerId, CustomerRole, Email};
use thiserror::Error;

use super::{ConnectError, connect};

#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("No account with email {0}; the user must sign up first")]
    NotFound(String),

    #[error("Refusing to revoke the last admin")]
    LastAdmin,
}

/// Grant the admin role to the account registered under `email`.
///
/// # Errors
///
/// Returns an error if the email is malformed, no account matches, or the
/// database is unreachable.
pub async fn grant(email: &str) -> Result<(), AdminError> {
    let email = parse_email(email)?;
    let pool = connect().await?;

    let id = set_role(&pool, &email, CustomerRole::Admin).await?;
    tracing::info!(customer_id = %id, email = %email.as_str(), "Admin role granted");
    Ok(())
}

/// Return the account registered under `email` to the customer role.
///
/// # Errors
///
/// Returns an error if no account matches, the account is the only admin
/// left, or the database is unreachable.
pub async fn revoke(email: &str) -> Result<(), AdminError> {
    let email = parse_email(email)?;
    let pool = connect().await?;

    let other_admins: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM shop.customer WHERE role = 'admin' AND LOWER(email) <> LOWER($1)",
    )
    .bind(email.as_str())
    .fetch_one(&pool)
    .await?;

    if other_admins == 0 {
        return Err(AdminError::LastAdmin);
    }

    let id = set_role(&pool, &email, CustomerRole::Customer).await?;
    tracing::info!(customer_id = %id, email = %email.as_str(), "Admin role revoked");
    Ok(())
}

/// Log every account holding the admin role.
///
/// # Errors
///
/// Returns an error if the database is unreachable.
pub async fn list() -> Result<(), AdminError> {
    let pool = connect().await?;

    let admins: Vec<(CustomerId, String)> = sqlx::query_as(
        "SELECT id, email FROM shop.customer WHERE role = 'admin' ORDER BY email",
    )
    .fetch_all(&pool)
    .await?;

    if admins.is_empty() {
        tracing::info!("No admins yet; grant one with `storehouse admin grant --email ...`");
    }
    for (id, email) in admins {
        tracing::info!(customer_id = %id, %email, "admin");
    }
    Ok(())
}

fn parse_email(raw: &str) -> Result<Email, AdminError> {
    Email::parse(raw).map_err(|_| AdminError::InvalidEmail(raw.to_string()))
}

async fn set_role(
    pool: &PgPool,
    email: &Email,
    role: CustomerRole,
) -> Result<CustomerId, AdminError> {
    sqlx::query_scalar(
        "UPDATE shop.customer SET role = $2, updated_at = NOW() \
         WHERE LOWER(email) = LOWER($1) RETURNING id",
    )
    .bind(email.as_str())
    .bind(role)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AdminError::NotFound(email.as_str().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_email_rejects_garbage() {
        assert!(matches!(
            parse_email("not-an-email"),
            Err(AdminError::InvalidEmail(_))
        ));
        assert!(parse_email("staff@example.com").is_ok());
    }

    #[test]
    fn test_not_found_message() {
        let err = AdminError::NotFound("a@b.co".to_string());
        assert_eq!(
            err.to_string(),
            "No account with email a@b.co; the user must sign up first"
        );
    }
}
