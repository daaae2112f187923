//! CLI subcommand implementations.

pub mod admin;
pub mod migrate;

use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Read `DATABASE_URL` (loading `.env` first) and open a small pool.
async fn connect() -> Result<PgPool, ConnectError> {
    let _ = dotenvy::dotenv();

    let database_url = std::env::var("DATABASE_URL")
        .map(SecretString::from)
        .map_err(|_| ConnectError::MissingDatabaseUrl)?;

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url.expose_secret())
        .await?;
    Ok(pool)
}

/// Failure to reach the database.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,

    #[error("Database connection failed: {0}")]
    Database(#[from] sqlx::Error),
}
