//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! checkout-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `CHECKOUT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! `crates/server/migrations/`

use secrecy::SecretString;

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run the document store migrations.
///
/// # Errors
///
/// Returns an error if the URL is unset, the database is unreachable, or a
/// migration fails.
pub async fn run() -> Result<(), MigrationError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("CHECKOUT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map_err(|_| MigrationError::MissingEnvVar("CHECKOUT_DATABASE_URL"))?;

    tracing::info!("Connecting to checkout database...");
    let pool = checkout_server::db::create_pool(&SecretString::from(database_url)).await?;

    tracing::info!("Running checkout migrations...");
    sqlx::migrate!("../server/migrations").run(&pool).await?;

    tracing::info!("Checkout migrations complete!");
    Ok(())
}
