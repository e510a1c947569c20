//! # Financify DB
//!
//! PostgreSQL pool construction, readiness probing and embedded migrations.
//!
//! # Example
//!
//! ```ignore
//! use financify_config::DatabaseConfig;
//! use financify_db::{init_db_pool, migrate, status_check};
//!
//! let pool = init_db_pool(&DatabaseConfig::from_env())?;
//! migrate(&pool).await?;
//! status_check(&pool).await?;
//! ```

use std::time::Duration;

use financify_config::DatabaseConfig;
use sqlx::migrate::{MigrateError, Migrator};
use sqlx::postgres::PgPoolOptions;
use tracing::info;

// Re-export PgPool for convenience
pub use sqlx::PgPool;

/// Migrations under the workspace `migrations/` directory, embedded at compile time.
pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Builds a lazily connecting pool.
///
/// No connection is opened until the first query, so the service can start
/// while the database is still coming up; the readiness endpoint reports
/// when it becomes reachable.
///
/// # Errors
///
/// Returns an error if `config.url` is not a valid connection string.
pub fn init_db_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect_lazy(&config.url)
}

/// Round-trips a trivial query to prove the database is reachable.
pub async fn status_check(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, bool>("SELECT true")
        .fetch_one(pool)
        .await
        .map(|_| ())
}

/// Applies every pending migration.
pub async fn migrate(pool: &PgPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await?;
    info!("Database migrations applied");
    Ok(())
}
