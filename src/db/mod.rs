//! PostgreSQL pool, schema migrations and the booking schema probe

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use crate::config::Config;

/// Exclusion constraint that keeps live bookings of a property from overlapping
pub const OVERLAP_CONSTRAINT: &str = "bookings_no_overlap";

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Failed to connect to database: {0}")]
    ConnectionError(String),

    #[error("Failed to run migrations: {0}")]
    MigrationError(String),

    #[error("Database unreachable: {0}")]
    Unreachable(String),

    #[error("Booking schema is missing constraint {0}")]
    MissingConstraint(&'static str),
}

impl DbError {
    /// Short status for the health endpoint
    pub fn health_label(&self) -> &'static str {
        match self {
            DbError::MissingConstraint(_) => "schema incomplete",
            _ => "unreachable",
        }
    }
}

pub async fn create_pool(config: &Config) -> Result<PgPool, DbError> {
    tracing::info!("Connecting to booking database at {}", config.database_url_masked());

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .connect(&config.database_url)
        .await
        .map_err(|e| DbError::ConnectionError(e.to_string()))?;

    Ok(pool)
}

/// Apply the embedded migrations (enums, tables and the overlap constraint)
pub async fn run_migrations(pool: &PgPool) -> Result<(), DbError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| DbError::MigrationError(e.to_string()))?;

    tracing::info!(constraint = OVERLAP_CONSTRAINT, "Booking schema is up to date");
    Ok(())
}

/// Confirm the database answers and still enforces non-overlapping stays.
/// Without the constraint two concurrent reservations could both succeed.
pub async fn check_health(pool: &PgPool) -> Result<(), DbError> {
    let guarded: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM pg_constraint
            WHERE conname = $1 AND contype = 'x'
        )
        "#,
    )
    .bind(OVERLAP_CONSTRAINT)
    .fetch_one(pool)
    .await
    .map_err(|e| DbError::Unreachable(e.to_string()))?;

    if !guarded {
        return Err(DbError::MissingConstraint(OVERLAP_CONSTRAINT));
    }
    Ok(())
}
