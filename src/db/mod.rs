//! Database module

pub mod queries;
pub mod store;

pub use store::{ImportStore, PgImportStore};

use anyhow::{Context, Result};
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Create a database connection pool
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("Failed to connect to PostgreSQL")?;

    Ok(pool)
}

/// Run database migrations.
///
/// Stored checksums that differ from the embedded ones (line-ending changes
/// between checkouts) are rewritten first so `run` does not refuse to start.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    info!("Running database migrations...");

    realign_checksums(pool).await?;
    MIGRATOR.run(pool).await?;

    info!("Database migrations complete");
    Ok(())
}

async fn realign_checksums(pool: &PgPool) -> Result<()> {
    let table_exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM information_schema.tables WHERE table_name = '_sqlx_migrations')",
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(());
    }

    for migration in MIGRATOR.iter().filter(|m| !m.migration_type.is_down_migration()) {
        let stored: Option<(Vec<u8>,)> = sqlx::query_as("SELECT checksum FROM _sqlx_migrations WHERE version = $1")
            .bind(migration.version)
            .fetch_optional(pool)
            .await?;

        let embedded: &[u8] = &migration.checksum;
        if let Some((checksum,)) = stored {
            if checksum != embedded {
                warn!(
                    "Migration {} ({}) checksum changed, updating stored value",
                    migration.version, migration.description
                );
                sqlx::query("UPDATE _sqlx_migrations SET checksum = $1 WHERE version = $2")
                    .bind(embedded)
                    .bind(migration.version)
                    .execute(pool)
                    .await?;
            }
        }
    }

    Ok(())
}
