//! SQLite pool construction and schema migrations.

use anyhow::{Context, Result};
use sqlx::{
    SqlitePool,
    migrate::Migrator,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::{path::Path, str::FromStr, sync::Arc, time::Duration};

/// Migrations under `./migrations`, embedded at build time.
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Open the pool for `database_url`, creating the database file and its
/// parent directory if they do not exist yet.
pub async fn connect(database_url: &str, acquire_timeout: Duration) -> Result<Arc<SqlitePool>> {
    // Extract the local file path SQLx will use
    let db_path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .trim_start_matches("file:");
    tracing::debug!("Interpreted SQLite path => {}", db_path);

    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }

    let options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("parsing database url `{}`", database_url))?
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(acquire_timeout)
        .connect_with(options)
        .await?;

    Ok(Arc::new(pool))
}

/// Apply pending migrations. Applied versions are tracked in
/// `_sqlx_migrations`, so this is safe on each startup.
pub async fn run_migrations(db: &SqlitePool) -> Result<()> {
    tracing::info!("Running {} migrations...", MIGRATOR.iter().count());
    MIGRATOR
        .run(db)
        .await
        .context("applying database migrations")?;
    Ok(())
}

/// Migrated in-memory database. One connection only: every SQLite
/// `:memory:` connection is a separate database.
#[cfg(test)]
pub async fn memory_pool() -> Arc<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("open in-memory sqlite");
    run_migrations(&pool).await.expect("migrate in-memory sqlite");
    Arc::new(pool)
}
