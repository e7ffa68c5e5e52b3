//! Persistence gateway: URL entries, lot associations and snapshot catalogs.

mod migrations;
mod models;
mod queries;

pub use models::*;
pub use queries::*;

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

/// Handle to the gateway database.
///
/// Obtained from [`Database::open`] and released with [`Database::close`];
/// [`with_database`] pairs the two around a unit of work.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if missing) the database at `path`, running migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails or migrations fail.
    pub async fn open(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(10));

        // A single writer is assumed; one connection keeps writes strictly ordered.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open SQLite database at {}", path.display()))?;

        let db = Self { pool };
        db.run_migrations().await?;

        debug!(path = %path.display(), "Database opened");
        Ok(db)
    }

    /// Close the connection pool, waiting for in-flight queries to finish.
    pub async fn close(self) {
        self.pool.close().await;
        debug!("Database closed");
    }

    /// Run all pending migrations.
    async fn run_migrations(&self) -> Result<()> {
        migrations::run(&self.pool).await?;
        info!("Database migrations complete");
        Ok(())
    }

    /// Get a reference to the connection pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Open the database, run `work` with it, and close it on every exit path.
///
/// # Errors
///
/// Returns an error if the database cannot be opened, or the error of `work`.
pub async fn with_database<F, Fut, T>(path: &Path, work: F) -> Result<T>
where
    F: FnOnce(Database) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let db = Database::open(path).await?;
    let result = work(db.clone()).await;
    db.close().await;
    result
}
