//! Flat-file pre-import store.
//!
//! Each input file gets a companion SQLite database next to it holding one row
//! per input entry. A row's `cdx_data` stays NULL until its catalog has been
//! fetched, so an interrupted run picks up exactly where it stopped.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde_json::json;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use crate::constants::{ALREADY_KNOWN_NOTE, HARVESTER_USER_AGENT};
use crate::error::Error;
use crate::ingest::InputEntry;
use crate::wayback::{CatalogQuery, WaybackClient};

/// A row of the pre-import `urls` table.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PreimportRow {
    pub id: i64,
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub page_number: i64,
    pub cdx_data: Option<String>,
}

/// Companion database of an input file.
#[derive(Debug, Clone)]
pub struct PreimportStore {
    pool: SqlitePool,
}

impl PreimportStore {
    /// Location of the store for `input`: same directory and stem, `.db` extension.
    #[must_use]
    pub fn path_for(input: &Path) -> PathBuf {
        input.with_extension("db")
    }

    /// Open (creating if missing) the store at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub async fn open(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open pre-import store at {}", path.display()))?;

        Ok(Self { pool })
    }

    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Create the `urls` table and load `entries` into it.
    ///
    /// Does nothing if the table already exists, so re-running an input file
    /// never duplicates rows. Returns whether the table was created.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema or inserts fail.
    pub async fn initialize(&self, entries: &[InputEntry]) -> Result<bool> {
        let exists: Option<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'urls'")
                .fetch_optional(&self.pool)
                .await
                .context("Failed to inspect pre-import schema")?;

        if exists.is_some() {
            debug!("Pre-import table already present, keeping existing rows");
            return Ok(false);
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            CREATE TABLE urls (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL,
                title TEXT,
                description TEXT,
                category TEXT,
                page_number INTEGER DEFAULT 0,
                cdx_data TEXT
            )
            ",
        )
        .execute(&mut *tx)
        .await
        .context("Failed to create pre-import urls table")?;

        for entry in entries {
            sqlx::query(
                r"
                INSERT INTO urls (url, title, description, category, page_number)
                VALUES (?, ?, ?, ?, ?)
                ",
            )
            .bind(&entry.url)
            .bind(&entry.title)
            .bind(&entry.description)
            .bind(&entry.category)
            .bind(entry.page_number.unwrap_or(0))
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to insert {}", entry.url))?;
        }

        tx.commit().await?;
        info!(rows = entries.len(), "Pre-import store seeded");
        Ok(true)
    }

    /// Rows whose catalog has not been fetched yet, in id order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn pending(&self) -> Result<Vec<PreimportRow>> {
        sqlx::query_as("SELECT * FROM urls WHERE cdx_data IS NULL ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch pending pre-import rows")
    }

    /// Load one row.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get(&self, id: i64) -> Result<Option<PreimportRow>> {
        sqlx::query_as("SELECT * FROM urls WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch pre-import row")
    }

    /// Store the serialized catalog for a row.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn set_cdx_data(&self, id: i64, cdx_data: &str) -> Result<()> {
        sqlx::query("UPDATE urls SET cdx_data = ? WHERE id = ?")
            .bind(cdx_data)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to store cdx_data")?;
        Ok(())
    }
}

/// Asks an external service whether a URL has already been imported.
///
/// The service answers `HEAD <base>/redirect/<percent-encoded url>` with 404
/// for unknown URLs and a success status for known ones.
#[derive(Debug, Clone)]
pub struct KnownUrlChecker {
    http: Client,
    base_url: String,
}

impl KnownUrlChecker {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(HARVESTER_USER_AGENT)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// # Errors
    ///
    /// Returns [`Error::Upstream`] for any status other than 404 or success.
    pub async fn is_known(&self, url: &str) -> Result<bool, Error> {
        let check_url = format!("{}/redirect/{}", self.base_url, urlencoding::encode(url));
        let response = self.http.head(&check_url).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if status.is_success() || status.is_redirection() {
            return Ok(true);
        }
        Err(Error::Upstream {
            status: status.as_u16(),
            url: check_url,
        })
    }
}

/// Counters for one pre-import pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreimportSummary {
    pub fetched: usize,
    pub skipped_known: usize,
}

/// Fill in `cdx_data` for every pending row.
///
/// Each row is written as soon as its catalog arrives. The first failure
/// stops the pass; completed rows are kept and skipped on the next run.
///
/// # Errors
///
/// Returns an error if a known-URL check, catalog fetch or update fails.
pub async fn run_preimport(
    store: &PreimportStore,
    client: &WaybackClient,
    query: &CatalogQuery,
    known: Option<&KnownUrlChecker>,
) -> Result<PreimportSummary> {
    let rows = store.pending().await?;
    info!(pending = rows.len(), "Rows needing cdx_data");

    let mut summary = PreimportSummary::default();

    for row in rows {
        let already_known = match known {
            Some(checker) => checker
                .is_known(&row.url)
                .await
                .with_context(|| format!("Known-URL check failed for {}", row.url))?,
            None => false,
        };

        let cdx_data = if already_known {
            debug!(url = %row.url, "URL already known, skipping catalog fetch");
            summary.skipped_known += 1;
            json!([{ "note": ALREADY_KNOWN_NOTE }]).to_string()
        } else {
            let records = client
                .fetch_catalog(&row.url, query)
                .await
                .with_context(|| format!("Failed to fetch catalog for {}", row.url))?;
            summary.fetched += 1;
            serde_json::to_string(&records)?
        };

        store.set_cdx_data(row.id, &cdx_data).await?;
    }

    info!(
        fetched = summary.fetched,
        skipped_known = summary.skipped_known,
        "Pre-import pass complete"
    );
    Ok(summary)
}
