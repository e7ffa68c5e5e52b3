use sqlx::SqlitePool;
use tracing::{debug, info};

use super::models::{CatalogOutcome, LotInfo, LotRow, SnapshotCatalog, UpsertOutcome, UrlEntry};
use crate::constants::CAPTURE_RECORD_FIELDS;
use crate::error::{Error, Result};
use crate::normalize::canonical_url;
use crate::wayback::CaptureRecord;

fn canonical_or_reject(url: &str) -> Result<String> {
    let canonical = canonical_url(url);
    if canonical.is_empty() {
        return Err(Error::Validation(format!("URL is empty after canonicalization: '{url}'")));
    }
    Ok(canonical)
}

// ========== URLs ==========

/// Record that `url` was seen under `lot`.
///
/// Creates the entry on first sight, appends the lot when the URL is already
/// known under a different lot/path, and does nothing for a lot it already has.
///
/// # Errors
///
/// Returns [`Error::Validation`] for an empty URL or `lot_id`, or a database error.
pub async fn upsert_url(pool: &SqlitePool, url: &str, lot: &LotInfo) -> Result<UpsertOutcome> {
    let url = canonical_or_reject(url)?;
    let lot = lot.clone().normalized();
    if lot.lot_id.is_empty() {
        return Err(Error::Validation(format!("lot_id is empty for {url}")));
    }

    let mut tx = pool.begin().await?;

    let existing: Option<(i64,)> = sqlx::query_as("SELECT id FROM urls WHERE url = ?")
        .bind(&url)
        .fetch_optional(&mut *tx)
        .await?;

    let outcome = if let Some((url_id,)) = existing {
        let lots: Vec<LotRow> = sqlx::query_as(
            r"
            SELECT lot_id, site_title, site_desc, lot_path, lot_path_code, page_number
            FROM url_lots
            WHERE url_id = ? AND lot_id = ?
            ",
        )
        .bind(url_id)
        .bind(&lot.lot_id)
        .fetch_all(&mut *tx)
        .await?;

        if lots.into_iter().map(LotInfo::from).any(|l| l.same_lot(&lot)) {
            UpsertOutcome::Duplicate
        } else {
            insert_lot(&mut tx, url_id, &lot).await?;
            UpsertOutcome::Appended
        }
    } else {
        let result = sqlx::query("INSERT INTO urls (url) VALUES (?)")
            .bind(&url)
            .execute(&mut *tx)
            .await?;
        insert_lot(&mut tx, result.last_insert_rowid(), &lot).await?;
        UpsertOutcome::Created
    };

    tx.commit().await?;

    debug!(url = %url, lot_id = %lot.lot_id, outcome = outcome.as_str(), "Upserted URL");
    Ok(outcome)
}

async fn insert_lot(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    url_id: i64,
    lot: &LotInfo,
) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO url_lots (url_id, lot_id, site_title, site_desc, lot_path, lot_path_code, page_number)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ",
    )
    .bind(url_id)
    .bind(&lot.lot_id)
    .bind(&lot.site_title)
    .bind(&lot.site_desc)
    .bind(&lot.lot_path)
    .bind(&lot.lot_path_code)
    .bind(lot.page_number)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Load the entry for `url` (canonicalized) with its lots in insertion order.
pub async fn get_url_entry(pool: &SqlitePool, url: &str) -> Result<Option<UrlEntry>> {
    let url = canonical_url(url);
    let row: Option<(i64, String, String)> =
        sqlx::query_as("SELECT id, url, created_at FROM urls WHERE url = ?")
            .bind(&url)
            .fetch_optional(pool)
            .await?;

    let Some((id, url, created_at)) = row else {
        return Ok(None);
    };

    let lots: Vec<LotRow> = sqlx::query_as(
        r"
        SELECT lot_id, site_title, site_desc, lot_path, lot_path_code, page_number
        FROM url_lots
        WHERE url_id = ?
        ORDER BY id ASC
        ",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    Ok(Some(UrlEntry {
        id,
        url,
        created_at,
        in_lots: lots.into_iter().map(LotInfo::from).collect(),
    }))
}

/// Count stored URL entries.
pub async fn count_urls(pool: &SqlitePool) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM urls")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// URLs that have no stored snapshot catalog yet, oldest first.
pub async fn get_urls_missing_catalog(pool: &SqlitePool, limit: i64) -> Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        r"
        SELECT u.url
        FROM urls u
        LEFT JOIN url_snapshots s ON s.url = u.url
        WHERE s.id IS NULL
        ORDER BY u.id ASC
        LIMIT ?
        ",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(url,)| url).collect())
}

// ========== Snapshot catalogs ==========

/// Check that every snapshot is an object with all CDX record fields.
///
/// # Errors
///
/// Returns [`Error::Validation`] naming each offending element and its missing keys.
pub fn validate_snapshot_records(snapshots: &[serde_json::Value]) -> Result<()> {
    let offenders: Vec<String> = snapshots
        .iter()
        .enumerate()
        .filter_map(|(i, snapshot)| {
            let Some(obj) = snapshot.as_object() else {
                return Some(format!("#{i}: not an object"));
            };
            let missing: Vec<&str> = CAPTURE_RECORD_FIELDS
                .iter()
                .copied()
                .filter(|key| !obj.contains_key(*key))
                .collect();
            (!missing.is_empty()).then(|| format!("#{i}: missing {}", missing.join(", ")))
        })
        .collect();

    if offenders.is_empty() {
        Ok(())
    } else {
        Err(Error::validation_list(
            "snapshot records are missing required fields",
            offenders,
        ))
    }
}

/// Store the CDX catalog of `url`.
///
/// An existing catalog is replaced only when `force_update` is set.
///
/// # Errors
///
/// Returns [`Error::Validation`] if any record lacks a required field, or a
/// database error.
pub async fn upsert_snapshot_catalog(
    pool: &SqlitePool,
    url: &str,
    snapshots: &[serde_json::Value],
    force_update: bool,
) -> Result<CatalogOutcome> {
    let url = canonical_or_reject(url)?;
    validate_snapshot_records(snapshots)?;
    let payload = serde_json::to_string(snapshots)?;

    let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM url_snapshots WHERE url = ?")
        .bind(&url)
        .fetch_optional(pool)
        .await?;

    let outcome = match (exists, force_update) {
        (None, _) => {
            sqlx::query("INSERT INTO url_snapshots (url, wayback_cdx) VALUES (?, ?)")
                .bind(&url)
                .bind(&payload)
                .execute(pool)
                .await?;
            CatalogOutcome::Created
        }
        (Some((id,)), true) => {
            sqlx::query(
                "UPDATE url_snapshots SET wayback_cdx = ?, updated_at = datetime('now') WHERE id = ?",
            )
            .bind(&payload)
            .bind(id)
            .execute(pool)
            .await?;
            CatalogOutcome::Updated
        }
        (Some(_), false) => CatalogOutcome::Skipped,
    };

    info!(url = %url, records = snapshots.len(), outcome = outcome.as_str(), "Snapshot catalog stored");
    Ok(outcome)
}

/// Store typed capture records as the catalog of `url`.
///
/// # Errors
///
/// See [`upsert_snapshot_catalog`].
pub async fn upsert_capture_records(
    pool: &SqlitePool,
    url: &str,
    records: &[CaptureRecord],
    force_update: bool,
) -> Result<CatalogOutcome> {
    let values = records
        .iter()
        .map(serde_json::to_value)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    upsert_snapshot_catalog(pool, url, &values, force_update).await
}

/// Load the stored catalog of `url` (canonicalized).
pub async fn get_snapshot_catalog(pool: &SqlitePool, url: &str) -> Result<Option<SnapshotCatalog>> {
    let url = canonical_url(url);
    let row: Option<(String, String, String)> =
        sqlx::query_as("SELECT url, wayback_cdx, updated_at FROM url_snapshots WHERE url = ?")
            .bind(&url)
            .fetch_optional(pool)
            .await?;

    row.map(|(url, cdx, updated_at)| -> Result<SnapshotCatalog> {
        Ok(SnapshotCatalog {
            url,
            wayback_cdx: serde_json::from_str(&cdx)?,
            updated_at,
        })
    })
    .transpose()
}
