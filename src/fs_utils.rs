//! Writing downloaded snapshots to disk.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::wayback::{BulkDownloadReport, DownloadedSnapshot, FailedDownload};

/// Manifest line for one downloaded digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestEntry {
    pub urlkey: String,
    pub url: String,
    pub digest: String,
    pub timestamp: String,
    pub timestamps: Vec<String>,
    pub status_code: u16,
    pub content_type: Option<String>,
    /// File name relative to the output directory; absent when there was no payload.
    pub file: Option<String>,
    pub payload_sha256: Option<String>,
    pub payload_bytes: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub generated_at: String,
    pub snapshots: Vec<ManifestEntry>,
    pub failed: Vec<FailedDownload>,
}

/// File extension for a content type, `bin` when unknown.
fn extension_for(content_type: Option<&str>) -> &'static str {
    let essence = content_type
        .and_then(|ct| ct.split(';').next())
        .map(str::trim)
        .unwrap_or_default();

    match essence {
        "text/html" => "html",
        "text/plain" => "txt",
        _ => mime_guess::get_mime_extensions_str(essence)
            .and_then(|exts| exts.first().copied())
            .unwrap_or("bin"),
    }
}

/// Digests may contain characters that are awkward in file names.
fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn payload_file_name(snapshot: &DownloadedSnapshot) -> String {
    let ext = extension_for(snapshot.data.header("content-type"));
    format!(
        "{}_{}.{ext}",
        snapshot.timestamp().unwrap_or("undated"),
        sanitize(&snapshot.digest)
    )
}

/// Write every payload of `report` into `dir` plus a `manifest.json`.
///
/// Returns the manifest path.
///
/// # Errors
///
/// Returns an error if the directory or any file cannot be written.
pub async fn write_snapshots(dir: &Path, report: &BulkDownloadReport) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;

    let mut entries = Vec::with_capacity(report.downloaded.len());

    for snapshot in &report.downloaded {
        let content_type = snapshot.data.header("content-type").map(str::to_string);

        let (file, payload_sha256, payload_bytes) = match &snapshot.data.payload {
            Some(payload) => {
                let name = payload_file_name(snapshot);
                let path = dir.join(&name);
                let bytes = payload.as_bytes();
                tokio::fs::write(&path, bytes)
                    .await
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                debug!(path = %path.display(), bytes = bytes.len(), "Payload written");
                (
                    Some(name),
                    Some(hex::encode(Sha256::digest(bytes))),
                    bytes.len(),
                )
            }
            None => (None, None, 0),
        };

        entries.push(ManifestEntry {
            urlkey: snapshot.urlkey.clone(),
            url: snapshot.url.clone(),
            digest: snapshot.digest.clone(),
            timestamp: snapshot.timestamp().unwrap_or_default().to_string(),
            timestamps: snapshot.timestamps.clone(),
            status_code: snapshot.data.status_code,
            content_type,
            file,
            payload_sha256,
            payload_bytes,
        });
    }

    let manifest = Manifest {
        generated_at: chrono::Utc::now().to_rfc3339(),
        snapshots: entries,
        failed: report.failed.clone(),
    };

    let manifest_path = dir.join("manifest.json");
    let json = serde_json::to_vec_pretty(&manifest).context("Failed to serialize manifest")?;
    tokio::fs::write(&manifest_path, json)
        .await
        .with_context(|| format!("Failed to write {}", manifest_path.display()))?;

    Ok(manifest_path)
}
