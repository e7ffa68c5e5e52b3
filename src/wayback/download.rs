//! Snapshot payload retrieval.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::decode::{decode_apparent, decode_declared, is_text};
use super::memento::Memento;
use super::{CatalogQuery, WaybackClient};
use crate::constants::RAW_REWRITE_MODIFIER;
use crate::dedup::{check_timestamp, unique_snapshots, StatusFilter};
use crate::error::{Error, Result};

/// Per-request download settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOptions {
    /// Empty for none; otherwise two alphanumerics and `_`.
    pub rewrite_modifier: String,
    /// Fixed pause after every completed request.
    pub sleep: Duration,
    pub use_apparent_encoding: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            rewrite_modifier: RAW_REWRITE_MODIFIER.to_string(),
            sleep: Duration::from_secs(1),
            use_apparent_encoding: true,
        }
    }
}

/// Body of an archived capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
}

impl Payload {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }

    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }
}

/// Outcome of fetching one memento.
///
/// `payload` is `None` for 404 and 403, which the archive returns for captures
/// it cannot (or will not) serve; these are valid results, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotResponse {
    pub status_code: u16,
    pub payload: Option<Payload>,
    pub headers: BTreeMap<String, String>,
}

impl SnapshotResponse {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// One downloaded digest together with every timestamp sharing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedSnapshot {
    pub urlkey: String,
    pub url: String,
    pub digest: String,
    pub timestamps: Vec<String>,
    pub data: SnapshotResponse,
}

impl DownloadedSnapshot {
    /// Timestamp that was actually fetched.
    #[must_use]
    pub fn timestamp(&self) -> Option<&str> {
        self.timestamps.first().map(String::as_str)
    }
}

/// A digest whose download failed after the retry budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedDownload {
    pub digest: String,
    pub timestamp: String,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct BulkDownloadReport {
    pub downloaded: Vec<DownloadedSnapshot>,
    pub failed: Vec<FailedDownload>,
}

fn header_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut map: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        map.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    map
}

impl WaybackClient {
    /// Memento URI for `url` at `timestamp` on the configured archive.
    ///
    /// The original URL is percent-encoded in full.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Format`] for a malformed timestamp or modifier.
    pub fn snapshot_url(&self, url: &str, timestamp: &str, rewrite_modifier: &str) -> Result<String> {
        let encoded = urlencoding::encode(url);
        Memento::on_host(&self.archive_host, &encoded, timestamp, rewrite_modifier, self.https)
            .map(|m| m.to_uri())
    }

    /// Fetch the archived payload of `url` at `timestamp`.
    ///
    /// Transport failures and unexpected statuses are retried according to the
    /// client's [`RetryPolicy`](super::RetryPolicy). 404 and 403 return
    /// immediately with no payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Format`] for a malformed timestamp or modifier, or the
    /// last [`Error::Upstream`]/[`Error::Transport`] once retries are spent.
    pub async fn download(
        &self,
        url: &str,
        timestamp: &str,
        options: &DownloadOptions,
    ) -> Result<SnapshotResponse> {
        let snapshot_url = self.snapshot_url(url, timestamp, &options.rewrite_modifier)?;
        let this = self;
        let target = snapshot_url.as_str();

        self.retry
            .run(target, move || this.fetch_snapshot(target, options))
            .await
    }

    async fn fetch_snapshot(
        &self,
        snapshot_url: &str,
        options: &DownloadOptions,
    ) -> Result<SnapshotResponse> {
        debug!(url = %snapshot_url, "Fetching archived snapshot");

        let response = self.http.get(snapshot_url).send().await?;
        let status = response.status();
        let headers = header_map(response.headers());
        let body = response.bytes().await;

        debug!(url = %snapshot_url, status = %status, "Received snapshot response");
        sleep(options.sleep).await;

        if status == StatusCode::NOT_FOUND || status == StatusCode::FORBIDDEN {
            return Ok(SnapshotResponse {
                status_code: status.as_u16(),
                payload: None,
                headers,
            });
        }

        if !status.is_success() {
            return Err(Error::Upstream {
                status: status.as_u16(),
                url: snapshot_url.to_string(),
            });
        }

        let body = body?;
        let content_type = headers.get(CONTENT_TYPE.as_str()).map(String::as_str);

        let payload = if is_text(content_type) {
            let text = if options.use_apparent_encoding {
                decode_apparent(&body)
            } else {
                decode_declared(&body, content_type)
            };
            Payload::Text(text)
        } else {
            Payload::Binary(body.to_vec())
        };

        Ok(SnapshotResponse {
            status_code: status.as_u16(),
            payload: Some(payload),
            headers,
        })
    }

    /// Download one capture per unique digest of `url` within `[from, to]`.
    ///
    /// A digest that fails to download is logged and recorded in
    /// [`BulkDownloadReport::failed`]; the remaining digests are still fetched.
    ///
    /// # Errors
    ///
    /// Returns an error if the bounds are invalid or the catalog cannot be
    /// fetched or deduplicated.
    pub async fn bulk_download_unique(
        &self,
        url: &str,
        from: &str,
        to: &str,
        status_filter: &StatusFilter,
    ) -> Result<BulkDownloadReport> {
        check_timestamp("from", from)?;
        check_timestamp("to", to)?;

        let query = CatalogQuery {
            from: Some(from.to_string()),
            to: Some(to.to_string()),
            filter: None,
        };
        let catalog = self.fetch_catalog(url, &query).await?;
        let unique = unique_snapshots(&catalog, from, to, status_filter)?;

        info!(
            url = %url,
            captures = unique.capture_count(),
            unique = unique.groups.len(),
            "Downloading unique snapshots"
        );

        let options = self.download_options();
        let mut report = BulkDownloadReport::default();

        for group in unique.groups {
            let Some(timestamp) = group.representative().map(str::to_string) else {
                continue;
            };
            match self.download(url, &timestamp, &options).await {
                Ok(data) => {
                    debug!(digest = %group.digest, timestamp = %timestamp, status = data.status_code, "Snapshot downloaded");
                    report.downloaded.push(DownloadedSnapshot {
                        urlkey: unique.urlkey.clone(),
                        url: url.to_string(),
                        digest: group.digest,
                        timestamps: group.timestamps,
                        data,
                    });
                }
                Err(e) => {
                    warn!(url = %url, digest = %group.digest, timestamp = %timestamp, error = %e, "Snapshot download failed, continuing");
                    report.failed.push(FailedDownload {
                        digest: group.digest,
                        timestamp,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            url = %url,
            downloaded = report.downloaded.len(),
            failed = report.failed.len(),
            "Bulk download finished"
        );
        Ok(report)
    }
}
