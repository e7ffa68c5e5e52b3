//! Wayback Machine client: CDX catalog queries and memento downloads.

mod cdx;
mod decode;
mod download;
pub mod memento;
mod retry;

pub use cdx::{parse_catalog, CaptureRecord, CatalogQuery};
pub use decode::{decode_apparent, decode_declared};
pub use download::{
    BulkDownloadReport, DownloadOptions, DownloadedSnapshot, FailedDownload, Payload,
    SnapshotResponse,
};
pub use memento::{Memento, RewriteModifier};
pub use retry::RetryPolicy;

use std::time::Duration;

use reqwest::Client;
use url::Url;

use crate::config::Config;
use crate::constants::{HARVESTER_USER_AGENT, RAW_REWRITE_MODIFIER};
use crate::error::{Error, Result};

/// Client for the archive's CDX index and snapshot endpoints.
///
/// Requests are issued one at a time; both the catalog and the downloader
/// pause between requests to stay under the archive's rate limit.
#[derive(Debug, Clone)]
pub struct WaybackClient {
    http: Client,
    /// Scheme, host and port of the archive, without a trailing slash.
    base_url: String,
    /// `host[:port]` used when building memento URIs.
    archive_host: String,
    https: bool,
    catalog_delay: Duration,
    download_delay: Duration,
    use_apparent_encoding: bool,
    retry: RetryPolicy,
}

impl WaybackClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive base URL is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        let base = Url::parse(&config.archive_base_url).map_err(|e| {
            Error::Validation(format!(
                "invalid archive base URL '{}': {e}",
                config.archive_base_url
            ))
        })?;
        let host = base.host_str().ok_or_else(|| {
            Error::Validation(format!(
                "archive base URL has no host: '{}'",
                config.archive_base_url
            ))
        })?;
        let archive_host = match base.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        let http = Client::builder()
            .timeout(config.http_timeout)
            .user_agent(HARVESTER_USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;

        Ok(Self {
            http,
            base_url: config.archive_base_url.trim_end_matches('/').to_string(),
            archive_host,
            https: base.scheme() == "https",
            catalog_delay: config.catalog_delay,
            download_delay: config.download_delay,
            use_apparent_encoding: config.use_apparent_encoding,
            retry: config.retry,
        })
    }

    /// Download options derived from configuration (raw `id_` payloads).
    #[must_use]
    pub fn download_options(&self) -> DownloadOptions {
        DownloadOptions {
            rewrite_modifier: RAW_REWRITE_MODIFIER.to_string(),
            sleep: self.download_delay,
            use_apparent_encoding: self.use_apparent_encoding,
        }
    }

    #[must_use]
    pub const fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Replace the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
