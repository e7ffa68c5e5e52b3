//! Error taxonomy shared by the harvesting pipeline.

use thiserror::Error;

/// Errors raised by the catalog, deduplication, download and persistence layers.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed caller input: bad date, bad status filter, missing keys, bad URL.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Malformed memento URI, rewrite modifier or catalog line.
    #[error("format error: {0}")]
    Format(String),

    /// The archive answered with a non-success status.
    #[error("upstream returned {status} for {url}")]
    Upstream { status: u16, url: String },

    /// The request never produced a response (connect, timeout, body read).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the download retry policy should try again after this error.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Upstream { .. })
    }

    /// Build a validation error listing every offending item.
    pub fn validation_list<I, S>(message: &str, offenders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let list = offenders
            .into_iter()
            .map(|s| format!("  {}", s.as_ref()))
            .collect::<Vec<_>>()
            .join("\n");
        Self::Validation(format!("{message}:\n{list}"))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
