//! Validation of original (non-archive) URLs before they enter the pipeline.

use std::collections::HashSet;
use std::path::Path;

use once_cell::sync::OnceCell;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

const EMBEDDED_TLDS: &str = include_str!("../data/tlds.txt");

/// Characters that never appear unescaped in a URL we accept.
const INVALID_CHARS: &[char] = &['<', '>', '{', '}', '|', '\\', '^', '~', '[', ']', '`'];

static GLOBAL_TLDS: OnceCell<TldList> = OnceCell::new();

/// Set of valid top-level domains.
///
/// Loaded once, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TldList {
    tlds: HashSet<String>,
}

impl TldList {
    /// Parse a newline-separated list; blank lines and `#` comments are skipped.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let tlds = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| line.trim_start_matches('.').to_ascii_lowercase())
            .collect();
        Self { tlds }
    }

    /// The table compiled into the binary.
    #[must_use]
    pub fn embedded() -> Self {
        Self::parse(EMBEDDED_TLDS)
    }

    /// Read a list from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or lists no TLDs.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let list = Self::parse(&text);
        if list.is_empty() {
            return Err(Error::Validation(format!(
                "TLD list {} contains no entries",
                path.display()
            )));
        }
        Ok(list)
    }

    /// Install `list` as the process-wide table.
    ///
    /// # Errors
    ///
    /// Returns an error if a table was already installed or read.
    pub fn install(list: Self) -> Result<()> {
        GLOBAL_TLDS
            .set(list)
            .map_err(|_| Error::Validation("TLD list already initialized".to_string()))
    }

    /// The process-wide table, falling back to the embedded one.
    pub fn global() -> &'static Self {
        GLOBAL_TLDS.get_or_init(Self::embedded)
    }

    #[must_use]
    pub fn contains(&self, tld: &str) -> bool {
        self.tlds.contains(&tld.to_ascii_lowercase())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tlds.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tlds.is_empty()
    }
}

/// Check that `url` looks like a real, fetchable web address.
#[must_use]
pub fn validate_original_url(url: &str, tlds: &TldList) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };

    let Some(host) = parsed.host_str() else {
        return false;
    };

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    let Some(tld) = labels.last() else {
        return false;
    };
    if !tlds.contains(tld) {
        return false;
    }

    if url.matches("//").count() > 1 {
        return false;
    }

    if url.contains(INVALID_CHARS) {
        return false;
    }

    !url.contains(' ')
}

/// Validate every URL, reporting all failures at once.
///
/// # Errors
///
/// Returns [`Error::Validation`] listing each URL that failed.
pub fn validate_all<'a, I>(urls: I, tlds: &TldList) -> Result<()>
where
    I: IntoIterator<Item = &'a str>,
{
    let failing: Vec<&str> = urls
        .into_iter()
        .filter(|url| !validate_original_url(url, tlds))
        .collect();

    if failing.is_empty() {
        debug!("URL validation passed");
        Ok(())
    } else {
        Err(Error::validation_list(
            &format!("{} URL(s) failed validation", failing.len()),
            failing,
        ))
    }
}
