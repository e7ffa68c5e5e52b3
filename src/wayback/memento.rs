//! Memento URI codec.
//!
//! A memento URI addresses one archived capture:
//! `https://web.archive.org/web/20220101000000id_/http://example.com`, where
//! `20220101000000` is the capture timestamp (1 to 14 digits), `id_` is an
//! optional rewrite modifier, and the remainder is the original resource URI.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::constants::ARCHIVE_HOST;
use crate::error::{Error, Result};

static MEMENTO_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<scheme>https?)://(?P<host>[^/]+)/web/(?P<timestamp>\d{1,14})(?P<modifier>[a-zA-Z0-9]{2}_)?/(?P<original>.+)$",
    )
    .expect("memento pattern is valid")
});

static MODIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9]{2}_$").expect("modifier pattern is valid"));

/// A validated rewrite modifier such as `id_` or `if_`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RewriteModifier(String);

impl RewriteModifier {
    /// Parse a modifier; it must be exactly two alphanumerics followed by `_`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Format`] for any other shape.
    pub fn parse(value: &str) -> Result<Self> {
        if MODIFIER_RE.is_match(value) {
            Ok(Self(value.to_string()))
        } else {
            Err(Error::Format(format!("invalid rewrite modifier: '{value}'")))
        }
    }

    /// Parse an optional modifier where the empty string means "none".
    ///
    /// # Errors
    ///
    /// Returns [`Error::Format`] when the value is non-empty and malformed.
    pub fn parse_optional(value: &str) -> Result<Option<Self>> {
        if value.is_empty() {
            Ok(None)
        } else {
            Self::parse(value).map(Some)
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RewriteModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The components of a memento URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memento {
    pub https: bool,
    /// Archive host, including a port when one was given.
    pub host: String,
    pub timestamp: String,
    pub rewrite_modifier: Option<RewriteModifier>,
    /// The archived resource URI, exactly as it appeared in the memento URI.
    pub original: String,
}

impl Memento {
    /// Create a memento on the default archive host.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Format`] if the timestamp is not 1 to 14 digits or the
    /// modifier is malformed.
    pub fn new(original: &str, timestamp: &str, rewrite_modifier: &str, https: bool) -> Result<Self> {
        Self::on_host(ARCHIVE_HOST, original, timestamp, rewrite_modifier, https)
    }

    /// Create a memento on an explicit archive host (`host[:port]`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Format`] for a bad timestamp, modifier or empty original.
    pub fn on_host(
        host: &str,
        original: &str,
        timestamp: &str,
        rewrite_modifier: &str,
        https: bool,
    ) -> Result<Self> {
        if timestamp.is_empty()
            || timestamp.len() > 14
            || !timestamp.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(Error::Format(format!("invalid memento timestamp: '{timestamp}'")));
        }
        if original.is_empty() {
            return Err(Error::Format("memento original URI is empty".to_string()));
        }
        if host.is_empty() || host.contains('/') {
            return Err(Error::Format(format!("invalid archive host: '{host}'")));
        }

        Ok(Self {
            https,
            host: host.to_string(),
            timestamp: timestamp.to_string(),
            rewrite_modifier: RewriteModifier::parse_optional(rewrite_modifier)?,
            original: original.to_string(),
        })
    }

    /// Render the memento back into a URI.
    #[must_use]
    pub fn to_uri(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Memento {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = if self.https { "https" } else { "http" };
        let modifier = self
            .rewrite_modifier
            .as_ref()
            .map_or("", RewriteModifier::as_str);
        write!(
            f,
            "{scheme}://{}/web/{}{modifier}/{}",
            self.host, self.timestamp, self.original
        )
    }
}

/// Dissect a memento URI into its components.
///
/// # Errors
///
/// Returns [`Error::Format`] if the URI does not follow the memento grammar.
pub fn parse(uri: &str) -> Result<Memento> {
    let caps = MEMENTO_RE
        .captures(uri)
        .ok_or_else(|| Error::Format(format!("invalid memento URI: '{uri}'")))?;

    let rewrite_modifier = caps
        .name("modifier")
        .map(|m| RewriteModifier(m.as_str().to_string()));

    Ok(Memento {
        https: &caps["scheme"] == "https",
        host: caps["host"].to_string(),
        timestamp: caps["timestamp"].to_string(),
        rewrite_modifier,
        original: caps["original"].to_string(),
    })
}

/// Build a memento URI on the default archive host.
///
/// `use_https` selects the scheme of the produced URI.
///
/// # Errors
///
/// Returns [`Error::Format`] if the modifier is non-empty and malformed, or the
/// timestamp is not 1 to 14 digits.
pub fn build(original: &str, timestamp: &str, rewrite_modifier: &str, use_https: bool) -> Result<String> {
    Memento::new(original, timestamp, rewrite_modifier, use_https).map(|m| m.to_uri())
}
