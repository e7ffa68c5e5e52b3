//! Loading of URL input files.
//!
//! Input is a JSON array of objects:
//!
//! ```json
//! [{"url": "http://mrshow.com", "title": "Mr. Show", "description": "...",
//!   "category": "comedy", "page_number": 2}]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::validate::{validate_all, TldList};

/// Keys every input object must carry.
pub const REQUIRED_INPUT_KEYS: [&str; 3] = ["url", "title", "description"];

/// One URL to process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputEntry {
    pub url: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub page_number: Option<i64>,
}

/// Parse input JSON, reporting every entry with missing keys at once.
///
/// # Errors
///
/// Returns [`Error::Json`] for malformed JSON and [`Error::Validation`] when
/// the document is not an array or entries lack required keys.
pub fn parse_entries(json: &str) -> Result<Vec<InputEntry>> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    let items = value
        .as_array()
        .ok_or_else(|| Error::Validation("input must be a JSON array of objects".to_string()))?;

    let offenders: Vec<String> = items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| {
            let missing: Vec<&str> = REQUIRED_INPUT_KEYS
                .iter()
                .copied()
                .filter(|key| item.get(*key).is_none())
                .collect();
            (!missing.is_empty()).then(|| format!("entry #{i}: missing {}", missing.join(", ")))
        })
        .collect();

    if !offenders.is_empty() {
        return Err(Error::validation_list(
            "each entry must contain 'url', 'title' and 'description'",
            offenders,
        ));
    }

    items
        .iter()
        .map(|item| InputEntry::deserialize(item).map_err(Error::from))
        .collect()
}

/// Read and validate an input file.
///
/// URLs are checked against `tlds` unless `bypass_url_validation` is set;
/// every failing URL is reported in one error.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be read, or any error of
/// [`parse_entries`] and [`validate_all`].
pub fn load_entries(path: &Path, tlds: &TldList, bypass_url_validation: bool) -> Result<Vec<InputEntry>> {
    let json = std::fs::read_to_string(path)?;
    let entries = parse_entries(&json)?;

    if !bypass_url_validation {
        validate_all(entries.iter().map(|e| e.url.as_str()), tlds)?;
    }

    info!(path = %path.display(), entries = entries.len(), "Input file loaded");
    Ok(entries)
}
