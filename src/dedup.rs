//! Content deduplication of archived captures.
//!
//! Captures sharing a CDX digest have byte-identical payloads, so only one of
//! them needs downloading. Captures are grouped by digest within a timestamp
//! window and status-code filter; the first timestamp of each group (in
//! catalog order) is the one fetched, the rest are kept as metadata.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::wayback::CaptureRecord;

/// Width of a full CDX timestamp (`YYYYMMDDhhmmss`).
pub const TIMESTAMP_LEN: usize = 14;

/// Status codes a capture must have to be kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusFilter(Vec<u16>);

impl Default for StatusFilter {
    fn default() -> Self {
        Self(vec![200])
    }
}

impl StatusFilter {
    #[must_use]
    pub fn new(codes: &[u16]) -> Self {
        Self(codes.to_vec())
    }

    /// Build a filter from JSON values, each of which must be an integer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] naming every non-integer element,
    /// including numeric strings such as `"200"`.
    pub fn from_json(values: &[serde_json::Value]) -> Result<Self> {
        let mut codes = Vec::with_capacity(values.len());
        let mut rejected = Vec::new();
        for value in values {
            match value.as_u64().and_then(|n| u16::try_from(n).ok()) {
                Some(code) => codes.push(code),
                None => rejected.push(value.to_string()),
            }
        }
        if rejected.is_empty() {
            Ok(Self(codes))
        } else {
            Err(Error::validation_list(
                "status filter must contain only integers",
                rejected,
            ))
        }
    }

    #[must_use]
    pub fn contains(&self, code: u16) -> bool {
        self.0.contains(&code)
    }

    #[must_use]
    pub fn codes(&self) -> &[u16] {
        &self.0
    }
}

impl FromStr for StatusFilter {
    type Err = Error;

    /// Parse a comma-separated list such as `200,301`.
    fn from_str(s: &str) -> Result<Self> {
        let mut codes = Vec::new();
        let mut rejected = Vec::new();
        for part in s.split(',').map(str::trim) {
            match part.parse::<u16>() {
                Ok(code) => codes.push(code),
                Err(_) => rejected.push(part.to_string()),
            }
        }
        if rejected.is_empty() {
            Ok(Self(codes))
        } else {
            Err(Error::validation_list(
                "status filter must contain only integers",
                rejected,
            ))
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .0
            .iter()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join(",");
        f.write_str(&joined)
    }
}

/// All kept timestamps sharing one digest, in catalog order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotGroup {
    pub digest: String,
    pub timestamps: Vec<String>,
}

impl SnapshotGroup {
    /// The capture chosen for download: the earliest in catalog order.
    ///
    /// `None` only for a hand-built group with no timestamps.
    #[must_use]
    pub fn representative(&self) -> Option<&str> {
        self.timestamps.first().map(String::as_str)
    }
}

/// Deduplicated view of a catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueSnapshots {
    pub urlkey: String,
    /// Groups in order of each digest's first appearance.
    pub groups: Vec<SnapshotGroup>,
}

impl UniqueSnapshots {
    #[must_use]
    pub fn get(&self, digest: &str) -> Option<&SnapshotGroup> {
        self.groups.iter().find(|g| g.digest == digest)
    }

    /// Timestamps that will actually be downloaded, one per digest.
    pub fn representatives(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().filter_map(SnapshotGroup::representative)
    }

    /// Total number of captures kept across all groups.
    #[must_use]
    pub fn capture_count(&self) -> usize {
        self.groups.iter().map(|g| g.timestamps.len()).sum()
    }
}

/// Check that a bound is a full 14-digit timestamp.
///
/// # Errors
///
/// Returns [`Error::Validation`] otherwise.
pub fn check_timestamp(name: &str, value: &str) -> Result<()> {
    if value.len() == TIMESTAMP_LEN && value.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "{name} must be a {TIMESTAMP_LEN}-digit timestamp (YYYYMMDDhhmmss), got '{value}'"
        )))
    }
}

/// Group captures by digest within `[from, to]` and the status filter.
///
/// # Errors
///
/// Returns [`Error::Validation`] if either bound is not a 14-digit timestamp,
/// or the catalog is empty or its first record has no urlkey.
pub fn unique_snapshots(
    catalog: &[CaptureRecord],
    from: &str,
    to: &str,
    status_filter: &StatusFilter,
) -> Result<UniqueSnapshots> {
    check_timestamp("from", from)?;
    check_timestamp("to", to)?;

    let urlkey = catalog
        .first()
        .map(|r| r.urlkey.as_str())
        .filter(|k| !k.is_empty())
        .ok_or_else(|| Error::Validation("catalog is empty or has no urlkey".to_string()))?
        .to_string();

    let mut groups: Vec<SnapshotGroup> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    let kept = catalog.iter().filter(|r| {
        r.timestamp.as_str() >= from
            && r.timestamp.as_str() <= to
            && r.status().is_some_and(|code| status_filter.contains(code))
    });

    for record in kept {
        match index.get(record.digest.as_str()) {
            Some(&i) => groups[i].timestamps.push(record.timestamp.clone()),
            None => {
                index.insert(record.digest.as_str(), groups.len());
                groups.push(SnapshotGroup {
                    digest: record.digest.clone(),
                    timestamps: vec![record.timestamp.clone()],
                });
            }
        }
    }

    Ok(UniqueSnapshots { urlkey, groups })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(timestamp: &str, digest: &str, status: &str) -> CaptureRecord {
        CaptureRecord {
            urlkey: "com,example)/".to_string(),
            timestamp: timestamp.to_string(),
            original: "http://example.com/".to_string(),
            mimetype: "text/html".to_string(),
            statuscode: status.to_string(),
            digest: digest.to_string(),
            length: "100".to_string(),
        }
    }

    #[test]
    fn test_groups_by_digest() {
        let catalog = vec![
            record("19990101000000", "A", "200"),
            record("19990601000000", "A", "200"),
            record("20000101000000", "B", "200"),
        ];
        let unique = unique_snapshots(
            &catalog,
            "19990101000000",
            "20001231235959",
            &StatusFilter::default(),
        )
        .unwrap();

        assert_eq!(unique.urlkey, "com,example)/");
        assert_eq!(
            unique.get("A").unwrap().timestamps,
            vec!["19990101000000", "19990601000000"]
        );
        assert_eq!(unique.get("B").unwrap().timestamps, vec!["20000101000000"]);
        assert_eq!(
            unique.representatives().collect::<Vec<_>>(),
            vec!["19990101000000", "20000101000000"]
        );
    }

    #[test]
    fn test_filters_range_and_status() {
        let catalog = vec![
            record("19980101000000", "A", "200"),
            record("19990101000000", "A", "301"),
            record("19990201000000", "B", "-"),
            record("19990301000000", "C", "200"),
            record("20010101000000", "C", "200"),
        ];
        let unique = unique_snapshots(
            &catalog,
            "19990101000000",
            "20001231235959",
            &StatusFilter::default(),
        )
        .unwrap();
        assert_eq!(unique.groups.len(), 1);
        assert_eq!(unique.groups[0].digest, "C");
        assert_eq!(unique.capture_count(), 1);

        let redirects = unique_snapshots(
            &catalog,
            "19990101000000",
            "20001231235959",
            &StatusFilter::new(&[200, 301]),
        )
        .unwrap();
        assert_eq!(
            redirects.groups.iter().map(|g| g.digest.as_str()).collect::<Vec<_>>(),
            vec!["A", "C"]
        );
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let catalog = vec![
            record("19990101000000", "A", "200"),
            record("19991231235959", "B", "200"),
        ];
        let unique = unique_snapshots(
            &catalog,
            "19990101000000",
            "19991231235959",
            &StatusFilter::default(),
        )
        .unwrap();
        assert_eq!(unique.capture_count(), 2);
    }

    #[test]
    fn test_union_equals_filtered_subset() {
        let digests = ["A", "B", "A", "C", "B", "A", "D"];
        let catalog: Vec<_> = digests
            .iter()
            .enumerate()
            .map(|(i, d)| {
                let status = if i % 3 == 2 { "404" } else { "200" };
                record(&format!("2000010100000{i}"), d, status)
            })
            .collect();

        let unique = unique_snapshots(
            &catalog,
            "20000101000000",
            "20000101000009",
            &StatusFilter::default(),
        )
        .unwrap();

        let mut from_groups: Vec<&str> = unique
            .groups
            .iter()
            .flat_map(|g| g.timestamps.iter().map(String::as_str))
            .collect();
        from_groups.sort_unstable();
        let mut expected: Vec<&str> = catalog
            .iter()
            .filter(|r| r.statuscode == "200")
            .map(|r| r.timestamp.as_str())
            .collect();
        expected.sort_unstable();
        assert_eq!(from_groups, expected);
    }

    #[test]
    fn test_rejects_short_dates() {
        let catalog = vec![record("19990101000000", "A", "200")];
        for (from, to) in [
            ("1999", "20001231235959"),
            ("19990101000000", "2000"),
            ("1999010100000x", "20001231235959"),
        ] {
            assert!(matches!(
                unique_snapshots(&catalog, from, to, &StatusFilter::default()),
                Err(Error::Validation(_))
            ));
        }
    }

    #[test]
    fn test_rejects_empty_catalog() {
        assert!(matches!(
            unique_snapshots(&[], "19990101000000", "20001231235959", &StatusFilter::default()),
            Err(Error::Validation(_))
        ));

        let mut keyless = record("19990101000000", "A", "200");
        keyless.urlkey = String::new();
        assert!(matches!(
            unique_snapshots(
                &[keyless],
                "19990101000000",
                "20001231235959",
                &StatusFilter::default()
            ),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_urlkey_from_unfiltered_catalog() {
        let mut first = record("18000101000000", "A", "500");
        first.urlkey = "org,first)/".to_string();
        let catalog = vec![first, record("19990101000000", "B", "200")];
        let unique = unique_snapshots(
            &catalog,
            "19990101000000",
            "20001231235959",
            &StatusFilter::default(),
        )
        .unwrap();
        assert_eq!(unique.urlkey, "org,first)/");
    }

    #[test]
    fn test_status_filter_from_json() {
        let ok = StatusFilter::from_json(&[serde_json::json!(200), serde_json::json!(404)]).unwrap();
        assert_eq!(ok.codes(), &[200, 404]);

        let err = StatusFilter::from_json(&[serde_json::json!("200")]).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(StatusFilter::from_json(&[serde_json::json!(200.5)]).is_err());
    }

    #[test]
    fn test_status_filter_from_str() {
        assert_eq!("200, 301".parse::<StatusFilter>().unwrap().codes(), &[200, 301]);
        assert!("200,ok".parse::<StatusFilter>().is_err());
        assert_eq!(StatusFilter::new(&[200, 301]).to_string(), "200,301");
    }

    #[test]
    fn test_empty_group_has_no_representative() {
        let group = SnapshotGroup {
            digest: "A".to_string(),
            timestamps: Vec::new(),
        };
        assert_eq!(group.representative(), None);

        let unique = UniqueSnapshots {
            urlkey: "com,example)/".to_string(),
            groups: vec![group],
        };
        assert_eq!(unique.representatives().count(), 0);
    }
}
