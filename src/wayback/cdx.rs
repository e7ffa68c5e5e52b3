//! CDX index client: the catalog of known captures of a URL.

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, info};

use super::WaybackClient;
use crate::constants::CDX_PATH;
use crate::error::{Error, Result};

/// One capture of a URL as listed by the CDX index.
///
/// Fields are kept as the strings the index returns; `statuscode` is `-` for
/// revisit records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRecord {
    pub urlkey: String,
    pub timestamp: String,
    pub original: String,
    pub mimetype: String,
    pub statuscode: String,
    pub digest: String,
    pub length: String,
}

impl CaptureRecord {
    /// Parse one space-separated CDX line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Format`] if the line has fewer than seven fields.
    pub fn from_cdx_line(line: &str) -> Result<Self> {
        let parts: Vec<&str> = line.split(' ').collect();
        if parts.len() < 7 {
            return Err(Error::Format(format!(
                "CDX line has {} fields, expected 7: '{line}'",
                parts.len()
            )));
        }

        Ok(Self {
            urlkey: parts[0].to_string(),
            timestamp: parts[1].to_string(),
            original: parts[2].to_string(),
            mimetype: parts[3].to_string(),
            statuscode: parts[4].to_string(),
            digest: parts[5].to_string(),
            length: parts[6].to_string(),
        })
    }

    /// The status code as an integer, if it is one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        self.statuscode.parse().ok()
    }
}

/// Optional CDX query parameters. Empty values are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    /// Raw CDX filter expression, e.g. `statuscode:200`.
    pub filter: Option<String>,
}

impl CatalogQuery {
    fn params<'a>(&'a self, url: &'a str) -> Vec<(&'static str, &'a str)> {
        let mut params = vec![("url", url)];
        let optional = [
            ("from", self.from.as_deref()),
            ("to", self.to.as_deref()),
            ("filter", self.filter.as_deref()),
        ];
        for (key, value) in optional {
            if let Some(v) = value.filter(|v| !v.is_empty()) {
                params.push((key, v));
            }
        }
        params
    }
}

/// Parse a full CDX response body. Blank lines are ignored.
///
/// # Errors
///
/// Returns [`Error::Format`] for the first malformed line.
pub fn parse_catalog(body: &str) -> Result<Vec<CaptureRecord>> {
    body.lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .map(CaptureRecord::from_cdx_line)
        .collect()
}

impl WaybackClient {
    /// Fetch every known capture of `url`.
    ///
    /// Makes a single request; failures are not retried here. The configured
    /// politeness delay is observed before the request is sent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upstream`] on a non-success status, [`Error::Transport`]
    /// if the request fails, or [`Error::Format`] for an unparseable body.
    pub async fn fetch_catalog(&self, url: &str, query: &CatalogQuery) -> Result<Vec<CaptureRecord>> {
        let endpoint = format!("{}{CDX_PATH}", self.base_url);

        sleep(self.catalog_delay).await;

        debug!(url = %url, from = ?query.from, to = ?query.to, filter = ?query.filter, "Querying CDX index");

        let response = self
            .http
            .get(&endpoint)
            .query(&query.params(url))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Upstream {
                status: status.as_u16(),
                url: response.url().to_string(),
            });
        }

        let body = response.text().await?;
        let records = parse_catalog(&body)?;

        info!(url = %url, captures = records.len(), "Fetched CDX catalog");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "com,mrshow)/ 19961220000000 http://www.mrshow.com:80/ text/html 200 AAAA 1043\n\
com,mrshow)/ 19970101000000 http://mrshow.com/ text/html 200 AAAA 1043\n\
com,mrshow)/ 19980101000000 http://mrshow.com/ warc/revisit - BBBB 512\n";

    #[test]
    fn test_parse_catalog() {
        let records = parse_catalog(SAMPLE).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].urlkey, "com,mrshow)/");
        assert_eq!(records[0].timestamp, "19961220000000");
        assert_eq!(records[0].original, "http://www.mrshow.com:80/");
        assert_eq!(records[0].status(), Some(200));
        assert_eq!(records[2].statuscode, "-");
        assert_eq!(records[2].status(), None);
    }

    #[test]
    fn test_parse_empty_body() {
        assert!(parse_catalog("").unwrap().is_empty());
        assert!(parse_catalog("\n\n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_short_line() {
        let err = parse_catalog("com,x)/ 2001 http://x.com/").unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    #[test]
    fn test_query_params_skip_empty() {
        let query = CatalogQuery {
            from: Some("1996".to_string()),
            to: Some(String::new()),
            filter: None,
        };
        assert_eq!(
            query.params("mrshow.com"),
            vec![("url", "mrshow.com"), ("from", "1996")]
        );
    }

    #[test]
    fn test_record_json_keys() {
        let record = CaptureRecord::from_cdx_line("a 1 b c 200 d 5").unwrap();
        let value = serde_json::to_value(&record).unwrap();
        for key in crate::constants::CAPTURE_RECORD_FIELDS {
            assert!(value.get(key).is_some(), "{key}");
        }
    }
}
