use serde::{Deserialize, Serialize};

/// Context under which a URL was discovered.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LotInfo {
    pub lot_id: String,
    pub site_title: String,
    pub site_desc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lot_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lot_path_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<i64>,
}

impl LotInfo {
    #[must_use]
    pub fn new(lot_id: impl Into<String>, site_title: impl Into<String>) -> Self {
        Self {
            lot_id: lot_id.into(),
            site_title: site_title.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_desc(mut self, site_desc: impl Into<String>) -> Self {
        self.site_desc = site_desc.into();
        self
    }

    #[must_use]
    pub fn with_path(mut self, lot_path: impl Into<String>) -> Self {
        self.lot_path = Some(lot_path.into());
        self
    }

    #[must_use]
    pub fn with_path_code(mut self, lot_path_code: impl Into<String>) -> Self {
        self.lot_path_code = Some(lot_path_code.into());
        self
    }

    #[must_use]
    pub fn with_page_number(mut self, page_number: i64) -> Self {
        self.page_number = Some(page_number);
        self
    }

    /// Empty optional strings mean "not given".
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.lot_path = self.lot_path.filter(|p| !p.is_empty());
        self.lot_path_code = self.lot_path_code.filter(|c| !c.is_empty());
        self
    }

    /// Whether `other` describes the same lot association as `self`.
    ///
    /// Same `lot_id` plus a matching `lot_path` or a matching `lot_path_code`.
    /// Two lots carrying neither are the same when their ids match.
    #[must_use]
    pub fn same_lot(&self, other: &Self) -> bool {
        if self.lot_id != other.lot_id {
            return false;
        }
        let path_match = matches!((&self.lot_path, &other.lot_path), (Some(a), Some(b)) if a == b);
        let code_match =
            matches!((&self.lot_path_code, &other.lot_path_code), (Some(a), Some(b)) if a == b);
        let unqualified = self.lot_path.is_none()
            && self.lot_path_code.is_none()
            && other.lot_path.is_none()
            && other.lot_path_code.is_none();

        path_match || code_match || unqualified
    }
}

/// A lot association as stored.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct LotRow {
    pub lot_id: String,
    pub site_title: String,
    pub site_desc: String,
    pub lot_path: Option<String>,
    pub lot_path_code: Option<String>,
    pub page_number: Option<i64>,
}

impl From<LotRow> for LotInfo {
    fn from(row: LotRow) -> Self {
        Self {
            lot_id: row.lot_id,
            site_title: row.site_title,
            site_desc: row.site_desc,
            lot_path: row.lot_path,
            lot_path_code: row.lot_path_code,
            page_number: row.page_number,
        }
    }
}

/// A canonical URL with every lot it has been seen under, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlEntry {
    pub id: i64,
    pub url: String,
    pub created_at: String,
    pub in_lots: Vec<LotInfo>,
}

/// Full CDX catalog stored for a canonical URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotCatalog {
    pub url: String,
    pub wayback_cdx: Vec<serde_json::Value>,
    pub updated_at: String,
}

/// Result of [`upsert_url`](super::upsert_url).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOutcome {
    Created,
    Appended,
    Duplicate,
}

impl UpsertOutcome {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Appended => "appended",
            Self::Duplicate => "duplicate",
        }
    }
}

/// Result of [`upsert_snapshot_catalog`](super::upsert_snapshot_catalog).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogOutcome {
    Created,
    Updated,
    Skipped,
}

impl CatalogOutcome {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Skipped => "skipped",
        }
    }
}
