//! Shared constants used across the application.

/// User agent sent with every request to the archive.
pub const HARVESTER_USER_AGENT: &str =
    concat!("wayback-harvester/", env!("CARGO_PKG_VERSION"));

/// Host used when building memento URIs without an explicit base.
pub const ARCHIVE_HOST: &str = "web.archive.org";

pub const DEFAULT_ARCHIVE_BASE_URL: &str = "https://web.archive.org";

/// Path of the CDX index endpoint relative to the archive base.
pub const CDX_PATH: &str = "/cdx/search/cdx";

pub const DEFAULT_DATABASE_PATH: &str = "./data/harvester.sqlite";

/// Rewrite modifier that asks the archive for the unmodified original payload.
pub const RAW_REWRITE_MODIFIER: &str = "id_";

/// Keys every persisted catalog record must carry.
pub const CAPTURE_RECORD_FIELDS: [&str; 7] = [
    "urlkey",
    "timestamp",
    "original",
    "mimetype",
    "statuscode",
    "digest",
    "length",
];

/// Note stored in place of a catalog for URLs the known-URL service already has.
pub const ALREADY_KNOWN_NOTE: &str = "skip, already in database";
