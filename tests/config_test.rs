//! Environment-driven configuration tests.
//!
//! These mutate process environment variables, so they run serially.

use std::path::PathBuf;
use std::time::Duration;

use serial_test::serial;
use wayback_harvester::config::Config;

const VARS: &[&str] = &[
    "DATABASE_PATH",
    "ARCHIVE_BASE_URL",
    "KNOWN_URL_CHECK_BASE",
    "HTTP_TIMEOUT_SECS",
    "CATALOG_DELAY_MS",
    "DOWNLOAD_DELAY_MS",
    "RETRY_MAX_ATTEMPTS",
    "RETRY_MULTIPLIER_SECS",
    "RETRY_MIN_SECS",
    "RETRY_MAX_SECS",
    "USE_APPARENT_ENCODING",
    "TLD_LIST_PATH",
];

fn clear_env() {
    for var in VARS {
        std::env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_defaults() {
    clear_env();

    let config = Config::from_env().expect("Defaults should load");
    config.validate().expect("Defaults should be valid");

    assert_eq!(config.archive_base_url, "https://web.archive.org");
    assert_eq!(config.known_url_check_base, None);
    assert_eq!(config.retry.max_attempts, 12);
    assert_eq!(config.retry.min_wait, Duration::from_secs(32));
    assert_eq!(config.retry.max_wait, Duration::from_secs(64));
    assert!(config.use_apparent_encoding);
    assert_eq!(config.tld_list_path, None);
}

#[test]
#[serial]
fn test_overrides() {
    clear_env();
    std::env::set_var("DATABASE_PATH", "/tmp/harvest.sqlite");
    std::env::set_var("ARCHIVE_BASE_URL", "http://localhost:8080/");
    std::env::set_var("KNOWN_URL_CHECK_BASE", "https://catalog.example.com/");
    std::env::set_var("RETRY_MAX_ATTEMPTS", "4");
    std::env::set_var("DOWNLOAD_DELAY_MS", "0");
    std::env::set_var("USE_APPARENT_ENCODING", "no");

    let config = Config::from_env().expect("Overrides should load");
    clear_env();

    assert_eq!(config.database_path, PathBuf::from("/tmp/harvest.sqlite"));
    assert_eq!(config.archive_base_url, "http://localhost:8080");
    assert_eq!(
        config.known_url_check_base.as_deref(),
        Some("https://catalog.example.com")
    );
    assert_eq!(config.retry.max_attempts, 4);
    assert_eq!(config.download_delay, Duration::ZERO);
    assert!(!config.use_apparent_encoding);
}

#[test]
#[serial]
fn test_unparseable_values_are_rejected() {
    clear_env();
    std::env::set_var("RETRY_MAX_ATTEMPTS", "many");
    assert!(Config::from_env().is_err());

    clear_env();
    std::env::set_var("USE_APPARENT_ENCODING", "maybe");
    assert!(Config::from_env().is_err());

    clear_env();
}

#[test]
#[serial]
fn test_zero_attempts_fail_validation() {
    clear_env();
    std::env::set_var("RETRY_MAX_ATTEMPTS", "0");

    let config = Config::from_env().expect("Zero parses");
    clear_env();

    assert!(config.validate().is_err());
}
