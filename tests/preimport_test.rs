//! Integration tests for input loading and the pre-import store.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use wayback_harvester::config::Config;
use wayback_harvester::ingest::load_entries;
use wayback_harvester::preimport::{run_preimport, KnownUrlChecker, PreimportStore};
use wayback_harvester::validate::TldList;
use wayback_harvester::wayback::{CatalogQuery, WaybackClient};
use wayback_harvester::Error;
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const INPUT: &str = r#"[
    {"url": "http://mrshow.com", "title": "Mr. Show", "description": "Sketch comedy", "category": "tv"},
    {"url": "http://example.org/page", "title": "Example", "description": "", "page_number": 4}
]"#;

fn write_input(dir: &Path, json: &str) -> PathBuf {
    let input = dir.join("urls.json");
    std::fs::write(&input, json).expect("Failed to write input");
    input
}

async fn setup_store(dir: &Path) -> PreimportStore {
    let input = write_input(dir, INPUT);
    let entries = load_entries(&input, &TldList::embedded(), false).expect("Input should load");
    let store = PreimportStore::open(&PreimportStore::path_for(&input))
        .await
        .expect("Failed to open store");
    store.initialize(&entries).await.expect("Failed to seed store");
    store
}

fn client_for(server: &MockServer) -> WaybackClient {
    let config = Config {
        archive_base_url: server.uri(),
        ..Config::for_testing()
    };
    WaybackClient::new(&config).expect("Failed to create client")
}

#[test]
fn test_store_path_sits_next_to_input() {
    assert_eq!(
        PreimportStore::path_for(Path::new("/data/batch-7.json")),
        PathBuf::from("/data/batch-7.db")
    );
}

#[test]
fn test_load_entries_lists_every_bad_url() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_input(
        temp_dir.path(),
        r#"[
            {"url": "http://mrshow.com", "title": "ok", "description": ""},
            {"url": "http://localhost/admin", "title": "no tld", "description": ""},
            {"url": "http://example.notatld", "title": "bad tld", "description": ""},
            {"url": "http://example.com/a b", "title": "space", "description": ""}
        ]"#,
    );

    let Err(Error::Validation(message)) = load_entries(&input, &TldList::embedded(), false) else {
        panic!("expected a validation error");
    };
    assert!(message.contains("http://localhost/admin"));
    assert!(message.contains("http://example.notatld"));
    assert!(message.contains("http://example.com/a b"));
    assert!(!message.contains("http://mrshow.com"));

    let entries = load_entries(&input, &TldList::embedded(), true).expect("bypass should load");
    assert_eq!(entries.len(), 4);
}

#[tokio::test]
async fn test_initialize_seeds_only_once() {
    let temp_dir = TempDir::new().unwrap();
    let store = setup_store(temp_dir.path()).await;

    let entries = load_entries(&temp_dir.path().join("urls.json"), &TldList::embedded(), false)
        .unwrap();
    let created = store.initialize(&entries).await.unwrap();
    assert!(!created);

    let pending = store.pending().await.unwrap();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].url, "http://mrshow.com");
    assert_eq!(pending[0].category.as_deref(), Some("tv"));
    assert_eq!(pending[0].page_number, 0);
    assert_eq!(pending[1].page_number, 4);

    store.close().await;
}

#[tokio::test]
async fn test_preimport_fills_every_row() {
    let temp_dir = TempDir::new().unwrap();
    let store = setup_store(temp_dir.path()).await;
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/cdx/search/cdx"))
        .and(query_param("filter", "statuscode:200"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "com,example)/ 20010101000000 http://example.com/ text/html 200 AAAA 100\n",
        ))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let query = CatalogQuery {
        filter: Some("statuscode:200".to_string()),
        ..CatalogQuery::default()
    };

    let summary = run_preimport(&store, &client, &query, None)
        .await
        .expect("Pre-import failed");
    assert_eq!(summary.fetched, 2);
    assert_eq!(summary.skipped_known, 0);
    assert!(store.pending().await.unwrap().is_empty());

    let row = store.get(1).await.unwrap().expect("row 1 exists");
    let cdx: serde_json::Value = serde_json::from_str(row.cdx_data.as_deref().unwrap()).unwrap();
    assert_eq!(cdx[0]["digest"], "AAAA");
    assert_eq!(cdx[0]["statuscode"], "200");

    store.close().await;
}

#[tokio::test]
async fn test_preimport_resumes_pending_rows_only() {
    let temp_dir = TempDir::new().unwrap();
    let store = setup_store(temp_dir.path()).await;
    store.set_cdx_data(1, "[]").await.unwrap();

    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cdx/search/cdx"))
        .and(query_param("url", "http://example.org/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let summary = run_preimport(&store, &client, &CatalogQuery::default(), None)
        .await
        .expect("Pre-import failed");
    assert_eq!(summary.fetched, 1);

    let first = store.get(1).await.unwrap().unwrap();
    assert_eq!(first.cdx_data.as_deref(), Some("[]"));

    store.close().await;
}

#[tokio::test]
async fn test_preimport_stops_on_first_failure() {
    let temp_dir = TempDir::new().unwrap();
    let store = setup_store(temp_dir.path()).await;

    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cdx/search/cdx"))
        .respond_with(ResponseTemplate::new(502))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let result = run_preimport(&store, &client, &CatalogQuery::default(), None).await;
    assert!(result.is_err());

    // Nothing was written, so the next run starts from the first row again.
    assert_eq!(store.pending().await.unwrap().len(), 2);

    store.close().await;
}

#[tokio::test]
async fn test_preimport_skips_known_urls() {
    let temp_dir = TempDir::new().unwrap();
    let store = setup_store(temp_dir.path()).await;
    let mock_server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path_regex(r"^/redirect/http%3A%2F%2Fmrshow\.com$"))
        .respond_with(ResponseTemplate::new(200))
        .with_priority(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("HEAD"))
        .and(path_regex(r"^/redirect/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/cdx/search/cdx"))
        .and(query_param("url", "http://example.org/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let checker = KnownUrlChecker::new(&mock_server.uri(), std::time::Duration::from_secs(5))
        .expect("Failed to create checker");

    let summary = run_preimport(&store, &client, &CatalogQuery::default(), Some(&checker))
        .await
        .expect("Pre-import failed");
    assert_eq!(summary.skipped_known, 1);
    assert_eq!(summary.fetched, 1);

    let known = store.get(1).await.unwrap().unwrap();
    let cdx: serde_json::Value = serde_json::from_str(known.cdx_data.as_deref().unwrap()).unwrap();
    assert_eq!(cdx[0]["note"], "skip, already in database");

    store.close().await;
}
