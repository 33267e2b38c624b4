//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end through the real HTTP fetcher.

use doc_scribe::config::Config;
use doc_scribe::crawler::{run_crawl, CrawlReport, EventSink};
use doc_scribe::state::CrawlPhase;
use doc_scribe::storage::{RunStatus, SqliteStorage, Storage};
use std::path::Path;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration rooted at `<server>/docs`
fn create_test_config(base_url: &str, output: &Path) -> Config {
    let mut config = Config::for_url(&format!("{}/docs", base_url));
    config.crawler.max_depth = 2;
    config.crawler.delay_ms = 0;
    config.crawler.timeout_secs = 5;
    config.crawler.retries = 3;
    config.crawler.backoff_base_ms = 1;
    config.crawler.backoff_max_ms = 5;
    config.crawler.rate_limit_backoff_ms = 1;
    config.crawler.jitter = false;
    config.output.directory = output.to_path_buf();
    config
}

fn html_page(title: &str, body: &str) -> ResponseTemplate {
    let html = format!(
        "<html><head><title>{}</title></head><body><h1>{}</h1>{}</body></html>",
        title, title, body
    );
    ResponseTemplate::new(200).set_body_raw(html.into_bytes(), "text/html")
}

async fn mount_page(server: &MockServer, route: &str, title: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html_page(title, body))
        .mount(server)
        .await;
}

async fn crawl(config: &Config) -> CrawlReport {
    run_crawl(config, "test-hash", CancellationToken::new(), EventSink::none())
        .await
        .expect("Crawl failed")
}

#[tokio::test]
async fn test_full_crawl_writes_documents_and_manifest() {
    let mock_server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    mount_page(
        &mock_server,
        "/docs",
        "Home",
        r#"<a href="/docs/install">Install</a>
           <a href="/docs/api">API</a>
           <a href="https://elsewhere.org/page">Elsewhere</a>"#,
    )
    .await;
    mount_page(&mock_server, "/docs/install", "Install", "<p>Run the installer.</p>").await;
    mount_page(&mock_server, "/docs/api", "API", r#"<p>Endpoints.</p><a href="/docs">Home</a>"#)
        .await;

    let config = create_test_config(&mock_server.uri(), output.path());
    let report = crawl(&config).await;

    assert_eq!(report.pages_downloaded, 3);
    assert!(report.failed.is_empty(), "{:?}", report.failed);
    assert!(report.external_links.contains("https://elsewhere.org/page"));
    assert_eq!(report.phases.last(), Some(&CrawlPhase::Done));

    let install = std::fs::read_to_string(output.path().join("install.md")).unwrap();
    assert!(install.contains("Run the installer."));
    assert!(output.path().join("index.md").exists());
    assert!(output.path().join("api.md").exists());
    assert!(output.path().join("_metadata").join("install.json").exists());

    // Same-site links point at the saved copies, others stay live
    let home = std::fs::read_to_string(output.path().join("index.md")).unwrap();
    assert!(home.contains("(install.md)"), "{}", home);
    assert!(home.contains("(api.md)"), "{}", home);
    assert!(home.contains("(https://elsewhere.org/page)"), "{}", home);
    let api = std::fs::read_to_string(output.path().join("api.md")).unwrap();
    assert!(api.contains("(index.md)"), "{}", api);

    let index = std::fs::read_to_string(output.path().join("_index.md")).unwrap();
    assert!(index.contains("# Documentation Index"));
    assert!(index.contains("[Install](install.md)"));

    let storage = SqliteStorage::new(&config.output.resolved_database_path()).unwrap();
    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.config_hash, "test-hash");
    assert_eq!(run.pages_downloaded, 3);
    assert_eq!(storage.count_documents(run.id).unwrap(), 3);
}

#[tokio::test]
async fn test_redirect_onto_known_page_saved_once() {
    let mock_server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    mount_page(
        &mock_server,
        "/docs",
        "Home",
        r#"<a href="/docs/old">Old</a><a href="/docs/intro">Intro</a>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/docs/old"))
        .respond_with(
            ResponseTemplate::new(301)
                .insert_header("location", format!("{}/docs/intro", mock_server.uri()).as_str()),
        )
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, "/docs/intro", "Intro", "<p>Welcome.</p>").await;

    let config = create_test_config(&mock_server.uri(), output.path());
    let report = crawl(&config).await;

    assert_eq!(report.pages_downloaded, 2);
    assert!(report.failed.is_empty(), "{:?}", report.failed);

    let saved: Vec<String> = std::fs::read_dir(output.path())
        .unwrap()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".md") && name != "_index.md")
        .collect();
    assert_eq!(saved.len(), 2, "{:?}", saved);
    assert!(output.path().join("intro.md").exists());

    let storage = SqliteStorage::new(&config.output.resolved_database_path()).unwrap();
    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(storage.count_documents(run.id).unwrap(), 2);
}

#[tokio::test]
async fn test_crawl_with_depth_limit() {
    let mock_server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    // Chain: /docs -> /docs/level1 -> /docs/level2
    mount_page(&mock_server, "/docs", "Root", r#"<a href="/docs/level1">1</a>"#).await;
    mount_page(&mock_server, "/docs/level1", "Level 1", r#"<a href="/docs/level2">2</a>"#).await;

    Mock::given(method("GET"))
        .and(path("/docs/level2"))
        .respond_with(html_page("Level 2", ""))
        .expect(0)
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(&mock_server.uri(), output.path());
    config.crawler.max_depth = 1;
    let report = crawl(&config).await;

    assert_eq!(report.pages_downloaded, 2);
    assert!(report
        .doc_links
        .contains(&format!("{}/docs/level2", mock_server.uri())));
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let mock_server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    mount_page(&mock_server, "/docs", "Root", r#"<a href="/docs/missing">Gone</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/docs/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), output.path());
    let report = crawl(&config).await;

    let missing = format!("{}/docs/missing", mock_server.uri());
    assert_eq!(
        report.failed.get(&missing).map(String::as_str),
        Some("404 Not Found")
    );
    assert_eq!(report.pages_downloaded, 1);

    let storage = SqliteStorage::new(&config.output.resolved_database_path()).unwrap();
    let run = storage.get_latest_run().unwrap().unwrap();
    let failures = storage.list_failures(run.id).unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].url, missing);
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let mock_server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    mount_page(&mock_server, "/docs", "Root", r#"<a href="/docs/flaky">Flaky</a>"#).await;

    // Two failures, then success: three requests in total
    Mock::given(method("GET"))
        .and(path("/docs/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs/flaky"))
        .respond_with(html_page("Flaky", "<p>Eventually.</p>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), output.path());
    let report = crawl(&config).await;

    assert_eq!(report.pages_downloaded, 2);
    assert!(report.failed.is_empty(), "{:?}", report.failed);
}

#[tokio::test]
async fn test_retries_exhausted() {
    let mock_server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    mount_page(&mock_server, "/docs", "Root", r#"<a href="/docs/down">Down</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/docs/down"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(&mock_server.uri(), output.path());
    config.crawler.retries = 1;
    let report = crawl(&config).await;

    let down = format!("{}/docs/down", mock_server.uri());
    assert_eq!(report.failed.get(&down).map(String::as_str), Some("HTTP 500"));
}

#[tokio::test]
async fn test_url_filter_excludes_links() {
    let mock_server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    mount_page(
        &mock_server,
        "/docs",
        "Root",
        r#"<a href="/docs/public">Public</a><a href="/docs/internal/notes">Internal</a>"#,
    )
    .await;
    mount_page(&mock_server, "/docs/public", "Public", "<p>Hello.</p>").await;
    Mock::given(method("GET"))
        .and(path("/docs/internal/notes"))
        .respond_with(html_page("Internal", ""))
        .expect(0)
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(&mock_server.uri(), output.path());
    config.filters.url_exclude = vec!["/internal/".to_string()];
    let report = crawl(&config).await;

    assert_eq!(report.pages_downloaded, 2);
    assert!(report.failed.is_empty());
}

#[tokio::test]
async fn test_page_cap() {
    let mock_server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    mount_page(
        &mock_server,
        "/docs",
        "Root",
        r#"<a href="/docs/a">A</a><a href="/docs/b">B</a><a href="/docs/c">C</a>"#,
    )
    .await;
    for page in ["a", "b", "c"] {
        mount_page(&mock_server, &format!("/docs/{}", page), page, "<p>Page.</p>").await;
    }

    let mut config = create_test_config(&mock_server.uri(), output.path());
    config.crawler.max_pages = Some(2);
    let report = crawl(&config).await;

    assert_eq!(report.pages_downloaded, 2);
    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
}

#[tokio::test]
async fn test_auxiliary_links_not_crawled_without_interaction() {
    let mock_server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    mount_page(
        &mock_server,
        "/docs",
        "Root",
        r#"<a href="/docs/guide">Guide</a><a href="/pricing">Pricing</a><a href="/blog/news">Blog</a>"#,
    )
    .await;
    mount_page(&mock_server, "/docs/guide", "Guide", "<p>Read me.</p>").await;
    Mock::given(method("GET"))
        .and(path("/pricing"))
        .respond_with(html_page("Pricing", ""))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), output.path());
    let report = crawl(&config).await;

    assert_eq!(report.pages_downloaded, 2);
    assert!(report
        .aux_links
        .contains(&format!("{}/pricing", mock_server.uri())));
    assert_eq!(report.aux_links.len(), 2);
    assert!(!report.phases.contains(&CrawlPhase::CrawlingAuxiliary));
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let mock_server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(html_page("Any", ""))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), output.path());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = run_crawl(&config, "test-hash", cancel, EventSink::none())
        .await
        .expect("Crawl failed");

    assert!(report.cancelled);
    assert_eq!(report.pages_downloaded, 0);

    let storage = SqliteStorage::new(&config.output.resolved_database_path()).unwrap();
    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Cancelled);
}

#[tokio::test]
async fn test_assets_are_saved() {
    let mock_server = MockServer::start().await;
    let output = TempDir::new().unwrap();

    mount_page(
        &mock_server,
        "/docs",
        "Root",
        r#"<img src="/static/images/diagram.png"><link rel="stylesheet" href="/static/site.css">"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/static/images/diagram.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0x89, 0x50, 0x4e, 0x47], "image/png"))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/static/site.css"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("body{}".as_bytes().to_vec(), "text/css"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(&mock_server.uri(), output.path());
    config.crawler.include_assets = true;
    let report = crawl(&config).await;

    assert_eq!(report.assets_downloaded, 2);
    assert!(output.path().join("assets/images/diagram.png").exists());
    assert!(output.path().join("assets/css/site.css").exists());
}

#[tokio::test]
async fn test_invalid_start_url_is_rejected() {
    let output = TempDir::new().unwrap();
    let mut config = Config::for_url("not a url");
    config.output.directory = output.path().to_path_buf();

    let result = run_crawl(&config, "h", CancellationToken::new(), EventSink::none()).await;
    assert!(result.is_err());
}
