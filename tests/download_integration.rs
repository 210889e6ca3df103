//! Integration tests for the download coordinator.
//!
//! These tests verify retry, challenge and PDF-resolution behaviour with mock
//! HTTP servers.

mod support;

use std::sync::Arc;

use crawler_core::discovery::SignatureClassifier;
use crawler_core::download::DownloadCoordinator;
use crawler_core::fetch::{HttpFetcher, Session};
use crawler_core::filter::{AcceptedArticle, admit};
use crawler_core::parser::CellParser;
use crawler_core::{ArticleRecord, CrawlRequest, CrawlerConfig, DownloadStatus, ErrorKind};
use support::socket_guard::start_mock_server_or_skip;
use support::{fixture, pdf_body, test_config};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn coordinator(config: &CrawlerConfig) -> DownloadCoordinator {
    DownloadCoordinator::from_config(
        config,
        Arc::new(CellParser::new().unwrap()),
        Arc::new(HttpFetcher::new()),
        Arc::new(SignatureClassifier::default()),
    )
}

fn accepted(server: &MockServer, pdf_path: Option<&str>) -> AcceptedArticle {
    let article = ArticleRecord {
        title: "Mitochondrial dynamics in aging".to_string(),
        source_url: format!("{}/cell/fulltext/S1", server.uri()),
        publication_year: 2022,
        is_open_access: true,
        pdf_url: pdf_path.map(|p| format!("{}{p}", server.uri())),
    };
    let request = CrawlRequest::new(["cell"], 2022, 2022, "unused");
    admit("cell", article, &request).unwrap()
}

#[tokio::test]
async fn test_transient_failure_is_retried_until_success() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/cell/pdf/S1.pdf"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cell/pdf/S1.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(pdf_body()))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let session = Session::new(&config, true).unwrap();
    let coordinator = coordinator(&config);
    let out = TempDir::new().unwrap();

    let outcome = coordinator
        .download(&accepted(&server, Some("/cell/pdf/S1.pdf")), out.path(), &session)
        .await;

    assert_eq!(outcome.status, DownloadStatus::Succeeded);
    assert_eq!(outcome.attempts, 3);
    assert_eq!(coordinator.stats().retried(), 2);
    assert_eq!(outcome.bytes_written, pdf_body().len() as u64);
}

#[tokio::test]
async fn test_transient_failure_exhausts_retry_budget() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/cell/pdf/S1.pdf"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let session = Session::new(&config, true).unwrap();
    let out = TempDir::new().unwrap();

    let outcome = coordinator(&config)
        .download(&accepted(&server, Some("/cell/pdf/S1.pdf")), out.path(), &session)
        .await;

    assert_eq!(outcome.status, DownloadStatus::Failed);
    assert_eq!(outcome.error, Some(ErrorKind::TransientNetworkError));
    assert_eq!(outcome.attempts, 3);
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/cell/pdf/S1.pdf"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let session = Session::new(&config, true).unwrap();
    let out = TempDir::new().unwrap();

    let outcome = coordinator(&config)
        .download(&accepted(&server, Some("/cell/pdf/S1.pdf")), out.path(), &session)
        .await;

    assert_eq!(outcome.status, DownloadStatus::Failed);
    assert_eq!(outcome.error, Some(ErrorKind::PermanentFetchError));
    assert_eq!(outcome.attempts, 1);
    assert!(outcome.local_path.is_none());
}

#[tokio::test]
async fn test_challenge_page_instead_of_pdf_is_not_retried() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/cell/pdf/S1.pdf"))
        .respond_with(ResponseTemplate::new(403).set_body_string(fixture("challenge.html")))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let session = Session::new(&config, true).unwrap();
    let out = TempDir::new().unwrap();

    let outcome = coordinator(&config)
        .download(&accepted(&server, Some("/cell/pdf/S1.pdf")), out.path(), &session)
        .await;

    assert_eq!(outcome.status, DownloadStatus::Failed);
    assert_eq!(outcome.error, Some(ErrorKind::ChallengeDetected));
    let journal_dir = out.path().join("cell");
    let leftovers: Vec<_> = std::fs::read_dir(&journal_dir).unwrap().collect();
    assert!(leftovers.is_empty(), "no file may remain after a challenge");
}

#[tokio::test]
async fn test_html_body_with_ok_status_is_rejected() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/cell/pdf/S1.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<html><body>Sign in to continue</body></html>", "text/html"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let session = Session::new(&config, true).unwrap();
    let out = TempDir::new().unwrap();

    let outcome = coordinator(&config)
        .download(&accepted(&server, Some("/cell/pdf/S1.pdf")), out.path(), &session)
        .await;

    assert_eq!(outcome.status, DownloadStatus::Failed);
    assert_eq!(outcome.error, Some(ErrorKind::PermanentFetchError));
}

#[tokio::test]
async fn test_rate_limited_download_honours_retry_after() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/cell/pdf/S1.pdf"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cell/pdf/S1.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(pdf_body()))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let session = Session::new(&config, true).unwrap();
    let out = TempDir::new().unwrap();

    let started = std::time::Instant::now();
    let outcome = coordinator(&config)
        .download(&accepted(&server, Some("/cell/pdf/S1.pdf")), out.path(), &session)
        .await;

    assert_eq!(outcome.status, DownloadStatus::Succeeded);
    assert_eq!(outcome.attempts, 2);
    assert!(started.elapsed() >= std::time::Duration::from_secs(1));
}

#[tokio::test]
async fn test_pdf_link_resolved_from_article_page() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/cell/fulltext/S1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<html><head><meta name="citation_pdf_url" content="{}/cell/pdf/S1.pdf"></head>
               <body><h1>Mitochondrial dynamics in aging</h1></body></html>"#,
            server.uri()
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cell/pdf/S1.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(pdf_body()))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let session = Session::new(&config, true).unwrap();
    let out = TempDir::new().unwrap();

    let outcome = coordinator(&config)
        .download(&accepted(&server, None), out.path(), &session)
        .await;

    assert_eq!(outcome.status, DownloadStatus::Succeeded);
    let local = outcome.local_path.unwrap();
    assert!(local.file_name().unwrap().to_str().unwrap().starts_with("2022_"));
    assert!(local.extension().is_some_and(|ext| ext == "pdf"));
}

#[tokio::test]
async fn test_article_page_without_pdf_link_fails_permanently() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/cell/fulltext/S1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>No PDF</body></html>"))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let session = Session::new(&config, true).unwrap();
    let out = TempDir::new().unwrap();

    let outcome = coordinator(&config)
        .download(&accepted(&server, None), out.path(), &session)
        .await;

    assert_eq!(outcome.status, DownloadStatus::Failed);
    assert_eq!(outcome.error, Some(ErrorKind::PermanentFetchError));
    assert_eq!(outcome.attempts, 1);
}
