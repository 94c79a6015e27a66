//! End-to-end tests for the download pipeline against scripted sources.

use arxiv_mcp::models::{ErrorKind, PaperStatus};
use arxiv_mcp::pipeline::{DownloadOptions, Pipeline, PipelineConfig};
use arxiv_mcp::sources::{ArxivSource, MockFailure, MockSource};
use arxiv_mcp::store::PaperStore;
use arxiv_mcp::utils::HttpClient;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const PAPER_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
  <title>Sparse Attention at Scale</title>
  <meta name="citation_title" content="Sparse Attention at Scale">
  <meta name="citation_author" content="Ada Lovelace">
  <meta name="citation_author" content="Alan Turing">
</head>
<body>
  <nav class="ltx_page_navbar">Contents</nav>
  <article class="ltx_document">
    <h1 class="ltx_title ltx_title_document">Sparse Attention at Scale</h1>
    <div class="ltx_abstract"><h6>Abstract</h6><p>We study sparse attention.</p></div>
    <section class="ltx_section">
      <h2 class="ltx_title ltx_title_section">1 Results</h2>
      <p>Accuracy by model:</p>
      <table>
        <tr><th>Model</th><th>Acc</th></tr>
        <tr><td>Dense</td><td>81.2</td></tr>
        <tr><td>Sparse</td><td>82.0</td></tr>
      </table>
    </section>
  </article>
</body>
</html>"#;

async fn pipeline_with(source: Arc<MockSource>) -> (TempDir, Arc<Pipeline>) {
    pipeline_with_config(source, PipelineConfig::default()).await
}

async fn pipeline_with_config(
    source: Arc<MockSource>,
    config: PipelineConfig,
) -> (TempDir, Arc<Pipeline>) {
    let dir = TempDir::new().unwrap();
    let store = PaperStore::open(dir.path()).await.unwrap();
    let pipeline = Pipeline::new(source, Arc::new(store), config);
    (dir, Arc::new(pipeline))
}

async fn download_all(pipeline: &Arc<Pipeline>, ids: &[String]) {
    let handles: Vec<_> = ids
        .iter()
        .cloned()
        .map(|id| {
            let pipeline = Arc::clone(pipeline);
            tokio::spawn(async move { pipeline.download(&id, DownloadOptions::default()).await })
        })
        .collect();
    for handle in handles {
        let _ = handle.await.unwrap();
    }
}

#[tokio::test]
async fn test_download_then_read_full_paper() {
    let source = Arc::new(MockSource::new());
    source.add_page("2401.12345", PAPER_HTML);
    let (_dir, pipeline) = pipeline_with(Arc::clone(&source)).await;

    let record = pipeline
        .download("2401.12345", DownloadOptions::default())
        .await
        .unwrap();
    assert_eq!(record.status, PaperStatus::Success);
    assert_eq!(record.title.as_deref(), Some("Sparse Attention at Scale"));
    assert_eq!(record.authors, vec!["Ada Lovelace", "Alan Turing"]);
    assert!(record.resource_uri().unwrap().starts_with("file://"));

    let document = pipeline.read("arXiv:2401.12345").await.unwrap();
    assert_eq!(document.abstract_text.as_deref(), Some("We study sparse attention."));
    assert!(document.markdown.starts_with("# Sparse Attention at Scale\n"));
    assert!(document.markdown.contains("## 1 Results"));
    assert!(document
        .markdown
        .contains("| Model | Acc |\n| --- | --- |\n| Dense | 81.2 |\n| Sparse | 82.0 |"));
    assert!(!document.markdown.contains("Contents"));

    let on_disk = std::fs::read_to_string(record.path.unwrap()).unwrap();
    assert_eq!(on_disk, document.markdown);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_same_id_downloads_fetch_once() {
    let source = Arc::new(MockSource::new().with_delay(Duration::from_millis(50)));
    source.add_page("2401.12345", PAPER_HTML);
    let (_dir, pipeline) = pipeline_with(Arc::clone(&source)).await;

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let pipeline = Arc::clone(&pipeline);
            // Mix identifier spellings that resolve to the same paper
            let raw = if i % 2 == 0 {
                "2401.12345"
            } else {
                "https://arxiv.org/abs/2401.12345"
            };
            tokio::spawn(async move { pipeline.download(raw, DownloadOptions::default()).await })
        })
        .collect();

    let mut records = Vec::new();
    for handle in handles {
        records.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(source.fetch_count(), 1);
    assert!(records.iter().all(|r| r.is_success()));
    assert!(records.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(pipeline.list().await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_distinct_ids_are_independent() {
    let source = Arc::new(MockSource::new().with_delay(Duration::from_millis(50)));
    let ids: Vec<String> = (1..=6).map(|n| format!("2401.0000{}", n)).collect();
    for id in &ids {
        source.add_page(id, PAPER_HTML);
    }
    source.fail_next("2401.00003", MockFailure::NotFound);
    let (_dir, pipeline) = pipeline_with(Arc::clone(&source)).await;

    download_all(&pipeline, &ids).await;

    // Different ids must not serialize behind each other
    assert!(source.peak_concurrent_fetches() > 1);

    let records = pipeline.list().await.unwrap();
    assert_eq!(records.len(), 6);
    for record in &records {
        if record.paper_id.as_str() == "2401.00003" {
            assert_eq!(record.status, PaperStatus::Failed);
            assert_eq!(record.error_kind, Some(ErrorKind::NotFound));
        } else {
            assert_eq!(record.status, PaperStatus::Success);
        }
        assert_eq!(source.fetch_count_for(record.paper_id.as_str()), 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_fetch_concurrency_is_capped() {
    let source = Arc::new(MockSource::new().with_delay(Duration::from_millis(30)));
    let ids: Vec<String> = (1..=6).map(|n| format!("2401.0000{}", n)).collect();
    for id in &ids {
        source.add_page(id, PAPER_HTML);
    }
    let config = PipelineConfig::default().max_concurrent_fetches(2);
    let (_dir, pipeline) = pipeline_with_config(Arc::clone(&source), config).await;

    download_all(&pipeline, &ids).await;

    assert_eq!(source.fetch_count(), 6);
    assert!(source.peak_concurrent_fetches() <= 2);
    assert!(source.peak_concurrent_fetches() >= 1);
    let records = pipeline.list().await.unwrap();
    assert!(records.iter().all(|r| r.status == PaperStatus::Success));
}

#[tokio::test]
async fn test_outage_then_retry_recovers() {
    let source = Arc::new(MockSource::new());
    source.add_page("hep-th/9901001", PAPER_HTML);
    source.fail_next("hep-th/9901001", MockFailure::Unavailable);
    let (_dir, pipeline) = pipeline_with(Arc::clone(&source)).await;

    let err = pipeline
        .download("hep-th/9901001", DownloadOptions::default())
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert!(pipeline.read("hep-th/9901001").await.is_err());

    let record = pipeline
        .download("hep-th/9901001", DownloadOptions::default())
        .await
        .unwrap();
    assert!(record.is_success());
    assert!(pipeline.read("hep-th/9901001").await.is_ok());
    assert_eq!(source.fetch_count(), 2);
}

#[tokio::test]
async fn test_failed_refresh_hides_previous_document() {
    let source = Arc::new(MockSource::new());
    source.add_page("2401.12345", PAPER_HTML);
    let (_dir, pipeline) = pipeline_with(Arc::clone(&source)).await;

    pipeline
        .download("2401.12345", DownloadOptions::default())
        .await
        .unwrap();

    source.fail_next("2401.12345", MockFailure::Empty);
    let err = pipeline
        .download("2401.12345", DownloadOptions::force())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnexpectedResponse);

    let record = pipeline.status("2401.12345").await.unwrap().unwrap();
    assert!(record.is_failed());
    assert!(pipeline.read("2401.12345").await.is_err());
}

#[tokio::test]
async fn test_store_survives_reopen() {
    let source = Arc::new(MockSource::new());
    source.add_page("2401.12345", PAPER_HTML);
    let (dir, pipeline) = pipeline_with(Arc::clone(&source)).await;

    pipeline
        .download("2401.12345", DownloadOptions::default())
        .await
        .unwrap();
    let before = pipeline.read("2401.12345").await.unwrap();
    drop(pipeline);

    let store = PaperStore::open(dir.path()).await.unwrap();
    let reopened = Pipeline::new(source.clone(), Arc::new(store), PipelineConfig::default());
    let after = reopened.read("2401.12345").await.unwrap();
    assert_eq!(before, after);

    reopened
        .download("2401.12345", DownloadOptions::default())
        .await
        .unwrap();
    assert_eq!(source.fetch_count(), 1);
}

#[tokio::test]
async fn test_arxiv_source_over_http() {
    let mut server = mockito::Server::new_async().await;
    let page = server
        .mock("GET", "/2401.12345v2")
        .with_status(200)
        .with_header("content-type", "text/html; charset=utf-8")
        .with_body(PAPER_HTML)
        .expect(1)
        .create_async()
        .await;
    let missing = server
        .mock("GET", "/2401.99999")
        .with_status(404)
        .create_async()
        .await;

    let client = Arc::new(HttpClient::new(Duration::from_secs(5)).unwrap());
    let source = ArxivSource::with_client(client, &server.url(), &format!("{}/api/query", server.url()));

    let dir = TempDir::new().unwrap();
    let store = PaperStore::open(dir.path()).await.unwrap();
    let pipeline = Pipeline::new(Arc::new(source), Arc::new(store), PipelineConfig::default());

    let record = pipeline
        .download("arxiv.org/abs/2401.12345v2", DownloadOptions::default())
        .await
        .unwrap();
    assert!(record.is_success());
    assert_eq!(record.paper_id.as_str(), "2401.12345v2");

    let err = pipeline
        .download("2401.99999", DownloadOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    page.assert_async().await;
    missing.assert_async().await;
}
