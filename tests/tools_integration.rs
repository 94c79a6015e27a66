//! MCP tool handlers exercised through the registry.

use arxiv_mcp::mcp::{McpServer, ToolRegistry};
use arxiv_mcp::models::{PaperSummary, SearchResponse};
use arxiv_mcp::pipeline::{Pipeline, PipelineConfig};
use arxiv_mcp::sources::{MockFailure, MockSource};
use arxiv_mcp::store::PaperStore;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

const PAGE: &str = "<html><head><title>Graph Transformers</title></head>\
    <body><h1>Graph Transformers</h1><p>We propose <em>graph</em> attention.</p></body></html>";

async fn setup() -> (TempDir, Arc<MockSource>, Arc<Pipeline>) {
    let dir = TempDir::new().unwrap();
    let store = PaperStore::open(dir.path()).await.unwrap();
    let source = Arc::new(MockSource::new());
    let pipeline = Arc::new(Pipeline::new(
        source.clone(),
        Arc::new(store),
        PipelineConfig::default(),
    ));
    (dir, source, pipeline)
}

#[tokio::test]
async fn test_download_list_read_flow() {
    let (_dir, source, pipeline) = setup().await;
    source.add_page("2402.00001", PAGE);
    let tools = ToolRegistry::new(pipeline);

    let status = tools
        .execute("download_paper", json!({"paper_id": "2402.00001", "check_status": true}))
        .await
        .unwrap();
    assert_eq!(status["status"], "unknown");
    assert_eq!(source.fetch_count(), 0);

    let downloaded = tools
        .execute("download_paper", json!({"paper_id": "arXiv:2402.00001"}))
        .await
        .unwrap();
    assert_eq!(downloaded["status"], "success");
    assert_eq!(downloaded["paper_id"], "2402.00001");
    assert_eq!(downloaded["title"], "Graph Transformers");
    assert!(downloaded["resource_uri"]
        .as_str()
        .unwrap()
        .starts_with("file://"));

    let listed = tools.execute("list_papers", json!({})).await.unwrap();
    assert_eq!(listed["total"], 1);
    assert_eq!(listed["papers"][0]["paper_id"], "2402.00001");

    let read = tools
        .execute("read_paper", json!({"paper_id": "2402.00001"}))
        .await
        .unwrap();
    assert_eq!(read["status"], "success");
    assert_eq!(
        read["content"],
        "# Graph Transformers\n\nWe propose *graph* attention.\n"
    );

    let status = tools
        .execute("download_paper", json!({"paper_id": "2402.00001", "check_status": true}))
        .await
        .unwrap();
    assert_eq!(status["status"], "success");
    assert_eq!(source.fetch_count(), 1);
}

#[tokio::test]
async fn test_download_failure_is_reported_in_result() {
    let (_dir, source, pipeline) = setup().await;
    source.add_page("2402.00001", PAGE);
    source.fail_next("2402.00001", MockFailure::Unavailable);
    let tools = ToolRegistry::new(pipeline);

    let failed = tools
        .execute("download_paper", json!({"paper_id": "2402.00001"}))
        .await
        .unwrap();
    assert_eq!(failed["status"], "failed");
    assert_eq!(failed["error_kind"], "unavailable");
    assert_eq!(failed["retryable"], true);

    let invalid = tools
        .execute("download_paper", json!({"paper_id": "not a paper"}))
        .await
        .unwrap();
    assert_eq!(invalid["status"], "failed");
    assert_eq!(invalid["error_kind"], "invalid_identifier");

    let retried = tools
        .execute("download_paper", json!({"paper_id": "2402.00001"}))
        .await
        .unwrap();
    assert_eq!(retried["status"], "success");
}

#[tokio::test]
async fn test_failed_refresh_drops_resource_uri() {
    let (_dir, source, pipeline) = setup().await;
    source.add_page("2402.00001", PAGE);
    let tools = ToolRegistry::new(pipeline);

    let downloaded = tools
        .execute("download_paper", json!({"paper_id": "2402.00001"}))
        .await
        .unwrap();
    assert!(downloaded["resource_uri"].is_string());

    source.fail_next("2402.00001", MockFailure::Unavailable);
    let refreshed = tools
        .execute("download_paper", json!({"paper_id": "2402.00001", "force": true}))
        .await
        .unwrap();
    assert_eq!(refreshed["status"], "failed");

    let status = tools
        .execute("download_paper", json!({"paper_id": "2402.00001", "check_status": true}))
        .await
        .unwrap();
    assert_eq!(status["status"], "failed");
    assert!(status.get("resource_uri").is_none());

    let listed = tools.execute("list_papers", json!({})).await.unwrap();
    assert_eq!(listed["papers"][0]["status"], "failed");
    assert!(listed["papers"][0].get("resource_uri").is_none());

    let read = tools
        .execute("read_paper", json!({"paper_id": "2402.00001"}))
        .await
        .unwrap();
    assert_eq!(read["status"], "error");
    assert_eq!(read["error_kind"], "not_found");
}

#[tokio::test]
async fn test_read_before_download() {
    let (_dir, _source, pipeline) = setup().await;
    let tools = ToolRegistry::new(pipeline);

    let read = tools
        .execute("read_paper", json!({"paper_id": "2402.00001"}))
        .await
        .unwrap();
    assert_eq!(read["status"], "error");
    assert_eq!(read["error_kind"], "not_found");
    assert!(read["error"]
        .as_str()
        .unwrap()
        .contains("Please download it first"));
}

#[tokio::test]
async fn test_missing_arguments_are_errors() {
    let (_dir, _source, pipeline) = setup().await;
    let tools = ToolRegistry::new(pipeline);

    assert!(tools.execute("download_paper", json!({})).await.is_err());
    assert!(tools.execute("read_paper", json!({"paper_id": 1})).await.is_err());
    assert!(tools.execute("search_papers", json!({})).await.is_err());
    assert!(tools
        .execute("search_papers", json!({"query": "q", "date_from": "yesterday"}))
        .await
        .is_err());
    assert!(tools
        .execute(
            "search_papers",
            json!({"query": "q", "date_from": "2024-02-01", "date_to": "2024-01-01"})
        )
        .await
        .is_err());
    assert!(tools
        .execute("search_papers", json!({"query": "q", "sort_by": "citations"}))
        .await
        .is_err());
}

#[tokio::test]
async fn test_search_papers() {
    let (_dir, source, pipeline) = setup().await;
    let mut hit = PaperSummary::new(
        "2402.00001",
        "Graph Transformers",
        "https://arxiv.org/abs/2402.00001",
    );
    hit.authors = vec!["Ada Lovelace".to_string()];
    source.set_search_response(SearchResponse::new(vec![hit], "all:graph").total_results(42));
    let tools = ToolRegistry::new(pipeline);

    let result = tools
        .execute(
            "search_papers",
            json!({
                "query": "graph",
                "max_results": 5,
                "categories": ["cs.LG"],
                "date_from": "2024-01-01",
                "sort_by": "date"
            }),
        )
        .await
        .unwrap();
    assert_eq!(result["returned"], 1);
    assert_eq!(result["total_results"], 42);
    assert_eq!(result["papers"][0]["paper_id"], "2402.00001");
    assert_eq!(result["papers"][0]["authors"][0], "Ada Lovelace");
}

#[tokio::test]
async fn test_server_builds_from_pipeline() {
    let (_dir, _source, pipeline) = setup().await;
    assert!(McpServer::new(pipeline).is_ok());
}
