//! Tool handlers backed by the conversion pipeline.

use std::sync::Arc;

use serde_json::{json, Value};

use super::tools::ToolHandler;
use crate::models::{parse_date, PaperRecord, SearchQuery, SortBy, DEFAULT_MAX_RESULTS};
use crate::pipeline::{DownloadOptions, Pipeline, PipelineError};

fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, String> {
    args.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| format!("Missing '{}' parameter", key))
}

fn flag(args: &Value, key: &str) -> bool {
    args.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
}

/// Record JSON, with `resource_uri` added for successful downloads
fn record_json(record: &PaperRecord) -> Result<Value, String> {
    let mut value = serde_json::to_value(record).map_err(|e| e.to_string())?;
    if let (Some(uri), Some(map)) = (record.resource_uri(), value.as_object_mut()) {
        map.insert("resource_uri".to_string(), Value::String(uri));
    }
    Ok(value)
}

fn failure_json(paper_id: &str, err: &PipelineError) -> Value {
    json!({
        "status": "failed",
        "paper_id": paper_id,
        "error": err.to_string(),
        "error_kind": err.kind(),
        "retryable": err.is_retryable(),
    })
}

/// Accepts `["cs.AI", "cs.LG"]` or `"cs.AI, cs.LG"`
fn categories(args: &Value) -> Vec<String> {
    match args.get("categories").or_else(|| args.get("category")) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// Handler for `search_papers`
#[derive(Debug)]
pub struct SearchPapersHandler {
    pub pipeline: Arc<Pipeline>,
}

#[async_trait::async_trait]
impl ToolHandler for SearchPapersHandler {
    async fn execute(&self, args: Value) -> Result<Value, String> {
        let query = required_str(&args, "query")?;

        let max_results = args
            .get("max_results")
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_MAX_RESULTS);

        let mut search_query = SearchQuery::new(query).max_results(max_results);

        if let Some(raw) = args.get("date_from").and_then(|v| v.as_str()) {
            search_query = search_query.date_from(parse_date(raw)?);
        }
        if let Some(raw) = args.get("date_to").and_then(|v| v.as_str()) {
            search_query = search_query.date_to(parse_date(raw)?);
        }
        if let (Some(from), Some(to)) = (search_query.date_from, search_query.date_to) {
            if from > to {
                return Err(format!("date_from {} is after date_to {}", from, to));
            }
        }

        for category in categories(&args) {
            search_query = search_query.category(category);
        }

        if let Some(raw) = args.get("sort_by").and_then(|v| v.as_str()) {
            search_query = search_query.sort_by(raw.parse::<SortBy>()?);
        }

        tracing::debug!("search_papers: {:?}", search_query);

        let response = self
            .pipeline
            .source()
            .search(&search_query)
            .await
            .map_err(|e| format!("Search failed: {}", e))?;

        Ok(json!({
            "returned": response.papers.len(),
            "total_results": response.total_results,
            "query": response.query,
            "papers": response.papers,
        }))
    }
}

/// Handler for `download_paper`
#[derive(Debug)]
pub struct DownloadPaperHandler {
    pub pipeline: Arc<Pipeline>,
}

#[async_trait::async_trait]
impl ToolHandler for DownloadPaperHandler {
    async fn execute(&self, args: Value) -> Result<Value, String> {
        let paper_id = required_str(&args, "paper_id")?;

        if flag(&args, "check_status") {
            return match self.pipeline.status(paper_id).await {
                Ok(Some(record)) => record_json(&record),
                Ok(None) => Ok(json!({
                    "status": "unknown",
                    "paper_id": paper_id,
                    "message": "Paper has not been downloaded",
                })),
                Err(err) => Ok(failure_json(paper_id, &err)),
            };
        }

        let options = DownloadOptions {
            force: flag(&args, "force"),
        };

        match self.pipeline.download(paper_id, options).await {
            Ok(record) => record_json(&record),
            Err(err) => Ok(failure_json(paper_id, &err)),
        }
    }
}

/// Handler for `list_papers`
#[derive(Debug)]
pub struct ListPapersHandler {
    pub pipeline: Arc<Pipeline>,
}

#[async_trait::async_trait]
impl ToolHandler for ListPapersHandler {
    async fn execute(&self, _args: Value) -> Result<Value, String> {
        let records = self
            .pipeline
            .list()
            .await
            .map_err(|e| format!("Failed to list papers: {}", e))?;

        let papers = records
            .iter()
            .map(record_json)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(json!({
            "total": papers.len(),
            "papers": papers,
        }))
    }
}

/// Handler for `read_paper`
#[derive(Debug)]
pub struct ReadPaperHandler {
    pub pipeline: Arc<Pipeline>,
}

#[async_trait::async_trait]
impl ToolHandler for ReadPaperHandler {
    async fn execute(&self, args: Value) -> Result<Value, String> {
        let paper_id = required_str(&args, "paper_id")?;

        match self.pipeline.read(paper_id).await {
            Ok(document) => Ok(json!({
                "status": "success",
                "paper_id": document.paper_id,
                "title": document.title,
                "authors": document.authors,
                "content": document.markdown,
            })),
            Err(err) => Ok(json!({
                "status": "error",
                "paper_id": paper_id,
                "error": err.to_string(),
                "error_kind": err.kind(),
            })),
        }
    }
}
