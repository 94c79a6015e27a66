//! Tool registry for MCP tools.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::models::{DEFAULT_MAX_RESULTS, MAX_RESULTS_LIMIT};
use crate::pipeline::Pipeline;

use super::handlers::{
    DownloadPaperHandler, ListPapersHandler, ReadPaperHandler, SearchPapersHandler,
};

/// An MCP tool that can be called by the client
#[derive(Clone)]
pub struct Tool {
    /// Tool name (e.g., "download_paper")
    pub name: String,

    /// Human-readable description
    pub description: String,

    /// JSON Schema for input parameters
    pub input_schema: serde_json::Value,

    pub handler: Arc<dyn ToolHandler>,
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("input_schema", &self.input_schema)
            .finish()
    }
}

/// Handler for executing a tool
///
/// `Err` is reserved for malformed arguments. Download and read failures
/// are reported inside the returned JSON so the client can act on them.
#[async_trait::async_trait]
pub trait ToolHandler: Send + Sync + std::fmt::Debug {
    async fn execute(&self, args: Value) -> Result<Value, String>;
}

/// Registry for all MCP tools
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Tool>,
}

impl ToolRegistry {
    /// Create a registry with every tool backed by the given pipeline
    ///
    /// `search_papers` is only registered when the pipeline's source can
    /// search.
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        let mut registry = Self {
            tools: HashMap::new(),
        };

        if pipeline.source().supports_search() {
            registry.register(Tool {
                name: "search_papers".to_string(),
                description: format!(
                    "Search arXiv for papers. Supports field prefixes (ti:, au:, abs:, cat:), \
                     date bounds and category filters. Returns at most {} results.",
                    MAX_RESULTS_LIMIT
                ),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "Search query, e.g. 'attention transformers' or 'au:hinton AND ti:capsule'"
                        },
                        "max_results": {
                            "type": "integer",
                            "description": "Maximum number of results",
                            "default": DEFAULT_MAX_RESULTS,
                            "minimum": 1,
                            "maximum": MAX_RESULTS_LIMIT
                        },
                        "date_from": {
                            "type": "string",
                            "description": "Earliest submission date (YYYY-MM-DD)"
                        },
                        "date_to": {
                            "type": "string",
                            "description": "Latest submission date (YYYY-MM-DD)"
                        },
                        "categories": {
                            "type": "array",
                            "items": { "type": "string" },
                            "description": "arXiv categories to filter by (e.g. ['cs.AI', 'cs.LG'])"
                        },
                        "sort_by": {
                            "type": "string",
                            "enum": ["relevance", "date"],
                            "default": "relevance"
                        }
                    },
                    "required": ["query"]
                }),
                handler: Arc::new(SearchPapersHandler {
                    pipeline: pipeline.clone(),
                }),
            });
        }

        registry.register(Tool {
            name: "download_paper".to_string(),
            description: "Download an arXiv paper's HTML rendering and convert it to markdown. \
                          Already downloaded papers are returned without refetching unless \
                          'force' is set."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "paper_id": {
                        "type": "string",
                        "description": "arXiv identifier, e.g. '2401.12345', '2401.12345v2', 'hep-th/9901001' or an arxiv.org URL"
                    },
                    "check_status": {
                        "type": "boolean",
                        "description": "Only report the current status, without downloading",
                        "default": false
                    },
                    "force": {
                        "type": "boolean",
                        "description": "Fetch and convert again even if already stored",
                        "default": false
                    }
                },
                "required": ["paper_id"]
            }),
            handler: Arc::new(DownloadPaperHandler {
                pipeline: pipeline.clone(),
            }),
        });

        registry.register(Tool {
            name: "list_papers".to_string(),
            description: "List papers in the local store with their download status.".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
            handler: Arc::new(ListPapersHandler {
                pipeline: pipeline.clone(),
            }),
        });

        registry.register(Tool {
            name: "read_paper".to_string(),
            description: "Read the markdown content of a downloaded paper.".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "paper_id": {
                        "type": "string",
                        "description": "arXiv identifier of a previously downloaded paper"
                    }
                },
                "required": ["paper_id"]
            }),
            handler: Arc::new(ReadPaperHandler { pipeline }),
        });

        registry
    }

    /// Register a tool
    pub fn register(&mut self, tool: Tool) {
        self.tools.insert(tool.name.clone(), tool);
    }

    /// All tools, sorted by name
    pub fn all(&self) -> Vec<&Tool> {
        let mut tools: Vec<&Tool> = self.tools.values().collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.get(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool by name
    pub async fn execute(&self, name: &str, args: Value) -> Result<Value, String> {
        let tool = self
            .get(name)
            .ok_or_else(|| format!("Tool '{}' not found", name))?;

        tool.handler.execute(args).await
    }
}
