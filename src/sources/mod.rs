//! Upstream paper sources.
//!
//! The [`Source`] trait is the seam between the pipeline and the network:
//! [`ArxivSource`] talks to arxiv.org, [`MockSource`] serves canned pages in
//! tests. A source fetches exactly once per call; retry policy belongs to
//! the caller.

mod arxiv;
pub mod mock;

pub use arxiv::{ArxivSource, ARXIV_API_URL, ARXIV_HTML_URL};
pub use mock::{MockFailure, MockSource};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;

use crate::models::{PaperId, SearchQuery, SearchResponse};

bitflags::bitflags! {
    /// Capabilities that a source can support
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SourceCapabilities: u32 {
        const SEARCH = 1 << 0;
        const FETCH = 1 << 1;
    }
}

/// Raw HTML retrieved for one paper
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub paper_id: PaperId,
    pub url: String,
    pub html: String,
    pub content_type: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

/// A provider of paper content and, optionally, search.
#[async_trait]
pub trait Source: Send + Sync + std::fmt::Debug {
    /// Short identifier (e.g. "arxiv")
    fn id(&self) -> &str;

    /// Human-readable name
    fn name(&self) -> &str;

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::FETCH
    }

    fn supports_search(&self) -> bool {
        self.capabilities().contains(SourceCapabilities::SEARCH)
    }

    /// Search for papers matching the query
    async fn search(&self, _query: &SearchQuery) -> Result<SearchResponse, SourceError> {
        Err(SourceError::NotImplemented)
    }

    /// Retrieve the rendered HTML of a paper, one attempt, no retry
    async fn fetch(&self, _id: &PaperId) -> Result<FetchResult, SourceError> {
        Err(SourceError::NotImplemented)
    }
}

/// Errors that can occur when interacting with a source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Operation not implemented for this source")]
    NotImplemented,

    /// The paper (or its HTML rendering) does not exist upstream
    #[error("Paper not found: {0}")]
    NotFound(String),

    /// Transient failure: timeout, connection error, throttling, 5xx
    #[error("Source unavailable: {0}")]
    Unavailable(String),

    /// The upstream answered, but not with something usable
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Parsing error (Atom feed)
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Error: {0}")]
    Other(String),
}

impl SourceError {
    /// Whether a later attempt may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, SourceError::Unavailable(_))
    }

    /// Classify a non-success HTTP status
    pub fn from_status(status: StatusCode, what: &str) -> Self {
        match status {
            StatusCode::NOT_FOUND | StatusCode::GONE => SourceError::NotFound(what.to_string()),
            StatusCode::TOO_MANY_REQUESTS => {
                SourceError::Unavailable(format!("{}: rate limited (HTTP 429)", what))
            }
            s if s.is_server_error() => {
                SourceError::Unavailable(format!("{}: server error (HTTP {})", what, s.as_u16()))
            }
            s => SourceError::UnexpectedResponse(format!("{}: HTTP {}", what, s.as_u16())),
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Unavailable(format!("request timed out: {}", err))
        } else if err.is_connect() {
            SourceError::Unavailable(format!("connection failed: {}", err))
        } else if let Some(status) = err.status() {
            SourceError::from_status(status, &err.to_string())
        } else if err.is_decode() || err.is_body() {
            SourceError::Unavailable(format!("failed to read response body: {}", err))
        } else {
            SourceError::Unavailable(err.to_string())
        }
    }
}
