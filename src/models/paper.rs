//! Paper documents, catalog records and search summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::PaperId;

/// Download status of a paper in the local catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaperStatus {
    Pending,
    Success,
    Failed,
}

impl PaperStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaperStatus::Pending => "pending",
            PaperStatus::Success => "success",
            PaperStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PaperStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified failure reason stored on failed records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidIdentifier,
    NotFound,
    Unavailable,
    UnexpectedResponse,
    ConversionError,
    StorageError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidIdentifier => "invalid_identifier",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::UnexpectedResponse => "unexpected_response",
            ErrorKind::ConversionError => "conversion_error",
            ErrorKind::StorageError => "storage_error",
        }
    }

    /// Whether retrying the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Unavailable)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A converted paper: markdown plus best-effort metadata
///
/// Documents are immutable once created; downloading the same paper again
/// produces a new document that replaces the stored one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperDocument {
    pub paper_id: PaperId,
    pub title: Option<String>,
    pub authors: Vec<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub markdown: String,
    pub converted_at: DateTime<Utc>,
}

impl PaperDocument {
    pub fn new(paper_id: PaperId, markdown: impl Into<String>, converted_at: DateTime<Utc>) -> Self {
        Self {
            paper_id,
            title: None,
            authors: Vec::new(),
            abstract_text: None,
            markdown: markdown.into(),
            converted_at,
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn authors(mut self, authors: Vec<String>) -> Self {
        self.authors = authors;
        self
    }

    pub fn abstract_text(mut self, abstract_text: impl Into<String>) -> Self {
        self.abstract_text = Some(abstract_text.into());
        self
    }
}

/// Catalog entry for one paper in the local store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperRecord {
    pub paper_id: PaperId,
    pub status: PaperStatus,

    /// Markdown location; set only once a document has been stored
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub authors: Vec<String>,

    /// Reason string for failed downloads
    #[serde(default)]
    pub error: Option<String>,

    #[serde(default)]
    pub error_kind: Option<ErrorKind>,

    pub updated_at: DateTime<Utc>,
}

impl PaperRecord {
    pub fn new(paper_id: PaperId, status: PaperStatus, updated_at: DateTime<Utc>) -> Self {
        Self {
            paper_id,
            status,
            path: None,
            title: None,
            authors: Vec::new(),
            error: None,
            error_kind: None,
            updated_at,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == PaperStatus::Success
    }

    pub fn is_pending(&self) -> bool {
        self.status == PaperStatus::Pending
    }

    pub fn is_failed(&self) -> bool {
        self.status == PaperStatus::Failed
    }

    /// `file://` URI of the stored markdown. Only a successful record has one;
    /// a failed refresh can leave stale markdown behind that is not served.
    pub fn resource_uri(&self) -> Option<String> {
        if !self.is_success() {
            return None;
        }
        self.path.as_deref().and_then(file_uri)
    }
}

fn file_uri(path: &Path) -> Option<String> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().ok()?.join(path)
    };
    url::Url::from_file_path(&absolute)
        .ok()
        .map(|u| u.to_string())
}

/// A search hit from the arXiv query API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperSummary {
    pub paper_id: String,
    pub title: String,
    pub authors: Vec<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub categories: Vec<String>,
    pub published: Option<String>,
    pub updated: Option<String>,
    pub url: String,
    pub pdf_url: Option<String>,
}

impl PaperSummary {
    pub fn new(paper_id: impl Into<String>, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            paper_id: paper_id.into(),
            title: title.into(),
            authors: Vec::new(),
            abstract_text: String::new(),
            categories: Vec::new(),
            published: None,
            updated: None,
            url: url.into(),
            pdf_url: None,
        }
    }
}
