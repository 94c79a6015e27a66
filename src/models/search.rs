//! Search request and response models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::PaperSummary;

/// Default number of search results
pub const DEFAULT_MAX_RESULTS: usize = 10;
/// arXiv caps a single query page at this many results
pub const MAX_RESULTS_LIMIT: usize = 200;

/// Sort field for search results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Relevance,
    Date,
}

impl std::str::FromStr for SortBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "relevance" => Ok(SortBy::Relevance),
            "date" | "submitted" | "submitteddate" => Ok(SortBy::Date),
            other => Err(format!("Unknown sort field '{}': use 'relevance' or 'date'", other)),
        }
    }
}

/// Search query parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Free text query; may use arXiv field prefixes such as `ti:` or `au:`
    pub query: String,

    /// Maximum number of results to return
    pub max_results: usize,

    /// Only papers submitted on or after this date
    pub date_from: Option<NaiveDate>,

    /// Only papers submitted on or before this date
    pub date_to: Option<NaiveDate>,

    /// arXiv categories (e.g. `cs.AI`), OR-ed together
    pub categories: Vec<String>,

    pub sort_by: SortBy,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            query: String::new(),
            max_results: DEFAULT_MAX_RESULTS,
            date_from: None,
            date_to: None,
            categories: Vec::new(),
            sort_by: SortBy::default(),
        }
    }
}

impl SearchQuery {
    /// Create a new search query
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// Set maximum results (clamped to what arXiv serves in one page)
    pub fn max_results(mut self, max: usize) -> Self {
        self.max_results = max.clamp(1, MAX_RESULTS_LIMIT);
        self
    }

    pub fn date_from(mut self, date: NaiveDate) -> Self {
        self.date_from = Some(date);
        self
    }

    pub fn date_to(mut self, date: NaiveDate) -> Self {
        self.date_to = Some(date);
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.categories.push(category.into());
        self
    }

    pub fn sort_by(mut self, sort: SortBy) -> Self {
        self.sort_by = sort;
        self
    }
}

/// Parse a `YYYY-MM-DD` date argument
pub fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| format!("Invalid date '{}' (expected YYYY-MM-DD): {}", raw, e))
}

/// Search response containing papers and metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Papers found
    pub papers: Vec<PaperSummary>,

    /// Total number of matches reported by the API (may exceed `papers.len()`)
    pub total_results: Option<usize>,

    /// Query that was executed
    pub query: String,
}

impl SearchResponse {
    pub fn new(papers: Vec<PaperSummary>, query: impl Into<String>) -> Self {
        Self {
            papers,
            total_results: None,
            query: query.into(),
        }
    }

    pub fn total_results(mut self, total: usize) -> Self {
        self.total_results = Some(total);
        self
    }
}
