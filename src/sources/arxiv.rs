//! arXiv source: HTML renderings and the Atom query API.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use feed_rs::parser;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use std::sync::Arc;
use std::time::Duration;

use crate::config::FetchConfig;
use crate::models::{PaperId, PaperSummary, SearchQuery, SearchResponse, SortBy};
use crate::sources::{FetchResult, Source, SourceCapabilities, SourceError};
use crate::utils::HttpClient;

/// Base URL for arXiv HTML renderings
pub const ARXIV_HTML_URL: &str = "https://arxiv.org/html";
/// Base URL for the arXiv query API
pub const ARXIV_API_URL: &str = "http://export.arxiv.org/api/query";

/// Earliest submission date used when only an upper bound is given
const ARXIV_EPOCH: &str = "19910101";

/// arXiv research source
///
/// Supports:
/// - Search through the Atom API
/// - Fetching the HTML rendering of a paper
#[derive(Debug, Clone)]
pub struct ArxivSource {
    client: Arc<HttpClient>,
    html_base_url: String,
    api_url: String,
}

impl ArxivSource {
    /// Create a new arXiv source from fetch settings
    pub fn new(config: &FetchConfig) -> Result<Self, SourceError> {
        let client = HttpClient::new(Duration::from_secs(config.timeout_seconds))?;
        Ok(Self::with_client(
            Arc::new(client),
            &config.html_base_url,
            &config.api_url,
        ))
    }

    /// Create with a custom HTTP client and endpoints (for testing)
    pub fn with_client(client: Arc<HttpClient>, html_base_url: &str, api_url: &str) -> Self {
        Self {
            client,
            html_base_url: html_base_url.trim_end_matches('/').to_string(),
            api_url: api_url.to_string(),
        }
    }

    pub fn html_base_url(&self) -> &str {
        &self.html_base_url
    }

    /// Build the `search_query` expression for the arXiv API
    ///
    /// Plain words become AND-ed `all:` terms; a query that already uses
    /// field prefixes (`ti:`, `au:`, …) or boolean operators is passed
    /// through unchanged.
    fn build_search_query(query: &SearchQuery, today: NaiveDate) -> String {
        let mut parts = Vec::new();

        let text = query.query.trim();
        if !text.is_empty() {
            if text.contains(':') || text.contains(" AND ") || text.contains(" OR ") {
                parts.push(text.to_string());
            } else {
                let terms: Vec<String> = text
                    .split_whitespace()
                    .map(|word| format!("all:{}", word))
                    .collect();
                parts.push(terms.join(" AND "));
            }
        }

        let categories: Vec<String> = query
            .categories
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(|c| format!("cat:{}", c))
            .collect();
        match categories.len() {
            0 => {}
            1 => parts.push(categories[0].clone()),
            _ => parts.push(format!("({})", categories.join(" OR "))),
        }

        if query.date_from.is_some() || query.date_to.is_some() {
            let from = query
                .date_from
                .map(|d| d.format("%Y%m%d").to_string())
                .unwrap_or_else(|| ARXIV_EPOCH.to_string());
            let to = query.date_to.unwrap_or(today).format("%Y%m%d");
            parts.push(format!("submittedDate:[{}0000 TO {}2359]", from, to));
        }

        if parts.is_empty() {
            "all:*".to_string()
        } else {
            parts.join(" AND ")
        }
    }

    fn search_url(&self, query: &SearchQuery, today: NaiveDate) -> String {
        let sort_by = match query.sort_by {
            SortBy::Relevance => "relevance",
            SortBy::Date => "submittedDate",
        };
        format!(
            "{}?search_query={}&start=0&max_results={}&sortBy={}&sortOrder=descending",
            self.api_url,
            urlencoding::encode(&Self::build_search_query(query, today)),
            query.max_results,
            sort_by,
        )
    }

    /// Parse an arXiv Atom feed entry into a search summary
    fn parse_entry(entry: &feed_rs::model::Entry) -> Result<PaperSummary, SourceError> {
        let id = PaperId::parse(&entry.id)
            .map_err(|e| SourceError::Parse(format!("Bad entry id '{}': {}", entry.id, e)))?;

        let title = entry
            .title
            .as_ref()
            .map(|t| collapse_whitespace(&t.content))
            .unwrap_or_default();

        let latest = id.latest();
        let mut summary = PaperSummary::new(latest.as_str(), title, latest.abs_url());
        summary.authors = entry.authors.iter().map(|a| a.name.trim().to_string()).collect();
        summary.abstract_text = entry
            .summary
            .as_ref()
            .map(|s| collapse_whitespace(&s.content))
            .unwrap_or_default();
        summary.categories = entry.categories.iter().map(|c| c.term.clone()).collect();
        summary.published = entry.published.map(|d| d.to_rfc3339());
        summary.updated = entry.updated.map(|d| d.to_rfc3339());
        summary.pdf_url = entry
            .links
            .iter()
            .find(|l| l.media_type.as_deref() == Some("application/pdf"))
            .map(|l| l.href.clone())
            .or_else(|| Some(latest.pdf_url()));

        Ok(summary)
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_html_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "text/html" || mime == "application/xhtml+xml"
}

#[async_trait]
impl Source for ArxivSource {
    fn id(&self) -> &str {
        "arxiv"
    }

    fn name(&self) -> &str {
        "arXiv"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH | SourceCapabilities::FETCH
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SourceError> {
        let url = self.search_url(query, Utc::now().date_naive());
        tracing::debug!("arXiv search: {}", url);

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/atom+xml")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SourceError::from_status(response.status(), "arXiv API"));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SourceError::Unavailable(format!("Failed to read response: {}", e)))?;

        let feed = parser::parse(bytes.as_ref())
            .map_err(|e| SourceError::Parse(format!("Failed to parse Atom feed: {}", e)))?;

        let mut papers = Vec::with_capacity(feed.entries.len());
        for entry in &feed.entries {
            match Self::parse_entry(entry) {
                Ok(paper) => papers.push(paper),
                Err(e) => tracing::warn!("Skipping arXiv entry: {}", e),
            }
        }

        Ok(SearchResponse::new(papers, &query.query))
    }

    async fn fetch(&self, id: &PaperId) -> Result<FetchResult, SourceError> {
        let url = id.html_url(&self.html_base_url);
        tracing::debug!(paper_id = %id, "Fetching {}", url);

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "text/html,application/xhtml+xml")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(paper_id = %id, "HTTP {} for {}", status.as_u16(), url);
            return Err(SourceError::from_status(status, id.as_str()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if let Some(ct) = &content_type {
            if !is_html_content_type(ct) {
                return Err(SourceError::UnexpectedResponse(format!(
                    "{}: expected HTML, got '{}'",
                    id, ct
                )));
            }
        }

        let html = response.text().await.map_err(|e| {
            SourceError::Unavailable(format!("{}: failed to read response body: {}", id, e))
        })?;

        if html.trim().is_empty() {
            return Err(SourceError::UnexpectedResponse(format!(
                "{}: empty response body",
                id
            )));
        }

        Ok(FetchResult {
            paper_id: id.clone(),
            url,
            html,
            content_type,
            fetched_at: Utc::now(),
        })
    }
}
