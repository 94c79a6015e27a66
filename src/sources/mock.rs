//! Mock source for testing purposes.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::models::{PaperId, SearchQuery, SearchResponse};
use crate::sources::{FetchResult, Source, SourceCapabilities, SourceError};

/// A scripted failure returned by [`MockSource::fetch`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    NotFound,
    Unavailable,
    Empty,
}

impl MockFailure {
    fn into_error(self, id: &PaperId) -> SourceError {
        match self {
            MockFailure::NotFound => SourceError::NotFound(id.to_string()),
            MockFailure::Unavailable => SourceError::Unavailable(format!("{}: mock outage", id)),
            MockFailure::Empty => {
                SourceError::UnexpectedResponse(format!("{}: empty response body", id))
            }
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    pages: HashMap<String, String>,
    failures: HashMap<String, VecDeque<MockFailure>>,
    fetch_counts: HashMap<String, usize>,
    search_response: Option<SearchResponse>,
}

/// A mock source that serves canned HTML and counts fetches.
///
/// Pages are keyed by canonical id. Queued failures for an id are
/// returned, in order, before its page is served.
#[derive(Debug, Default)]
pub struct MockSource {
    state: Mutex<MockState>,
    fetches: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    delay: Option<Duration>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every fetch
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Serve `html` for `id`
    pub fn add_page(&self, id: &str, html: impl Into<String>) {
        self.state().pages.insert(id.to_string(), html.into());
    }

    /// Queue a failure for the next fetch of `id`
    pub fn fail_next(&self, id: &str, failure: MockFailure) {
        self.state()
            .failures
            .entry(id.to_string())
            .or_default()
            .push_back(failure);
    }

    /// Set the search response to return.
    pub fn set_search_response(&self, response: SearchResponse) {
        self.state().search_response = Some(response);
    }

    /// Total number of fetch calls
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Highest number of fetches that were running at the same time
    pub fn peak_concurrent_fetches(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Number of fetch calls for one id
    pub fn fetch_count_for(&self, id: &str) -> usize {
        self.state().fetch_counts.get(id).copied().unwrap_or(0)
    }
}

/// Decrements the in-flight count when a fetch ends, including on cancellation
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Source for MockSource {
    fn id(&self) -> &str {
        "mock"
    }

    fn name(&self) -> &str {
        "Mock Source"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH | SourceCapabilities::FETCH
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SourceError> {
        Ok(self
            .state()
            .search_response
            .clone()
            .unwrap_or_else(|| SearchResponse::new(Vec::new(), &query.query)))
    }

    async fn fetch(&self, id: &PaperId) -> Result<FetchResult, SourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        let _running = InFlight(&self.in_flight);

        *self
            .state()
            .fetch_counts
            .entry(id.to_string())
            .or_insert(0) += 1;

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let outcome = {
            let mut state = self.state();
            let failure = state
                .failures
                .get_mut(id.as_str())
                .and_then(VecDeque::pop_front);
            match failure {
                Some(failure) => Err(failure.into_error(id)),
                None => state
                    .pages
                    .get(id.as_str())
                    .cloned()
                    .ok_or_else(|| SourceError::NotFound(id.to_string())),
            }
        };

        outcome.map(|html| FetchResult {
            paper_id: id.clone(),
            url: format!("mock://{}", id),
            html,
            content_type: Some("text/html".to_string()),
            fetched_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_serves_pages_after_queued_failures() {
        let source = MockSource::new();
        let id = PaperId::parse("2401.12345").unwrap();
        source.add_page("2401.12345", "<p>ok</p>");
        source.fail_next("2401.12345", MockFailure::Unavailable);

        assert!(matches!(
            source.fetch(&id).await,
            Err(SourceError::Unavailable(_))
        ));
        assert_eq!(source.fetch(&id).await.unwrap().html, "<p>ok</p>");
        assert_eq!(source.fetch_count(), 2);
        assert_eq!(source.fetch_count_for("2401.12345"), 2);
    }

    #[tokio::test]
    async fn test_mock_tracks_overlapping_fetches() {
        let source = MockSource::new().with_delay(Duration::from_millis(20));
        source.add_page("2401.00001", "<p>a</p>");
        source.add_page("2401.00002", "<p>b</p>");
        let a = PaperId::parse("2401.00001").unwrap();
        let b = PaperId::parse("2401.00002").unwrap();

        let (first, second) = tokio::join!(source.fetch(&a), source.fetch(&b));
        assert!(first.is_ok() && second.is_ok());
        assert_eq!(source.peak_concurrent_fetches(), 2);

        source.fetch(&a).await.unwrap();
        assert_eq!(source.peak_concurrent_fetches(), 2);
    }

    #[tokio::test]
    async fn test_mock_unknown_page_is_not_found() {
        let source = MockSource::new();
        let id = PaperId::parse("2401.99999").unwrap();
        assert!(matches!(
            source.fetch(&id).await,
            Err(SourceError::NotFound(_))
        ));
    }
}
