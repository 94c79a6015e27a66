//! Download orchestration: resolve, fetch, convert, store.
//!
//! Each paper moves through `absent -> pending -> success | failed`; a
//! failed paper goes back to `pending` when it is downloaded again.
//! Downloads of the same id are single-flight: concurrent callers queue on
//! a per-id lock and all but the first find the stored result. Different
//! ids run in parallel, bounded by a fetch semaphore.
//!
//! A download that is cancelled mid-flight leaves its record `pending`;
//! the next download of that id starts over.

mod error;

pub use error::PipelineError;

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::config::FetchConfig;
use crate::convert::convert;
use crate::models::{PaperDocument, PaperId, PaperRecord, PaperStatus};
use crate::sources::{Source, SourceError};
use crate::store::PaperStore;
use crate::utils::{with_retry, KeyedLocks, RetryConfig};

/// Tunables for a [`Pipeline`]
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Upper bound on one fetch attempt
    pub fetch_timeout: Duration,
    pub max_concurrent_fetches: usize,
    pub retry: RetryConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from(&FetchConfig::default())
    }
}

impl From<&FetchConfig> for PipelineConfig {
    fn from(config: &FetchConfig) -> Self {
        Self {
            fetch_timeout: Duration::from_secs(config.timeout_seconds),
            max_concurrent_fetches: config.max_concurrent.max(1),
            retry: RetryConfig::default().max_attempts(config.max_attempts),
        }
    }
}

impl PipelineConfig {
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn max_concurrent_fetches(mut self, max: usize) -> Self {
        self.max_concurrent_fetches = max.max(1);
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// Per-call download options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadOptions {
    /// Re-fetch even if a converted document is already stored
    pub force: bool,
}

impl DownloadOptions {
    pub fn force() -> Self {
        Self { force: true }
    }
}

/// The conversion pipeline
#[derive(Debug, Clone)]
pub struct Pipeline {
    source: Arc<dyn Source>,
    store: Arc<PaperStore>,
    locks: KeyedLocks,
    fetch_permits: Arc<Semaphore>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(source: Arc<dyn Source>, store: Arc<PaperStore>, config: PipelineConfig) -> Self {
        let fetch_permits = Arc::new(Semaphore::new(config.max_concurrent_fetches));
        Self {
            source,
            store,
            locks: KeyedLocks::new(),
            fetch_permits,
            config,
        }
    }

    pub fn source(&self) -> &Arc<dyn Source> {
        &self.source
    }

    pub fn store(&self) -> &PaperStore {
        &self.store
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Download and convert a paper, returning its catalog record
    ///
    /// Without `force`, a paper that is already stored is returned as-is
    /// with no network access.
    pub async fn download(
        &self,
        raw_id: &str,
        options: DownloadOptions,
    ) -> Result<PaperRecord, PipelineError> {
        let id = PaperId::parse(raw_id)?;
        let _guard = self.locks.lock(id.as_str()).await;

        if !options.force && self.store.exists(&id).await {
            if let Ok(Some(record)) = self.store.get_record(&id).await {
                tracing::debug!(paper_id = %id, "Already downloaded");
                return Ok(record);
            }
        }

        self.store
            .set_status(&id, PaperStatus::Pending, None)
            .await?;
        tracing::info!(paper_id = %id, force = options.force, "Downloading paper");

        let outcome = match self.fetch_and_convert(&id).await {
            Ok(document) => self
                .store
                .write(&document, PaperStatus::Success)
                .await
                .map_err(PipelineError::from),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(record) => {
                tracing::info!(paper_id = %id, "Stored converted paper");
                Ok(record)
            }
            Err(err) => {
                self.record_failure(&id, &err).await;
                Err(err)
            }
        }
    }

    async fn fetch_and_convert(&self, id: &PaperId) -> Result<PaperDocument, PipelineError> {
        let timeout = self.config.fetch_timeout;
        let source = &self.source;
        let permits = &self.fetch_permits;

        let fetched = with_retry(self.config.retry, || async move {
            let _permit = permits
                .acquire()
                .await
                .map_err(|_| SourceError::Unavailable("fetch pool closed".to_string()))?;

            match tokio::time::timeout(timeout, source.fetch(id)).await {
                Ok(result) => result,
                Err(_) => Err(SourceError::Unavailable(format!(
                    "{}: fetch timed out after {}s",
                    id,
                    timeout.as_secs_f64()
                ))),
            }
        })
        .await?;

        let converted = convert(&fetched.html)?;
        if converted.images_dropped > 0 {
            tracing::debug!(paper_id = %id, "Dropped {} images", converted.images_dropped);
        }

        let metadata = converted.metadata;
        let mut document = PaperDocument::new(id.clone(), converted.markdown, Utc::now())
            .authors(metadata.authors);
        document.title = metadata.title;
        document.abstract_text = metadata.abstract_text;
        Ok(document)
    }

    async fn record_failure(&self, id: &PaperId, err: &PipelineError) {
        tracing::warn!(paper_id = %id, kind = %err.kind(), "Download failed: {}", err);
        if let Err(e) = self
            .store
            .set_status(id, PaperStatus::Failed, Some((err.kind(), err.to_string())))
            .await
        {
            tracing::warn!(paper_id = %id, "Could not record failure: {}", e);
        }
    }

    /// Current record for a paper, if it was ever requested
    pub async fn status(&self, raw_id: &str) -> Result<Option<PaperRecord>, PipelineError> {
        let id = PaperId::parse(raw_id)?;
        Ok(self.store.get_record(&id).await?)
    }

    /// All known papers, sorted by id
    pub async fn list(&self) -> Result<Vec<PaperRecord>, PipelineError> {
        Ok(self.store.list().await?)
    }

    /// The stored document for a successfully downloaded paper
    pub async fn read(&self, raw_id: &str) -> Result<PaperDocument, PipelineError> {
        let id = PaperId::parse(raw_id)?;
        Ok(self.store.read(&id).await?)
    }
}
