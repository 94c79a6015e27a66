//! Classified pipeline failures.

use crate::convert::ConversionError;
use crate::models::{ErrorKind, IdError};
use crate::sources::SourceError;
use crate::store::StoreError;

/// Errors returned by [`Pipeline`](super::Pipeline) operations
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    InvalidIdentifier(#[from] IdError),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    UnexpectedResponse(String),

    #[error("Conversion failed: {0}")]
    Conversion(#[from] ConversionError),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::InvalidIdentifier(_) => ErrorKind::InvalidIdentifier,
            PipelineError::NotFound(_) => ErrorKind::NotFound,
            PipelineError::Unavailable(_) => ErrorKind::Unavailable,
            PipelineError::UnexpectedResponse(_) => ErrorKind::UnexpectedResponse,
            PipelineError::Conversion(_) => ErrorKind::ConversionError,
            PipelineError::Storage(_) => ErrorKind::StorageError,
        }
    }

    /// Whether the same request may succeed later
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

impl From<SourceError> for PipelineError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::NotFound(_) => PipelineError::NotFound(err.to_string()),
            SourceError::Unavailable(_) => PipelineError::Unavailable(err.to_string()),
            SourceError::UnexpectedResponse(_)
            | SourceError::Parse(_)
            | SourceError::InvalidRequest(_)
            | SourceError::NotImplemented
            | SourceError::Other(_) => PipelineError::UnexpectedResponse(err.to_string()),
        }
    }
}

impl From<StoreError> for PipelineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => PipelineError::NotFound(err.to_string()),
            other => PipelineError::Storage(other.to_string()),
        }
    }
}
