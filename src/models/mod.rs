//! Core data models: identifiers, documents, catalog records and search types.

mod id;
mod paper;
mod search;

pub use id::{IdError, PaperId};
pub use paper::{ErrorKind, PaperDocument, PaperRecord, PaperStatus, PaperSummary};
pub use search::{
    parse_date, SearchQuery, SearchResponse, SortBy, DEFAULT_MAX_RESULTS, MAX_RESULTS_LIMIT,
};
