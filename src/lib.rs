//! # arxiv-mcp
//!
//! A Model Context Protocol (MCP) server that fetches arXiv papers' HTML
//! renderings, converts them to markdown and keeps them in a local store.
//!
//! ## Architecture
//!
//! - [`models`]: identifiers, documents, catalog records, search types
//! - [`sources`]: the [`Source`] trait and the arXiv HTTP client
//! - [`convert`]: HTML to markdown via an intermediate block tree
//! - [`store`]: file-backed paper store with atomic writes
//! - [`pipeline`]: single-flight download orchestration
//! - [`mcp`]: MCP tools and server
//! - [`utils`]: HTTP client, retry policy, keyed locks
//! - [`config`]: configuration management

pub mod config;
pub mod convert;
pub mod mcp;
pub mod models;
pub mod pipeline;
pub mod sources;
pub mod store;
pub mod utils;

pub use models::{PaperDocument, PaperId, PaperRecord, PaperStatus};
pub use pipeline::{DownloadOptions, Pipeline, PipelineConfig, PipelineError};
pub use sources::{ArxivSource, Source};
pub use store::PaperStore;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
