//! MCP protocol surface.
//!
//! [`ToolRegistry`] maps tool names to handlers over a shared
//! [`Pipeline`](crate::pipeline::Pipeline); [`McpServer`] serves them with
//! pmcp over stdio or streamable HTTP.

mod handlers;
pub mod server;
pub mod tools;

pub use handlers::{DownloadPaperHandler, ListPapersHandler, ReadPaperHandler, SearchPapersHandler};
pub use server::{McpServer, SERVER_NAME};
pub use tools::{Tool, ToolHandler, ToolRegistry};
