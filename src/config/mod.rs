//! Configuration management.
//!
//! Settings are layered: built-in defaults, then an optional TOML file,
//! then `ARXIV_MCP_*` environment variables (nested keys use `__`, e.g.
//! `ARXIV_MCP_FETCH__TIMEOUT_SECONDS=60`). Command-line flags are applied
//! on top by the binary.

mod file_config;

pub use file_config::{init_config_file, ConfigFileError};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::sources::{ARXIV_API_URL, ARXIV_HTML_URL};

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "ARXIV_MCP";

/// Config file name looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "arxiv-mcp.toml";

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where converted papers are kept
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

/// `~/.arxiv-mcp-server/papers`, or a relative fallback without a home dir
pub fn default_storage_path() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".arxiv-mcp-server").join("papers"))
        .unwrap_or_else(|| PathBuf::from(".arxiv-mcp-server/papers"))
}

/// Upstream fetch settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Per-request timeout
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Maximum fetches in flight across all papers
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Attempts per download for transient failures (1 = no retry)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_html_base_url")]
    pub html_base_url: String,

    #[serde(default = "default_api_url")]
    pub api_url: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
            max_concurrent: default_max_concurrent(),
            max_attempts: default_max_attempts(),
            html_base_url: default_html_base_url(),
            api_url: default_api_url(),
        }
    }
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_max_concurrent() -> usize {
    4
}

fn default_max_attempts() -> u32 {
    1
}

fn default_html_base_url() -> String {
    ARXIV_HTML_URL.to_string()
}

fn default_api_url() -> String {
    ARXIV_API_URL.to_string()
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// First existing config file among the standard locations
///
/// Checks `./arxiv-mcp.toml`, then `<config dir>/arxiv-mcp/config.toml`.
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }
    user_config_path().filter(|p| p.is_file())
}

/// `<config dir>/arxiv-mcp/config.toml`
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("arxiv-mcp").join("config.toml"))
}

/// Load configuration from defaults, a config file and the environment
///
/// An explicit `path` must exist; otherwise the standard locations are
/// searched and a missing file is not an error.
pub fn load_config(path: Option<&Path>) -> Result<Config, config::ConfigError> {
    let mut builder = config::Config::builder();

    match path {
        Some(path) => {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        None => {
            if let Some(found) = find_config_file() {
                tracing::debug!("Using config file {}", found.display());
                builder = builder.add_source(config::File::from(found.as_path()).required(false));
            }
        }
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    settings.try_deserialize()
}
