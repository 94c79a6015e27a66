//! Reading and writing TOML configuration files.
//!
//! # Configuration File Format
//!
//! ```toml
//! [storage]
//! path = "/home/me/.arxiv-mcp-server/papers"
//!
//! [fetch]
//! timeout_seconds = 30
//! max_concurrent = 4
//! max_attempts = 1
//! html_base_url = "https://arxiv.org/html"
//! api_url = "http://export.arxiv.org/api/query"
//!
//! [logging]
//! level = "info"
//! format = "text"
//! ```

use std::path::{Path, PathBuf};

use super::Config;

/// Configuration file errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config file already exists: {}", .0.display())]
    Exists(PathBuf),
}

impl Config {
    /// Load configuration from a TOML file, without environment overrides
    pub fn load_file(path: &Path) -> Result<Self, ConfigFileError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), ConfigFileError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Write a default config file, refusing to clobber an existing one
pub fn init_config_file(path: &Path, overwrite: bool) -> Result<PathBuf, ConfigFileError> {
    if path.exists() && !overwrite {
        return Err(ConfigFileError::Exists(path.to_path_buf()));
    }
    Config::default().save(path)?;
    Ok(path.to_path_buf())
}
