//! Datastore configuration
//!
//! Configuration is loaded from:
//! 1. Default values (in-memory store, no timestamps)
//! 2. Config file (~/.config/docstore/config.toml)
//! 3. Environment variables (DOCSTORE_* prefix)
//!
//! Environment variables take precedence over config file values.
//!
//! The resulting [`DatastoreConfig`] is handed to the backend as-is; the
//! adapter never inspects it.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix
const ENV_PREFIX: &str = "DOCSTORE";

/// Backend store configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatastoreConfig {
    /// Database file. When unset the store lives in memory.
    #[serde(default)]
    pub filename: Option<PathBuf>,

    /// Force an in-memory store even if `filename` is set
    #[serde(default)]
    pub in_memory_only: bool,

    /// Stamp `createdAt`/`updatedAt` on inserted and updated records
    #[serde(default)]
    pub timestamp_data: bool,
}

impl DatastoreConfig {
    /// Configuration for a private, non-persistent store
    pub fn in_memory() -> Self {
        Self {
            in_memory_only: true,
            ..Self::default()
        }
    }

    /// Configuration for a store persisted at `path`
    pub fn persistent(path: impl Into<PathBuf>) -> Self {
        Self {
            filename: Some(path.into()),
            ..Self::default()
        }
    }

    /// Enable automatic `createdAt`/`updatedAt` fields
    pub fn with_timestamps(mut self) -> Self {
        self.timestamp_data = true;
        self
    }

    /// Whether this configuration opens an on-disk database
    pub fn is_persistent(&self) -> bool {
        !self.in_memory_only && self.filename.is_some()
    }

    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (DOCSTORE_FILENAME, DOCSTORE_IN_MEMORY_ONLY,
    ///    DOCSTORE_TIMESTAMP_DATA)
    /// 2. Config file (~/.config/docstore/config.toml or DOCSTORE_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a TOML string
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: DatastoreConfig =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // DOCSTORE_FILENAME
        if let Ok(val) = std::env::var(format!("{}_FILENAME", ENV_PREFIX)) {
            self.filename = if val.is_empty() {
                None
            } else {
                Some(PathBuf::from(val))
            };
        }

        // DOCSTORE_IN_MEMORY_ONLY
        if let Ok(val) = std::env::var(format!("{}_IN_MEMORY_ONLY", ENV_PREFIX)) {
            self.in_memory_only = parse_flag(&val);
        }

        // DOCSTORE_TIMESTAMP_DATA
        if let Ok(val) = std::env::var(format!("{}_TIMESTAMP_DATA", ENV_PREFIX)) {
            self.timestamp_data = parse_flag(&val);
        }
    }

    /// Get the config file path
    ///
    /// Can be overridden with DOCSTORE_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docstore")
            .join("config.toml")
    }

    /// Conventional location for a persistent database file
    pub fn default_data_file() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docstore")
            .join("documents.db")
    }
}

fn parse_flag(val: &str) -> bool {
    val.eq_ignore_ascii_case("true") || val == "1"
}
