//! Workspace configuration and initialization.
//!
//! A backlog workspace is a directory containing `.backlog/` with a YAML
//! config file and the JSONL data file. This module handles creating that
//! layout, loading the config, and discovering the workspace root from a
//! nested directory.

use crate::error::{Error, Result};
use crate::storage::StorageBackend;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Default story ID prefix if none specified
pub const DEFAULT_PREFIX: &str = "proj";

/// Name of the backlog directory
pub const BACKLOG_DIR_NAME: &str = ".backlog";

/// Name of the configuration file
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Name of the data file holding epics and stories
pub const STORIES_FILE_NAME: &str = "stories.jsonl";

/// Minimum prefix length
pub const MIN_PREFIX_LENGTH: usize = 2;

/// Maximum prefix length
pub const MAX_PREFIX_LENGTH: usize = 20;

/// Maximum directory depth to traverse when searching for the workspace root
pub const MAX_TRAVERSAL_DEPTH: usize = 256;

/// Configuration file structure for a backlog workspace
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BacklogConfig {
    /// ID prefix for epics and stories (e.g., "proj" for "proj-a3f8")
    #[serde(rename = "story-prefix")]
    pub story_prefix: String,

    /// Storage configuration
    pub storage: StorageConfig,
}

/// Storage configuration section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageConfig {
    /// Storage backend type ("jsonl" or "memory")
    pub backend: String,

    /// Path to the data file, relative to the workspace root
    pub data_file: String,
}

impl StorageConfig {
    /// Resolve this configuration into a [`StorageBackend`].
    ///
    /// Relative `data_file` paths are resolved against the workspace root.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an unknown backend name.
    pub fn to_backend(&self, workspace_root: &Path) -> Result<StorageBackend> {
        match self.backend.as_str() {
            "memory" => Ok(StorageBackend::InMemory),
            "jsonl" => {
                let data_path = workspace_root.join(&self.data_file);
                Ok(StorageBackend::Jsonl(data_path))
            }
            other => Err(Error::Config(format!(
                "Unknown storage backend '{other}'. Valid backends: jsonl, memory"
            ))),
        }
    }
}

impl BacklogConfig {
    /// Create a new configuration with the given prefix
    pub fn new(prefix: &str) -> Self {
        Self {
            story_prefix: prefix.to_string(),
            storage: StorageConfig {
                backend: "jsonl".to_string(),
                data_file: format!("{BACKLOG_DIR_NAME}/{STORIES_FILE_NAME}"),
            },
        }
    }

    /// Load configuration from a file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid YAML.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).await?;
        serde_yaml::from_str(&content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Save configuration to a file
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_yaml::to_string(self).map_err(|e| Error::Config(format!("YAML error: {e}")))?;
        fs::write(path, content).await?;
        Ok(())
    }
}

impl Default for BacklogConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

/// Result of workspace initialization
#[derive(Debug)]
pub struct InitResult {
    /// Path to the created backlog directory
    pub backlog_dir: PathBuf,
    /// Path to the created config file
    pub config_file: PathBuf,
    /// Path to the created data file
    pub stories_file: PathBuf,
    /// The prefix used for generated IDs
    pub prefix: String,
}

/// Validate an ID prefix.
///
/// Requirements: 2-20 characters, ASCII alphanumeric only. Expects
/// pre-trimmed input.
///
/// # Errors
///
/// Returns [`Error::Config`] describing the violated constraint.
pub fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix.len() < MIN_PREFIX_LENGTH {
        return Err(Error::Config(format!(
            "Prefix must be at least {MIN_PREFIX_LENGTH} characters"
        )));
    }

    if prefix.len() > MAX_PREFIX_LENGTH {
        return Err(Error::Config(format!(
            "Prefix cannot exceed {MAX_PREFIX_LENGTH} characters"
        )));
    }

    if !prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(Error::Config(
            "Prefix must contain only alphanumeric characters".to_string(),
        ));
    }

    Ok(())
}

/// Initialize a new backlog workspace in the given directory.
///
/// Creates `.backlog/` with a config file and an empty JSONL data file.
///
/// # Errors
///
/// Returns an error if `.backlog/` already exists, the prefix is invalid, or
/// filesystem operations fail.
pub async fn init_workspace(base_dir: &Path, prefix: Option<&str>) -> Result<InitResult> {
    let prefix = prefix.unwrap_or(DEFAULT_PREFIX).trim();
    validate_prefix(prefix)?;

    let backlog_dir = base_dir.join(BACKLOG_DIR_NAME);

    if backlog_dir.exists() {
        return Err(Error::Config(format!(
            "Backlog is already initialized in this directory. Found existing '{BACKLOG_DIR_NAME}'"
        )));
    }

    fs::create_dir_all(&backlog_dir).await?;

    let config_file = backlog_dir.join(CONFIG_FILE_NAME);
    let config = BacklogConfig::new(prefix);
    config.save(&config_file).await?;

    let stories_file = backlog_dir.join(STORIES_FILE_NAME);
    fs::write(&stories_file, "").await?;

    Ok(InitResult {
        backlog_dir,
        config_file,
        stories_file,
        prefix: prefix.to_string(),
    })
}

/// Check whether a directory has been initialized as a backlog workspace.
#[must_use]
pub fn is_initialized(base_dir: &Path) -> bool {
    base_dir.join(BACKLOG_DIR_NAME).exists()
}

/// Find the workspace root by searching up the directory tree.
///
/// Returns `Some(path)` with the directory containing `.backlog/`, or `None`
/// if none is found within the depth limit.
#[must_use]
pub fn find_workspace_root(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir.to_path_buf();
    let mut depth = 0;

    loop {
        if current.join(BACKLOG_DIR_NAME).exists() {
            return Some(current);
        }

        depth += 1;
        if depth > MAX_TRAVERSAL_DEPTH || !current.pop() {
            return None;
        }
    }
}
