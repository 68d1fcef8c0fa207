//! Workspace state shared by every tool call.
//!
//! One server process can front several checkouts at once: a tool call
//! either names a workspace root explicitly or falls back to the root set by
//! `set_context`. The [`Context`] maps canonical roots to open storage
//! handles, holding at most [`MAX_OPEN_WORKSPACES`] of them and closing the
//! oldest when the bound is hit.
//!
//! Lock order when combined with `Tools`: the context `RwLock` first, then a
//! storage handle's `RwLock`, never the reverse.

use crate::error::{Error, Result};
use backlog::config::{BacklogConfig, BACKLOG_DIR_NAME, CONFIG_FILE_NAME};
use backlog::storage::{create_storage, BacklogStorage};
use std::collections::{HashMap, VecDeque};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Upper bound on simultaneously open workspaces.
const MAX_OPEN_WORKSPACES: usize = 32;

/// A storage handle as the tool layer holds it.
pub type SharedStorage = Arc<RwLock<Box<dyn BacklogStorage>>>;

/// Everything kept per open workspace.
struct WorkspaceEntry {
    storage: SharedStorage,
    data_path: PathBuf,
}

/// Maps workspace roots to open storage, tracking which one is active.
pub struct Context {
    active: Option<PathBuf>,
    workspaces: HashMap<PathBuf, WorkspaceEntry>,
    open_order: VecDeque<PathBuf>,
}

impl Context {
    /// Create a context with no workspace open.
    #[must_use]
    pub fn new() -> Self {
        Self {
            active: None,
            workspaces: HashMap::new(),
            open_order: VecDeque::new(),
        }
    }

    /// Open a workspace (or re-activate an already open one) and make it the
    /// active root for calls that don't name one.
    ///
    /// The root is canonicalized before use, so `..` segments and symlinks
    /// cannot smuggle the server outside the directory the caller named. The
    /// workspace must contain a `.backlog/` directory; its `config.yaml`
    /// decides the id prefix and storage backend.
    ///
    /// # Errors
    ///
    /// Returns an error when the path doesn't exist, isn't an initialized
    /// workspace, or its config cannot be loaded.
    pub async fn set_workspace(&mut self, workspace_root: &Path) -> Result<WorkspaceInfo> {
        let canonical = canonicalize_root(workspace_root)?;

        if !canonical.join(BACKLOG_DIR_NAME).is_dir() {
            return Err(Error::NoBacklogDirectory(canonical.display().to_string()));
        }

        if let Some(entry) = self.workspaces.get(&canonical) {
            debug!(workspace = %canonical.display(), "Re-activating open workspace");
            let data_path = entry.data_path.clone();
            self.active = Some(canonical.clone());
            return Ok(WorkspaceInfo {
                workspace_root: canonical,
                data_path,
            });
        }

        let config_path = canonical.join(BACKLOG_DIR_NAME).join(CONFIG_FILE_NAME);
        let config = BacklogConfig::load(&config_path)
            .await
            .map_err(|e| Error::ConfigLoad {
                path: config_path.display().to_string(),
                reason: e.to_string(),
            })?;

        let backend = config.storage.to_backend(&canonical)?;
        let data_path = backend.data_path().map_or_else(
            || canonical.join(&config.storage.data_file),
            Path::to_path_buf,
        );
        debug!(
            workspace = %canonical.display(),
            prefix = %config.story_prefix,
            data_path = %data_path.display(),
            "Opening workspace"
        );

        while self.workspaces.len() >= MAX_OPEN_WORKSPACES {
            self.close_oldest();
        }

        let storage = create_storage(backend, config.story_prefix).await?;
        self.workspaces.insert(
            canonical.clone(),
            WorkspaceEntry {
                storage: Arc::new(RwLock::new(storage)),
                data_path: data_path.clone(),
            },
        );
        self.open_order.push_back(canonical.clone());
        self.active = Some(canonical.clone());

        Ok(WorkspaceInfo {
            workspace_root: canonical,
            data_path,
        })
    }

    /// Close the workspace that has been open the longest.
    fn close_oldest(&mut self) {
        let Some(oldest) = self.open_order.pop_front() else {
            return;
        };
        self.workspaces.remove(&oldest);
        debug!(workspace = %oldest.display(), "Closed oldest workspace");
    }

    /// The active workspace root, if any.
    #[must_use]
    pub fn current_workspace(&self) -> Option<&PathBuf> {
        self.active.as_ref()
    }

    /// The active workspace's data file path, if any.
    #[must_use]
    pub fn current_data_path(&self) -> Option<&PathBuf> {
        self.active
            .as_ref()
            .and_then(|root| self.workspaces.get(root))
            .map(|entry| &entry.data_path)
    }

    /// Resolve a storage handle: the named workspace when `workspace_root`
    /// is given, the active one otherwise.
    ///
    /// # Errors
    ///
    /// - `Error::NoContext` when no root is named and none is active
    /// - `Error::WorkspaceNotFound` when the named path doesn't resolve
    /// - `Error::WorkspaceNotInitialized` when the workspace was never opened
    ///   via [`set_workspace`](Self::set_workspace)
    pub fn storage_for(&self, workspace_root: Option<&Path>) -> Result<SharedStorage> {
        let root = match workspace_root {
            Some(path) => path.canonicalize().map_err(|e| Error::WorkspaceNotFound {
                path: path.display().to_string(),
                source: Some(e),
            })?,
            None => self.active.clone().ok_or(Error::NoContext)?,
        };

        self.workspaces
            .get(&root)
            .map(|entry| Arc::clone(&entry.storage))
            .ok_or_else(|| Error::WorkspaceNotInitialized(root.display().to_string()))
    }

    /// Register a workspace with injected storage, skipping config loading
    /// and the open-count bound. Test seam only.
    #[cfg(test)]
    fn open_test_workspace(&mut self, root: PathBuf, storage: Box<dyn BacklogStorage>) {
        self.workspaces.insert(
            root.clone(),
            WorkspaceEntry {
                storage: Arc::new(RwLock::new(storage)),
                data_path: root.join("stories.jsonl"),
            },
        );
        self.open_order.push_back(root.clone());
        self.active = Some(root);
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

/// What `set_workspace` resolved: the canonical root and its data file.
#[derive(Debug, Clone)]
pub struct WorkspaceInfo {
    /// Canonical workspace root
    pub workspace_root: PathBuf,

    /// Data file the workspace persists to
    pub data_path: PathBuf,
}

/// Canonicalize a caller-supplied root and refuse anything that could still
/// point outside itself afterwards.
fn canonicalize_root(path: &Path) -> Result<PathBuf> {
    let canonical = path.canonicalize().map_err(|e| Error::WorkspaceNotFound {
        path: path.display().to_string(),
        source: Some(e),
    })?;
    check_root(&canonical)?;
    Ok(canonical)
}

/// Reject roots that survived canonicalization in a suspicious shape:
/// relative, containing a null byte, or still carrying `..` components.
fn check_root(path: &Path) -> Result<()> {
    let reject = |reason: &str| {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            reason.to_string(),
        ))
    };

    if !path.is_absolute() {
        return Err(reject("workspace root must be an absolute path"));
    }
    if path.to_string_lossy().contains('\0') {
        return Err(reject("workspace root contains a null byte"));
    }
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(reject("workspace root climbs out of itself"));
    }

    Ok(())
}
