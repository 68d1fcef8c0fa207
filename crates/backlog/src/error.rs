//! Error types for backlog operations.
//!
//! Every failure is reported as a distinct typed variant so callers (and the
//! MCP layer above) can map each condition to its own user-facing code. None
//! of these are retried internally; `Storage` is the only kind a caller might
//! reasonably retry.

use crate::domain::{EpicId, StoryId};
use std::io;
use thiserror::Error;

/// The error type for backlog operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Referenced story does not exist.
    #[error("Story not found: {0}")]
    StoryNotFound(StoryId),

    /// Referenced epic does not exist.
    #[error("Epic not found: {0}")]
    EpicNotFound(EpicId),

    /// Malformed input (empty id, over-long field, self-dependency).
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The exact dependency edge already exists.
    #[error("Dependency already exists: {from} -> {to}")]
    DuplicateDependency {
        /// The dependent story
        from: StoryId,
        /// The story depended upon
        to: StoryId,
    },

    /// The proposed dependency edge would close a cycle.
    #[error("Adding dependency {from} -> {to} would create a cycle")]
    CircularDependency {
        /// The dependent story
        from: StoryId,
        /// The story depended upon
        to: StoryId,
    },

    /// Status value outside the permitted enumeration.
    #[error("Invalid status: '{0}'")]
    InvalidStatus(String),

    /// Underlying persistence unavailable or a constraint violated
    /// unexpectedly.
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization or parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Workspace configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// A specialized Result type for backlog operations.
pub type Result<T> = std::result::Result<T, Error>;
