//! Storage abstraction layer for the backlog tracker.
//!
//! This module provides the core storage trait and factory for creating
//! storage backends:
//!
//! - **In-memory**: Fast, ephemeral storage backed by HashMap and petgraph
//! - **JSONL**: The in-memory backend with JSON Lines file persistence
//!
//! # Architecture
//!
//! The storage layer uses an async trait so both the in-memory backend and a
//! future database backend share one interface. The trait is object-safe,
//! allowing dynamic dispatch via `Box<dyn BacklogStorage>`.
//!
//! # Concurrency
//!
//! Implementations must be `Send + Sync`. The in-memory backend serializes
//! every operation behind a single `tokio::sync::Mutex`; that lock is the
//! transaction boundary that makes the compound operations below (dependency
//! insertion with its cycle check, the scheduler's check-and-claim) atomic
//! with respect to each other. Two concurrent `add_dependency` calls can
//! never jointly violate acyclicity, and two concurrent `next_ready_story`
//! calls can never claim the same story.

use crate::domain::{
    Epic, EpicId, EpicStatus, NewEpic, NewStory, Story, StoryFilter, StoryId, StoryUpdate,
};
use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub mod in_memory;

/// Core storage trait for epics, stories, and the dependency graph.
///
/// # Method Categories
///
/// - **Epics**: `create_epic`, `get_epic`, `list_epics`, `set_epic_status`
/// - **Stories**: `create_story`, `get_story`, `update_story`, `list_stories`,
///   `story_exists`
/// - **Sub-records**: `add_task`, `complete_task`, `add_acceptance_criterion`,
///   `add_comment`
/// - **Dependency graph**: `add_dependency`, `remove_dependency`,
///   `dependencies_of`, `dependents_of`, `has_incomplete_dependency`,
///   `would_cycle`
/// - **Scheduling**: `next_ready_story`, `ready_stories`, `blocked_stories`
/// - **Batch / persistence**: `import_records`, `export_records`, `save`,
///   `reload`
///
/// # Error Handling
///
/// Every failure surfaces as a distinct [`crate::error::Error`] variant;
/// "no ready story" is a success (`Ok(None)`), not an error.
#[async_trait]
pub trait BacklogStorage: Send + Sync {
    // ========== Epics ==========

    /// Create a new epic.
    ///
    /// Generates a unique ID and sets creation timestamps. The epic starts in
    /// [`EpicStatus::Draft`].
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if the input fails validation.
    async fn create_epic(&mut self, epic: NewEpic) -> Result<Epic>;

    /// Get an epic by ID. Returns `None` if it doesn't exist.
    async fn get_epic(&self, id: &EpicId) -> Result<Option<Epic>>;

    /// List all epics, most recently created first.
    async fn list_epics(&self) -> Result<Vec<Epic>>;

    /// Set an epic's status.
    ///
    /// The status value has already been validated by the type system; an
    /// out-of-enumeration string fails at the parsing boundary with
    /// `Error::InvalidStatus` and never reaches storage.
    ///
    /// # Errors
    ///
    /// Returns `Error::EpicNotFound` if the epic doesn't exist.
    async fn set_epic_status(&mut self, id: &EpicId, status: EpicStatus) -> Result<Epic>;

    // ========== Stories ==========

    /// Create a new story under an existing epic.
    ///
    /// The story starts in [`crate::domain::StoryStatus::Todo`] with no
    /// dependencies.
    ///
    /// # Errors
    ///
    /// - `Error::Validation` if the input fails validation
    /// - `Error::EpicNotFound` if the owning epic doesn't exist
    async fn create_story(&mut self, story: NewStory) -> Result<Story>;

    /// Get a story by ID. Returns `None` if it doesn't exist.
    async fn get_story(&self, id: &StoryId) -> Result<Option<Story>>;

    /// Check whether a story exists. Used for referential validation.
    async fn story_exists(&self, id: &StoryId) -> Result<bool>;

    /// Update an existing story.
    ///
    /// Only fields present in `updates` are modified; the update is applied
    /// atomically or not at all. Returns the updated story.
    ///
    /// # Errors
    ///
    /// - `Error::StoryNotFound` if the story doesn't exist
    /// - `Error::Validation` if an updated field fails validation (the stored
    ///   story is left unchanged)
    async fn update_story(&mut self, id: &StoryId, updates: StoryUpdate) -> Result<Story>;

    /// List stories matching the given filter, most recently created first.
    async fn list_stories(&self, filter: &StoryFilter) -> Result<Vec<Story>>;

    // ========== Sub-records ==========

    /// Atomically append a checklist task to a story.
    ///
    /// # Errors
    ///
    /// Returns `Error::StoryNotFound` if the story doesn't exist.
    async fn add_task(&mut self, id: &StoryId, description: &str) -> Result<Story>;

    /// Atomically mark a task as done. Idempotent if already done.
    ///
    /// # Errors
    ///
    /// - `Error::StoryNotFound` if the story doesn't exist
    /// - `Error::Validation` if the task id is unknown
    async fn complete_task(&mut self, id: &StoryId, task_id: &str) -> Result<Story>;

    /// Atomically append an acceptance criterion to a story.
    ///
    /// # Errors
    ///
    /// Returns `Error::StoryNotFound` if the story doesn't exist.
    async fn add_acceptance_criterion(&mut self, id: &StoryId, text: &str) -> Result<Story>;

    /// Atomically append a comment to a story.
    ///
    /// # Errors
    ///
    /// Returns `Error::StoryNotFound` if the story doesn't exist.
    async fn add_comment(&mut self, id: &StoryId, author: &str, body: &str) -> Result<Story>;

    // ========== Dependency graph ==========

    /// Record that `from` depends on `to`: `from` is not ready until `to` is
    /// done.
    ///
    /// Checks are performed in a fixed, observable order, all inside one
    /// transaction so the edge set cannot change between the cycle check and
    /// the insert:
    ///
    /// 1. both ids non-empty (`Error::Validation`)
    /// 2. both stories exist (`Error::StoryNotFound`)
    /// 3. `from != to` (`Error::Validation`)
    /// 4. edge not already present (`Error::DuplicateDependency`)
    /// 5. edge would not close a cycle (`Error::CircularDependency`)
    async fn add_dependency(&mut self, from: &StoryId, to: &StoryId) -> Result<()>;

    /// Remove the dependency edge `from -> to`.
    ///
    /// Returns `true` if the edge was removed, `false` if it was absent.
    /// Absence is not an error.
    ///
    /// # Errors
    ///
    /// Returns `Error::StoryNotFound` if either story doesn't exist.
    async fn remove_dependency(&mut self, from: &StoryId, to: &StoryId) -> Result<bool>;

    /// The stories `id` depends on (is blocked by).
    ///
    /// # Errors
    ///
    /// Returns `Error::StoryNotFound` if the story doesn't exist.
    async fn dependencies_of(&self, id: &StoryId) -> Result<Vec<StoryId>>;

    /// The stories that depend on (are blocked by) `id`.
    ///
    /// # Errors
    ///
    /// Returns `Error::StoryNotFound` if the story doesn't exist.
    async fn dependents_of(&self, id: &StoryId) -> Result<Vec<StoryId>>;

    /// Whether any direct dependency of `id` is not yet done.
    ///
    /// This is the scheduler's readiness predicate; implementations must keep
    /// it O(out-degree), not O(graph).
    ///
    /// # Errors
    ///
    /// Returns `Error::StoryNotFound` if the story doesn't exist.
    async fn has_incomplete_dependency(&self, id: &StoryId) -> Result<bool>;

    /// Whether adding `from -> to` would create a cycle.
    ///
    /// Pure snapshot query; does not modify anything. A self-edge is
    /// trivially cyclic.
    ///
    /// # Errors
    ///
    /// Returns `Error::StoryNotFound` if either story doesn't exist.
    async fn would_cycle(&self, from: &StoryId, to: &StoryId) -> Result<bool>;

    // ========== Scheduling ==========

    /// Atomically select and claim the next ready story.
    ///
    /// Candidates are stories in `Todo`, ordered by priority descending, then
    /// `created_at` ascending, then id ascending. The first candidate with no
    /// incomplete dependency is transitioned `Todo -> InProgress` as part of
    /// selection; the returned snapshot reflects the post-transition status.
    ///
    /// Returns `Ok(None)` when nothing is ready; that is an expected outcome,
    /// not a failure. Under concurrent invocation each ready story is claimed
    /// by at most one caller.
    async fn next_ready_story(&mut self) -> Result<Option<Story>>;

    /// The ready stories, in scheduling order, without claiming any.
    async fn ready_stories(&self) -> Result<Vec<Story>>;

    /// Stories gated by incomplete dependencies, with their blockers.
    async fn blocked_stories(&self) -> Result<Vec<(Story, Vec<Story>)>>;

    // ========== Batch operations ==========

    /// Import epics and stories in bulk, reconstructing dependency edges.
    ///
    /// Used for migrations and test seeding. Imported edges go through the
    /// same screening as `add_dependency`: orphaned, self, duplicate, and
    /// cycle-closing edges are dropped (and pruned from the `depends_on`
    /// mirror) rather than admitted, so the graph stays acyclic no matter
    /// what the input claims.
    async fn import_records(&mut self, epics: Vec<Epic>, stories: Vec<Story>) -> Result<()>;

    /// Export all epics and stories, suitable for JSONL backup.
    async fn export_records(&self) -> Result<(Vec<Epic>, Vec<Story>)>;

    // ========== Persistence ==========

    /// Save changes to persistent storage.
    ///
    /// Takes `&self` so callers can save from shared references after
    /// read-only queries; implementations use interior mutability. A no-op
    /// for the plain in-memory backend.
    async fn save(&self) -> Result<()>;

    /// Reload state from persistent storage, discarding in-memory changes.
    ///
    /// Restores storage to the on-disk state. Essential for long-running
    /// processes when a `save()` fails and in-memory state has diverged from
    /// disk. A no-op for backends with no backing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing file cannot be read or parsed.
    async fn reload(&mut self) -> Result<()>;
}

/// Storage backend configuration.
#[derive(Debug, Clone)]
pub enum StorageBackend {
    /// In-memory storage (ephemeral)
    InMemory,

    /// In-memory storage persisted to a JSONL file
    Jsonl(PathBuf),
}

impl StorageBackend {
    /// Returns the data file path for file-based backends.
    #[must_use]
    pub fn data_path(&self) -> Option<&Path> {
        match self {
            StorageBackend::Jsonl(path) => Some(path),
            StorageBackend::InMemory => None,
        }
    }
}

/// Wrapper that adds JSONL file persistence to the in-memory backend.
///
/// Forwards everything to the inner storage; `save()` writes the full record
/// set to the JSONL file atomically and `reload()` rebuilds the inner storage
/// from the file.
struct JsonlBackedStorage {
    inner: Box<dyn BacklogStorage>,
    path: PathBuf,
    prefix: String,
}

#[async_trait]
impl BacklogStorage for JsonlBackedStorage {
    async fn create_epic(&mut self, epic: NewEpic) -> Result<Epic> {
        self.inner.create_epic(epic).await
    }

    async fn get_epic(&self, id: &EpicId) -> Result<Option<Epic>> {
        self.inner.get_epic(id).await
    }

    async fn list_epics(&self) -> Result<Vec<Epic>> {
        self.inner.list_epics().await
    }

    async fn set_epic_status(&mut self, id: &EpicId, status: EpicStatus) -> Result<Epic> {
        self.inner.set_epic_status(id, status).await
    }

    async fn create_story(&mut self, story: NewStory) -> Result<Story> {
        self.inner.create_story(story).await
    }

    async fn get_story(&self, id: &StoryId) -> Result<Option<Story>> {
        self.inner.get_story(id).await
    }

    async fn story_exists(&self, id: &StoryId) -> Result<bool> {
        self.inner.story_exists(id).await
    }

    async fn update_story(&mut self, id: &StoryId, updates: StoryUpdate) -> Result<Story> {
        self.inner.update_story(id, updates).await
    }

    async fn list_stories(&self, filter: &StoryFilter) -> Result<Vec<Story>> {
        self.inner.list_stories(filter).await
    }

    async fn add_task(&mut self, id: &StoryId, description: &str) -> Result<Story> {
        self.inner.add_task(id, description).await
    }

    async fn complete_task(&mut self, id: &StoryId, task_id: &str) -> Result<Story> {
        self.inner.complete_task(id, task_id).await
    }

    async fn add_acceptance_criterion(&mut self, id: &StoryId, text: &str) -> Result<Story> {
        self.inner.add_acceptance_criterion(id, text).await
    }

    async fn add_comment(&mut self, id: &StoryId, author: &str, body: &str) -> Result<Story> {
        self.inner.add_comment(id, author, body).await
    }

    async fn add_dependency(&mut self, from: &StoryId, to: &StoryId) -> Result<()> {
        self.inner.add_dependency(from, to).await
    }

    async fn remove_dependency(&mut self, from: &StoryId, to: &StoryId) -> Result<bool> {
        self.inner.remove_dependency(from, to).await
    }

    async fn dependencies_of(&self, id: &StoryId) -> Result<Vec<StoryId>> {
        self.inner.dependencies_of(id).await
    }

    async fn dependents_of(&self, id: &StoryId) -> Result<Vec<StoryId>> {
        self.inner.dependents_of(id).await
    }

    async fn has_incomplete_dependency(&self, id: &StoryId) -> Result<bool> {
        self.inner.has_incomplete_dependency(id).await
    }

    async fn would_cycle(&self, from: &StoryId, to: &StoryId) -> Result<bool> {
        self.inner.would_cycle(from, to).await
    }

    async fn next_ready_story(&mut self) -> Result<Option<Story>> {
        self.inner.next_ready_story().await
    }

    async fn ready_stories(&self) -> Result<Vec<Story>> {
        self.inner.ready_stories().await
    }

    async fn blocked_stories(&self) -> Result<Vec<(Story, Vec<Story>)>> {
        self.inner.blocked_stories().await
    }

    async fn import_records(&mut self, epics: Vec<Epic>, stories: Vec<Story>) -> Result<()> {
        self.inner.import_records(epics, stories).await
    }

    async fn export_records(&self) -> Result<(Vec<Epic>, Vec<Story>)> {
        self.inner.export_records().await
    }

    async fn save(&self) -> Result<()> {
        in_memory::save_to_jsonl(self.inner.as_ref(), &self.path).await
    }

    async fn reload(&mut self) -> Result<()> {
        if self.path.exists() {
            let (new_storage, warnings) =
                in_memory::load_from_jsonl(&self.path, self.prefix.clone()).await?;
            for warning in &warnings {
                tracing::warn!(warning = ?warning, "JSONL reload warning");
            }
            self.inner = new_storage;
        } else {
            // File doesn't exist - reset to empty storage
            self.inner = in_memory::new_in_memory_storage(self.prefix.clone());
        }
        Ok(())
    }
}

/// Create a storage instance for the given backend.
///
/// # Arguments
///
/// * `backend` - The storage backend to use
/// * `prefix` - The prefix for generated IDs (e.g., "proj")
///
/// # Errors
///
/// Returns an error if the JSONL backend's file exists but cannot be read.
pub async fn create_storage(
    backend: StorageBackend,
    prefix: String,
) -> Result<Box<dyn BacklogStorage>> {
    match backend {
        StorageBackend::InMemory => Ok(in_memory::new_in_memory_storage(prefix)),
        StorageBackend::Jsonl(path) => {
            let inner = if path.exists() {
                let (storage, warnings) = in_memory::load_from_jsonl(&path, prefix.clone()).await?;
                // Log warnings but continue - storage is still usable
                for warning in &warnings {
                    tracing::warn!(warning = ?warning, "JSONL load warning");
                }
                storage
            } else {
                // First run - start empty, the file appears on first save
                in_memory::new_in_memory_storage(prefix.clone())
            };
            Ok(Box::new(JsonlBackedStorage {
                inner,
                path,
                prefix,
            }))
        }
    }
}
