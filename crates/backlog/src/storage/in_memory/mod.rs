//! In-memory storage backend using HashMap and petgraph.
//!
//! All data lives in RAM; optional JSONL persistence is provided by
//! [`load_from_jsonl`] and [`save_to_jsonl`] (wired up through the factory in
//! the parent module).
//!
//! # Architecture
//!
//! - `HashMap<EpicId, Epic>` and `HashMap<StoryId, Story>` for O(1) lookups
//! - `petgraph::DiGraph<StoryId, ()>` for the dependency edge set
//! - `HashMap<StoryId, NodeIndex>` mapping stories to graph nodes
//! - Hash-based ID generation with adaptive length (4-6 chars)
//!
//! ## Edge direction convention
//!
//! Edges point **dependent -> dependency**: an edge `A -> B` means story A is
//! blocked until story B is done. `dependencies_of` follows outgoing edges,
//! `dependents_of` incoming ones.
//!
//! # Concurrency
//!
//! The storage is an `Arc<Mutex<InMemoryStorageInner>>`. Every trait method
//! acquires the mutex once and performs its whole operation under it, so the
//! compound operations (cycle-check-then-insert, check-ready-then-claim) are
//! serialized against each other. Cloning the `Arc` yields handles that share
//! state, which is how multiple workers poll the scheduler concurrently.

mod graph;
mod inner;
mod jsonl;
mod sorting;
mod trait_impl;

use crate::storage::BacklogStorage;
use std::sync::Arc;
use tokio::sync::Mutex;

pub use inner::InMemoryStorageInner;
pub use jsonl::{load_from_jsonl, save_to_jsonl, LoadWarning};

/// Thread-safe in-memory storage.
///
/// Cloning the `Arc` produces another handle onto the same store; the
/// [`BacklogStorage`] impl lives on this alias.
pub type InMemoryStorage = Arc<Mutex<InMemoryStorageInner>>;

/// Create a new boxed in-memory storage instance.
///
/// # Arguments
///
/// * `prefix` - The prefix for generated IDs (e.g., "proj")
pub fn new_in_memory_storage(prefix: String) -> Box<dyn BacklogStorage> {
    Box::new(new_shared_storage(prefix))
}

/// Create a new in-memory storage handle that can be cloned and shared
/// between concurrent workers.
pub fn new_shared_storage(prefix: String) -> InMemoryStorage {
    Arc::new(Mutex::new(InMemoryStorageInner::new(prefix)))
}
