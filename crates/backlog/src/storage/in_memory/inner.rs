//! Core in-memory storage data structures.

use crate::domain::{Epic, Story, StoryId, StoryStatus};
use crate::error::{Error, Result};
use crate::id_generation::{IdGenerator, IdGeneratorConfig};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// Inner storage structure (not thread-safe on its own).
///
/// Wrapped in `Arc<Mutex<>>` by the parent module; the mutex is what makes
/// compound operations atomic.
///
/// # Graph representation
///
/// The dependency graph is a petgraph `DiGraph` whose nodes carry `StoryId`s
/// and whose edges are unweighted, directed **dependent -> dependency**.
/// Every story in `stories` has a corresponding entry in `node_map`.
pub struct InMemoryStorageInner {
    /// Epics indexed by ID
    pub(super) epics: HashMap<crate::domain::EpicId, Epic>,

    /// Stories indexed by ID
    pub(super) stories: HashMap<StoryId, Story>,

    /// Dependency graph; edge source depends on edge target
    pub(super) graph: DiGraph<StoryId, ()>,

    /// Mapping from StoryId to graph NodeIndex
    pub(super) node_map: HashMap<StoryId, NodeIndex>,

    /// ID generator shared by epics and stories
    pub(super) id_generator: IdGenerator,

    /// Prefix for generated IDs (e.g., "proj")
    prefix: String,
}

impl InMemoryStorageInner {
    /// Create a new empty storage instance
    #[must_use]
    pub fn new(prefix: String) -> Self {
        let config = IdGeneratorConfig {
            prefix: prefix.clone(),
            database_size: 0,
        };

        Self {
            epics: HashMap::new(),
            stories: HashMap::new(),
            graph: DiGraph::new(),
            node_map: HashMap::new(),
            id_generator: IdGenerator::new(config),
            prefix,
        }
    }

    /// Total number of records, for the adaptive ID length.
    fn record_count(&self) -> usize {
        self.epics.len() + self.stories.len()
    }

    /// Recreate the ID generator if the record count has crossed a length
    /// threshold (500 and 1500). Re-registration is O(n) but only happens at
    /// the boundaries.
    pub(super) fn update_id_generator_if_needed(&mut self) {
        let current_size = self.record_count();
        let old_size = self.id_generator.database_size();

        let needs_update = match (old_size, current_size) {
            (0..=500, 501..) => true,
            (0..=1500, 1501..) => true,
            (501.., 0..=500) => true,
            (1501.., 0..=1500) => true,
            _ => false,
        };

        if needs_update {
            self.id_generator = IdGenerator::new(IdGeneratorConfig {
                prefix: self.prefix.clone(),
                database_size: current_size,
            });

            for id in self.epics.keys() {
                self.id_generator.register_id(id.as_str().to_string());
            }
            for id in self.stories.keys() {
                self.id_generator.register_id(id.as_str().to_string());
            }
        }
    }

    /// Generate a new unique ID seeded from a title and description.
    pub(super) fn generate_id(&mut self, title: &str, description: &str) -> Result<String> {
        self.update_id_generator_if_needed();

        self.id_generator
            .generate(title, description)
            .map_err(|e| Error::Storage(format!("ID generation failed: {e}")))
    }

    /// Conditionally transition a story `Todo -> InProgress`.
    ///
    /// This is the scheduler's claim: it succeeds only if the story is still
    /// in `Todo` at the moment of the write, mirroring a conditional
    /// `UPDATE ... WHERE status = 'todo'`. Returns `false` (claim lost) when
    /// the story is missing or no longer in `Todo`; the scheduler then moves
    /// on to the next candidate.
    pub(super) fn claim_if_todo(&mut self, id: &StoryId) -> bool {
        match self.stories.get_mut(id) {
            Some(story) if story.status == StoryStatus::Todo => {
                story.status = StoryStatus::InProgress;
                story.updated_at = chrono::Utc::now();
                true
            }
            _ => false,
        }
    }
}
