//! JSONL persistence for in-memory storage.
//!
//! The data file holds one JSON record per line, tagged as either an epic or
//! a story. Loading is resilient: malformed lines, stories without their
//! epic, orphaned dependency edges, and edges that would close a cycle are
//! skipped with a [`LoadWarning`] instead of failing the whole load.

use super::graph::would_close_cycle;
use super::inner::InMemoryStorageInner;
use crate::domain::{Epic, EpicId, Story, StoryId};
use crate::error::{Error, Result};
use crate::storage::BacklogStorage;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::Mutex;

/// One line of the data file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Record {
    /// An epic record
    Epic(Epic),
    /// A story record
    Story(Story),
}

/// Non-fatal problems encountered while loading a JSONL file.
///
/// The load continues past each of these; callers should log them since they
/// indicate data that needs manual attention.
#[derive(Debug, Clone)]
pub enum LoadWarning {
    /// A line that couldn't be parsed as a record. The line is skipped.
    MalformedJson {
        /// 1-based line number in the file
        line_number: usize,
        /// Parser error text
        error: String,
    },

    /// A story whose owning epic is not in the file. The story is skipped.
    MissingEpic {
        /// The skipped story
        story_id: StoryId,
        /// The epic the story referenced
        epic_id: EpicId,
    },

    /// A dependency edge referencing a story that doesn't exist. The edge is
    /// skipped; both stories are still loaded when present.
    OrphanedDependency {
        /// The dependent story
        from: StoryId,
        /// The missing dependency target
        to: StoryId,
    },

    /// A dependency edge that would close a cycle. The edge is skipped to
    /// break the cycle.
    CircularDependency {
        /// The dependent story
        from: StoryId,
        /// The dependency target
        to: StoryId,
    },
}

/// Load storage from a JSONL file.
///
/// Reconstructs epics, stories, and the dependency graph. Returns the
/// storage together with any warnings produced along the way.
///
/// # Errors
///
/// Returns an error only if the file itself cannot be read; individual bad
/// records become warnings.
pub async fn load_from_jsonl(
    path: &Path,
    prefix: String,
) -> Result<(Box<dyn BacklogStorage>, Vec<LoadWarning>)> {
    let mut warnings = Vec::new();
    let mut epics: Vec<Epic> = Vec::new();
    let mut stories: Vec<Story> = Vec::new();

    let file = File::open(path).await.map_err(Error::Io)?;
    let mut lines = BufReader::new(file).lines();
    let mut line_number = 0;

    while let Some(line) = lines.next_line().await.map_err(Error::Io)? {
        line_number += 1;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<Record>(&line) {
            Ok(Record::Epic(epic)) => epics.push(epic),
            Ok(Record::Story(story)) => stories.push(story),
            Err(e) => warnings.push(LoadWarning::MalformedJson {
                line_number,
                error: e.to_string(),
            }),
        }
    }

    let storage = Arc::new(Mutex::new(InMemoryStorageInner::new(prefix)));
    let mut inner = storage.lock().await;

    for epic in epics {
        inner.id_generator.register_id(epic.id.as_str().to_string());
        inner.epics.insert(epic.id.clone(), epic);
    }

    // Stories must reference a loaded epic; skip the rest
    let mut kept: Vec<Story> = Vec::new();
    for story in stories {
        if !inner.epics.contains_key(&story.epic_id) {
            warnings.push(LoadWarning::MissingEpic {
                story_id: story.id.clone(),
                epic_id: story.epic_id.clone(),
            });
            continue;
        }
        kept.push(story);
    }

    for story in &kept {
        let node = inner.graph.add_node(story.id.clone());
        inner.node_map.insert(story.id.clone(), node);
        inner
            .id_generator
            .register_id(story.id.as_str().to_string());
        inner.stories.insert(story.id.clone(), story.clone());
    }

    // Edges last, with the same acyclicity guarantee the live service gives
    for story in &kept {
        for dep in &story.depends_on {
            if !inner.node_map.contains_key(dep) {
                warnings.push(LoadWarning::OrphanedDependency {
                    from: story.id.clone(),
                    to: dep.clone(),
                });
                continue;
            }

            if would_close_cycle(&inner.graph, &inner.node_map, &story.id, dep)? {
                warnings.push(LoadWarning::CircularDependency {
                    from: story.id.clone(),
                    to: dep.clone(),
                });
                continue;
            }

            let from_node = inner.node_map[&story.id];
            let to_node = inner.node_map[dep];
            inner.graph.add_edge(from_node, to_node, ());
        }
    }

    // Drop edges that were skipped so the mirror stays consistent with the
    // graph
    let skipped: Vec<(StoryId, StoryId)> = warnings
        .iter()
        .filter_map(|w| match w {
            LoadWarning::OrphanedDependency { from, to }
            | LoadWarning::CircularDependency { from, to } => Some((from.clone(), to.clone())),
            _ => None,
        })
        .collect();
    for (from, to) in skipped {
        if let Some(story) = inner.stories.get_mut(&from) {
            story.depends_on.retain(|dep| dep != &to);
        }
    }

    drop(inner);

    Ok((Box::new(storage), warnings))
}

/// Save storage to a JSONL file with atomic writes.
///
/// Writes to a temporary file first, then renames over the target, so a
/// crash mid-write leaves the original file intact. Records are sorted by id
/// and dependency lists are sorted, keeping the output stable across saves
/// for clean version-control diffs.
///
/// # Errors
///
/// Returns an error if the export, the write, or the rename fails.
pub async fn save_to_jsonl(storage: &dyn BacklogStorage, path: &Path) -> Result<()> {
    let temp_path = path.with_extension("tmp");

    let file = File::create(&temp_path).await.map_err(Error::Io)?;
    let mut writer = BufWriter::new(file);

    let (mut epics, mut stories) = storage.export_records().await?;
    epics.sort_by(|a, b| a.id.cmp(&b.id));
    stories.sort_by(|a, b| a.id.cmp(&b.id));

    for epic in epics {
        let json = serde_json::to_string(&Record::Epic(epic))?;
        writer.write_all(json.as_bytes()).await.map_err(Error::Io)?;
        writer.write_all(b"\n").await.map_err(Error::Io)?;
    }

    for mut story in stories {
        story.depends_on.sort();
        let json = serde_json::to_string(&Record::Story(story))?;
        writer.write_all(json.as_bytes()).await.map_err(Error::Io)?;
        writer.write_all(b"\n").await.map_err(Error::Io)?;
    }

    writer.flush().await.map_err(Error::Io)?;

    tokio::fs::rename(&temp_path, path).await.map_err(Error::Io)?;

    Ok(())
}
