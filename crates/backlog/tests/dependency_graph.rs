//! Property tests for the dependency graph.
//!
//! The load-bearing invariant: no sequence of `add_dependency` and
//! `remove_dependency` calls can ever leave a cycle in the stored edge set,
//! and the `depends_on` mirror on each story always matches the graph.

use backlog::domain::{Epic, EpicId, EpicStatus, Story, StoryId, StoryStatus};
use backlog::storage::in_memory::new_in_memory_storage;
use backlog::storage::BacklogStorage;
use chrono::Utc;
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};

const STORY_COUNT: usize = 8;

fn story_id(index: usize) -> StoryId {
    StoryId::new(format!("test-s{index:02}"))
}

fn seed_records() -> (Vec<Epic>, Vec<Story>) {
    let now = Utc::now();
    let epic = Epic {
        id: EpicId::new("test-epic"),
        title: "Property epic".to_string(),
        description: String::new(),
        status: EpicStatus::InProgress,
        created_at: now,
        updated_at: now,
    };
    let stories = (0..STORY_COUNT)
        .map(|i| Story {
            id: story_id(i),
            epic_id: EpicId::new("test-epic"),
            title: format!("Story {i}"),
            description: String::new(),
            status: StoryStatus::Todo,
            priority: 0,
            tasks: vec![],
            acceptance_criteria: vec![],
            comments: vec![],
            depends_on: vec![],
            created_at: now,
            updated_at: now,
        })
        .collect();
    (vec![epic], stories)
}

/// Exhaustive cycle check over the exported `depends_on` mirror.
fn contains_cycle(adjacency: &HashMap<StoryId, Vec<StoryId>>) -> bool {
    // Iterative DFS with a three-state visit marker
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InStack,
        Finished,
    }

    let mut marks: HashMap<&StoryId, Mark> =
        adjacency.keys().map(|id| (id, Mark::Unvisited)).collect();

    for start in adjacency.keys() {
        if marks[start] != Mark::Unvisited {
            continue;
        }

        let mut stack = vec![(start, 0usize)];
        marks.insert(start, Mark::InStack);

        while let Some(&(node, edge_index)) = stack.last() {
            let next = adjacency[node].get(edge_index);
            stack.last_mut().unwrap().1 += 1;

            match next {
                Some(target) => match marks.get(target).copied() {
                    Some(Mark::InStack) => return true,
                    Some(Mark::Unvisited) => {
                        marks.insert(target, Mark::InStack);
                        stack.push((target, 0));
                    }
                    _ => {}
                },
                None => {
                    marks.insert(node, Mark::Finished);
                    stack.pop();
                }
            }
        }
    }

    false
}

/// One step of the generated workload.
#[derive(Debug, Clone)]
enum Op {
    Add(usize, usize),
    Remove(usize, usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..STORY_COUNT, 0..STORY_COUNT).prop_map(|(a, b)| Op::Add(a, b)),
        1 => (0..STORY_COUNT, 0..STORY_COUNT).prop_map(|(a, b)| Op::Remove(a, b)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn graph_stays_acyclic_under_any_workload(ops in prop::collection::vec(op_strategy(), 0..60)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async move {
            let mut storage = new_in_memory_storage("test".to_string());
            let (epics, stories) = seed_records();
            storage.import_records(epics, stories).await.unwrap();

            let mut accepted: HashSet<(usize, usize)> = HashSet::new();

            for op in ops {
                match op {
                    Op::Add(a, b) => {
                        match storage.add_dependency(&story_id(a), &story_id(b)).await {
                            Ok(()) => {
                                accepted.insert((a, b));
                            }
                            Err(e) => {
                                // Rejections must be one of the service's
                                // typed refusals, never a panic or a silent
                                // partial write
                                use backlog::error::Error;
                                prop_assert!(
                                    matches!(
                                        e,
                                        Error::Validation(_)
                                            | Error::DuplicateDependency { .. }
                                            | Error::CircularDependency { .. }
                                    ),
                                    "unexpected error: {:?}",
                                    e
                                );
                            }
                        }
                    }
                    Op::Remove(a, b) => {
                        let removed = storage
                            .remove_dependency(&story_id(a), &story_id(b))
                            .await
                            .unwrap();
                        prop_assert_eq!(removed, accepted.remove(&(a, b)));
                    }
                }
            }

            // The mirror matches exactly what the service accepted
            let (_, stored) = storage.export_records().await.unwrap();
            let adjacency: HashMap<StoryId, Vec<StoryId>> = stored
                .iter()
                .map(|s| (s.id.clone(), s.depends_on.clone()))
                .collect();

            let mut mirrored: HashSet<(StoryId, StoryId)> = HashSet::new();
            for (from, deps) in &adjacency {
                for to in deps {
                    mirrored.insert((from.clone(), to.clone()));
                }
            }
            let expected: HashSet<(StoryId, StoryId)> = accepted
                .iter()
                .map(|&(a, b)| (story_id(a), story_id(b)))
                .collect();
            prop_assert_eq!(mirrored, expected);

            prop_assert!(!contains_cycle(&adjacency), "accepted edge set must stay acyclic");

            Ok(())
        })?;
    }
}
