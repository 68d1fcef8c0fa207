//! Dependency graph algorithms.
//!
//! Cycle detection is an explicit stack-based reachability walk rather than
//! recursion or a library shortest-path call: dependency chains can get long,
//! and the iteration bound keeps the walk finite even if the stored edge set
//! is ever inconsistent.

use crate::domain::{Story, StoryId, StoryStatus};
use crate::error::{Error, Result};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{HashMap, HashSet};

/// Whether inserting the edge `from -> to` would close a cycle.
///
/// Adding `from -> to` creates a cycle iff `from` is already reachable from
/// `to` (an existing path `to -> ... -> from` would be closed into a loop).
/// A self-edge is trivially cyclic and rejected before any traversal.
///
/// The walk follows outgoing (dependency) edges from `to` with an explicit
/// stack, visiting each node at most once and never popping more than the
/// graph's node count.
pub(super) fn would_close_cycle(
    graph: &DiGraph<StoryId, ()>,
    node_map: &HashMap<StoryId, NodeIndex>,
    from: &StoryId,
    to: &StoryId,
) -> Result<bool> {
    if from == to {
        return Ok(true);
    }

    let from_node = *node_map
        .get(from)
        .ok_or_else(|| Error::StoryNotFound(from.clone()))?;
    let to_node = *node_map
        .get(to)
        .ok_or_else(|| Error::StoryNotFound(to.clone()))?;

    let mut visited: HashSet<NodeIndex> = HashSet::new();
    let mut stack = vec![to_node];
    let node_budget = graph.node_count();
    let mut steps = 0;

    while let Some(node) = stack.pop() {
        if node == from_node {
            return Ok(true);
        }

        // Bounded by the vertex count; a consistent graph never exceeds it
        steps += 1;
        if steps > node_budget {
            break;
        }

        for edge in graph.edges(node) {
            let target = edge.target();
            if visited.insert(target) {
                stack.push(target);
            }
        }
    }

    Ok(false)
}

/// Whether any direct dependency of `node` is not yet done.
///
/// O(out-degree): only the story's own edges are examined.
pub(super) fn has_incomplete_dependency_impl(
    graph: &DiGraph<StoryId, ()>,
    stories: &HashMap<StoryId, Story>,
    node: NodeIndex,
) -> bool {
    graph.edges(node).any(|edge| {
        let dep_id = &graph[edge.target()];
        stories
            .get(dep_id)
            .is_some_and(|dep| dep.status != StoryStatus::Done)
    })
}

/// The unfinished stories directly blocking `node`.
pub(super) fn blockers_of(
    graph: &DiGraph<StoryId, ()>,
    stories: &HashMap<StoryId, Story>,
    node: NodeIndex,
) -> Vec<Story> {
    graph
        .edges(node)
        .filter_map(|edge| {
            let dep_id = &graph[edge.target()];
            stories
                .get(dep_id)
                .filter(|dep| dep.status != StoryStatus::Done)
                .cloned()
        })
        .collect()
}

/// The ids of the stories `node` depends on, in edge order.
pub(super) fn outgoing_ids(graph: &DiGraph<StoryId, ()>, node: NodeIndex) -> Vec<StoryId> {
    graph
        .edges(node)
        .map(|edge| graph[edge.target()].clone())
        .collect()
}

/// The ids of the stories depending on `node`, in edge order.
pub(super) fn incoming_ids(graph: &DiGraph<StoryId, ()>, node: NodeIndex) -> Vec<StoryId> {
    graph
        .edges_directed(node, Direction::Incoming)
        .map(|edge| graph[edge.source()].clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add_node(
        graph: &mut DiGraph<StoryId, ()>,
        node_map: &mut HashMap<StoryId, NodeIndex>,
        id: &str,
    ) -> NodeIndex {
        let story_id = StoryId::new(id);
        let node = graph.add_node(story_id.clone());
        node_map.insert(story_id, node);
        node
    }

    #[test]
    fn empty_graph_has_no_cycle() {
        let mut graph = DiGraph::new();
        let mut node_map = HashMap::new();
        add_node(&mut graph, &mut node_map, "a");
        add_node(&mut graph, &mut node_map, "b");

        let result =
            would_close_cycle(&graph, &node_map, &StoryId::new("a"), &StoryId::new("b")).unwrap();
        assert!(!result);
    }

    #[test]
    fn self_edge_is_trivially_cyclic() {
        let mut graph = DiGraph::new();
        let mut node_map = HashMap::new();
        add_node(&mut graph, &mut node_map, "a");

        let result =
            would_close_cycle(&graph, &node_map, &StoryId::new("a"), &StoryId::new("a")).unwrap();
        assert!(result);
    }

    #[test]
    fn direct_back_edge_detected() {
        let mut graph = DiGraph::new();
        let mut node_map = HashMap::new();
        let a = add_node(&mut graph, &mut node_map, "a");
        let b = add_node(&mut graph, &mut node_map, "b");
        graph.add_edge(a, b, ());

        // b -> a would close the loop a -> b -> a
        let result =
            would_close_cycle(&graph, &node_map, &StoryId::new("b"), &StoryId::new("a")).unwrap();
        assert!(result);
    }

    #[test]
    fn transitive_cycle_detected() {
        let mut graph = DiGraph::new();
        let mut node_map = HashMap::new();
        let a = add_node(&mut graph, &mut node_map, "a");
        let b = add_node(&mut graph, &mut node_map, "b");
        let c = add_node(&mut graph, &mut node_map, "c");
        graph.add_edge(a, b, ());
        graph.add_edge(b, c, ());

        let result =
            would_close_cycle(&graph, &node_map, &StoryId::new("c"), &StoryId::new("a")).unwrap();
        assert!(result);

        // The redundant shortcut a -> c is fine
        let result =
            would_close_cycle(&graph, &node_map, &StoryId::new("a"), &StoryId::new("c")).unwrap();
        assert!(!result);
    }

    #[test]
    fn missing_endpoint_is_an_error() {
        let mut graph = DiGraph::new();
        let mut node_map = HashMap::new();
        add_node(&mut graph, &mut node_map, "a");

        let result = would_close_cycle(&graph, &node_map, &StoryId::new("a"), &StoryId::new("zz"));
        assert!(matches!(result, Err(Error::StoryNotFound(_))));
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let mut graph = DiGraph::new();
        let mut node_map = HashMap::new();
        let a = add_node(&mut graph, &mut node_map, "a");
        let b = add_node(&mut graph, &mut node_map, "b");
        let c = add_node(&mut graph, &mut node_map, "c");
        let d = add_node(&mut graph, &mut node_map, "d");
        graph.add_edge(a, b, ());
        graph.add_edge(a, c, ());
        graph.add_edge(b, d, ());

        let result =
            would_close_cycle(&graph, &node_map, &StoryId::new("c"), &StoryId::new("d")).unwrap();
        assert!(!result);
    }
}
