//! Dependency graph algorithms: cycle detection for `BLOCKS` edges and
//! topological batch computation. Pure functions over caller-supplied task
//! and edge data; no storage access, so callers stay free to source that
//! data however they like.

mod batch;

pub use batch::compute_batches;

use crate::domain::{Dependency, DependencyType};
use crate::id::EntityId;
use petgraph::graph::DiGraph;
use petgraph::algo::has_path_connecting;
use std::collections::HashMap;

/// Would adding a `from -> to` BLOCKS edge create a cycle, given the
/// existing BLOCKS edges? If so, returns the path from `to` back to `from`
/// that would close the loop.
///
/// Per design, this rebuilds a small graph from `existing_blocks_edges` on
/// every call rather than maintaining a precomputed index -- dependency
/// graphs here are small by construction (bounded by tasks under one
/// project/feature).
#[must_use]
pub fn detect_cycle(
    from: EntityId,
    to: EntityId,
    existing_blocks_edges: &[Dependency],
) -> Option<Vec<EntityId>> {
    let mut graph = DiGraph::<EntityId, ()>::new();
    let mut nodes: HashMap<EntityId, petgraph::graph::NodeIndex> = HashMap::new();

    let mut node_for = |id: EntityId, graph: &mut DiGraph<EntityId, ()>| {
        *nodes.entry(id).or_insert_with(|| graph.add_node(id))
    };

    for dep in existing_blocks_edges {
        if dep.dep_type != DependencyType::Blocks {
            continue;
        }
        let a = node_for(dep.from, &mut graph);
        let b = node_for(dep.to, &mut graph);
        graph.update_edge(a, b, ());
    }

    let from_node = node_for(from, &mut graph);
    let to_node = node_for(to, &mut graph);

    // A cycle is created iff `from` is already reachable from `to` (a walk
    // forward from the new edge's destination finds its way back to the
    // source).
    if has_path_connecting(&graph, to_node, from_node, None) {
        Some(shortest_path(&graph, to_node, from_node))
    } else {
        None
    }
}

fn shortest_path(
    graph: &DiGraph<EntityId, ()>,
    start: petgraph::graph::NodeIndex,
    goal: petgraph::graph::NodeIndex,
) -> Vec<EntityId> {
    use std::collections::VecDeque;

    let mut visited = std::collections::HashSet::new();
    let mut queue = VecDeque::new();
    let mut parent = HashMap::new();
    queue.push_back(start);
    visited.insert(start);

    while let Some(node) = queue.pop_front() {
        if node == goal {
            break;
        }
        for neighbor in graph.neighbors(node) {
            if visited.insert(neighbor) {
                parent.insert(neighbor, node);
                queue.push_back(neighbor);
            }
        }
    }

    let mut path = vec![goal];
    let mut current = goal;
    while let Some(&p) = parent.get(&current) {
        path.push(p);
        current = p;
        if current == start {
            break;
        }
    }
    path.reverse();
    path.into_iter().map(|n| graph[n]).collect()
}
