//! Ordering the condensed component DAG.
//!
//! # Edge Direction
//!
//! The condensed graph inverts the binding edges: an original edge
//! `u → v` ("u depends on v") between different components becomes
//! `component(v) → component(u)` ("v is needed by u"). Kahn's algorithm over
//! that graph yields prerequisites first.
//!
//! ## Determinism
//!
//! The ready set is a min-heap of component ids, not a FIFO: whenever several
//! components become ready together the lowest id always goes first, so the
//! order only depends on the ids, which only depend on the sorted input.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

use petgraph::Direction;
use petgraph::graphmap::DiGraphMap;
use tracing::trace;

use super::Adjacency;

/// Condensed graph: nodes are component ids, edges run prerequisite → dependent.
pub type ComponentDag = DiGraphMap<usize, ()>;

/// Collapse `forward` into a DAG over `component_count` component ids.
///
/// Parallel edges between two components collapse into one.
///
/// # Panics
///
/// Panics if a vertex of `forward` (key or target) has no component.
#[must_use]
pub fn build_component_dag<V: Ord>(
    forward: &Adjacency<V>,
    component_of: &BTreeMap<V, usize>,
    component_count: usize,
) -> ComponentDag {
    let mut dag = ComponentDag::with_capacity(component_count, forward.len());
    for id in 0..component_count {
        dag.add_node(id);
    }

    for (dependent, deps) in forward {
        let to = component_of[dependent];
        for dep in deps {
            let from = component_of[dep];
            if from != to {
                dag.add_edge(from, to, ());
            }
        }
    }

    dag
}

/// Topologically sort the component DAG, prerequisites first, lowest id
/// first among ready components.
///
/// # Panics
///
/// Panics if the DAG has a cycle. Components are strongly connected by
/// construction, so a cycle here means the component map is inconsistent
/// with the adjacency it was computed from.
#[must_use]
pub fn sort_component_dag(dag: &ComponentDag) -> Vec<usize> {
    let count = dag.node_count();
    let mut in_degree: BTreeMap<usize, usize> = dag
        .nodes()
        .map(|id| (id, dag.neighbors_directed(id, Direction::Incoming).count()))
        .collect();

    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .filter(|&(_, &degree)| degree == 0)
        .map(|(&id, _)| Reverse(id))
        .collect();

    let mut order = Vec::with_capacity(count);
    while let Some(Reverse(id)) = ready.pop() {
        order.push(id);
        for next in dag.neighbors_directed(id, Direction::Outgoing) {
            if let Some(degree) = in_degree.get_mut(&next) {
                *degree -= 1;
                if *degree == 0 {
                    ready.push(Reverse(next));
                }
            }
        }
    }
    trace!(components = count, "sorted component DAG");

    assert!(
        order.len() == count,
        "component DAG has a cycle: ordered {} of {count} components",
        order.len()
    );
    order
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    #[test]
    fn edges_run_from_prerequisite_to_dependent() {
        // b depends on a; components: a=0, b=1
        let forward: Adjacency<&str> =
            BTreeMap::from([("a", BTreeSet::new()), ("b", BTreeSet::from(["a"]))]);
        let component_of = BTreeMap::from([("a", 0), ("b", 1)]);

        let dag = build_component_dag(&forward, &component_of, 2);
        assert!(dag.contains_edge(0, 1));
        assert!(!dag.contains_edge(1, 0));
    }

    #[test]
    fn intra_component_and_parallel_edges_collapse() {
        // x <-> y form component 0; z depends on both.
        let forward: Adjacency<&str> = BTreeMap::from([
            ("x", BTreeSet::from(["y"])),
            ("y", BTreeSet::from(["x"])),
            ("z", BTreeSet::from(["x", "y"])),
        ]);
        let component_of = BTreeMap::from([("x", 0), ("y", 0), ("z", 1)]);

        let dag = build_component_dag(&forward, &component_of, 2);
        assert_eq!(dag.edge_count(), 1);
        assert!(!dag.contains_edge(0, 0));
    }

    #[test]
    fn lowest_ready_id_goes_first() {
        // 3 -> 1, 2 and 0 independent.
        let mut dag = ComponentDag::new();
        for id in 0..4 {
            dag.add_node(id);
        }
        dag.add_edge(3, 1, ());

        assert_eq!(sort_component_dag(&dag), vec![0, 2, 3, 1]);
    }

    #[test]
    fn isolated_components_are_ordered_by_id() {
        let mut dag = ComponentDag::new();
        for id in [4, 2, 0, 3, 1] {
            dag.add_node(id);
        }
        assert_eq!(sort_component_dag(&dag), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    #[should_panic(expected = "component DAG has a cycle")]
    fn cyclic_component_dag_is_a_defect() {
        let mut dag = ComponentDag::new();
        dag.add_edge(0, 1, ());
        dag.add_edge(1, 0, ());
        let _ = sort_component_dag(&dag);
    }
}
