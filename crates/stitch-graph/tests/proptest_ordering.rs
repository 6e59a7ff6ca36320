use std::collections::{BTreeMap, BTreeSet};

use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use proptest::prelude::*;
use stitch_core::CyclePolicy;
use stitch_graph::error::{TopologyError, fail_on_missing};
use stitch_graph::topology::{
    Adjacency, EdgePolicy, GraphTopology, SortOptions, build_full_adjacency, compute_components,
    topological_sort,
};

/// A random graph over `0..n` plus the order its vertices are presented in.
#[derive(Debug, Clone)]
struct RandomGraph {
    n: u32,
    /// Dependencies in declaration order (may repeat).
    deps: BTreeMap<u32, Vec<u32>>,
    /// `true` iff every declared use of the edge is deferred.
    deferrable: BTreeMap<(u32, u32), bool>,
    order: Vec<u32>,
    roots: Option<BTreeSet<u32>>,
}

impl RandomGraph {
    fn new(
        n: u32,
        edges: &[(u32, u32, bool)],
        order: Vec<u32>,
        roots: Option<BTreeSet<u32>>,
    ) -> Self {
        let mut deps: BTreeMap<u32, Vec<u32>> = (0..n).map(|v| (v, Vec::new())).collect();
        let mut deferrable = BTreeMap::new();
        for &(from, to, deferred) in edges {
            deps.entry(from).or_default().push(to);
            deferrable
                .entry((from, to))
                .and_modify(|all: &mut bool| *all &= deferred)
                .or_insert(deferred);
        }
        Self {
            n,
            deps,
            deferrable,
            order,
            roots,
        }
    }

    fn adjacency(&self, order: &[u32], reverse_deps: bool) -> Adjacency<u32> {
        build_full_adjacency(
            order.iter().copied(),
            |v: &u32| {
                let mut deps = self.deps[v].clone();
                if reverse_deps {
                    deps.reverse();
                }
                deps
            },
            fail_on_missing,
        )
        .expect("every target is a vertex")
    }

    fn sort(
        &self,
        order: &[u32],
        reverse_deps: bool,
    ) -> Result<GraphTopology<u32>, TopologyError<u32>> {
        let options = SortOptions {
            roots: self.roots.clone(),
            cycles: CyclePolicy::Collect,
        };
        topological_sort(&self.adjacency(order, reverse_deps), self, &options)
    }

    fn natural_order(&self) -> Vec<u32> {
        (0..self.n).collect()
    }
}

impl EdgePolicy<u32> for RandomGraph {
    fn is_deferrable(&self, from: &u32, to: &u32) -> bool {
        self.deferrable.get(&(*from, *to)).copied().unwrap_or(false)
    }

    fn is_implicitly_deferrable(&self, vertex: &u32) -> bool {
        vertex % 3 == 0
    }
}

fn arb_graph() -> impl Strategy<Value = RandomGraph> {
    (1_u32..14).prop_flat_map(|n| {
        let edges = prop::collection::vec((0..n, 0..n, any::<bool>()), 0..(n as usize * 2));
        let order = Just((0..n).collect::<Vec<_>>()).prop_shuffle();
        let roots = prop::option::of(prop::collection::btree_set(0..n, 1..=(n as usize).min(3)));
        (edges, order, roots)
            .prop_map(move |(edges, order, roots)| RandomGraph::new(n, &edges, order, roots))
    })
}

/// Strongly connected components as sorted member lists.
fn petgraph_components(full: &Adjacency<u32>) -> BTreeSet<Vec<u32>> {
    let mut graph = DiGraphMap::<u32, ()>::new();
    for (&vertex, deps) in full {
        graph.add_node(vertex);
        for &dep in deps {
            graph.add_edge(vertex, dep, ());
        }
    }
    tarjan_scc(&graph)
        .into_iter()
        .map(|mut members| {
            members.sort_unstable();
            members
        })
        .collect()
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(512))]

    #[test]
    fn output_ignores_presentation_order(graph in arb_graph()) {
        let natural = graph.sort(&graph.natural_order(), false);
        let shuffled = graph.sort(&graph.order, true);

        if let (Ok(a), Ok(b)) = (&natural, &shuffled) {
            prop_assert_eq!(a.fingerprint(), b.fingerprint());
        }
        prop_assert_eq!(natural, shuffled);
    }

    #[test]
    fn every_hard_dependency_precedes_its_dependent(graph in arb_graph()) {
        let Ok(topology) = graph.sort(&graph.natural_order(), false) else {
            return Ok(());
        };

        let emitted: BTreeSet<u32> = topology.sorted_keys.iter().copied().collect();
        prop_assert_eq!(emitted.len(), topology.sorted_keys.len());
        prop_assert_eq!(&emitted, &topology.reachable);
        prop_assert!(topology.deferred.is_subset(&topology.reachable));

        for &vertex in &topology.sorted_keys {
            let at = topology.position(&vertex).expect("sorted");
            for &dep in &graph.deps[&vertex] {
                if topology.is_deferred(&vertex) && graph.is_deferrable(&vertex, &dep) {
                    continue;
                }
                let dep_at = topology.position(&dep).expect("dependencies are reachable");
                prop_assert!(
                    dep_at < at,
                    "{dep} must precede {vertex} in {:?}",
                    topology.sorted_keys
                );
            }
        }
    }

    #[test]
    fn components_agree_with_petgraph(graph in arb_graph()) {
        let full = graph.adjacency(&graph.natural_order(), false);
        let ours: BTreeSet<Vec<u32>> = compute_components(&full, None)
            .components
            .into_iter()
            .map(|component| component.vertices)
            .collect();

        prop_assert_eq!(ours, petgraph_components(&full));
    }

    #[test]
    fn hard_cycles_are_whole_components(graph in arb_graph()) {
        let Err(err) = graph.sort(&graph.natural_order(), false) else {
            return Ok(());
        };
        let TopologyError::HardCycles(report) = err else {
            return Err(TestCaseError::fail("only cycles can fail a complete graph"));
        };

        let components = petgraph_components(&graph.adjacency(&graph.natural_order(), false));
        prop_assert!(!report.cycles.is_empty());
        for cycle in &report.cycles {
            prop_assert!(
                components.contains(&cycle.members),
                "{:?} is not a component",
                cycle.members
            );
        }
    }
}
