//! Resolving a [`BindingGraph`] end to end.
//!
//! Wires the generic topology pipeline to the binding model: bindings are
//! the vertices, [`Binding::dependency_keys`] supplies the edges and
//! [`BindingEdges`] answers deferrability from the declared access kinds.

use std::collections::BTreeSet;

use stitch_core::{
    Binding, BindingGraph, BindingKey, ContextualKey, MissingPolicy, ResolverConfig,
};
use tracing::{debug, instrument, trace};

use crate::error::{ResolveError, TopologyError};
use crate::storage::{StoragePlan, classify_storage};
use crate::topology::{
    Adjacency, EdgePolicy, GraphTopology, SortOptions, build_full_adjacency, topological_sort,
};

/// [`EdgePolicy`] view of a [`BindingGraph`].
#[derive(Debug, Clone, Copy)]
pub struct BindingEdges<'g>(pub &'g BindingGraph);

impl EdgePolicy<BindingKey> for BindingEdges<'_> {
    fn is_deferrable(&self, from: &BindingKey, to: &BindingKey) -> bool {
        self.0
            .get(from)
            .and_then(|binding| binding.edge_is_deferrable(to))
            .unwrap_or(false)
    }

    fn is_implicitly_deferrable(&self, vertex: &BindingKey) -> bool {
        self.0
            .get(vertex)
            .is_some_and(|binding| binding.kind.is_implicitly_deferrable())
    }
}

/// Forward adjacency of every binding in `graph`.
///
/// Optional dependencies on absent keys are always dropped; other absent
/// targets follow `missing`.
///
/// # Errors
///
/// Returns [`TopologyError::MissingDependency`] for the first absent target
/// (in key order) when `missing` is [`MissingPolicy::Fail`].
#[instrument(skip_all, fields(bindings = graph.len(), missing = ?missing))]
pub fn binding_adjacency(
    graph: &BindingGraph,
    missing: MissingPolicy,
) -> Result<Adjacency<BindingKey>, TopologyError<BindingKey>> {
    build_full_adjacency(
        graph.keys().cloned(),
        |key: &BindingKey| {
            graph
                .get(key)
                .map(|binding| binding.dependency_keys().cloned().collect::<Vec<_>>())
                .unwrap_or_default()
        },
        |dependent: &BindingKey, target: &BindingKey| {
            let optional = graph
                .get(dependent)
                .and_then(|binding| binding.dependency_on(target))
                .is_some_and(|dependency| dependency.optional);
            if optional || missing == MissingPolicy::Ignore {
                trace!(%dependent, %target, optional, "dropping edge to missing binding");
                return Ok(());
            }
            Err(TopologyError::MissingDependency {
                dependent: dependent.clone(),
                missing: target.clone(),
            })
        },
    )
}

/// What the caller asks of a graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveRequest {
    /// Values requested directly, with their access kind.
    pub roots: Vec<ContextualKey>,
    /// Keys that must be materialized even if no root needs them.
    pub keep: Vec<ContextualKey>,
}

impl ResolveRequest {
    #[must_use]
    pub fn new(roots: impl IntoIterator<Item = ContextualKey>) -> Self {
        Self {
            roots: roots.into_iter().collect(),
            keep: Vec::new(),
        }
    }

    #[must_use]
    pub fn keep(mut self, keys: impl IntoIterator<Item = ContextualKey>) -> Self {
        self.keep.extend(keys);
        self
    }

    /// Roots followed by extra-keep keys.
    pub fn requested(&self) -> impl Iterator<Item = &ContextualKey> {
        self.roots.iter().chain(&self.keep)
    }
}

/// The ordering and storage plan of one graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub topology: GraphTopology<BindingKey>,
    pub storage: StoragePlan,
}

impl Resolution {
    /// Bindings in initialization order.
    pub fn bindings<'g>(&'g self, graph: &'g BindingGraph) -> impl Iterator<Item = &'g Binding> {
        self.topology
            .sorted_keys
            .iter()
            .filter_map(|key| graph.get(key))
    }
}

/// Order `graph` and classify the storage of everything `request` reaches.
///
/// # Errors
///
/// - [`ResolveError::UnknownRoot`] if a requested key has no binding;
/// - [`ResolveError::MissingBinding`] for an absent dependency under
///   [`MissingPolicy::Fail`];
/// - [`ResolveError::Cycles`] if a cycle cannot be broken by deferral.
///
/// # Panics
///
/// Panics on internal invariant violations in the ordering pipeline.
#[instrument(skip_all, fields(bindings = graph.len(), roots = request.roots.len()))]
pub fn resolve(
    graph: &BindingGraph,
    request: &ResolveRequest,
    config: &ResolverConfig,
) -> Result<Resolution, ResolveError> {
    if let Some(unknown) = request.requested().find(|key| !graph.contains(&key.key)) {
        return Err(ResolveError::UnknownRoot(unknown.key.clone()));
    }

    let full = binding_adjacency(graph, config.missing)?;

    let roots: BTreeSet<BindingKey> = request.requested().map(|key| key.key.clone()).collect();
    let options = SortOptions {
        roots: (config.prune_unreachable && !roots.is_empty()).then_some(roots),
        cycles: config.cycles,
    };
    let topology = topological_sort(&full, &BindingEdges(graph), &options)?;
    let storage = classify_storage(graph, &topology, request.requested());

    debug!(
        ordered = topology.sorted_keys.len(),
        deferred = topology.deferred.len(),
        emitted = storage.emission_order().len(),
        "resolved binding graph"
    );
    Ok(Resolution { topology, storage })
}

#[cfg(test)]
mod tests {
    use stitch_core::{BindingKind, CollectionKind, CyclePolicy, Dependency, VariantKey};

    use super::*;
    use crate::storage::StorageKind;

    fn keys(names: &[&str]) -> Vec<BindingKey> {
        names.iter().copied().map(BindingKey::from).collect()
    }

    #[test]
    fn binding_edges_follow_declared_access() {
        let graph: BindingGraph = [
            Binding::constructor("a").depends_on_provider("b").depends_on("c"),
            Binding::new(
                "set",
                BindingKind::Multibinding {
                    collection: CollectionKind::Set,
                },
            ),
        ]
        .into_iter()
        .collect();
        let edges = BindingEdges(&graph);

        assert!(edges.is_deferrable(&"a".into(), &"b".into()));
        assert!(!edges.is_deferrable(&"a".into(), &"c".into()));
        assert!(!edges.is_deferrable(&"a".into(), &"zzz".into()));
        assert!(edges.is_implicitly_deferrable(&"set".into()));
        assert!(!edges.is_implicitly_deferrable(&"a".into()));
    }

    #[test]
    fn optional_dependencies_are_dropped_under_either_policy() {
        let graph: BindingGraph = [Binding::constructor("a").with_dependency(
            Dependency::new(ContextualKey::instance("ghost")).optional(),
        )]
        .into_iter()
        .collect();

        for policy in [MissingPolicy::Fail, MissingPolicy::Ignore] {
            let full = binding_adjacency(&graph, policy).expect("optional edge dropped");
            assert!(full[&BindingKey::from("a")].is_empty());
        }
    }

    #[test]
    fn unknown_root_is_rejected_before_sorting() {
        let graph: BindingGraph = [Binding::constructor("a")].into_iter().collect();
        let request = ResolveRequest::new([ContextualKey::instance("a")])
            .keep([ContextualKey::instance("nope")]);

        let err = resolve(&graph, &request, &ResolverConfig::default()).expect_err("unknown");
        assert_eq!(err, ResolveError::UnknownRoot("nope".into()));
    }

    #[test]
    fn keep_keys_extend_reachability() {
        let graph: BindingGraph = [
            Binding::constructor("a"),
            Binding::constructor("b"),
            Binding::constructor("c"),
        ]
        .into_iter()
        .collect();
        let request =
            ResolveRequest::new([ContextualKey::instance("a")]).keep([ContextualKey::provider("c")]);

        let resolution = resolve(&graph, &request, &ResolverConfig::default()).expect("resolves");
        assert_eq!(resolution.topology.sorted_keys, keys(&["a", "c"]));
        let c = resolution
            .storage
            .get(&VariantKey::plain("c"))
            .expect("classified");
        assert_eq!((c.factory_refs, c.kind), (1, StorageKind::Inline));
    }

    #[test]
    fn disabling_pruning_orders_every_binding() {
        let graph: BindingGraph = [Binding::constructor("a"), Binding::constructor("b")]
            .into_iter()
            .collect();
        let request = ResolveRequest::new([ContextualKey::instance("a")]);
        let config = ResolverConfig {
            prune_unreachable: false,
            ..ResolverConfig::default()
        };

        let resolution = resolve(&graph, &request, &config).expect("resolves");
        assert_eq!(resolution.topology.sorted_keys, keys(&["a", "b"]));
        let names: Vec<&str> = resolution
            .bindings(&graph)
            .map(|binding| binding.key.as_str())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn fail_fast_stops_at_the_first_hard_cycle() {
        let graph: BindingGraph = [
            Binding::constructor("a").depends_on("b"),
            Binding::constructor("b").depends_on("a"),
            Binding::constructor("x").depends_on("y"),
            Binding::constructor("y").depends_on("x"),
        ]
        .into_iter()
        .collect();
        let request = ResolveRequest::new(["a", "x"].map(ContextualKey::instance));

        let collect = resolve(&graph, &request, &ResolverConfig::default()).expect_err("cycles");
        let ResolveError::Cycles(report) = &collect else {
            panic!("expected cycles, got {collect:?}");
        };
        assert_eq!(report.cycles.len(), 2);

        let config = ResolverConfig {
            cycles: CyclePolicy::FailFast,
            ..ResolverConfig::default()
        };
        let fail_fast = resolve(&graph, &request, &config).expect_err("cycles");
        let ResolveError::Cycles(report) = &fail_fast else {
            panic!("expected cycles, got {fail_fast:?}");
        };
        assert_eq!(report.cycles.len(), 1);
    }
}
