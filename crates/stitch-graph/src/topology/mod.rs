//! Cycle-aware topological ordering.
//!
//! # Overview
//!
//! Generic over any vertex type `V: Ord + Clone`. The natural order of `V`
//! is the only tie-breaker used anywhere, so identical inputs always produce
//! identical output no matter how the input collection was iterated.
//!
//! ## Pipeline
//!
//! ```text
//! vertices + dependencies_of
//!        ↓  build::build_full_adjacency()
//! Adjacency (sorted, may contain cycles)
//!        ↓  scc::compute_components()      roots → reachable subset
//! TarjanResult (components + reachable forward/reverse adjacency)
//!        ↓  cycles::resolve_cycles()       hard cycles → TopologyError
//! deferred set
//!        ↓  dag::build_component_dag() + dag::sort_component_dag()
//! component order
//!        ↓  expand::expand_components()
//! GraphTopology (sorted keys, deferred, reachable)
//! ```
//!
//! ## Typical Usage
//!
//! ```rust
//! use std::collections::BTreeSet;
//! use stitch_graph::topology::{SortOptions, build_full_adjacency, topological_sort};
//! use stitch_graph::error::fail_on_missing;
//!
//! let deps = |v: &&str| match *v {
//!     "app" => vec!["db", "log"],
//!     "db" => vec!["log"],
//!     _ => vec![],
//! };
//! let full = build_full_adjacency(["app", "db", "log"], deps, fail_on_missing)?;
//! let no_deferral = |_: &&str, _: &&str| false;
//! let options = SortOptions::with_roots(BTreeSet::from(["app"]));
//! let topology = topological_sort(&full, &no_deferral, &options)?;
//!
//! assert_eq!(topology.sorted_keys, vec!["log", "db", "app"]);
//! # Ok::<(), stitch_graph::error::TopologyError<&str>>(())
//! ```

pub mod build;
pub mod cycles;
pub mod dag;
pub mod expand;
pub mod scc;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use stitch_core::CyclePolicy;
use tracing::{debug, instrument};

use crate::error::{Cycle, TopologyError};

pub use build::build_full_adjacency;
pub use cycles::BrokenCycle;
pub use scc::{Component, ReachableAdjacency, TarjanResult, compute_components};

/// `vertex → set of vertices it depends on`, both levels sorted.
pub type Adjacency<V> = BTreeMap<V, BTreeSet<V>>;

// ---------------------------------------------------------------------------
// EdgePolicy
// ---------------------------------------------------------------------------

/// Externally supplied knowledge about which edges can be deferred.
///
/// Implementations must be pure: the pipeline queries the same edge several
/// times across passes and expects the same answer.
pub trait EdgePolicy<V> {
    /// Whether `from` can be constructed before `to` exists (`from` reaches
    /// `to` only through a provider/lazy indirection).
    fn is_deferrable(&self, from: &V, to: &V) -> bool;

    /// Vertices that are inherently safe to defer. Only affects which
    /// deferral candidates are tried first.
    fn is_implicitly_deferrable(&self, _vertex: &V) -> bool {
        false
    }
}

impl<V, F> EdgePolicy<V> for F
where
    F: Fn(&V, &V) -> bool,
{
    fn is_deferrable(&self, from: &V, to: &V) -> bool {
        self(from, to)
    }
}

/// An [`EdgePolicy`] assembled from two predicates.
#[derive(Debug, Clone, Copy)]
pub struct FnEdgePolicy<F, G> {
    pub deferrable: F,
    pub implicitly_deferrable: G,
}

impl<V, F, G> EdgePolicy<V> for FnEdgePolicy<F, G>
where
    F: Fn(&V, &V) -> bool,
    G: Fn(&V) -> bool,
{
    fn is_deferrable(&self, from: &V, to: &V) -> bool {
        (self.deferrable)(from, to)
    }

    fn is_implicitly_deferrable(&self, vertex: &V) -> bool {
        (self.implicitly_deferrable)(vertex)
    }
}

// ---------------------------------------------------------------------------
// SortOptions / GraphTopology
// ---------------------------------------------------------------------------

/// Knobs for [`topological_sort`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOptions<V> {
    /// Restrict the output to vertices reachable from these; `None` keeps all.
    pub roots: Option<BTreeSet<V>>,
    pub cycles: CyclePolicy,
}

impl<V> Default for SortOptions<V> {
    fn default() -> Self {
        Self {
            roots: None,
            cycles: CyclePolicy::default(),
        }
    }
}

impl<V> SortOptions<V> {
    #[must_use]
    pub fn with_roots(roots: BTreeSet<V>) -> Self {
        Self {
            roots: Some(roots),
            cycles: CyclePolicy::default(),
        }
    }

    #[must_use]
    pub const fn cycles(mut self, cycles: CyclePolicy) -> Self {
        self.cycles = cycles;
        self
    }
}

/// The resolved ordering of one graph.
///
/// Build-scoped and immutable once returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphTopology<V: Ord> {
    /// Initialization order: every non-deferred dependency precedes its dependent.
    pub sorted_keys: Vec<V>,
    /// Vertices that need a placeholder allocated before they are populated.
    pub deferred: BTreeSet<V>,
    /// Every vertex reachable from the roots (all vertices without roots).
    pub reachable: BTreeSet<V>,
    /// Reachable forward and reverse adjacency.
    pub adjacency: ReachableAdjacency<V>,
    /// Components in completion order.
    pub components: Vec<Component<V>>,
    /// Cyclic components made acyclic by deferral.
    pub broken_cycles: Vec<BrokenCycle<V>>,
    positions: BTreeMap<V, usize>,
}

impl<V: Ord + Clone> GraphTopology<V> {
    /// Index of `vertex` in [`sorted_keys`](Self::sorted_keys).
    #[must_use]
    pub fn position(&self, vertex: &V) -> Option<usize> {
        self.positions.get(vertex).copied()
    }

    #[must_use]
    pub fn is_deferred(&self, vertex: &V) -> bool {
        self.deferred.contains(vertex)
    }

    #[must_use]
    pub fn is_reachable(&self, vertex: &V) -> bool {
        self.reachable.contains(vertex)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sorted_keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sorted_keys.is_empty()
    }
}

impl<V: Ord + fmt::Display> GraphTopology<V> {
    /// BLAKE3 hash of the sorted sequence and deferred set.
    ///
    /// Equal fingerprints mean byte-identical ordering output; use it for
    /// determinism checks and to invalidate emitted code.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for key in &self.sorted_keys {
            hasher.update(key.to_string().as_bytes());
            hasher.update(b"\x00");
        }
        hasher.update(b"\x01");
        for key in &self.deferred {
            hasher.update(key.to_string().as_bytes());
            hasher.update(b"\x00");
        }
        format!("blake3:{}", hasher.finalize())
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Order every vertex reachable from `options.roots`.
///
/// # Errors
///
/// Returns [`TopologyError::HardCycles`] if a cycle cannot be broken through
/// deferrable edges.
///
/// # Panics
///
/// Panics on internal invariant violations (the condensed DAG has a cycle,
/// or a component stays cyclic under its chosen deferral points).
pub fn topological_sort<V, P>(
    full: &Adjacency<V>,
    policy: &P,
    options: &SortOptions<V>,
) -> Result<GraphTopology<V>, TopologyError<V>>
where
    V: Ord + Clone + fmt::Debug + fmt::Display,
    P: EdgePolicy<V> + ?Sized,
{
    topological_sort_with(full, policy, options, |_: &Cycle<V>| {})
}

/// [`topological_sort`] that also hands every unbreakable cycle to
/// `on_cycle` as it is found, before the error is returned.
///
/// With [`CyclePolicy::FailFast`] the hook runs at most once.
///
/// # Errors
///
/// Same as [`topological_sort`].
///
/// # Panics
///
/// Same as [`topological_sort`].
#[instrument(skip_all, fields(vertices = full.len()))]
pub fn topological_sort_with<V, P, H>(
    full: &Adjacency<V>,
    policy: &P,
    options: &SortOptions<V>,
    on_cycle: H,
) -> Result<GraphTopology<V>, TopologyError<V>>
where
    V: Ord + Clone + fmt::Debug + fmt::Display,
    P: EdgePolicy<V> + ?Sized,
    H: FnMut(&Cycle<V>),
{
    let tarjan = compute_components(full, options.roots.as_ref());
    let resolution = cycles::resolve_cycles(&tarjan, policy, options.cycles, on_cycle)?;

    let dag = dag::build_component_dag(
        &tarjan.adjacency.forward,
        &tarjan.component_of,
        tarjan.components.len(),
    );
    let order = dag::sort_component_dag(&dag);
    let sorted_keys = expand::expand_components(
        &order,
        &tarjan.components,
        &tarjan.adjacency.forward,
        &resolution.deferred,
        policy,
    );

    let positions = sorted_keys
        .iter()
        .enumerate()
        .map(|(i, key)| (key.clone(), i))
        .collect();
    let TarjanResult {
        components,
        component_of,
        adjacency,
    } = tarjan;

    debug!(
        sorted = sorted_keys.len(),
        deferred = resolution.deferred.len(),
        broken_cycles = resolution.broken.len(),
        "topological sort complete"
    );

    Ok(GraphTopology {
        sorted_keys,
        deferred: resolution.deferred,
        reachable: component_of.into_keys().collect(),
        adjacency,
        components,
        broken_cycles: resolution.broken,
        positions,
    })
}
