//! Breaking dependency cycles through deferred edges.
//!
//! # Overview
//!
//! A component with more than one member (or a self-loop) is a dependency
//! cycle. It can still be constructed if some member can hand out a
//! placeholder before its deferrable dependencies exist: that member is
//! *deferred*, and its deferrable outgoing edges stop counting for ordering.
//!
//! # Search
//!
//! Candidates are members with at least one deferrable edge inside the
//! component, implicitly deferrable members first, natural order within
//! each tier. The search tries:
//!
//! 1. each candidate alone, returning the first that leaves the component
//!    acyclic;
//! 2. all candidates at once.
//!
//! Subsets between one and all are not explored, so a component that needs
//! exactly two deferral points out of three candidates over-defers. Deferring
//! a member only removes edges, so the second tier succeeds whenever any
//! subset of candidates would.
//!
//! A component with no deferrable internal edge, or that stays cyclic with
//! every candidate deferred, is a hard cycle.

use std::collections::BTreeSet;
use std::fmt;

use fixedbitset::FixedBitSet;
use stitch_core::CyclePolicy;
use tracing::{debug, instrument, warn};

use super::EdgePolicy;
use super::scc::{Component, TarjanResult};
use crate::error::{Cycle, CycleReport, TopologyError};

/// A component that was made acyclic by deferring some of its members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokenCycle<V> {
    /// Members in natural order.
    pub members: Vec<V>,
    /// The members chosen as deferral points, in natural order.
    pub deferred: Vec<V>,
}

#[derive(Debug)]
pub(crate) struct CycleResolution<V> {
    pub deferred: BTreeSet<V>,
    pub broken: Vec<BrokenCycle<V>>,
}

/// Choose deferral points for every cyclic component of `tarjan`.
///
/// # Errors
///
/// Returns [`TopologyError::HardCycles`] if any component cannot be broken.
/// With [`CyclePolicy::FailFast`] the report holds only the first such
/// component (in component id order); with [`CyclePolicy::Collect`] it holds
/// all of them. `on_cycle` sees each hard cycle as it is found.
#[instrument(skip_all, fields(components = tarjan.components.len()))]
pub(crate) fn resolve_cycles<V, P, H>(
    tarjan: &TarjanResult<V>,
    policy: &P,
    cycles: CyclePolicy,
    mut on_cycle: H,
) -> Result<CycleResolution<V>, TopologyError<V>>
where
    V: Ord + Clone + fmt::Debug + fmt::Display,
    P: EdgePolicy<V> + ?Sized,
    H: FnMut(&Cycle<V>),
{
    let mut deferred = BTreeSet::new();
    let mut broken = Vec::new();
    let mut hard = Vec::new();
    let mut checker = AcyclicityChecker::default();

    for component in &tarjan.components {
        let edges = ComponentEdges::collect(component, tarjan, policy);
        if edges.is_empty() {
            continue;
        }

        if let Some(points) = edges.find_deferral_set(policy, &mut checker) {
            let points: Vec<V> = points.iter().map(|&i| edges.members[i].clone()).collect();
            debug!(component = component.id, deferred = ?points, "broke cycle");
            deferred.extend(points.iter().cloned());
            broken.push(BrokenCycle {
                members: component.vertices.clone(),
                deferred: points,
            });
            continue;
        }

        let cycle = edges.to_cycle();
        warn!(component = component.id, members = ?cycle.members, "unbreakable dependency cycle");
        on_cycle(&cycle);
        hard.push(cycle);
        if cycles == CyclePolicy::FailFast {
            break;
        }
    }

    if hard.is_empty() {
        Ok(CycleResolution { deferred, broken })
    } else {
        Err(TopologyError::HardCycles(CycleReport { cycles: hard }))
    }
}

// ---------------------------------------------------------------------------
// Component-local edges
// ---------------------------------------------------------------------------

/// Edges with both endpoints inside one component, by local member index.
struct ComponentEdges<'c, V> {
    /// Sorted members; a member's local index is its position here.
    members: &'c [V],
    /// `targets[i]` = `(j, deferrable)` for each edge `members[i] → members[j]`.
    targets: Vec<Vec<(usize, bool)>>,
}

impl<'c, V: Ord + Clone> ComponentEdges<'c, V> {
    fn collect<P>(component: &'c Component<V>, tarjan: &TarjanResult<V>, policy: &P) -> Self
    where
        P: EdgePolicy<V> + ?Sized,
    {
        let members = component.vertices.as_slice();
        let targets = members
            .iter()
            .map(|vertex| {
                tarjan
                    .adjacency
                    .forward
                    .get(vertex)
                    .into_iter()
                    .flatten()
                    .filter(|dep| tarjan.component_of.get(*dep) == Some(&component.id))
                    .filter_map(|dep| {
                        let local = members.binary_search(dep).ok()?;
                        Some((local, policy.is_deferrable(vertex, dep)))
                    })
                    .collect()
            })
            .collect();

        Self { members, targets }
    }

    fn len(&self) -> usize {
        self.members.len()
    }

    fn is_empty(&self) -> bool {
        self.targets.iter().all(Vec::is_empty)
    }

    /// Local indices to defer, or `None` if the component is a hard cycle.
    fn find_deferral_set<P>(&self, policy: &P, checker: &mut AcyclicityChecker) -> Option<Vec<usize>>
    where
        P: EdgePolicy<V> + ?Sized,
    {
        let mut candidates: Vec<usize> = (0..self.len())
            .filter(|&i| self.targets[i].iter().any(|&(_, deferrable)| deferrable))
            .collect();
        if candidates.is_empty() {
            return None;
        }
        // Stable sort: natural order survives inside each tier.
        candidates.sort_by_key(|&i| !policy.is_implicitly_deferrable(&self.members[i]));

        for &candidate in &candidates {
            if checker.is_acyclic(self, &[candidate]) {
                return Some(vec![candidate]);
            }
        }

        if checker.is_acyclic(self, &candidates) {
            candidates.sort_unstable();
            return Some(candidates);
        }

        None
    }

    fn to_cycle(&self) -> Cycle<V> {
        let dependencies = self
            .members
            .iter()
            .zip(&self.targets)
            .map(|(member, targets)| {
                let deps = targets.iter().map(|&(j, _)| self.members[j].clone()).collect();
                (member.clone(), deps)
            })
            .collect();

        Cycle {
            members: self.members.to_vec(),
            dependencies,
        }
    }
}

// ---------------------------------------------------------------------------
// Acyclicity test
// ---------------------------------------------------------------------------

/// DFS cycle detection over [`ComponentEdges`] with a set of deferred members.
///
/// Scratch sets are kept between calls to avoid reallocating, and are fully
/// reset at the start of every [`is_acyclic`](Self::is_acyclic) call: each
/// call is an independent simulation of its own deferred set.
#[derive(Debug, Default)]
struct AcyclicityChecker {
    visited: FixedBitSet,
    on_stack: FixedBitSet,
    deferred: FixedBitSet,
    /// `(member, next edge cursor)`
    frames: Vec<(usize, usize)>,
}

impl AcyclicityChecker {
    fn reset(&mut self, len: usize) {
        for set in [&mut self.visited, &mut self.on_stack, &mut self.deferred] {
            set.clear();
            set.grow(len);
        }
        self.frames.clear();
    }

    fn enter(&mut self, member: usize) {
        self.visited.insert(member);
        self.on_stack.insert(member);
        self.frames.push((member, 0));
    }

    /// `true` if the component has no cycle once the deferrable edges of
    /// every member in `deferred` are ignored.
    fn is_acyclic<V: Ord + Clone>(&mut self, edges: &ComponentEdges<'_, V>, deferred: &[usize]) -> bool {
        self.reset(edges.len());
        for &member in deferred {
            self.deferred.insert(member);
        }

        for start in 0..edges.len() {
            if self.visited.contains(start) {
                continue;
            }
            self.enter(start);

            while let Some(frame) = self.frames.last_mut() {
                let (member, cursor) = *frame;
                let Some(&(target, deferrable)) = edges.targets[member].get(cursor) else {
                    self.frames.pop();
                    self.on_stack.set(member, false);
                    continue;
                };
                frame.1 += 1;

                if deferrable && self.deferred.contains(member) {
                    continue;
                }
                if self.on_stack.contains(target) {
                    return false;
                }
                if !self.visited.contains(target) {
                    self.enter(target);
                }
            }
        }

        true
    }
}
