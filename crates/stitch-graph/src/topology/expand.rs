//! Expanding ordered components back into vertices.
//!
//! Single-vertex components are emitted as-is. A cyclic component is
//! re-sorted with Kahn's algorithm after masking every edge `v → dep` that
//! is deferrable *and* leaves a deferred vertex. Among ready members the
//! order is:
//!
//! 1. deferred members, so their placeholder exists before anything reads it;
//! 2. members with more dependents in the masked graph;
//! 3. natural order.

use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::fmt;

use tracing::trace;

use super::scc::Component;
use super::{Adjacency, EdgePolicy};

/// Flatten `order` (component ids) into a vertex sequence.
///
/// # Panics
///
/// Panics if a masked component still contains a cycle. The deferral
/// points were chosen so that this exact masking leaves each component
/// acyclic; a residual cycle means they disagree.
#[must_use]
pub fn expand_components<V, P>(
    order: &[usize],
    components: &[Component<V>],
    forward: &Adjacency<V>,
    deferred: &BTreeSet<V>,
    policy: &P,
) -> Vec<V>
where
    V: Ord + Clone + fmt::Debug,
    P: EdgePolicy<V> + ?Sized,
{
    let mut sorted = Vec::with_capacity(components.iter().map(|c| c.vertices.len()).sum());

    for &id in order {
        match components[id].vertices.as_slice() {
            [single] => sorted.push(single.clone()),
            members => sorted.extend(expand_component(members, forward, deferred, policy)),
        }
    }

    sorted
}

/// Order the members of one cyclic component. `members` must be sorted.
fn expand_component<V, P>(
    members: &[V],
    forward: &Adjacency<V>,
    deferred: &BTreeSet<V>,
    policy: &P,
) -> Vec<V>
where
    V: Ord + Clone + fmt::Debug,
    P: EdgePolicy<V> + ?Sized,
{
    let len = members.len();
    let mut waiting_on = vec![0_usize; len];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); len];

    for (i, member) in members.iter().enumerate() {
        let masked = deferred.contains(member);
        for dep in forward.get(member).into_iter().flatten() {
            let Ok(j) = members.binary_search(dep) else {
                continue;
            };
            if masked && policy.is_deferrable(member, dep) {
                continue;
            }
            waiting_on[i] += 1;
            dependents[j].push(i);
        }
    }

    // (not deferred, more dependents first, natural order)
    let priority = |i: usize| (!deferred.contains(&members[i]), Reverse(dependents[i].len()), i);
    let mut ready: BTreeSet<(bool, Reverse<usize>, usize)> = (0..len)
        .filter(|&i| waiting_on[i] == 0)
        .map(priority)
        .collect();

    let mut ordered = Vec::with_capacity(len);
    while let Some((_, _, i)) = ready.pop_first() {
        ordered.push(members[i].clone());
        for &dependent in &dependents[i] {
            waiting_on[dependent] -= 1;
            if waiting_on[dependent] == 0 {
                ready.insert(priority(dependent));
            }
        }
    }

    if ordered.len() < len {
        let stuck: Vec<&V> = (0..len)
            .filter(|&i| waiting_on[i] > 0)
            .map(|i| &members[i])
            .collect();
        panic!("component still cyclic after deferral masking; unordered members: {stuck:?}");
    }

    trace!(size = len, "expanded cyclic component");
    ordered
}
