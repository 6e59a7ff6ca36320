//! Forward adjacency construction.
//!
//! # Edge Direction
//!
//! An entry `v → {d1, d2}` means "v depends on d1 and d2". Every downstream
//! stage walks these maps in key order instead of re-sorting, so both the
//! key set and every value set are ordered collections.
//!
//! ## Missing Targets
//!
//! An edge whose target is not one of the supplied vertices is handed to the
//! caller's `on_missing` callback. The callback decides the policy: returning
//! an error aborts construction, returning `Ok(())` drops the edge.

use std::collections::BTreeSet;

use tracing::{instrument, trace};

use super::Adjacency;

/// Build the full forward adjacency for `vertices`.
///
/// Duplicate vertices collapse into one entry and duplicate edges into one
/// target. Vertices with no dependencies still get an (empty) entry.
///
/// # Errors
///
/// Returns the first error produced by `on_missing`; no adjacency is
/// returned in that case.
#[instrument(skip_all)]
pub fn build_full_adjacency<V, I, D, F, M, E>(
    vertices: I,
    mut dependencies_of: F,
    mut on_missing: M,
) -> Result<Adjacency<V>, E>
where
    V: Ord + Clone,
    I: IntoIterator<Item = V>,
    D: IntoIterator<Item = V>,
    F: FnMut(&V) -> D,
    M: FnMut(&V, &V) -> Result<(), E>,
{
    let known: BTreeSet<V> = vertices.into_iter().collect();
    let mut adjacency = Adjacency::new();

    for vertex in &known {
        let mut targets = BTreeSet::new();
        for dep in dependencies_of(vertex) {
            if known.contains(&dep) {
                targets.insert(dep);
            } else {
                on_missing(vertex, &dep)?;
                trace!("dropped edge to missing vertex");
            }
        }
        adjacency.insert(vertex.clone(), targets);
    }

    Ok(adjacency)
}
