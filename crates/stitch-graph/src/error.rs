//! Errors surfaced by graph resolution.
//!
//! Only user-facing conditions live here: missing dependencies and cycles
//! that no deferred edge can break. Broken internal invariants are defects
//! and panic at the point of detection instead.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use stitch_core::{BindingKey, ErrorCode};

// ---------------------------------------------------------------------------
// Cycle reports
// ---------------------------------------------------------------------------

/// A strongly connected component that cannot be made acyclic by deferral.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle<V> {
    /// Members in natural order.
    pub members: Vec<V>,
    /// For each member, its dependencies that lie inside the cycle.
    pub dependencies: BTreeMap<V, BTreeSet<V>>,
}

impl<V: Ord + fmt::Display> fmt::Display for Cycle<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "No topological ordering is possible for these items:")?;
        for member in &self.members {
            write!(f, "  {member} <-")?;
            for dep in self.dependencies.get(member).into_iter().flatten() {
                write!(f, " {dep}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Every hard cycle found before resolution stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport<V> {
    pub cycles: Vec<Cycle<V>>,
}

impl<V: Ord + fmt::Display> fmt::Display for CycleReport<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, cycle) in self.cycles.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{cycle}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TopologyError
// ---------------------------------------------------------------------------

/// Errors from the generic ordering pipeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopologyError<V: fmt::Debug + fmt::Display> {
    /// An edge points at a vertex that does not exist.
    #[error("{dependent} depends on {missing}, which is not in the graph")]
    MissingDependency { dependent: V, missing: V },

    /// One or more components cannot be broken through deferred edges.
    #[error("{0}")]
    HardCycles(CycleReport<V>),
}

/// `on_missing` callback that makes every missing dependency fatal.
///
/// # Errors
///
/// Always returns [`TopologyError::MissingDependency`].
pub fn fail_on_missing<V>(dependent: &V, missing: &V) -> Result<(), TopologyError<V>>
where
    V: Clone + fmt::Debug + fmt::Display,
{
    Err(TopologyError::MissingDependency {
        dependent: dependent.clone(),
        missing: missing.clone(),
    })
}

/// `on_missing` callback that silently drops edges to missing vertices.
///
/// # Errors
///
/// Never fails.
pub fn ignore_missing<V, E>(_dependent: &V, _missing: &V) -> Result<(), E> {
    Ok(())
}

// ---------------------------------------------------------------------------
// ResolveError
// ---------------------------------------------------------------------------

/// Errors from resolving a [`stitch_core::BindingGraph`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("{dependent} depends on {missing}, which has no binding")]
    MissingBinding {
        dependent: BindingKey,
        missing: BindingKey,
    },

    #[error("{0}")]
    Cycles(CycleReport<BindingKey>),

    #[error("requested key {0} has no binding")]
    UnknownRoot(BindingKey),
}

impl ResolveError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::MissingBinding { .. } => ErrorCode::MissingBinding,
            Self::Cycles(_) => ErrorCode::DependencyCycle,
            Self::UnknownRoot(_) => ErrorCode::UnknownRoot,
        }
    }
}

impl From<TopologyError<BindingKey>> for ResolveError {
    fn from(err: TopologyError<BindingKey>) -> Self {
        match err {
            TopologyError::MissingDependency { dependent, missing } => {
                Self::MissingBinding { dependent, missing }
            }
            TopologyError::HardCycles(report) => Self::Cycles(report),
        }
    }
}
