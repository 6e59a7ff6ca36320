#![forbid(unsafe_code)]
//! stitch-graph library.
//!
//! Dependency-graph resolution for stitch binding graphs: a deterministic,
//! cycle-aware initialization order plus per-binding storage decisions.
//!
//! # Modules
//!
//! - [`topology`]: generic pipeline (adjacency, SCCs, cycle breaking,
//!   component ordering and expansion) over any `V: Ord + Clone`.
//! - [`storage`]: reference-count driven storage classification.
//! - [`resolve`]: runs both over a [`stitch_core::BindingGraph`].
//! - [`error`]: user-facing errors. Invariant violations panic instead.
//!
//! # Conventions
//!
//! - **Determinism**: every tie is broken by the natural order of the vertex
//!   type; input iteration order never affects the output.
//! - **Logging**: `tracing` only, the library never installs a subscriber.

pub mod error;
pub mod resolve;
pub mod storage;
pub mod topology;

pub use error::{Cycle, CycleReport, ResolveError, TopologyError};
pub use resolve::{BindingEdges, Resolution, ResolveRequest, binding_adjacency, resolve};
pub use storage::{StorageEntry, StorageKind, StoragePlan, classify_storage};
pub use topology::{
    EdgePolicy, GraphTopology, SortOptions, topological_sort, topological_sort_with,
};
