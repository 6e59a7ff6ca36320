#![forbid(unsafe_code)]
//! stitch-core library.
//!
//! The binding model shared by every resolver stage: keys, bindings, the
//! per-graph [`BindingGraph`], error codes and resolver configuration.
//!
//! # Conventions
//!
//! - **Errors**: [`ErrorCode`] is the stable code table; the typed errors that
//!   carry it live in `stitch-graph`. `anyhow::Result` at the config-file
//!   boundary.
//! - **Logging**: Use `tracing` macros (`debug!`, `trace!`, `warn!`).

pub mod binding;
pub mod config;
pub mod error;
pub mod key;

pub use binding::{Binding, BindingGraph, BindingKind, CollectionKind, Dependency};
pub use config::{CyclePolicy, MissingPolicy, ResolverConfig, load_resolver_config};
pub use error::ErrorCode;
pub use key::{Access, BindingKey, ContextualKey, Variant, VariantKey};
