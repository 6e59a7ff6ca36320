//! Bindings and the binding graph handed to the resolver.
//!
//! # Overview
//!
//! A [`Binding`] produces the value named by its [`BindingKey`] from a list
//! of [`Dependency`] use sites. What *kind* of binding it is matters in a
//! handful of places (storage, triviality, cycle-breaking preference), so
//! kinds are a closed sum type and every such decision is an exhaustive
//! `match` on [`BindingKind`].
//!
//! ## Edge Direction
//!
//! An edge `A → B` means "A depends on B": B must be constructed before A
//! unless every use of B inside A is deferred (provider or lazy access).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::key::{Access, BindingKey, ContextualKey, Variant};

// ---------------------------------------------------------------------------
// BindingKind
// ---------------------------------------------------------------------------

/// Collection shape of a multibinding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollectionKind {
    Set,
    Map,
}

/// What produces a binding's value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum BindingKind {
    /// An injectable constructor.
    ConstructorInjected,
    /// A provider function, optionally called on a fixed receiver (module instance).
    Provided {
        #[serde(default)]
        receiver: Option<BindingKey>,
    },
    /// Re-exposes its single dependency under another key.
    Alias,
    /// A set or map assembled from contributions.
    Multibinding { collection: CollectionKind },
    /// An accessor on an included graph; the receiver is that graph instance.
    GraphDependency { receiver: BindingKey },
    /// An instance handed to the graph at creation time.
    BoundInstance,
    /// A generated factory for assisted construction.
    AssistedFactory,
    /// A declared-optional binding with no provider; callers use their default.
    Absent,
}

impl BindingKind {
    /// The fixed owner value this kind is invoked on, if any.
    #[must_use]
    pub const fn receiver(&self) -> Option<&BindingKey> {
        match self {
            Self::Provided { receiver } => receiver.as_ref(),
            Self::GraphDependency { receiver } => Some(receiver),
            Self::ConstructorInjected
            | Self::Alias
            | Self::Multibinding { .. }
            | Self::BoundInstance
            | Self::AssistedFactory
            | Self::Absent => None,
        }
    }

    /// Kinds that are inherently safe to defer, tried first when breaking cycles.
    #[must_use]
    pub const fn is_implicitly_deferrable(&self) -> bool {
        match self {
            Self::AssistedFactory | Self::Multibinding { .. } => true,
            Self::ConstructorInjected
            | Self::Provided { .. }
            | Self::Alias
            | Self::GraphDependency { .. }
            | Self::BoundInstance
            | Self::Absent => false,
        }
    }

    /// `false` for kinds that never own storage of their own.
    ///
    /// Aliases forward to their target, bound instances are already held by
    /// the graph, and absent bindings have nothing to construct.
    #[must_use]
    pub const fn is_materialized(&self) -> bool {
        match self {
            Self::Alias | Self::BoundInstance | Self::Absent => false,
            Self::ConstructorInjected
            | Self::Provided { .. }
            | Self::Multibinding { .. }
            | Self::GraphDependency { .. }
            | Self::AssistedFactory => true,
        }
    }
}

// ---------------------------------------------------------------------------
// Dependency
// ---------------------------------------------------------------------------

/// One use site inside a binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
    #[serde(flatten)]
    pub target: ContextualKey,
    /// The requester declares a default, so a missing target is not an error.
    #[serde(default)]
    pub optional: bool,
}

impl Dependency {
    #[must_use]
    pub const fn new(target: ContextualKey) -> Self {
        Self {
            target,
            optional: false,
        }
    }

    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    #[must_use]
    pub const fn key(&self) -> &BindingKey {
        &self.target.key
    }

    #[must_use]
    pub const fn is_deferred(&self) -> bool {
        self.target.is_deferred()
    }
}

impl From<ContextualKey> for Dependency {
    fn from(target: ContextualKey) -> Self {
        Self::new(target)
    }
}

// ---------------------------------------------------------------------------
// Binding
// ---------------------------------------------------------------------------

/// A producible value with an identity and its dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub key: BindingKey,
    #[serde(flatten)]
    pub kind: BindingKind,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    /// Scope-cached: one instance per graph, so it always needs storage.
    #[serde(default)]
    pub scoped: bool,
}

impl Binding {
    #[must_use]
    pub fn new(key: impl Into<BindingKey>, kind: BindingKind) -> Self {
        Self {
            key: key.into(),
            kind,
            dependencies: Vec::new(),
            scoped: false,
        }
    }

    /// Shorthand for a constructor-injected binding.
    #[must_use]
    pub fn constructor(key: impl Into<BindingKey>) -> Self {
        Self::new(key, BindingKind::ConstructorInjected)
    }

    /// Add an immediate dependency on `key`.
    #[must_use]
    pub fn depends_on(self, key: impl Into<BindingKey>) -> Self {
        self.with_dependency(ContextualKey::instance(key))
    }

    /// Add a provider (deferred) dependency on `key`.
    #[must_use]
    pub fn depends_on_provider(self, key: impl Into<BindingKey>) -> Self {
        self.with_dependency(ContextualKey::provider(key))
    }

    #[must_use]
    pub fn with_dependency(mut self, dependency: impl Into<Dependency>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }

    #[must_use]
    pub const fn scoped(mut self) -> Self {
        self.scoped = true;
        self
    }

    /// Keys of every dependency, in declaration order (may repeat).
    pub fn dependency_keys(&self) -> impl Iterator<Item = &BindingKey> {
        self.dependencies.iter().map(Dependency::key)
    }

    /// Whether the edge `self → to` can be satisfied without constructing `to`.
    ///
    /// `None` if there is no such edge. An edge is deferrable only when every
    /// use of `to` is deferred; one immediate use makes it hard.
    #[must_use]
    pub fn edge_is_deferrable(&self, to: &BindingKey) -> Option<bool> {
        let mut uses = self.dependencies.iter().filter(|d| d.key() == to).peekable();
        uses.peek()?;
        Some(uses.all(Dependency::is_deferred))
    }

    /// The dependency declared on `to`, if any (first declaration wins).
    #[must_use]
    pub fn dependency_on(&self, to: &BindingKey) -> Option<&Dependency> {
        self.dependencies.iter().find(|d| d.key() == to)
    }

    /// No dependencies, or only the kind's fixed receiver.
    ///
    /// Trivial bindings are cheap enough to construct at every use that
    /// sharing them through an accessor buys nothing.
    #[must_use]
    pub fn is_trivial(&self) -> bool {
        match self.dependencies.as_slice() {
            [] => true,
            [only] => self.kind.receiver() == Some(only.key()),
            _ => false,
        }
    }

    /// Dependencies as seen when this binding is requested as `variant`.
    ///
    /// A multibinding requested as a collection of providers reaches its
    /// contributions through providers, whatever they declared.
    pub fn dependencies_for(&self, variant: Variant) -> impl Iterator<Item = ContextualKey> + '_ {
        let wrap = matches!(self.kind, BindingKind::Multibinding { .. })
            && variant == Variant::ProviderElements;
        self.dependencies.iter().map(move |d| {
            if wrap && !d.is_deferred() {
                d.target.clone().with_access(Access::Provider)
            } else {
                d.target.clone()
            }
        })
    }
}

// ---------------------------------------------------------------------------
// BindingGraph
// ---------------------------------------------------------------------------

/// The set of bindings declared for one graph, indexed by key.
///
/// Build-scoped: created once per graph resolution and dropped afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingGraph {
    bindings: BTreeMap<BindingKey, Binding>,
}

impl BindingGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a binding, returning the one it replaced.
    pub fn insert(&mut self, binding: Binding) -> Option<Binding> {
        self.bindings.insert(binding.key.clone(), binding)
    }

    #[must_use]
    pub fn get(&self, key: &BindingKey) -> Option<&Binding> {
        self.bindings.get(key)
    }

    #[must_use]
    pub fn contains(&self, key: &BindingKey) -> bool {
        self.bindings.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Keys in natural order.
    pub fn keys(&self) -> impl Iterator<Item = &BindingKey> {
        self.bindings.keys()
    }

    /// Bindings in key order.
    pub fn iter(&self) -> impl Iterator<Item = &Binding> {
        self.bindings.values()
    }
}

impl FromIterator<Binding> for BindingGraph {
    fn from_iter<T: IntoIterator<Item = Binding>>(iter: T) -> Self {
        let mut graph = Self::new();
        for binding in iter {
            graph.insert(binding);
        }
        graph
    }
}

impl Extend<Binding> for BindingGraph {
    fn extend<T: IntoIterator<Item = Binding>>(&mut self, iter: T) {
        for binding in iter {
            self.insert(binding);
        }
    }
}
