//! Reference-count driven storage classification.
//!
//! # Counting
//!
//! Every binding variant carries two counters: `factory` (references through
//! a provider/lazy handle, or from inside a factory path) and `scalar`
//! (immediate references).
//!
//! 1. Each requested key (root or extra keep) is marked once.
//! 2. Every deferred binding marks its dependencies as deferred up front,
//!    once per variant it is referenced as. A deferred binding always gets
//!    dedicated storage, so these marks do not depend on its counts.
//! 3. The sorted keys are walked in reverse. Classifying a binding that is
//!    not deferred marks each of its dependencies: deferred if the binding
//!    is in a factory path or the use site is a deferred access, immediate
//!    otherwise.
//!
//! Every dependent of a binding is either deferred or sorted after it, so
//! its counts are final by the time it is classified, including inside
//! broken cycles where the deferred member is sorted first.
//!
//! A binding is in a factory path iff it got dedicated storage or has at
//! least one factory reference.
//!
//! # Decision
//!
//! In order:
//!
//! 1. scope-cached or deferred (placeholder) bindings → dedicated;
//! 2. kinds that are never materialized → inline;
//! 3. `factory > 1`, or `factory == 1 && scalar >= 1` → dedicated;
//! 4. `scalar > 1` on a non-trivial binding → shared accessor;
//! 5. otherwise inline.
//!
//! An inline alias hands its counts to its target instead of marking it.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::RangeInclusive;

use stitch_core::{
    Binding, BindingGraph, BindingKey, BindingKind, ContextualKey, Variant, VariantKey,
};
use tracing::{debug, instrument, trace};

use super::{StorageEntry, StorageKind, StoragePlan};
use crate::topology::GraphTopology;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct RefCounts {
    factory: usize,
    scalar: usize,
}

impl RefCounts {
    const fn mark(&mut self, deferred: bool) {
        if deferred {
            self.factory += 1;
        } else {
            self.scalar += 1;
        }
    }
}

/// Classify every reachable binding variant of `topology`.
///
/// `requests` are the root and extra-keep keys, each counted once with its
/// own access kind.
///
/// # Panics
///
/// Panics if `topology` orders a key that has no binding in `graph`; the
/// topology must have been computed from this graph.
#[must_use]
#[instrument(skip_all, fields(sorted = topology.sorted_keys.len()))]
pub fn classify_storage<'r, R>(
    graph: &BindingGraph,
    topology: &GraphTopology<BindingKey>,
    requests: R,
) -> StoragePlan
where
    R: IntoIterator<Item = &'r ContextualKey>,
{
    let mut classifier = Classifier {
        topology,
        nodes: BTreeMap::new(),
        entries: BTreeMap::new(),
    };

    let requests: Vec<&ContextualKey> = requests.into_iter().collect();
    for request in &requests {
        classifier.mark(request.variant_key(), request.is_deferred());
    }

    // Variants each key is referenced as; they do not depend on counts.
    let mut referenced: BTreeSet<VariantKey> =
        requests.iter().map(|request| request.variant_key()).collect();
    for key in &topology.sorted_keys {
        referenced.extend(
            binding_of(graph, key)
                .dependencies
                .iter()
                .map(|dependency| dependency.target.variant_key()),
        );
    }

    for key in topology.sorted_keys.iter().filter(|key| topology.is_deferred(key)) {
        let binding = binding_of(graph, key);
        let mut variants: Vec<Variant> = referenced
            .range(variant_range(key))
            .map(|key| key.variant)
            .collect();
        if variants.is_empty() {
            variants.push(Variant::Plain);
        }
        for variant in variants {
            for dependency in binding.dependencies_for(variant) {
                classifier.mark(dependency.variant_key(), true);
            }
        }
    }

    for key in topology.sorted_keys.iter().rev() {
        classifier.visit(binding_of(graph, key));
    }

    classifier.finish()
}

fn binding_of<'g>(graph: &'g BindingGraph, key: &BindingKey) -> &'g Binding {
    let Some(binding) = graph.get(key) else {
        panic!("sorted key {key} has no binding in the graph it was sorted from");
    };
    binding
}

/// Every variant key of `key`, for range queries over `VariantKey` maps.
fn variant_range(key: &BindingKey) -> RangeInclusive<VariantKey> {
    let lower = VariantKey {
        key: key.clone(),
        variant: Variant::Plain,
    };
    let upper = VariantKey {
        key: key.clone(),
        variant: Variant::ProviderElements,
    };
    lower..=upper
}

struct Classifier<'t> {
    topology: &'t GraphTopology<BindingKey>,
    nodes: BTreeMap<VariantKey, RefCounts>,
    entries: BTreeMap<VariantKey, StorageEntry>,
}

impl Classifier<'_> {
    fn mark(&mut self, key: VariantKey, deferred: bool) {
        if !self.topology.is_reachable(&key.key) {
            return;
        }
        self.nodes.entry(key).or_default().mark(deferred);
    }

    /// Classify each variant of `binding` that was referenced, or its plain
    /// variant if none was.
    fn visit(&mut self, binding: &Binding) {
        let mut variants: Vec<(Variant, RefCounts)> = self
            .nodes
            .range(variant_range(&binding.key))
            .map(|(key, counts)| (key.variant, *counts))
            .collect();
        if variants.is_empty() {
            variants.push((Variant::Plain, RefCounts::default()));
        }

        for (variant, counts) in variants {
            self.classify(binding, variant, counts);
        }
    }

    fn classify(&mut self, binding: &Binding, variant: Variant, counts: RefCounts) {
        let deferred = self.topology.is_deferred(&binding.key);
        let kind = storage_kind(binding, counts, deferred);
        trace!(
            key = %binding.key,
            ?variant,
            ?kind,
            factory = counts.factory,
            scalar = counts.scalar,
            "classified binding"
        );
        self.entries.insert(
            VariantKey {
                key: binding.key.clone(),
                variant,
            },
            StorageEntry {
                kind,
                factory_refs: counts.factory,
                scalar_refs: counts.scalar,
            },
        );

        if deferred {
            // Marked before the walk.
            return;
        }
        if matches!(binding.kind, BindingKind::Alias) && kind != StorageKind::Dedicated {
            for target in binding.dependencies_for(variant) {
                self.forward(target, counts);
            }
            return;
        }

        let factory_path = kind == StorageKind::Dedicated || counts.factory > 0;
        for dependency in binding.dependencies_for(variant) {
            let deferred = factory_path || dependency.is_deferred();
            self.mark(dependency.variant_key(), deferred);
        }
    }

    /// Credit an alias's own references to its target.
    fn forward(&mut self, target: ContextualKey, counts: RefCounts) {
        if !self.topology.is_reachable(&target.key) {
            return;
        }
        let node = self.nodes.entry(target.variant_key()).or_default();
        if target.is_deferred() {
            node.factory += counts.factory + counts.scalar;
        } else {
            node.factory += counts.factory;
            node.scalar += counts.scalar;
        }
    }

    fn finish(self) -> StoragePlan {
        let mut emission_order = Vec::new();
        for key in &self.topology.sorted_keys {
            emission_order.extend(
                self.entries
                    .range(variant_range(key))
                    .filter(|(_, entry)| entry.kind.is_emitted())
                    .map(|(key, _)| key.clone()),
            );
        }

        debug!(
            classified = self.entries.len(),
            fields = emission_order
                .iter()
                .filter(|key| self.entries[*key].kind == StorageKind::Dedicated)
                .count(),
            emitted = emission_order.len(),
            "storage plan complete"
        );
        StoragePlan::new(self.entries, emission_order)
    }
}

fn storage_kind(binding: &Binding, counts: RefCounts, deferred: bool) -> StorageKind {
    if binding.scoped || deferred {
        return StorageKind::Dedicated;
    }
    if !binding.kind.is_materialized() {
        return StorageKind::Inline;
    }
    match counts {
        RefCounts { factory, scalar } if factory > 1 || (factory == 1 && scalar >= 1) => {
            StorageKind::Dedicated
        }
        RefCounts { scalar, .. } if scalar > 1 && !binding.is_trivial() => {
            StorageKind::SharedAccessor
        }
        RefCounts { .. } => StorageKind::Inline,
    }
}
