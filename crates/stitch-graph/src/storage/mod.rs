//! Binding storage classification.
//!
//! Once the initialization order is known, each reachable binding (per
//! [`VariantKey`]) is assigned one of three strategies:
//!
//! | Kind                               | Emitted as                              |
//! |------------------------------------|-----------------------------------------|
//! | [`StorageKind::Dedicated`]         | a field, initialized in sorted order    |
//! | [`StorageKind::SharedAccessor`]    | a private accessor, no field            |
//! | [`StorageKind::Inline`]            | constructed again at every use site     |
//!
//! The decision is driven by reference counts; see [`classify`] for how
//! they are accumulated.

pub mod classify;

use std::collections::BTreeMap;

use stitch_core::VariantKey;

pub use classify::classify_storage;

/// How a binding variant is materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StorageKind {
    /// A field holding the instance (or its provider).
    Dedicated,
    /// An accessor shared by every immediate use site.
    SharedAccessor,
    /// Constructed inline wherever it is needed.
    Inline,
}

impl StorageKind {
    /// `true` for kinds that emit a member (field or accessor).
    #[must_use]
    pub const fn is_emitted(self) -> bool {
        match self {
            Self::Dedicated | Self::SharedAccessor => true,
            Self::Inline => false,
        }
    }
}

/// Classification of one binding variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageEntry {
    pub kind: StorageKind,
    /// References through a provider/lazy handle at the time of classification.
    pub factory_refs: usize,
    /// Immediate references at the time of classification.
    pub scalar_refs: usize,
}

/// Per-variant storage decisions for one resolved graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoragePlan {
    entries: BTreeMap<VariantKey, StorageEntry>,
    emission_order: Vec<VariantKey>,
}

impl StoragePlan {
    pub(crate) const fn new(
        entries: BTreeMap<VariantKey, StorageEntry>,
        emission_order: Vec<VariantKey>,
    ) -> Self {
        Self {
            entries,
            emission_order,
        }
    }

    #[must_use]
    pub fn get(&self, key: &VariantKey) -> Option<&StorageEntry> {
        self.entries.get(key)
    }

    /// Storage kind of `key`, `None` if it was never classified.
    #[must_use]
    pub fn kind(&self, key: &VariantKey) -> Option<StorageKind> {
        self.entries.get(key).map(|entry| entry.kind)
    }

    /// Every variant that emits a field or accessor, in initialization order.
    #[must_use]
    pub fn emission_order(&self) -> &[VariantKey] {
        &self.emission_order
    }

    /// Variants with dedicated storage, in initialization order.
    pub fn fields(&self) -> impl Iterator<Item = &VariantKey> {
        self.emitted(StorageKind::Dedicated)
    }

    /// Variants with a shared accessor, in initialization order.
    pub fn accessors(&self) -> impl Iterator<Item = &VariantKey> {
        self.emitted(StorageKind::SharedAccessor)
    }

    fn emitted(&self, kind: StorageKind) -> impl Iterator<Item = &VariantKey> {
        self.emission_order
            .iter()
            .filter(move |key| self.kind(key) == Some(kind))
    }

    /// All classified variants in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&VariantKey, &StorageEntry)> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use stitch_core::Variant;

    use super::*;

    fn entry(kind: StorageKind) -> StorageEntry {
        StorageEntry {
            kind,
            factory_refs: 0,
            scalar_refs: 0,
        }
    }

    #[test]
    fn fields_and_accessors_follow_emission_order() {
        let b = VariantKey::plain("b");
        let a = VariantKey::plain("a");
        let c = VariantKey {
            key: "c".into(),
            variant: Variant::ProviderElements,
        };
        let plan = StoragePlan::new(
            BTreeMap::from([
                (a.clone(), entry(StorageKind::Dedicated)),
                (b.clone(), entry(StorageKind::SharedAccessor)),
                (c.clone(), entry(StorageKind::Dedicated)),
                (VariantKey::plain("d"), entry(StorageKind::Inline)),
            ]),
            vec![c.clone(), b.clone(), a.clone()],
        );

        assert_eq!(plan.fields().collect::<Vec<_>>(), vec![&c, &a]);
        assert_eq!(plan.accessors().collect::<Vec<_>>(), vec![&b]);
        assert_eq!(plan.kind(&VariantKey::plain("d")), Some(StorageKind::Inline));
        assert_eq!(plan.kind(&VariantKey::plain("zzz")), None);
        assert_eq!(plan.len(), 4);
    }

    #[test]
    fn only_inline_is_not_emitted() {
        assert!(StorageKind::Dedicated.is_emitted());
        assert!(StorageKind::SharedAccessor.is_emitted());
        assert!(!StorageKind::Inline.is_emitted());
    }
}
