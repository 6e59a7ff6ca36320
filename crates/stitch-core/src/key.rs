//! Binding identities.
//!
//! A [`BindingKey`] names a producible value. It is opaque to the resolver:
//! the only things the engine relies on are equality and a total order, and
//! that order is what makes every downstream stage deterministic.
//!
//! A [`ContextualKey`] is a key *as requested at a use site*: it adds the
//! [`Access`] wrapping (immediate value vs. provider/lazy indirection) and,
//! for collection bindings, the element [`Variant`]. Several contextual keys
//! can map to the same binding key.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// BindingKey
// ---------------------------------------------------------------------------

/// Opaque, totally ordered identity of a binding.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BindingKey(String);

impl BindingKey {
    /// Create a key from any string-like identity.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the underlying identity.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BindingKey {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for BindingKey {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// Access / Variant
// ---------------------------------------------------------------------------

/// How a use site asks for a value.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Access {
    /// The value itself, constructed before the requester.
    #[default]
    Instance,
    /// A provider handle; the value is produced on demand.
    Provider,
    /// A memoizing lazy handle.
    Lazy,
    /// A provider of lazy handles.
    ProviderOfLazy,
}

impl Access {
    /// `true` for every access that goes through an indirection.
    ///
    /// Deferred accesses do not need the target to exist when the requester
    /// is constructed, which is what makes cycles through them breakable.
    #[must_use]
    pub const fn is_deferred(self) -> bool {
        match self {
            Self::Instance => false,
            Self::Provider | Self::Lazy | Self::ProviderOfLazy => true,
        }
    }
}

/// Element wrapping requested from a collection binding.
///
/// Non-collection bindings only ever use [`Variant::Plain`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    /// The resolved value (`Set<T>`, `Map<K, V>`, or a plain binding).
    #[default]
    Plain,
    /// A collection of deferred elements (`Set<Provider<T>>`, `Map<K, Provider<V>>`).
    ProviderElements,
}

// ---------------------------------------------------------------------------
// ContextualKey / VariantKey
// ---------------------------------------------------------------------------

/// A binding key together with the way it is accessed at a use site.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContextualKey {
    pub key: BindingKey,
    #[serde(default)]
    pub access: Access,
    #[serde(default)]
    pub variant: Variant,
}

impl ContextualKey {
    /// Immediate access to the plain value of `key`.
    #[must_use]
    pub fn instance(key: impl Into<BindingKey>) -> Self {
        Self {
            key: key.into(),
            access: Access::Instance,
            variant: Variant::Plain,
        }
    }

    /// Provider access to the plain value of `key`.
    #[must_use]
    pub fn provider(key: impl Into<BindingKey>) -> Self {
        Self::instance(key).with_access(Access::Provider)
    }

    /// Lazy access to the plain value of `key`.
    #[must_use]
    pub fn lazy(key: impl Into<BindingKey>) -> Self {
        Self::instance(key).with_access(Access::Lazy)
    }

    #[must_use]
    pub const fn with_access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    #[must_use]
    pub const fn with_variant(mut self, variant: Variant) -> Self {
        self.variant = variant;
        self
    }

    /// `true` if this use site goes through a provider/lazy indirection.
    #[must_use]
    pub const fn is_deferred(&self) -> bool {
        self.access.is_deferred()
    }

    /// The identity used for storage accounting: access kind stripped,
    /// collection variant kept.
    #[must_use]
    pub fn variant_key(&self) -> VariantKey {
        VariantKey {
            key: self.key.clone(),
            variant: self.variant,
        }
    }
}

impl fmt::Display for ContextualKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = match self.variant {
            Variant::Plain => self.key.to_string(),
            Variant::ProviderElements => format!("{}<Provider>", self.key),
        };
        match self.access {
            Access::Instance => f.write_str(&inner),
            Access::Provider => write!(f, "Provider<{inner}>"),
            Access::Lazy => write!(f, "Lazy<{inner}>"),
            Access::ProviderOfLazy => write!(f, "Provider<Lazy<{inner}>>"),
        }
    }
}

/// A binding key plus collection variant.
///
/// Each variant of a multi-variant binding is classified independently, so
/// this (not the bare [`BindingKey`]) is the key of a storage decision.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VariantKey {
    pub key: BindingKey,
    pub variant: Variant,
}

impl VariantKey {
    #[must_use]
    pub fn plain(key: impl Into<BindingKey>) -> Self {
        Self {
            key: key.into(),
            variant: Variant::Plain,
        }
    }
}

impl fmt::Display for VariantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.variant {
            Variant::Plain => write!(f, "{}", self.key),
            Variant::ProviderElements => write!(f, "{}<Provider>", self.key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_instance_access_is_immediate() {
        assert!(!Access::Instance.is_deferred());
        assert!(Access::Provider.is_deferred());
        assert!(Access::Lazy.is_deferred());
        assert!(Access::ProviderOfLazy.is_deferred());
    }

    #[test]
    fn variant_key_drops_access_but_keeps_variant() {
        let a = ContextualKey::provider("Set<Plugin>").with_variant(Variant::ProviderElements);
        let b = ContextualKey::instance("Set<Plugin>").with_variant(Variant::ProviderElements);
        let c = ContextualKey::instance("Set<Plugin>");

        assert_eq!(a.variant_key(), b.variant_key());
        assert_ne!(a.variant_key(), c.variant_key());
    }

    #[test]
    fn contextual_key_display_wraps_access() {
        assert_eq!(ContextualKey::instance("Db").to_string(), "Db");
        assert_eq!(ContextualKey::provider("Db").to_string(), "Provider<Db>");
        assert_eq!(ContextualKey::lazy("Db").to_string(), "Lazy<Db>");
        assert_eq!(
            ContextualKey::instance("Set<Plugin>")
                .with_access(Access::ProviderOfLazy)
                .with_variant(Variant::ProviderElements)
                .to_string(),
            "Provider<Lazy<Set<Plugin><Provider>>>"
        );
    }

    #[test]
    fn keys_order_naturally() {
        let mut keys = vec![BindingKey::from("c"), BindingKey::from("a"), BindingKey::from("b")];
        keys.sort();
        let expected: Vec<BindingKey> = vec!["a".into(), "b".into(), "c".into()];
        assert_eq!(keys, expected);
    }
}
