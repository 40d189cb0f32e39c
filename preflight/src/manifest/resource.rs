//! Resource identity types for the manifest.
//!
//! A resource is identified by its final key: the URI it was added with,
//! prefixed with a type tag for stylesheets (`css!`) and preload assets
//! (`preload!`). Scripts are unprefixed. Two descriptors with the same key
//! refer to the same resource.

use std::fmt;

/// Key prefix for stylesheet resources.
pub const CSS_PREFIX: &str = "css!";

/// Key prefix for preload resources.
pub const PRELOAD_PREFIX: &str = "preload!";

/// The type tag of a loadable resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// An executable script; may carry a validator.
    Script,
    /// A stylesheet; keyed with the `css!` prefix.
    Stylesheet,
    /// A preloaded asset (image, font); keyed with the `preload!` prefix.
    Preload,
}

impl ResourceKind {
    /// Returns the key prefix for this kind (empty for scripts).
    pub fn prefix(&self) -> &'static str {
        match self {
            ResourceKind::Script => "",
            ResourceKind::Stylesheet => CSS_PREFIX,
            ResourceKind::Preload => PRELOAD_PREFIX,
        }
    }

    /// Builds the final resource key for a URI of this kind.
    pub fn key_for(&self, uri: &str) -> ResourceKey {
        match self {
            ResourceKind::Script => ResourceKey::new(uri),
            _ => ResourceKey::new(format!("{}{}", self.prefix(), uri)),
        }
    }
}

/// The identity of a resource: its URI, possibly carrying a type prefix.
///
/// Keys are opaque to the engine; the loader is free to interpret prefixes
/// however it likes. Equality and hashing are on the full string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey(String);

impl ResourceKey {
    /// Creates a key from its final string form.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for ResourceKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl AsRef<str> for ResourceKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A single entry in the manifest: a key and its type tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    /// Final (possibly prefixed) resource key.
    pub key: ResourceKey,
    /// Type tag the resource was added as.
    pub kind: ResourceKind,
}

impl ResourceDescriptor {
    /// Creates a descriptor for a URI of the given kind.
    pub fn new(kind: ResourceKind, uri: &str) -> Self {
        Self {
            key: kind.key_for(uri),
            kind,
        }
    }
}

/// The ordered set of resources a session will load.
///
/// Ordering is insertion order. Identity is the final key: adding a key that
/// is already present does not append a second entry (the add still counts as
/// the most recent one for callback attachment). A literal `css!x` script and
/// a stylesheet `x` therefore collapse into one resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<ResourceDescriptor>,
}

impl Manifest {
    /// Creates an empty manifest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a descriptor unless its key is already present.
    ///
    /// Returns `true` if the descriptor was appended.
    pub(crate) fn push(&mut self, descriptor: ResourceDescriptor) -> bool {
        if self.contains(&descriptor.key) {
            return false;
        }
        self.entries.push(descriptor);
        true
    }

    /// Returns `true` if a resource with this key is present.
    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.entries.iter().any(|entry| &entry.key == key)
    }

    /// Iterates descriptors in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = &ResourceDescriptor> {
        self.entries.iter()
    }

    /// Iterates resource keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &ResourceKey> {
        self.entries.iter().map(|entry| &entry.key)
    }

    /// Returns the number of resources.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no resources have been added.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
