use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Item kinds registered when no explicit list is configured.
pub const DEFAULT_ITEM_KINDS: &[&str] = &["asset", "note"];

/// The kind of a votable content item, e.g. `asset` or `note`.
///
/// Request input is resolved through an [`ItemKindRegistry`]; `new` is for
/// kinds read back from storage.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemKind(String);

impl ItemKind {
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a votable item: its kind and its id within that kind.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemRef {
    pub kind: ItemKind,
    pub id: String,
}

impl ItemRef {
    pub fn new(kind: ItemKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// Opaque identity of a voting user, as supplied by the auth layer.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The set of content kinds that may receive votes.
///
/// Relationship suggestions and any other votable content are registered
/// here as additional kinds; they all go through the same engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemKindRegistry {
    kinds: BTreeSet<String>,
}

impl ItemKindRegistry {
    /// Creates a registry from a list of kind names.
    ///
    /// Names are trimmed and lowercased; empty names are ignored.
    pub fn new<I, S>(kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let kinds = kinds
            .into_iter()
            .map(|kind| kind.as_ref().trim().to_lowercase())
            .filter(|kind| !kind.is_empty())
            .collect();
        Self { kinds }
    }

    /// Resolves a raw kind name to a recognized [`ItemKind`].
    pub fn resolve(&self, kind: &str) -> Option<ItemKind> {
        self.kinds.get(kind).map(|kind| ItemKind(kind.clone()))
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.kinds.contains(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.kinds.iter().map(String::as_str)
    }
}

impl Default for ItemKindRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_ITEM_KINDS)
    }
}
