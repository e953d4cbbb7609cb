//! Deterministic identity derivation.
//!
//! A GUID is a pure function of `(rid, native type, generation prefix)`. The
//! generation prefix separates canonical entities synthesized from the same
//! native asset (an asset and a derived view of it), so lookups always carry
//! the `(rid, prefix)` pair.

use crate::canonical::Guid;
use crate::native::Rid;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Namespace used when the configuration does not supply one.
pub const DEFAULT_GUID_NAMESPACE: Uuid = Uuid::from_u128(0x6c1f_3a52_8d0e_4b7a_9e21_5f40_c3d8_a917);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PrefixError {
    #[error("generation prefix must not be empty")]
    Empty,

    #[error("invalid generation prefix '{0}': only ASCII letters, digits and '_' are allowed")]
    InvalidCharacter(String),
}

/// Tag naming a derived canonical view of a native asset.
///
/// Restricted to ASCII letters, digits and `_` so it can be embedded in
/// qualified names (`gen!<PREFIX>@...`) unambiguously.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GenerationPrefix(String);

impl GenerationPrefix {
    pub fn new(prefix: impl Into<String>) -> Result<Self, PrefixError> {
        let prefix = prefix.into();
        if prefix.is_empty() {
            return Err(PrefixError::Empty);
        }
        if !prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(PrefixError::InvalidCharacter(prefix));
        }
        Ok(Self(prefix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Qualified name of the derived view built over `base`.
    pub fn qualify(&self, base: &str) -> String {
        format!("gen!{}@{}", self.0, base)
    }
}

impl fmt::Display for GenerationPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for GenerationPrefix {
    type Error = PrefixError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<GenerationPrefix> for String {
    fn from(p: GenerationPrefix) -> Self {
        p.0
    }
}

/// Collaborator deriving canonical GUIDs.
pub trait GuidGenerator: Send + Sync {
    fn entity_guid(&self, rid: &Rid, native_type: &str, prefix: Option<&GenerationPrefix>) -> Guid;

    /// Relationship identity: its type, both endpoints and, for relationships
    /// carried by a link object, the carrier's RID.
    fn relationship_guid(
        &self,
        relationship_type: &str,
        one: &Guid,
        two: &Guid,
        carrier: Option<&Rid>,
    ) -> Guid {
        let synthetic = match carrier {
            Some(rid) => Rid::new(format!("{one}/{two}/{rid}")),
            None => Rid::new(format!("{one}/{two}")),
        };
        self.entity_guid(&synthetic, relationship_type, None)
    }
}

/// UUIDv5 GUIDs under a fixed namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamespaceGuids {
    namespace: Uuid,
}

impl NamespaceGuids {
    pub fn new(namespace: Uuid) -> Self {
        Self { namespace }
    }

    /// Length-prefixed so distinct triples never collide on the encoded name.
    fn encode(rid: &Rid, native_type: &str, prefix: Option<&GenerationPrefix>) -> String {
        let prefix = prefix.map(GenerationPrefix::as_str).unwrap_or("");
        format!(
            "{}:{}|{}:{}|{}:{}",
            prefix.len(),
            prefix,
            native_type.len(),
            native_type,
            rid.as_str().len(),
            rid
        )
    }
}

impl Default for NamespaceGuids {
    fn default() -> Self {
        Self::new(DEFAULT_GUID_NAMESPACE)
    }
}

impl GuidGenerator for NamespaceGuids {
    fn entity_guid(&self, rid: &Rid, native_type: &str, prefix: Option<&GenerationPrefix>) -> Guid {
        let name = Self::encode(rid, native_type, prefix);
        Guid::from_uuid(Uuid::new_v5(&self.namespace, name.as_bytes()))
    }
}
