//! Canonical payloads produced by the mapping layer.
//!
//! Shapes follow the canonical repository's wire format:
//!
//! - entity: `{guid, type, version, properties, classifications[]}`
//! - relationship: `{guid, type, version, properties, proxy1, proxy2}`
//! - proxy: `{guid, type, uniqueProperties}`
//! - classification: `{type, properties}`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Canonical property carrying an entity's unique identifying name.
pub const QUALIFIED_NAME: &str = "qualifiedName";

/// Canonical globally unique identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Guid(Uuid);

impl Guid {
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A canonical (typed) property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CanonicalValue {
    String(String),
    Int(i32),
    Long(i64),
    Float(f64),
    Boolean(bool),
    Date(DateTime<Utc>),
    Enum { ordinal: i32, symbolic_name: String },
}

impl CanonicalValue {
    pub fn string(s: impl Into<String>) -> Self {
        CanonicalValue::String(s.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CanonicalValue::String(s) => Some(s),
            CanonicalValue::Enum { symbolic_name, .. } => Some(symbolic_name),
            _ => None,
        }
    }

    /// Text used when matching this value against a search pattern.
    pub fn match_text(&self) -> String {
        match self {
            CanonicalValue::String(s) => s.clone(),
            CanonicalValue::Int(i) => i.to_string(),
            CanonicalValue::Long(l) => l.to_string(),
            CanonicalValue::Float(f) => f.to_string(),
            CanonicalValue::Boolean(b) => b.to_string(),
            CanonicalValue::Date(d) => d.timestamp_millis().to_string(),
            CanonicalValue::Enum { symbolic_name, .. } => symbolic_name.clone(),
        }
    }
}

impl fmt::Display for CanonicalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.match_text())
    }
}

/// Ordered canonical property bag.
pub type InstanceProperties = BTreeMap<String, CanonicalValue>;

/// Minimal reference to an entity, embedded in relationships.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityProxy {
    pub guid: Guid,
    #[serde(rename = "type")]
    pub type_name: String,
    pub unique_properties: InstanceProperties,
}

impl EntityProxy {
    pub fn qualified_name(&self) -> Option<&str> {
        self.unique_properties
            .get(QUALIFIED_NAME)
            .and_then(CanonicalValue::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalClassification {
    #[serde(rename = "type")]
    pub type_name: String,
    pub properties: InstanceProperties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalEntity {
    pub guid: Guid,
    #[serde(rename = "type")]
    pub type_name: String,
    pub version: i64,
    pub properties: InstanceProperties,
    pub classifications: Vec<CanonicalClassification>,
    pub metadata_collection: String,
}

impl CanonicalEntity {
    pub fn property(&self, name: &str) -> Option<&CanonicalValue> {
        self.properties.get(name)
    }

    pub fn qualified_name(&self) -> Option<&str> {
        self.property(QUALIFIED_NAME).and_then(CanonicalValue::as_str)
    }

    pub fn classification(&self, type_name: &str) -> Option<&CanonicalClassification> {
        self.classifications.iter().find(|c| c.type_name == type_name)
    }
}

/// A relationship between exactly two entity proxies.
///
/// The two-endpoint invariant is structural: there is no way to build one
/// with fewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalRelationship {
    pub guid: Guid,
    #[serde(rename = "type")]
    pub type_name: String,
    pub version: i64,
    pub properties: InstanceProperties,
    pub proxy1: EntityProxy,
    pub proxy2: EntityProxy,
    pub metadata_collection: String,
}

impl CanonicalRelationship {
    pub fn property(&self, name: &str) -> Option<&CanonicalValue> {
        self.properties.get(name)
    }

    /// The proxy at the other end from `guid`, if `guid` is an endpoint.
    pub fn other_end(&self, guid: &Guid) -> Option<&EntityProxy> {
        if &self.proxy1.guid == guid {
            Some(&self.proxy2)
        } else if &self.proxy2.guid == guid {
            Some(&self.proxy1)
        } else {
            None
        }
    }
}
