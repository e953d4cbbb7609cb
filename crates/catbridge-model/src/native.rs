//! Native catalog values, references and assets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Property holding the asset's last modification timestamp.
pub const MODIFIED_ON: &str = "modified_on";

/// Property holding the asset's ancestor chain (outermost first).
pub const CONTEXT: &str = "_context";

/// Property holding the asset's display name.
pub const NAME: &str = "name";

/// Native type reported for stand-in objects that cannot be retrieved.
pub const PLACEHOLDER_TYPE: &str = "main_object";

/// Stable native asset identifier (the catalog's "RID").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rid(String);

impl Rid {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Rid {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Rid {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// How a fetched reference must be resolved.
///
/// Set by the client at fetch time; mappers branch on it instead of probing
/// the referenced object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefKind {
    /// An ordinary, retrievable asset.
    Asset,
    /// An edge-as-node carrier holding relationship-level properties.
    LinkObject,
    /// A non-retrievable stand-in; never emitted as an endpoint.
    Placeholder,
}

/// A reference to a native asset, as returned inside property values and
/// search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeRef {
    pub id: Rid,
    pub native_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub kind: RefKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_on: Option<DateTime<Utc>>,
}

impl NativeRef {
    pub fn asset(id: impl Into<Rid>, native_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            native_type: native_type.into(),
            name: Some(name.into()),
            kind: RefKind::Asset,
            modified_on: None,
        }
    }

    pub fn link_object(id: impl Into<Rid>, native_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            native_type: native_type.into(),
            name: None,
            kind: RefKind::LinkObject,
            modified_on: None,
        }
    }

    pub fn placeholder(id: impl Into<Rid>) -> Self {
        Self {
            id: id.into(),
            native_type: PLACEHOLDER_TYPE.to_string(),
            name: None,
            kind: RefKind::Placeholder,
            modified_on: None,
        }
    }

    pub fn with_modified_on(mut self, at: DateTime<Utc>) -> Self {
        self.modified_on = Some(at);
        self
    }

    pub fn is_retrievable(&self) -> bool {
        self.kind != RefKind::Placeholder
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.id.as_str())
    }
}

/// One page (or more) of a paged reference-list property.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RefList {
    pub items: Vec<NativeRef>,
    /// Total number of references on the server, which may exceed `items`.
    pub total: u64,
}

impl RefList {
    pub fn new(items: Vec<NativeRef>) -> Self {
        let total = items.len() as u64;
        Self { items, total }
    }

    pub fn partial(items: Vec<NativeRef>, total: u64) -> Self {
        Self { items, total }
    }

    pub fn is_complete(&self) -> bool {
        self.items.len() as u64 >= self.total
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.total == 0
    }

    pub fn ids(&self) -> impl Iterator<Item = &Rid> {
        self.items.iter().map(|r| &r.id)
    }
}

/// A native property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum NativeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    Reference(NativeRef),
    ReferenceList(RefList),
}

impl NativeValue {
    /// The catalog reports missing references as null, `""` or `"null"`.
    pub fn is_absent(&self) -> bool {
        match self {
            NativeValue::Null => true,
            NativeValue::Text(s) => s.is_empty() || s == "null",
            _ => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            NativeValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            NativeValue::Int(i) => Some(*i),
            NativeValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            NativeValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            NativeValue::Float(f) => Some(*f),
            NativeValue::Int(i) => Some(*i as f64),
            NativeValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            NativeValue::Bool(b) => Some(*b),
            NativeValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            NativeValue::Timestamp(t) => Some(*t),
            NativeValue::Int(ms) => DateTime::<Utc>::from_timestamp_millis(*ms),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&NativeRef> {
        match self {
            NativeValue::Reference(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_reference_list(&self) -> Option<&RefList> {
        match self {
            NativeValue::ReferenceList(l) => Some(l),
            _ => None,
        }
    }

    /// References held by this value, whether single or listed.
    pub fn references(&self) -> Vec<&NativeRef> {
        match self {
            NativeValue::Reference(r) => vec![r],
            NativeValue::ReferenceList(l) => l.items.iter().collect(),
            _ => Vec::new(),
        }
    }

    /// Text form used for search comparisons and string coercion.
    ///
    /// References render as their name, so `parent.name`-style predicates and
    /// name-valued canonical properties agree.
    pub fn as_search_text(&self) -> Option<String> {
        match self {
            NativeValue::Null => None,
            NativeValue::Bool(b) => Some(b.to_string()),
            NativeValue::Int(i) => Some(i.to_string()),
            NativeValue::Float(f) => Some(f.to_string()),
            NativeValue::Text(s) => Some(s.clone()),
            NativeValue::Timestamp(t) => Some(t.timestamp_millis().to_string()),
            NativeValue::Reference(r) => Some(r.display_name().to_string()),
            NativeValue::ReferenceList(_) => None,
        }
    }

    /// Identity-level key: scalars by value, references by RID only.
    ///
    /// Two values with equal keys are "unchanged" for change detection, even
    /// if a referenced object's own content has churned.
    pub fn identity_key(&self) -> String {
        match self {
            NativeValue::Null => "null".to_string(),
            NativeValue::Bool(b) => format!("b:{b}"),
            NativeValue::Int(i) => format!("i:{i}"),
            NativeValue::Float(f) => format!("f:{:016x}", f.to_bits()),
            NativeValue::Text(s) => format!("t:{}:{s}", s.len()),
            NativeValue::Timestamp(t) => format!("ts:{}", t.timestamp_millis()),
            NativeValue::Reference(r) => format!("r:{}", r.id),
            NativeValue::ReferenceList(l) => {
                let ids: Vec<String> = l.ids().map(|id| format!("{}:{id}", id.as_str().len())).collect();
                format!("rl:{}:[{}]", l.total, ids.join(","))
            }
        }
    }

    pub fn identity_eq(&self, other: &NativeValue) -> bool {
        match (self, other) {
            (NativeValue::Reference(a), NativeValue::Reference(b)) => a.id == b.id,
            (NativeValue::ReferenceList(a), NativeValue::ReferenceList(b)) => {
                a.total == b.total && a.ids().eq(b.ids())
            }
            (NativeValue::Float(a), NativeValue::Float(b)) => a.to_bits() == b.to_bits(),
            (a, b) => a == b,
        }
    }
}

impl From<&str> for NativeValue {
    fn from(s: &str) -> Self {
        NativeValue::Text(s.to_string())
    }
}

impl From<String> for NativeValue {
    fn from(s: String) -> Self {
        NativeValue::Text(s)
    }
}

impl From<i64> for NativeValue {
    fn from(i: i64) -> Self {
        NativeValue::Int(i)
    }
}

impl From<f64> for NativeValue {
    fn from(f: f64) -> Self {
        NativeValue::Float(f)
    }
}

impl From<bool> for NativeValue {
    fn from(b: bool) -> Self {
        NativeValue::Bool(b)
    }
}

impl From<NativeRef> for NativeValue {
    fn from(r: NativeRef) -> Self {
        NativeValue::Reference(r)
    }
}

impl From<Vec<NativeRef>> for NativeValue {
    fn from(items: Vec<NativeRef>) -> Self {
        NativeValue::ReferenceList(RefList::new(items))
    }
}

impl From<DateTime<Utc>> for NativeValue {
    fn from(t: DateTime<Utc>) -> Self {
        NativeValue::Timestamp(t)
    }
}

/// Native property bag, keyed by native property name.
pub type PropertyBag = BTreeMap<String, NativeValue>;

/// A fetched native asset: its reference plus whatever properties have been
/// loaded so far. Properties not present here may still be fetched lazily.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeAsset {
    pub reference: NativeRef,
    #[serde(default)]
    pub properties: PropertyBag,
}

impl NativeAsset {
    pub fn new(reference: NativeRef) -> Self {
        Self {
            reference,
            properties: PropertyBag::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<NativeValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn id(&self) -> &Rid {
        &self.reference.id
    }

    pub fn native_type(&self) -> &str {
        &self.reference.native_type
    }

    pub fn property(&self, name: &str) -> Option<&NativeValue> {
        self.properties.get(name)
    }

    pub fn name(&self) -> Option<&str> {
        self.property(NAME)
            .and_then(NativeValue::as_text)
            .or(self.reference.name.as_deref())
    }

    pub fn modified_on(&self) -> Option<DateTime<Utc>> {
        self.property(MODIFIED_ON)
            .and_then(NativeValue::as_timestamp)
            .or(self.reference.modified_on)
    }

    /// Reference to this asset carrying the freshest name and timestamp.
    pub fn to_ref(&self) -> NativeRef {
        let mut r = self.reference.clone();
        if let Some(name) = self.name() {
            r.name = Some(name.to_string());
        }
        r.modified_on = self.modified_on();
        r
    }
}
