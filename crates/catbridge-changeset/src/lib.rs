//! Change detection between two snapshots of a native asset.
//!
//! ```text
//!   StubSnapshot (baseline)      current PropertyBag
//!            │                           │
//!            └────────────┬──────────────┘
//!                         ▼
//!                ChangeSetEngine::diff
//!                         │
//!          ┌──────────────┼──────────────────┐
//!          ▼              ▼                  ▼
//!      add /prop    remove /prop    replace /prop
//!                   add    /prop/items/3    (element-level, lists only)
//! ```
//!
//! The engine is a pure function: no I/O, no state, and the same two bags
//! always yield the same records in the same order. Reference-valued
//! properties compare by native id only, so churn inside a referenced object
//! never shows up as a change on the referencing one.

mod list;


use catbridge_model::{NativeValue, PropertyBag, StubSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Kind of change recorded against a property path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    Add,
    Remove,
    Replace,
}

impl fmt::Display for ChangeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChangeOp::Add => "add",
            ChangeOp::Remove => "remove",
            ChangeOp::Replace => "replace",
        })
    }
}

/// `/property` for whole-value changes, `/property/items/<index>` for a
/// single element of a reference list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PropertyPath {
    pub property: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

impl PropertyPath {
    pub fn whole(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            index: None,
        }
    }

    pub fn element(property: impl Into<String>, index: usize) -> Self {
        Self {
            property: property.into(),
            index: Some(index),
        }
    }

    pub fn is_element(&self) -> bool {
        self.index.is_some()
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(i) => write!(f, "/{}/items/{}", self.property, i),
            None => write!(f, "/{}", self.property),
        }
    }
}

/// One detected change.
///
/// For element-level records the old/new values are the single list element
/// (a `NativeValue::Reference`); otherwise they are the whole property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub path: PropertyPath,
    pub op: ChangeOp,
    pub old: Option<NativeValue>,
    pub new: Option<NativeValue>,
}

impl ChangeRecord {
    pub fn property(&self) -> &str {
        &self.path.property
    }
}

/// All changes between a baseline and the current bag.
///
/// `changed_properties()` and `unchanged_properties()` partition the union of
/// keys of both bags, and every changed property carries exactly one
/// operation kind.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChangeSet {
    records: Vec<ChangeRecord>,
    unchanged: BTreeSet<String>,
}

impl ChangeSet {
    pub fn records(&self) -> &[ChangeRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn changes_for_property(&self, property: &str) -> Vec<&ChangeRecord> {
        self.records
            .iter()
            .filter(|r| r.path.property == property)
            .collect()
    }

    pub fn changed_properties(&self) -> BTreeSet<&str> {
        self.records.iter().map(|r| r.property()).collect()
    }

    pub fn unchanged_properties(&self) -> BTreeSet<&str> {
        self.unchanged.iter().map(String::as_str).collect()
    }

    /// The single operation kind recorded for `property`, if it changed.
    pub fn op_for(&self, property: &str) -> Option<ChangeOp> {
        self.records
            .iter()
            .find(|r| r.path.property == property)
            .map(|r| r.op)
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a ChangeRecord;
    type IntoIter = std::slice::Iter<'a, ChangeRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Stateless diff engine; safe to share and reuse concurrently.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeSetEngine;

impl ChangeSetEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn diff(&self, current: &PropertyBag, stub: &StubSnapshot) -> ChangeSet {
        diff(current, stub)
    }
}

/// Null, `""`, `"null"` and empty lists all count as "not present".
fn present(value: Option<&NativeValue>) -> Option<&NativeValue> {
    value.filter(|v| match v {
        NativeValue::ReferenceList(l) => !l.is_empty(),
        other => !other.is_absent(),
    })
}

/// Diff `current` against the `stub` baseline.
pub fn diff(current: &PropertyBag, stub: &StubSnapshot) -> ChangeSet {
    let mut set = ChangeSet::default();

    if !stub.is_empty() && stub.fingerprint() == catbridge_model::fingerprint(current) {
        set.unchanged = current
            .keys()
            .chain(stub.properties.keys())
            .cloned()
            .collect();
        return set;
    }

    let keys: BTreeSet<&String> = current.keys().chain(stub.properties.keys()).collect();
    for key in keys {
        let old = present(stub.properties.get(key));
        let new = present(current.get(key));
        match (old, new) {
            (None, None) => {
                set.unchanged.insert(key.clone());
            }
            (None, Some(new)) => set.records.push(ChangeRecord {
                path: PropertyPath::whole(key.as_str()),
                op: ChangeOp::Add,
                old: None,
                new: Some(new.clone()),
            }),
            (Some(old), None) => set.records.push(ChangeRecord {
                path: PropertyPath::whole(key.as_str()),
                op: ChangeOp::Remove,
                old: Some(old.clone()),
                new: None,
            }),
            (Some(old), Some(new)) if old.identity_eq(new) => {
                set.unchanged.insert(key.clone());
            }
            // Element indices are only meaningful when both sides are fully
            // loaded.
            (Some(NativeValue::ReferenceList(old)), Some(NativeValue::ReferenceList(new)))
                if old.is_complete() && new.is_complete() =>
            {
                let records = list::diff_elements(key, old, new);
                if records.is_empty() {
                    set.unchanged.insert(key.clone());
                }
                set.records.extend(records);
            }
            (Some(old), Some(new)) => set.records.push(ChangeRecord {
                path: PropertyPath::whole(key.as_str()),
                op: ChangeOp::Replace,
                old: Some(old.clone()),
                new: Some(new.clone()),
            }),
        }
    }

    tracing::debug!(
        changed = set.changed_properties().len(),
        unchanged = set.unchanged.len(),
        records = set.records.len(),
        "computed change set"
    );
    set
}
